//! Input state tracking with both edge-triggered and level-triggered queries.
//!
//! Raw keys are recorded as they come from the platform. Gameplay code reads
//! virtual [`Button`]s, resolved through an [`InputMap`]; the editor reads
//! raw keys and the mouse directly.
//!
//! Edge sets (`just_pressed` / `just_released`) are cleared by `end_frame()`,
//! which the engine calls after a logic tick has consumed them, so a press
//! that arrives between two ticks is never lost.

use std::collections::{HashMap, HashSet};

use glam::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    Escape,
    Enter,
    Space,
    Tab,
    Backspace,
    LCtrl,
    LShift,
    F1,
    F12,
    A,
    B,
    D,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    P,
    S,
    W,
    Y,
    Z,
    PageUp,
    PageDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseBtn {
    Left,
    Right,
    Middle,
}

/// Virtual gamepad buttons seen by gameplay code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    Fire1,
    Fire2,
    Fire3,
    Fire4,
    Fire5,
    Fire6,
    Fire7,
    Fire8,
}

impl Button {
    pub const ALL: &'static [Button] = &[
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::Fire1,
        Button::Fire2,
        Button::Fire3,
        Button::Fire4,
        Button::Fire5,
        Button::Fire6,
        Button::Fire7,
        Button::Fire8,
    ];
}

/// Key bindings for the virtual buttons.
#[derive(Debug, Clone)]
pub struct InputMap {
    bindings: HashMap<Button, Vec<Key>>,
}

impl InputMap {
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    pub fn bind(&mut self, button: Button, key: Key) {
        let keys = self.bindings.entry(button).or_default();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    pub fn keys_for(&self, button: Button) -> &[Key] {
        self.bindings.get(&button).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for InputMap {
    fn default() -> Self {
        let mut map = Self::new();
        map.bind(Button::Up, Key::Up);
        map.bind(Button::Down, Key::Down);
        map.bind(Button::Left, Key::Left);
        map.bind(Button::Right, Key::Right);
        map.bind(Button::Fire1, Key::Space);
        map.bind(Button::Fire2, Key::Enter);
        map.bind(Button::Fire3, Key::Escape);
        map.bind(Button::Fire4, Key::P);
        // Fire5 to Fire8 start unbound.
        map
    }
}

pub struct InputState {
    held: HashSet<Key>,
    just_pressed: HashSet<Key>,
    just_released: HashSet<Key>,

    mouse_held: HashSet<MouseBtn>,
    mouse_just_pressed: HashSet<MouseBtn>,
    mouse_just_released: HashSet<MouseBtn>,

    pub mouse_position: Vec2,
    pub map: InputMap,
    ignored: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self {
            held: HashSet::new(),
            just_pressed: HashSet::new(),
            just_released: HashSet::new(),
            mouse_held: HashSet::new(),
            mouse_just_pressed: HashSet::new(),
            mouse_just_released: HashSet::new(),
            mouse_position: Vec2::ZERO,
            map: InputMap::default(),
            ignored: false,
        }
    }

    pub fn key_down(&mut self, key: Key) {
        if self.held.insert(key) {
            self.just_pressed.insert(key);
        }
    }

    pub fn key_up(&mut self, key: Key) {
        if self.held.remove(&key) {
            self.just_released.insert(key);
        }
    }

    pub fn mouse_down(&mut self, btn: MouseBtn) {
        if self.mouse_held.insert(btn) {
            self.mouse_just_pressed.insert(btn);
        }
    }

    pub fn mouse_up(&mut self, btn: MouseBtn) {
        if self.mouse_held.remove(&btn) {
            self.mouse_just_released.insert(btn);
        }
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    pub fn is_just_pressed(&self, key: Key) -> bool {
        self.just_pressed.contains(&key)
    }

    pub fn is_just_released(&self, key: Key) -> bool {
        self.just_released.contains(&key)
    }

    pub fn is_mouse_held(&self, btn: MouseBtn) -> bool {
        self.mouse_held.contains(&btn)
    }

    pub fn is_mouse_just_pressed(&self, btn: MouseBtn) -> bool {
        self.mouse_just_pressed.contains(&btn)
    }

    pub fn is_mouse_just_released(&self, btn: MouseBtn) -> bool {
        self.mouse_just_released.contains(&btn)
    }

    /// Is the virtual button held? Always false while input is ignored.
    pub fn button_down(&self, button: Button) -> bool {
        !self.ignored && self.map.keys_for(button).iter().any(|k| self.is_held(*k))
    }

    pub fn button_pressed(&self, button: Button) -> bool {
        !self.ignored
            && self
                .map
                .keys_for(button)
                .iter()
                .any(|k| self.is_just_pressed(*k))
    }

    /// Blocks virtual buttons, e.g. while a dialog or the editor owns the input.
    pub fn ignore(&mut self) {
        self.ignored = true;
    }

    pub fn restore(&mut self) {
        self.ignored = false;
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    pub fn end_frame(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();
        self.mouse_just_pressed.clear();
        self.mouse_just_released.clear();
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_down_sets_held_and_just_pressed() {
        let mut input = InputState::new();
        input.key_down(Key::A);
        assert!(input.is_held(Key::A));
        assert!(input.is_just_pressed(Key::A));
    }

    #[test]
    fn test_key_up_clears_held_sets_just_released() {
        let mut input = InputState::new();
        input.key_down(Key::A);
        input.key_up(Key::A);
        assert!(!input.is_held(Key::A));
        assert!(input.is_just_released(Key::A));
    }

    #[test]
    fn test_key_up_without_down_is_no_op() {
        let mut input = InputState::new();
        input.key_up(Key::A);
        assert!(!input.is_just_released(Key::A));
        assert!(!input.is_held(Key::A));
    }

    #[test]
    fn test_end_frame_clears_transient_state() {
        let mut input = InputState::new();
        input.key_down(Key::A);
        input.mouse_down(MouseBtn::Left);
        input.end_frame();
        assert!(!input.is_just_pressed(Key::A));
        assert!(!input.is_mouse_just_pressed(MouseBtn::Left));
        assert!(input.is_held(Key::A));
        assert!(input.is_mouse_held(MouseBtn::Left));
    }

    #[test]
    fn test_button_follows_default_bindings() {
        let mut input = InputState::new();
        input.key_down(Key::Space);
        assert!(input.button_down(Button::Fire1));
        assert!(input.button_pressed(Button::Fire1));
        assert!(!input.button_down(Button::Left));
    }

    #[test]
    fn test_ignored_input_hides_buttons_but_not_keys() {
        let mut input = InputState::new();
        input.key_down(Key::Right);
        input.ignore();
        assert!(!input.button_down(Button::Right));
        assert!(input.is_held(Key::Right));
        input.restore();
        assert!(input.button_down(Button::Right));
    }

    #[test]
    fn test_bind_does_not_duplicate_keys() {
        let mut map = InputMap::new();
        map.bind(Button::Fire1, Key::Z);
        map.bind(Button::Fire1, Key::Z);
        assert_eq!(map.keys_for(Button::Fire1), &[Key::Z]);
        assert!(map.keys_for(Button::Fire2).is_empty());
    }
}
