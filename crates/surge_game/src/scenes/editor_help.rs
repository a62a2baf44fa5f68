use glam::Vec2;
use surge_core::{Button, Color, Key, Scene};
use surge_platform::DrawCommand;

use crate::context::{GameContext, SceneArg};

const OPEN_SAMPLE: &str = "samples/select.wav";
const CLOSE_SAMPLE: &str = "samples/return.wav";
const LINE_HEIGHT: f32 = 10.0;

pub const BINDINGS: &[(&str, &str)] = &[
    ("F12 or Esc", "Leave the editor"),
    ("LCtrl + S", "Save the level"),
    ("LCtrl + L", "Reload the level"),
    ("LCtrl + Z / LCtrl + Y", "Undo / redo"),
    ("Arrow keys or WASD", "Move the camera"),
    ("Tab / LShift + Tab", "Next / previous edit mode"),
    ("PageDown / PageUp", "Next / previous entity"),
    ("B / LShift + B", "Next / previous object category"),
    ("P", "Open the palette"),
    ("Left mouse button", "Put the entity"),
    ("Middle mouse button or I", "Pick the entity under the cursor"),
    ("Right mouse button", "Delete the entity under the cursor"),
    ("LShift + right mouse button", "Eraser"),
    ("N", "Move the spawn point to the cursor"),
    ("K / LShift + K", "Set / remove the water level"),
    ("L", "Switch brick layer"),
    ("F", "Flip the brick"),
    ("G", "Cycle the grid"),
    ("M", "Show collision masks"),
    ("H or F1", "This help"),
];

/// Lists the editor key bindings until a key is pressed.
pub struct EditorHelpScene {
    scroll: f32,
}

impl EditorHelpScene {
    pub fn new() -> Self {
        Self { scroll: 0.0 }
    }
}

impl Default for EditorHelpScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene<GameContext, SceneArg> for EditorHelpScene {
    fn init(&mut self, ctx: &mut GameContext, _arg: SceneArg) {
        self.scroll = 0.0;
        ctx.audio.play_sample(OPEN_SAMPLE);
    }

    fn update(&mut self, ctx: &mut GameContext) {
        let input = &ctx.input;
        let close = input.button_pressed(Button::Fire1)
            || input.button_pressed(Button::Fire3)
            || input.is_just_pressed(Key::H)
            || input.is_just_pressed(Key::F1);
        if close {
            ctx.pop_scene();
            return;
        }

        let dt = ctx.dt();
        let max_scroll = (BINDINGS.len() as f32 * LINE_HEIGHT - 160.0).max(0.0);
        if input.button_down(Button::Down) {
            self.scroll = (self.scroll + 120.0 * dt).min(max_scroll);
        } else if input.button_down(Button::Up) {
            self.scroll = (self.scroll - 120.0 * dt).max(0.0);
        }
    }

    fn render(&mut self, ctx: &mut GameContext) {
        let renderer = ctx.renderer.as_mut();
        renderer.submit(DrawCommand::Clear(Color::rgb(16, 16, 32)));
        renderer.text("LEVEL EDITOR", Vec2::new(8.0, 8.0), Color::rgb(119, 255, 0));
        for (i, (keys, action)) in BINDINGS.iter().enumerate() {
            let y = 32.0 + i as f32 * LINE_HEIGHT - self.scroll;
            renderer.text(keys, Vec2::new(8.0, y), Color::YELLOW);
            renderer.text(action, Vec2::new(200.0, y), Color::WHITE);
        }
        renderer.text("Press ESC to go back", Vec2::new(8.0, 228.0), Color::WHITE);
    }

    fn release(&mut self, ctx: &mut GameContext) {
        ctx.audio.play_sample(CLOSE_SAMPLE);
    }

    fn name(&self) -> &str {
        "editorhelp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SceneRequest;
    use std::path::Path;

    #[test]
    fn escape_goes_back() {
        let mut ctx = GameContext::headless(Path::new(".")).expect("context");
        let mut scene = EditorHelpScene::new();
        scene.init(&mut ctx, SceneArg::None);
        scene.update(&mut ctx);
        assert!(!ctx.has_requests());

        ctx.input.key_down(Key::Escape);
        scene.update(&mut ctx);
        assert_eq!(ctx.take_requests(), vec![SceneRequest::Pop]);
    }
}
