//! In-game level editor.
//!
//! The editor owns a camera of its own and never updates the level: scripts,
//! physics and the camera of the level stay frozen while it is open. Every
//! change goes through [`EditorAction`]s so that it can be undone.

pub mod action_log;
pub mod grid;
pub mod groups;
pub mod picking;

use std::sync::Arc;

use glam::Vec2;
use surge_core::{Color, InputState, Key, MouseBtn};
use surge_platform::video::{SCREEN_HEIGHT, SCREEN_WIDTH};
use surge_platform::{Audio, Renderer};
use surge_render::Camera2D;

use crate::level::brick::{Brick, BrickFlip};
use crate::level::item::{item_name, Item, ITEMDATA_MAX};
use crate::level::legacy_object::LegacyObject;
use crate::level::obstacle::Layer;
use crate::level::{Level, RenderOptions};
use crate::scripting::tags::{TAG_ENTITY, TAG_PRIVATE};
use crate::scripting::{Handle, ScriptVm};

use action_log::{ActionLog, EditorAction, EditorObject};
use grid::Grid;
use groups::GroupSet;

/// Two positions closer than this refer to the same object.
pub const EPSILON: f32 = 1e-5;

pub const DENY_SAMPLE: &str = "samples/deny.wav";
pub const SAVE_SAMPLE: &str = "samples/select.wav";

const STATUS_DURATION: f32 = 3.0;
const STATUS_FADE: f32 = 0.5;
const SCROLL_SPEED: f32 = 750.0;
const SCROLL_SPEED_FAST: f32 = 1500.0;
const BAR_HEIGHT: f32 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    Brick,
    Item,
    /// Legacy objects.
    Enemy,
    Group,
    /// Scripted entities.
    SsObj,
}

impl CursorMode {
    pub const ALL: &'static [CursorMode] = &[
        CursorMode::Brick,
        CursorMode::Item,
        CursorMode::Enemy,
        CursorMode::Group,
        CursorMode::SsObj,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CursorMode::Brick => "brick",
            CursorMode::Item => "item",
            CursorMode::Enemy => "object",
            CursorMode::Group => "group",
            CursorMode::SsObj => "entity",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|m| *m == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Self {
        let n = Self::ALL.len();
        Self::ALL[(self.index() + n - 1) % n]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorCommand {
    NextClass,
    PreviousClass,
    NextEntity,
    PreviousEntity,
    NextCategory,
    PreviousCategory,
    ChangeLayer,
    ChangeFlip,
    CycleGrid,
    ToggleMasks,
    PutItem,
    PickItem,
    DeleteItem,
    /// Deletes whatever passes under the cursor while held.
    EraseHeld,
    ChangeSpawn,
    ChangeWater,
    RemoveWater,
    Undo,
    Redo,
    Save,
    Reload,
    Help,
    Palette,
    Quit,
}

/// Commands triggered by this frame's input.
pub fn commands(input: &InputState) -> Vec<EditorCommand> {
    use EditorCommand::*;

    let ctrl = input.is_held(Key::LCtrl);
    let shift = input.is_held(Key::LShift);
    let pressed = |key| input.is_just_pressed(key);
    let mut out = Vec::new();

    if ctrl {
        if pressed(Key::Z) {
            out.push(Undo);
        }
        if pressed(Key::Y) {
            out.push(Redo);
        }
        if pressed(Key::S) {
            out.push(Save);
        }
        if pressed(Key::L) {
            out.push(Reload);
        }
        return out;
    }

    if pressed(Key::Tab) {
        out.push(if shift { PreviousClass } else { NextClass });
    }
    if pressed(Key::PageDown) {
        out.push(NextEntity);
    }
    if pressed(Key::PageUp) {
        out.push(PreviousEntity);
    }
    if pressed(Key::B) {
        out.push(if shift { PreviousCategory } else { NextCategory });
    }
    if pressed(Key::L) {
        out.push(ChangeLayer);
    }
    if pressed(Key::F) {
        out.push(ChangeFlip);
    }
    if pressed(Key::G) {
        out.push(CycleGrid);
    }
    if pressed(Key::M) {
        out.push(ToggleMasks);
    }
    if pressed(Key::N) {
        out.push(ChangeSpawn);
    }
    if pressed(Key::K) {
        out.push(if shift { RemoveWater } else { ChangeWater });
    }
    if pressed(Key::H) || pressed(Key::F1) {
        out.push(Help);
    }
    if pressed(Key::P) {
        out.push(Palette);
    }
    if pressed(Key::F12) || pressed(Key::Escape) {
        out.push(Quit);
    }
    if input.is_mouse_just_pressed(MouseBtn::Left) {
        out.push(PutItem);
    }
    if input.is_mouse_just_pressed(MouseBtn::Middle) || pressed(Key::I) {
        out.push(PickItem);
    }
    if shift && input.is_mouse_held(MouseBtn::Right) {
        out.push(EraseHeld);
    } else if input.is_mouse_just_pressed(MouseBtn::Right) {
        out.push(DeleteItem);
    }
    out
}

/// What the scene hosting the editor has to do after an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorOutcome {
    Continue,
    /// Leave the editor.
    Quit,
    /// Leave the editor after the user confirms losing unsaved changes.
    ConfirmQuit,
    OpenPalette,
    OpenHelp,
    /// Reload the level from disk and reopen the editor.
    Reload,
}

#[derive(Debug, Default)]
struct StatusBar {
    message: String,
    timer: f32,
}

impl StatusBar {
    fn show(&mut self, message: impl Into<String>) {
        self.message = message.into();
        self.timer = STATUS_DURATION;
        log::info!("Editor: {}", self.message);
    }

    fn update(&mut self, dt: f32) {
        self.timer = (self.timer - dt).max(0.0);
    }

    fn alpha(&self) -> f32 {
        (self.timer / STATUS_FADE).min(1.0)
    }
}

/// A list of choices with a current one.
#[derive(Debug, Clone)]
struct Selection<T> {
    entries: Vec<T>,
    index: usize,
}

impl<T> Selection<T> {
    fn new(entries: Vec<T>) -> Self {
        Self { entries, index: 0 }
    }

    fn current(&self) -> Option<&T> {
        self.entries.get(self.index)
    }

    fn step(&mut self, forward: bool) {
        let n = self.entries.len();
        if n == 0 {
            return;
        }
        self.index = if forward { (self.index + 1) % n } else { (self.index + n - 1) % n };
    }

    fn select(&mut self, index: usize) -> bool {
        if index < self.entries.len() {
            self.index = index;
            true
        } else {
            false
        }
    }
}

/// Category "*" lists every legacy object; the others group names by the
/// prefix before the first `/`.
fn object_categories(names: &[String]) -> Vec<String> {
    let mut categories: Vec<String> = names
        .iter()
        .filter_map(|n| n.split_once('/').map(|(c, _)| c.to_string()))
        .collect();
    categories.sort();
    categories.dedup();
    categories.insert(0, "*".to_string());
    categories
}

fn in_category(name: &str, category: &str) -> bool {
    category == "*" || name.split_once('/').is_some_and(|(c, _)| c == category)
}

pub struct Editor {
    camera: Camera2D,
    grid: Grid,
    log: ActionLog,
    mode: CursorMode,
    bricks: Selection<u32>,
    items: Selection<u32>,
    all_objects: Vec<String>,
    objects: Selection<String>,
    categories: Selection<String>,
    entities: Selection<String>,
    groups: Option<Arc<GroupSet>>,
    group_index: usize,
    layer: Layer,
    flip: BrickFlip,
    show_masks: bool,
    status: StatusBar,
    modified: bool,
    cursor: Vec2,
}

impl Editor {
    /// Opens the editor on `level`, looking where the level camera looks.
    pub fn enter(level: &Level, vm: &ScriptVm, groups: Option<Arc<GroupSet>>) -> Self {
        let mut camera = Camera2D::new(SCREEN_WIDTH, SCREEN_HEIGHT);
        camera.position = level.camera().position();

        let mut names: Vec<String> = level
            .entities()
            .objects
            .iter()
            .map(|(_, o)| o.name.clone())
            .collect();
        names.sort();
        names.dedup();

        let mut classes = Vec::new();
        vm.foreach_tagged(TAG_ENTITY, |class| classes.push(class.to_string()));
        classes.retain(|class| !vm.has_tag(class, TAG_PRIVATE));
        classes.sort();

        let mut status = StatusBar::default();
        status.show(format!("Editing {}", level.path().display()));

        log::info!(
            "Entering the editor: {} bricks, {} entity classes, {} groups",
            level.brickset().len(),
            classes.len(),
            groups.as_ref().map_or(0, |g| g.len())
        );

        Self {
            camera,
            grid: Grid::new(),
            log: ActionLog::new(),
            mode: CursorMode::Brick,
            bricks: Selection::new(level.brickset().ids().collect()),
            items: Selection::new((0..ITEMDATA_MAX).collect()),
            categories: Selection::new(object_categories(&names)),
            objects: Selection::new(names.clone()),
            all_objects: names,
            entities: Selection::new(classes),
            groups,
            group_index: 0,
            layer: Layer::Default,
            flip: BrickFlip::NoFlip,
            show_masks: false,
            status,
            modified: false,
            cursor: Vec2::ZERO,
        }
    }

    pub fn mode(&self) -> CursorMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: CursorMode) {
        self.mode = mode;
    }

    pub fn camera(&self) -> &Camera2D {
        &self.camera
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn flip(&self) -> BrickFlip {
        self.flip
    }

    pub fn status_message(&self) -> Option<&str> {
        (self.status.timer > 0.0).then_some(self.status.message.as_str())
    }

    pub fn show_status(&mut self, message: impl Into<String>) {
        self.status.show(message);
    }

    /// World position under the mouse, snapped to the grid.
    pub fn cursor(&self) -> Vec2 {
        self.grid.snap(self.cursor)
    }

    /// Labels of what the palette offers in the current mode.
    pub fn palette_entries(&self) -> Vec<String> {
        match self.mode {
            CursorMode::Brick => self.bricks.entries.iter().map(|id| format!("brick {id}")).collect(),
            CursorMode::Item => self.items.entries.iter().map(|k| item_name(*k)).collect(),
            CursorMode::Enemy => self.objects.entries.clone(),
            CursorMode::Group => self.groups.as_ref().map_or_else(Vec::new, |g| {
                g.groups
                    .iter()
                    .enumerate()
                    .map(|(i, group)| {
                        if group.name.is_empty() {
                            format!("group {i}")
                        } else {
                            group.name.clone()
                        }
                    })
                    .collect()
            }),
            CursorMode::SsObj => self.entities.entries.clone(),
        }
    }

    /// Palette choice. Returns false when `index` is out of range.
    pub fn select(&mut self, index: usize) -> bool {
        match self.mode {
            CursorMode::Brick => self.bricks.select(index),
            CursorMode::Item => self.items.select(index),
            CursorMode::Enemy => self.objects.select(index),
            CursorMode::SsObj => self.entities.select(index),
            CursorMode::Group => {
                let ok = self.groups.as_ref().is_some_and(|g| index < g.len());
                if ok {
                    self.group_index = index;
                }
                ok
            }
        }
    }

    /// What a put would place, or None when the current mode has nothing.
    pub fn current_object(&self) -> Option<EditorObject> {
        match self.mode {
            CursorMode::Brick => self.bricks.current().map(|id| EditorObject::Brick {
                id: *id,
                layer: self.layer,
                flip: self.flip,
            }),
            CursorMode::Item => self.items.current().map(|kind| EditorObject::Item { kind: *kind }),
            CursorMode::Enemy => self
                .objects
                .current()
                .map(|name| EditorObject::Object { name: name.clone() }),
            CursorMode::SsObj => self.entities.current().map(|class| EditorObject::Entity {
                class: class.clone(),
                id: None,
            }),
            CursorMode::Group => None,
        }
    }

    fn step_entity(&mut self, forward: bool) {
        match self.mode {
            CursorMode::Brick => self.bricks.step(forward),
            CursorMode::Item => self.items.step(forward),
            CursorMode::Enemy => self.objects.step(forward),
            CursorMode::SsObj => self.entities.step(forward),
            CursorMode::Group => {
                let n = self.groups.as_ref().map_or(0, |g| g.len());
                if n > 0 {
                    self.group_index = if forward {
                        (self.group_index + 1) % n
                    } else {
                        (self.group_index + n - 1) % n
                    };
                }
            }
        }
    }

    fn step_category(&mut self, forward: bool) {
        self.categories.step(forward);
        let category = self.categories.current().cloned().unwrap_or_default();
        let names = self
            .all_objects
            .iter()
            .filter(|n| in_category(n, &category))
            .cloned()
            .collect();
        self.objects = Selection::new(names);
        self.status.show(format!("Category: {category}"));
    }

    /// Commits and applies actions as one undo step.
    pub fn commit(&mut self, level: &mut Level, vm: &ScriptVm, actions: Vec<EditorAction>) {
        if actions.is_empty() {
            return;
        }
        self.log.commit_group(actions.clone());
        for action in &actions {
            if let Some(resolved) = apply_action(level, vm, action) {
                self.log.amend_applied(action, resolved);
            }
        }
        level.entities_mut().remove_dead();
        self.modified = true;
    }

    pub fn undo(&mut self, level: &mut Level, vm: &ScriptVm) -> bool {
        let actions = self.log.undo();
        self.replay(level, vm, &actions)
    }

    pub fn redo(&mut self, level: &mut Level, vm: &ScriptVm) -> bool {
        let actions = self.log.redo();
        for action in &actions {
            if let Some(resolved) = apply_action(level, vm, action) {
                self.log.amend_applied(action, resolved);
            }
        }
        level.entities_mut().remove_dead();
        self.modified |= !actions.is_empty();
        !actions.is_empty()
    }

    fn replay(&mut self, level: &mut Level, vm: &ScriptVm, actions: &[EditorAction]) -> bool {
        for action in actions {
            // an undone deletion brings the entity back under a maybe new id;
            // the log has to remember it for the next redo of the deletion
            if let Some(EditorAction::NewObject { object, position }) = apply_action(level, vm, action) {
                let old = action.inverse();
                let new = EditorAction::DeleteObject { object, position };
                self.log.amend_undone(&old, new);
            }
        }
        level.entities_mut().remove_dead();
        self.modified |= !actions.is_empty();
        !actions.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.log.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.log.can_redo()
    }

    fn put(&mut self, level: &mut Level, vm: &ScriptVm) {
        let position = self.cursor();
        if self.mode == CursorMode::Group {
            let Some(group) = self.groups.as_ref().and_then(|g| g.get(self.group_index)) else {
                self.status.show("No brick groups");
                return;
            };
            let actions = group.actions(position);
            self.commit(level, vm, actions);
            return;
        }
        match self.current_object() {
            Some(object) => self.commit(level, vm, vec![EditorAction::NewObject { object, position }]),
            None => self.status.show(format!("Nothing to place in {} mode", self.mode.name())),
        }
    }

    fn pick(&mut self, level: &Level, vm: &ScriptVm) -> Option<EditorAction> {
        let cursor = self.cursor;
        let picked = match self.mode {
            CursorMode::Brick | CursorMode::Group => picking::pick_brick(level, cursor).map(|p| (p.object, p.position)),
            CursorMode::Item => picking::pick_item(level, cursor).map(|p| (p.object, p.position)),
            CursorMode::Enemy => picking::pick_object(level, cursor).map(|p| (p.object, p.position)),
            CursorMode::SsObj => picking::pick_entity(vm, cursor).map(|p| (p.object, p.position)),
        };
        picked.map(|(object, position)| EditorAction::DeleteObject { object, position })
    }

    /// Selects the picked object so that the next put places a copy.
    fn pick_into_cursor(&mut self, level: &Level, vm: &ScriptVm) {
        let Some(EditorAction::DeleteObject { object, .. }) = self.pick(level, vm) else {
            return;
        };
        match &object {
            EditorObject::Brick { id, layer, flip } => {
                if let Some(i) = self.bricks.entries.iter().position(|b| b == id) {
                    self.mode = CursorMode::Brick;
                    self.bricks.index = i;
                    self.layer = *layer;
                    self.flip = *flip;
                }
            }
            EditorObject::Item { kind } => {
                self.mode = CursorMode::Item;
                self.items.select(*kind as usize);
            }
            EditorObject::Object { name } => {
                if let Some(i) = self.objects.entries.iter().position(|n| n == name) {
                    self.mode = CursorMode::Enemy;
                    self.objects.index = i;
                }
            }
            EditorObject::Entity { class, .. } => {
                if let Some(i) = self.entities.entries.iter().position(|c| c == class) {
                    self.mode = CursorMode::SsObj;
                    self.entities.index = i;
                }
            }
        }
        self.status.show(format!("Picked {}", object.label()));
    }

    fn delete_under_cursor(&mut self, level: &mut Level, vm: &ScriptVm) -> bool {
        match self.pick(level, vm) {
            Some(action) => {
                self.commit(level, vm, vec![action]);
                true
            }
            None => false,
        }
    }

    /// Saves the level. A refusal plays the deny sound and leaves the
    /// `modified` flag alone.
    pub fn save(&mut self, level: &Level, vm: &ScriptVm, audio: &mut dyn Audio) -> bool {
        if level.is_readonly() {
            audio.play_sample(DENY_SAMPLE);
            self.status.show("This level is read-only and can't be saved");
            return false;
        }
        match level.save(vm) {
            Ok(()) => {
                audio.play_sample(SAVE_SAMPLE);
                self.modified = false;
                self.status.show(format!("Saved {}", level.path().display()));
                true
            }
            Err(e) => {
                log::warn!("{e}");
                audio.play_sample(DENY_SAMPLE);
                self.status.show("Can't save the level");
                false
            }
        }
    }

    fn scroll(&mut self, input: &InputState, dt: f32) {
        let mut direction = Vec2::ZERO;
        if input.is_held(Key::Left) || input.is_held(Key::A) {
            direction.x -= 1.0;
        }
        if input.is_held(Key::Right) || input.is_held(Key::D) {
            direction.x += 1.0;
        }
        if input.is_held(Key::Up) || input.is_held(Key::W) {
            direction.y -= 1.0;
        }
        if input.is_held(Key::Down) || input.is_held(Key::S) {
            direction.y += 1.0;
        }
        if direction.length() > EPSILON {
            let speed = if input.is_held(Key::LShift) { SCROLL_SPEED_FAST } else { SCROLL_SPEED };
            self.camera.position += direction.normalize() * speed * dt;
        }
        self.camera.position = self.camera.position.max(self.camera.viewport * 0.5);
    }

    /// Runs one editor frame.
    pub fn update(
        &mut self,
        level: &mut Level,
        vm: &ScriptVm,
        input: &InputState,
        audio: &mut dyn Audio,
        dt: f32,
    ) -> EditorOutcome {
        self.status.update(dt);
        if !input.is_held(Key::LCtrl) {
            self.scroll(input, dt);
        }
        self.cursor = self.camera.screen_to_world(input.mouse_position);

        for command in commands(input) {
            match command {
                EditorCommand::NextClass => {
                    self.mode = self.mode.next();
                    self.status.show(format!("Mode: {}", self.mode.name()));
                }
                EditorCommand::PreviousClass => {
                    self.mode = self.mode.previous();
                    self.status.show(format!("Mode: {}", self.mode.name()));
                }
                EditorCommand::NextEntity => self.step_entity(true),
                EditorCommand::PreviousEntity => self.step_entity(false),
                EditorCommand::NextCategory => self.step_category(true),
                EditorCommand::PreviousCategory => self.step_category(false),
                EditorCommand::ChangeLayer => {
                    self.layer = self.layer.next();
                    self.status.show(format!("Layer: {}", self.layer.name()));
                }
                EditorCommand::ChangeFlip => {
                    self.flip = self.flip.next();
                    self.status.show(format!("Flip: {}", self.flip.name()));
                }
                EditorCommand::CycleGrid => {
                    self.grid.cycle();
                    self.status.show(format!("Grid: {}px", self.grid.size()));
                }
                EditorCommand::ToggleMasks => self.show_masks = !self.show_masks,
                EditorCommand::PutItem => self.put(level, vm),
                EditorCommand::PickItem => self.pick_into_cursor(level, vm),
                EditorCommand::DeleteItem | EditorCommand::EraseHeld => {
                    self.delete_under_cursor(level, vm);
                }
                EditorCommand::ChangeSpawn => {
                    let action = EditorAction::ChangeSpawn {
                        position: self.cursor(),
                        previous: level.spawn_point(),
                    };
                    self.commit(level, vm, vec![action]);
                }
                EditorCommand::ChangeWater | EditorCommand::RemoveWater => {
                    let new_level = (command == EditorCommand::ChangeWater).then(|| self.cursor().y as i32);
                    if new_level != level.waterlevel() {
                        let action = EditorAction::ChangeWater {
                            level: new_level,
                            previous: level.waterlevel(),
                        };
                        self.commit(level, vm, vec![action]);
                    }
                }
                EditorCommand::Undo => {
                    if !self.undo(level, vm) {
                        self.status.show("Nothing to undo");
                    }
                }
                EditorCommand::Redo => {
                    if !self.redo(level, vm) {
                        self.status.show("Nothing to redo");
                    }
                }
                EditorCommand::Save => {
                    self.save(level, vm, audio);
                }
                EditorCommand::Reload => return EditorOutcome::Reload,
                EditorCommand::Help => return EditorOutcome::OpenHelp,
                EditorCommand::Palette => return EditorOutcome::OpenPalette,
                EditorCommand::Quit => {
                    return if self.modified {
                        EditorOutcome::ConfirmQuit
                    } else {
                        EditorOutcome::Quit
                    };
                }
            }
        }
        EditorOutcome::Continue
    }

    pub fn render(&self, level: &mut Level, vm: &ScriptVm, renderer: &mut dyn Renderer) {
        let options = RenderOptions {
            editing: true,
            show_masks: self.show_masks,
        };
        level.render_from(renderer, vm, &self.camera, options);

        let top_left = self.camera.top_left();
        self.grid.render(renderer, top_left);
        self.render_gizmos(level, renderer, top_left);
        self.render_cursor(level, renderer, top_left);
        self.render_bars(level, renderer);
    }

    fn render_gizmos(&self, level: &Level, renderer: &mut dyn Renderer, top_left: Vec2) {
        let spawn = level.spawn_point() - top_left;
        renderer.rect(spawn - Vec2::splat(8.0), Vec2::splat(16.0), Color::YELLOW, false);
        renderer.text("spawn", spawn + Vec2::new(-12.0, 10.0), Color::YELLOW);

        if let Some(waterlevel) = level.waterlevel() {
            let y = waterlevel as f32 - top_left.y;
            let color = level.watercolor();
            renderer.line(Vec2::new(0.0, y), Vec2::new(SCREEN_WIDTH as f32, y), Color::rgb(color.r, color.g, color.b));
        }
    }

    fn render_cursor(&self, level: &Level, renderer: &mut dyn Renderer, top_left: Vec2) {
        let position = self.cursor();
        match self.mode {
            CursorMode::Brick => {
                if let Some(template) = self.bricks.current().and_then(|id| level.brickset().get(*id)) {
                    let brick = Brick::new(
                        Arc::clone(template),
                        position.x as i32,
                        position.y as i32,
                        self.layer,
                        self.flip,
                    );
                    brick.render(renderer, top_left, true);
                }
            }
            CursorMode::Item => {
                if let Some(kind) = self.items.current() {
                    Item::new(*kind, position).render(renderer, top_left, true);
                }
            }
            CursorMode::Enemy => {
                if let Some(name) = self.objects.current() {
                    LegacyObject::new(name, position).render(renderer, top_left);
                }
            }
            CursorMode::Group => {
                let group = self.groups.as_ref().and_then(|g| g.get(self.group_index));
                for brick in group.map(|g| g.bricks.as_slice()).unwrap_or_default() {
                    if let Some(template) = level.brickset().get(brick.id) {
                        let at = position + Vec2::new(brick.dx as f32, brick.dy as f32);
                        Brick::new(Arc::clone(template), at.x as i32, at.y as i32, brick.layer(), brick.flip())
                            .render(renderer, top_left, true);
                    }
                }
            }
            CursorMode::SsObj => {
                let screen = position - top_left;
                renderer.rect(screen - Vec2::splat(4.0), Vec2::splat(8.0), Color::GREEN, false);
            }
        }
        let screen = position - top_left;
        renderer.line(screen - Vec2::new(4.0, 0.0), screen + Vec2::new(4.0, 0.0), Color::WHITE);
        renderer.line(screen - Vec2::new(0.0, 4.0), screen + Vec2::new(0.0, 4.0), Color::WHITE);
    }

    fn render_bars(&self, level: &Level, renderer: &mut dyn Renderer) {
        let width = SCREEN_WIDTH as f32;
        renderer.rect(Vec2::ZERO, Vec2::new(width, BAR_HEIGHT), Color::rgba(0, 0, 0, 160), true);
        let selection = match self.mode {
            CursorMode::Group => format!("group {}", self.group_index),
            _ => self.current_object().map_or_else(|| "-".to_string(), |o| o.label()),
        };
        let cursor = self.cursor();
        let properties = format!(
            "{} | {} | layer {} | {} | grid {} | {:.0},{:.0}{}",
            self.mode.name(),
            selection,
            self.layer.name(),
            self.flip.name(),
            self.grid.size(),
            cursor.x,
            cursor.y,
            if self.modified { " *" } else { "" }
        );
        renderer.text(&properties, Vec2::new(4.0, 4.0), Color::WHITE);
        renderer.text(level.name(), Vec2::new(4.0, 14.0), Color::rgb(160, 160, 160));

        if let Some(message) = self.status_message() {
            let alpha = (self.status.alpha() * 255.0) as u8;
            let y = SCREEN_HEIGHT as f32 - BAR_HEIGHT;
            renderer.rect(Vec2::new(0.0, y), Vec2::new(width, BAR_HEIGHT), Color::rgba(0, 0, 0, alpha / 2), true);
            renderer.text(message, Vec2::new(4.0, y + 8.0), Color::rgba(255, 255, 255, alpha));
        }
    }
}

fn near(a: Vec2, b: Vec2) -> bool {
    a.distance(b) < EPSILON
}

/// Applies one action to the level. For a scripted entity brought (back) to
/// life, returns the action rewritten with the id the entity ended up with.
pub fn apply_action(level: &mut Level, vm: &ScriptVm, action: &EditorAction) -> Option<EditorAction> {
    match action {
        EditorAction::NewObject { object, position } => create_object(level, vm, object, *position),
        EditorAction::DeleteObject { object, position } => {
            delete_object(level, vm, object, *position);
            None
        }
        EditorAction::ChangeSpawn { position, .. } => {
            move_spawn_point(level, *position);
            None
        }
        EditorAction::RestoreSpawn { previous, .. } => {
            move_spawn_point(level, *previous);
            None
        }
        EditorAction::ChangeWater { level: water, .. } => {
            level.set_waterlevel(*water);
            None
        }
        EditorAction::RestoreWater { previous, .. } => {
            level.set_waterlevel(*previous);
            None
        }
    }
}

fn move_spawn_point(level: &mut Level, position: Vec2) {
    level.set_spawn_point(position);
    for player in level.players_mut() {
        player.set_position(position);
    }
}

fn create_object(level: &mut Level, vm: &ScriptVm, object: &EditorObject, position: Vec2) -> Option<EditorAction> {
    match object {
        EditorObject::Brick { id, layer, flip } => {
            if level.add_brick(*id, position, *layer, *flip).is_none() {
                log::warn!("Editor: can't place invalid brick {id}");
            }
            level.refresh_level_size();
            None
        }
        EditorObject::Item { kind } => {
            level.add_item(*kind, position);
            None
        }
        EditorObject::Object { name } => {
            level.add_object(name, position);
            None
        }
        EditorObject::Entity { class, id } => {
            let handle = match level.level_object().restore_entity(vm, class, position, *id) {
                Ok(handle) => handle,
                Err(e) => {
                    log::warn!("Editor: can't place {class}: {e}");
                    return None;
                }
            };
            let world = vm.world();
            let info = world.entity_info(handle)?;
            (Some(info.id) != *id).then(|| EditorAction::NewObject {
                object: EditorObject::Entity {
                    class: class.clone(),
                    id: Some(info.id),
                },
                position,
            })
        }
    }
}

/// Removes one object matching `object` at `position`. Several identical
/// objects stacked on the same spot take one deletion each.
fn delete_object(level: &mut Level, vm: &ScriptVm, object: &EditorObject, position: Vec2) {
    let entities = level.entities_mut();
    let found = match object {
        EditorObject::Brick { id, .. } => {
            let key = entities
                .bricks
                .iter()
                .find(|(_, b)| {
                    let (x, y) = b.spawn_point();
                    b.is_alive() && b.id() == *id && near(Vec2::new(x as f32, y as f32), position)
                })
                .map(|(key, _)| key);
            let found = key.and_then(|key| entities.bricks.get_mut(key)).map(Brick::kill).is_some();
            level.refresh_level_size();
            found
        }
        EditorObject::Item { kind } => {
            let key = entities
                .items
                .iter()
                .find(|(_, i)| !i.is_dead() && i.kind() == *kind && near(i.spawn_point(), position))
                .map(|(key, _)| key);
            key.and_then(|key| entities.items.get_mut(key)).map(Item::kill).is_some()
        }
        EditorObject::Object { name } => {
            let key = entities
                .objects
                .iter()
                .find(|(_, o)| !o.is_dead() && o.name == *name && near(o.spawn_point(), position))
                .map(|(key, _)| key);
            key.and_then(|key| entities.objects.get_mut(key)).map(LegacyObject::kill).is_some()
        }
        EditorObject::Entity { class, id } => {
            let doomed = {
                let world = vm.world();
                let candidates: Vec<(Handle, u64)> = world
                    .graph
                    .iter()
                    .filter(|(h, o)| !o.killed && o.name == *class && near(world.graph.world_position(*h), position))
                    .filter_map(|(h, o)| o.entity.map(|info| (h, info.id)))
                    .collect();
                candidates
                    .iter()
                    .find(|(_, entity_id)| Some(*entity_id) == *id)
                    .or(candidates.first())
                    .map(|(h, _)| *h)
            };
            doomed.map(|handle| vm.kill(handle)).is_some()
        }
    };
    if !found {
        log::warn!("Editor: no {} at {position} to delete", object.label());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::brick::tests::template;
    use crate::level::brick::{BrickBehavior, BrickType, Brickset};
    use crate::level::lev::parse_level;
    use proptest::prelude::*;
    use std::path::Path;

    const SCRIPTS: &str = r#"class("Tree", { tags = { "entity" } }, {
        init = function(self)
            self:set("sprite", "tree")
            self:set("width", 32)
            self:set("height", 32)
        end,
    })"#;

    fn vm() -> ScriptVm {
        let mut vm = ScriptVm::new().expect("vm");
        vm.load_source("editor", SCRIPTS).expect("scripts");
        vm
    }

    fn level(vm: &ScriptVm) -> Level {
        let brickset = Brickset::from_templates(vec![
            template(1, BrickType::Solid, BrickBehavior::Default, &[]),
            template(2, BrickType::Cloud, BrickBehavior::Default, &[]),
        ]);
        let path = Path::new("editor.lev");
        let file = parse_level("theme \"t\"\nspawn_point 10 10\nbrick 1 0 256\n", path).expect("parses");
        Level::from_file(path, file, Arc::new(brickset), None, vm, None).expect("level")
    }

    /// Everything the editor can change, in a comparable form.
    fn snapshot(level: &Level, vm: &ScriptVm) -> (Vec<String>, Vec2, Option<i32>) {
        let mut things: Vec<String> = Vec::new();
        for (_, b) in level.entities().bricks.iter().filter(|(_, b)| b.is_alive()) {
            let (x, y) = b.spawn_point();
            things.push(format!("brick {} {x} {y} {:?} {:?}", b.id(), b.layer(), b.flip()));
        }
        for (_, i) in level.entities().items.iter().filter(|(_, i)| !i.is_dead()) {
            things.push(format!("item {} {}", i.kind(), i.spawn_point()));
        }
        for (_, o) in level.entities().objects.iter().filter(|(_, o)| !o.is_dead()) {
            things.push(format!("object {} {}", o.name, o.spawn_point()));
        }
        let world = vm.world();
        for (h, o) in world.graph.iter().filter(|(_, o)| !o.killed && o.entity.is_some()) {
            things.push(format!("entity {} {}", o.name, world.graph.world_position(h)));
        }
        things.sort();
        (things, level.spawn_point(), level.waterlevel())
    }

    fn brick() -> EditorObject {
        EditorObject::Brick {
            id: 1,
            layer: Layer::Default,
            flip: BrickFlip::NoFlip,
        }
    }

    #[test]
    fn cursor_modes_cycle_both_ways() {
        let mut mode = CursorMode::Brick;
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(mode);
            mode = mode.next();
        }
        assert_eq!(seen, CursorMode::ALL);
        assert_eq!(CursorMode::Brick.previous(), CursorMode::SsObj);
    }

    #[test]
    fn key_bindings_map_to_commands() {
        let mut input = InputState::new();
        input.key_down(Key::LCtrl);
        input.key_down(Key::Z);
        assert_eq!(commands(&input), vec![EditorCommand::Undo]);

        let mut input = InputState::new();
        input.key_down(Key::LShift);
        input.key_down(Key::Tab);
        input.mouse_down(MouseBtn::Right);
        assert_eq!(
            commands(&input),
            vec![EditorCommand::PreviousClass, EditorCommand::EraseHeld]
        );
    }

    #[test]
    fn undo_of_paint_then_delete() {
        let vm = vm();
        let mut level = level(&vm);
        let mut editor = Editor::enter(&level, &vm, None);
        let before = snapshot(&level, &vm);
        let at = Vec2::new(64.0, 128.0);

        editor.commit(&mut level, &vm, vec![EditorAction::NewObject { object: brick(), position: at }]);
        let painted = snapshot(&level, &vm);
        assert_eq!(painted.0.len(), before.0.len() + 1);
        editor.commit(&mut level, &vm, vec![EditorAction::DeleteObject { object: brick(), position: at }]);
        let deleted = snapshot(&level, &vm);
        assert_eq!(deleted, before);

        assert!(editor.undo(&mut level, &vm));
        assert_eq!(snapshot(&level, &vm), painted);
        assert!(editor.undo(&mut level, &vm));
        assert_eq!(snapshot(&level, &vm), before);
        assert!(!editor.undo(&mut level, &vm));

        assert!(editor.redo(&mut level, &vm));
        assert!(editor.redo(&mut level, &vm));
        assert_eq!(snapshot(&level, &vm), deleted);
        assert!(editor.is_modified());
    }

    #[test]
    fn deleted_entities_come_back_with_their_id() {
        let vm = vm();
        let mut level = level(&vm);
        let mut editor = Editor::enter(&level, &vm, None);
        let at = Vec2::new(100.0, 100.0);
        let placed = EditorObject::Entity {
            class: "Tree".to_string(),
            id: Some(0x0123456789abcdef),
        };
        editor.commit(&mut level, &vm, vec![EditorAction::NewObject { object: placed.clone(), position: at }]);
        assert!(!level.level_object().find_entity_by_id(&vm, 0x0123456789abcdef).is_null());

        editor.commit(&mut level, &vm, vec![EditorAction::DeleteObject { object: placed, position: at }]);
        vm.collect_garbage();
        assert!(level.level_object().find_entity_by_id(&vm, 0x0123456789abcdef).is_null());

        assert!(editor.undo(&mut level, &vm));
        let handle = level.level_object().find_entity_by_id(&vm, 0x0123456789abcdef);
        assert!(!handle.is_null());
        assert_eq!(vm.world().graph.world_position(handle), at);
    }

    #[test]
    fn fresh_entities_get_an_id_the_log_remembers() {
        let vm = vm();
        let mut level = level(&vm);
        let mut editor = Editor::enter(&level, &vm, None);
        editor.set_mode(CursorMode::SsObj);
        let object = editor.current_object().expect("Tree is placeable");
        editor.commit(&mut level, &vm, vec![EditorAction::NewObject { object, position: Vec2::new(50.0, 50.0) }]);

        let id = {
            let world = vm.world();
            let (_, tree) = world
                .graph
                .iter()
                .find(|(_, o)| o.name == "Tree" && !o.killed)
                .expect("tree spawned");
            tree.entity.expect("entity info").id
        };
        assert_ne!(id, 0);

        assert!(editor.undo(&mut level, &vm));
        vm.collect_garbage();
        assert!(editor.redo(&mut level, &vm));
        assert!(!level.level_object().find_entity_by_id(&vm, id).is_null());
    }

    #[test]
    fn spawn_and_water_changes_undo() {
        let vm = vm();
        let mut level = level(&vm);
        let mut editor = Editor::enter(&level, &vm, None);
        let previous = level.spawn_point();
        editor.commit(
            &mut level,
            &vm,
            vec![
                EditorAction::ChangeSpawn {
                    position: Vec2::new(300.0, 40.0),
                    previous,
                },
                EditorAction::ChangeWater {
                    level: Some(500),
                    previous: None,
                },
            ],
        );
        assert_eq!(level.spawn_point(), Vec2::new(300.0, 40.0));
        assert_eq!(level.players()[0].position(), Vec2::new(300.0, 40.0));
        assert_eq!(level.waterlevel(), Some(500));

        assert!(editor.undo(&mut level, &vm));
        assert_eq!(level.spawn_point(), Vec2::new(10.0, 10.0));
        assert_eq!(level.waterlevel(), None);
    }

    #[test]
    fn readonly_levels_are_not_saved() {
        let vm = vm();
        let brickset = Brickset::from_templates(vec![template(1, BrickType::Solid, BrickBehavior::Default, &[])]);
        let path = Path::new("readonly.lev");
        let file = parse_level("theme \"t\"\nreadonly\n", path).expect("parses");
        let level = Level::from_file(path, file, Arc::new(brickset), None, &vm, None).expect("level");
        let mut editor = Editor::enter(&level, &vm, None);
        let mut audio = surge_platform::SilentAudio::new();

        assert!(!editor.save(&level, &vm, &mut audio));
        assert_eq!(audio.samples_played, vec![DENY_SAMPLE.to_string()]);
        assert!(editor.status_message().is_some_and(|m| m.contains("read-only")));
    }

    #[test]
    fn quitting_with_changes_asks_first() {
        let vm = vm();
        let mut level = level(&vm);
        let mut editor = Editor::enter(&level, &vm, None);
        let mut audio = surge_platform::SilentAudio::new();
        let mut input = InputState::new();
        input.key_down(Key::Escape);
        assert_eq!(editor.update(&mut level, &vm, &input, &mut audio, 0.016), EditorOutcome::Quit);

        editor.commit(&mut level, &vm, vec![EditorAction::ChangeWater { level: Some(1), previous: None }]);
        assert_eq!(
            editor.update(&mut level, &vm, &input, &mut audio, 0.016),
            EditorOutcome::ConfirmQuit
        );
    }

    #[test]
    fn legacy_object_categories_come_from_name_prefixes() {
        let names = vec!["enemies/bat".to_string(), "props/box".to_string(), "enemies/crab".to_string()];
        assert_eq!(object_categories(&names), vec!["*", "enemies", "props"]);
        assert!(in_category("enemies/bat", "enemies"));
        assert!(in_category("props/box", "*"));
        assert!(!in_category("props/box", "enemies"));
    }

    fn op() -> impl Strategy<Value = (u8, i16, i16)> {
        (0u8..4, 0i16..20, 0i16..20)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn undo_then_redo_restores_the_committed_state(
            ops in proptest::collection::vec(op(), 1..10),
            k in 0usize..10,
        ) {
            let vm = vm();
            let mut level = level(&vm);
            let mut editor = Editor::enter(&level, &vm, None);
            for (kind, x, y) in ops.iter().copied() {
                let position = Vec2::new(x as f32 * 16.0, y as f32 * 16.0);
                let action = match kind {
                    0 => EditorAction::NewObject { object: brick(), position },
                    1 => EditorAction::NewObject { object: EditorObject::Item { kind: 0 }, position },
                    2 => EditorAction::ChangeSpawn { position, previous: level.spawn_point() },
                    _ => EditorAction::ChangeWater { level: Some(y as i32 * 16), previous: level.waterlevel() },
                };
                editor.commit(&mut level, &vm, vec![action]);
            }
            let committed = snapshot(&level, &vm);
            let k = k.min(ops.len());
            for _ in 0..k {
                prop_assert!(editor.undo(&mut level, &vm));
            }
            for _ in 0..k {
                prop_assert!(editor.redo(&mut level, &vm));
            }
            prop_assert_eq!(snapshot(&level, &vm), committed);
        }
    }
}
