//! The level scene: runs a [`Level`] and, on request, the editor on top of it.

use std::path::PathBuf;
use std::sync::Arc;

use glam::Vec2;
use surge_core::{Button, Color, Key, Scene};
use surge_platform::video::{SCREEN_HEIGHT, SCREEN_WIDTH};

use crate::context::{GameContext, LevelArg, SceneArg, SceneResult};
use crate::editor::groups::{load_groups_from_path, GroupSet};
use crate::editor::{Editor, EditorOutcome, DENY_SAMPLE};
use crate::level::{Level, LevelSignal, RenderOptions};
use crate::storyboard::SceneKind;

const NO_WAY_DURATION: f32 = 1.5;

/// A modal scene the level is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Waiting {
    Nothing,
    Palette,
    ConfirmQuit,
}

pub struct LevelScene {
    path: PathBuf,
    level: Option<Level>,
    editor: Option<Editor>,
    waiting: Waiting,
    no_way_timer: f32,
}

impl LevelScene {
    pub fn new() -> Self {
        Self {
            path: PathBuf::new(),
            level: None,
            editor: None,
            waiting: Waiting::Nothing,
            no_way_timer: 0.0,
        }
    }

    pub fn level(&self) -> Option<&Level> {
        self.level.as_ref()
    }

    pub fn is_editing(&self) -> bool {
        self.editor.is_some()
    }

    fn replace_with(&self, ctx: &mut GameContext, arg: LevelArg) {
        ctx.pop_scene();
        ctx.push_scene(SceneKind::Level, SceneArg::Level(arg));
    }

    /// Opens the editor unless the level is read-only.
    pub fn enter_editor(&mut self, ctx: &mut GameContext) {
        let Some(level) = self.level.as_mut() else {
            return;
        };
        if level.is_readonly() {
            ctx.audio.play_sample(DENY_SAMPLE);
            self.no_way_timer = NO_WAY_DURATION;
            log::info!("Level {} is read-only; the editor stays closed", level.path().display());
            return;
        }
        let groups = load_groups(ctx, level);
        ctx.audio.suspend();
        self.editor = Some(Editor::enter(level, &ctx.vm, groups));
    }

    fn leave_editor(&mut self, ctx: &mut GameContext) {
        if let Some(level) = self.level.as_mut() {
            level.refresh_level_size();
            let spawn_point = level.spawn_point();
            level.camera_mut().set_position(spawn_point);
        }
        self.editor = None;
        self.waiting = Waiting::Nothing;
        ctx.audio.resume();
        log::info!("Leaving the editor");
    }

    fn update_editor(&mut self, ctx: &mut GameContext) {
        let (Some(level), Some(editor)) = (self.level.as_mut(), self.editor.as_mut()) else {
            return;
        };

        match (self.waiting, ctx.take_result()) {
            (Waiting::Palette, Some(SceneResult::Palette(choice))) => {
                if let Some(index) = choice {
                    editor.select(index);
                }
                self.waiting = Waiting::Nothing;
            }
            (Waiting::ConfirmQuit, Some(SceneResult::Confirm(option))) => {
                self.waiting = Waiting::Nothing;
                if option == 1 {
                    self.leave_editor(ctx);
                    return;
                }
            }
            (Waiting::Nothing, _) => {}
            (_, _) => self.waiting = Waiting::Nothing,
        }

        let dt = ctx.dt();
        match editor.update(level, &ctx.vm, &ctx.input, ctx.audio.as_mut(), dt) {
            EditorOutcome::Continue => {}
            EditorOutcome::Quit => self.leave_editor(ctx),
            EditorOutcome::ConfirmQuit => {
                self.waiting = Waiting::ConfirmQuit;
                ctx.push_scene(
                    SceneKind::ConfirmBox,
                    SceneArg::Confirm {
                        text: "Quit without saving?".to_string(),
                        options: vec!["Quit".to_string(), "Cancel".to_string()],
                    },
                );
            }
            EditorOutcome::OpenPalette => {
                self.waiting = Waiting::Palette;
                let title = format!("Choose {}", editor.mode().name());
                let entries = editor.palette_entries();
                ctx.push_scene(SceneKind::EditorPal, SceneArg::Palette { title, entries });
            }
            EditorOutcome::OpenHelp => ctx.push_scene(SceneKind::EditorHelp, SceneArg::None),
            EditorOutcome::Reload => {
                log::info!("Reloading {}", self.path.display());
                self.replace_with(
                    ctx,
                    LevelArg {
                        path: self.path.clone(),
                        state: None,
                        editing: true,
                    },
                );
            }
        }
    }

    fn update_level(&mut self, ctx: &mut GameContext) {
        let Some(level) = self.level.as_mut() else {
            return;
        };
        let dt = ctx.dt();
        self.no_way_timer = (self.no_way_timer - dt).max(0.0);

        if ctx.input.is_just_pressed(Key::F12) {
            self.enter_editor(ctx);
            return;
        }
        if ctx.input.button_pressed(Button::Fire4) {
            ctx.push_scene(SceneKind::Pause, SceneArg::None);
            return;
        }

        let input = ctx.player_input();
        match level.update(&ctx.vm, ctx.audio.as_mut(), &input, dt) {
            LevelSignal::Continue => {}
            LevelSignal::Restart(state) => self.replace_with(
                ctx,
                LevelArg {
                    path: self.path.clone(),
                    state: Some(state),
                    editing: false,
                },
            ),
            LevelSignal::GameOver => {
                ctx.pop_scene();
                ctx.push_scene(SceneKind::GameOver, SceneArg::None);
            }
            LevelSignal::NextStage => ctx.pop_scene(),
            LevelSignal::Quit => ctx.request_quit(),
        }
    }
}

impl Default for LevelScene {
    fn default() -> Self {
        Self::new()
    }
}

fn load_groups(ctx: &mut GameContext, level: &Level) -> Option<Arc<GroupSet>> {
    if level.grouptheme().is_empty() {
        return None;
    }
    let brickset = level.brickset();
    let result = ctx.resources.groups(level.grouptheme(), |path| {
        let mut groups = load_groups_from_path(path)?;
        groups.retain_valid(brickset);
        Ok(groups)
    });
    match result {
        Ok(groups) => Some(groups),
        Err(e) => {
            log::warn!("{e}");
            None
        }
    }
}

impl Scene<GameContext, SceneArg> for LevelScene {
    fn init(&mut self, ctx: &mut GameContext, arg: SceneArg) {
        let arg = match arg {
            SceneArg::Level(arg) => arg,
            SceneArg::Path(path) => LevelArg::new(path),
            _ => {
                ctx.fail("The level scene needs the path of a level");
                return;
            }
        };
        self.path = arg.path.clone();
        let path = ctx.resources.resolve(&arg.path.to_string_lossy());
        match Level::load(&path, &mut ctx.resources, &ctx.vm, arg.state.as_ref()) {
            Ok(level) => {
                level.start_music(ctx.audio.as_mut());
                self.level = Some(level);
                if arg.editing {
                    self.enter_editor(ctx);
                }
            }
            Err(e) => ctx.fail(format!("Can't load level {}: {e}", path.display())),
        }
    }

    fn update(&mut self, ctx: &mut GameContext) {
        if self.editor.is_some() {
            self.update_editor(ctx);
        } else {
            self.update_level(ctx);
        }
    }

    fn render(&mut self, ctx: &mut GameContext) {
        let Some(level) = self.level.as_mut() else {
            return;
        };
        let renderer = ctx.renderer.as_mut();
        match &self.editor {
            Some(editor) => editor.render(level, &ctx.vm, renderer),
            None => level.render(renderer, &ctx.vm, RenderOptions::default()),
        }
        if self.no_way_timer > 0.0 {
            let center = Vec2::new(SCREEN_WIDTH as f32 / 2.0 - 20.0, SCREEN_HEIGHT as f32 / 2.0);
            renderer.text("No way!", center, Color::YELLOW);
        }
        if ctx.command_line.show_fps.unwrap_or(false) {
            let fps = format!("FPS: {:.0}", ctx.timer.smoothed_fps);
            renderer.text(&fps, Vec2::new(SCREEN_WIDTH as f32 - 60.0, 4.0), Color::WHITE);
        }
    }

    fn release(&mut self, ctx: &mut GameContext) {
        if let Some(level) = self.level.take() {
            level.release(&ctx.vm);
        }
        self.editor = None;
        ctx.audio.stop_music();
    }

    fn name(&self) -> &str {
        "level"
    }
}
