//! State shared by every scene.
//!
//! Scenes can't reach the scene stack while they run, so they post
//! [`SceneRequest`]s here; the engine applies them once the current event
//! handler returns, in the order they were posted.

use std::path::PathBuf;

use surge_core::{Button, InputState, Preferences, Timer};
use surge_platform::{Audio, Renderer};

use crate::cli::CommandLine;
use crate::level::player::PlayerInput;
use crate::level::LevelState;
use crate::resource::ResourceManager;
use crate::scripting::ScriptVm;
use crate::storyboard::SceneKind;

/// Argument handed to `Scene::init`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SceneArg {
    #[default]
    None,
    /// A quest or level file, relative to the game folder.
    Path(PathBuf),
    Level(LevelArg),
    Confirm {
        text: String,
        options: Vec<String>,
    },
    Palette {
        title: String,
        entries: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelArg {
    pub path: PathBuf,
    pub state: Option<LevelState>,
    /// Open the editor as soon as the level is up.
    pub editing: bool,
}

impl LevelArg {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: None,
            editing: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneRequest {
    Push(SceneKind, SceneArg),
    Pop,
}

/// What a modal scene hands back to the scene below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneResult {
    /// 1-based option of a confirm box.
    Confirm(usize),
    /// Palette entry, or None when the palette was dismissed.
    Palette(Option<usize>),
}

pub struct GameContext {
    pub input: InputState,
    pub renderer: Box<dyn Renderer>,
    pub audio: Box<dyn Audio>,
    pub prefs: Preferences,
    pub resources: ResourceManager,
    pub vm: ScriptVm,
    pub timer: Timer,
    pub command_line: CommandLine,
    requests: Vec<SceneRequest>,
    result: Option<SceneResult>,
    quest_aborted: bool,
    quit_requested: bool,
    restart_requested: bool,
    fatal_error: Option<String>,
}

impl GameContext {
    pub fn new(
        renderer: Box<dyn Renderer>,
        audio: Box<dyn Audio>,
        prefs: Preferences,
        resources: ResourceManager,
        vm: ScriptVm,
        command_line: CommandLine,
    ) -> Self {
        Self {
            input: InputState::new(),
            renderer,
            audio,
            prefs,
            resources,
            vm,
            timer: Timer::new(),
            command_line,
            requests: Vec::new(),
            result: None,
            quest_aborted: false,
            quit_requested: false,
            restart_requested: false,
            fatal_error: None,
        }
    }

    pub fn push_scene(&mut self, kind: SceneKind, arg: SceneArg) {
        self.requests.push(SceneRequest::Push(kind, arg));
    }

    pub fn pop_scene(&mut self) {
        self.requests.push(SceneRequest::Pop);
    }

    pub fn take_requests(&mut self) -> Vec<SceneRequest> {
        std::mem::take(&mut self.requests)
    }

    pub fn has_requests(&self) -> bool {
        !self.requests.is_empty()
    }

    pub fn set_result(&mut self, result: SceneResult) {
        self.result = Some(result);
    }

    pub fn take_result(&mut self) -> Option<SceneResult> {
        self.result.take()
    }

    /// Makes the running quest give up at its next update.
    pub fn abort_quest(&mut self) {
        self.quest_aborted = true;
    }

    pub fn take_quest_abort(&mut self) -> bool {
        std::mem::take(&mut self.quest_aborted)
    }

    pub fn request_quit(&mut self) {
        self.quit_requested = true;
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn request_restart(&mut self) {
        self.restart_requested = true;
        self.quit_requested = true;
    }

    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    /// Stops the game with an error the user gets to see.
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::error!("{message}");
        self.fatal_error.get_or_insert(message);
        self.quit_requested = true;
    }

    pub fn fatal_error(&self) -> Option<&str> {
        self.fatal_error.as_deref()
    }

    /// Seconds covered by the current tick.
    pub fn dt(&self) -> f32 {
        self.timer.delta()
    }

    pub fn player_input(&self) -> PlayerInput {
        PlayerInput {
            left: self.input.button_down(Button::Left),
            right: self.input.button_down(Button::Right),
            down: self.input.button_down(Button::Down),
            jump: self.input.button_pressed(Button::Fire1),
        }
    }

    /// A context with no window, no sound and in-memory preferences.
    pub fn headless(root: &std::path::Path) -> Result<Self, String> {
        Ok(Self::new(
            Box::new(surge_platform::RecordingRenderer::new()),
            Box::new(surge_platform::SilentAudio::new()),
            Preferences::in_memory(),
            ResourceManager::new(root),
            ScriptVm::new()?,
            CommandLine::default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn requests_come_out_in_order() {
        let mut ctx = GameContext::headless(Path::new(".")).expect("context");
        ctx.pop_scene();
        ctx.push_scene(SceneKind::GameOver, SceneArg::None);
        assert_eq!(
            ctx.take_requests(),
            vec![SceneRequest::Pop, SceneRequest::Push(SceneKind::GameOver, SceneArg::None)]
        );
        assert!(!ctx.has_requests());
    }

    #[test]
    fn results_and_flags_are_taken_once() {
        let mut ctx = GameContext::headless(Path::new(".")).expect("context");
        ctx.set_result(SceneResult::Confirm(2));
        assert_eq!(ctx.take_result(), Some(SceneResult::Confirm(2)));
        assert_eq!(ctx.take_result(), None);
        ctx.abort_quest();
        assert!(ctx.take_quest_abort());
        assert!(!ctx.take_quest_abort());
    }

    #[test]
    fn the_first_fatal_error_sticks() {
        let mut ctx = GameContext::headless(Path::new(".")).expect("context");
        ctx.fail("first");
        ctx.fail("second");
        assert_eq!(ctx.fatal_error(), Some("first"));
        assert!(ctx.quit_requested());
        assert!(!ctx.restart_requested());
    }
}
