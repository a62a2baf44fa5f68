//! The main loop.
//!
//! Everything the game does happens in reaction to an [`Event`]. A timer
//! event runs one fixed-step update of the top scene; input events feed the
//! [`InputState`](surge_core::InputState); drawing-halt events pause the clock
//! and the sound. A frame is rendered only once the queue has been emptied,
//! and only if the top scene is still the one that was updated.
//!
//! Timer events pile up when a tick takes longer than its period. When one is
//! handled, the other timer events of the same source still in the queue are
//! dropped, so the game slows down instead of spiralling.

use std::path::{Path, PathBuf};
use std::thread;

use surge_core::{EventDispatcher, Preferences, SceneStack};
use surge_platform::{Audio, Event, EventKind, EventQueue, Renderer, TimerSource};

use crate::cli::CommandLine;
use crate::context::{GameContext, LevelArg, SceneArg, SceneRequest};
use crate::resource::ResourceManager;
use crate::scenes::menus::{LANGPATH_KEY, SHOWFPS_KEY};
use crate::scripting::ScriptVm;
use crate::storyboard::{SceneKind, Storyboard};

pub const GAME_TIMER: TimerSource = TimerSource(1);
pub const INTRO_QUEST: &str = "quests/intro.qst";
pub const PREFS_ID: &str = "opensurge";
const SCRIPTS_DIR: &str = "scripts";

/// Everything the event listeners can touch.
pub struct EngineState {
    pub ctx: GameContext,
    pub stack: SceneStack<GameContext, SceneArg>,
    timer_source: TimerSource,
    must_redraw: bool,
    is_active: bool,
    force_quit: bool,
    frames_rendered: u64,
}

impl EngineState {
    /// Runs the scene requests posted by the scenes, in order. Scenes pushed
    /// here may post requests of their own from `init`.
    fn apply_scene_requests(&mut self) {
        loop {
            let requests = self.ctx.take_requests();
            if requests.is_empty() {
                return;
            }
            for request in requests {
                match request {
                    SceneRequest::Push(kind, arg) => {
                        if let Err(e) = self.stack.push(Storyboard::create(kind), &mut self.ctx, arg) {
                            self.ctx.fail(e);
                        }
                    }
                    SceneRequest::Pop => {
                        if !self.stack.pop(&mut self.ctx) {
                            log::warn!("A scene asked to pop an empty scene stack");
                        }
                    }
                }
            }
        }
    }

    fn tick(&mut self) {
        let dt = self.ctx.timer.fixed_dt;
        self.ctx.timer.advance(dt);

        let top = self.stack.top_id();
        self.stack.update_top(&mut self.ctx);
        self.apply_scene_requests();
        self.must_redraw = top.is_some() && self.stack.top_id() == top;

        let now = self.ctx.timer.ticks();
        self.ctx.resources.maybe_collect_garbage(now);
        self.ctx.input.end_frame();
    }

    fn render(&mut self) {
        self.ctx.renderer.begin_frame();
        self.stack.render_top(&mut self.ctx);
        self.ctx.renderer.end_frame();
        self.frames_rendered += 1;
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineExit {
    pub restart: bool,
    pub error: Option<String>,
}

pub struct Engine<Q: EventQueue> {
    queue: Q,
    dispatcher: EventDispatcher<Event, EngineState>,
    state: EngineState,
}

impl<Q: EventQueue> Engine<Q> {
    pub fn new(ctx: GameContext, queue: Q) -> Self {
        let mut engine = Self {
            queue,
            dispatcher: EventDispatcher::new(),
            state: EngineState {
                ctx,
                stack: SceneStack::new(),
                timer_source: GAME_TIMER,
                must_redraw: false,
                is_active: true,
                force_quit: false,
                frames_rendered: 0,
            },
        };
        engine.add_listeners();
        engine
    }

    fn add_listeners(&mut self) {
        let d = &mut self.dispatcher;

        d.add_listener(EventKind::Timer, |state, event| {
            if let Event::Timer { source } = event {
                if *source == state.timer_source && state.is_active {
                    state.tick();
                }
            }
        });

        d.add_listener(EventKind::HaltDrawing, |state, _| {
            log::info!("Drawing halted");
            state.is_active = false;
            state.ctx.timer.pause();
            state.ctx.audio.suspend();
        });

        d.add_listener(EventKind::ResumeDrawing, |state, _| {
            log::info!("Drawing resumed");
            state.is_active = true;
            state.must_redraw = true;
            state.ctx.timer.resume();
            state.ctx.audio.resume();
        });

        d.add_listener(EventKind::DisplayClose, |state, _| {
            log::info!("The display was closed");
            state.force_quit = true;
        });

        d.add_listener(EventKind::KeyDown, |state, event| {
            if let Event::KeyDown(key) = event {
                state.ctx.input.key_down(*key);
            }
        });

        d.add_listener(EventKind::KeyUp, |state, event| {
            if let Event::KeyUp(key) = event {
                state.ctx.input.key_up(*key);
            }
        });

        d.add_listener(EventKind::MouseMove, |state, event| {
            if let Event::MouseMove(position) = event {
                state.ctx.input.mouse_position = *position;
            }
        });

        d.add_listener(EventKind::MouseDown, |state, event| {
            if let Event::MouseDown(button) = event {
                state.ctx.input.mouse_down(*button);
            }
        });

        d.add_listener(EventKind::MouseUp, |state, event| {
            if let Event::MouseUp(button) = event {
                state.ctx.input.mouse_up(*button);
            }
        });

        d.add_listener(EventKind::Resize, |state, event| {
            if let Event::Resize { width, height } = event {
                log::debug!("Display resized to {width}x{height}");
                state.must_redraw = true;
            }
        });
    }

    pub fn context(&self) -> &GameContext {
        &self.state.ctx
    }

    pub fn frames_rendered(&self) -> u64 {
        self.state.frames_rendered
    }

    pub fn scene_count(&self) -> usize {
        self.state.stack.len()
    }

    pub fn top_scene_name(&self) -> Option<&str> {
        self.state.stack.top_name()
    }

    pub fn push_scene(&mut self, kind: SceneKind, arg: SceneArg) {
        self.state.ctx.push_scene(kind, arg);
        self.state.apply_scene_requests();
    }

    /// Scenes of a fresh run: the custom level or quest from the command
    /// line, or else the intro quest with the language selection and the
    /// intro on top of it.
    pub fn push_initial_scenes(&mut self) {
        let command_line = &self.state.ctx.command_line;
        if let Some(level) = command_line.custom_level_path.clone() {
            self.push_scene(SceneKind::Level, SceneArg::Level(LevelArg::new(level)));
        } else if let Some(quest) = command_line.custom_quest_path.clone() {
            self.push_scene(SceneKind::Quest, SceneArg::Path(quest));
        } else {
            self.push_scene(SceneKind::Quest, SceneArg::Path(PathBuf::from(INTRO_QUEST)));
            if !self.state.ctx.prefs.has_item(LANGPATH_KEY) {
                self.push_scene(SceneKind::LangSelect, SceneArg::None);
            }
            self.push_scene(SceneKind::Intro, SceneArg::None);
        }
    }

    pub fn post(&mut self, event: Event) {
        self.queue.push(event);
    }

    pub fn quit(&mut self) {
        self.state.force_quit = true;
    }

    pub fn restart(&mut self) {
        self.state.ctx.request_restart();
    }

    pub fn is_running(&self) -> bool {
        !self.state.force_quit && !self.state.ctx.quit_requested() && !self.state.stack.is_empty()
    }

    /// Handles one event, then renders if the queue has run dry.
    pub fn handle(&mut self, event: Event) {
        if let Event::Timer { source } = event {
            let dropped = self.queue.drop_timer_events(source);
            if dropped > 0 {
                log::trace!("Dropped {dropped} late timer events");
            }
        }
        self.dispatcher.dispatch(&mut self.state, &event);

        if self.state.must_redraw && self.state.is_active && self.queue.is_empty() && self.is_running() {
            self.state.render();
            self.state.must_redraw = false;
        }
    }

    /// Handles events until the queue has nothing more to give or the game
    /// is over.
    pub fn pump(&mut self) {
        while self.is_running() {
            let Some(event) = self.queue.wait_for_event() else {
                break;
            };
            self.handle(event);
        }
    }

    /// Releases every scene and the queue. The engine is spent afterwards.
    pub fn finish(mut self) -> EngineExit {
        let state = &mut self.state;
        state.stack.clear(&mut state.ctx);
        let drained = self.queue.drain();
        if drained > 0 {
            log::debug!("Drained {drained} pending events");
        }
        state.ctx.resources.release_all();
        if let Err(e) = state.ctx.prefs.save() {
            log::warn!("{e}");
        }
        let error = state.ctx.fatal_error().map(str::to_string);
        EngineExit {
            restart: state.ctx.restart_requested() && error.is_none(),
            error,
        }
    }

    pub fn run(mut self) -> EngineExit {
        self.pump();
        self.finish()
    }
}

/// Script loading on its own thread. The result is only taken by [`join`](Self::join).
pub struct ScriptLoader {
    worker: thread::JoinHandle<Result<ScriptVm, String>>,
}

impl ScriptLoader {
    pub fn spawn(job: impl FnOnce() -> Result<ScriptVm, String> + Send + 'static) -> Result<Self, String> {
        let worker = thread::Builder::new()
            .name("script-loader".to_string())
            .spawn(job)
            .map_err(|e| format!("Failed to start the script loader: {e}"))?;
        Ok(Self { worker })
    }

    /// Loads every script of `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, String> {
        let dir = dir.to_path_buf();
        Self::spawn(move || {
            let mut vm = ScriptVm::new()?;
            let count = vm.load_dir(&dir);
            log::info!("Loaded {count} scripts from {}", dir.display());
            Ok(vm)
        })
    }

    pub fn join(self) -> Result<ScriptVm, String> {
        self.worker
            .join()
            .map_err(|_| "The script loader panicked".to_string())?
    }
}

/// Builds the context of a run from the command line.
pub fn boot(
    mut command_line: CommandLine,
    renderer: Box<dyn Renderer>,
    audio: Box<dyn Audio>,
) -> Result<GameContext, String> {
    let gamedir = match command_line.gamedir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().map_err(|e| format!("Can't read the current directory: {e}"))?,
    };
    if !gamedir.is_dir() {
        return Err(format!("Game folder not found: {}", gamedir.display()));
    }
    log::info!("Game folder: {}", gamedir.display());

    let loader = ScriptLoader::load_dir(&gamedir.join(SCRIPTS_DIR))?;
    let resources = ResourceManager::new(&gamedir);
    let mut prefs = Preferences::open(&gamedir, PREFS_ID).unwrap_or_else(|e| {
        log::warn!("{e}");
        Preferences::in_memory()
    });
    if let Some(language) = &command_line.language_filepath {
        prefs.set_string(LANGPATH_KEY, &language.to_string_lossy());
    }
    if command_line.show_fps.is_none() {
        command_line.show_fps = Some(prefs.get_bool(SHOWFPS_KEY));
    }
    if let Some(version) = &command_line.compatibility_version {
        log::info!("Running in compatibility mode for version {version}");
    }

    let vm = loader.join()?;
    Ok(GameContext::new(renderer, audio, prefs, resources, vm, command_line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;
    use std::time::{SystemTime, UNIX_EPOCH};
    use surge_core::{Key, Scene};
    use surge_platform::{ManualQueue, SilentAudio};

    fn game_dir(name_hint: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("surge_engine_test_{}_{}_{}", name_hint, std::process::id(), nanos));
        fs::create_dir_all(dir.join("quests")).expect("create game dir");
        fs::write(dir.join(INTRO_QUEST), "name \"Intro\"\nhidden\nlevel \"levels/intro.lev\"\n").expect("write quest");
        dir
    }

    type Journal = Rc<RefCell<Vec<String>>>;

    /// Logs its lifecycle and never leaves on its own.
    struct Recorder {
        name: &'static str,
        journal: Journal,
    }

    impl Scene<GameContext, SceneArg> for Recorder {
        fn init(&mut self, _ctx: &mut GameContext, _arg: SceneArg) {
            self.journal.borrow_mut().push(format!("init {}", self.name));
        }

        fn update(&mut self, _ctx: &mut GameContext) {
            self.journal.borrow_mut().push(format!("update {}", self.name));
        }

        fn render(&mut self, _ctx: &mut GameContext) {
            self.journal.borrow_mut().push(format!("render {}", self.name));
        }

        fn release(&mut self, _ctx: &mut GameContext) {
            self.journal.borrow_mut().push(format!("release {}", self.name));
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn engine_with_recorders(names: &[&'static str]) -> (Engine<ManualQueue>, Journal) {
        let ctx = GameContext::headless(Path::new(".")).expect("context");
        let mut engine = Engine::new(ctx, ManualQueue::new());
        let journal: Journal = Rc::new(RefCell::new(Vec::new()));
        for &name in names {
            let recorder = Box::new(Recorder {
                name,
                journal: Rc::clone(&journal),
            });
            let state = &mut engine.state;
            state.stack.push(recorder, &mut state.ctx, SceneArg::None).expect("push recorder");
        }
        journal.borrow_mut().clear();
        (engine, journal)
    }

    fn timer() -> Event {
        Event::Timer { source: GAME_TIMER }
    }

    #[test]
    fn late_timer_events_are_dropped() {
        let (mut engine, journal) = engine_with_recorders(&["a"]);
        for _ in 0..5 {
            engine.post(timer());
        }
        engine.post(Event::KeyDown(Key::Space));
        engine.pump();

        assert_eq!(engine.context().timer.tick_count, 1);
        assert!(engine.context().input.is_held(Key::Space));
        assert_eq!(*journal.borrow(), vec!["update a", "render a"]);
    }

    #[test]
    fn other_timer_sources_are_left_alone() {
        let (mut engine, _journal) = engine_with_recorders(&["a"]);
        engine.post(Event::Timer { source: TimerSource(7) });
        engine.post(timer());
        engine.post(timer());
        engine.pump();
        assert_eq!(engine.context().timer.tick_count, 1);
    }

    #[test]
    fn only_the_top_scene_runs_and_frames_wait_for_an_empty_queue() {
        let (mut engine, journal) = engine_with_recorders(&["bottom", "top"]);
        engine.post(timer());
        engine.post(Event::KeyDown(Key::Left));
        engine.pump();
        assert_eq!(*journal.borrow(), vec!["update top", "render top"]);
        assert_eq!(engine.frames_rendered(), 1);
    }

    #[test]
    fn halted_drawing_pauses_the_clock_and_skips_frames() {
        let (mut engine, _journal) = engine_with_recorders(&["a"]);
        engine.post(Event::HaltDrawing);
        engine.post(timer());
        engine.pump();
        assert!(engine.context().timer.is_paused());
        assert_eq!(engine.frames_rendered(), 0);

        assert_eq!(engine.context().timer.tick_count, 0);

        engine.post(Event::ResumeDrawing);
        engine.pump();
        assert!(!engine.context().timer.is_paused());
        assert_eq!(engine.frames_rendered(), 1);
        engine.post(timer());
        engine.pump();
        assert_eq!(engine.context().timer.tick_count, 1);
        assert_eq!(engine.frames_rendered(), 2);
    }

    #[test]
    fn every_scene_is_released_once_in_reverse_order() {
        let (mut engine, journal) = engine_with_recorders(&["bottom", "top"]);
        engine.post(Event::DisplayClose);
        engine.post(timer());
        engine.pump();
        assert!(!engine.is_running());

        let exit = engine.finish();
        assert_eq!(exit, EngineExit { restart: false, error: None });
        assert_eq!(*journal.borrow(), vec!["release top", "release bottom"]);
    }

    #[test]
    fn restart_is_reported_at_exit() {
        let (mut engine, _journal) = engine_with_recorders(&["a"]);
        engine.restart();
        assert!(!engine.is_running());
        assert!(engine.finish().restart);
    }

    #[test]
    fn quit_stops_the_loop_without_a_restart() {
        let (mut engine, journal) = engine_with_recorders(&["a"]);
        engine.quit();
        engine.post(timer());
        engine.pump();
        assert_eq!(engine.context().timer.tick_count, 0);
        let exit = engine.finish();
        assert!(!exit.restart);
        assert_eq!(journal.borrow().last().map(String::as_str), Some("release a"));
    }

    #[test]
    fn a_fresh_install_asks_for_the_language_after_the_intro() {
        let dir = game_dir("fresh");
        let ctx = GameContext::headless(&dir).expect("context");
        let mut engine = Engine::new(ctx, ManualQueue::new());
        engine.push_initial_scenes();
        assert_eq!(engine.scene_count(), 3);
        assert_eq!(engine.top_scene_name(), Some("intro"));
        assert!(engine.is_running());

        let mut ctx = GameContext::headless(&dir).expect("context");
        ctx.prefs.set_string(LANGPATH_KEY, "languages/english.lng");
        let mut engine = Engine::new(ctx, ManualQueue::new());
        engine.push_initial_scenes();
        assert_eq!(engine.scene_count(), 2);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn a_custom_quest_replaces_the_intro() {
        let dir = game_dir("custom");
        let mut ctx = GameContext::headless(&dir).expect("context");
        ctx.command_line.custom_quest_path = Some(PathBuf::from(INTRO_QUEST));
        let mut engine = Engine::new(ctx, ManualQueue::new());
        engine.push_initial_scenes();
        assert_eq!(engine.scene_count(), 1);
        assert_eq!(engine.top_scene_name(), Some("quest"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn a_broken_quest_ends_the_run_with_an_error() {
        let dir = game_dir("broken");
        fs::write(dir.join(INTRO_QUEST), "name \"Nothing\"\n").expect("write quest");
        let mut ctx = GameContext::headless(&dir).expect("context");
        ctx.prefs.set_string(LANGPATH_KEY, "languages/english.lng");
        ctx.command_line.custom_quest_path = Some(PathBuf::from(INTRO_QUEST));
        let engine = {
            let mut engine = Engine::new(ctx, ManualQueue::new());
            engine.push_initial_scenes();
            engine
        };
        assert!(!engine.is_running());
        let exit = engine.run();
        assert!(exit.error.is_some_and(|e| e.contains("has no levels")));
        assert!(!exit.restart);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn boot_needs_an_existing_game_folder() {
        let command_line = CommandLine {
            gamedir: Some(PathBuf::from("/nonexistent/surge")),
            ..CommandLine::default()
        };
        let result = boot(
            command_line,
            Box::new(surge_platform::RecordingRenderer::new()),
            Box::new(SilentAudio::new()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn boot_loads_the_scripts_of_the_game_folder() {
        let dir = game_dir("boot");
        fs::create_dir_all(dir.join(SCRIPTS_DIR)).expect("create scripts dir");
        fs::write(
            dir.join(SCRIPTS_DIR).join("crate.lua"),
            r#"class("Crate", { tags = { "entity" } }, {})"#,
        )
        .expect("write script");
        let command_line = CommandLine {
            gamedir: Some(dir.clone()),
            show_fps: None,
            ..CommandLine::default()
        };
        let ctx = boot(
            command_line,
            Box::new(surge_platform::RecordingRenderer::new()),
            Box::new(SilentAudio::new()),
        )
        .expect("boot");
        assert!(ctx.vm.class_exists("Crate"));
        assert_eq!(ctx.command_line.show_fps, Some(false));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn the_script_loader_runs_alongside_and_fails_at_join() {
        let (go, wait) = std::sync::mpsc::channel::<()>();
        let loader = ScriptLoader::spawn(move || {
            wait.recv().map_err(|e| e.to_string())?;
            Err("scripts are broken".to_string())
        })
        .expect("spawn loader");
        // The loader is still blocked here, so spawning must not have joined it.
        go.send(()).expect("release loader");
        assert_eq!(loader.join().err().as_deref(), Some("scripts are broken"));

        let panicking = ScriptLoader::spawn(|| panic!("loader crashed")).expect("spawn loader");
        assert_eq!(panicking.join().err().as_deref(), Some("The script loader panicked"));
    }
}
