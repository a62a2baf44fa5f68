//! Open Surge entry point.
//!
//! winit owns the event loop. The [`App`] turns window events into engine
//! events, posts a timer event at the game rate and pumps the engine after
//! each of them. When the engine asks for a restart, a fresh engine (and
//! window) is built without leaving the event loop.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec2;
use surge_core::{Key, MouseBtn, TARGET_FPS};
use surge_game::cli::{self, CommandLine, Invocation};
use surge_game::context::GameContext;
use surge_game::engine::{boot, Engine, GAME_TIMER};
use surge_game::scenes::menus::{FULLSCREEN_KEY, RESOLUTION_KEY};
use surge_platform::video::{SCREEN_HEIGHT, SCREEN_WIDTH};
use surge_platform::window::{create_window, PlatformConfig};
use surge_platform::{Event, ManualQueue, RecordingRenderer, SilentAudio};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

const DEFAULT_SCALE: u32 = 2;

fn tick_period() -> Duration {
    Duration::from_secs_f64(1.0 / TARGET_FPS as f64)
}

struct App {
    command_line: CommandLine,
    window: Option<Arc<Window>>,
    engine: Option<Engine<ManualQueue>>,
    next_tick: Instant,
    error: Option<String>,
}

impl App {
    fn new(command_line: CommandLine) -> Self {
        Self {
            command_line,
            window: None,
            engine: None,
            next_tick: Instant::now(),
            error: None,
        }
    }

    /// Boots a run: context, window, initial scenes.
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), String> {
        let ctx = boot(
            self.command_line.clone(),
            Box::new(RecordingRenderer::new()),
            Box::new(SilentAudio::new()),
        )?;
        let config = platform_config(&ctx);
        self.window = None;
        let window = create_window(event_loop, &config)?;
        log::info!("Window created: {}x{}", config.width(), config.height());

        let mut engine = Engine::new(ctx, ManualQueue::new());
        engine.push_initial_scenes();
        self.window = Some(window);
        self.engine = Some(engine);
        self.next_tick = Instant::now();
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, message: String) {
        log::error!("{message}");
        self.error.get_or_insert(message);
        event_loop.exit();
    }

    fn post(&mut self, event: Event) {
        if let Some(engine) = self.engine.as_mut() {
            engine.post(event);
        }
    }

    /// Runs the pending events; tears the run down once it is over.
    fn pump(&mut self, event_loop: &ActiveEventLoop) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        engine.pump();
        if engine.is_running() {
            return;
        }

        let Some(engine) = self.engine.take() else {
            return;
        };
        let exit = engine.finish();
        if let Some(error) = exit.error {
            self.fail(event_loop, error);
        } else if exit.restart {
            log::info!("Restarting the engine");
            if let Err(e) = self.start(event_loop) {
                self.fail(event_loop, e);
            }
        } else {
            event_loop.exit();
        }
    }

    /// Window coordinates to screen coordinates.
    fn to_screen(&self, x: f64, y: f64) -> Vec2 {
        let Some(window) = self.window.as_ref() else {
            return Vec2::new(x as f32, y as f32);
        };
        let size = window.inner_size();
        let sx = SCREEN_WIDTH as f64 / size.width.max(1) as f64;
        let sy = SCREEN_HEIGHT as f64 / size.height.max(1) as f64;
        Vec2::new((x * sx) as f32, (y * sy) as f32)
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.engine.is_some() {
            self.post(Event::ResumeDrawing);
            self.pump(event_loop);
            return;
        }
        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn suspended(&mut self, event_loop: &ActiveEventLoop) {
        self.post(Event::HaltDrawing);
        self.pump(event_loop);
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.engine.is_none() {
            return;
        }
        let now = Instant::now();
        if now >= self.next_tick {
            self.post(Event::Timer { source: GAME_TIMER });
            self.next_tick += tick_period();
            if self.next_tick < now {
                self.next_tick = now + tick_period();
            }
            self.pump(event_loop);
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_tick));
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let event = match event {
            WindowEvent::CloseRequested => Event::DisplayClose,
            WindowEvent::Resized(size) => Event::Resize {
                width: size.width,
                height: size.height,
            },
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                let Some(key) = map_key(code) else {
                    return;
                };
                match event.state {
                    ElementState::Pressed => Event::KeyDown(key),
                    ElementState::Released => Event::KeyUp(key),
                }
            }
            WindowEvent::CursorMoved { position, .. } => Event::MouseMove(self.to_screen(position.x, position.y)),
            WindowEvent::MouseInput { state, button, .. } => {
                let Some(button) = map_mouse_button(button) else {
                    return;
                };
                match state {
                    ElementState::Pressed => Event::MouseDown(button),
                    ElementState::Released => Event::MouseUp(button),
                }
            }
            _ => return,
        };
        self.post(event);
        self.pump(event_loop);
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(engine) = self.engine.take() {
            if let Some(error) = engine.finish().error {
                self.error.get_or_insert(error);
            }
        }
    }
}

/// Window settings: the command line wins over the preferences.
fn platform_config(ctx: &GameContext) -> PlatformConfig {
    let cmd = &ctx.command_line;
    let scale = cmd.video_resolution.unwrap_or_else(|| match ctx.prefs.get_int(RESOLUTION_KEY) {
        scale @ 1..=4 => scale as u32,
        _ => DEFAULT_SCALE,
    });
    PlatformConfig {
        title: "Open Surge".to_string(),
        scale,
        fullscreen: cmd.fullscreen.unwrap_or_else(|| ctx.prefs.get_bool(FULLSCREEN_KEY)),
    }
}

fn map_key(code: KeyCode) -> Option<Key> {
    match code {
        KeyCode::ArrowLeft => Some(Key::Left),
        KeyCode::ArrowRight => Some(Key::Right),
        KeyCode::ArrowUp => Some(Key::Up),
        KeyCode::ArrowDown => Some(Key::Down),
        KeyCode::Escape => Some(Key::Escape),
        KeyCode::Enter => Some(Key::Enter),
        KeyCode::Space => Some(Key::Space),
        KeyCode::Tab => Some(Key::Tab),
        KeyCode::Backspace => Some(Key::Backspace),
        KeyCode::ControlLeft => Some(Key::LCtrl),
        KeyCode::ShiftLeft => Some(Key::LShift),
        KeyCode::F1 => Some(Key::F1),
        KeyCode::F12 => Some(Key::F12),
        KeyCode::PageUp => Some(Key::PageUp),
        KeyCode::PageDown => Some(Key::PageDown),
        KeyCode::KeyA => Some(Key::A),
        KeyCode::KeyB => Some(Key::B),
        KeyCode::KeyD => Some(Key::D),
        KeyCode::KeyF => Some(Key::F),
        KeyCode::KeyG => Some(Key::G),
        KeyCode::KeyH => Some(Key::H),
        KeyCode::KeyI => Some(Key::I),
        KeyCode::KeyJ => Some(Key::J),
        KeyCode::KeyK => Some(Key::K),
        KeyCode::KeyL => Some(Key::L),
        KeyCode::KeyM => Some(Key::M),
        KeyCode::KeyN => Some(Key::N),
        KeyCode::KeyP => Some(Key::P),
        KeyCode::KeyS => Some(Key::S),
        KeyCode::KeyW => Some(Key::W),
        KeyCode::KeyY => Some(Key::Y),
        KeyCode::KeyZ => Some(Key::Z),
        _ => None,
    }
}

fn map_mouse_button(button: MouseButton) -> Option<MouseBtn> {
    match button {
        MouseButton::Left => Some(MouseBtn::Left),
        MouseButton::Right => Some(MouseBtn::Right),
        MouseButton::Middle => Some(MouseBtn::Middle),
        _ => None,
    }
}

fn main() -> ExitCode {
    let command_line = match cli::parse_args(std::env::args().skip(1)) {
        Ok(Invocation::Run(command_line)) => command_line,
        Ok(Invocation::Help) => {
            println!("{}", cli::usage());
            return ExitCode::SUCCESS;
        }
        Ok(Invocation::Version) => {
            println!("{}", cli::version());
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let filter = if command_line.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
    log::info!("{} starting...", cli::version());

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("Failed to create the event loop: {e}");
            return ExitCode::FAILURE;
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(command_line);
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop error: {e}");
        return ExitCode::FAILURE;
    }
    match app.error {
        Some(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
        None => ExitCode::SUCCESS,
    }
}
