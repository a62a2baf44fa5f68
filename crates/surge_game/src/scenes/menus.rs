//! The small menu scenes: a title, a list of choices, fire to pick, back to
//! leave.

use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec2;
use surge_core::{engine_version_string, Button, Color, Scene};
use surge_platform::video::{SCREEN_HEIGHT, SCREEN_WIDTH};
use surge_platform::DrawCommand;

use crate::context::{GameContext, LevelArg, SceneArg};
use crate::level::lev::load_level_file;
use crate::scenes::quest::load_quest_from_path;
use crate::storyboard::SceneKind;

pub const INTRO_TIMEOUT: f32 = 4.0;
pub const CREDITS_SCROLL_SPEED: f32 = 30.0;
pub const LANGPATH_KEY: &str = "langpath";
pub const FULLSCREEN_KEY: &str = "fullscreen";
pub const RESOLUTION_KEY: &str = "resolution";
pub const SHOWFPS_KEY: &str = "showfps";
pub const LAST_LEVEL_KEY: &str = "lastselectedlevel";

const CHOOSE_SAMPLE: &str = "samples/choose.wav";
const CONFIRM_SAMPLE: &str = "samples/confirm.wav";
const RETURN_SAMPLE: &str = "samples/return.wav";
const LINE_HEIGHT: f32 = 12.0;
const VISIBLE_LINES: usize = 14;

/// Files with extension `ext` under `dir` of the game folder, as paths
/// relative to the game folder, sorted.
pub fn list_assets(root: &Path, dir: &str, ext: &str) -> Vec<String> {
    let entries = match fs::read_dir(root.join(dir)) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Can't list {}: {e}", root.join(dir).display());
            return Vec::new();
        }
    };
    let mut found: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|e| e == ext))
        .filter_map(|path| path.file_name().map(|name| format!("{dir}/{}", name.to_string_lossy())))
        .collect();
    found.sort();
    found
}

/// What a list menu saw this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuInput {
    Nothing,
    Chosen(usize),
    Back,
}

/// Vertical list with a cursor.
#[derive(Debug, Default)]
struct Menu {
    labels: Vec<String>,
    cursor: usize,
}

impl Menu {
    fn new(labels: Vec<String>) -> Self {
        Self { labels, cursor: 0 }
    }

    fn update(&mut self, ctx: &mut GameContext) -> MenuInput {
        let input = &ctx.input;
        if input.button_pressed(Button::Fire3) || input.button_pressed(Button::Fire4) {
            ctx.audio.play_sample(RETURN_SAMPLE);
            return MenuInput::Back;
        }
        if self.labels.is_empty() {
            return MenuInput::Nothing;
        }
        if input.button_pressed(Button::Fire1) || input.button_pressed(Button::Fire2) {
            ctx.audio.play_sample(CONFIRM_SAMPLE);
            return MenuInput::Chosen(self.cursor);
        }
        let count = self.labels.len();
        if input.button_pressed(Button::Down) {
            self.cursor = (self.cursor + 1) % count;
            ctx.audio.play_sample(CHOOSE_SAMPLE);
        } else if input.button_pressed(Button::Up) {
            self.cursor = (self.cursor + count - 1) % count;
            ctx.audio.play_sample(CHOOSE_SAMPLE);
        }
        MenuInput::Nothing
    }

    fn render(&self, ctx: &mut GameContext, title: &str) {
        let renderer = ctx.renderer.as_mut();
        renderer.submit(DrawCommand::Clear(Color::rgb(0, 0, 40)));
        renderer.text(title, Vec2::new(16.0, 12.0), Color::YELLOW);
        if self.labels.is_empty() {
            renderer.text("Nothing here.", Vec2::new(24.0, 40.0), Color::WHITE);
            return;
        }
        let first = self.cursor.saturating_sub(VISIBLE_LINES - 1);
        for (row, (i, label)) in self.labels.iter().enumerate().skip(first).take(VISIBLE_LINES).enumerate() {
            let position = Vec2::new(24.0, 40.0 + row as f32 * LINE_HEIGHT);
            let selected = i == self.cursor;
            if selected {
                renderer.text(">", position - Vec2::new(12.0, 0.0), Color::YELLOW);
            }
            renderer.text(label, position, if selected { Color::YELLOW } else { Color::WHITE });
        }
    }
}

pub struct IntroScene {
    elapsed: f32,
}

impl IntroScene {
    pub fn new() -> Self {
        Self { elapsed: 0.0 }
    }
}

impl Default for IntroScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene<GameContext, SceneArg> for IntroScene {
    fn init(&mut self, _ctx: &mut GameContext, _arg: SceneArg) {
        self.elapsed = 0.0;
    }

    fn update(&mut self, ctx: &mut GameContext) {
        self.elapsed += ctx.dt();
        let skip = ctx.input.button_pressed(Button::Fire1) || ctx.input.button_pressed(Button::Fire3);
        if skip || self.elapsed >= INTRO_TIMEOUT {
            ctx.pop_scene();
        }
    }

    fn render(&mut self, ctx: &mut GameContext) {
        let renderer = ctx.renderer.as_mut();
        renderer.submit(DrawCommand::Clear(Color::BLACK));
        let alpha = ((self.elapsed / 0.5).min(1.0) * 255.0) as u8;
        let center = Vec2::new(SCREEN_WIDTH as f32 / 2.0, SCREEN_HEIGHT as f32 / 2.0);
        renderer.text("Open Surge Engine", center - Vec2::new(68.0, 12.0), Color::rgb(255, 225, 62).with_alpha(alpha));
        let version = format!("version {}", engine_version_string());
        renderer.text(&version, center + Vec2::new(-40.0, 4.0), Color::rgb(205, 195, 182).with_alpha(alpha));
    }

    fn release(&mut self, _ctx: &mut GameContext) {}

    fn name(&self) -> &str {
        "intro"
    }
}

/// Lists `languages/*.lng` and stores the pick in the `langpath` preference.
pub struct LangSelectScene {
    menu: Menu,
    files: Vec<String>,
}

impl LangSelectScene {
    pub fn new() -> Self {
        Self {
            menu: Menu::default(),
            files: Vec::new(),
        }
    }
}

impl Default for LangSelectScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene<GameContext, SceneArg> for LangSelectScene {
    fn init(&mut self, ctx: &mut GameContext, _arg: SceneArg) {
        self.files = list_assets(ctx.resources.root(), "languages", "lng");
        let labels = self
            .files
            .iter()
            .map(|f| {
                Path::new(f)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| f.clone())
            })
            .collect();
        self.menu = Menu::new(labels);
        if let Some(current) = ctx.prefs.get_string(LANGPATH_KEY) {
            if let Some(index) = self.files.iter().position(|f| f == current) {
                self.menu.cursor = index;
            }
        }
    }

    fn update(&mut self, ctx: &mut GameContext) {
        match self.menu.update(ctx) {
            MenuInput::Nothing => {}
            MenuInput::Back => ctx.pop_scene(),
            MenuInput::Chosen(index) => {
                let path = &self.files[index];
                log::info!("Language set to {path}");
                ctx.prefs.set_string(LANGPATH_KEY, path);
                if let Err(e) = ctx.prefs.save() {
                    log::warn!("{e}");
                }
                ctx.pop_scene();
            }
        }
    }

    fn render(&mut self, ctx: &mut GameContext) {
        self.menu.render(ctx, "Select your language");
    }

    fn release(&mut self, _ctx: &mut GameContext) {}

    fn name(&self) -> &str {
        "langselect"
    }
}

pub struct CreditsScene {
    lines: Vec<String>,
    scroll: f32,
}

impl CreditsScene {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            scroll: 0.0,
        }
    }
}

impl Default for CreditsScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene<GameContext, SceneArg> for CreditsScene {
    fn init(&mut self, ctx: &mut GameContext, _arg: SceneArg) {
        self.scroll = 0.0;
        self.lines = vec![
            format!("Open Surge Engine {}", engine_version_string()),
            String::new(),
            "A 2D platformer engine".to_string(),
            "and a game built with it.".to_string(),
            String::new(),
            format!("Game folder: {}", ctx.resources.root().display()),
            String::new(),
            "Thanks for playing!".to_string(),
        ];
    }

    fn update(&mut self, ctx: &mut GameContext) {
        if ctx.input.button_pressed(Button::Fire1) || ctx.input.button_pressed(Button::Fire3) {
            ctx.pop_scene();
            return;
        }
        let length = self.lines.len() as f32 * LINE_HEIGHT + SCREEN_HEIGHT as f32;
        self.scroll = (self.scroll + CREDITS_SCROLL_SPEED * ctx.dt()) % length;
    }

    fn render(&mut self, ctx: &mut GameContext) {
        let renderer = ctx.renderer.as_mut();
        renderer.submit(DrawCommand::Clear(Color::BLACK));
        for (i, line) in self.lines.iter().enumerate() {
            let y = SCREEN_HEIGHT as f32 + i as f32 * LINE_HEIGHT - self.scroll;
            renderer.text(line, Vec2::new(16.0, y), Color::WHITE);
        }
    }

    fn release(&mut self, _ctx: &mut GameContext) {}

    fn name(&self) -> &str {
        "credits"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionsEntry {
    Fullscreen,
    Resolution,
    ShowFps,
    StageSelect,
    Credits,
    Back,
}

impl OptionsEntry {
    const ALL: [OptionsEntry; 6] = [
        OptionsEntry::Fullscreen,
        OptionsEntry::Resolution,
        OptionsEntry::ShowFps,
        OptionsEntry::StageSelect,
        OptionsEntry::Credits,
        OptionsEntry::Back,
    ];
}

/// Video settings live in the preferences; changing the window asks the
/// engine for a restart when the screen closes.
pub struct OptionsScene {
    menu: Menu,
    video_changed: bool,
}

impl OptionsScene {
    pub fn new() -> Self {
        Self {
            menu: Menu::default(),
            video_changed: false,
        }
    }

    fn labels(ctx: &GameContext) -> Vec<String> {
        let on_off = |b: bool| if b { "on" } else { "off" };
        OptionsEntry::ALL
            .iter()
            .map(|entry| match entry {
                OptionsEntry::Fullscreen => format!("Fullscreen: {}", on_off(ctx.prefs.get_bool(FULLSCREEN_KEY))),
                OptionsEntry::Resolution => format!("Resolution: {}x", current_resolution(ctx)),
                OptionsEntry::ShowFps => format!("Show FPS: {}", on_off(ctx.prefs.get_bool(SHOWFPS_KEY))),
                OptionsEntry::StageSelect => "Stage select".to_string(),
                OptionsEntry::Credits => "Credits".to_string(),
                OptionsEntry::Back => "Back".to_string(),
            })
            .collect()
    }

    fn refresh(&mut self, ctx: &GameContext) {
        self.menu.labels = Self::labels(ctx);
    }
}

impl Default for OptionsScene {
    fn default() -> Self {
        Self::new()
    }
}

fn current_resolution(ctx: &GameContext) -> i32 {
    ctx.prefs.get_int(RESOLUTION_KEY).clamp(1, 4)
}

impl Scene<GameContext, SceneArg> for OptionsScene {
    fn init(&mut self, ctx: &mut GameContext, _arg: SceneArg) {
        self.menu = Menu::new(Self::labels(ctx));
        self.video_changed = false;
    }

    fn update(&mut self, ctx: &mut GameContext) {
        let entry = match self.menu.update(ctx) {
            MenuInput::Nothing => return,
            MenuInput::Back => OptionsEntry::Back,
            MenuInput::Chosen(index) => OptionsEntry::ALL[index],
        };
        match entry {
            OptionsEntry::Fullscreen => {
                let value = !ctx.prefs.get_bool(FULLSCREEN_KEY);
                ctx.prefs.set_bool(FULLSCREEN_KEY, value);
                self.video_changed = true;
            }
            OptionsEntry::Resolution => {
                let next = current_resolution(ctx) % 4 + 1;
                ctx.prefs.set_int(RESOLUTION_KEY, next);
                self.video_changed = true;
            }
            OptionsEntry::ShowFps => {
                let value = !ctx.prefs.get_bool(SHOWFPS_KEY);
                ctx.prefs.set_bool(SHOWFPS_KEY, value);
                ctx.command_line.show_fps = Some(value);
            }
            OptionsEntry::StageSelect => ctx.push_scene(SceneKind::StageSelect, SceneArg::None),
            OptionsEntry::Credits => ctx.push_scene(SceneKind::Credits, SceneArg::None),
            OptionsEntry::Back => {
                if let Err(e) = ctx.prefs.save() {
                    log::warn!("{e}");
                }
                if self.video_changed {
                    log::info!("Video settings changed; restarting the engine");
                    ctx.request_restart();
                }
                ctx.pop_scene();
            }
        }
        self.refresh(ctx);
    }

    fn render(&mut self, ctx: &mut GameContext) {
        self.menu.render(ctx, "Options");
    }

    fn release(&mut self, _ctx: &mut GameContext) {}

    fn name(&self) -> &str {
        "options"
    }
}

/// Lists `levels/*.lev` by name and act. The last pick is remembered.
pub struct StageSelectScene {
    menu: Menu,
    files: Vec<String>,
}

impl StageSelectScene {
    pub fn new() -> Self {
        Self {
            menu: Menu::default(),
            files: Vec::new(),
        }
    }
}

impl Default for StageSelectScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene<GameContext, SceneArg> for StageSelectScene {
    fn init(&mut self, ctx: &mut GameContext, _arg: SceneArg) {
        let root = ctx.resources.root().to_path_buf();
        let mut stages: Vec<(String, String)> = list_assets(&root, "levels", "lev")
            .into_iter()
            .filter_map(|file| match load_level_file(&root.join(&file)) {
                Ok(level) => {
                    let label = match level.act {
                        0 => level.name.clone(),
                        act => format!("{} - Act {act}", level.name),
                    };
                    Some((file, label))
                }
                Err(e) => {
                    log::warn!("Stage select skips {file}: {e}");
                    None
                }
            })
            .collect();
        stages.sort_by(|a, b| a.1.cmp(&b.1));
        let (files, labels) = stages.into_iter().unzip();
        self.files = files;
        self.menu = Menu::new(labels);
        if let Some(last) = ctx.prefs.get_string(LAST_LEVEL_KEY) {
            if let Some(index) = self.files.iter().position(|f| f == last) {
                self.menu.cursor = index;
            }
        }
    }

    fn update(&mut self, ctx: &mut GameContext) {
        match self.menu.update(ctx) {
            MenuInput::Nothing => {}
            MenuInput::Back => ctx.pop_scene(),
            MenuInput::Chosen(index) => {
                let file = self.files[index].clone();
                ctx.prefs.set_string(LAST_LEVEL_KEY, &file);
                ctx.push_scene(SceneKind::Level, SceneArg::Level(LevelArg::new(PathBuf::from(file))));
            }
        }
    }

    fn render(&mut self, ctx: &mut GameContext) {
        self.menu.render(ctx, "Stage Select");
    }

    fn release(&mut self, _ctx: &mut GameContext) {}

    fn name(&self) -> &str {
        "stageselect"
    }
}

/// Lists the quests in `quests/` that aren't hidden.
pub struct QuestSelectScene {
    menu: Menu,
    files: Vec<String>,
}

impl QuestSelectScene {
    pub fn new() -> Self {
        Self {
            menu: Menu::default(),
            files: Vec::new(),
        }
    }
}

impl Default for QuestSelectScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene<GameContext, SceneArg> for QuestSelectScene {
    fn init(&mut self, ctx: &mut GameContext, _arg: SceneArg) {
        let root = ctx.resources.root().to_path_buf();
        let mut files = Vec::new();
        let mut labels = Vec::new();
        for file in list_assets(&root, "quests", "qst") {
            match load_quest_from_path(&root.join(&file)) {
                Ok(quest) if quest.hidden => {}
                Ok(quest) => {
                    labels.push(format!("{} ({} levels)", quest.name, quest.levels.len()));
                    files.push(file);
                }
                Err(e) => log::warn!("Quest select skips {file}: {e}"),
            }
        }
        self.files = files;
        self.menu = Menu::new(labels);
    }

    fn update(&mut self, ctx: &mut GameContext) {
        match self.menu.update(ctx) {
            MenuInput::Nothing => {}
            MenuInput::Back => ctx.pop_scene(),
            MenuInput::Chosen(index) => {
                let file = PathBuf::from(&self.files[index]);
                ctx.push_scene(SceneKind::Quest, SceneArg::Path(file));
            }
        }
    }

    fn render(&mut self, ctx: &mut GameContext) {
        self.menu.render(ctx, "Quest Select");
    }

    fn release(&mut self, _ctx: &mut GameContext) {}

    fn name(&self) -> &str {
        "questselect"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MobileButton {
    Back,
    Info,
    StageSelect,
    Credits,
}

impl MobileButton {
    const ALL: [MobileButton; 4] = [
        MobileButton::Back,
        MobileButton::Info,
        MobileButton::StageSelect,
        MobileButton::Credits,
    ];

    fn label(self) -> &'static str {
        match self {
            MobileButton::Back => "Back",
            MobileButton::Info => "Info",
            MobileButton::StageSelect => "Stage select",
            MobileButton::Credits => "Credits",
        }
    }
}

/// Menu reached from the pause button in mobile mode.
pub struct MobileMenuScene {
    menu: Menu,
}

impl MobileMenuScene {
    pub fn new() -> Self {
        Self { menu: Menu::default() }
    }
}

impl Default for MobileMenuScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene<GameContext, SceneArg> for MobileMenuScene {
    fn init(&mut self, ctx: &mut GameContext, _arg: SceneArg) {
        self.menu = Menu::new(MobileButton::ALL.iter().map(|b| b.label().to_string()).collect());
        ctx.audio.suspend();
    }

    fn update(&mut self, ctx: &mut GameContext) {
        let button = match self.menu.update(ctx) {
            MenuInput::Nothing => return,
            MenuInput::Back => MobileButton::Back,
            MenuInput::Chosen(index) => MobileButton::ALL[index],
        };
        match button {
            MobileButton::Back => ctx.pop_scene(),
            MobileButton::Info => ctx.push_scene(SceneKind::MobilePopup, SceneArg::None),
            MobileButton::StageSelect => ctx.push_scene(SceneKind::StageSelect, SceneArg::None),
            MobileButton::Credits => ctx.push_scene(SceneKind::Credits, SceneArg::None),
        }
    }

    fn render(&mut self, ctx: &mut GameContext) {
        self.menu.render(ctx, "Menu");
    }

    fn release(&mut self, ctx: &mut GameContext) {
        ctx.audio.resume();
    }

    fn name(&self) -> &str {
        "mobilemenu"
    }
}

/// Information panel shown over the mobile menu.
pub struct MobilePopupScene {
    lines: Vec<String>,
}

impl MobilePopupScene {
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }
}

impl Default for MobilePopupScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene<GameContext, SceneArg> for MobilePopupScene {
    fn init(&mut self, ctx: &mut GameContext, _arg: SceneArg) {
        let cmd = &ctx.command_line;
        self.lines = vec![
            format!("Engine version: {}", engine_version_string()),
            format!("Game folder: {}", ctx.resources.root().display()),
            format!(
                "Language: {}",
                ctx.prefs.get_string(LANGPATH_KEY).unwrap_or("default")
            ),
            format!("Compatibility mode: {}", cmd.compatibility_version.as_deref().unwrap_or("off")),
        ];
    }

    fn update(&mut self, ctx: &mut GameContext) {
        let input = &ctx.input;
        if input.button_pressed(Button::Fire1) || input.button_pressed(Button::Fire3) || input.button_pressed(Button::Fire4) {
            ctx.pop_scene();
        }
    }

    fn render(&mut self, ctx: &mut GameContext) {
        let renderer = ctx.renderer.as_mut();
        let origin = Vec2::new(24.0, 40.0);
        let size = Vec2::new(SCREEN_WIDTH as f32 - 48.0, SCREEN_HEIGHT as f32 - 80.0);
        renderer.rect(origin, size, Color::rgba(0, 0, 0, 220), true);
        for (i, line) in self.lines.iter().enumerate() {
            renderer.text(line, origin + Vec2::new(8.0, 8.0 + i as f32 * LINE_HEIGHT), Color::WHITE);
        }
    }

    fn release(&mut self, _ctx: &mut GameContext) {}

    fn name(&self) -> &str {
        "mobilepopup"
    }
}
