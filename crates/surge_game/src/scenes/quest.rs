//! Quests: ordered lists of levels played one after the other.
//!
//! A `.qst` file uses the same line syntax as a level:
//!
//! ```text
//! name "Sunshine Paradise"
//! author "..."
//! level "levels/sunshine-1.lev"
//! level "<credits>"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec2;
use surge_core::{Color, Scene};

use crate::context::{GameContext, LevelArg, SceneArg};
use crate::level::lev::tokenize;
use crate::storyboard::SceneKind;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Quest {
    pub file: PathBuf,
    pub name: String,
    pub author: String,
    pub version: String,
    pub description: String,
    pub image: String,
    pub hidden: bool,
    /// Level paths or scene symbols such as `<credits>`.
    pub levels: Vec<String>,
}

pub fn parse_quest(text: &str, path: &Path) -> Result<Quest, String> {
    let mut quest = Quest {
        file: path.to_path_buf(),
        ..Quest::default()
    };
    for (index, line) in text.lines().enumerate() {
        let Some((identifier, params)) = tokenize(line) else {
            continue;
        };
        let one = || -> Option<String> { (params.len() == 1).then(|| params[0].clone()) };
        let field = match identifier.to_ascii_lowercase().as_str() {
            "name" => &mut quest.name,
            "author" => &mut quest.author,
            "version" => &mut quest.version,
            "description" => &mut quest.description,
            "image" => &mut quest.image,
            "hidden" => {
                quest.hidden = true;
                continue;
            }
            "level" => {
                match one() {
                    Some(level) => quest.levels.push(level),
                    None => log::warn!("Quest {} line {}: level takes one parameter", path.display(), index + 1),
                }
                continue;
            }
            other => {
                log::warn!("Quest {} line {}: unknown command '{other}'", path.display(), index + 1);
                continue;
            }
        };
        match one() {
            Some(value) => *field = value,
            None => log::warn!(
                "Quest {} line {}: {identifier} takes one parameter",
                path.display(),
                index + 1
            ),
        }
    }
    if quest.levels.is_empty() {
        return Err(format!("Quest {} has no levels", path.display()));
    }
    Ok(quest)
}

pub fn load_quest_from_path(path: &Path) -> Result<Quest, String> {
    let raw = fs::read_to_string(path).map_err(|e| format!("Failed to read quest {}: {e}", path.display()))?;
    parse_quest(&raw, path)
}

/// Pushes the levels of a quest in turn. Each time the scene gets back on
/// top of the stack, the previous entry is over.
pub struct QuestScene {
    quest: Quest,
    next_level: usize,
    aborted: bool,
}

impl QuestScene {
    pub fn new() -> Self {
        Self {
            quest: Quest::default(),
            next_level: 0,
            aborted: false,
        }
    }

    pub fn quest(&self) -> &Quest {
        &self.quest
    }

    /// Jumps to entry `id`; `levels.len()` clears the quest.
    pub fn set_next_level(&mut self, id: usize) {
        self.next_level = id.min(self.quest.levels.len());
    }

    fn push_entry(&self, ctx: &mut GameContext, entry: &str) {
        if entry.starts_with('<') && entry.ends_with('>') {
            match SceneKind::from_quest_symbol(entry) {
                Some(kind) => ctx.push_scene(kind, SceneArg::None),
                None => ctx.fail(format!("Quest error: unrecognized symbol '{entry}'")),
            }
        } else if entry.ends_with(".qst") {
            ctx.push_scene(SceneKind::Quest, SceneArg::Path(PathBuf::from(entry)));
        } else {
            ctx.push_scene(SceneKind::Level, SceneArg::Level(LevelArg::new(entry)));
        }
    }
}

impl Default for QuestScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene<GameContext, SceneArg> for QuestScene {
    fn init(&mut self, ctx: &mut GameContext, arg: SceneArg) {
        let SceneArg::Path(relative) = arg else {
            ctx.fail("The quest scene needs the path of a quest");
            return;
        };
        let path = ctx.resources.resolve(&relative.to_string_lossy());
        match load_quest_from_path(&path) {
            Ok(quest) => {
                log::info!("Pushed quest \"{}\" ({})", quest.name, path.display());
                self.quest = quest;
                self.next_level = 0;
                self.aborted = false;
            }
            Err(e) => ctx.fail(e),
        }
    }

    fn update(&mut self, ctx: &mut GameContext) {
        if ctx.take_quest_abort() {
            self.aborted = true;
        }
        if ctx.fatal_error().is_some() {
            return;
        }
        if !self.aborted && self.next_level < self.quest.levels.len() {
            let entry = self.quest.levels[self.next_level].clone();
            self.next_level += 1;
            self.push_entry(ctx, &entry);
        } else {
            log::info!(
                "Quest \"{}\" has been {}",
                self.quest.name,
                if self.aborted { "aborted" } else { "cleared" }
            );
            ctx.pop_scene();
        }
    }

    fn render(&mut self, ctx: &mut GameContext) {
        ctx.renderer.text(&self.quest.name, Vec2::new(8.0, 8.0), Color::WHITE);
    }

    fn release(&mut self, _ctx: &mut GameContext) {}

    fn name(&self) -> &str {
        "quest"
    }
}
