//! Registry of the scenes the game can push.

use surge_core::Scene;

use crate::context::{GameContext, SceneArg};
use crate::scenes::confirmbox::ConfirmBoxScene;
use crate::scenes::editor_help::EditorHelpScene;
use crate::scenes::editor_palette::EditorPaletteScene;
use crate::scenes::gameover::GameOverScene;
use crate::scenes::level::LevelScene;
use crate::scenes::menus::{
    CreditsScene, IntroScene, LangSelectScene, MobileMenuScene, MobilePopupScene, OptionsScene,
    QuestSelectScene, StageSelectScene,
};
use crate::scenes::pause::PauseScene;
use crate::scenes::quest::QuestScene;

pub type BoxedScene = Box<dyn Scene<GameContext, SceneArg>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneKind {
    Level,
    Pause,
    GameOver,
    Quest,
    Intro,
    ConfirmBox,
    LangSelect,
    Credits,
    Options,
    StageSelect,
    QuestSelect,
    EditorHelp,
    EditorPal,
    MobileMenu,
    MobilePopup,
}

impl SceneKind {
    pub const ALL: &'static [SceneKind] = &[
        SceneKind::Level,
        SceneKind::Pause,
        SceneKind::GameOver,
        SceneKind::Quest,
        SceneKind::Intro,
        SceneKind::ConfirmBox,
        SceneKind::LangSelect,
        SceneKind::Credits,
        SceneKind::Options,
        SceneKind::StageSelect,
        SceneKind::QuestSelect,
        SceneKind::EditorHelp,
        SceneKind::EditorPal,
        SceneKind::MobileMenu,
        SceneKind::MobilePopup,
    ];

    /// Scene a quest entry such as `<credits>` refers to.
    pub fn from_quest_symbol(symbol: &str) -> Option<SceneKind> {
        match symbol.to_ascii_lowercase().as_str() {
            "<options>" => Some(SceneKind::Options),
            "<language_select>" => Some(SceneKind::LangSelect),
            "<credits>" => Some(SceneKind::Credits),
            "<stage_select>" => Some(SceneKind::StageSelect),
            "<quest_select>" => Some(SceneKind::QuestSelect),
            _ => None,
        }
    }
}

pub struct Storyboard;

impl Storyboard {
    /// A fresh, uninitialised scene of the given kind.
    pub fn create(kind: SceneKind) -> BoxedScene {
        match kind {
            SceneKind::Level => Box::new(LevelScene::new()),
            SceneKind::Pause => Box::new(PauseScene::new()),
            SceneKind::GameOver => Box::new(GameOverScene::new()),
            SceneKind::Quest => Box::new(QuestScene::new()),
            SceneKind::Intro => Box::new(IntroScene::new()),
            SceneKind::ConfirmBox => Box::new(ConfirmBoxScene::new()),
            SceneKind::LangSelect => Box::new(LangSelectScene::new()),
            SceneKind::Credits => Box::new(CreditsScene::new()),
            SceneKind::Options => Box::new(OptionsScene::new()),
            SceneKind::StageSelect => Box::new(StageSelectScene::new()),
            SceneKind::QuestSelect => Box::new(QuestSelectScene::new()),
            SceneKind::EditorHelp => Box::new(EditorHelpScene::new()),
            SceneKind::EditorPal => Box::new(EditorPaletteScene::new()),
            SceneKind::MobileMenu => Box::new(MobileMenuScene::new()),
            SceneKind::MobilePopup => Box::new(MobilePopupScene::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_kind_has_a_distinctly_named_scene() {
        let names: HashSet<String> = SceneKind::ALL
            .iter()
            .map(|k| Storyboard::create(*k).name().to_string())
            .collect();
        assert_eq!(names.len(), SceneKind::ALL.len());
    }

    #[test]
    fn quest_symbols() {
        assert_eq!(SceneKind::from_quest_symbol("<Credits>"), Some(SceneKind::Credits));
        assert_eq!(SceneKind::from_quest_symbol("<nope>"), None);
    }
}
