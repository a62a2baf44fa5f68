//! "GAME OVER": the two words slide in, the screen fades out, the quest is
//! aborted.

use glam::Vec2;
use surge_core::{Color, Scene};
use surge_platform::video::{SCREEN_HEIGHT, SCREEN_WIDTH};

use crate::context::{GameContext, SceneArg};

pub const GAMEOVER_APPEARTIME: f32 = 1.0;
pub const GAMEOVER_FADETIME: f32 = 2.0;
const GAMEOVER_MUSIC: &str = "musics/gameover.ogg";
const WORDS: [&str; 2] = ["GAME", "OVER"];
const GLYPH_WIDTH: f32 = 8.0;
const SPACING: f32 = 16.0;

pub struct GameOverScene {
    timer: f32,
}

impl GameOverScene {
    pub fn new() -> Self {
        Self { timer: 0.0 }
    }

    /// 0 while the words slide in, 1 once the screen is black.
    fn fade(&self) -> f32 {
        ((self.timer - GAMEOVER_APPEARTIME) / GAMEOVER_FADETIME).clamp(0.0, 1.0)
    }
}

impl Default for GameOverScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene<GameContext, SceneArg> for GameOverScene {
    fn init(&mut self, ctx: &mut GameContext, _arg: SceneArg) {
        self.timer = 0.0;
        ctx.audio.play_music(GAMEOVER_MUSIC, false);
    }

    fn update(&mut self, ctx: &mut GameContext) {
        self.timer += ctx.dt();
        if self.timer >= GAMEOVER_APPEARTIME + GAMEOVER_FADETIME {
            ctx.abort_quest();
            ctx.pop_scene();
        }
    }

    fn render(&mut self, ctx: &mut GameContext) {
        let t = (self.timer / GAMEOVER_APPEARTIME).min(1.0);
        let widths = WORDS.map(|w| w.len() as f32 * GLYPH_WIDTH);
        let y = SCREEN_HEIGHT as f32 / 2.0 - 4.0;
        let screen_w = SCREEN_WIDTH as f32;
        let total = widths[0] + SPACING + widths[1];
        let left_target = (screen_w - total) / 2.0;
        let right_target = left_target + widths[0] + SPACING;

        let renderer = ctx.renderer.as_mut();
        let left_x = lerp(-widths[0], left_target, t);
        let right_x = lerp(screen_w + widths[1], right_target, t);
        renderer.text(WORDS[0], Vec2::new(left_x, y), Color::WHITE);
        renderer.text(WORDS[1], Vec2::new(right_x, y), Color::WHITE);

        let alpha = (self.fade() * 255.0) as u8;
        if alpha > 0 {
            renderer.rect(
                Vec2::ZERO,
                Vec2::new(screen_w, SCREEN_HEIGHT as f32),
                Color::BLACK.with_alpha(alpha),
                true,
            );
        }
    }

    fn release(&mut self, ctx: &mut GameContext) {
        ctx.audio.stop_music();
        ctx.abort_quest();
    }

    fn name(&self) -> &str {
        "gameover"
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SceneRequest;
    use std::path::Path;

    #[test]
    fn the_scene_pops_after_appearing_and_fading() {
        let mut ctx = GameContext::headless(Path::new(".")).expect("context");
        let mut scene = GameOverScene::new();
        scene.init(&mut ctx, SceneArg::None);
        assert_eq!(ctx.audio.music_path(), Some(GAMEOVER_MUSIC));

        let mut frames = 0;
        loop {
            ctx.timer.advance(0.1);
            scene.update(&mut ctx);
            frames += 1;
            if ctx.has_requests() {
                break;
            }
            assert!(frames < 100, "never left the game over screen");
        }
        assert!(frames >= 29);
        assert_eq!(ctx.take_requests(), vec![SceneRequest::Pop]);
        assert!(ctx.take_quest_abort());
    }

    #[test]
    fn the_screen_darkens_only_after_the_words_are_in() {
        let mut scene = GameOverScene::new();
        scene.timer = 0.5;
        assert_eq!(scene.fade(), 0.0);
        scene.timer = GAMEOVER_APPEARTIME + GAMEOVER_FADETIME / 2.0;
        assert!((scene.fade() - 0.5).abs() < 1e-6);
    }
}
