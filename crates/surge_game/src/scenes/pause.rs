//! The pause screen. Fire3 resumes; Fire4 asks whether to leave the quest.

use glam::Vec2;
use surge_core::{Button, Color, Scene};
use surge_platform::video::{SCREEN_HEIGHT, SCREEN_WIDTH};

use crate::context::{GameContext, SceneArg, SceneResult};
use crate::storyboard::SceneKind;

const QUIT_FADETIME: f32 = 1.0;
const BLINK_FREQUENCY: f32 = 2.0;

pub struct PauseScene {
    timer: f32,
    /// Fire3 must be released once before it can resume the game.
    ready: bool,
    quit_fade: Option<f32>,
}

impl PauseScene {
    pub fn new() -> Self {
        Self {
            timer: 0.0,
            ready: false,
            quit_fade: None,
        }
    }
}

impl Default for PauseScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene<GameContext, SceneArg> for PauseScene {
    fn init(&mut self, ctx: &mut GameContext, _arg: SceneArg) {
        self.timer = 0.0;
        self.ready = false;
        self.quit_fade = None;
        ctx.audio.suspend();
        log::debug!("Game paused");
    }

    fn update(&mut self, ctx: &mut GameContext) {
        let dt = ctx.dt();

        if let Some(fade) = self.quit_fade.as_mut() {
            *fade += dt;
            if *fade >= QUIT_FADETIME {
                ctx.pop_scene();
                ctx.pop_scene();
                ctx.abort_quest();
            }
            return;
        }
        self.timer += dt;

        if ctx.take_result() == Some(SceneResult::Confirm(1)) {
            self.quit_fade = Some(0.0);
            return;
        }

        if ctx.input.button_pressed(Button::Fire4) {
            ctx.push_scene(
                SceneKind::ConfirmBox,
                SceneArg::Confirm {
                    text: "Quit the game?".to_string(),
                    options: vec!["Yes".to_string(), "No".to_string()],
                },
            );
            return;
        }

        if self.ready {
            if ctx.input.button_pressed(Button::Fire3) {
                ctx.pop_scene();
            }
        } else if !ctx.input.button_down(Button::Fire3) {
            self.ready = true;
        }
    }

    fn render(&mut self, ctx: &mut GameContext) {
        let renderer = ctx.renderer.as_mut();
        let screen = Vec2::new(SCREEN_WIDTH as f32, SCREEN_HEIGHT as f32);
        renderer.rect(Vec2::ZERO, screen, Color::rgba(0, 0, 0, 128), true);

        let pulse = 0.5 + 0.5 * (BLINK_FREQUENCY * self.timer).cos().abs();
        let label = Color::WHITE.with_alpha((pulse * 255.0) as u8);
        renderer.text("PAUSED", screen / 2.0 - Vec2::new(24.0, 4.0), label);

        if let Some(fade) = self.quit_fade {
            let alpha = ((fade / QUIT_FADETIME).min(1.0) * 255.0) as u8;
            renderer.rect(Vec2::ZERO, screen, Color::BLACK.with_alpha(alpha), true);
        }
    }

    fn release(&mut self, ctx: &mut GameContext) {
        ctx.audio.resume();
        log::debug!("Game resumed");
    }

    fn name(&self) -> &str {
        "pause"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SceneRequest;
    use std::path::Path;
    use surge_core::Key;

    fn tick(ctx: &mut GameContext, scene: &mut PauseScene) -> Vec<SceneRequest> {
        ctx.timer.advance(1.0 / 60.0);
        scene.update(ctx);
        ctx.input.end_frame();
        ctx.take_requests()
    }

    #[test]
    fn the_key_that_paused_does_not_resume_at_once() {
        let mut ctx = GameContext::headless(Path::new(".")).expect("context");
        let mut scene = PauseScene::new();
        scene.init(&mut ctx, SceneArg::None);

        ctx.input.key_down(Key::Escape);
        assert!(tick(&mut ctx, &mut scene).is_empty());
        ctx.input.key_up(Key::Escape);
        assert!(tick(&mut ctx, &mut scene).is_empty());

        ctx.input.key_down(Key::Escape);
        assert_eq!(tick(&mut ctx, &mut scene), vec![SceneRequest::Pop]);
        scene.release(&mut ctx);
    }

    #[test]
    fn confirming_the_quit_pops_the_level_too() {
        let mut ctx = GameContext::headless(Path::new(".")).expect("context");
        let mut scene = PauseScene::new();
        scene.init(&mut ctx, SceneArg::None);

        ctx.input.key_down(Key::P);
        let requests = tick(&mut ctx, &mut scene);
        assert!(matches!(requests.as_slice(), [SceneRequest::Push(SceneKind::ConfirmBox, _)]));
        ctx.input.key_up(Key::P);

        ctx.set_result(SceneResult::Confirm(1));
        let mut requests = Vec::new();
        for _ in 0..120 {
            requests.extend(tick(&mut ctx, &mut scene));
            if !requests.is_empty() {
                break;
            }
        }
        assert_eq!(requests, vec![SceneRequest::Pop, SceneRequest::Pop]);
        assert!(ctx.take_quest_abort());
    }
}
