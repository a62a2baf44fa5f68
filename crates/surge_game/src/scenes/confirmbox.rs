//! A yes/no style box. The chosen option (1-based) goes back to the scene
//! below as [`SceneResult::Confirm`].

use glam::Vec2;
use surge_core::{Button, Color, Scene};
use surge_platform::video::{SCREEN_HEIGHT, SCREEN_WIDTH};

use crate::context::{GameContext, SceneArg, SceneResult};

pub const MAX_OPTIONS: usize = 5;
const BOX_SIZE: Vec2 = Vec2::new(260.0, 80.0);
const SLIDE_SPEED: f32 = 5.0 * SCREEN_HEIGHT as f32;
const CHOOSE_SAMPLE: &str = "samples/choose.wav";
const CONFIRM_SAMPLE: &str = "samples/confirm.wav";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    SlidingIn,
    Choosing,
    SlidingOut,
}

pub struct ConfirmBoxScene {
    text: String,
    options: Vec<String>,
    current: usize,
    box_y: f32,
    phase: Phase,
}

impl ConfirmBoxScene {
    pub fn new() -> Self {
        Self {
            text: String::new(),
            options: Vec::new(),
            current: 0,
            box_y: SCREEN_HEIGHT as f32,
            phase: Phase::SlidingIn,
        }
    }

    fn resting_y() -> f32 {
        (SCREEN_HEIGHT as f32 - BOX_SIZE.y) / 2.0
    }

    fn box_x() -> f32 {
        (SCREEN_WIDTH as f32 - BOX_SIZE.x) / 2.0
    }
}

impl Default for ConfirmBoxScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene<GameContext, SceneArg> for ConfirmBoxScene {
    fn init(&mut self, ctx: &mut GameContext, arg: SceneArg) {
        let SceneArg::Confirm { text, mut options } = arg else {
            ctx.fail("The confirm box needs a question and its options");
            return;
        };
        if options.is_empty() {
            ctx.fail("The confirm box needs at least one option");
            return;
        }
        if options.len() > MAX_OPTIONS {
            log::warn!("Confirm box: only the first {MAX_OPTIONS} options are shown");
            options.truncate(MAX_OPTIONS);
        }
        self.text = text;
        self.options = options;
        self.current = 0;
        self.box_y = SCREEN_HEIGHT as f32;
        self.phase = Phase::SlidingIn;
    }

    fn update(&mut self, ctx: &mut GameContext) {
        let dt = ctx.dt();
        match self.phase {
            Phase::SlidingIn => {
                self.box_y -= SLIDE_SPEED * dt;
                if self.box_y <= Self::resting_y() {
                    self.box_y = Self::resting_y();
                    self.phase = Phase::Choosing;
                }
            }
            Phase::SlidingOut => {
                self.box_y += SLIDE_SPEED * dt;
                if self.box_y >= SCREEN_HEIGHT as f32 {
                    ctx.set_result(SceneResult::Confirm(self.current + 1));
                    ctx.pop_scene();
                }
            }
            Phase::Choosing => {
                let count = self.options.len();
                if ctx.input.button_pressed(Button::Left) {
                    ctx.audio.play_sample(CHOOSE_SAMPLE);
                    self.current = (self.current + count - 1) % count;
                } else if ctx.input.button_pressed(Button::Right) {
                    ctx.audio.play_sample(CHOOSE_SAMPLE);
                    self.current = (self.current + 1) % count;
                } else if ctx.input.button_pressed(Button::Fire1) || ctx.input.button_pressed(Button::Fire3) {
                    ctx.audio.play_sample(CONFIRM_SAMPLE);
                    self.phase = Phase::SlidingOut;
                }
            }
        }
    }

    fn render(&mut self, ctx: &mut GameContext) {
        let renderer = ctx.renderer.as_mut();
        let origin = Vec2::new(Self::box_x(), self.box_y);
        renderer.rect(origin, BOX_SIZE, Color::rgba(0, 0, 0, 200), true);
        renderer.rect(origin, BOX_SIZE, Color::WHITE, false);
        renderer.text(&self.text, origin + Vec2::new(10.0, 10.0), Color::WHITE);

        let column = BOX_SIZE.x / self.options.len().max(1) as f32;
        for (i, option) in self.options.iter().enumerate() {
            let position = origin + Vec2::new(i as f32 * column + 25.0, BOX_SIZE.y * 0.75);
            let color = if i == self.current { Color::YELLOW } else { Color::WHITE };
            renderer.text(option, position, color);
            if i == self.current {
                renderer.text(">", position - Vec2::new(15.0, 0.0), Color::YELLOW);
            }
        }
    }

    fn release(&mut self, _ctx: &mut GameContext) {}

    fn name(&self) -> &str {
        "confirmbox"
    }
}
