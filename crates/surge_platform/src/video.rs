//! Drawing surface consumed by the game.
//!
//! The game describes a frame as a list of draw commands in screen space.
//! Backends implement [`Renderer`]; [`RecordingRenderer`] keeps the commands
//! of the last frame so headless runs and tests can inspect them.

use glam::Vec2;
use surge_core::Color;

/// Logical screen size in pixels.
pub const SCREEN_WIDTH: u32 = 426;
pub const SCREEN_HEIGHT: u32 = 240;

pub fn screen_size() -> Vec2 {
    Vec2::new(SCREEN_WIDTH as f32, SCREEN_HEIGHT as f32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flip {
    pub horizontal: bool,
    pub vertical: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Color),
    Sprite {
        image: String,
        position: Vec2,
        size: Vec2,
        flip: Flip,
        tint: Color,
    },
    Rect {
        position: Vec2,
        size: Vec2,
        color: Color,
        filled: bool,
    },
    Line {
        from: Vec2,
        to: Vec2,
        color: Color,
    },
    Text {
        text: String,
        position: Vec2,
        color: Color,
    },
}

pub trait Renderer {
    fn begin_frame(&mut self);
    fn submit(&mut self, command: DrawCommand);
    fn end_frame(&mut self);

    fn sprite(&mut self, image: &str, position: Vec2, size: Vec2, flip: Flip, tint: Color) {
        self.submit(DrawCommand::Sprite {
            image: image.to_string(),
            position,
            size,
            flip,
            tint,
        });
    }

    fn rect(&mut self, position: Vec2, size: Vec2, color: Color, filled: bool) {
        self.submit(DrawCommand::Rect {
            position,
            size,
            color,
            filled,
        });
    }

    fn line(&mut self, from: Vec2, to: Vec2, color: Color) {
        self.submit(DrawCommand::Line { from, to, color });
    }

    fn text(&mut self, text: &str, position: Vec2, color: Color) {
        self.submit(DrawCommand::Text {
            text: text.to_string(),
            position,
            color,
        });
    }
}

#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pending: Vec<DrawCommand>,
    last_frame: Vec<DrawCommand>,
    pub frames: u64,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_frame(&self) -> &[DrawCommand] {
        &self.last_frame
    }

    /// Commands submitted since `begin_frame`, before the frame ends.
    pub fn pending(&self) -> &[DrawCommand] {
        &self.pending
    }
}

impl Renderer for RecordingRenderer {
    fn begin_frame(&mut self) {
        self.pending.clear();
    }

    fn submit(&mut self, command: DrawCommand) {
        self.pending.push(command);
    }

    fn end_frame(&mut self) {
        self.last_frame = std::mem::take(&mut self.pending);
        self.frames += 1;
    }
}
