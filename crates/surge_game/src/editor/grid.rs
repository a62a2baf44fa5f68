//! Snapping grid of the editor cursor.

use glam::Vec2;
use surge_core::Color;
use surge_platform::video::{SCREEN_HEIGHT, SCREEN_WIDTH};
use surge_platform::Renderer;

/// Grid sizes in pixels, in cycling order.
pub const GRID_SIZES: [u32; 3] = [16, 8, 1];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    index: usize,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

impl Grid {
    pub fn new() -> Self {
        Self { index: 0 }
    }

    pub fn size(&self) -> u32 {
        GRID_SIZES[self.index]
    }

    pub fn is_enabled(&self) -> bool {
        self.size() > 1
    }

    /// 16 -> 8 -> 1 -> 16.
    pub fn cycle(&mut self) {
        self.index = (self.index + 1) % GRID_SIZES.len();
    }

    /// Snaps a world position down to the grid. The grid is anchored at the
    /// world origin, so it stays put while the camera scrolls.
    pub fn snap(&self, world: Vec2) -> Vec2 {
        let size = self.size() as f32;
        (world / size).floor() * size
    }

    /// Draws the grid points visible from `top_left`.
    pub fn render(&self, renderer: &mut dyn Renderer, top_left: Vec2) {
        if !self.is_enabled() {
            return;
        }
        let size = self.size() as f32;
        let color = Color::rgba(255, 255, 255, 64);
        let start = self.snap(top_left) - top_left;
        let mut y = start.y;
        while y < SCREEN_HEIGHT as f32 {
            let mut x = start.x;
            while x < SCREEN_WIDTH as f32 {
                renderer.rect(Vec2::new(x, y), Vec2::ONE, color, true);
                x += size;
            }
            y += size;
        }
    }
}
