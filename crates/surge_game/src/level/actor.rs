//! The moving, drawable part shared by legacy items, legacy objects and players.

use glam::Vec2;
use surge_core::Color;
use surge_platform::{Flip, Renderer};

/// Axis-aligned rectangle in world space. `(x, y)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w * 0.5, self.y + self.h * 0.5)
    }

    /// Touching edges count as an intersection.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Grows the rectangle by `dx` on the left and right and `dy` on the top and bottom.
    pub fn expanded(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(self.x - dx, self.y - dy, self.w + 2.0 * dx, self.h + 2.0 * dy)
    }
}

#[derive(Debug, Clone)]
pub struct Actor {
    pub position: Vec2,
    pub spawn_point: Vec2,
    /// Offset from the top-left corner of the sprite to `position`.
    pub hot_spot: Vec2,
    pub size: Vec2,
    pub speed: Vec2,
    pub alpha: f32,
    pub visible: bool,
    pub flip: Flip,
    pub sprite: String,
}

impl Actor {
    pub fn new(position: Vec2, size: Vec2, sprite: &str) -> Self {
        Self {
            position,
            spawn_point: position,
            hot_spot: Vec2::new(size.x * 0.5, size.y),
            size,
            speed: Vec2::ZERO,
            alpha: 1.0,
            visible: true,
            flip: Flip::default(),
            sprite: sprite.to_string(),
        }
    }

    pub fn bounding_box(&self) -> Rect {
        let top_left = self.position - self.hot_spot;
        Rect::new(top_left.x, top_left.y, self.size.x, self.size.y)
    }

    pub fn collision(&self, other: &Actor) -> bool {
        self.bounding_box().intersects(&other.bounding_box())
    }

    /// Moves along `speed` for `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        self.position += self.speed * dt;
    }

    pub fn move_to_spawn_point(&mut self) {
        self.position = self.spawn_point;
        self.speed = Vec2::ZERO;
    }

    pub fn render(&self, renderer: &mut dyn Renderer, top_left: Vec2) {
        if !self.visible {
            return;
        }
        let bb = self.bounding_box();
        let alpha = (self.alpha.clamp(0.0, 1.0) * 255.0) as u8;
        renderer.sprite(
            &self.sprite,
            Vec2::new(bb.x, bb.y) - top_left,
            self.size,
            self.flip,
            Color::WHITE.with_alpha(alpha),
        );
    }
}
