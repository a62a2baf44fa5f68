//! The level camera: follows a focus point, stays inside the level and can be
//! locked to a rectangle by scripts.

use glam::Vec2;
use surge_platform::video::{SCREEN_HEIGHT, SCREEN_WIDTH};
use surge_render::Camera2D;

use super::actor::Rect;

/// Fraction of the distance to the focus covered per second.
const SMOOTHING: f32 = 4.0;

#[derive(Debug, Clone)]
pub struct LevelCamera {
    camera: Camera2D,
    level_size: Vec2,
    lock: Option<Rect>,
}

impl LevelCamera {
    pub fn new(level_size: Vec2) -> Self {
        Self {
            camera: Camera2D::new(SCREEN_WIDTH, SCREEN_HEIGHT),
            level_size,
            lock: None,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.camera.position
    }

    pub fn top_left(&self) -> Vec2 {
        self.camera.top_left()
    }

    pub fn inner(&self) -> &Camera2D {
        &self.camera
    }

    pub fn set_level_size(&mut self, size: Vec2) {
        self.level_size = size;
    }

    /// Jumps to `position` without smoothing.
    pub fn set_position(&mut self, position: Vec2) {
        self.camera.position = self.clip(position);
    }

    /// Moves toward `focus`. In debug mode the camera sticks to it.
    pub fn update(&mut self, focus: Vec2, dt: f32, debug_mode: bool) {
        let target = self.clip(focus);
        if debug_mode {
            self.camera.position = focus;
            return;
        }
        let t = (SMOOTHING * dt).min(1.0);
        self.camera.position = self.clip(self.camera.position.lerp(target, t));
    }

    /// Restricts the camera to a world rectangle, clipped to the level.
    pub fn lock(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) {
        let max_x = (self.level_size.x as i32 - 1).max(0);
        let max_y = (self.level_size.y as i32 - 1).max(0);
        let left = x1.min(x2).max(0);
        let top = y1.min(y2).max(0);
        let right = x1.max(x2).min(max_x);
        let bottom = y1.max(y2).min(max_y);
        self.lock = Some(Rect::new(
            left as f32,
            top as f32,
            (right - left) as f32,
            (bottom - top) as f32,
        ));
    }

    pub fn unlock(&mut self) {
        self.lock = None;
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    /// Clamps a camera center so the screen stays inside the level or the lock.
    pub fn clip(&self, position: Vec2) -> Vec2 {
        let half = self.camera.viewport * 0.5;
        let (x1, y1, x2, y2) = match self.lock {
            Some(r) => (r.x, r.y, r.right(), r.bottom()),
            None => (0.0, 0.0, self.level_size.x, self.level_size.y),
        };
        let min = Vec2::new(x1 + half.x, y1 + half.y);
        let max = Vec2::new((x2 - half.x).max(min.x), (y2 - half.y).max(min.y));
        position.clamp(min, max)
    }

    /// `factor` screens around the camera, as a rectangle.
    pub fn region(&self, factor: f32) -> Rect {
        let (x, y, w, h) = self.camera.region(factor);
        Rect::new(x, y, w, h)
    }
}
