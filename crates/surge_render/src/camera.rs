use glam::Vec2;

/// 2D camera centered on `position`, in world pixels (positive y is down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera2D {
    pub position: Vec2,
    pub viewport: Vec2,
}

impl Camera2D {
    pub fn new(viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            position: Vec2::ZERO,
            viewport: Vec2::new(viewport_width as f32, viewport_height as f32),
        }
    }

    /// World position of the top-left corner of the screen.
    pub fn top_left(&self) -> Vec2 {
        self.position - self.viewport * 0.5
    }

    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        world - self.top_left()
    }

    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        screen + self.top_left()
    }

    /// Rectangle (x, y, w, h) of `factor` screens centered on the camera.
    pub fn region(&self, factor: f32) -> (f32, f32, f32, f32) {
        let size = self.viewport * factor;
        let corner = self.position - size * 0.5;
        (corner.x, corner.y, size.x, size.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_and_screen_conversions_are_inverse() {
        let mut camera = Camera2D::new(426, 240);
        camera.position = Vec2::new(500.0, 300.0);
        let world = Vec2::new(321.0, 77.0);
        let screen = camera.world_to_screen(world);
        assert_eq!(camera.screen_to_world(screen), world);
        assert_eq!(camera.world_to_screen(camera.position), Vec2::new(213.0, 120.0));
    }

    #[test]
    fn region_is_centered_on_camera() {
        let mut camera = Camera2D::new(100, 50);
        camera.position = Vec2::new(1000.0, 1000.0);
        let (x, y, w, h) = camera.region(3.0);
        assert_eq!((x, y, w, h), (850.0, 925.0, 300.0, 150.0));
    }
}
