//! Debris: pieces of broken bricks and similar short-lived sprites.

use glam::Vec2;
use surge_core::Color;
use surge_platform::{Flip, Renderer};

use super::actor::Rect;

#[derive(Debug, Clone)]
pub struct Particle {
    pub sprite: String,
    pub position: Vec2,
    pub size: Vec2,
    pub speed: Vec2,
}

#[derive(Debug, Default)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
}

impl ParticleSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sprite: &str, position: Vec2, size: Vec2, speed: Vec2) {
        self.particles.push(Particle {
            sprite: sprite.to_string(),
            position,
            size,
            speed,
        });
    }

    /// Moves every particle under `gravity`; particles leaving `area` are removed.
    pub fn update(&mut self, dt: f32, gravity: f32, area: &Rect) {
        self.particles.retain_mut(|p| {
            let bounds = Rect::new(p.position.x, p.position.y, p.size.x, p.size.y);
            if !bounds.intersects(area) {
                return false;
            }
            p.position.x += p.speed.x * dt;
            p.position.y += p.speed.y * dt + 0.5 * gravity * dt * dt;
            p.speed.y += gravity * dt;
            true
        });
    }

    pub fn render(&self, renderer: &mut dyn Renderer, top_left: Vec2) {
        for p in &self.particles {
            renderer.sprite(&p.sprite, p.position - top_left, p.size, Flip::default(), Color::WHITE);
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn particles_fall_and_leave_the_area() {
        let mut particles = ParticleSystem::new();
        let area = Rect::new(0.0, 0.0, 100.0, 100.0);
        particles.add("piece", Vec2::new(50.0, 50.0), Vec2::splat(4.0), Vec2::new(0.0, -100.0));
        particles.update(0.1, 800.0, &area);
        assert_eq!(particles.len(), 1);
        for _ in 0..100 {
            particles.update(0.1, 800.0, &area);
        }
        assert!(particles.is_empty());
    }
}
