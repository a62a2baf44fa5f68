//! Legacy objects (`object <name> <x> <y>`). Only a fallback variant remains:
//! the object is drawn, can block, and can be carried by a player.

use std::sync::Arc;

use glam::Vec2;
use surge_platform::Renderer;

use super::actor::{Actor, Rect};
use super::collision_mask::CollisionMask;
use super::obstacle::{Layer, Obstacle, ObstacleFlags};

const OBJECT_SIZE: Vec2 = Vec2::new(32.0, 32.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    Idle,
    Dead,
}

#[derive(Debug, Clone)]
pub struct LegacyObject {
    pub name: String,
    pub zindex: f32,
    pub actor: Actor,
    pub state: ObjectState,
    pub obstacle: bool,
    pub always_active: bool,
    pub preserve: bool,
    pub created_from_editor: bool,
    /// Set during an update to glue the object to the player for this tick.
    pub attached_to_player: bool,
    pub attached_offset: Vec2,
    mask: Arc<CollisionMask>,
}

impl LegacyObject {
    pub fn new(name: &str, position: Vec2) -> Self {
        Self {
            name: name.to_string(),
            zindex: 0.5,
            actor: Actor::new(position, OBJECT_SIZE, &format!("SD_{}", name.to_ascii_uppercase())),
            state: ObjectState::Idle,
            obstacle: false,
            always_active: false,
            preserve: true,
            created_from_editor: true,
            attached_to_player: false,
            attached_offset: Vec2::ZERO,
            mask: Arc::new(CollisionMask::create_box(OBJECT_SIZE.x as u32, OBJECT_SIZE.y as u32)),
        }
    }

    pub fn position(&self) -> Vec2 {
        self.actor.position
    }

    pub fn spawn_point(&self) -> Vec2 {
        self.actor.spawn_point
    }

    pub fn bounding_box(&self) -> Rect {
        self.actor.bounding_box()
    }

    pub fn is_dead(&self) -> bool {
        self.state == ObjectState::Dead
    }

    pub fn kill(&mut self) {
        self.state = ObjectState::Dead;
    }

    pub fn z_index(&self) -> f64 {
        self.zindex as f64
    }

    pub fn attach_to_player(&mut self, offset: Vec2) {
        self.attached_to_player = true;
        self.attached_offset = offset;
    }

    /// Moves an attached object along with `player_position` and detaches it.
    pub fn apply_attachment(&mut self, player_position: Vec2) {
        if self.attached_to_player {
            self.actor.position = player_position + self.attached_offset;
            self.attached_to_player = false;
        }
    }

    pub fn obstacle(&self) -> Option<Obstacle> {
        if !self.obstacle || self.is_dead() {
            return None;
        }
        let bb = self.bounding_box();
        Some(Obstacle::new(
            Arc::clone(&self.mask),
            bb.x as i32,
            bb.y as i32,
            Layer::Default,
            ObstacleFlags::SOLID,
        ))
    }

    pub fn update(&mut self, dt: f32) {
        if !self.is_dead() {
            self.actor.step(dt);
        }
    }

    pub fn render(&self, renderer: &mut dyn Renderer, top_left: Vec2) {
        self.actor.render(renderer, top_left);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_is_applied_once() {
        let mut object = LegacyObject::new("crate", Vec2::new(10.0, 10.0));
        object.attach_to_player(Vec2::new(0.0, -40.0));
        object.apply_attachment(Vec2::new(100.0, 100.0));
        assert_eq!(object.position(), Vec2::new(100.0, 60.0));
        assert!(!object.attached_to_player);
        object.apply_attachment(Vec2::new(200.0, 200.0));
        assert_eq!(object.position(), Vec2::new(100.0, 60.0));
    }

    #[test]
    fn only_blocking_objects_have_obstacles() {
        let mut object = LegacyObject::new("crate", Vec2::new(16.0, 32.0));
        assert!(object.obstacle().is_none());
        object.obstacle = true;
        let obstacle = object.obstacle().expect("blocking object");
        assert_eq!(obstacle.position(), (0, 0));
        object.kill();
        assert!(object.obstacle().is_none());
    }
}
