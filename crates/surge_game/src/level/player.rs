//! Players: a controller driven by buttons, colliding against the obstacle map.

use glam::Vec2;

use super::actor::{Actor, Rect};
use super::collision_mask::GroundDir;
use super::obstacle::Layer;
use super::obstacle_map::{MovMode, ObstacleMap};

/// Characters spawned when a level doesn't list its players.
pub const DEFAULT_TEAM: &[&str] = &["Surge", "Neon", "Charge"];

pub const PLAYER_INITIAL_LIVES: i32 = 5;
const MAX_COLLECTIBLES: i32 = 999;

const PLAYER_WIDTH: f32 = 24.0;
const PLAYER_HEIGHT: f32 = 40.0;

/// Vertical speed of a player when it's killed.
const DEATH_SPEED: f32 = -420.0;
const HIT_SPEED: Vec2 = Vec2::new(120.0, -240.0);

/// Buttons relevant to a player on one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerInput {
    pub left: bool,
    pub right: bool,
    pub down: bool,
    pub jump: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct PhysicsConfig {
    pub top_speed: f32,
    pub accel_ground: f32,
    pub accel_air: f32,
    pub friction_ground: f32,
    pub gravity: f32,
    pub max_fall_speed: f32,
    pub jump_speed: f32,
    pub roll_threshold: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            top_speed: 360.0,
            accel_ground: 675.0,
            accel_air: 675.0,
            friction_ground: 675.0,
            gravity: 787.5,
            max_fall_speed: 960.0,
            jump_speed: -390.0,
            roll_threshold: 61.875,
        }
    }
}

/// Counters shared by the whole team.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamStats {
    collectibles: i32,
    hundreds: i32,
    lives: i32,
    score: i32,
}

impl TeamStats {
    pub fn new() -> Self {
        Self {
            collectibles: 0,
            hundreds: 0,
            lives: PLAYER_INITIAL_LIVES,
            score: 0,
        }
    }

    pub fn collectibles(&self) -> i32 {
        self.collectibles
    }

    /// Every hundred collectibles is worth an extra life.
    pub fn set_collectibles(&mut self, count: i32) {
        self.collectibles = count.clamp(0, MAX_COLLECTIBLES);
        if count / 100 > self.hundreds {
            self.hundreds = count / 100;
            self.lives += 1;
        }
    }

    pub fn add_collectibles(&mut self, count: i32) {
        self.set_collectibles(self.collectibles + count);
    }

    pub fn lives(&self) -> i32 {
        self.lives
    }

    pub fn set_lives(&mut self, lives: i32) {
        self.lives = lives.max(0);
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn add_score(&mut self, points: i32) {
        self.score = self.score.saturating_add(points).max(0);
    }
}

impl Default for TeamStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub name: String,
    pub actor: Actor,
    pub layer: Layer,
    pub config: PhysicsConfig,
    pub disable_movement: bool,
    grounded: bool,
    rolling: bool,
    jumping: bool,
    springing: bool,
    getting_hit: bool,
    dying: bool,
    blinking_timer: f32,
    blocked_left: bool,
    blocked_right: bool,
}

impl Player {
    pub fn new(name: &str, position: Vec2) -> Self {
        let mut actor = Actor::new(position, Vec2::new(PLAYER_WIDTH, PLAYER_HEIGHT), name);
        actor.hot_spot = Vec2::new(PLAYER_WIDTH * 0.5, PLAYER_HEIGHT);
        Self {
            name: name.to_string(),
            actor,
            layer: Layer::Default,
            config: PhysicsConfig::default(),
            disable_movement: false,
            grounded: false,
            rolling: false,
            jumping: false,
            springing: false,
            getting_hit: false,
            dying: false,
            blinking_timer: 0.0,
            blocked_left: false,
            blocked_right: false,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.actor.position
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.actor.position = position;
    }

    pub fn bounding_box(&self) -> Rect {
        self.actor.bounding_box()
    }

    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    pub fn is_in_the_air(&self) -> bool {
        !self.grounded
    }

    pub fn is_rolling(&self) -> bool {
        self.rolling
    }

    pub fn is_jumping(&self) -> bool {
        self.jumping
    }

    pub fn is_springing(&self) -> bool {
        self.springing
    }

    pub fn is_getting_hit(&self) -> bool {
        self.getting_hit
    }

    pub fn is_dying(&self) -> bool {
        self.dying
    }

    pub fn is_blinking(&self) -> bool {
        self.blinking_timer > 0.0
    }

    pub fn is_blocked_left(&self) -> bool {
        self.blocked_left
    }

    pub fn is_blocked_right(&self) -> bool {
        self.blocked_right
    }

    /// Jumping or rolling players break things and defeat enemies.
    pub fn is_attacking(&self) -> bool {
        !self.dying && (self.rolling || self.jumping)
    }

    pub fn z_index(&self) -> f64 {
        if self.dying {
            1.0
        } else {
            0.5
        }
    }

    /// Is the player standing on top of `rect`, within its upper half?
    pub fn is_standing_on(&self, rect: &Rect) -> bool {
        if self.dying || self.actor.speed.y < 0.0 {
            return false;
        }
        let bb = self.bounding_box();
        let feet_y = self.actor.position.y;
        bb.right() > rect.x
            && bb.x < rect.right()
            && feet_y >= rect.y - 2.0
            && feet_y <= rect.y + rect.h * 0.5
    }

    pub fn kill(&mut self) {
        if self.dying {
            return;
        }
        log::debug!("Player '{}' died", self.name);
        self.dying = true;
        self.rolling = false;
        self.jumping = false;
        self.springing = false;
        self.grounded = false;
        self.actor.position.y -= 2.0;
        self.actor.speed = Vec2::new(0.0, DEATH_SPEED);
    }

    /// Hits the player. Without collectibles to lose, it dies.
    pub fn hit(&mut self, hazard_center: Vec2, team: &mut TeamStats) {
        if self.dying || self.getting_hit || self.is_blinking() {
            return;
        }
        if team.collectibles() > 0 {
            let direction = (self.actor.position.x - hazard_center.x).signum();
            self.actor.speed = Vec2::new(HIT_SPEED.x * direction, HIT_SPEED.y);
            self.actor.position.y -= 2.0;
            self.getting_hit = true;
            self.grounded = false;
            team.set_collectibles(0);
        } else {
            self.kill();
        }
    }

    /// Launches the player with the given speed, as a spring does.
    pub fn spring(&mut self, speed: Vec2) {
        if speed.x != 0.0 {
            self.actor.speed.x = speed.x;
        }
        if speed.y != 0.0 {
            self.actor.speed.y = speed.y;
            self.grounded = false;
        }
        self.springing = true;
        self.jumping = false;
        self.rolling = false;
    }

    /// Bounces off a defeated enemy or a broken brick.
    pub fn bounce(&mut self) {
        if !self.grounded && self.actor.speed.y > 0.0 {
            self.actor.speed.y = -self.actor.speed.y;
        }
    }

    pub fn roll(&mut self) {
        if self.grounded {
            self.rolling = true;
        }
    }

    /// Called once per tick, before scripts run.
    pub fn early_update(&mut self) {
        self.blocked_left = false;
        self.blocked_right = false;
    }

    /// Physics step. `input` is `None` for players that aren't controlled.
    pub fn update(
        &mut self,
        input: Option<&PlayerInput>,
        obstacles: &ObstacleMap,
        dt: f32,
        level_height: f32,
    ) {
        if self.blinking_timer > 0.0 {
            self.blinking_timer = (self.blinking_timer - dt).max(0.0);
            self.actor.visible = self.blinking_timer == 0.0 || (self.blinking_timer * 15.0) as i32 % 2 == 0;
        }

        if self.dying {
            self.actor.speed.y = (self.actor.speed.y + self.config.gravity * dt).min(self.config.max_fall_speed);
            self.actor.step(dt);
            return;
        }

        if self.disable_movement {
            return;
        }

        let input = input.copied().unwrap_or_default();
        self.apply_controls(&input, dt);

        let old_y = self.actor.position.y;
        self.actor.position.x += self.actor.speed.x * dt;
        self.resolve_walls(obstacles);

        self.actor.speed.y = (self.actor.speed.y + self.config.gravity * dt).min(self.config.max_fall_speed);
        self.actor.position.y += self.actor.speed.y * dt;
        self.resolve_ceiling(obstacles);
        self.resolve_ground(obstacles, old_y);

        if self.actor.position.y > level_height + PLAYER_HEIGHT {
            log::debug!("Player '{}' fell into a pit", self.name);
            self.kill();
        }
    }

    fn apply_controls(&mut self, input: &PlayerInput, dt: f32) {
        let cfg = self.config;
        let direction = match (input.left, input.right) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        };

        if self.getting_hit {
            return;
        }

        if self.rolling {
            self.actor.speed.x = move_towards(self.actor.speed.x, 0.0, cfg.friction_ground * 0.5 * dt);
            if self.actor.speed.x.abs() < cfg.roll_threshold {
                self.rolling = false;
            }
        } else if direction != 0.0 {
            let accel = if self.grounded { cfg.accel_ground } else { cfg.accel_air };
            self.actor.speed.x = move_towards(self.actor.speed.x, direction * cfg.top_speed, accel * dt);
            self.actor.flip.horizontal = direction < 0.0;
        } else if self.grounded {
            self.actor.speed.x = move_towards(self.actor.speed.x, 0.0, cfg.friction_ground * dt);
        }

        if self.grounded && input.down && self.actor.speed.x.abs() >= cfg.roll_threshold {
            self.rolling = true;
        }

        if input.jump && self.grounded {
            self.actor.speed.y = cfg.jump_speed;
            self.grounded = false;
            self.jumping = true;
            self.rolling = false;
        }
    }

    fn resolve_walls(&mut self, obstacles: &ObstacleMap) {
        let layer = self.layer;
        let bb = self.bounding_box();
        let y1 = bb.y as i32 + 4;
        let y2 = bb.bottom() as i32 - 12;

        // right wall
        for _ in 0..32 {
            let x = self.bounding_box().right() as i32;
            match obstacles.get_best_obstacle_at(x, y1, x, y2, MovMode::RightWall, layer) {
                Some(o) if o.is_solid() => {
                    self.actor.position.x -= 1.0;
                    self.blocked_right = true;
                }
                _ => break,
            }
        }

        // left wall
        for _ in 0..32 {
            let x = self.bounding_box().x as i32 - 1;
            match obstacles.get_best_obstacle_at(x, y1, x, y2, MovMode::LeftWall, layer) {
                Some(o) if o.is_solid() => {
                    self.actor.position.x += 1.0;
                    self.blocked_left = true;
                }
                _ => break,
            }
        }

        if (self.blocked_right && self.actor.speed.x > 0.0) || (self.blocked_left && self.actor.speed.x < 0.0) {
            self.actor.speed.x = 0.0;
        }
    }

    fn resolve_ceiling(&mut self, obstacles: &ObstacleMap) {
        if self.actor.speed.y >= 0.0 {
            return;
        }
        let bb = self.bounding_box();
        let (x1, x2) = (bb.x as i32 + 4, bb.right() as i32 - 4);
        let y = bb.y as i32;
        if let Some((o, ground)) = obstacles.find_ground(x1, y - 1, x2, y, self.layer, GroundDir::Up) {
            if o.is_solid() {
                self.actor.position.y += (ground + 1 - y) as f32;
                self.actor.speed.y = 0.0;
            }
        }
    }

    fn resolve_ground(&mut self, obstacles: &ObstacleMap, old_y: f32) {
        if self.actor.speed.y < 0.0 {
            self.grounded = false;
            return;
        }

        let feet = self.actor.position;
        let half = PLAYER_WIDTH * 0.25;
        let sense_depth = if self.grounded { 12 } else { 1 };
        let top = feet.y as i32 - 12;
        let bottom = feet.y as i32 + sense_depth;

        let mut best: Option<i32> = None;
        for x in [feet.x - half, feet.x + half] {
            let x = x as i32;
            if let Some((o, ground)) = obstacles.find_ground(x, top, x, bottom, self.layer, GroundDir::Down) {
                // clouds only hold players coming from above
                if !o.is_solid() && (old_y as i32) > ground {
                    continue;
                }
                best = Some(best.map_or(ground, |b: i32| b.min(ground)));
            }
        }

        match best {
            Some(ground) => {
                self.actor.position.y = ground as f32;
                self.actor.speed.y = 0.0;
                if !self.grounded {
                    self.jumping = false;
                    self.springing = false;
                    if self.getting_hit {
                        self.getting_hit = false;
                        self.blinking_timer = 2.0;
                        self.actor.speed.x = 0.0;
                    }
                }
                self.grounded = true;
            }
            None => self.grounded = false,
        }
    }
}

fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    if (target - current).abs() <= max_delta {
        target
    } else if target > current {
        current + max_delta
    } else {
        current - max_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::collision_mask::CollisionMask;
    use crate::level::obstacle::{Obstacle, ObstacleFlags};
    use std::sync::Arc;

    const DT: f32 = 1.0 / 60.0;

    fn floor_map(layer: Layer, flags: ObstacleFlags) -> ObstacleMap {
        let mut map = ObstacleMap::new();
        let mask = Arc::new(CollisionMask::create_box(512, 32));
        map.add(Obstacle::new(mask, 0, 200, layer, flags)).expect("unlocked");
        map.build();
        map
    }

    fn settle(player: &mut Player, map: &ObstacleMap, input: &PlayerInput, ticks: usize) {
        for _ in 0..ticks {
            player.early_update();
            player.update(Some(input), map, DT, 10_000.0);
        }
    }

    #[test]
    fn player_lands_on_the_floor() {
        let map = floor_map(Layer::Default, ObstacleFlags::SOLID);
        let mut player = Player::new("Surge", Vec2::new(100.0, 150.0));
        settle(&mut player, &map, &PlayerInput::default(), 120);
        assert!(player.is_grounded());
        assert_eq!(player.position().y, 200.0);
    }

    #[test]
    fn jump_only_activates_when_grounded() {
        let map = floor_map(Layer::Default, ObstacleFlags::SOLID);
        let mut player = Player::new("Surge", Vec2::new(100.0, 100.0));
        let jump = PlayerInput {
            jump: true,
            ..PlayerInput::default()
        };
        player.update(Some(&jump), &map, DT, 10_000.0);
        assert!(player.actor.speed.y >= 0.0, "no jump from mid-air");

        settle(&mut player, &map, &PlayerInput::default(), 120);
        player.update(Some(&jump), &map, DT, 10_000.0);
        assert!(player.actor.speed.y < 0.0);
        assert!(player.is_jumping());
    }

    #[test]
    fn players_on_another_loop_layer_fall_through() {
        let map = floor_map(Layer::Yellow, ObstacleFlags::SOLID);
        let mut player = Player::new("Surge", Vec2::new(100.0, 150.0));
        player.layer = Layer::Green;
        settle(&mut player, &map, &PlayerInput::default(), 60);
        assert!(!player.is_grounded());
        assert!(player.position().y > 200.0);
    }

    #[test]
    fn walking_into_a_wall_blocks() {
        let mut map = ObstacleMap::new();
        let floor = Arc::new(CollisionMask::create_box(512, 32));
        let wall = Arc::new(CollisionMask::create_box(32, 128));
        map.add(Obstacle::new(floor, 0, 200, Layer::Default, ObstacleFlags::SOLID))
            .expect("unlocked");
        map.add(Obstacle::new(wall, 160, 72, Layer::Default, ObstacleFlags::SOLID))
            .expect("unlocked");
        map.build();

        let mut player = Player::new("Surge", Vec2::new(100.0, 200.0));
        let right = PlayerInput {
            right: true,
            ..PlayerInput::default()
        };
        let mut blocked = false;
        for _ in 0..180 {
            player.early_update();
            player.update(Some(&right), &map, DT, 10_000.0);
            blocked |= player.is_blocked_right();
        }
        assert!(blocked);
        assert!(player.bounding_box().right() <= 160.0);
    }

    #[test]
    fn falling_below_the_level_kills() {
        let map = ObstacleMap::new();
        let mut player = Player::new("Surge", Vec2::new(0.0, 0.0));
        for _ in 0..240 {
            player.update(None, &map, DT, 100.0);
        }
        assert!(player.is_dying());
        assert_eq!(player.z_index(), 1.0);
    }

    #[test]
    fn hit_without_collectibles_kills() {
        let mut team = TeamStats::new();
        let mut player = Player::new("Surge", Vec2::ZERO);
        team.set_collectibles(3);
        player.hit(Vec2::new(10.0, 0.0), &mut team);
        assert!(!player.is_dying());
        assert!(player.is_getting_hit());
        assert_eq!(team.collectibles(), 0);
        assert!(player.actor.speed.x < 0.0);

        let mut other = Player::new("Neon", Vec2::ZERO);
        other.hit(Vec2::ZERO, &mut team);
        assert!(other.is_dying());
    }

    #[test]
    fn hundred_collectibles_give_a_life() {
        let mut team = TeamStats::new();
        team.add_collectibles(99);
        assert_eq!(team.lives(), PLAYER_INITIAL_LIVES);
        team.add_collectibles(1);
        assert_eq!(team.lives(), PLAYER_INITIAL_LIVES + 1);
        team.set_collectibles(0);
        team.add_collectibles(100);
        assert_eq!(team.lives(), PLAYER_INITIAL_LIVES + 1);
        team.set_lives(-3);
        assert_eq!(team.lives(), 0);
    }
}
