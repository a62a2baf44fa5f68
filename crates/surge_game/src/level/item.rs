//! Legacy items: the fixed catalogue of gimmicks a `.lev` file can place with
//! `item <type> <x> <y>`. Most of them have a scripted replacement; the ones
//! spawned here are the fallback when that replacement is unavailable.

use std::fmt;
use std::sync::Arc;

use glam::Vec2;
use surge_platform::Renderer;
use surge_render::zindex_offset;

use super::actor::{Actor, Rect};
use super::collision_mask::CollisionMask;
use super::obstacle::{Layer, Obstacle, ObstacleFlags};
use super::particles::ParticleSystem;
use super::player::{Player, TeamStats};

/// Number of legacy item types. Types read from a level are clipped below this.
pub const ITEMDATA_MAX: u32 = 84;

pub const IT_COLLECTIBLE: u32 = 0;
pub const IT_LIFEBOX: u32 = 1;
pub const IT_COLLECTIBLEBOX: u32 = 2;
pub const IT_BOUNCINGCOLLECT: u32 = 14;
pub const IT_LOOPNONE: u32 = 19;
pub const IT_YELLOWSPRING: u32 = 20;
pub const IT_CHECKPOINT: u32 = 29;
pub const IT_GOAL: u32 = 30;
pub const IT_ENDSIGN: u32 = 31;
pub const IT_ENDLEVEL: u32 = 32;
pub const IT_LOOPFLOORNONE: u32 = 34;
pub const IT_BUMPER: u32 = 36;
pub const IT_DANGER: u32 = 37;
pub const IT_SPIKES: u32 = 38;
pub const IT_DNADOOR: u32 = 39;
pub const IT_DNADOORNEON: u32 = 70;
pub const IT_DNADOORCHARGE: u32 = 71;
pub const IT_HDNADOOR: u32 = 72;
pub const IT_HDNADOORNEON: u32 = 73;
pub const IT_HDNADOORCHARGE: u32 = 74;
pub const IT_LOOPGREEN: u32 = 82;
pub const IT_LOOPYELLOW: u32 = 83;

/// Scripted objects that replace legacy items.
pub fn script_replacement(kind: u32) -> Option<&'static str> {
    let name = match kind {
        0 => "Collectible",
        14 => "Bouncing Collectible",
        20 => "Spring Standard",
        50 => "Spring Standard Up Right",
        48 => "Spring Standard Right",
        52 => "Spring Standard Down Right",
        54 => "Spring Standard Down",
        53 => "Spring Standard Down Left",
        49 => "Spring Standard Left",
        51 => "Spring Standard Up Left",
        21 => "Spring Stronger",
        43 => "Spring Stronger Up Right",
        22 => "Spring Stronger Right",
        45 => "Spring Stronger Down Right",
        47 => "Spring Stronger Down",
        46 => "Spring Stronger Down Left",
        23 => "Spring Stronger Left",
        44 => "Spring Stronger Up Left",
        55 => "Spring Strongest",
        58 => "Spring Strongest Up Right",
        56 => "Spring Strongest Right",
        60 => "Spring Strongest Down Right",
        62 => "Spring Strongest Down",
        61 => "Spring Strongest Down Left",
        57 => "Spring Strongest Left",
        59 => "Spring Strongest Up Left",
        1 => "Powerup 1up",
        2 => "Powerup Collectibles",
        3 => "Powerup Invincibility",
        4 => "Powerup Speed",
        6 => "Powerup Shield",
        42 => "Powerup Shield Fire",
        78 => "Powerup Shield Thunder",
        79 => "Powerup Shield Water",
        80 => "Powerup Shield Acid",
        81 => "Powerup Shield Wind",
        7 => "Powerup Trap",
        29 => "Checkpoint",
        31 => "Goal",
        32 => "Goal Capsule",
        36 => "Bumper",
        38 => "Spikes",
        63 => "Spikes Down",
        26 => "Door",
        27 => "Teleporter",
        25 => ".compat_switch",
        82 => ".compat_loopgreen",
        83 => ".compat_loopyellow",
        66 => ".compat_perspikes",
        67 => ".compat_perceilspikes",
        _ => return None,
    };
    Some(name)
}

/// Spring strength for spring item types. Upward springs on the floor only
/// fire when landed on.
fn spring_strength(kind: u32) -> Option<(Vec2, bool)> {
    const D600: f32 = 424.0;
    const D960: f32 = 679.0;
    const D1500: f32 = 1061.0;
    let strength = match kind {
        20 => (Vec2::new(0.0, -600.0), true),
        50 => (Vec2::new(D600, -D600), false),
        48 => (Vec2::new(600.0, 0.0), false),
        52 => (Vec2::new(D600, D600), false),
        54 => (Vec2::new(0.0, 600.0), false),
        53 => (Vec2::new(-D600, D600), false),
        49 => (Vec2::new(-600.0, 0.0), false),
        51 => (Vec2::new(-D600, -D600), false),
        21 => (Vec2::new(0.0, -960.0), true),
        43 => (Vec2::new(D960, -D960), false),
        22 => (Vec2::new(960.0, 0.0), false),
        45 => (Vec2::new(D960, D960), false),
        47 => (Vec2::new(0.0, 960.0), false),
        46 => (Vec2::new(-D960, D960), false),
        23 => (Vec2::new(-960.0, 0.0), false),
        44 => (Vec2::new(-D960, -D960), false),
        55 => (Vec2::new(0.0, -1500.0), true),
        58 => (Vec2::new(D1500, -D1500), false),
        56 => (Vec2::new(1500.0, 0.0), false),
        60 => (Vec2::new(D1500, D1500), false),
        62 => (Vec2::new(0.0, 1500.0), false),
        61 => (Vec2::new(-D1500, D1500), false),
        57 => (Vec2::new(-1500.0, 0.0), false),
        59 => (Vec2::new(-D1500, -D1500), false),
        _ => return None,
    };
    Some(strength)
}

/// Display name for the editor.
pub fn item_name(kind: u32) -> String {
    match kind {
        IT_COLLECTIBLE => "Collectible".to_string(),
        IT_LIFEBOX => "Life Box".to_string(),
        IT_COLLECTIBLEBOX => "Collectible Box".to_string(),
        IT_BOUNCINGCOLLECT => "Bouncing Collectible".to_string(),
        IT_LOOPNONE | IT_LOOPFLOORNONE => "Loop None".to_string(),
        IT_CHECKPOINT => "Checkpoint".to_string(),
        IT_GOAL | IT_ENDSIGN | IT_ENDLEVEL => "Goal".to_string(),
        IT_BUMPER => "Bumper".to_string(),
        IT_DNADOOR | IT_DNADOORNEON | IT_DNADOORCHARGE | IT_HDNADOOR | IT_HDNADOORNEON | IT_HDNADOORCHARGE => {
            format!("DNA Door ({})", dna_door_owner(kind).unwrap_or("?"))
        }
        IT_LOOPGREEN => "Loop Green".to_string(),
        IT_LOOPYELLOW => "Loop Yellow".to_string(),
        k if spring_strength(k).is_some() => format!("Spring {k}"),
        k if hazard_kind(k).is_some() => format!("Hazard {k}"),
        k if box_reward(k).is_some() => format!("Item Box {k}"),
        k => format!("Item {k}"),
    }
}

fn dna_door_owner(kind: u32) -> Option<&'static str> {
    match kind {
        IT_DNADOOR | IT_HDNADOOR => Some("Surge"),
        IT_DNADOORNEON | IT_HDNADOORNEON => Some("Neon"),
        IT_DNADOORCHARGE | IT_HDNADOORCHARGE => Some("Charge"),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoxReward {
    Life,
    Collectibles(i32),
    Nothing,
}

fn box_reward(kind: u32) -> Option<BoxReward> {
    match kind {
        IT_LIFEBOX => Some(BoxReward::Life),
        IT_COLLECTIBLEBOX => Some(BoxReward::Collectibles(10)),
        3..=8 | 42 | 78..=81 => Some(BoxReward::Nothing),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hazard {
    /// Invisible damaging region.
    Danger,
    /// Solid spikes; `period` toggles them on and off.
    Spikes { periodic: bool },
}

fn hazard_kind(kind: u32) -> Option<Hazard> {
    match kind {
        IT_DANGER | 75..=77 => Some(Hazard::Danger),
        IT_SPIKES | 63..=65 => Some(Hazard::Spikes { periodic: false }),
        66..=69 => Some(Hazard::Spikes { periodic: true }),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Idle,
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemFlags {
    pub always_active: bool,
    pub obstacle: bool,
    pub bring_to_back: bool,
    pub preserve: bool,
}

/// Something the level has to react to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemEvent {
    Checkpoint(Vec2),
    Cleared,
}

pub struct ItemContext<'a> {
    pub players: &'a mut [Player],
    pub team: &'a mut TeamStats,
    pub particles: &'a mut ParticleSystem,
    pub events: &'a mut Vec<ItemEvent>,
    pub dt: f32,
    pub editing: bool,
}

/// The part of an item every behavior may touch.
#[derive(Debug, Clone)]
pub struct ItemBody {
    pub kind: u32,
    pub actor: Actor,
    pub state: ItemState,
    pub flags: ItemFlags,
    pub mask: Option<Arc<CollisionMask>>,
}

impl ItemBody {
    pub fn bounding_box(&self) -> Rect {
        self.actor.bounding_box()
    }

    fn touched_by(&self, player: &Player) -> bool {
        !player.is_dying() && player.bounding_box().intersects(&self.bounding_box())
    }
}

/// Per-type logic of a legacy item.
pub trait ItemBehavior: fmt::Debug {
    fn update(&mut self, body: &mut ItemBody, ctx: &mut ItemContext<'_>);

    fn render(&self, body: &ItemBody, renderer: &mut dyn Renderer, top_left: Vec2, editing: bool) {
        let _ = editing;
        body.actor.render(renderer, top_left);
    }
}

#[derive(Debug)]
struct Collectible {
    value: i32,
}

impl ItemBehavior for Collectible {
    fn update(&mut self, body: &mut ItemBody, ctx: &mut ItemContext<'_>) {
        if ctx.players.iter().any(|p| body.touched_by(p)) {
            ctx.team.add_collectibles(self.value);
            body.state = ItemState::Dead;
        }
    }
}

/// Lost collectibles: they fall, bounce off nothing, and vanish.
#[derive(Debug)]
struct BouncingCollectible {
    lifetime: f32,
}

impl ItemBehavior for BouncingCollectible {
    fn update(&mut self, body: &mut ItemBody, ctx: &mut ItemContext<'_>) {
        self.lifetime -= ctx.dt;
        body.actor.speed.y += 787.5 * ctx.dt;
        body.actor.step(ctx.dt);
        if self.lifetime <= 0.0 {
            body.state = ItemState::Dead;
        } else if self.lifetime < 3.5 && ctx.players.iter().any(|p| body.touched_by(p)) {
            ctx.team.add_collectibles(1);
            body.state = ItemState::Dead;
        }
    }
}

#[derive(Debug)]
struct ItemBox {
    reward: BoxReward,
    broken: bool,
}

impl ItemBehavior for ItemBox {
    fn update(&mut self, body: &mut ItemBody, ctx: &mut ItemContext<'_>) {
        if self.broken {
            return;
        }
        let bb = body.bounding_box().expanded(2.0, 2.0);
        let breaker = ctx
            .players
            .iter_mut()
            .find(|p| p.is_attacking() && p.bounding_box().intersects(&bb));
        match breaker {
            Some(player) => {
                player.bounce();
                self.broken = true;
                body.flags.obstacle = false;
                body.actor.sprite = "SD_CRUSHEDBOX".to_string();
                match self.reward {
                    BoxReward::Life => {
                        let lives = ctx.team.lives();
                        ctx.team.set_lives(lives + 1);
                    }
                    BoxReward::Collectibles(n) => ctx.team.add_collectibles(n),
                    BoxReward::Nothing => {}
                }
                let center = bb.center();
                ctx.particles.add("SD_EXPLOSION", center, Vec2::splat(8.0), Vec2::new(0.0, -120.0));
            }
            None => body.flags.obstacle = true,
        }
    }
}

#[derive(Debug)]
struct Spring {
    strength: Vec2,
    /// Fires only when a player lands on it.
    classic: bool,
}

impl ItemBehavior for Spring {
    fn update(&mut self, body: &mut ItemBody, ctx: &mut ItemContext<'_>) {
        for player in ctx.players.iter_mut() {
            if !body.touched_by(player) {
                continue;
            }
            if !self.classic || player.actor.speed.y >= 1.0 {
                player.spring(self.strength);
            }
        }
    }
}

/// Switches a player's loop layer when it starts touching the item.
#[derive(Debug)]
struct LayerSwitch {
    layer: Layer,
    was_touching: Vec<bool>,
}

impl ItemBehavior for LayerSwitch {
    fn update(&mut self, body: &mut ItemBody, ctx: &mut ItemContext<'_>) {
        body.actor.visible = ctx.editing;
        if self.was_touching.len() != ctx.players.len() {
            self.was_touching = ctx.players.iter().map(|p| body.touched_by(p)).collect();
        }
        for (player, was_touching) in ctx.players.iter_mut().zip(self.was_touching.iter_mut()) {
            let touching = body.touched_by(player);
            if touching && !*was_touching {
                player.layer = self.layer;
            }
            *was_touching = touching;
        }
    }
}

/// A door that only lets one character through.
#[derive(Debug)]
struct DnaDoor {
    owner: &'static str,
}

impl ItemBehavior for DnaDoor {
    fn update(&mut self, body: &mut ItemBody, ctx: &mut ItemContext<'_>) {
        let bb = body.bounding_box();
        let area = Rect::new(bb.x, bb.y - 3.0, bb.w, bb.h + 6.0);
        let mut authorized = false;
        let mut block_anyway = false;
        let mut collision = false;
        for player in ctx.players.iter() {
            if player.is_dying() || !player.bounding_box().intersects(&area) {
                continue;
            }
            if player.name.eq_ignore_ascii_case(self.owner) {
                authorized = true;
                collision |= player.bounding_box().intersects(&bb);
            } else {
                block_anyway = true;
            }
        }
        body.flags.obstacle = block_anyway || !authorized;

        let dt = ctx.dt;
        if body.flags.obstacle {
            body.actor.alpha = (body.actor.alpha + 2.0 * dt).min(1.0);
        } else if collision {
            body.actor.alpha = (body.actor.alpha - 2.0 * dt).max(0.4);
        }
    }
}

#[derive(Debug)]
struct Checkpoint {
    reached: bool,
}

impl ItemBehavior for Checkpoint {
    fn update(&mut self, body: &mut ItemBody, ctx: &mut ItemContext<'_>) {
        if !self.reached && ctx.players.iter().any(|p| body.touched_by(p)) {
            self.reached = true;
            body.actor.sprite = "SD_CHECKPOINT_ON".to_string();
            ctx.events.push(ItemEvent::Checkpoint(body.actor.position));
        }
    }
}

#[derive(Debug)]
struct Goal {
    reached: bool,
}

impl ItemBehavior for Goal {
    fn update(&mut self, body: &mut ItemBody, ctx: &mut ItemContext<'_>) {
        if !self.reached && ctx.players.iter().any(|p| body.touched_by(p)) {
            self.reached = true;
            ctx.events.push(ItemEvent::Cleared);
        }
    }
}

#[derive(Debug)]
struct Bumper;

impl ItemBehavior for Bumper {
    fn update(&mut self, body: &mut ItemBody, ctx: &mut ItemContext<'_>) {
        let center = body.bounding_box().center();
        for player in ctx.players.iter_mut() {
            if !body.touched_by(player) {
                continue;
            }
            let away = (player.bounding_box().center() - center).normalize_or(Vec2::NEG_Y);
            let speed = player.actor.speed.length().max(420.0);
            player.spring(away * speed);
        }
    }
}

#[derive(Debug)]
struct HazardItem {
    hazard: Hazard,
    timer: f32,
}

impl HazardItem {
    const PERIOD: f32 = 2.0;

    fn armed(&self) -> bool {
        match self.hazard {
            Hazard::Spikes { periodic: true } => self.timer % (2.0 * Self::PERIOD) < Self::PERIOD,
            _ => true,
        }
    }
}

impl ItemBehavior for HazardItem {
    fn update(&mut self, body: &mut ItemBody, ctx: &mut ItemContext<'_>) {
        self.timer += ctx.dt;
        let armed = self.armed();
        let solid = matches!(self.hazard, Hazard::Spikes { .. });
        body.flags.obstacle = solid && armed;
        body.actor.visible = solid && armed || ctx.editing;
        if !armed {
            return;
        }

        let bb = body.bounding_box().expanded(1.0, 1.0);
        let center = bb.center();
        for player in ctx.players.iter_mut() {
            if !player.is_dying() && player.bounding_box().intersects(&bb) {
                player.hit(center, ctx.team);
            }
        }
    }
}

#[derive(Debug)]
struct Decoration;

impl ItemBehavior for Decoration {
    fn update(&mut self, _body: &mut ItemBody, _ctx: &mut ItemContext<'_>) {}
}

/// A legacy item placed in a level.
#[derive(Debug)]
pub struct Item {
    body: ItemBody,
    behavior: Box<dyn ItemBehavior>,
}

impl Item {
    pub fn new(kind: u32, position: Vec2) -> Self {
        let kind = kind.min(ITEMDATA_MAX - 1);
        let (sprite, size) = appearance(kind);
        let mut flags = ItemFlags {
            always_active: false,
            obstacle: false,
            bring_to_back: true,
            preserve: true,
        };

        let behavior: Box<dyn ItemBehavior> = if let Some((strength, classic)) = spring_strength(kind) {
            Box::new(Spring { strength, classic })
        } else if let Some(reward) = box_reward(kind) {
            flags.obstacle = true;
            flags.bring_to_back = false;
            Box::new(ItemBox { reward, broken: false })
        } else if let Some(hazard) = hazard_kind(kind) {
            flags.obstacle = matches!(hazard, Hazard::Spikes { .. });
            Box::new(HazardItem { hazard, timer: 0.0 })
        } else if let Some(owner) = dna_door_owner(kind) {
            flags.obstacle = true;
            flags.bring_to_back = false;
            Box::new(DnaDoor { owner })
        } else {
            match kind {
                IT_COLLECTIBLE => Box::new(Collectible { value: 1 }),
                IT_BOUNCINGCOLLECT => {
                    flags.preserve = false;
                    Box::new(BouncingCollectible { lifetime: 4.0 })
                }
                IT_LOOPGREEN => Box::new(LayerSwitch {
                    layer: Layer::Green,
                    was_touching: Vec::new(),
                }),
                IT_LOOPYELLOW => Box::new(LayerSwitch {
                    layer: Layer::Yellow,
                    was_touching: Vec::new(),
                }),
                IT_LOOPNONE | IT_LOOPFLOORNONE => Box::new(LayerSwitch {
                    layer: Layer::Default,
                    was_touching: Vec::new(),
                }),
                IT_CHECKPOINT => Box::new(Checkpoint { reached: false }),
                IT_GOAL | IT_ENDSIGN | IT_ENDLEVEL => Box::new(Goal { reached: false }),
                IT_BUMPER => Box::new(Bumper),
                12 | 13 | 15 => {
                    flags.preserve = false;
                    Box::new(Decoration)
                }
                _ => Box::new(Decoration),
            }
        };

        let mask = flags
            .obstacle
            .then(|| Arc::new(CollisionMask::create_box(size.x as u32, size.y as u32)));

        Self {
            body: ItemBody {
                kind,
                actor: Actor::new(position, size, &sprite),
                state: ItemState::Idle,
                flags,
                mask,
            },
            behavior,
        }
    }

    pub fn kind(&self) -> u32 {
        self.body.kind
    }

    pub fn name(&self) -> String {
        item_name(self.body.kind)
    }

    pub fn actor(&self) -> &Actor {
        &self.body.actor
    }

    pub fn actor_mut(&mut self) -> &mut Actor {
        &mut self.body.actor
    }

    pub fn position(&self) -> Vec2 {
        self.body.actor.position
    }

    pub fn spawn_point(&self) -> Vec2 {
        self.body.actor.spawn_point
    }

    pub fn flags(&self) -> ItemFlags {
        self.body.flags
    }

    pub fn state(&self) -> ItemState {
        self.body.state
    }

    pub fn is_dead(&self) -> bool {
        self.body.state == ItemState::Dead
    }

    pub fn kill(&mut self) {
        self.body.state = ItemState::Dead;
    }

    pub fn bounding_box(&self) -> Rect {
        self.body.bounding_box()
    }

    pub fn z_index(&self) -> f64 {
        if self.body.flags.bring_to_back {
            0.5 - zindex_offset(1)
        } else {
            0.5
        }
    }

    /// Mock obstacle for this frame, if the item currently blocks.
    pub fn obstacle(&self) -> Option<Obstacle> {
        if !self.body.flags.obstacle || self.is_dead() {
            return None;
        }
        let mask = self.body.mask.as_ref()?;
        let bb = self.bounding_box();
        Some(Obstacle::new(
            Arc::clone(mask),
            bb.x as i32,
            bb.y as i32,
            Layer::Default,
            ObstacleFlags::SOLID,
        ))
    }

    pub fn update(&mut self, ctx: &mut ItemContext<'_>) {
        if self.is_dead() {
            return;
        }
        self.behavior.update(&mut self.body, ctx);
    }

    pub fn render(&self, renderer: &mut dyn Renderer, top_left: Vec2, editing: bool) {
        self.behavior.render(&self.body, renderer, top_left, editing);
    }
}

fn appearance(kind: u32) -> (String, Vec2) {
    let size = match kind {
        IT_COLLECTIBLE | IT_BOUNCINGCOLLECT => Vec2::new(16.0, 16.0),
        IT_DNADOOR | IT_DNADOORNEON | IT_DNADOORCHARGE => Vec2::new(16.0, 64.0),
        IT_HDNADOOR | IT_HDNADOORNEON | IT_HDNADOORCHARGE => Vec2::new(64.0, 16.0),
        IT_LOOPGREEN | IT_LOOPYELLOW | IT_LOOPNONE | IT_LOOPFLOORNONE => Vec2::new(32.0, 32.0),
        IT_CHECKPOINT | IT_GOAL | IT_ENDSIGN | IT_ENDLEVEL => Vec2::new(32.0, 64.0),
        k if spring_strength(k).is_some() => Vec2::new(32.0, 16.0),
        _ => Vec2::new(32.0, 32.0),
    };
    (format!("SD_ITEM{kind}"), size)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        players: Vec<Player>,
        team: TeamStats,
        particles: ParticleSystem,
        events: Vec<ItemEvent>,
    }

    impl Fixture {
        fn new(players: &[(&str, Vec2)]) -> Self {
            Self {
                players: players.iter().map(|(n, p)| Player::new(n, *p)).collect(),
                team: TeamStats::new(),
                particles: ParticleSystem::new(),
                events: Vec::new(),
            }
        }

        fn tick(&mut self, item: &mut Item, dt: f32) {
            let mut ctx = ItemContext {
                players: &mut self.players,
                team: &mut self.team,
                particles: &mut self.particles,
                events: &mut self.events,
                dt,
                editing: false,
            };
            item.update(&mut ctx);
        }
    }

    #[test]
    fn collectibles_are_picked_up_on_touch() {
        let mut ring = Item::new(IT_COLLECTIBLE, Vec2::new(100.0, 100.0));
        let mut fx = Fixture::new(&[("Surge", Vec2::new(110.0, 110.0))]);
        fx.tick(&mut ring, 1.0 / 60.0);
        assert!(ring.is_dead());
        assert_eq!(fx.team.collectibles(), 1);
    }

    #[test]
    fn item_types_are_clipped() {
        assert_eq!(Item::new(500, Vec2::ZERO).kind(), ITEMDATA_MAX - 1);
    }

    #[test]
    fn dna_doors_only_open_for_their_owner() {
        let mut door = Item::new(IT_DNADOOR, Vec2::new(200.0, 200.0));
        let inside = Vec2::new(205.0, 200.0);
        let away = Vec2::new(-1000.0, 0.0);
        let mut fx = Fixture::new(&[("Surge", away), ("Neon", away), ("Charge", away)]);

        fx.players[1].set_position(inside);
        fx.tick(&mut door, 0.1);
        assert!(door.obstacle().is_some());

        fx.players[1].set_position(away);
        fx.players[0].set_position(inside);
        for _ in 0..10 {
            fx.tick(&mut door, 0.1);
        }
        assert!(door.obstacle().is_none());
        assert!((door.actor().alpha - 0.4).abs() < 1e-6);

        fx.players[1].set_position(inside);
        fx.tick(&mut door, 0.1);
        assert!(door.obstacle().is_some());
    }

    #[test]
    fn loops_switch_layers_on_first_contact() {
        let mut green = Item::new(IT_LOOPGREEN, Vec2::new(0.0, 100.0));
        let mut fx = Fixture::new(&[("Surge", Vec2::new(0.0, 100.0))]);
        // touching from the start doesn't count as entering
        fx.tick(&mut green, 0.1);
        assert_eq!(fx.players[0].layer, Layer::Default);

        fx.players[0].set_position(Vec2::new(500.0, 100.0));
        fx.tick(&mut green, 0.1);
        fx.players[0].set_position(Vec2::new(0.0, 100.0));
        fx.tick(&mut green, 0.1);
        assert_eq!(fx.players[0].layer, Layer::Green);

        let mut reset = Item::new(IT_LOOPYELLOW, Vec2::new(500.0, 100.0));
        fx.tick(&mut reset, 0.1);
        fx.players[0].set_position(Vec2::new(500.0, 100.0));
        fx.tick(&mut reset, 0.1);
        assert_eq!(fx.players[0].layer, Layer::Yellow);
    }

    #[test]
    fn springs_launch_players() {
        let mut spring = Item::new(48, Vec2::new(0.0, 100.0));
        let mut fx = Fixture::new(&[("Surge", Vec2::new(0.0, 100.0))]);
        fx.tick(&mut spring, 0.1);
        assert_eq!(fx.players[0].actor.speed.x, 600.0);
        assert!(fx.players[0].is_springing());
    }

    #[test]
    fn checkpoints_and_goals_report_events_once() {
        let mut checkpoint = Item::new(IT_CHECKPOINT, Vec2::new(50.0, 100.0));
        let mut goal = Item::new(IT_GOAL, Vec2::new(50.0, 100.0));
        let mut fx = Fixture::new(&[("Surge", Vec2::new(50.0, 100.0))]);
        fx.tick(&mut checkpoint, 0.1);
        fx.tick(&mut checkpoint, 0.1);
        fx.tick(&mut goal, 0.1);
        assert_eq!(
            fx.events,
            vec![ItemEvent::Checkpoint(Vec2::new(50.0, 100.0)), ItemEvent::Cleared]
        );
    }

    #[test]
    fn spikes_hurt_and_block() {
        let mut spikes = Item::new(IT_SPIKES, Vec2::new(0.0, 100.0));
        assert!(spikes.obstacle().is_some());
        let mut fx = Fixture::new(&[("Surge", Vec2::new(0.0, 68.0))]);
        fx.team.set_collectibles(5);
        fx.tick(&mut spikes, 0.1);
        assert_eq!(fx.team.collectibles(), 0);
        assert!(fx.players[0].is_getting_hit());
    }

    #[test]
    fn script_replacements_cover_collectibles_and_loops() {
        assert_eq!(script_replacement(IT_COLLECTIBLE), Some("Collectible"));
        assert_eq!(script_replacement(IT_LOOPGREEN), Some(".compat_loopgreen"));
        assert_eq!(script_replacement(IT_DNADOOR), None);
    }

    #[test]
    fn brought_back_items_sit_behind_players() {
        let ring = Item::new(IT_COLLECTIBLE, Vec2::ZERO);
        let door = Item::new(IT_DNADOOR, Vec2::ZERO);
        assert!(ring.z_index() < 0.5);
        assert_eq!(door.z_index(), 0.5);
    }
}
