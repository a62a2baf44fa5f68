//! Bricks: the tiles levels are built from, and the brickset that defines them.
//!
//! A brickset is a JSON file listing brick templates by id. Each template
//! has a type (passable, solid or cloud), a behavior with up to five
//! numeric arguments, a z-index, a size and an optional collision mask.
//! A brick placed in a level refers to its template and owns its
//! position, layer, flip flags and behavior state.

use std::collections::HashSet;
use std::f32::consts::PI;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use glam::Vec2;
use serde::Deserialize;
use surge_core::Color;
use surge_platform::{Flip, Renderer};
use surge_render::zindex_offset;

use super::actor::Rect;
use super::collision_mask::CollisionMask;
use super::obstacle::{Layer, Obstacle, ObstacleFlags};
use super::particles::ParticleSystem;
use super::player::Player;

/// Up to this many bricks per brickset.
pub const BRICKSET_MAX: u32 = 16384;
pub const BRICK_BEHAVIOR_MAXARGS: usize = 5;

/// Seconds before a falling brick crumbles.
const FALL_TIME: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrickType {
    Passable,
    #[default]
    #[serde(alias = "obstacle")]
    Solid,
    Cloud,
}

impl BrickType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Passable => "PASSABLE",
            Self::Solid => "SOLID",
            Self::Cloud => "CLOUD",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrickBehavior {
    #[default]
    Default,
    Circular,
    Breakable,
    Fall,
    Smashable,
    Float,
    Pendular,
    Marker,
}

impl BrickBehavior {
    pub fn name(self) -> &'static str {
        match self {
            Self::Default => "DEFAULT",
            Self::Circular => "CIRCULAR",
            Self::Breakable => "BREAKABLE",
            Self::Fall => "FALL",
            Self::Smashable => "SMASHABLE",
            Self::Float => "FLOAT",
            Self::Pendular => "PENDULAR",
            Self::Marker => "MARKER",
        }
    }

    /// Moving bricks change position on their own.
    pub fn is_moving(self) -> bool {
        matches!(self, Self::Circular | Self::Float | Self::Pendular)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BrickFlip {
    #[default]
    NoFlip,
    HFlip,
    VFlip,
    VHFlip,
}

impl BrickFlip {
    pub const ALL: &'static [BrickFlip] = &[
        BrickFlip::NoFlip,
        BrickFlip::HFlip,
        BrickFlip::VFlip,
        BrickFlip::VHFlip,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::NoFlip => "noflip",
            Self::HFlip => "hflip",
            Self::VFlip => "vflip",
            Self::VHFlip => "vhflip",
        }
    }

    /// Case-insensitive; unknown names map to `NoFlip`.
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(name))
            .unwrap_or_default()
    }

    pub fn next(self) -> Self {
        match self {
            Self::NoFlip => Self::HFlip,
            Self::HFlip => Self::VFlip,
            Self::VFlip => Self::VHFlip,
            Self::VHFlip => Self::NoFlip,
        }
    }

    pub fn horizontal(self) -> bool {
        matches!(self, Self::HFlip | Self::VHFlip)
    }

    pub fn vertical(self) -> bool {
        matches!(self, Self::VFlip | Self::VHFlip)
    }

    pub fn to_flip(self) -> Flip {
        Flip {
            horizontal: self.horizontal(),
            vertical: self.vertical(),
        }
    }
}

impl std::fmt::Display for BrickFlip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BricksetFile {
    pub bricks: Vec<BrickEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrickEntry {
    pub id: u32,
    #[serde(rename = "type", default)]
    pub kind: BrickType,
    #[serde(default)]
    pub behavior: BrickBehavior,
    #[serde(default)]
    pub behavior_args: Vec<f32>,
    #[serde(default = "default_zindex")]
    pub zindex: f32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub sprite: Option<String>,
    #[serde(default)]
    pub mask: Option<MaskEntry>,
}

/// Either ASCII rows (`#` is solid) or a rectangle of an image file.
#[derive(Debug, Deserialize, Clone)]
pub struct MaskEntry {
    #[serde(default)]
    pub rows: Option<Vec<String>>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub x: u32,
    #[serde(default)]
    pub y: u32,
}

const fn default_zindex() -> f32 {
    0.5
}

#[derive(Debug)]
pub struct BrickTemplate {
    pub id: u32,
    pub kind: BrickType,
    pub behavior: BrickBehavior,
    pub args: [f32; BRICK_BEHAVIOR_MAXARGS],
    pub zindex: f32,
    pub sprite: String,
    pub mask: Arc<CollisionMask>,
}

impl BrickTemplate {
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.mask.width() as f32, self.mask.height() as f32)
    }
}

#[derive(Debug, Default)]
pub struct Brickset {
    templates: Vec<Option<Arc<BrickTemplate>>>,
}

impl Brickset {
    /// Builds a brickset from already-made templates.
    pub fn from_templates(templates: Vec<BrickTemplate>) -> Self {
        let mut set = Self::default();
        for template in templates {
            let id = template.id as usize;
            if set.templates.len() <= id {
                set.templates.resize(id + 1, None);
            }
            set.templates[id] = Some(Arc::new(template));
        }
        set
    }

    pub fn get(&self, id: u32) -> Option<&Arc<BrickTemplate>> {
        self.templates.get(id as usize).and_then(Option::as_ref)
    }

    pub fn exists(&self, id: u32) -> bool {
        self.get(id).is_some()
    }

    /// One past the largest id.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.iter().all(Option::is_none)
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.templates
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_some())
            .map(|(id, _)| id as u32)
    }
}

/// Loads a brickset. Relative mask and sprite paths resolve against `base_dir`.
pub fn load_brickset_from_path(path: &Path, base_dir: &Path) -> Result<Brickset, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read brickset {}: {e}", path.display()))?;
    let file: BricksetFile = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse brickset JSON {}: {e}", path.display()))?;
    validate_brickset(&file)?;

    let mut templates = Vec::with_capacity(file.bricks.len());
    for entry in &file.bricks {
        templates.push(build_template(entry, base_dir)?);
    }
    log::info!(
        "Loaded brickset {} ({} bricks)",
        path.display(),
        templates.len()
    );
    Ok(Brickset::from_templates(templates))
}

fn validate_brickset(file: &BricksetFile) -> Result<(), String> {
    if file.bricks.is_empty() {
        return Err("Brickset validation failed: bricks array is empty".to_string());
    }
    let mut ids = HashSet::new();
    for brick in &file.bricks {
        if brick.id >= BRICKSET_MAX {
            return Err(format!(
                "Brickset validation failed: brick id {} exceeds {}",
                brick.id,
                BRICKSET_MAX - 1
            ));
        }
        if !ids.insert(brick.id) {
            return Err(format!(
                "Brickset validation failed: duplicate brick id {}",
                brick.id
            ));
        }
        if brick.width == 0 || brick.height == 0 {
            return Err(format!(
                "Brickset validation failed: brick {} has an empty size",
                brick.id
            ));
        }
        if brick.behavior_args.len() > BRICK_BEHAVIOR_MAXARGS {
            return Err(format!(
                "Brickset validation failed: brick {} has more than {} behavior arguments",
                brick.id, BRICK_BEHAVIOR_MAXARGS
            ));
        }
    }
    Ok(())
}

fn build_template(entry: &BrickEntry, base_dir: &Path) -> Result<BrickTemplate, String> {
    let mask = match &entry.mask {
        Some(MaskEntry {
            rows: Some(rows), ..
        }) => {
            let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
            CollisionMask::from_ascii(&rows)
        }
        Some(MaskEntry {
            file: Some(file),
            x,
            y,
            ..
        }) => CollisionMask::from_image(&base_dir.join(file), *x, *y, entry.width, entry.height)?,
        _ => CollisionMask::create_box(entry.width, entry.height),
    };

    let mut args = [0.0; BRICK_BEHAVIOR_MAXARGS];
    for (slot, value) in args.iter_mut().zip(&entry.behavior_args) {
        *slot = *value;
    }

    Ok(BrickTemplate {
        id: entry.id,
        kind: entry.kind,
        behavior: entry.behavior,
        args,
        zindex: entry.zindex.clamp(0.0, 1.0),
        sprite: entry
            .sprite
            .clone()
            .unwrap_or_else(|| format!("brick{}", entry.id)),
        mask: Arc::new(mask),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrickState {
    Idle,
    Active,
    Dead,
}

/// What a brick may touch while it updates.
pub struct BrickContext<'a> {
    pub players: &'a mut [Player],
    pub particles: &'a mut ParticleSystem,
    pub dt: f32,
}

#[derive(Debug, Clone)]
pub struct Brick {
    template: Arc<BrickTemplate>,
    x: i32,
    y: i32,
    sx: i32,
    sy: i32,
    state: BrickState,
    layer: Layer,
    flip: BrickFlip,
    elapsed: f32,
    fall_timer: f32,
    sink: f32,
}

impl Brick {
    pub fn new(template: Arc<BrickTemplate>, x: i32, y: i32, layer: Layer, flip: BrickFlip) -> Self {
        Self {
            template,
            x,
            y,
            sx: x,
            sy: y,
            state: BrickState::Idle,
            layer,
            flip,
            elapsed: 0.0,
            fall_timer: 0.0,
            sink: 0.0,
        }
    }

    pub fn id(&self) -> u32 {
        self.template.id
    }

    pub fn kind(&self) -> BrickType {
        self.template.kind
    }

    pub fn behavior(&self) -> BrickBehavior {
        self.template.behavior
    }

    pub fn template(&self) -> &Arc<BrickTemplate> {
        &self.template
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn flip(&self) -> BrickFlip {
        self.flip
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn spawn_point(&self) -> (i32, i32) {
        (self.sx, self.sy)
    }

    pub fn size(&self) -> Vec2 {
        self.template.size()
    }

    pub fn bounding_box(&self) -> Rect {
        let size = self.size();
        Rect::new(self.x as f32, self.y as f32, size.x, size.y)
    }

    pub fn state(&self) -> BrickState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state != BrickState::Dead
    }

    pub fn kill(&mut self) {
        self.state = BrickState::Dead;
    }

    pub fn is_moving(&self) -> bool {
        self.template.behavior.is_moving()
    }

    /// Z-index with the tie-breaking offset for its type, layer and behavior.
    pub fn z_index(&self) -> f64 {
        self.template.zindex as f64 + self.z_offset()
    }

    pub fn z_offset(&self) -> f64 {
        let mut s = match self.template.kind {
            BrickType::Passable => -zindex_offset(20),
            BrickType::Cloud => -zindex_offset(10),
            BrickType::Solid => 0.0,
        };
        s += match self.layer {
            Layer::Yellow => -zindex_offset(50),
            Layer::Green => zindex_offset(50),
            Layer::Default => 0.0,
        };
        if self.template.behavior == BrickBehavior::Default {
            s -= zindex_offset(1);
        }
        s
    }

    /// The obstacle this brick contributes this frame. Passable bricks have none.
    pub fn obstacle(&self) -> Option<Obstacle> {
        let cloud = match self.template.kind {
            BrickType::Passable => return None,
            BrickType::Solid => false,
            BrickType::Cloud => true,
        };
        Some(Obstacle::new(
            Arc::clone(&self.template.mask),
            self.x,
            self.y,
            self.layer,
            ObstacleFlags {
                cloud,
                hflip: self.flip.horizontal(),
                vflip: self.flip.vertical(),
            },
        ))
    }

    pub fn update(&mut self, ctx: &mut BrickContext<'_>) {
        if self.state == BrickState::Dead {
            return;
        }
        let args = self.template.args;
        match self.template.behavior {
            BrickBehavior::Default | BrickBehavior::Marker => {}

            BrickBehavior::Breakable => {
                let bb = self.bounding_box();
                let breaker = ctx.players.iter().find(|p| {
                    (p.is_attacking() || p.is_rolling()) && p.bounding_box().expanded(3.0, 3.0).intersects(&bb)
                });
                if let Some(player) = breaker {
                    let speed_x = -player.actor.speed.x * 0.3;
                    self.shatter(ctx.particles, |_, _| Vec2::new(speed_x, -100.0));
                    self.state = BrickState::Dead;
                }
            }

            BrickBehavior::Smashable => {
                let bb = self.bounding_box();
                let mut smashed = false;
                for player in ctx.players.iter_mut() {
                    if player.is_attacking() && player.actor.speed.y > 0.0 && player.is_standing_on(&bb) {
                        player.bounce();
                        smashed = true;
                    }
                }
                if smashed {
                    self.shatter(ctx.particles, |i, _| Vec2::new(if i % 2 == 0 { -60.0 } else { 60.0 }, -150.0));
                    self.state = BrickState::Dead;
                }
            }

            BrickBehavior::Fall => {
                let bb = self.bounding_box();
                let stood_on = ctx.players.iter().any(|p| p.is_standing_on(&bb));
                if self.state == BrickState::Idle && stood_on {
                    self.state = BrickState::Active;
                }
                if self.state == BrickState::Active {
                    self.fall_timer += ctx.dt;
                    if self.fall_timer >= FALL_TIME {
                        let (cols, right_oriented) = (args[0].max(1.0) as i32, args[2] as i32 != 0);
                        self.shatter(ctx.particles, |bi, bj| {
                            let column = if right_oriented { bi } else { cols - bi };
                            Vec2::new(0.0, 20.0 + bj as f32 * 20.0 + column as f32 * 20.0)
                        });
                        self.state = BrickState::Dead;
                    }
                }
            }

            BrickBehavior::Circular => {
                self.elapsed += ctx.dt;
                let t = self.elapsed;
                let (rx, ry) = (args[0], args[1]);
                let (wx, wy) = (args[2] * 2.0 * PI, args[3] * 2.0 * PI);
                let phase = args[4] * PI / 180.0;
                let x = self.sx + (rx * (wx * t + phase).cos()).round() as i32;
                let y = self.sy + (ry * (wy * t + phase).sin()).round() as i32;
                self.move_carrying_players(x, y, ctx.players);
            }

            BrickBehavior::Pendular => {
                // args: amplitude (degrees), frequency (Hz), phase (degrees), radius
                self.elapsed += ctx.dt;
                let amplitude = args[0] * PI / 180.0;
                let angle = amplitude * (2.0 * PI * args[1] * self.elapsed + args[2] * PI / 180.0).sin();
                let radius = args[3];
                let x = self.sx + (radius * angle.sin()).round() as i32;
                let y = self.sy + (radius * (angle.cos() - 1.0)).round() as i32;
                self.move_carrying_players(x, y, ctx.players);
            }

            BrickBehavior::Float => {
                // args: maximum sink depth, sink speed
                let depth = if args[0] > 0.0 { args[0] } else { 8.0 };
                let speed = if args[1] > 0.0 { args[1] } else { 30.0 };
                let bb = self.bounding_box();
                let stood_on = ctx.players.iter().any(|p| p.is_standing_on(&bb));
                self.sink = if stood_on {
                    (self.sink + speed * ctx.dt).min(depth)
                } else {
                    (self.sink - speed * ctx.dt).max(0.0)
                };
                let y = self.sy + self.sink.round() as i32;
                self.move_carrying_players(self.x, y, ctx.players);
            }
        }
    }

    fn move_carrying_players(&mut self, x: i32, y: i32, players: &mut [Player]) {
        let (dx, dy) = (x - self.x, y - self.y);
        if dx == 0 && dy == 0 {
            return;
        }
        if self.template.kind != BrickType::Passable {
            let bb = self.bounding_box();
            for player in players.iter_mut() {
                if !player.is_getting_hit() && player.is_standing_on(&bb) {
                    let position = player.position() + Vec2::new(dx as f32, dy as f32);
                    player.set_position(position);
                }
            }
        }
        self.x = x;
        self.y = y;
    }

    /// Breaks into `args[0] x args[1]` pieces.
    fn shatter(&self, particles: &mut ParticleSystem, speed: impl Fn(i32, i32) -> Vec2) {
        let size = self.size();
        let cols = self.template.args[0].max(1.0) as i32;
        let rows = self.template.args[1].max(1.0) as i32;
        let piece = Vec2::new(size.x / cols as f32, size.y / rows as f32);
        for bi in 0..cols {
            for bj in 0..rows {
                let offset = Vec2::new(bi as f32 * piece.x, bj as f32 * piece.y);
                particles.add(
                    &self.template.sprite,
                    Vec2::new(self.x as f32, self.y as f32) + offset,
                    piece,
                    speed(bi, bj),
                );
            }
        }
    }

    /// Draws the brick. Off the default layer, the editor tints it by layer.
    pub fn render(&self, renderer: &mut dyn Renderer, top_left: Vec2, editing: bool) {
        if self.template.behavior == BrickBehavior::Marker && !editing {
            return;
        }
        let tint = match (editing, self.layer) {
            (true, Layer::Green) => Color::GREEN.with_alpha(128),
            (true, Layer::Yellow) => Color::YELLOW.with_alpha(128),
            _ => Color::WHITE,
        };
        let position = Vec2::new(self.x as f32, self.y as f32) - top_left;
        renderer.sprite(&self.template.sprite, position, self.size(), self.flip.to_flip(), tint);
    }

    /// Draws the collision mask outline, for the editor.
    pub fn render_mask(&self, renderer: &mut dyn Renderer, top_left: Vec2) {
        if self.template.kind == BrickType::Passable {
            return;
        }
        let color = match self.layer {
            Layer::Green => Color::GREEN,
            Layer::Yellow => Color::YELLOW,
            Layer::Default => Color::WHITE,
        };
        let position = Vec2::new(self.x as f32, self.y as f32) - top_left;
        renderer.rect(position, self.size(), color.with_alpha(96), true);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn template(id: u32, kind: BrickType, behavior: BrickBehavior, args: &[f32]) -> BrickTemplate {
        let mut a = [0.0; BRICK_BEHAVIOR_MAXARGS];
        a[..args.len()].copy_from_slice(args);
        BrickTemplate {
            id,
            kind,
            behavior,
            args: a,
            zindex: 0.5,
            sprite: format!("brick{id}"),
            mask: Arc::new(CollisionMask::create_box(64, 32)),
        }
    }

    fn brick(kind: BrickType, behavior: BrickBehavior, args: &[f32]) -> Brick {
        Brick::new(Arc::new(template(1, kind, behavior, args)), 100, 200, Layer::Default, BrickFlip::NoFlip)
    }

    fn temp_path(name_hint: &str) -> std::path::PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("surge_{name_hint}_{}_{nanos}.json", std::process::id()))
    }

    #[test]
    fn passable_bricks_have_no_obstacle() {
        assert!(brick(BrickType::Passable, BrickBehavior::Default, &[]).obstacle().is_none());
        let cloud = brick(BrickType::Cloud, BrickBehavior::Default, &[])
            .obstacle()
            .expect("clouds are obstacles");
        assert!(!cloud.is_solid());
        assert!(brick(BrickType::Solid, BrickBehavior::Default, &[])
            .obstacle()
            .expect("solid")
            .is_solid());
    }

    #[test]
    fn z_offsets_order_layers_above_types() {
        let at = |kind: BrickType, layer: Layer| {
            let t = template(1, kind, BrickBehavior::Circular, &[]);
            Brick::new(Arc::new(t), 0, 0, layer, BrickFlip::NoFlip).z_offset()
        };
        assert!((at(BrickType::Passable, Layer::Default) + 2e-5).abs() < 1e-9);
        assert!((at(BrickType::Cloud, Layer::Default) + 1e-5).abs() < 1e-9);
        assert!(at(BrickType::Solid, Layer::Default).abs() < 1e-9);
        assert!((at(BrickType::Solid, Layer::Green) - 5e-5).abs() < 1e-9);
        assert!((at(BrickType::Passable, Layer::Yellow) + 7e-5).abs() < 1e-9);
        // static bricks sit just behind moving ones
        let fixed = brick(BrickType::Solid, BrickBehavior::Default, &[]);
        assert!((fixed.z_offset() + 1e-6).abs() < 1e-9);
    }

    #[test]
    fn flip_names_round_trip() {
        for flip in BrickFlip::ALL {
            assert_eq!(BrickFlip::from_name(flip.name()), *flip);
        }
        assert_eq!(BrickFlip::from_name("HFLIP"), BrickFlip::HFlip);
        assert_eq!(BrickFlip::from_name("sideways"), BrickFlip::NoFlip);
        assert_eq!(BrickFlip::VHFlip.next(), BrickFlip::NoFlip);
    }

    #[test]
    fn circular_bricks_follow_their_path() {
        let mut b = brick(BrickType::Solid, BrickBehavior::Circular, &[32.0, 16.0, 0.25, 0.25, 0.0]);
        let mut particles = ParticleSystem::new();
        let mut ctx = BrickContext {
            players: &mut [],
            particles: &mut particles,
            dt: 1.0,
        };
        // a quarter period later: cos = 0, sin = 1
        b.update(&mut ctx);
        assert_eq!(b.position(), (100, 216));
        assert_eq!(b.spawn_point(), (100, 200));
    }

    #[test]
    fn circular_bricks_carry_players_on_top() {
        let mut b = brick(BrickType::Solid, BrickBehavior::Circular, &[32.0, 0.0, 0.25, 0.0, 0.0]);
        // starting phase puts the brick at sx + 32
        let mut particles = ParticleSystem::new();
        let mut players = vec![Player::new("Surge", Vec2::new(140.0, 200.0))];
        let mut ctx = BrickContext {
            players: &mut players,
            particles: &mut particles,
            dt: 0.0,
        };
        b.update(&mut ctx);
        assert_eq!(b.position(), (132, 200));
        assert_eq!(players[0].position(), Vec2::new(172.0, 200.0));
    }

    #[test]
    fn fall_bricks_crumble_after_being_stood_on() {
        let mut b = brick(BrickType::Solid, BrickBehavior::Fall, &[2.0, 2.0, 0.0]);
        let mut particles = ParticleSystem::new();
        let mut players = vec![Player::new("Surge", Vec2::new(120.0, 200.0))];
        let mut ctx = BrickContext {
            players: &mut players,
            particles: &mut particles,
            dt: 0.5,
        };
        b.update(&mut ctx);
        assert_eq!(b.state(), BrickState::Active);
        ctx.players[0].set_position(Vec2::new(-500.0, 0.0));
        b.update(&mut ctx);
        assert!(!b.is_alive());
        assert_eq!(particles.len(), 4);
    }

    #[test]
    fn breakable_bricks_need_an_attacking_player() {
        let mut b = brick(BrickType::Solid, BrickBehavior::Breakable, &[1.0, 1.0]);
        let mut particles = ParticleSystem::new();
        let mut players = vec![Player::new("Surge", Vec2::new(98.0, 210.0))];
        let mut ctx = BrickContext {
            players: &mut players,
            particles: &mut particles,
            dt: 1.0 / 60.0,
        };
        b.update(&mut ctx);
        assert!(b.is_alive());
    }

    #[test]
    fn float_bricks_sink_under_weight() {
        let mut b = brick(BrickType::Cloud, BrickBehavior::Float, &[8.0, 60.0]);
        let mut particles = ParticleSystem::new();
        let mut players = vec![Player::new("Surge", Vec2::new(120.0, 200.0))];
        let mut ctx = BrickContext {
            players: &mut players,
            particles: &mut particles,
            dt: 0.05,
        };
        b.update(&mut ctx);
        assert_eq!(b.position(), (100, 203));
        assert_eq!(ctx.players[0].position().y, 203.0);
        for _ in 0..10 {
            b.update(&mut ctx);
        }
        assert_eq!(b.position(), (100, 208));
    }

    #[test]
    fn brickset_loads_from_json() {
        let path = temp_path("brickset");
        fs::write(
            &path,
            r#####"{ "bricks": [
                { "id": 1, "type": "solid", "width": 32, "height": 16 },
                { "id": 3, "type": "cloud", "behavior": "circular", "behavior_args": [1, 2, 3, 4, 5],
                  "zindex": 7.0, "width": 4, "height": 2, "mask": { "rows": ["#..#", "####"] } }
            ] }"#####,
        )
        .expect("write brickset");

        let set = load_brickset_from_path(&path, Path::new(".")).expect("brickset should load");
        assert!(set.exists(1));
        assert!(!set.exists(2));
        assert_eq!(set.ids().collect::<Vec<_>>(), vec![1, 3]);
        let cloud = set.get(3).expect("brick 3");
        assert_eq!(cloud.kind, BrickType::Cloud);
        assert_eq!(cloud.args, [1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(cloud.zindex, 1.0);
        assert!(!cloud.mask.peek(1, 0));
        assert_eq!(set.get(1).expect("brick 1").size(), Vec2::new(32.0, 16.0));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn brickset_rejects_duplicates() {
        let path = temp_path("brickset_dup");
        fs::write(
            &path,
            r#"{ "bricks": [ { "id": 1, "width": 1, "height": 1 }, { "id": 1, "width": 1, "height": 1 } ] }"#,
        )
        .expect("write brickset");
        let err = load_brickset_from_path(&path, Path::new(".")).expect_err("duplicate id");
        assert!(err.contains("duplicate brick id 1"));
        let _ = fs::remove_file(&path);
    }
}
