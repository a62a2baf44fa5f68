//! A level in play.
//!
//! [`Level`] owns everything level-scoped: bricks, legacy items and objects
//! (through the [`EntityManager`]), players, particles, the camera, dialog
//! regions and the `Level` script object. [`Level::update`] runs one tick of
//! the pipeline below, in this order:
//!
//! 1. drop dead entities
//! 2. honor a pending restart or stage change
//! 3. background parallax
//! 4. camera focus
//! 5. active region (3x3 screens) for bricks, items and objects
//! 6. region of interest (2x2 screens) for scripted entities
//! 7. retrieve the active entities
//! 8. update items and objects, or clean up the ones that left the play area
//! 9. update bricks
//! 10. rebuild the obstacle map
//! 11. particles
//! 12. early player update
//! 13. scripts
//! 14. player physics
//! 15. objects attached to players
//! 16. camera
//! 17. late script update
//! 18. dialog regions
//! 19. dying players, music fade and restarts
//! 20. release the retrieved lists

pub mod actor;
pub mod background;
pub mod brick;
pub mod camera;
pub mod collision_mask;
pub mod dialog;
pub mod entity_manager;
pub mod error;
pub mod item;
pub mod legacy_object;
pub mod lev;
pub mod obstacle;
pub mod obstacle_map;
pub mod particles;
pub mod player;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::Vec2;
use surge_core::Color;
use surge_platform::video::{SCREEN_HEIGHT, SCREEN_WIDTH};
use surge_platform::{Audio, Renderer};
use surge_render::{Camera2D, RenderKind, RenderQueue};

use crate::resource::ResourceManager;
use crate::scripting::tags::{TAG_PRIVATE, TAG_SETUP};
use crate::scripting::{Handle, LevelObject, ScriptVm, ScriptedDrawable};
use actor::Rect;
use background::{load_background_from_path, Background};
use brick::{load_brickset_from_path, Brick, BrickContext, BrickFlip, BrickType, Brickset};
use camera::LevelCamera;
use dialog::{DialogBox, DialogRegion};
use entity_manager::{EntityKey, EntityManager};
use item::{script_replacement, Item, ItemContext, ItemEvent};
use legacy_object::LegacyObject;
use lev::{load_level_file, BrickLine, EntityLine, ItemLine, LevelFile, ObjectLine};
use obstacle::Layer;
use obstacle_map::ObstacleMap;
use particles::ParticleSystem;
use player::{PhysicsConfig, Player, PlayerInput, TeamStats, DEFAULT_TEAM};

pub use error::LevelError;

/// Seconds between a player's death and the restart.
pub const DEATH_GRACE_PERIOD: f32 = 2.5;
/// Music volume lost per second while a player is dying.
const MUSIC_FADE_RATE: f32 = 0.5;
/// Seconds between clearing a level and moving on.
const CLEARED_DELAY: f32 = 3.0;
const CLEARED_CAMERA_OFFSET: Vec2 = Vec2::new(0.0, -90.0);

/// Drawn over everything else in the world.
pub const GIZMO_ZINDEX: f64 = 99999.0;
const WATER_ZINDEX: f64 = 1.0;
const PARTICLES_ZINDEX: f64 = 1.0;

/// The part of a level a restart rolls back to.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub spawn_point: Vec2,
    pub waterlevel: Option<i32>,
    pub watercolor: Color,
    /// Background file, relative to the asset root. Empty for none.
    pub background: String,
}

/// What survives a restart.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelState {
    /// Last checkpoint, if the restart keeps it. `None` starts over from the file.
    pub checkpoint: Option<Checkpoint>,
    pub lives: i32,
    pub score: i32,
}

/// What the scene should do after a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum LevelSignal {
    Continue,
    /// Reload the level. The state is carried into the new instance.
    Restart(LevelState),
    GameOver,
    /// Leave the level so the quest moves on.
    NextStage,
    /// The scripts asked the game to quit.
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderOptions {
    pub editing: bool,
    pub show_masks: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Drawable {
    Brick(EntityKey),
    BrickMask(EntityKey),
    Item(EntityKey),
    Object(EntityKey),
    Player(usize),
    Particles,
    Scripted(ScriptedDrawable),
    Water,
}

pub struct Level {
    path: PathBuf,
    meta: LevelFile,
    brickset: Arc<Brickset>,
    background: Option<Background>,
    entities: EntityManager,
    obstacles: ObstacleMap,
    players: Vec<Player>,
    active_player: usize,
    team: TeamStats,
    particles: ParticleSystem,
    camera: LevelCamera,
    dialogs: Vec<DialogRegion>,
    dialog_box: DialogBox,
    spawn_point: Vec2,
    checkpoint: Checkpoint,
    level_object: LevelObject,
    render_queue: RenderQueue<Drawable>,
    elapsed: f32,
    dead_player_timeout: f32,
    cleared_timer: Option<f32>,
    pending: Option<LevelSignal>,
    obstacle_rebuilds: u64,
}

impl Level {
    /// Reads a `.lev` file and everything it refers to. Asset paths resolve
    /// against the root of `resources`.
    pub fn load(
        path: &Path,
        resources: &mut ResourceManager,
        vm: &ScriptVm,
        state: Option<&LevelState>,
    ) -> Result<Self, LevelError> {
        log::info!("Loading level {}", path.display());
        let mut file = load_level_file(path)?;
        if let Some(checkpoint) = state.and_then(|s| s.checkpoint.as_ref()) {
            file.bgtheme = checkpoint.background.clone();
        }
        if file.theme.is_empty() {
            return Err(LevelError::MissingTheme(path.to_path_buf()));
        }
        let asset_root = resources.root().to_path_buf();
        let brickset = resources
            .brickset(&file.theme, |p| load_brickset_from_path(p, &asset_root))
            .map_err(LevelError::Brickset)?;
        let background = if file.bgtheme.is_empty() {
            None
        } else {
            match load_background_from_path(&asset_root.join(&file.bgtheme), &file.bgtheme) {
                Ok(background) => Some(background),
                Err(e) => {
                    log::warn!("{e}");
                    None
                }
            }
        };
        Self::from_file(path, file, brickset, background, vm, state)
    }

    /// Builds a level from parsed data. Nothing is left behind in the script
    /// VM when this fails.
    pub fn from_file(
        path: &Path,
        file: LevelFile,
        brickset: Arc<Brickset>,
        background: Option<Background>,
        vm: &ScriptVm,
        state: Option<&LevelState>,
    ) -> Result<Self, LevelError> {
        let level_object = LevelObject::new(vm).map_err(LevelError::Script)?;
        match Self::populate(path, file, brickset, background, vm, state, level_object) {
            Ok(level) => {
                level.level_object.spawn_setup_objects(vm);
                level.level_object.on_level_load(vm);
                log::info!(
                    "Level \"{}\" loaded: {} bricks, {} items, {} objects",
                    level.meta.name,
                    level.entities.bricks.len(),
                    level.entities.items.len(),
                    level.entities.objects.len()
                );
                Ok(level)
            }
            Err((e, handle)) => {
                vm.kill(handle);
                vm.collect_garbage();
                Err(e)
            }
        }
    }

    fn populate(
        path: &Path,
        mut file: LevelFile,
        brickset: Arc<Brickset>,
        background: Option<Background>,
        vm: &ScriptVm,
        state: Option<&LevelState>,
        level_object: LevelObject,
    ) -> Result<Self, (LevelError, Handle)> {
        let handle = level_object.handle();
        level_object.set_setup_objects(vm, &file.setup);

        let mut entities = EntityManager::new();
        for line in file.bricks.drain(..) {
            match brickset.get(line.id) {
                Some(template) => {
                    entities
                        .bricks
                        .store(Brick::new(Arc::clone(template), line.x, line.y, line.layer, line.flip));
                }
                None => log::warn!("Level loader - invalid brick: {}", line.id),
            }
        }

        for line in file.items.drain(..) {
            let position = Vec2::new(line.x as f32, line.y as f32);
            match script_replacement(line.kind).filter(|class| vm.class_exists(class)) {
                Some(class) => {
                    level_object
                        .restore_entity(vm, class, position, None)
                        .map_err(|e| (e, handle))?;
                }
                None => {
                    entities.items.store(Item::new(line.kind, position));
                }
            }
        }

        for line in file.objects.drain(..) {
            if vm.has_tag(&line.name, TAG_SETUP) {
                level_object.register_setup_object_name(vm, &line.name);
                continue;
            }
            entities
                .objects
                .store(LegacyObject::new(&line.name, Vec2::new(line.x as f32, line.y as f32)));
        }

        for line in file.entities.drain(..) {
            level_object
                .restore_entity(vm, &line.name, Vec2::new(line.x as f32, line.y as f32), line.id)
                .map_err(|e| (e, handle))?;
        }

        let mut spawn_point = Vec2::new(file.spawn_point.0 as f32, file.spawn_point.1 as f32);
        if let Some(checkpoint) = state.and_then(|s| s.checkpoint.as_ref()) {
            spawn_point = checkpoint.spawn_point;
            file.waterlevel = checkpoint.waterlevel;
            file.watercolor = checkpoint.watercolor;
            file.bgtheme = checkpoint.background.clone();
        }
        let checkpoint = Checkpoint {
            spawn_point,
            waterlevel: file.waterlevel,
            watercolor: file.watercolor,
            background: file.bgtheme.clone(),
        };
        let names: Vec<String> = if file.players.is_empty() {
            DEFAULT_TEAM.iter().map(|s| s.to_string()).collect()
        } else {
            file.players.clone()
        };
        let players: Vec<Player> = names.iter().map(|name| Player::new(name, spawn_point)).collect();

        let mut team = TeamStats::new();
        if let Some(state) = state {
            team.set_lives(state.lives);
            team.add_score(state.score);
        }

        let dialogs = file.dialogs.iter().map(DialogRegion::from).collect();

        let mut level = Self {
            path: path.to_path_buf(),
            meta: file,
            brickset,
            background,
            entities,
            obstacles: ObstacleMap::new(),
            players,
            active_player: 0,
            team,
            particles: ParticleSystem::new(),
            camera: LevelCamera::new(Vec2::new(SCREEN_WIDTH as f32, SCREEN_HEIGHT as f32)),
            dialogs,
            dialog_box: DialogBox::new(),
            spawn_point,
            checkpoint,
            level_object,
            render_queue: RenderQueue::new(),
            elapsed: 0.0,
            dead_player_timeout: 0.0,
            cleared_timer: None,
            pending: None,
            obstacle_rebuilds: 0,
        };
        level.camera.set_level_size(level.level_size());
        level.camera.set_position(spawn_point);
        Ok(level)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn act(&self) -> u16 {
        self.meta.act
    }

    pub fn is_readonly(&self) -> bool {
        self.meta.readonly
    }

    pub fn music(&self) -> &str {
        &self.meta.music
    }

    pub fn grouptheme(&self) -> &str {
        &self.meta.grouptheme
    }

    pub fn brickset(&self) -> &Brickset {
        &self.brickset
    }

    pub fn entities(&self) -> &EntityManager {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut EntityManager {
        &mut self.entities
    }

    pub fn obstacles(&self) -> &ObstacleMap {
        &self.obstacles
    }

    /// How many times the obstacle map was rebuilt.
    pub fn obstacle_rebuilds(&self) -> u64 {
        self.obstacle_rebuilds
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn players_mut(&mut self) -> &mut [Player] {
        &mut self.players
    }

    pub fn player(&self) -> Option<&Player> {
        self.players.get(self.active_player)
    }

    pub fn set_active_player(&mut self, index: usize) {
        if index < self.players.len() {
            self.active_player = index;
        }
    }

    pub fn team(&self) -> &TeamStats {
        &self.team
    }

    pub fn team_mut(&mut self) -> &mut TeamStats {
        &mut self.team
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn camera(&self) -> &LevelCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut LevelCamera {
        &mut self.camera
    }

    pub fn dialog_box(&self) -> &DialogBox {
        &self.dialog_box
    }

    pub fn level_object(&self) -> &LevelObject {
        &self.level_object
    }


    pub fn spawn_point(&self) -> Vec2 {
        self.spawn_point
    }

    pub fn set_spawn_point(&mut self, position: Vec2) {
        self.spawn_point = position;
    }

    pub fn waterlevel(&self) -> Option<i32> {
        self.meta.waterlevel
    }

    pub fn set_waterlevel(&mut self, waterlevel: Option<i32>) {
        self.meta.waterlevel = waterlevel;
    }

    pub fn watercolor(&self) -> Color {
        self.meta.watercolor
    }

    /// Seconds played, not counting dying or the cleared sequence.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared_timer.is_some()
    }

    /// Bottom-right corner of the solid bricks, at least one screen.
    pub fn level_size(&self) -> Vec2 {
        let mut size = Vec2::new(SCREEN_WIDTH as f32, SCREEN_HEIGHT as f32);
        for (_, brick) in self.entities.bricks.iter() {
            if brick.kind() == BrickType::Passable {
                continue;
            }
            let (x, y) = brick.spawn_point();
            let corner = Vec2::new(x as f32, y as f32) + brick.size();
            size = size.max(corner);
        }
        size
    }

    /// Called after the editor changed the bricks.
    pub fn refresh_level_size(&mut self) {
        let size = self.level_size();
        self.camera.set_level_size(size);
    }

    pub fn background_file(&self) -> &str {
        &self.meta.bgtheme
    }

    /// What survives a death or a restart. The water and the background roll
    /// back to what they were at the last checkpoint.
    pub fn state(&self, keep_spawn_point: bool) -> LevelState {
        LevelState {
            checkpoint: keep_spawn_point.then(|| Checkpoint {
                spawn_point: self.spawn_point,
                ..self.checkpoint.clone()
            }),
            lives: self.team.lives(),
            score: self.team.score(),
        }
    }

    /// Schedules a restart at the start of the next tick.
    pub fn restart(&mut self, keep_spawn_point: bool) {
        self.pending = Some(LevelSignal::Restart(self.state(keep_spawn_point)));
    }

    pub fn jump_to_next_stage(&mut self) {
        self.pending = Some(LevelSignal::NextStage);
    }

    pub fn set_debug_mode(&mut self, vm: &ScriptVm, enabled: bool) {
        self.level_object.set_debug_mode(vm, enabled);
    }

    pub fn start_music(&self, audio: &mut dyn Audio) {
        if !self.meta.music.is_empty() {
            audio.set_music_volume(1.0);
            audio.play_music(&self.meta.music, true);
        }
    }

    /// One tick. See the module docs for the order of the phases.
    pub fn update(&mut self, vm: &ScriptVm, audio: &mut dyn Audio, input: &PlayerInput, dt: f32) -> LevelSignal {
        // 1
        self.entities.remove_dead();

        // 2
        if let Some(signal) = self.pending.take() {
            return signal;
        }
        if !vm.is_active() {
            return LevelSignal::Quit;
        }
        if let Some(timer) = self.cleared_timer.as_mut() {
            *timer += dt;
            if *timer >= CLEARED_DELAY {
                return LevelSignal::NextStage;
            }
        }

        // 3
        if let Some(background) = self.background.as_mut() {
            background.update(dt);
        }

        // 4
        let got_dying_player = self.players.iter().any(Player::is_dying);
        let focus = match self.player() {
            Some(player) if self.is_cleared() => player.position() + CLEARED_CAMERA_OFFSET,
            Some(player) => player.position(),
            None => self.camera.position(),
        };

        // 5, 6
        let active_region = self.camera.region(3.0);
        let play_area = self.camera.region(2.0);
        self.entities.set_active_region(active_region);
        self.level_object.set_roi(vm, play_area);

        // 7
        let bricks = self.entities.retrieve_active_bricks();
        let items = self.entities.retrieve_active_items();
        let objects = self.entities.retrieve_active_objects();

        // 8
        let mut events = Vec::new();
        for key in items.iter() {
            let Some(item) = self.entities.items.get_mut(key) else {
                continue;
            };
            let flags = item.flags();
            if flags.always_active || item.bounding_box().intersects(&play_area) {
                item.update(&mut ItemContext {
                    players: &mut self.players,
                    team: &mut self.team,
                    particles: &mut self.particles,
                    events: &mut events,
                    dt,
                    editing: false,
                });
            } else if !flags.preserve {
                item.kill();
            } else {
                let bb = item.bounding_box();
                let spawn = spawn_box(bb, item.position(), item.spawn_point());
                if !spawn.intersects(&play_area) {
                    item.actor_mut().move_to_spawn_point();
                }
            }
        }
        for key in objects.iter() {
            let Some(object) = self.entities.objects.get_mut(key) else {
                continue;
            };
            if object.always_active || object.bounding_box().intersects(&play_area) {
                object.update(dt);
            } else if !object.preserve {
                object.kill();
            } else {
                let bb = object.bounding_box();
                let spawn = spawn_box(bb, object.position(), object.spawn_point());
                if !spawn.intersects(&play_area) {
                    object.actor.move_to_spawn_point();
                }
            }
        }
        self.handle_item_events(&events);

        // 9
        for key in bricks.iter() {
            if let Some(brick) = self.entities.bricks.get_mut(key) {
                brick.update(&mut BrickContext {
                    players: &mut self.players,
                    particles: &mut self.particles,
                    dt,
                });
            }
        }

        // 10
        self.rebuild_obstacle_map(&bricks, &items, &objects, vm);

        // 11
        self.particles
            .update(dt, PhysicsConfig::default().gravity, &active_region);

        // 12
        for player in &mut self.players {
            player.early_update();
        }

        // 13
        self.level_object.update(vm, dt);

        // 14
        let level_height = self.camera_level_height();
        for (index, player) in self.players.iter_mut().enumerate() {
            if got_dying_player && !player.is_dying() && !player.is_getting_hit() {
                continue;
            }
            let controls = (index == self.active_player).then_some(input);
            player.update(controls, &self.obstacles, dt, level_height);
        }

        // 15
        if let Some(position) = self.player().map(Player::position) {
            for key in objects.iter() {
                if let Some(object) = self.entities.objects.get_mut(key) {
                    object.apply_attachment(position);
                }
            }
        }

        // 16
        self.camera.update(focus, dt, self.level_object.debug_mode(vm));

        // 17
        self.level_object.late_update(vm, dt);

        // 18
        let player_box = self.player().map(Player::bounding_box);
        self.dialog_box.update(&mut self.dialogs, player_box, self.elapsed, dt);

        // 19
        let mut signal = LevelSignal::Continue;
        if got_dying_player {
            audio.set_music_volume(audio.music_volume() - MUSIC_FADE_RATE * dt);
            self.dead_player_timeout += dt;
            if self.dead_player_timeout >= DEATH_GRACE_PERIOD {
                if self.team.lives() > 1 {
                    self.team.set_lives(self.team.lives() - 1);
                    signal = LevelSignal::Restart(self.state(true));
                } else {
                    signal = LevelSignal::GameOver;
                }
            }
        } else if !self.is_cleared() {
            self.elapsed += dt;
        }

        // 20
        self.entities.release_retrieved_bricks(bricks);
        self.entities.release_retrieved_items(items);
        self.entities.release_retrieved_objects(objects);

        signal
    }

    fn camera_level_height(&self) -> f32 {
        self.level_size().y
    }

    fn handle_item_events(&mut self, events: &[ItemEvent]) {
        for event in events {
            match *event {
                ItemEvent::Checkpoint(position) => {
                    log::debug!("Checkpoint reached at {position}");
                    self.spawn_point = position;
                    self.checkpoint = Checkpoint {
                        spawn_point: position,
                        waterlevel: self.meta.waterlevel,
                        watercolor: self.meta.watercolor,
                        background: self.meta.bgtheme.clone(),
                    };
                }
                ItemEvent::Cleared => {
                    if self.cleared_timer.is_none() {
                        log::info!("Level \"{}\" cleared", self.meta.name);
                        self.cleared_timer = Some(0.0);
                    }
                }
            }
        }
    }

    fn rebuild_obstacle_map(
        &mut self,
        bricks: &entity_manager::Retrieved,
        items: &entity_manager::Retrieved,
        objects: &entity_manager::Retrieved,
        vm: &ScriptVm,
    ) {
        self.obstacles.clear();
        let bricklike = {
            let world = vm.world();
            let entities = &world.level.entities;
            entities
                .bricklike_iterator(&world)
                .into_iter()
                .filter_map(|h| entities.bricklike_obstacle(&world, h))
                .collect::<Vec<_>>()
        };
        let obstacles = bricks
            .iter()
            .filter_map(|k| self.entities.bricks.get(k).filter(|b| b.is_alive()).and_then(Brick::obstacle))
            .chain(items.iter().filter_map(|k| self.entities.items.get(k).and_then(Item::obstacle)))
            .chain(
                objects
                    .iter()
                    .filter_map(|k| self.entities.objects.get(k).and_then(LegacyObject::obstacle)),
            )
            .chain(bricklike)
            .collect::<Vec<_>>();
        for obstacle in obstacles {
            if let Err(e) = self.obstacles.add(obstacle) {
                log::warn!("{e}");
            }
        }
        self.obstacles.build();
        self.obstacle_rebuilds += 1;
    }

    /// Draws the level as seen by its own camera.
    pub fn render(&mut self, renderer: &mut dyn Renderer, vm: &ScriptVm, options: RenderOptions) {
        self.level_object.notify_entities(vm, "render", &[]);
        let camera = *self.camera.inner();
        self.render_from(renderer, vm, &camera, options);
    }

    /// Draws the level as seen by `camera`. The editor passes its own.
    pub fn render_from(&mut self, renderer: &mut dyn Renderer, vm: &ScriptVm, camera: &Camera2D, options: RenderOptions) {
        if let Some(background) = &self.background {
            background.render_background(renderer, camera.position);
        }

        let (x, y, w, h) = camera.region(1.0);
        self.entities.set_active_region(Rect::new(x, y, w, h).expanded(64.0, 64.0));
        let bricks = self.entities.retrieve_active_bricks();
        let items = self.entities.retrieve_active_items();
        let objects = self.entities.retrieve_active_objects();

        self.render_queue.begin(camera.position);
        for key in bricks.iter() {
            if let Some(brick) = self.entities.bricks.get(key) {
                let bottom = brick.bounding_box().bottom() as i32;
                self.render_queue
                    .enqueue(RenderKind::Brick, brick.z_index(), bottom, Drawable::Brick(key));
                if options.show_masks {
                    self.render_queue
                        .enqueue(RenderKind::Gizmo, GIZMO_ZINDEX, bottom, Drawable::BrickMask(key));
                }
            }
        }
        for key in items.iter() {
            if let Some(item) = self.entities.items.get(key) {
                let bottom = item.bounding_box().bottom() as i32;
                self.render_queue
                    .enqueue(RenderKind::Item, item.z_index(), bottom, Drawable::Item(key));
            }
        }
        for key in objects.iter() {
            if let Some(object) = self.entities.objects.get(key) {
                let bottom = object.bounding_box().bottom() as i32;
                self.render_queue
                    .enqueue(RenderKind::Object, object.z_index(), bottom, Drawable::Object(key));
            }
        }
        for (index, player) in self.players.iter().enumerate() {
            self.render_queue.enqueue(
                RenderKind::Player,
                player.z_index(),
                player.position().y as i32,
                Drawable::Player(index),
            );
        }
        self.render_queue
            .enqueue(RenderKind::Particles, PARTICLES_ZINDEX, 0, Drawable::Particles);
        let scripted = {
            let world = vm.world();
            world.level.entities.drawables(&world)
        };
        for drawable in scripted {
            let ypos = drawable.position.y as i32;
            self.render_queue
                .enqueue(RenderKind::Scripted, drawable.zindex, ypos, Drawable::Scripted(drawable));
        }
        if self.meta.waterlevel.is_some() {
            self.render_queue.enqueue(RenderKind::Water, WATER_ZINDEX, 0, Drawable::Water);
        }

        let entities = &self.entities;
        let players = &self.players;
        let particles = &self.particles;
        let water = self.meta.waterlevel.map(|y| (y, self.meta.watercolor));
        let top_left = camera.top_left();
        self.render_queue.end(|node, _| match &node.item {
            Drawable::Brick(key) => {
                if let Some(brick) = entities.bricks.get(*key) {
                    brick.render(renderer, top_left, options.editing);
                }
            }
            Drawable::BrickMask(key) => {
                if let Some(brick) = entities.bricks.get(*key) {
                    brick.render_mask(renderer, top_left);
                }
            }
            Drawable::Item(key) => {
                if let Some(item) = entities.items.get(*key) {
                    item.render(renderer, top_left, options.editing);
                }
            }
            Drawable::Object(key) => {
                if let Some(object) = entities.objects.get(*key) {
                    object.render(renderer, top_left);
                }
            }
            Drawable::Player(index) => {
                if let Some(player) = players.get(*index) {
                    player.actor.render(renderer, top_left);
                }
            }
            Drawable::Particles => particles.render(renderer, top_left),
            Drawable::Scripted(d) => {
                let at = if d.detached { d.position } else { d.position - top_left };
                renderer.sprite(&d.sprite, at, d.size, Default::default(), Color::WHITE);
            }
            Drawable::Water => {
                if let Some((y, color)) = water {
                    let screen_y = (y as f32 - top_left.y).max(0.0);
                    let height = SCREEN_HEIGHT as f32 - screen_y;
                    if height > 0.0 {
                        renderer.rect(
                            Vec2::new(0.0, screen_y),
                            Vec2::new(SCREEN_WIDTH as f32, height),
                            color,
                            true,
                        );
                    }
                }
            }
        });

        self.entities.release_retrieved_bricks(bricks);
        self.entities.release_retrieved_items(items);
        self.entities.release_retrieved_objects(objects);

        if let Some(background) = &self.background {
            background.render_foreground(renderer, camera.position);
        }
        if !options.editing {
            self.dialog_box.render(renderer);
            self.render_hud(renderer);
        }
    }

    fn render_hud(&self, renderer: &mut dyn Renderer) {
        renderer.text(&format!("SCORE {}", self.team.score()), Vec2::new(16.0, 8.0), Color::YELLOW);
        renderer.text(
            &format!("TIME {}:{:02}", self.elapsed as u32 / 60, self.elapsed as u32 % 60),
            Vec2::new(16.0, 20.0),
            Color::YELLOW,
        );
        renderer.text(
            &format!("POWER {}", self.team.collectibles()),
            Vec2::new(16.0, 32.0),
            Color::YELLOW,
        );
        renderer.text(
            &format!("x{}", self.team.lives()),
            Vec2::new(16.0, SCREEN_HEIGHT as f32 - 20.0),
            Color::WHITE,
        );
    }

    /// Current state of the level as a `.lev` document.
    pub fn to_level_file(&self, vm: &ScriptVm) -> LevelFile {
        let mut file = self.meta.clone();
        file.spawn_point = (self.spawn_point.x as i32, self.spawn_point.y as i32);
        file.setup = self.level_object.setup_objects(vm);
        file.dialogs = self.dialogs.iter().map(DialogRegion::to_line).collect();

        file.bricks = self
            .entities
            .bricks
            .iter()
            .filter(|(_, b)| b.is_alive())
            .map(|(_, b)| {
                let (x, y) = b.spawn_point();
                BrickLine {
                    id: b.id(),
                    x,
                    y,
                    layer: b.layer(),
                    flip: b.flip(),
                }
            })
            .collect();

        let world = vm.world();
        file.entities = world
            .level
            .entities
            .persistent_entities(&world)
            .into_iter()
            .filter_map(|handle| {
                let object = world.graph.get(handle)?;
                if world.tags.has_tag(&object.name, TAG_PRIVATE) {
                    return None;
                }
                let info = object.entity?;
                Some(EntityLine {
                    name: object.name.clone(),
                    x: info.spawn_point.x as i32,
                    y: info.spawn_point.y as i32,
                    id: Some(info.id),
                })
            })
            .collect();

        file.items = self
            .entities
            .items
            .iter()
            .filter(|(_, i)| !i.is_dead())
            .map(|(_, i)| ItemLine {
                kind: i.kind(),
                x: i.spawn_point().x as i32,
                y: i.spawn_point().y as i32,
            })
            .collect();

        file.objects = self
            .entities
            .objects
            .iter()
            .filter(|(_, o)| !o.is_dead() && o.created_from_editor)
            .map(|(_, o)| ObjectLine {
                name: o.name.clone(),
                x: o.spawn_point().x as i32,
                y: o.spawn_point().y as i32,
            })
            .collect();

        file
    }

    /// Writes the level back to its file.
    pub fn save(&self, vm: &ScriptVm) -> Result<(), String> {
        if self.meta.readonly {
            return Err(format!("Level {} is read-only", self.path.display()));
        }
        self.to_level_file(vm).save(&self.path)?;
        log::info!("Saved level {}", self.path.display());
        Ok(())
    }

    // editor operations

    pub fn add_brick(&mut self, id: u32, position: Vec2, layer: Layer, flip: BrickFlip) -> Option<EntityKey> {
        let template = self.brickset.get(id)?;
        let brick = Brick::new(Arc::clone(template), position.x as i32, position.y as i32, layer, flip);
        Some(self.entities.bricks.store(brick))
    }

    pub fn add_item(&mut self, kind: u32, position: Vec2) -> EntityKey {
        self.entities.items.store(Item::new(kind, position))
    }

    pub fn add_object(&mut self, name: &str, position: Vec2) -> EntityKey {
        self.entities.objects.store(LegacyObject::new(name, position))
    }

    /// Releases the script side of the level. The Rust side goes with `self`.
    pub fn release(&self, vm: &ScriptVm) {
        self.level_object.on_level_unload(vm);
        vm.kill(self.level_object.handle());
        vm.collect_garbage();
    }
}

/// Bounding box an entity would have at its spawn point.
fn spawn_box(bb: Rect, position: Vec2, spawn_point: Vec2) -> Rect {
    let offset = spawn_point - position;
    Rect::new(bb.x + offset.x, bb.y + offset.y, bb.w, bb.h)
}

impl std::fmt::Debug for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Level")
            .field("path", &self.path)
            .field("name", &self.meta.name)
            .field("bricks", &self.entities.bricks.len())
            .field("items", &self.entities.items.len())
            .field("objects", &self.entities.objects.len())
            .field("players", &self.players.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::Value;
    use brick::tests::template;
    use brick::BrickBehavior;
    use item::{IT_BOUNCINGCOLLECT, IT_COLLECTIBLE};
    use lev::parse_level;
    use surge_platform::SilentAudio;

    const SCRIPTS: &str = r#"
class("E", { tags = { "entity" } }, {})
class("Platform", { tags = { "entity", "bricklike" } }, {
    init = function(self)
        self:set("width", 64)
        self:set("height", 16)
    end,
})
"#;

    fn vm() -> ScriptVm {
        let mut vm = ScriptVm::new().expect("vm");
        vm.load_source("test", SCRIPTS).expect("scripts");
        vm
    }

    fn brickset() -> Arc<Brickset> {
        let mut big = template(1, BrickType::Solid, BrickBehavior::Default, &[]);
        big.mask = Arc::new(collision_mask::CollisionMask::create_box(128, 128));
        Arc::new(Brickset::from_templates(vec![
            big,
            template(2, BrickType::Passable, BrickBehavior::Default, &[]),
            template(3, BrickType::Solid, BrickBehavior::Default, &[]),
        ]))
    }

    fn level(vm: &ScriptVm, text: &str) -> Level {
        let path = Path::new("test.lev");
        let file = parse_level(text, path).expect("level parses");
        Level::from_file(path, file, brickset(), None, vm, None).expect("level builds")
    }

    fn tick(level: &mut Level, vm: &ScriptVm) -> LevelSignal {
        let mut audio = SilentAudio::new();
        level.update(vm, &mut audio, &PlayerInput::default(), 1.0 / 60.0)
    }

    const BRICKS_ONLY: &str = r#"
theme "t"
bgtheme "b"
spawn_point 160 120
players "P"
brick 1 0 256
brick 1 128 256
brick 1 256 256
"#;

    #[test]
    fn brick_only_level_round_trips() {
        let vm = vm();
        let level = level(&vm, BRICKS_ONLY);
        assert_eq!(level.level_size(), Vec2::new(426.0, 384.0));
        assert_eq!(level.entities().retrieve_all_bricks().len(), 3);

        let text = level.to_level_file(&vm).to_lev_string();
        let lines: Vec<&str> = text
            .lines()
            .filter(|l| {
                l.starts_with("spawn_point") || l.starts_with("players") || l.starts_with("brick")
            })
            .collect();
        assert_eq!(
            lines,
            vec![
                "spawn_point 160 120",
                "players \"P\"",
                "brick 1 0 256",
                "brick 1 128 256",
                "brick 1 256 256",
            ]
        );
    }

    #[test]
    fn passable_bricks_do_not_grow_the_level() {
        let vm = vm();
        let level = level(&vm, "theme \"t\"\nbrick 2 5000 5000\nbrick 1 500 0\n");
        assert_eq!(level.level_size(), Vec2::new(628.0, 240.0));
    }

    #[test]
    fn missing_theme_is_fatal() {
        let vm = vm();
        let dir = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let path = dir.join(format!("surge_test_notheme_{}_{nanos}.lev", std::process::id()));
        std::fs::write(&path, "name \"x\"\n").expect("write level");
        let mut resources = ResourceManager::new(&dir);
        let result = Level::load(&path, &mut resources, &vm, None);
        assert!(matches!(result, Err(LevelError::MissingTheme(_))));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn ring_is_collected_on_touch() {
        let vm = vm();
        let mut level = level(&vm, "theme \"t\"\nspawn_point 100 100\nplayers \"Surge\"\nitem 0 100 100\n");
        assert_eq!(level.entities().items.len(), 1);
        tick(&mut level, &vm);
        assert_eq!(level.team().collectibles(), 1);
        let all = level.entities().retrieve_all_items();
        let dead = all
            .iter()
            .all(|k| level.entities().items.get(k).is_some_and(Item::is_dead));
        assert!(dead);
        tick(&mut level, &vm);
        assert!(level.entities().items.is_empty());
    }

    #[test]
    fn item_replacements_need_the_class() {
        let mut vm = vm();
        vm.load_source(
            "collectible",
            r#"class("Collectible", { tags = { "entity" } }, {})"#,
        )
        .expect("collectible class");
        let level = level(&vm, "theme \"t\"\nitem 0 100 100\nitem 14 50 50\n");
        assert_eq!(level.entities().items.len(), 1);
        let file = level.to_level_file(&vm);
        assert_eq!(file.entities.len(), 1);
        assert_eq!(file.entities[0].name, "Collectible");
        assert_eq!((file.entities[0].x, file.entities[0].y), (100, 100));
        assert_eq!(file.items.len(), 1);
        assert_eq!(file.items[0].kind, IT_BOUNCINGCOLLECT);
    }

    #[test]
    fn obstacle_map_has_one_obstacle_per_source() {
        let vm = vm();
        let mut level = level(
            &vm,
            "theme \"t\"\nspawn_point 100 100\nbrick 1 0 256\nbrick 3 128 256\nbrick 2 200 200\nitem 1 300 100\nitem 0 330 100\nobject \"Crate\" 150 50\nobject \"Sign\" 180 50\n",
        );
        let crate_key = level.entities().retrieve_all_objects().keys()[0];
        if let Some(object) = level.entities_mut().objects.get_mut(crate_key) {
            object.obstacle = true;
        }
        level
            .level_object()
            .spawn_entity(&vm, "Platform", Vec2::new(120.0, 150.0))
            .expect("platform");

        tick(&mut level, &vm);
        assert_eq!(level.obstacle_rebuilds(), 1);
        // two solid bricks, the item box, the crate and the platform
        assert_eq!(level.obstacles().len(), 5);
        assert!(level.obstacles().is_locked());

        tick(&mut level, &vm);
        assert_eq!(level.obstacle_rebuilds(), 2);
        assert_eq!(level.obstacles().len(), 5);
    }

    #[test]
    fn entities_leaving_the_play_area_are_cleaned_up() {
        let vm = vm();
        let mut level = level(
            &vm,
            &format!(
                "theme \"t\"\nspawn_point 213 120\nbrick 1 0 256\nbrick 1 3000 256\nitem {IT_BOUNCINGCOLLECT} 700 120\nitem {IT_COLLECTIBLE} 700 120\n"
            ),
        );
        let keys = level.entities().retrieve_all_items();
        let (bouncing, ring) = (keys.keys()[0], keys.keys()[1]);
        if let Some(item) = level.entities_mut().items.get_mut(ring) {
            item.actor_mut().position = Vec2::new(800.0, 120.0);
        }

        tick(&mut level, &vm);
        let items = &level.entities().items;
        assert!(items.get(bouncing).is_some_and(Item::is_dead));
        let ring = items.get(ring).expect("ring is preserved");
        assert!(!ring.is_dead());
        assert_eq!(ring.position(), Vec2::new(700.0, 120.0));
    }

    #[test]
    fn script_entities_outside_the_roi_are_dropped_or_parked() {
        let vm = vm();
        let mut level = level(
            &vm,
            "theme \"t\"\nspawn_point 100 100\nbrick 1 0 256\nbrick 1 4000 256\nentity \"E\" 3000 100\n",
        );
        let persistent = level.level_object().find_entity_by_id(
            &vm,
            level.to_level_file(&vm).entities[0].id.expect("persistent id"),
        );
        let transient = level
            .level_object()
            .spawn_entity(&vm, "E", Vec2::new(3000.0, 120.0))
            .expect("transient");

        tick(&mut level, &vm);
        assert!(vm.is_killed(transient));
        assert!(!vm.is_killed(persistent));
        assert!(!level.level_object().is_active(&vm, persistent));
    }

    #[test]
    fn persistent_ids_survive_save_and_load() {
        let vm = vm();
        let level = level(&vm, "theme \"t\"\nentity \"E\" 64 32 \"0123456789abcdef\"\n");
        let text = level.to_level_file(&vm).to_lev_string();
        assert!(text.contains("entity \"E\" 64 32 \"0123456789abcdef\""));
        level.release(&vm);

        let fresh = self::vm();
        let reloaded = self::level(&fresh, &text);
        let handle = reloaded.level_object().find_entity_by_id(&fresh, 0x0123_4567_89ab_cdef);
        assert!(!handle.is_null());
        assert_eq!(fresh.name(handle).as_deref(), Some("E"));
        assert_eq!(fresh.world().graph.world_position(handle), Vec2::new(64.0, 32.0));
    }

    #[test]
    fn unknown_entities_abort_the_load_cleanly() {
        let vm = vm();
        let path = Path::new("bad.lev");
        let file = parse_level("theme \"t\"\nentity \"E\" 0 0\nentity \"Ghost\" 0 0\n", path).expect("parses");
        let before = vm.world().graph.len();
        let result = Level::from_file(path, file, brickset(), None, &vm, None);
        assert!(matches!(result, Err(LevelError::UnknownEntity(name)) if name == "Ghost"));
        assert_eq!(vm.world().graph.len(), before);
    }

    #[test]
    fn dying_player_restarts_after_the_grace_period() {
        let vm = vm();
        let mut level = level(&vm, "theme \"t\"\nspawn_point 100 100\nbrick 1 0 256\n");
        level.team_mut().set_lives(3);
        level.players_mut()[0].kill();
        let mut audio = SilentAudio::new();
        audio.set_music_volume(1.0);

        let mut signal = LevelSignal::Continue;
        for _ in 0..(DEATH_GRACE_PERIOD * 60.0) as usize + 2 {
            signal = level.update(&vm, &mut audio, &PlayerInput::default(), 1.0 / 60.0);
            if signal != LevelSignal::Continue {
                break;
            }
        }
        assert!(audio.music_volume() < 1.0);
        match signal {
            LevelSignal::Restart(state) => {
                assert_eq!(state.lives, 2);
                let checkpoint = state.checkpoint.expect("checkpoint");
                assert_eq!(checkpoint.spawn_point, Vec2::new(100.0, 100.0));
            }
            other => panic!("expected a restart, got {other:?}"),
        }
    }

    #[test]
    fn last_life_means_game_over() {
        let vm = vm();
        let mut level = level(&vm, "theme \"t\"\nspawn_point 100 100\n");
        level.team_mut().set_lives(1);
        level.players_mut()[0].kill();
        let mut signal = LevelSignal::Continue;
        for _ in 0..200 {
            signal = tick(&mut level, &vm);
            if signal != LevelSignal::Continue {
                break;
            }
        }
        assert_eq!(signal, LevelSignal::GameOver);
    }

    #[test]
    fn scheduled_restart_is_reported_on_the_next_tick() {
        let vm = vm();
        let mut level = level(&vm, "theme \"t\"\n");
        level.set_spawn_point(Vec2::new(40.0, 50.0));
        level.restart(true);
        match tick(&mut level, &vm) {
            LevelSignal::Restart(state) => assert_eq!(
                state.checkpoint.map(|c| c.spawn_point),
                Some(Vec2::new(40.0, 50.0))
            ),
            other => panic!("expected a restart, got {other:?}"),
        }
        assert_eq!(tick(&mut level, &vm), LevelSignal::Continue);
    }

    #[test]
    fn restarts_roll_the_water_back_to_the_checkpoint() {
        let vm = vm();
        let text = "theme \"t\"\nbgtheme \"b\"\nspawn_point 100 100\nwaterlevel 300\nwatercolor 0 0 255\n";
        let mut level = level(&vm, text);
        level.set_waterlevel(Some(100));
        level.restart(true);
        let state = match tick(&mut level, &vm) {
            LevelSignal::Restart(state) => state,
            other => panic!("expected a restart, got {other:?}"),
        };
        let checkpoint = state.checkpoint.clone().expect("checkpoint");
        assert_eq!(checkpoint.waterlevel, Some(300));
        assert_eq!(checkpoint.watercolor, Color::rgba(0, 0, 255, 128));
        assert_eq!(checkpoint.background, "b");
        level.release(&vm);

        let path = Path::new("test.lev");
        let file = parse_level(text, path).expect("level parses");
        let restarted = Level::from_file(path, file, brickset(), None, &vm, Some(&state)).expect("level builds");
        assert_eq!(restarted.waterlevel(), Some(300));
        assert_eq!(restarted.background_file(), "b");
    }

    #[test]
    fn restarts_reapply_the_checkpoint_scenery() {
        let vm = vm();
        let state = LevelState {
            checkpoint: Some(Checkpoint {
                spawn_point: Vec2::new(64.0, 32.0),
                waterlevel: Some(700),
                watercolor: Color::rgb(10, 20, 30),
                background: "night".to_string(),
            }),
            lives: 3,
            score: 0,
        };
        let path = Path::new("test.lev");
        let file = parse_level("theme \"t\"\nbgtheme \"day\"\nwaterlevel 200\n", path).expect("level parses");
        let level = Level::from_file(path, file, brickset(), None, &vm, Some(&state)).expect("level builds");
        assert_eq!(level.spawn_point(), Vec2::new(64.0, 32.0));
        assert_eq!(level.waterlevel(), Some(700));
        assert_eq!(level.watercolor(), Color::rgb(10, 20, 30));
        assert_eq!(level.background_file(), "night");
        assert_eq!(level.state(true).checkpoint, state.checkpoint);
        assert_eq!(level.state(false).checkpoint, None);
    }

    #[test]
    fn exit_from_scripts_quits() {
        let vm = vm();
        let mut level = level(&vm, "theme \"t\"\n");
        vm.quit();
        assert_eq!(tick(&mut level, &vm), LevelSignal::Quit);
    }

    #[test]
    fn debug_mode_reaches_scripts() {
        let vm = vm();
        let mut level = level(&vm, "theme \"t\"\n");
        level.set_debug_mode(&vm, true);
        assert_eq!(vm.get(level.level_object().handle(), "debugMode"), Value::Bool(true));
    }

    #[test]
    fn readonly_levels_refuse_to_save() {
        let vm = vm();
        let level = level(&vm, "theme \"t\"\nreadonly\n");
        assert!(level.save(&vm).is_err());
    }

    #[test]
    fn render_draws_in_painter_order() {
        let vm = vm();
        let mut level = level(&vm, "theme \"t\"\nspawn_point 100 100\nbrick 1 0 120\nwaterlevel 200\n");
        let mut renderer = surge_platform::RecordingRenderer::new();
        renderer.begin_frame();
        level.render(&mut renderer, &vm, RenderOptions::default());
        renderer.end_frame();

        let frame = renderer.last_frame();
        let position = |name: &str| {
            frame.iter().position(|c| {
                matches!(c, surge_platform::DrawCommand::Sprite { image, .. } if image == name)
            })
        };
        let brick = position("brick1").expect("brick drawn");
        let player = position("Surge").expect("player drawn");
        assert!(brick < player);
        assert!(frame
            .iter()
            .any(|c| matches!(c, surge_platform::DrawCommand::Rect { filled: true, .. })));
    }
}
