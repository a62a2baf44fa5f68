//! Script-side entity bookkeeping: region of interest, ids and brick-likes.

use std::collections::HashSet;
use std::sync::Arc;

use glam::Vec2;

use super::object_graph::{EntityInfo, Handle, ObjectGraph, ROOT_HANDLE};
use super::tags::{TAG_AWAKE, TAG_BRICKLIKE, TAG_DETACHED};
use super::vm::ScriptWorld;
use crate::level::actor::Rect;
use crate::level::brick::BrickType;
use crate::level::collision_mask::CollisionMask;
use crate::level::obstacle::{Layer, Obstacle, ObstacleFlags};

/// What the render queue needs to draw a scripted entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedDrawable {
    pub handle: Handle,
    pub position: Vec2,
    pub size: Vec2,
    pub sprite: String,
    pub zindex: f64,
    /// Drawn in screen space.
    pub detached: bool,
}

#[derive(Debug, Default)]
pub struct ScriptEntityManager {
    roi: Rect,
    inactive: HashSet<Handle>,
}

impl ScriptEntityManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_roi(&mut self, roi: Rect) {
        self.roi = roi;
    }

    pub fn roi(&self) -> Rect {
        self.roi
    }

    /// Entities outside the ROI. Their subtrees are skipped by the update.
    pub fn inactive(&self) -> &HashSet<Handle> {
        &self.inactive
    }

    pub fn is_active(&self, handle: Handle) -> bool {
        !self.inactive.contains(&handle)
    }

    /// Recomputes which entities are active. Persistent entities that left
    /// the ROI go back to their spawn point when that is outside too; the
    /// others are killed. Returns how many entities were killed.
    pub fn refresh(&mut self, world: &mut ScriptWorld) -> usize {
        self.inactive.clear();
        let entities: Vec<(Handle, String, EntityInfo)> = {
            let graph = &world.graph;
            graph
                .preorder(ROOT_HANDLE, &mut |_, _| true)
                .into_iter()
                .filter_map(|h| {
                    let o = graph.get(h)?;
                    Some((h, o.name.clone(), o.entity?))
                })
                .collect()
        };

        let mut killed = 0;
        for (handle, class, info) in entities {
            if world.graph.is_killed(handle) {
                continue;
            }
            if world.tags.has_tag(&class, TAG_AWAKE) || world.tags.has_tag(&class, TAG_DETACHED) {
                continue;
            }
            if self.roi.contains(world.graph.world_position(handle)) {
                continue;
            }
            if info.persistent {
                if !self.roi.contains(info.spawn_point) {
                    world.graph.set_world_position(handle, info.spawn_point);
                }
                self.inactive.insert(handle);
            } else {
                log::debug!("Entity {class} left the region of interest");
                world.graph.kill(handle);
                killed += 1;
            }
        }
        killed
    }

    /// Active entities tagged `bricklike`, in preorder.
    pub fn bricklike_iterator(&self, world: &ScriptWorld) -> Vec<Handle> {
        self.active_entities(world)
            .into_iter()
            .filter(|h| {
                world
                    .graph
                    .name(*h)
                    .is_some_and(|class| world.tags.has_tag(class, TAG_BRICKLIKE))
            })
            .collect()
    }

    /// A one-frame obstacle for a brick-like entity, built from its
    /// `width`, `height`, `type` and `layer` properties.
    pub fn bricklike_obstacle(&self, world: &ScriptWorld, handle: Handle) -> Option<Obstacle> {
        let graph = &world.graph;
        let width = graph.property(handle, "width").as_number()?;
        let height = graph.property(handle, "height").as_number()?;
        if width < 1.0 || height < 1.0 {
            return None;
        }
        let kind = match graph.property(handle, "type").as_str() {
            Some(t) if t.eq_ignore_ascii_case("cloud") => BrickType::Cloud,
            Some(t) if t.eq_ignore_ascii_case("passable") => BrickType::Passable,
            _ => BrickType::Solid,
        };
        let flags = match kind {
            BrickType::Passable => return None,
            BrickType::Cloud => ObstacleFlags::CLOUD,
            BrickType::Solid => ObstacleFlags::SOLID,
        };
        let layer = graph
            .property(handle, "layer")
            .as_str()
            .map_or(Layer::Default, Layer::from_name);
        let position = graph.world_position(handle);
        let mask = Arc::new(CollisionMask::create_box(width as u32, height as u32));
        Some(Obstacle::new(mask, position.x as i32, position.y as i32, layer, flags))
    }

    /// Persistent, live entities in preorder. This is the order they are saved in.
    pub fn persistent_entities(&self, world: &ScriptWorld) -> Vec<Handle> {
        let graph = &world.graph;
        graph
            .preorder(ROOT_HANDLE, &mut |_, _| true)
            .into_iter()
            .filter(|h| graph.get(*h).and_then(|o| o.entity).is_some_and(|e| e.persistent))
            .collect()
    }

    /// Active entities with a `sprite` property.
    pub fn drawables(&self, world: &ScriptWorld) -> Vec<ScriptedDrawable> {
        let graph = &world.graph;
        self.active_entities(world)
            .into_iter()
            .filter_map(|handle| {
                let sprite = graph.property(handle, "sprite").as_str()?.to_string();
                let number = |key: &str, default: f64| graph.property(handle, key).as_number().unwrap_or(default);
                let detached = graph
                    .name(handle)
                    .is_some_and(|class| world.tags.has_tag(class, TAG_DETACHED));
                Some(ScriptedDrawable {
                    handle,
                    position: graph.world_position(handle),
                    size: Vec2::new(number("width", 32.0) as f32, number("height", 32.0) as f32),
                    sprite,
                    zindex: number("zindex", 0.5),
                    detached,
                })
            })
            .collect()
    }

    fn active_entities(&self, world: &ScriptWorld) -> Vec<Handle> {
        let graph: &ObjectGraph = &world.graph;
        graph
            .preorder(ROOT_HANDLE, &mut |h, _| !self.inactive.contains(&h))
            .into_iter()
            .filter(|h| graph.get(*h).is_some_and(|o| o.entity.is_some()))
            .collect()
    }
}

/// Marks `handle` as an entity spawned at its current position.
pub(crate) fn make_entity(world: &mut ScriptWorld, handle: Handle, id: u64, persistent: bool) {
    let spawn_point = world.graph.world_position(handle);
    if let Some(o) = world.graph.get_mut(handle) {
        o.entity = Some(EntityInfo {
            spawn_point,
            id,
            persistent,
        });
    }
}
