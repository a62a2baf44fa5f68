//! Spatial storage for bricks, legacy items and legacy objects.
//!
//! Entities live in reusable slots and are indexed by a coarse grid.
//! Callers ask for the entities touching the active region, update them by
//! key, and hand the list back so moved entities get re-indexed.

use std::collections::{HashMap, HashSet};

use super::actor::Rect;
use super::brick::Brick;
use super::item::Item;
use super::legacy_object::LegacyObject;

const CELL_SIZE: f32 = 256.0;

/// What the entity manager needs to know about what it stores.
pub trait Spatial {
    fn bounding_box(&self) -> Rect;
    fn is_dead(&self) -> bool;

    /// Persistent entities are returned regardless of the active region.
    fn is_persistent(&self) -> bool {
        false
    }
}

impl Spatial for Brick {
    fn bounding_box(&self) -> Rect {
        Brick::bounding_box(self)
    }

    fn is_dead(&self) -> bool {
        !self.is_alive()
    }

    fn is_persistent(&self) -> bool {
        self.is_moving()
    }
}

impl Spatial for Item {
    fn bounding_box(&self) -> Rect {
        Item::bounding_box(self)
    }

    fn is_dead(&self) -> bool {
        Item::is_dead(self)
    }

    fn is_persistent(&self) -> bool {
        self.flags().always_active
    }
}

impl Spatial for LegacyObject {
    fn bounding_box(&self) -> Rect {
        LegacyObject::bounding_box(self)
    }

    fn is_dead(&self) -> bool {
        LegacyObject::is_dead(self)
    }

    fn is_persistent(&self) -> bool {
        self.always_active
    }
}

/// A stored entity. Slots are reused, so a key from a removed entity never
/// reaches the entity stored after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    index: usize,
    generation: u32,
}

/// Keys handed out by a retrieve call. Give them back with `release_retrieved`.
#[must_use]
#[derive(Debug, Default)]
pub struct Retrieved {
    keys: Vec<EntityKey>,
}

impl Retrieved {
    pub fn keys(&self) -> &[EntityKey] {
        &self.keys
    }

    pub fn iter(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.keys.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

type Cell = (i32, i32);

#[derive(Debug)]
struct Slot<T> {
    entity: T,
    cells: (Cell, Cell),
    persistent: bool,
    /// Insertion stamp. Retrieval order follows it.
    seq: u64,
}

#[derive(Debug)]
struct Entry<T> {
    generation: u32,
    slot: Option<Slot<T>>,
}

#[derive(Debug)]
pub struct SpatialHash<T: Spatial> {
    entries: Vec<Entry<T>>,
    free: Vec<usize>,
    grid: HashMap<Cell, Vec<usize>>,
    /// Persistent entities, which skip the grid.
    always_active: HashSet<usize>,
    next_seq: u64,
    count: usize,
    region: Rect,
}

impl<T: Spatial> Default for SpatialHash<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Spatial> SpatialHash<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            grid: HashMap::new(),
            always_active: HashSet::new(),
            next_seq: 0,
            count: 0,
            region: Rect::default(),
        }
    }

    pub fn store(&mut self, entity: T) -> EntityKey {
        let cells = cell_range(&entity.bounding_box());
        let persistent = entity.is_persistent();
        let slot = Slot {
            entity,
            cells,
            persistent,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        let index = match self.free.pop() {
            Some(index) => {
                self.entries[index].slot = Some(slot);
                index
            }
            None => {
                self.entries.push(Entry {
                    generation: 0,
                    slot: Some(slot),
                });
                self.entries.len() - 1
            }
        };
        if persistent {
            self.always_active.insert(index);
        } else {
            self.insert_cells(index, cells);
        }
        self.count += 1;
        self.key(index)
    }

    pub fn set_active_region(&mut self, region: Rect) {
        self.region = region;
    }

    pub fn active_region(&self) -> Rect {
        self.region
    }

    /// Live entities intersecting the active region, plus persistent ones, in insertion order.
    pub fn retrieve_active(&self) -> Retrieved {
        let (lo, hi) = cell_range(&self.region);
        let mut indices: Vec<usize> = self.always_active.iter().copied().collect();
        for cx in lo.0..=hi.0 {
            for cy in lo.1..=hi.1 {
                if let Some(bucket) = self.grid.get(&(cx, cy)) {
                    indices.extend(bucket.iter().copied());
                }
            }
        }
        indices.sort_unstable();
        indices.dedup();
        indices.retain(|&i| {
            self.slot(i).is_some_and(|s| {
                !s.entity.is_dead() && (s.persistent || s.entity.bounding_box().intersects(&self.region))
            })
        });
        Retrieved {
            keys: self.in_insertion_order(indices),
        }
    }

    /// Every stored entity, dead or alive, in insertion order.
    pub fn retrieve_all(&self) -> Retrieved {
        let indices = (0..self.entries.len()).filter(|&i| self.slot(i).is_some()).collect();
        Retrieved {
            keys: self.in_insertion_order(indices),
        }
    }

    /// Re-indexes entities that may have moved while they were retrieved.
    pub fn release_retrieved(&mut self, retrieved: Retrieved) {
        for key in retrieved.keys {
            if self.get(key).is_some() {
                self.reindex(key.index);
            }
        }
    }

    pub fn get(&self, key: EntityKey) -> Option<&T> {
        let entry = self.entries.get(key.index)?;
        if entry.generation != key.generation {
            return None;
        }
        entry.slot.as_ref().map(|s| &s.entity)
    }

    pub fn get_mut(&mut self, key: EntityKey) -> Option<&mut T> {
        let entry = self.entries.get_mut(key.index)?;
        if entry.generation != key.generation {
            return None;
        }
        entry.slot.as_mut().map(|s| &mut s.entity)
    }

    /// Stored entities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityKey, &T)> {
        self.retrieve_all()
            .keys
            .into_iter()
            .filter_map(move |key| self.get(key).map(|entity| (key, entity)))
    }

    pub fn remove(&mut self, key: EntityKey) -> Option<T> {
        let entry = self.entries.get_mut(key.index)?;
        if entry.generation != key.generation {
            return None;
        }
        let slot = entry.slot.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        if slot.persistent {
            self.always_active.remove(&key.index);
        } else {
            self.remove_cells(key.index, slot.cells);
        }
        self.free.push(key.index);
        self.count -= 1;
        Some(slot.entity)
    }

    /// Drops dead entities. Returns how many were removed.
    pub fn remove_dead(&mut self) -> usize {
        let dead: Vec<EntityKey> = (0..self.entries.len())
            .filter(|&i| self.slot(i).is_some_and(|s| s.entity.is_dead()))
            .map(|i| self.key(i))
            .collect();
        for &key in &dead {
            let _ = self.remove(key);
        }
        dead.len()
    }

    pub fn clear(&mut self) {
        self.free.clear();
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.slot.take().is_some() {
                entry.generation = entry.generation.wrapping_add(1);
            }
            self.free.push(index);
        }
        self.grid.clear();
        self.always_active.clear();
        self.count = 0;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Slots allocated so far, free ones included.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    fn key(&self, index: usize) -> EntityKey {
        EntityKey {
            index,
            generation: self.entries[index].generation,
        }
    }

    fn slot(&self, index: usize) -> Option<&Slot<T>> {
        self.entries.get(index)?.slot.as_ref()
    }

    fn in_insertion_order(&self, mut indices: Vec<usize>) -> Vec<EntityKey> {
        indices.sort_by_key(|&i| self.slot(i).map_or(u64::MAX, |s| s.seq));
        indices.into_iter().map(|i| self.key(i)).collect()
    }

    fn reindex(&mut self, index: usize) {
        let Some(slot) = self.slot(index) else {
            return;
        };
        let cells = cell_range(&slot.entity.bounding_box());
        let persistent = slot.entity.is_persistent();
        let (old_cells, old_persistent) = (slot.cells, slot.persistent);
        if cells == old_cells && persistent == old_persistent {
            return;
        }
        if old_persistent {
            self.always_active.remove(&index);
        } else {
            self.remove_cells(index, old_cells);
        }
        if persistent {
            self.always_active.insert(index);
        } else {
            self.insert_cells(index, cells);
        }
        if let Some(slot) = self.entries[index].slot.as_mut() {
            slot.cells = cells;
            slot.persistent = persistent;
        }
    }

    fn insert_cells(&mut self, index: usize, (lo, hi): (Cell, Cell)) {
        for cx in lo.0..=hi.0 {
            for cy in lo.1..=hi.1 {
                self.grid.entry((cx, cy)).or_default().push(index);
            }
        }
    }

    fn remove_cells(&mut self, index: usize, (lo, hi): (Cell, Cell)) {
        for cx in lo.0..=hi.0 {
            for cy in lo.1..=hi.1 {
                if let Some(bucket) = self.grid.get_mut(&(cx, cy)) {
                    bucket.retain(|&i| i != index);
                    if bucket.is_empty() {
                        self.grid.remove(&(cx, cy));
                    }
                }
            }
        }
    }
}

fn cell_range(rect: &Rect) -> (Cell, Cell) {
    let cell = |x: f32, y: f32| ((x / CELL_SIZE).floor() as i32, (y / CELL_SIZE).floor() as i32);
    (cell(rect.x, rect.y), cell(rect.right(), rect.bottom()))
}

/// The three spatial stores of a level.
#[derive(Debug, Default)]
pub struct EntityManager {
    pub bricks: SpatialHash<Brick>,
    pub items: SpatialHash<Item>,
    pub objects: SpatialHash<LegacyObject>,
}

impl EntityManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active_region(&mut self, region: Rect) {
        self.bricks.set_active_region(region);
        self.items.set_active_region(region);
        self.objects.set_active_region(region);
    }

    pub fn retrieve_active_bricks(&self) -> Retrieved {
        self.bricks.retrieve_active()
    }

    pub fn retrieve_active_items(&self) -> Retrieved {
        self.items.retrieve_active()
    }

    pub fn retrieve_active_objects(&self) -> Retrieved {
        self.objects.retrieve_active()
    }

    pub fn retrieve_all_bricks(&self) -> Retrieved {
        self.bricks.retrieve_all()
    }

    pub fn retrieve_all_items(&self) -> Retrieved {
        self.items.retrieve_all()
    }

    pub fn retrieve_all_objects(&self) -> Retrieved {
        self.objects.retrieve_all()
    }

    pub fn release_retrieved_bricks(&mut self, list: Retrieved) {
        self.bricks.release_retrieved(list);
    }

    pub fn release_retrieved_items(&mut self, list: Retrieved) {
        self.items.release_retrieved(list);
    }

    pub fn release_retrieved_objects(&mut self, list: Retrieved) {
        self.objects.release_retrieved(list);
    }

    pub fn remove_dead(&mut self) {
        let removed = self.bricks.remove_dead() + self.items.remove_dead() + self.objects.remove_dead();
        if removed > 0 {
            log::debug!("Removed {removed} dead entities");
        }
    }

    pub fn clear(&mut self) {
        self.bricks.clear();
        self.items.clear();
        self.objects.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Dot {
        rect: Rect,
        dead: bool,
        persistent: bool,
    }

    impl Dot {
        fn at(x: f32, y: f32) -> Self {
            Self {
                rect: Rect::new(x, y, 16.0, 16.0),
                dead: false,
                persistent: false,
            }
        }
    }

    impl Spatial for Dot {
        fn bounding_box(&self) -> Rect {
            self.rect
        }

        fn is_dead(&self) -> bool {
            self.dead
        }

        fn is_persistent(&self) -> bool {
            self.persistent
        }
    }

    fn keys(r: &Retrieved) -> Vec<EntityKey> {
        r.keys().to_vec()
    }

    #[test]
    fn active_region_filters_by_intersection() {
        let mut hash = SpatialHash::new();
        let inside = hash.store(Dot::at(100.0, 100.0));
        let edge = hash.store(Dot::at(-10.0, 50.0));
        let _outside = hash.store(Dot::at(5000.0, 100.0));
        hash.set_active_region(Rect::new(0.0, 0.0, 426.0, 240.0));

        let active = hash.retrieve_active();
        assert_eq!(keys(&active), vec![inside, edge]);
        hash.release_retrieved(active);
        assert_eq!(hash.retrieve_all().len(), 3);
    }

    #[test]
    fn persistent_entities_are_always_active() {
        let mut hash = SpatialHash::new();
        let mut far = Dot::at(90000.0, -4000.0);
        far.persistent = true;
        let key = hash.store(far);
        hash.set_active_region(Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(keys(&hash.retrieve_active()), vec![key]);
    }

    #[test]
    fn released_entities_are_reindexed_after_moving() {
        let mut hash = SpatialHash::new();
        let key = hash.store(Dot::at(10.0, 10.0));
        hash.set_active_region(Rect::new(0.0, 0.0, 100.0, 100.0));

        let active = hash.retrieve_active();
        if let Some(dot) = hash.get_mut(key) {
            dot.rect.x = 3000.0;
        }
        hash.release_retrieved(active);
        assert!(hash.retrieve_active().is_empty());

        hash.set_active_region(Rect::new(2900.0, 0.0, 200.0, 100.0));
        assert_eq!(keys(&hash.retrieve_active()), vec![key]);
    }

    #[test]
    fn dead_entities_are_skipped_then_removed() {
        let mut hash = SpatialHash::new();
        let a = hash.store(Dot::at(0.0, 0.0));
        let b = hash.store(Dot::at(20.0, 0.0));
        hash.set_active_region(Rect::new(0.0, 0.0, 100.0, 100.0));
        if let Some(dot) = hash.get_mut(a) {
            dot.dead = true;
        }
        assert_eq!(keys(&hash.retrieve_active()), vec![b]);
        assert_eq!(hash.remove_dead(), 1);
        assert_eq!(hash.len(), 1);
        assert!(hash.get(a).is_none());
        // keys stay stable after removals
        assert!(hash.get(b).is_some());
    }

    #[test]
    fn removed_slots_are_reused() {
        let mut hash = SpatialHash::new();
        hash.set_active_region(Rect::new(0.0, 0.0, 100.0, 100.0));
        let keep = hash.store(Dot::at(0.0, 0.0));
        for round in 0..1000 {
            let mut far = Dot::at(round as f32 * 50.0, 0.0);
            far.persistent = round % 2 == 0;
            let key = hash.store(far);
            let active = hash.retrieve_active();
            hash.release_retrieved(active);
            assert!(hash.remove(key).is_some());
            assert!(hash.get(key).is_none());
        }
        assert_eq!(hash.capacity(), 2);
        assert_eq!(hash.len(), 1);
        assert!(hash.always_active.is_empty());
        assert_eq!(keys(&hash.retrieve_active()), vec![keep]);
    }

    #[test]
    fn stale_keys_miss_the_reused_slot() {
        let mut hash = SpatialHash::new();
        let old = hash.store(Dot::at(0.0, 0.0));
        assert!(hash.remove(old).is_some());
        let new = hash.store(Dot::at(40.0, 0.0));
        assert_ne!(old, new);
        assert!(hash.get(old).is_none());
        assert!(hash.remove(old).is_none());
        assert_eq!(hash.get(new).map(|d| d.rect.x), Some(40.0));
    }

    #[test]
    fn removal_keeps_insertion_order() {
        let mut hash = SpatialHash::new();
        let a = hash.store(Dot::at(0.0, 0.0));
        let b = hash.store(Dot::at(0.0, 0.0));
        let c = hash.store(Dot::at(0.0, 0.0));
        assert!(hash.remove(b).is_some());
        let d = hash.store(Dot::at(0.0, 0.0));
        let order: Vec<EntityKey> = hash.iter().map(|(k, _)| k).collect();
        assert_eq!(order, vec![a, c, d]);
    }
}
