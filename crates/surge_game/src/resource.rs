//! Cache of shared assets.
//!
//! Assets are keyed by their path relative to the game folder and handed out
//! as `Arc`s. The engine runs [`ResourceManager::collect_garbage`] every
//! [`GARBAGE_COLLECTION_INTERVAL_MS`]; entries nobody else holds are dropped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::editor::groups::GroupSet;
use crate::level::brick::Brickset;

pub const GARBAGE_COLLECTION_INTERVAL_MS: u64 = 10_000;

#[derive(Debug)]
pub struct ResourceCache<T> {
    entries: HashMap<String, Arc<T>>,
}

impl<T> Default for ResourceCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> ResourceCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached asset, loading it on a miss. Failed loads are not cached.
    pub fn get_or_load(
        &mut self,
        key: &str,
        load: impl FnOnce() -> Result<T, String>,
    ) -> Result<Arc<T>, String> {
        if let Some(asset) = self.entries.get(key) {
            return Ok(Arc::clone(asset));
        }
        let asset = Arc::new(load()?);
        self.entries.insert(key.to_string(), Arc::clone(&asset));
        Ok(asset)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops the entries only the cache holds. Returns how many were dropped.
    pub fn collect_garbage(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, asset| Arc::strong_count(asset) > 1);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug)]
pub struct ResourceManager {
    root: PathBuf,
    bricksets: ResourceCache<Brickset>,
    groups: ResourceCache<GroupSet>,
    last_collection_ms: u64,
}

impl ResourceManager {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            bricksets: ResourceCache::new(),
            groups: ResourceCache::new(),
            last_collection_ms: 0,
        }
    }

    /// The game folder.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn brickset(
        &mut self,
        relative: &str,
        load: impl FnOnce(&Path) -> Result<Brickset, String>,
    ) -> Result<Arc<Brickset>, String> {
        let path = self.resolve(relative);
        self.bricksets.get_or_load(relative, || load(&path))
    }

    pub fn groups(
        &mut self,
        relative: &str,
        load: impl FnOnce(&Path) -> Result<GroupSet, String>,
    ) -> Result<Arc<GroupSet>, String> {
        let path = self.resolve(relative);
        self.groups.get_or_load(relative, || load(&path))
    }

    pub fn cached_count(&self) -> usize {
        self.bricksets.len() + self.groups.len()
    }

    /// Runs a garbage pass when the interval has elapsed since the last one.
    /// `now_ms` is the game clock. Returns how many assets were released.
    pub fn maybe_collect_garbage(&mut self, now_ms: u64) -> usize {
        if now_ms.saturating_sub(self.last_collection_ms) < GARBAGE_COLLECTION_INTERVAL_MS {
            return 0;
        }
        self.last_collection_ms = now_ms;
        self.collect_garbage()
    }

    pub fn collect_garbage(&mut self) -> usize {
        let released = self.bricksets.collect_garbage() + self.groups.collect_garbage();
        if released > 0 {
            log::debug!("Resource manager released {released} unused assets");
        }
        released
    }

    pub fn release_all(&mut self) {
        self.bricksets.clear();
        self.groups.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_hits_share_the_asset() {
        let mut cache: ResourceCache<String> = ResourceCache::new();
        let mut loads = 0;
        let a = cache
            .get_or_load("k", || {
                loads += 1;
                Ok("value".to_string())
            })
            .expect("load");
        let b = cache
            .get_or_load("k", || {
                loads += 1;
                Ok("other".to_string())
            })
            .expect("hit");
        assert_eq!(loads, 1);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn failed_loads_are_not_cached() {
        let mut cache: ResourceCache<String> = ResourceCache::new();
        assert!(cache.get_or_load("k", || Err("nope".to_string())).is_err());
        assert!(!cache.contains("k"));
    }

    #[test]
    fn garbage_pass_keeps_assets_in_use() {
        let mut cache: ResourceCache<u32> = ResourceCache::new();
        let held = cache.get_or_load("held", || Ok(1)).expect("held");
        let _ = cache.get_or_load("dropped", || Ok(2)).expect("dropped");
        assert_eq!(cache.collect_garbage(), 1);
        assert!(cache.contains("held"));
        drop(held);
        assert_eq!(cache.collect_garbage(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn garbage_pass_runs_on_its_interval() {
        let mut resources = ResourceManager::new(Path::new("."));
        let _ = resources
            .brickset("t", |_| Ok(Brickset::from_templates(Vec::new())))
            .expect("brickset");
        assert_eq!(resources.maybe_collect_garbage(5_000), 0);
        assert_eq!(resources.cached_count(), 1);
        assert_eq!(resources.maybe_collect_garbage(GARBAGE_COLLECTION_INTERVAL_MS), 1);
        assert_eq!(resources.cached_count(), 0);
    }
}
