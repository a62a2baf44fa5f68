//! Class tags (`entity`, `enemy`, `bricklike`, ...).

use std::collections::{BTreeMap, BTreeSet};

pub const TAG_ENTITY: &str = "entity";
pub const TAG_DETACHED: &str = "detached";
pub const TAG_PRIVATE: &str = "private";
pub const TAG_AWAKE: &str = "awake";
pub const TAG_BRICKLIKE: &str = "bricklike";
pub const TAG_SETUP: &str = "setup";

/// Tags the editor and the level understand.
pub const KNOWN_TAGS: &[&str] = &[
    TAG_ENTITY,
    TAG_DETACHED,
    TAG_PRIVATE,
    "gimmick",
    "boss",
    "enemy",
    "basic",
    "special",
    TAG_AWAKE,
    TAG_BRICKLIKE,
    TAG_SETUP,
];

#[derive(Debug, Clone, Default)]
pub struct TagSystem {
    tags: BTreeMap<String, BTreeSet<String>>,
}

impl TagSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tag(&mut self, class_name: &str, tag: &str) {
        self.tags
            .entry(class_name.to_string())
            .or_default()
            .insert(tag.to_string());
    }

    pub fn has_tag(&self, class_name: &str, tag: &str) -> bool {
        self.tags.get(class_name).is_some_and(|t| t.contains(tag))
    }

    pub fn tags_of(&self, class_name: &str) -> impl Iterator<Item = &str> {
        self.tags.get(class_name).into_iter().flatten().map(String::as_str)
    }

    /// Calls `f` with every class carrying `tag`, in name order.
    pub fn foreach_tagged(&self, tag: &str, mut f: impl FnMut(&str)) {
        for (class, tags) in &self.tags {
            if tags.contains(tag) {
                f(class);
            }
        }
    }

    /// Detached entities live in screen space and must not be saved.
    pub fn enforce_private_detached(&mut self) {
        for (class, tags) in &mut self.tags {
            if tags.contains(TAG_DETACHED) && tags.contains(TAG_ENTITY) && !tags.contains(TAG_PRIVATE) {
                log::warn!("Entity '{class}' is tagged detached but not private; treating it as private");
                tags.insert(TAG_PRIVATE.to_string());
            }
        }
    }

    pub fn clear(&mut self) {
        self.tags.clear();
    }
}
