//! Undo/redo history of the editor.
//!
//! The log is a list of committed actions and a cursor: entries before the
//! cursor are applied, entries after it can be redone. Committing drops
//! everything past the cursor. Actions committed together share a group key
//! and are undone and redone as one step.

use glam::Vec2;

use crate::level::brick::BrickFlip;
use crate::level::obstacle::Layer;

/// What an object-level action places or removes.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorObject {
    Brick { id: u32, layer: Layer, flip: BrickFlip },
    Item { kind: u32 },
    /// Legacy object, the ENEMY cursor class.
    Object { name: String },
    /// Scripted entity. `id` is the identity to restore, when known.
    Entity { class: String, id: Option<u64> },
}

impl EditorObject {
    pub fn label(&self) -> String {
        match self {
            EditorObject::Brick { id, .. } => format!("brick {id}"),
            EditorObject::Item { kind } => format!("item {kind}"),
            EditorObject::Object { name } => format!("object {name}"),
            EditorObject::Entity { class, .. } => format!("entity {class}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorAction {
    NewObject { object: EditorObject, position: Vec2 },
    DeleteObject { object: EditorObject, position: Vec2 },
    ChangeSpawn { position: Vec2, previous: Vec2 },
    RestoreSpawn { position: Vec2, previous: Vec2 },
    ChangeWater { level: Option<i32>, previous: Option<i32> },
    RestoreWater { level: Option<i32>, previous: Option<i32> },
}

impl EditorAction {
    /// The action that cancels this one.
    pub fn inverse(&self) -> EditorAction {
        match self {
            EditorAction::NewObject { object, position } => EditorAction::DeleteObject {
                object: object.clone(),
                position: *position,
            },
            EditorAction::DeleteObject { object, position } => EditorAction::NewObject {
                object: object.clone(),
                position: *position,
            },
            EditorAction::ChangeSpawn { position, previous } => EditorAction::RestoreSpawn {
                position: *position,
                previous: *previous,
            },
            EditorAction::RestoreSpawn { position, previous } => EditorAction::ChangeSpawn {
                position: *position,
                previous: *previous,
            },
            EditorAction::ChangeWater { level, previous } => EditorAction::RestoreWater {
                level: *level,
                previous: *previous,
            },
            EditorAction::RestoreWater { level, previous } => EditorAction::ChangeWater {
                level: *level,
                previous: *previous,
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    action: EditorAction,
    group: u32,
}

#[derive(Debug, Default)]
pub struct ActionLog {
    entries: Vec<Entry>,
    cursor: usize,
    next_group: u32,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a single action.
    pub fn commit(&mut self, action: EditorAction) {
        self.commit_group(vec![action]);
    }

    /// Records actions that undo and redo together. An empty group is ignored.
    pub fn commit_group(&mut self, actions: Vec<EditorAction>) {
        if actions.is_empty() {
            return;
        }
        self.entries.truncate(self.cursor);
        let group = self.next_group;
        self.next_group = self.next_group.wrapping_add(1);
        self.entries
            .extend(actions.into_iter().map(|action| Entry { action, group }));
        self.cursor = self.entries.len();
    }

    /// Steps back one group. Returns the actions to apply, in order, to
    /// revert it; empty when there is nothing to undo.
    pub fn undo(&mut self) -> Vec<EditorAction> {
        let Some(group) = self.cursor.checked_sub(1).map(|i| self.entries[i].group) else {
            return Vec::new();
        };
        let mut actions = Vec::new();
        while self.cursor > 0 && self.entries[self.cursor - 1].group == group {
            self.cursor -= 1;
            actions.push(self.entries[self.cursor].action.inverse());
        }
        actions
    }

    /// Steps forward one group. Returns the actions to apply, in order.
    pub fn redo(&mut self) -> Vec<EditorAction> {
        let Some(group) = self.entries.get(self.cursor).map(|e| e.group) else {
            return Vec::new();
        };
        let mut actions = Vec::new();
        while self.cursor < self.entries.len() && self.entries[self.cursor].group == group {
            actions.push(self.entries[self.cursor].action.clone());
            self.cursor += 1;
        }
        actions
    }

    /// Rewrites the entries of the last redone or committed group whose
    /// action matches `old`. Used to remember ids assigned on apply.
    pub fn amend_applied(&mut self, old: &EditorAction, new: EditorAction) {
        if let Some(entry) = self.entries[..self.cursor]
            .iter_mut()
            .rev()
            .find(|e| &e.action == old)
        {
            entry.action = new;
        }
    }

    /// Same as [`amend_applied`](Self::amend_applied), for the group that
    /// was just undone.
    pub fn amend_undone(&mut self, old: &EditorAction, new: EditorAction) {
        if let Some(entry) = self.entries[self.cursor..].iter_mut().find(|e| &e.action == old) {
            entry.action = new;
        }
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}
