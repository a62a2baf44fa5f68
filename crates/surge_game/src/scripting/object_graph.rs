//! Arena of script objects addressed by handles.
//!
//! Every object has a parent (the root is its own parent), an ordered list of
//! children, a local position relative to its parent and a property bag.
//! Killed objects stay addressable until the next garbage pass.

use std::collections::BTreeMap;

use glam::Vec2;

/// Stable reference to a script object. `NULL_HANDLE` refers to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Handle(pub u32);

pub const NULL_HANDLE: Handle = Handle(0);
pub const ROOT_HANDLE: Handle = Handle(1);

impl Handle {
    pub fn is_null(self) -> bool {
        self == NULL_HANDLE
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Handle(Handle),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<Handle> {
        match self {
            Self::Handle(h) => Some(*h),
            _ => None,
        }
    }
}

/// Bookkeeping for objects tagged `entity`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityInfo {
    pub spawn_point: Vec2,
    pub id: u64,
    /// Persistent entities are written back when the level is saved.
    pub persistent: bool,
}

#[derive(Debug, Clone)]
pub struct ScriptObject {
    pub name: String,
    pub parent: Handle,
    pub children: Vec<Handle>,
    pub killed: bool,
    pub local_position: Vec2,
    pub properties: BTreeMap<String, Value>,
    pub entity: Option<EntityInfo>,
}

#[derive(Debug, Clone)]
pub struct ObjectGraph {
    objects: BTreeMap<Handle, ScriptObject>,
    next: u32,
}

impl Default for ObjectGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectGraph {
    pub fn new() -> Self {
        let mut objects = BTreeMap::new();
        objects.insert(
            ROOT_HANDLE,
            ScriptObject {
                name: "Application".to_string(),
                parent: ROOT_HANDLE,
                children: Vec::new(),
                killed: false,
                local_position: Vec2::ZERO,
                properties: BTreeMap::new(),
                entity: None,
            },
        );
        Self {
            objects,
            next: ROOT_HANDLE.0 + 1,
        }
    }

    pub fn root(&self) -> Handle {
        ROOT_HANDLE
    }

    /// Creates a child of `parent`. A missing parent means the root.
    pub fn spawn(&mut self, parent: Handle, name: &str) -> Handle {
        let parent = if self.objects.contains_key(&parent) { parent } else { ROOT_HANDLE };
        let handle = Handle(self.next);
        self.next += 1;
        self.objects.insert(
            handle,
            ScriptObject {
                name: name.to_string(),
                parent,
                children: Vec::new(),
                killed: false,
                local_position: Vec2::ZERO,
                properties: BTreeMap::new(),
                entity: None,
            },
        );
        if let Some(p) = self.objects.get_mut(&parent) {
            p.children.push(handle);
        }
        handle
    }

    pub fn get(&self, handle: Handle) -> Option<&ScriptObject> {
        self.objects.get(&handle)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut ScriptObject> {
        self.objects.get_mut(&handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &ScriptObject)> {
        self.objects.iter().map(|(h, o)| (*h, o))
    }

    pub fn exists(&self, handle: Handle) -> bool {
        self.objects.contains_key(&handle)
    }

    pub fn is_killed(&self, handle: Handle) -> bool {
        self.objects.get(&handle).map_or(true, |o| o.killed)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn name(&self, handle: Handle) -> Option<&str> {
        self.objects.get(&handle).map(|o| o.name.as_str())
    }

    pub fn parent(&self, handle: Handle) -> Handle {
        self.objects.get(&handle).map_or(NULL_HANDLE, |o| o.parent)
    }

    pub fn children(&self, handle: Handle) -> &[Handle] {
        self.objects.get(&handle).map_or(&[], |o| o.children.as_slice())
    }

    /// First child with the given name.
    pub fn child(&self, handle: Handle, name: &str) -> Handle {
        self.children(handle)
            .iter()
            .copied()
            .find(|c| self.name(*c) == Some(name))
            .unwrap_or(NULL_HANDLE)
    }

    /// Kills an object and its whole subtree. The root can't be killed.
    pub fn kill(&mut self, handle: Handle) {
        if handle == ROOT_HANDLE {
            return;
        }
        let mut stack = vec![handle];
        while let Some(h) = stack.pop() {
            if let Some(o) = self.objects.get_mut(&h) {
                o.killed = true;
                stack.extend(o.children.iter().copied());
            }
        }
    }

    pub fn world_position(&self, handle: Handle) -> Vec2 {
        let mut position = Vec2::ZERO;
        let mut current = handle;
        while let Some(o) = self.objects.get(&current) {
            position += o.local_position;
            if o.parent == current {
                break;
            }
            current = o.parent;
        }
        position
    }

    pub fn set_world_position(&mut self, handle: Handle, position: Vec2) {
        let parent = self.parent(handle);
        let origin = if parent == handle { Vec2::ZERO } else { self.world_position(parent) };
        if let Some(o) = self.objects.get_mut(&handle) {
            o.local_position = position - origin;
        }
    }

    pub fn property(&self, handle: Handle, key: &str) -> Value {
        self.objects
            .get(&handle)
            .and_then(|o| o.properties.get(key))
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_property(&mut self, handle: Handle, key: &str, value: Value) {
        if let Some(o) = self.objects.get_mut(&handle) {
            if value == Value::Null {
                o.properties.remove(key);
            } else {
                o.properties.insert(key.to_string(), value);
            }
        }
    }

    /// Live objects under `from` (inclusive) in preorder. Subtrees of objects
    /// for which `descend` is false are skipped entirely.
    pub fn preorder(&self, from: Handle, descend: &mut dyn FnMut(Handle, &ScriptObject) -> bool) -> Vec<Handle> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(h) = stack.pop() {
            let Some(o) = self.objects.get(&h) else {
                continue;
            };
            if o.killed || !descend(h, o) {
                continue;
            }
            out.push(h);
            stack.extend(o.children.iter().rev().copied());
        }
        out
    }

    /// Removes killed objects. Returns how many were dropped.
    pub fn collect_garbage(&mut self) -> usize {
        let dead: Vec<Handle> = self
            .objects
            .iter()
            .filter(|(_, o)| o.killed)
            .map(|(h, _)| *h)
            .collect();
        for h in &dead {
            if let Some(o) = self.objects.remove(h) {
                if let Some(p) = self.objects.get_mut(&o.parent) {
                    p.children.retain(|c| c != h);
                }
            }
        }
        dead.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_move_with_their_parent() {
        let mut graph = ObjectGraph::new();
        let parent = graph.spawn(ROOT_HANDLE, "Parent");
        let child = graph.spawn(parent, "Child");
        graph.set_world_position(parent, Vec2::new(100.0, 50.0));
        graph.set_world_position(child, Vec2::new(110.0, 50.0));
        graph.set_world_position(parent, Vec2::new(200.0, 0.0));
        assert_eq!(graph.world_position(child), Vec2::new(210.0, 0.0));
    }

    #[test]
    fn killing_marks_the_subtree_until_collected() {
        let mut graph = ObjectGraph::new();
        let a = graph.spawn(ROOT_HANDLE, "A");
        let b = graph.spawn(a, "B");
        let c = graph.spawn(ROOT_HANDLE, "C");
        graph.kill(a);
        assert!(graph.is_killed(b));
        assert!(graph.exists(b));
        assert_eq!(graph.collect_garbage(), 2);
        assert!(!graph.exists(b));
        assert_eq!(graph.children(ROOT_HANDLE), &[c]);
        graph.kill(ROOT_HANDLE);
        assert!(!graph.is_killed(ROOT_HANDLE));
    }

    #[test]
    fn handles_are_never_reused() {
        let mut graph = ObjectGraph::new();
        let a = graph.spawn(ROOT_HANDLE, "A");
        graph.kill(a);
        graph.collect_garbage();
        let b = graph.spawn(ROOT_HANDLE, "B");
        assert_ne!(a, b);
        assert!(graph.is_killed(a));
        assert!(graph.is_killed(NULL_HANDLE));
    }

    #[test]
    fn preorder_skips_filtered_subtrees() {
        let mut graph = ObjectGraph::new();
        let a = graph.spawn(ROOT_HANDLE, "A");
        let a1 = graph.spawn(a, "A1");
        let b = graph.spawn(ROOT_HANDLE, "B");
        let b1 = graph.spawn(b, "B1");
        let all = graph.preorder(ROOT_HANDLE, &mut |_, _| true);
        assert_eq!(all, vec![ROOT_HANDLE, a, a1, b, b1]);
        let some = graph.preorder(ROOT_HANDLE, &mut |h, _| h != b);
        assert_eq!(some, vec![ROOT_HANDLE, a, a1]);
    }

    #[test]
    fn null_properties_are_removed() {
        let mut graph = ObjectGraph::new();
        let a = graph.spawn(ROOT_HANDLE, "A");
        graph.set_property(a, "hp", Value::Number(3.0));
        assert_eq!(graph.property(a, "hp").as_number(), Some(3.0));
        graph.set_property(a, "hp", Value::Null);
        assert_eq!(graph.property(a, "hp"), Value::Null);
        assert_eq!(graph.child(ROOT_HANDLE, "A"), a);
        assert_eq!(graph.child(ROOT_HANDLE, "Z"), NULL_HANDLE);
    }
}
