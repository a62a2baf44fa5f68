//! Per-frame ordering of heterogeneous drawables.
//!
//! Nodes are sorted by z-index ascending. Two z-indices closer than
//! [`Z_EPSILON`] are equal; on equal z, nodes of the same kind are ordered by
//! `ypos`, and nodes of different kinds keep their enqueue order. The sort is
//! a merge sort so the result is stable and never depends on the comparator
//! being a total order.
//!
//! The queue owns nothing past `end()`: nodes are drained as they are drawn.

use std::cmp::Ordering;

use glam::Vec2;

/// Two z-indices closer than this are considered equal.
pub const Z_EPSILON: f64 = 1e-7;

/// A z-index nudge of `n` units.
pub fn zindex_offset(n: i32) -> f64 {
    1e-6 * n as f64
}

/// Kind of a render node. The discriminant is the type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderKind {
    Particles = 0,
    Player = 1,
    Item = 2,
    Object = 3,
    Brick = 4,
    Scripted = 5,
    Background = 6,
    Foreground = 7,
    Water = 8,
    Gizmo = 9,
}

impl RenderKind {
    pub fn tag(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderNode<T> {
    pub z: f64,
    pub ypos: i32,
    pub kind: RenderKind,
    pub item: T,
}

pub fn z_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < Z_EPSILON
}

/// Painter's order between two nodes.
pub fn compare<T>(a: &RenderNode<T>, b: &RenderNode<T>) -> Ordering {
    if !z_equal(a.z, b.z) {
        a.z.total_cmp(&b.z)
    } else if a.kind == b.kind {
        a.ypos.cmp(&b.ypos)
    } else {
        Ordering::Equal
    }
}

pub struct RenderQueue<T> {
    nodes: Vec<RenderNode<T>>,
    camera: Vec2,
    in_frame: bool,
}

impl<T> RenderQueue<T> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            camera: Vec2::ZERO,
            in_frame: false,
        }
    }

    /// Starts a frame seen from `camera` (world position of the screen center).
    pub fn begin(&mut self, camera: Vec2) {
        if self.in_frame {
            log::warn!("Render queue: begin() called twice; discarding {} nodes", self.nodes.len());
        }
        self.nodes.clear();
        self.camera = camera;
        self.in_frame = true;
    }

    pub fn enqueue(&mut self, kind: RenderKind, z: f64, ypos: i32, item: T) {
        if !self.in_frame {
            log::warn!("Render queue: enqueue({kind:?}) outside of a frame");
            return;
        }
        self.nodes.push(RenderNode { z, ypos, kind, item });
    }

    /// Sorts the frame and hands each node to `draw` in painter's order.
    pub fn end(&mut self, mut draw: impl FnMut(&RenderNode<T>, Vec2)) {
        let camera = self.camera;
        for node in self.take_sorted() {
            draw(&node, camera);
        }
    }

    /// Ends the frame and returns the sorted nodes instead of drawing them.
    pub fn take_sorted(&mut self) -> Vec<RenderNode<T>> {
        self.in_frame = false;
        let nodes = std::mem::take(&mut self.nodes);
        merge_sort(nodes, &compare)
    }

    pub fn camera(&self) -> Vec2 {
        self.camera
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<T> Default for RenderQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable top-down merge sort. On `Equal` the left element goes first.
pub fn merge_sort<T>(mut items: Vec<T>, cmp: &impl Fn(&T, &T) -> Ordering) -> Vec<T> {
    if items.len() <= 1 {
        return items;
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, cmp);
    let right = merge_sort(right, cmp);

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => cmp(l, r) != Ordering::Greater,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        merged.extend(next);
    }
    merged
}
