//! Platform events and the queue the main loop blocks on.

use std::collections::VecDeque;

use glam::Vec2;
use surge_core::input::{Key, MouseBtn};
use surge_core::Typed;

/// Identifies a timer that posts TIMER events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerSource(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Timer { source: TimerSource },
    HaltDrawing,
    ResumeDrawing,
    DisplayClose,
    KeyDown(Key),
    KeyUp(Key),
    MouseMove(Vec2),
    MouseDown(MouseBtn),
    MouseUp(MouseBtn),
    Resize { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Timer,
    HaltDrawing,
    ResumeDrawing,
    DisplayClose,
    KeyDown,
    KeyUp,
    MouseMove,
    MouseDown,
    MouseUp,
    Resize,
}

impl Typed for Event {
    type Kind = EventKind;

    fn kind(&self) -> EventKind {
        match self {
            Event::Timer { .. } => EventKind::Timer,
            Event::HaltDrawing => EventKind::HaltDrawing,
            Event::ResumeDrawing => EventKind::ResumeDrawing,
            Event::DisplayClose => EventKind::DisplayClose,
            Event::KeyDown(_) => EventKind::KeyDown,
            Event::KeyUp(_) => EventKind::KeyUp,
            Event::MouseMove(_) => EventKind::MouseMove,
            Event::MouseDown(_) => EventKind::MouseDown,
            Event::MouseUp(_) => EventKind::MouseUp,
            Event::Resize { .. } => EventKind::Resize,
        }
    }
}

pub trait EventQueue {
    /// Blocks until an event is available. `None` means the source is closed.
    fn wait_for_event(&mut self) -> Option<Event>;

    fn is_empty(&self) -> bool;

    fn push(&mut self, event: Event);

    /// Removes queued TIMER events of `source`. Returns how many were dropped.
    fn drop_timer_events(&mut self, source: TimerSource) -> usize;

    /// Discards everything still queued.
    fn drain(&mut self) -> usize;
}

/// In-memory FIFO. Used by headless runs, the desktop adapter and tests.
#[derive(Debug, Default)]
pub struct ManualQueue {
    events: VecDeque<Event>,
}

impl ManualQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl EventQueue for ManualQueue {
    fn wait_for_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    fn drop_timer_events(&mut self, source: TimerSource) -> usize {
        let before = self.events.len();
        self.events
            .retain(|e| !matches!(e, Event::Timer { source: s } if *s == source));
        before - self.events.len()
    }

    fn drain(&mut self) -> usize {
        let n = self.events.len();
        self.events.clear();
        n
    }
}
