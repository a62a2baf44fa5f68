//! Event dispatcher.
//!
//! Listeners are registered per event kind and fire in registration order.
//! The user data of a listener is whatever its closure captures; the shared
//! mutable state of the program is passed in as the dispatch context `C`.

use std::hash::Hash;

/// An event that can be routed by kind.
pub trait Typed {
    type Kind: Copy + Eq + Hash + std::fmt::Debug;

    fn kind(&self) -> Self::Kind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u32);

type Callback<E, C> = Box<dyn FnMut(&mut C, &E)>;

struct Listener<E: Typed, C> {
    id: ListenerId,
    kind: E::Kind,
    callback: Callback<E, C>,
}

pub struct EventDispatcher<E: Typed, C> {
    listeners: Vec<Listener<E, C>>,
    next_id: u32,
}

impl<E: Typed, C> EventDispatcher<E, C> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 1,
        }
    }

    pub fn add_listener(
        &mut self,
        kind: E::Kind,
        callback: impl FnMut(&mut C, &E) + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener {
            id,
            kind,
            callback: Box::new(callback),
        });
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    /// Invokes every listener of the event's kind. Returns how many fired.
    pub fn dispatch(&mut self, ctx: &mut C, event: &E) -> usize {
        let kind = event.kind();
        let mut fired = 0;
        for listener in self.listeners.iter_mut().filter(|l| l.kind == kind) {
            (listener.callback)(ctx, event);
            fired += 1;
        }
        fired
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: Typed, C> Default for EventDispatcher<E, C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Kind {
        Ping,
        Pong,
    }

    struct Ev(Kind);

    impl Typed for Ev {
        type Kind = Kind;
        fn kind(&self) -> Kind {
            self.0
        }
    }

    #[test]
    fn listeners_fire_in_registration_order() {
        let mut dispatcher: EventDispatcher<Ev, Vec<&'static str>> = EventDispatcher::new();
        dispatcher.add_listener(Kind::Ping, |log, _| log.push("first"));
        dispatcher.add_listener(Kind::Pong, |log, _| log.push("pong"));
        dispatcher.add_listener(Kind::Ping, |log, _| log.push("second"));

        let mut log = Vec::new();
        assert_eq!(dispatcher.dispatch(&mut log, &Ev(Kind::Ping)), 2);
        assert_eq!(log, vec!["first", "second"]);
    }

    #[test]
    fn removed_listener_no_longer_fires() {
        let mut dispatcher: EventDispatcher<Ev, u32> = EventDispatcher::new();
        let id = dispatcher.add_listener(Kind::Ping, |n, _| *n += 1);
        assert!(dispatcher.remove_listener(id));
        assert!(!dispatcher.remove_listener(id));

        let mut n = 0;
        dispatcher.dispatch(&mut n, &Ev(Kind::Ping));
        assert_eq!(n, 0);
        assert_eq!(dispatcher.listener_count(), 0);
    }

    #[test]
    fn captured_user_data_is_private_to_listener() {
        let mut dispatcher: EventDispatcher<Ev, u32> = EventDispatcher::new();
        let mut calls = 0;
        dispatcher.add_listener(Kind::Pong, move |total, _| {
            calls += 10;
            *total += calls;
        });
        let mut total = 0;
        dispatcher.dispatch(&mut total, &Ev(Kind::Pong));
        dispatcher.dispatch(&mut total, &Ev(Kind::Pong));
        assert_eq!(total, 30);
    }
}
