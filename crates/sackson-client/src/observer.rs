//! Typed event bus.
//!
//! [`Observer`] maps an [`EventKind`] to the callbacks registered for it.
//! Callbacks receive mutable access to a context `S` (the hub state in
//! production) along with the event, so delivery code can both send
//! messages and react to failures without sharing state behind locks.

use std::collections::HashMap;

use crate::{Event, EventKind};

type Callback<S> = Box<dyn Fn(&mut S, &Event) + Send>;

/// Registry of event callbacks keyed by event kind.
pub struct Observer<S> {
    callbacks: HashMap<EventKind, Vec<Callback<S>>>,
}

impl<S> Observer<S> {
    pub fn new() -> Self {
        Self {
            callbacks: HashMap::new(),
        }
    }

    /// Registers `callback` for events of `kind`. Callbacks of one kind
    /// run in registration order.
    pub fn on(&mut self, kind: EventKind, callback: impl Fn(&mut S, &Event) + Send + 'static) {
        self.callbacks
            .entry(kind)
            .or_default()
            .push(Box::new(callback));
    }

    /// Whether at least one callback handles `kind`.
    pub fn handles(&self, kind: EventKind) -> bool {
        self.callbacks.get(&kind).is_some_and(|cbs| !cbs.is_empty())
    }

    /// Runs every callback registered for the event's kind.
    ///
    /// An event nobody listens to means the wiring is incomplete: this
    /// panics in debug builds and logs an error in release builds.
    pub fn trigger(&self, context: &mut S, event: &Event) {
        let kind = event.kind();
        let Some(callbacks) = self.callbacks.get(&kind).filter(|cbs| !cbs.is_empty()) else {
            tracing::error!(?kind, "event triggered with no registered callbacks");
            debug_assert!(false, "no callbacks registered for {kind:?}");
            return;
        };
        for callback in callbacks {
            callback(context, event);
        }
    }
}

impl<S> Default for Observer<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sackson_protocol::{Reason, RoomId};

    fn created() -> Event {
        Event::RoomCreated {
            room: RoomId::from("aBcDe"),
            game: "acquire".into(),
        }
    }

    #[test]
    fn test_callbacks_run_in_registration_order() {
        let mut observer: Observer<Vec<&'static str>> = Observer::new();
        observer.on(EventKind::RoomCreated, |log, _| log.push("first"));
        observer.on(EventKind::RoomCreated, |log, _| log.push("second"));
        observer.on(EventKind::RoomDestroyed, |log, _| log.push("other"));

        let mut log = Vec::new();
        observer.trigger(&mut log, &created());
        assert_eq!(log, vec!["first", "second"]);
    }

    #[test]
    fn test_callbacks_see_event_fields() {
        let mut observer: Observer<Option<Reason>> = Observer::new();
        observer.on(EventKind::RoomDestroyed, |seen, event| {
            if let Event::RoomDestroyed { reason, .. } = event {
                *seen = Some(*reason);
            }
        });

        let mut seen = None;
        let event = Event::RoomDestroyed {
            room: RoomId::from("aBcDe"),
            game: "acquire".into(),
            reason: Reason::NoClients,
        };
        observer.trigger(&mut seen, &event);
        assert_eq!(seen, Some(Reason::NoClients));
    }

    #[test]
    fn test_handles_reports_registration() {
        let mut observer: Observer<()> = Observer::new();
        assert!(!observer.handles(EventKind::Error));
        observer.on(EventKind::Error, |_, _| {});
        assert!(observer.handles(EventKind::Error));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "no callbacks registered")]
    fn test_unhandled_event_panics_in_debug() {
        let observer: Observer<()> = Observer::new();
        observer.trigger(&mut (), &created());
    }
}
