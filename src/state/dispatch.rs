//! Event dispatch registry.
//!
//! Listeners subscribe to one [`EventKind`] and are called synchronously, in
//! subscription order, for every published event of that kind. A failing or
//! panicking listener is logged and skipped; the remaining listeners still
//! run.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;
use tracing::{error, trace};

use super::protocol::{EventKind, ProtocolEvent};

/// Error returned by a listener.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type HandlerResult = Result<(), HandlerError>;

type Handler = Box<dyn FnMut(&ProtocolEvent) -> HandlerResult + Send>;

/// Handle returned by [`EventDispatcher::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Result of one publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delivery {
    /// Listeners that returned `Ok`
    pub delivered: usize,
    /// Listeners that returned an error or panicked
    pub failed: usize,
}

/// Typed publish/subscribe registry.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: HashMap<EventKind, Vec<(SubscriptionId, Handler)>>,
    next_id: u64,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<EventKind, usize> = self
            .listeners
            .iter()
            .map(|(kind, list)| (*kind, list.len()))
            .collect();
        f.debug_struct("EventDispatcher")
            .field("listeners", &counts)
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one kind of event.
    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&ProtocolEvent) -> HandlerResult + Send + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// Remove one listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let mut removed = false;
        self.listeners.retain(|_, list| {
            let before = list.len();
            list.retain(|(sid, _)| *sid != id);
            removed |= list.len() != before;
            !list.is_empty()
        });
        removed
    }

    /// Remove every listener for `kind`, or every listener when `None`.
    pub fn unsubscribe_all(&mut self, kind: Option<EventKind>) {
        match kind {
            Some(kind) => {
                self.listeners.remove(&kind);
            }
            None => self.listeners.clear(),
        }
    }

    /// Number of listeners for a kind.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Deliver an event to its listeners.
    pub fn publish(&mut self, event: &ProtocolEvent) -> Delivery {
        let kind = event.kind();
        let mut delivery = Delivery::default();

        let Some(list) = self.listeners.get_mut(&kind) else {
            trace!(event = %kind, "No listeners");
            return delivery;
        };

        for (id, handler) in list.iter_mut() {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => delivery.delivered += 1,
                Ok(Err(err)) => {
                    error!(event = %kind, subscription = ?id, error = %err, "Event listener failed");
                    delivery.failed += 1;
                }
                Err(_) => {
                    error!(event = %kind, subscription = ?id, "Event listener panicked");
                    delivery.failed += 1;
                }
            }
        }

        delivery
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::protocol::{HubFault, PlayerGone};
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    fn left(name: &str) -> ProtocolEvent {
        ProtocolEvent::PlayerLeft(PlayerGone {
            player_name: name.to_string(),
        })
    }

    #[test]
    fn test_listeners_run_in_subscription_order() {
        let mut dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            dispatcher.subscribe(EventKind::PlayerLeft, move |_| {
                seen.lock().unwrap().push(tag);
                Ok(())
            });
        }

        let delivery = dispatcher.publish(&left("B"));
        assert_eq!(delivery.delivered, 3);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_failures_are_isolated() {
        let mut dispatcher = EventDispatcher::new();
        let count = Arc::new(Mutex::new(0));

        dispatcher.subscribe(EventKind::PlayerLeft, |_| Err(HandlerError::new("boom")));
        dispatcher.subscribe(EventKind::PlayerLeft, |_| panic!("listener bug"));
        let counter = Arc::clone(&count);
        dispatcher.subscribe(EventKind::PlayerLeft, move |_| {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        let delivery = dispatcher.publish(&left("B"));
        assert_eq!(
            delivery,
            Delivery {
                delivered: 1,
                failed: 2
            }
        );
        assert_eq!(*count.lock().unwrap(), 1);

        // The failing listeners stay registered.
        assert_eq!(dispatcher.publish(&left("C")).failed, 2);
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn test_only_matching_kind_is_called() {
        let mut dispatcher = EventDispatcher::new();
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        dispatcher.subscribe(EventKind::Error, move |event| {
            assert!(matches!(event, ProtocolEvent::Error(_)));
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        dispatcher.publish(&left("B"));
        dispatcher.publish(&ProtocolEvent::Error(HubFault {
            message: "oops".to_string(),
        }));
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn test_publish_without_listeners() {
        let mut dispatcher = EventDispatcher::new();
        assert_eq!(dispatcher.publish(&ProtocolEvent::Reconnected), Delivery::default());
    }

    #[test]
    fn test_unsubscribe() {
        let mut dispatcher = EventDispatcher::new();
        let a = dispatcher.subscribe(EventKind::PlayerLeft, |_| Ok(()));
        let b = dispatcher.subscribe(EventKind::PlayerLeft, |_| Ok(()));
        dispatcher.subscribe(EventKind::MoveMade, |_| Ok(()));

        assert!(dispatcher.unsubscribe(a));
        assert!(!dispatcher.unsubscribe(a));
        assert_eq!(dispatcher.listener_count(EventKind::PlayerLeft), 1);

        dispatcher.unsubscribe_all(Some(EventKind::PlayerLeft));
        assert_eq!(dispatcher.listener_count(EventKind::PlayerLeft), 0);
        assert!(!dispatcher.unsubscribe(b));
        assert_eq!(dispatcher.listener_count(EventKind::MoveMade), 1);

        dispatcher.unsubscribe_all(None);
        assert_eq!(dispatcher.listener_count(EventKind::MoveMade), 0);
    }
}
