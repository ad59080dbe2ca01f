//! Worker-local publish/subscribe bus.
//!
//! The event bridge publishes every inbound event here and forwards whatever
//! is raised under [`TO_SUPERVISOR`]. Subscriptions deliver events in the
//! order they were notified.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::Event;

/// Topic whose events are forwarded to the supervisor.
pub const TO_SUPERVISOR: &str = "to_supervisor";

const BUS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bus");

/// In-process event bus shared by a worker's domain code.
pub trait EventBus: Send + Sync {
    /// Publishes `event` to every subscriber of its name.
    fn notify(&self, event: Event);

    /// Subscribes to events named `event_name`.
    fn subscribe(&self, event_name: &str) -> mpsc::UnboundedReceiver<Event>;
}

/// [`EventBus`] backed by unbounded channels per subscriber.
#[derive(Debug, Default)]
pub struct LocalEventBus {
    subscribers: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Event>>>>,
}

impl LocalEventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions for `event_name`.
    #[must_use]
    pub fn subscriber_count(&self, event_name: &str) -> usize {
        let subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers
            .get(event_name)
            .map_or(0, |senders| senders.iter().filter(|tx| !tx.is_closed()).count())
    }
}

impl EventBus for LocalEventBus {
    fn notify(&self, event: Event) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(senders) = subscribers.get_mut(event.name()) else {
            debug!(
                target: BUS_TARGET,
                event = event.name(),
                "event has no subscribers"
            );
            return;
        };
        senders.retain(|sender| sender.send(event.clone()).is_ok());
    }

    fn subscribe(&self, event_name: &str) -> mpsc::UnboundedReceiver<Event> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event_name.to_owned())
            .or_default()
            .push(sender);
        receiver
    }
}
