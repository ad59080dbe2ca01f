//! Event channel between the supervisor and a worker.
//!
//! The channel is independent of the command path: it carries events in both
//! directions and never produces replies. Each direction is a single bounded
//! queue, so events stay in FIFO order per direction.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::bus::{EventBus, TO_SUPERVISOR};
use crate::error::BridgeError;
use crate::protocol::Event;

/// Default queue depth for each direction of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

const BRIDGE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bridge");

/// Worker end of the event channel.
#[derive(Debug)]
pub struct EventPort {
    from_supervisor: mpsc::Receiver<Event>,
    to_supervisor: mpsc::Sender<Event>,
}

/// Supervisor end of the event channel.
#[derive(Debug)]
pub struct SupervisorEvents {
    to_worker: mpsc::Sender<Event>,
    from_worker: mpsc::Receiver<Event>,
}

impl SupervisorEvents {
    /// Pushes an event into the worker.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::WorkerGone`] once the worker side has closed.
    pub async fn send(&self, event: Event) -> Result<(), BridgeError> {
        self.to_worker
            .send(event)
            .await
            .map_err(|_| BridgeError::WorkerGone)
    }

    /// Receives the next event forwarded by the worker.
    pub async fn recv(&mut self) -> Option<Event> {
        self.from_worker.recv().await
    }

    /// Splits the channel into its sending and receiving halves.
    #[must_use]
    pub fn split(self) -> (mpsc::Sender<Event>, mpsc::Receiver<Event>) {
        (self.to_worker, self.from_worker)
    }
}

/// Creates a connected pair of channel ends.
#[must_use]
pub fn event_channel(capacity: usize) -> (EventPort, SupervisorEvents) {
    let (to_worker, from_supervisor) = mpsc::channel(capacity);
    let (to_supervisor, from_worker) = mpsc::channel(capacity);
    (
        EventPort {
            from_supervisor,
            to_supervisor,
        },
        SupervisorEvents {
            to_worker,
            from_worker,
        },
    )
}

/// Wires `port` to `bus`.
///
/// Inbound events are published on the bus under their own name. Events the
/// worker raises on [`TO_SUPERVISOR`] are forwarded through the port. Both
/// pumps stop once the supervisor drops its end.
///
/// # Errors
///
/// Returns [`BridgeError::PortClosed`] when the supervisor end is already
/// closed; the caller logs it and the worker continues without events.
pub fn connect_event_channel(
    pool: &str,
    port: EventPort,
    bus: Arc<dyn EventBus>,
) -> Result<(), BridgeError> {
    let EventPort {
        mut from_supervisor,
        to_supervisor,
    } = port;
    if to_supervisor.is_closed() {
        return Err(BridgeError::PortClosed {
            pool: pool.to_owned(),
        });
    }

    let mut outbound = bus.subscribe(TO_SUPERVISOR);
    let inbound_bus = Arc::clone(&bus);
    tokio::spawn(async move {
        while let Some(event) = from_supervisor.recv().await {
            inbound_bus.notify(event);
        }
    });

    let forward_pool = pool.to_owned();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = to_supervisor.closed() => break,
                next = outbound.recv() => {
                    let Some(event) = next else { break };
                    if to_supervisor.send(event).await.is_err() {
                        break;
                    }
                }
            }
        }
        debug!(
            target: BRIDGE_TARGET,
            pool = %forward_pool,
            "event forwarding stopped"
        );
    });

    info!(target: BRIDGE_TARGET, pool = %pool, "event channel connected");
    Ok(())
}
