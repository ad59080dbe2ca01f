//! Worker side of the Portico supervisor/worker message bridge.
//!
//! A worker is an isolated execution unit serving one named pool. The
//! supervisor talks to it over two independent channels:
//!
//! 1. **Commands** carry a [`CommandMessage`] together with a one-shot reply
//!    channel. The [`CommandDispatcher`] resolves the command name against the
//!    worker's [`DomainPorts`] and answers with exactly one [`CommandResult`].
//!    Handler failures, panics included, come back as an [`ErrorEnvelope`]
//!    and never stop the worker.
//! 2. **Events** flow over an [`EventPort`] handed to the worker after start.
//!    Inbound events are published on the worker's [`EventBus`]; events raised
//!    on the [`TO_SUPERVISOR`] topic are forwarded back. Events never receive
//!    a reply.
//!
//! The supervisor drives a worker through its [`WorkerHandle`].

pub mod bridge;
pub mod bus;
pub mod dispatch;
pub mod error;
pub mod ports;
pub mod protocol;
pub mod runtime;

#[cfg(test)]
mod tests;

pub use self::bridge::{
    DEFAULT_EVENT_CAPACITY, EventPort, SupervisorEvents, connect_event_channel, event_channel,
};
pub use self::bus::{EventBus, LocalEventBus, TO_SUPERVISOR};
pub use self::dispatch::CommandDispatcher;
pub use self::error::{BridgeError, WorkerError};
pub use self::ports::{DomainPort, DomainPorts, PortError, PortLoader, StaticPortLoader, port_fn};
pub use self::protocol::{
    CommandMessage, CommandResult, ErrorEnvelope, Event, PING_COMMAND, PING_REPLY, WorkerInbound,
};
pub use self::runtime::{Worker, WorkerHandle};
