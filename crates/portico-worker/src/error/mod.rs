//! Errors raised while driving a worker from the supervisor side.
//!
//! Handler failures are not errors at this level: they travel back to the
//! caller inside a [`crate::CommandResult::Failure`]. The enums here cover the
//! transport between supervisor and worker.

use thiserror::Error;

/// Errors surfaced by [`crate::WorkerHandle`] and worker startup.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The worker was started without a pool name.
    #[error("worker pool name must not be empty")]
    MissingPoolName,

    /// The worker loop has exited and no longer accepts messages.
    #[error("worker '{pool}' is closed")]
    Closed {
        /// Pool served by the worker.
        pool: String,
    },

    /// The worker accepted a command but dropped its reply channel.
    #[error("worker '{pool}' dropped the reply for command '{command}'")]
    ReplyDropped {
        /// Pool served by the worker.
        pool: String,
        /// Command whose reply went missing.
        command: String,
    },
}

impl WorkerError {
    pub(crate) fn closed(pool: &str) -> Self {
        Self::Closed {
            pool: pool.to_owned(),
        }
    }
}

/// Errors raised while wiring or using the event channel.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The supervisor end of the event port was closed before the bridge ran.
    #[error("event port for worker '{pool}' is already closed")]
    PortClosed {
        /// Pool served by the worker.
        pool: String,
    },

    /// The worker end of the event channel has gone away.
    #[error("worker event channel is closed")]
    WorkerGone,
}

#[cfg(test)]
mod tests;
