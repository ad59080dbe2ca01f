use std::io;

use async_trait::async_trait;
use thiserror::Error;
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;

use super::PROCESS_TARGET;

/// Abstraction over shutdown notification mechanisms.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShutdownSignal: Send + Sync {
    /// Resolves once shutdown should proceed.
    async fn wait(&self) -> Result<(), ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Waits for `SIGTERM` or `SIGINT`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

#[async_trait]
impl ShutdownSignal for SystemShutdownSignal {
    async fn wait(&self) -> Result<(), ShutdownError> {
        let mut terminate =
            signal(SignalKind::terminate()).map_err(|source| ShutdownError::Install { source })?;
        let mut interrupt =
            signal(SignalKind::interrupt()).map_err(|source| ShutdownError::Install { source })?;
        let received = tokio::select! {
            _ = terminate.recv() => "SIGTERM",
            _ = interrupt.recv() => "SIGINT",
        };
        info!(
            target: PROCESS_TARGET,
            signal = received,
            "shutdown signal received"
        );
        Ok(())
    }
}
