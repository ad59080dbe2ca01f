//! Defines the unified error surface for daemon launch and supervision.

use std::sync::Arc;

use ortho_config::OrthoError;
use portico_worker::WorkerError;
use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::lifecycle::LifecycleError;

use super::shutdown::ShutdownError;

/// Errors surfaced while launching or supervising the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Bootstrapping the daemon failed.
    #[error("daemon bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// A configured worker pool could not be started.
    #[error("failed to start worker pools: {source}")]
    Workers {
        /// Underlying worker error.
        #[source]
        source: WorkerError,
    },
    /// The listeners could not be brought up.
    #[error("failed to start listeners: {source}")]
    Lifecycle {
        /// Underlying lifecycle error.
        #[source]
        source: LifecycleError,
    },
    /// Waiting for shutdown failed.
    #[error("failed to await shutdown signal: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
}

impl From<Arc<OrthoError>> for LaunchError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self::Config { source }
    }
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}

impl From<WorkerError> for LaunchError {
    fn from(source: WorkerError) -> Self {
        Self::Workers { source }
    }
}

impl From<LifecycleError> for LaunchError {
    fn from(source: LifecycleError) -> Self {
        Self::Lifecycle { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}
