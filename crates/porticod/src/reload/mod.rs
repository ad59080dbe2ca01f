//! Hot reload of the service module.
//!
//! In single-process mode a reload loads the module bundle again, rebuilds
//! the route table from the routes outside the API root, clears the fresh
//! module's caches and lets it register its routes before the table is
//! swapped in. In cluster mode the request is delegated to
//! [`ClusterControl`], which restarts worker processes one at a time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::http::{RouteTable, SharedRoutes};

const RELOAD_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::reload");
const IDLE: u64 = 0;

/// Errors surfaced by reload collaborators.
#[derive(Debug, Error)]
pub enum ReloadError {
    /// Another reload holds the reload slot.
    #[error("a reload is already in progress")]
    InProgress,
    /// The module bundle could not be loaded.
    #[error("failed to load service module: {message}")]
    Load {
        /// Loader diagnostic.
        message: String,
    },
    /// The module failed while registering its routes.
    #[error("service module failed to start: {message}")]
    Start {
        /// Module diagnostic.
        message: String,
    },
    /// The cluster supervisor rejected the request.
    #[error("cluster control failed: {message}")]
    Cluster {
        /// Supervisor diagnostic.
        message: String,
    },
}

impl ReloadError {
    /// Builds a load failure.
    #[must_use]
    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
        }
    }

    /// Builds a start failure.
    #[must_use]
    pub fn start(message: impl Into<String>) -> Self {
        Self::Start {
            message: message.into(),
        }
    }

    /// Builds a cluster failure.
    #[must_use]
    pub fn cluster(message: impl Into<String>) -> Self {
        Self::Cluster {
            message: message.into(),
        }
    }
}

/// What a successful reload did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The route table was rebuilt in this process.
    Reloaded {
        /// Routes in the new table.
        routes: usize,
    },
    /// The cluster supervisor accepted a rolling restart.
    ClusterRestartRequested,
}

/// A loaded module bundle.
#[async_trait]
pub trait ServiceModule: Send + Sync {
    /// Registers the module's routes on `routes`.
    async fn start(&self, routes: &mut RouteTable) -> Result<(), ReloadError>;

    /// Drops state cached by earlier loads.
    fn clear_caches(&self);
}

/// Produces a fresh module bundle on every call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Loads the bundle, bypassing any loader cache.
    async fn load(&self) -> Result<Arc<dyn ServiceModule>, ReloadError>;
}

/// Loader that always returns the same in-process module.
#[derive(Clone)]
pub struct StaticModuleLoader {
    module: Arc<dyn ServiceModule>,
}

impl StaticModuleLoader {
    /// Wraps `module`.
    #[must_use]
    pub fn new(module: Arc<dyn ServiceModule>) -> Self {
        Self { module }
    }
}

#[async_trait]
impl ModuleLoader for StaticModuleLoader {
    async fn load(&self) -> Result<Arc<dyn ServiceModule>, ReloadError> {
        Ok(Arc::clone(&self.module))
    }
}

/// Cluster supervisor reached when clustering is enabled.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterControl: Send + Sync {
    /// Requests a rolling restart of the worker processes.
    async fn rolling_restart(&self) -> Result<(), ReloadError>;

    /// Clears the supervisor's record of a reload in progress.
    async fn reset_reload(&self) -> Result<(), ReloadError>;
}

/// Serializes reloads and swaps route tables.
pub struct ReloadCoordinator {
    api_root: String,
    routes: Arc<SharedRoutes>,
    loader: Arc<dyn ModuleLoader>,
    cluster: Option<Arc<dyn ClusterControl>>,
    active: AtomicU64,
    tickets: AtomicU64,
}

impl ReloadCoordinator {
    /// Creates a coordinator; `cluster` selects cluster mode.
    #[must_use]
    pub fn new(
        api_root: impl Into<String>,
        routes: Arc<SharedRoutes>,
        loader: Arc<dyn ModuleLoader>,
        cluster: Option<Arc<dyn ClusterControl>>,
    ) -> Self {
        Self {
            api_root: api_root.into(),
            routes,
            loader,
            cluster,
            active: AtomicU64::new(IDLE),
            tickets: AtomicU64::new(IDLE),
        }
    }

    /// Live route table.
    #[must_use]
    pub fn routes(&self) -> Arc<SharedRoutes> {
        Arc::clone(&self.routes)
    }

    /// Returns `true` while a reload holds the slot.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.active.load(Ordering::SeqCst) != IDLE
    }

    /// Loads the module for the first time and installs its routes.
    ///
    /// # Errors
    ///
    /// Returns [`ReloadError`] when loading or starting the module fails;
    /// the route table is left unchanged.
    pub async fn start(&self) -> Result<usize, ReloadError> {
        self.rebuild(false).await
    }

    /// Runs a hot reload.
    ///
    /// # Errors
    ///
    /// Returns [`ReloadError::InProgress`] while another reload runs, or the
    /// collaborator's error; the previous route table keeps serving.
    pub async fn reload(&self) -> Result<ReloadOutcome, ReloadError> {
        let _slot = self.claim()?;
        if let Some(cluster) = &self.cluster {
            info!(target: RELOAD_TARGET, "requesting rolling cluster restart");
            cluster.rolling_restart().await?;
            return Ok(ReloadOutcome::ClusterRestartRequested);
        }
        let routes = self.rebuild(true).await?;
        Ok(ReloadOutcome::Reloaded { routes })
    }

    /// Releases a stuck reload slot and forwards the reset in cluster mode.
    ///
    /// # Errors
    ///
    /// Returns the cluster supervisor's error.
    pub async fn reset(&self) -> Result<(), ReloadError> {
        let previous = self.active.swap(IDLE, Ordering::SeqCst);
        if previous != IDLE {
            warn!(target: RELOAD_TARGET, "cleared reload in progress");
        }
        if let Some(cluster) = &self.cluster {
            cluster.reset_reload().await?;
        }
        Ok(())
    }

    fn claim(&self) -> Result<ReloadSlot<'_>, ReloadError> {
        let ticket = self.tickets.fetch_add(1, Ordering::SeqCst).wrapping_add(1).max(1);
        self.active
            .compare_exchange(IDLE, ticket, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ReloadError::InProgress)?;
        Ok(ReloadSlot {
            active: &self.active,
            ticket,
        })
    }

    async fn rebuild(&self, hot: bool) -> Result<usize, ReloadError> {
        let module = self.loader.load().await?;
        let mut table = self.routes.load().without_prefix(&self.api_root);
        if hot {
            module.clear_caches();
        }
        module.start(&mut table).await?;
        let count = table.len();
        self.routes.replace(table);
        info!(
            target: RELOAD_TARGET,
            routes = count,
            hot,
            "service module started"
        );
        Ok(count)
    }
}

impl std::fmt::Debug for ReloadCoordinator {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ReloadCoordinator")
            .field("api_root", &self.api_root)
            .field("cluster", &self.cluster.is_some())
            .field("in_progress", &self.is_in_progress())
            .finish_non_exhaustive()
    }
}

/// Holds the reload slot; a reset may take it away early.
struct ReloadSlot<'a> {
    active: &'a AtomicU64,
    ticket: u64,
}

impl Drop for ReloadSlot<'_> {
    fn drop(&mut self) {
        let _ = self
            .active
            .compare_exchange(self.ticket, IDLE, Ordering::SeqCst, Ordering::SeqCst);
    }
}
