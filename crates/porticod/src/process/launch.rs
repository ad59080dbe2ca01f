//! Supervises daemon launch sequencing and runtime orchestration.

use std::sync::Arc;

use portico_worker::{EventBus, LocalEventBus, PortLoader, StaticPortLoader};
use tracing::info;

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::greeting::{AddressLookup, HttpAddressLookup};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::http::{AllowAll, AuthorizationGate};
use crate::lifecycle::{DrainOutcome, LifecycleParts, ListenerLifecycle};
use crate::mesh::{LoggingMeshRegistry, MeshRegistry};
use crate::pools::WorkerPoolModule;
use crate::reload::{ClusterControl, ModuleLoader, StaticModuleLoader};
use crate::tls::{CertificateIssuer, SelfSignedIssuer};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Collaborators required to launch the daemon runtime.
pub struct LaunchPlan {
    /// Resolves the configuration.
    pub loader: Arc<dyn ConfigLoader>,
    /// Lifecycle event sink.
    pub reporter: Arc<dyn HealthReporter>,
    /// Source of fresh certificates.
    pub issuer: Arc<dyn CertificateIssuer>,
    /// Supplies domain ports to the configured worker pools.
    pub ports: Arc<dyn PortLoader>,
    /// Receives the events workers raise for the supervisor.
    pub supervisor_events: Arc<dyn EventBus>,
    /// Service module loader; the configured worker pools are served when
    /// absent.
    pub module_loader: Option<Arc<dyn ModuleLoader>>,
    /// Cluster supervisor, when reloads are delegated.
    pub cluster: Option<Arc<dyn ClusterControl>>,
    /// Authorization policy for routed requests.
    pub auth: Arc<dyn AuthorizationGate>,
    /// Receives upgraded mesh connections.
    pub mesh: Option<Arc<dyn MeshRegistry>>,
    /// Greeting lookup; the configured echo host is used when absent.
    pub lookup: Option<Arc<dyn AddressLookup>>,
    /// Resolves when the daemon should drain.
    pub shutdown: Arc<dyn ShutdownSignal>,
}

impl LaunchPlan {
    /// Production collaborators. Worker pools start without domain ports
    /// until [`LaunchPlan::ports`] is replaced.
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: Arc::new(SystemConfigLoader),
            reporter: Arc::new(StructuredHealthReporter::new()),
            issuer: Arc::new(SelfSignedIssuer),
            ports: Arc::new(StaticPortLoader::default()),
            supervisor_events: Arc::new(LocalEventBus::new()),
            module_loader: None,
            cluster: None,
            auth: Arc::new(AllowAll),
            mesh: Some(Arc::new(LoggingMeshRegistry::new())),
            lookup: None,
            shutdown: Arc::new(SystemShutdownSignal),
        }
    }
}

impl Default for LaunchPlan {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the daemon using the production collaborators.
///
/// # Errors
///
/// See [`run_daemon_with`].
pub async fn run_daemon() -> Result<DrainOutcome, LaunchError> {
    run_daemon_with(LaunchPlan::new()).await
}

/// Runs the daemon with injected collaborators until the shutdown signal.
///
/// The listeners are drained even when waiting for the signal fails.
///
/// # Errors
///
/// Returns [`LaunchError`] when bootstrap fails, a worker pool cannot be
/// started, the listeners cannot be brought up, or the signal handlers
/// cannot be installed.
pub async fn run_daemon_with(plan: LaunchPlan) -> Result<DrainOutcome, LaunchError> {
    let LaunchPlan {
        loader,
        reporter,
        issuer,
        ports,
        supervisor_events,
        module_loader,
        cluster,
        auth,
        mesh,
        lookup,
        shutdown,
    } = plan;

    let daemon = bootstrap_with(loader.as_ref(), reporter)?;
    let (config, reporter) = daemon.into_parts();
    info!(
        target: PROCESS_TARGET,
        environment = %config.environment(),
        tls = config.tls_enabled(),
        "starting daemon runtime"
    );
    let module_loader = match module_loader {
        Some(module_loader) => module_loader,
        None => {
            let module = WorkerPoolModule::spawn(
                config.api_root(),
                config.worker_pools(),
                ports.as_ref(),
                supervisor_events,
            )
            .await?;
            Arc::new(StaticModuleLoader::new(Arc::new(module)))
        }
    };
    let lookup = lookup.unwrap_or_else(|| Arc::new(HttpAddressLookup::from_config(&config)));
    let lifecycle = ListenerLifecycle::new(LifecycleParts {
        config,
        reporter,
        issuer,
        module_loader,
        cluster,
        auth,
        mesh,
        lookup,
    });

    let running = lifecycle.start().await?;
    let signal = shutdown.wait().await;
    let outcome = running.shutdown().await;
    signal?;
    info!(
        target: PROCESS_TARGET,
        ?outcome,
        "shutdown sequence completed"
    );
    Ok(outcome)
}
