//! Listener lifecycle: binding, secure upgrade and draining.
//!
//! The daemon moves through `Stopped → ListeningInsecure → ListeningSecure →
//! Draining → Stopped`; the secure step only happens with TLS enabled. Both
//! listeners hand requests to one shared [`Gateway`].

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use portico_config::{Config, CredentialPaths};
use thiserror::Error;
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};

use crate::greeting::{self, AddressLookup};
use crate::health::HealthReporter;
use crate::http::{
    AuthorizationGate, Gateway, GatewayParts, GatewaySettings, RouteTable, SharedRoutes,
};
use crate::mesh::{MeshAttachment, MeshRegistry};
use crate::reload::{ClusterControl, ModuleLoader, ReloadCoordinator, ReloadError};
use crate::state::{RedirectFlag, ShutdownState};
use crate::tls::{CertificateIssuer, CredentialStore, SecureContextManager, TlsError, server_config};
use crate::transport::{HttpListener, ListenerError, ListenerHandle, ListenerKind};

const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Observable listener state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No listener is bound.
    Stopped,
    /// Only the plain listener accepts connections.
    ListeningInsecure,
    /// Both listeners accept connections.
    ListeningSecure,
    /// Listeners stopped accepting; open connections are finishing.
    Draining,
}

/// How draining ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrainOutcome {
    /// Every connection closed within the grace window.
    Completed,
    /// The grace window elapsed with connections still open.
    Forced,
}

impl DrainOutcome {
    /// Process exit status for the outcome.
    #[must_use]
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Completed => 0,
            Self::Forced => 1,
        }
    }
}

/// Errors raised while bringing listeners up.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A listener could not be bound.
    #[error(transparent)]
    Listener(#[from] ListenerError),
    /// The service module failed its first start.
    #[error(transparent)]
    Reload(#[from] ReloadError),
    /// No secure context could be installed.
    #[error(transparent)]
    Tls(#[from] TlsError),
}

/// Collaborators the lifecycle wires together.
pub struct LifecycleParts {
    /// Resolved configuration.
    pub config: Config,
    /// Lifecycle event sink.
    pub reporter: Arc<dyn HealthReporter>,
    /// Source of fresh certificates.
    pub issuer: Arc<dyn CertificateIssuer>,
    /// Loads the service module on start and reload.
    pub module_loader: Arc<dyn ModuleLoader>,
    /// Cluster supervisor; reloads happen in place without one.
    pub cluster: Option<Arc<dyn ClusterControl>>,
    /// Authorization policy for routed requests.
    pub auth: Arc<dyn AuthorizationGate>,
    /// Receives upgraded mesh connections; upgrades are refused without one.
    pub mesh: Option<Arc<dyn MeshRegistry>>,
    /// Discovers the address logged in the greeting.
    pub lookup: Arc<dyn AddressLookup>,
}

/// Brings the listeners up.
pub struct ListenerLifecycle {
    parts: LifecycleParts,
    state: watch::Sender<LifecycleState>,
    shutdown: Arc<ShutdownState>,
    redirect: Arc<RedirectFlag>,
}

impl ListenerLifecycle {
    /// Creates a stopped lifecycle.
    #[must_use]
    pub fn new(parts: LifecycleParts) -> Self {
        let (state, _) = watch::channel(LifecycleState::Stopped);
        Self {
            parts,
            state,
            shutdown: Arc::new(ShutdownState::new()),
            redirect: Arc::new(RedirectFlag::new()),
        }
    }

    /// Subscribes to state transitions.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Starts the service module and binds the listeners.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the module fails to start, a listener
    /// cannot be bound, or TLS is enabled and no secure context can be
    /// installed. A plain listener that is already running is stopped first.
    pub async fn start(self) -> Result<RunningDaemon, LifecycleError> {
        let Self {
            parts,
            state,
            shutdown,
            redirect,
        } = self;
        let config = &parts.config;
        let tls_enabled = config.tls_enabled();

        let routes = Arc::new(SharedRoutes::new(RouteTable::new()));
        let reload = Arc::new(ReloadCoordinator::new(
            config.api_root(),
            Arc::clone(&routes),
            Arc::clone(&parts.module_loader),
            parts.cluster.clone(),
        ));
        let registered = reload.start().await?;
        info!(target: LIFECYCLE_TARGET, routes = registered, "service module started");

        let contexts = tls_enabled.then(|| {
            Arc::new(SecureContextManager::new(
                config.domain(),
                CredentialStore::new(CredentialPaths::from_config(config)),
                Arc::clone(&parts.issuer),
                Arc::clone(&redirect),
            ))
        });
        let mesh_listener = if tls_enabled {
            ListenerKind::Secure
        } else {
            ListenerKind::Plain
        };
        let mesh = parts.mesh.clone().map(|registry| {
            MeshAttachment::new(registry, config.mesh_max_payload(), mesh_listener)
        });
        let gateway = Arc::new(Gateway::new(GatewayParts {
            settings: GatewaySettings::from_config(config),
            shutdown: Arc::clone(&shutdown),
            redirect: Arc::clone(&redirect),
            mesh,
            contexts: contexts.clone(),
            reload,
            auth: Arc::clone(&parts.auth),
            routes,
            reporter: Arc::clone(&parts.reporter),
        }));

        let plain = HttpListener::bind(&config.http_address(), ListenerKind::Plain).await?;
        parts
            .reporter
            .listener_bound(ListenerKind::Plain, plain.local_addr());
        let plain = plain.start(gateway.clone(), None);
        state.send_replace(LifecycleState::ListeningInsecure);
        spawn_greeting(&parts, ListenerKind::Plain, plain.local_addr());

        let secure = match &contexts {
            Some(contexts) => match bind_secure(&parts, contexts, gateway).await {
                Ok(secure) => {
                    redirect.set(true);
                    state.send_replace(LifecycleState::ListeningSecure);
                    spawn_greeting(&parts, ListenerKind::Secure, secure.local_addr());
                    Some(secure)
                }
                Err(error) => {
                    plain.close();
                    if let Err(drain_error) = plain.drained().await {
                        warn!(
                            target: LIFECYCLE_TARGET,
                            error = %drain_error,
                            "plain listener did not stop cleanly"
                        );
                    }
                    state.send_replace(LifecycleState::Stopped);
                    return Err(error);
                }
            },
            None => None,
        };

        Ok(RunningDaemon {
            grace: config.shutdown_grace(),
            reporter: parts.reporter,
            state,
            shutdown,
            redirect,
            plain,
            secure,
        })
    }

    /// Starts the daemon, waits for `stop` and drains.
    ///
    /// # Errors
    ///
    /// See [`ListenerLifecycle::start`].
    pub async fn run(
        self,
        stop: impl Future<Output = ()> + Send,
    ) -> Result<DrainOutcome, LifecycleError> {
        let running = self.start().await?;
        stop.await;
        Ok(running.shutdown().await)
    }
}

async fn bind_secure(
    parts: &LifecycleParts,
    contexts: &SecureContextManager,
    gateway: Arc<Gateway>,
) -> Result<ListenerHandle, LifecycleError> {
    let context = match contexts.acquire(false).await {
        Ok(context) => context,
        Err(error) => {
            parts.reporter.context_failed(&error);
            return Err(error.into());
        }
    };
    if let Err(error) = contexts.install(&context) {
        parts.reporter.context_failed(&error);
        return Err(error.into());
    }
    parts.reporter.context_installed(contexts.domain());

    let acceptor = TlsAcceptor::from(server_config(contexts.resolver())?);
    let address = parts.config.https_address();
    let listener = HttpListener::bind(&address, ListenerKind::Secure).await?;
    parts
        .reporter
        .listener_bound(ListenerKind::Secure, listener.local_addr());
    Ok(listener.start(gateway, Some(acceptor)))
}

fn spawn_greeting(parts: &LifecycleParts, kind: ListenerKind, address: SocketAddr) {
    let config = parts.config.clone();
    let lookup = Arc::clone(&parts.lookup);
    tokio::spawn(async move {
        greeting::greet(&config, lookup.as_ref(), kind, address.port()).await;
    });
}

/// Listeners that are accepting connections.
pub struct RunningDaemon {
    grace: Duration,
    reporter: Arc<dyn HealthReporter>,
    state: watch::Sender<LifecycleState>,
    shutdown: Arc<ShutdownState>,
    redirect: Arc<RedirectFlag>,
    plain: ListenerHandle,
    secure: Option<ListenerHandle>,
}

impl RunningDaemon {
    /// Bound address of the plain listener.
    #[must_use]
    pub fn plain_addr(&self) -> SocketAddr {
        self.plain.local_addr()
    }

    /// Bound address of the secure listener, when TLS is enabled.
    #[must_use]
    pub fn secure_addr(&self) -> Option<SocketAddr> {
        self.secure.as_ref().map(ListenerHandle::local_addr)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Whether plain traffic is currently redirected.
    #[must_use]
    pub fn redirecting(&self) -> bool {
        self.redirect.is_enabled()
    }

    /// Stops accepting and waits for open connections within the grace window.
    ///
    /// Requests that arrive on open connections meanwhile are answered with
    /// the draining response. Connections still open at the deadline are
    /// dropped.
    pub async fn shutdown(self) -> DrainOutcome {
        if self.shutdown.trigger() {
            self.reporter.shutdown_started();
        }
        self.state.send_replace(LifecycleState::Draining);
        let mut closers = vec![self.plain.closer()];
        self.plain.shutdown();
        if let Some(secure) = &self.secure {
            closers.push(secure.closer());
            secure.shutdown();
        }

        let plain = self.plain;
        let secure = self.secure;
        let drain = async move {
            report_drain(ListenerKind::Plain, plain.drained().await);
            if let Some(secure) = secure {
                report_drain(ListenerKind::Secure, secure.drained().await);
            }
        };
        let outcome = match tokio::time::timeout(self.grace, drain).await {
            Ok(()) => DrainOutcome::Completed,
            Err(_) => {
                warn!(
                    target: LIFECYCLE_TARGET,
                    grace_ms = self.grace.as_millis(),
                    "connections still open after the grace window"
                );
                for closer in &closers {
                    closer.close();
                }
                DrainOutcome::Forced
            }
        };
        self.state.send_replace(LifecycleState::Stopped);
        self.reporter.shutdown_completed(outcome);
        outcome
    }
}

fn report_drain(kind: ListenerKind, result: Result<(), ListenerError>) {
    if let Err(error) = result {
        warn!(
            target: LIFECYCLE_TARGET,
            listener = %kind,
            error = %error,
            "listener task ended abnormally"
        );
    }
}
