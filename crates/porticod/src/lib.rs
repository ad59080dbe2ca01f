//! Supervisor daemon for Portico.
//!
//! The daemon serves one HTTP request pipeline on a plain listener and, when
//! TLS is enabled, on a secure listener whose certificate can be swapped
//! without a restart. Requests under the API root are handed to a service
//! module, typically [`WorkerPoolModule`], which forwards them to
//! [`portico_worker`] workers as commands.
//!
//! Startup follows a fixed sequence: configuration is loaded, telemetry is
//! installed, the credential directory is prepared, the service module
//! registers its routes, the plain listener binds and finally the secure
//! listener binds with a freshly acquired or persisted certificate. Each
//! milestone is surfaced through a [`HealthReporter`].
//!
//! ## Shutdown
//!
//! A termination signal flips the daemon into draining: listeners stop
//! accepting, every request still arriving is answered with `503` and open
//! connections get the configured grace window to finish. The outcome is
//! reported as a [`DrainOutcome`], which the binary maps to its exit status.

mod bootstrap;
mod greeting;
mod health;
mod http;
mod lifecycle;
mod mesh;
mod pools;
mod process;
mod reload;
mod state;
mod telemetry;
mod tls;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use greeting::{AddressLookup, HttpAddressLookup, LookupError, greet, greeting_host};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use http::{
    AllowAll, AuthorizationGate, Gateway, GatewayParts, GatewaySettings, HttpRequest, PathPattern,
    RouteHandler, RouteParams, RouteTable, SharedRoutes, responses,
};
pub use lifecycle::{
    DrainOutcome, LifecycleError, LifecycleParts, LifecycleState, ListenerLifecycle, RunningDaemon,
};
pub use mesh::{
    LoggingMeshRegistry, MeshAttachment, MeshConnection, MeshRegistry, MeshSocket,
    is_upgrade_request,
};
pub use pools::WorkerPoolModule;
pub use process::{
    LaunchError, LaunchPlan, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon,
    run_daemon_with,
};
pub use reload::{
    ClusterControl, ModuleLoader, ReloadCoordinator, ReloadError, ReloadOutcome, ServiceModule,
    StaticModuleLoader,
};
pub use state::{RedirectFlag, RedirectSuspension, ShutdownState};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use tls::{
    CertificateIssuer, CredentialError, CredentialStore, IssuanceError, SecureContext,
    SecureContextManager, SelfSignedIssuer, SwappableCertResolver, TlsError, server_config,
};
pub use transport::{
    ConnectionHandler, ConnectionInfo, HttpListener, HttpResponse, ListenerCloser, ListenerError,
    ListenerHandle, ListenerKind,
};

#[cfg(test)]
mod tests;
