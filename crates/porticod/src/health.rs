//! Structured health reporting for daemon lifecycle events.

use std::net::SocketAddr;
use std::sync::Arc;

use portico_config::Config;

use crate::bootstrap::BootstrapError;
use crate::lifecycle::DrainOutcome;
use crate::reload::{ReloadError, ReloadOutcome};
use crate::tls::TlsError;
use crate::transport::ListenerKind;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once a listener accepts connections.
    fn listener_bound(&self, kind: ListenerKind, address: SocketAddr);

    /// Invoked after a secure context becomes live.
    fn context_installed(&self, domain: &str);

    /// Invoked when acquiring or installing a secure context fails.
    fn context_failed(&self, error: &TlsError);

    /// Invoked after a hot reload finishes.
    fn reload_completed(&self, outcome: ReloadOutcome);

    /// Invoked when a hot reload fails or is refused.
    fn reload_failed(&self, error: &ReloadError);

    /// Invoked when the shutdown signal flips the daemon into draining.
    fn shutdown_started(&self);

    /// Invoked once draining ends.
    fn shutdown_completed(&self, outcome: DrainOutcome);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn listener_bound(&self, kind: ListenerKind, address: SocketAddr) {
        (**self).listener_bound(kind, address);
    }

    fn context_installed(&self, domain: &str) {
        (**self).context_installed(domain);
    }

    fn context_failed(&self, error: &TlsError) {
        (**self).context_failed(error);
    }

    fn reload_completed(&self, outcome: ReloadOutcome) {
        (**self).reload_completed(outcome);
    }

    fn reload_failed(&self, error: &ReloadError) {
        (**self).reload_failed(error);
    }

    fn shutdown_started(&self) {
        (**self).shutdown_started();
    }

    fn shutdown_completed(&self, outcome: DrainOutcome) {
        (**self).shutdown_completed(outcome);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            http = %config.http_address(),
            tls = config.tls_enabled(),
            environment = %config.environment(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn listener_bound(&self, kind: ListenerKind, address: SocketAddr) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listener_bound",
            listener = %kind,
            %address,
            "listener accepting connections"
        );
    }

    fn context_installed(&self, domain: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "context_installed",
            domain,
            "secure context installed"
        );
    }

    fn context_failed(&self, error: &TlsError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "context_failed",
            error = %error,
            "secure context unavailable"
        );
    }

    fn reload_completed(&self, outcome: ReloadOutcome) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "reload_completed",
            outcome = ?outcome,
            "hot reload completed"
        );
    }

    fn reload_failed(&self, error: &ReloadError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "reload_failed",
            error = %error,
            "hot reload failed"
        );
    }

    fn shutdown_started(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_started",
            "draining connections"
        );
    }

    fn shutdown_completed(&self, outcome: DrainOutcome) {
        match outcome {
            DrainOutcome::Completed => tracing::info!(
                target: HEALTH_TARGET,
                event = "shutdown_completed",
                "closed out remaining connections"
            ),
            DrainOutcome::Forced => tracing::error!(
                target: HEALTH_TARGET,
                event = "shutdown_forced",
                "taking too long to close connections, forcing shutdown"
            ),
        }
    }
}
