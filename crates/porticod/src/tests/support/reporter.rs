//! Test double for [`HealthReporter`] that records structured events for assertions.

use std::net::SocketAddr;
use std::sync::Mutex;

use portico_config::Config;

use crate::bootstrap::BootstrapError;
use crate::health::HealthReporter;
use crate::lifecycle::DrainOutcome;
use crate::reload::{ReloadError, ReloadOutcome};
use crate::tls::TlsError;
use crate::transport::ListenerKind;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// A listener was bound.
    ListenerBound(ListenerKind),
    /// A secure context went live for the domain.
    ContextInstalled(String),
    /// Acquiring or installing a secure context failed.
    ContextFailed(String),
    /// A reload finished.
    ReloadCompleted(ReloadOutcome),
    /// A reload failed or was refused.
    ReloadFailed(String),
    /// Draining began.
    ShutdownStarted,
    /// Draining ended.
    ShutdownCompleted(DrainOutcome),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
    addresses: Mutex<Vec<(ListenerKind, SocketAddr)>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Address the listener of `kind` was last bound to.
    #[must_use]
    pub fn bound_address(&self, kind: ListenerKind) -> Option<SocketAddr> {
        self.addresses
            .lock()
            .expect("health reporter mutex poisoned")
            .iter()
            .rev()
            .find(|(bound, _)| *bound == kind)
            .map(|(_, address)| *address)
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn listener_bound(&self, kind: ListenerKind, address: SocketAddr) {
        self.addresses
            .lock()
            .expect("health reporter mutex poisoned")
            .push((kind, address));
        self.record(HealthEvent::ListenerBound(kind));
    }

    fn context_installed(&self, domain: &str) {
        self.record(HealthEvent::ContextInstalled(domain.to_owned()));
    }

    fn context_failed(&self, error: &TlsError) {
        self.record(HealthEvent::ContextFailed(error.to_string()));
    }

    fn reload_completed(&self, outcome: ReloadOutcome) {
        self.record(HealthEvent::ReloadCompleted(outcome));
    }

    fn reload_failed(&self, error: &ReloadError) {
        self.record(HealthEvent::ReloadFailed(error.to_string()));
    }

    fn shutdown_started(&self) {
        self.record(HealthEvent::ShutdownStarted);
    }

    fn shutdown_completed(&self, outcome: DrainOutcome) {
        self.record(HealthEvent::ShutdownCompleted(outcome));
    }
}
