//! Tracing subscriber installation.
//!
//! Output goes to stderr. On a developer workstation (`local` environment)
//! the compact format is always used; elsewhere the configured format applies.
//! The HTTP, TLS and WebSocket stacks are capped at `warn` unless the
//! configured filter names them, so connection churn does not drown the
//! daemon's own events.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, time::UtcTime};

use portico_config::{Config, LogFormat};

/// Dependencies whose events are capped unless the filter mentions them.
const QUIET_DEPENDENCIES: [&str; 4] = ["hyper", "hyper_util", "rustls", "tungstenite"];

static INSTALLED: OnceCell<LogFormat> = OnceCell::new();

/// Describes the subscriber serving this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHandle {
    format: LogFormat,
}

impl TelemetryHandle {
    /// Format chosen when the subscriber was installed.
    #[must_use]
    pub const fn format(self) -> LogFormat {
        self.format
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured log filter expression does not parse.
    #[error("invalid log filter {filter:?}: {message}")]
    Filter {
        /// Filter as configured.
        filter: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Another subscriber already owns the process.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global subscriber on first use.
///
/// The first configuration wins; later calls report the format already in
/// place, so a daemon can be bootstrapped more than once per process.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter does not parse or the global
/// subscriber cannot be set.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED
        .get_or_try_init(|| install(config))
        .map(|format| TelemetryHandle { format: *format })
}

fn install(config: &Config) -> Result<LogFormat, TelemetryError> {
    let format = effective_format(config);
    let filter = build_filter(config.log_filter())?;
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .with_timer(UtcTime::rfc_3339());

    let subscriber: Box<dyn Subscriber + Send + Sync> = match format {
        LogFormat::Json => Box::new(
            builder
                .with_ansi(false)
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .finish(),
        ),
        LogFormat::Compact => Box::new(
            builder
                .with_ansi(io::stderr().is_terminal())
                .compact()
                .finish(),
        ),
    };
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)?;
    Ok(format)
}

fn effective_format(config: &Config) -> LogFormat {
    if config.environment().is_local() {
        LogFormat::Compact
    } else {
        config.log_format()
    }
}

fn build_filter(configured: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(filter_directives(configured)).map_err(|error| TelemetryError::Filter {
        filter: configured.to_owned(),
        message: error.to_string(),
    })
}

fn filter_directives(configured: &str) -> String {
    let mut directives = configured.trim().to_owned();
    for dependency in QUIET_DEPENDENCIES {
        let mentioned = configured.split(',').any(|directive| {
            let target = directive.split('=').next().unwrap_or_default().trim();
            target == dependency || target.starts_with(&format!("{dependency}::"))
        });
        if !mentioned {
            if !directives.is_empty() {
                directives.push(',');
            }
            directives.push_str(dependency);
            directives.push_str("=warn");
        }
    }
    directives
}
