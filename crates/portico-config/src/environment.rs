//! Deployment environment classification.
//!
//! The environment drives policy that differs between production and
//! development hosts: whether TLS is mandatory, how long shutdown waits for
//! open connections, and whether the public address lookup runs at all.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Grace window granted to open connections in production.
pub const PRODUCTION_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Shorter grace window used everywhere else.
pub const DEVELOPMENT_SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Environment the daemon is deployed into.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Environment {
    /// Public deployment; TLS is always enabled.
    #[strum(to_string = "production", serialize = "prod")]
    #[serde(alias = "prod")]
    Production,
    /// Shared development deployment.
    #[default]
    #[strum(to_string = "development", serialize = "dev")]
    #[serde(alias = "dev")]
    Development,
    /// Developer workstation; no outbound lookups.
    Local,
}

impl Environment {
    /// Returns `true` for production deployments.
    #[must_use]
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Returns `true` for workstation deployments.
    #[must_use]
    pub fn is_local(self) -> bool {
        matches!(self, Self::Local)
    }

    /// Grace window granted to open connections during shutdown.
    #[must_use]
    pub fn shutdown_grace(self) -> Duration {
        if self.is_production() {
            PRODUCTION_SHUTDOWN_GRACE
        } else {
            DEVELOPMENT_SHUTDOWN_GRACE
        }
    }
}

/// Errors encountered while parsing an [`Environment`] from text.
pub type EnvironmentParseError = strum::ParseError;
