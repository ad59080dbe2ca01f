use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Host and port pair a listener binds to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ListenerAddress {
    /// Host name or IP literal.
    pub host: String,
    /// TCP port; `0` requests an ephemeral port.
    pub port: u16,
}

impl ListenerAddress {
    /// Builds a listener address.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ListenerAddress {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(formatter, "[{}]:{}", self.host, self.port)
        } else {
            write!(formatter, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ListenerAddress {
    type Err = AddressParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (host, port) = input
            .rsplit_once(':')
            .ok_or_else(|| AddressParseError::MissingPort(input.to_string()))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(AddressParseError::MissingHost(input.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| AddressParseError::InvalidPort(input.to_string()))?;
        Ok(Self::new(host, port))
    }
}

/// Errors encountered while parsing a [`ListenerAddress`] from text.
#[derive(Debug, Error)]
pub enum AddressParseError {
    /// Host component was empty.
    #[error("missing host in '{0}'")]
    MissingHost(String),
    /// Port separator was absent.
    #[error("missing port in '{0}'")]
    MissingPort(String),
    /// Port was not a valid `u16`.
    #[error("invalid port in '{0}'")]
    InvalidPort(String),
}
