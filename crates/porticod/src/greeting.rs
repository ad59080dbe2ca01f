//! Public address discovery for the startup greeting.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::{StatusCode, Uri};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use portico_config::Config;
use thiserror::Error;
use tracing::{info, warn};

use crate::transport::ListenerKind;

const GREETING_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::greeting");
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);
const LOCAL_HOST: &str = "localhost";

/// Errors raised while discovering the public address.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The lookup host does not form a valid URI.
    #[error("invalid lookup address '{address}': {source}")]
    Uri {
        /// Address that failed to parse.
        address: String,
        /// Parser failure.
        #[source]
        source: hyper::http::uri::InvalidUri,
    },
    /// The request could not be completed.
    #[error("address lookup failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),
    /// The response body could not be read.
    #[error("failed to read lookup response: {0}")]
    Body(#[from] hyper::Error),
    /// The lookup answered with a non-success status.
    #[error("address lookup answered {status}")]
    Status {
        /// Status returned by the lookup host.
        status: StatusCode,
    },
    /// The lookup did not answer in time.
    #[error("address lookup timed out after {timeout:?}")]
    Timeout {
        /// Deadline that elapsed.
        timeout: Duration,
    },
}

/// Discovers the address the daemon is reachable on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AddressLookup: Send + Sync {
    /// Returns the public host name or IP address.
    async fn public_address(&self) -> Result<String, LookupError>;
}

/// Asks an echo service over plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpAddressLookup {
    host: String,
}

impl HttpAddressLookup {
    /// Creates a lookup against `host`.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Creates a lookup against the configured echo host.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.check_ip_host())
    }
}

#[async_trait]
impl AddressLookup for HttpAddressLookup {
    async fn public_address(&self) -> Result<String, LookupError> {
        let address = format!("http://{}/", self.host);
        let uri: Uri = address
            .parse()
            .map_err(|source| LookupError::Uri { address, source })?;
        let client = Client::builder(TokioExecutor::new()).build_http::<Empty<Bytes>>();
        let exchange = async {
            let response = client.get(uri).await?;
            let status = response.status();
            if !status.is_success() {
                return Err(LookupError::Status { status });
            }
            let body = response.into_body().collect().await?.to_bytes();
            Ok(String::from_utf8_lossy(&body).trim().to_owned())
        };
        tokio::time::timeout(LOOKUP_TIMEOUT, exchange)
            .await
            .map_err(|_| LookupError::Timeout {
                timeout: LOOKUP_TIMEOUT,
            })?
    }
}

/// Resolves the host to greet with; `localhost` in the local environment.
///
/// # Errors
///
/// Propagates the lookup failure.
pub async fn greeting_host(
    config: &Config,
    lookup: &dyn AddressLookup,
) -> Result<String, LookupError> {
    if config.environment().is_local() {
        return Ok(LOCAL_HOST.to_owned());
    }
    lookup.public_address().await
}

/// Logs the address the listener of `kind` is reachable on.
///
/// Failures are logged and otherwise ignored.
pub async fn greet(config: &Config, lookup: &dyn AddressLookup, kind: ListenerKind, port: u16) {
    let scheme = match kind {
        ListenerKind::Plain => "http",
        ListenerKind::Secure => "https",
    };
    match greeting_host(config, lookup).await {
        Ok(host) => info!(
            target: GREETING_TARGET,
            url = %format!("{scheme}://{host}:{port}"),
            "server listening"
        ),
        Err(error) => warn!(
            target: GREETING_TARGET,
            error = %error,
            "could not discover public address"
        ),
    }
}
