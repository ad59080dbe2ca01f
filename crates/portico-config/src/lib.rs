//! Layered configuration shared by the Portico daemon and its workers.
//!
//! Values resolve in increasing precedence from built-in defaults, a TOML
//! configuration file (`--config-path` or `PORTICO_CONFIG_PATH`), environment
//! variables prefixed with `PORTICO_`, and finally command-line flags. The
//! merged [`Config`] exposes typed accessors so callers never re-derive policy
//! such as "TLS is mandatory in production" on their own.

mod address;
mod defaults;
mod environment;
mod logging;
mod paths;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use address::{AddressParseError, ListenerAddress};
pub use defaults::{
    DEFAULT_API_ROOT, DEFAULT_BIND_HOST, DEFAULT_CERT_DIR, DEFAULT_CERT_RELOAD_PATH,
    DEFAULT_CHECK_IP_HOST, DEFAULT_DOMAIN, DEFAULT_HTTP_PORT, DEFAULT_HTTPS_PORT,
    DEFAULT_LOG_FILTER, DEFAULT_MESH_MAX_PAYLOAD, DEFAULT_RELOAD_PATH, default_cert_dir,
    default_environment, default_log_filter, default_log_filter_string, default_log_format,
};
pub use environment::{
    DEVELOPMENT_SHUTDOWN_GRACE, Environment, EnvironmentParseError, PRODUCTION_SHUTDOWN_GRACE,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use paths::{
    AdminPaths, CERT_FILE_NAME, CredentialPaths, CredentialPathsError, KEY_FILE_NAME,
    RELOAD_RESET_SUFFIX,
};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "PORTICO")]
pub struct Config {
    /// Port of the plain listener.
    #[ortho_config(default = DEFAULT_HTTP_PORT)]
    pub http_port: u16,
    /// Port of the secure listener.
    #[ortho_config(default = DEFAULT_HTTPS_PORT)]
    pub https_port: u16,
    /// Host both listeners bind to.
    #[ortho_config(default = DEFAULT_BIND_HOST.to_string())]
    pub bind_host: String,
    /// Fully qualified domain name used for redirects and certificate issuance.
    #[ortho_config(default = DEFAULT_DOMAIN.to_string())]
    pub domain: String,
    /// Explicit TLS toggle; production deployments always enable TLS.
    pub tls_enabled: Option<bool>,
    /// Deployment environment.
    #[ortho_config(default = default_environment())]
    pub environment: Environment,
    /// Root under which service-module routes are mounted.
    #[ortho_config(default = DEFAULT_API_ROOT.to_string())]
    pub api_root: String,
    /// Administrative hot-reload path.
    #[ortho_config(default = DEFAULT_RELOAD_PATH.to_string())]
    pub reload_path: String,
    /// Administrative certificate-reload path.
    #[ortho_config(default = DEFAULT_CERT_RELOAD_PATH.to_string())]
    pub cert_reload_path: String,
    /// Directory holding the persisted key and certificate.
    #[ortho_config(default = default_cert_dir())]
    pub cert_dir: Utf8PathBuf,
    /// Delegate reloads to the cluster manager instead of reloading in place.
    #[ortho_config(default = false)]
    pub cluster_enabled: bool,
    /// Explicit shutdown grace window in milliseconds.
    pub shutdown_grace_ms: Option<u64>,
    /// Ceiling for a single mesh message or frame in bytes.
    #[ortho_config(default = DEFAULT_MESH_MAX_PAYLOAD)]
    pub mesh_max_payload: usize,
    /// Host queried for the public address greeting.
    #[ortho_config(default = DEFAULT_CHECK_IP_HOST.to_string())]
    pub check_ip_host: String,
    /// Worker pools started with the daemon, one worker per name.
    #[ortho_config(default = Vec::new())]
    pub worker_pools: Vec<String>,
    /// Tracing filter expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            https_port: DEFAULT_HTTPS_PORT,
            bind_host: DEFAULT_BIND_HOST.to_string(),
            domain: DEFAULT_DOMAIN.to_string(),
            tls_enabled: None,
            environment: default_environment(),
            api_root: DEFAULT_API_ROOT.to_string(),
            reload_path: DEFAULT_RELOAD_PATH.to_string(),
            cert_reload_path: DEFAULT_CERT_RELOAD_PATH.to_string(),
            cert_dir: default_cert_dir(),
            cluster_enabled: false,
            shutdown_grace_ms: None,
            mesh_max_payload: DEFAULT_MESH_MAX_PAYLOAD,
            check_ip_host: DEFAULT_CHECK_IP_HOST.to_string(),
            worker_pools: Vec::new(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Address of the plain listener.
    #[must_use]
    pub fn http_address(&self) -> ListenerAddress {
        ListenerAddress::new(self.bind_host.clone(), self.http_port)
    }

    /// Address of the secure listener.
    #[must_use]
    pub fn https_address(&self) -> ListenerAddress {
        ListenerAddress::new(self.bind_host.clone(), self.https_port)
    }

    /// Port advertised in redirects to the secure listener.
    #[must_use]
    pub fn https_port(&self) -> u16 {
        self.https_port
    }

    /// Domain used for redirects and certificate issuance.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Whether the secure listener runs; always `true` in production.
    #[must_use]
    pub fn tls_enabled(&self) -> bool {
        self.environment.is_production() || self.tls_enabled.unwrap_or(false)
    }

    /// Deployment environment.
    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Root under which service-module routes are mounted.
    #[must_use]
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// Administrative hot-reload path.
    #[must_use]
    pub fn reload_path(&self) -> &str {
        &self.reload_path
    }

    /// Administrative certificate-reload path.
    #[must_use]
    pub fn cert_reload_path(&self) -> &str {
        &self.cert_reload_path
    }

    /// Directory holding the persisted credential pair.
    #[must_use]
    pub fn cert_dir(&self) -> &Utf8Path {
        &self.cert_dir
    }

    /// Whether reloads are delegated to the cluster manager.
    #[must_use]
    pub fn cluster_enabled(&self) -> bool {
        self.cluster_enabled
    }

    /// Grace window granted to open connections during shutdown.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace_ms
            .map_or_else(|| self.environment.shutdown_grace(), Duration::from_millis)
    }

    /// Ceiling for a single mesh message or frame.
    #[must_use]
    pub fn mesh_max_payload(&self) -> usize {
        self.mesh_max_payload
    }

    /// Host queried for the public address greeting.
    #[must_use]
    pub fn check_ip_host(&self) -> &str {
        &self.check_ip_host
    }

    /// Names of the worker pools to start.
    #[must_use]
    pub fn worker_pools(&self) -> &[String] {
        &self.worker_pools
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_forces_tls() {
        let config = Config {
            environment: Environment::Production,
            tls_enabled: Some(false),
            ..Config::default()
        };
        assert!(config.tls_enabled());
    }

    #[test]
    fn development_honours_tls_toggle() {
        let mut config = Config::default();
        assert!(!config.tls_enabled());
        config.tls_enabled = Some(true);
        assert!(config.tls_enabled());
    }

    #[test]
    fn explicit_grace_overrides_environment() {
        let config = Config {
            shutdown_grace_ms: Some(250),
            ..Config::default()
        };
        assert_eq!(config.shutdown_grace(), Duration::from_millis(250));
        assert_eq!(
            Config::default().shutdown_grace(),
            DEVELOPMENT_SHUTDOWN_GRACE
        );
    }

    #[test]
    fn addresses_share_bind_host() {
        let config = Config {
            bind_host: "127.0.0.1".to_string(),
            http_port: 8080,
            https_port: 8443,
            ..Config::default()
        };
        assert_eq!(config.http_address().to_string(), "127.0.0.1:8080");
        assert_eq!(config.https_address().to_string(), "127.0.0.1:8443");
    }
}
