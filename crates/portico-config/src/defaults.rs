use camino::Utf8PathBuf;

/// Default port of the plain listener.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Default port of the secure listener.
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Default bind host for both listeners.
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default fully qualified domain name used for redirects and issuance.
pub const DEFAULT_DOMAIN: &str = "localhost";

/// Default root under which service-module routes are mounted.
pub const DEFAULT_API_ROOT: &str = "/portico/api";

/// Default administrative hot-reload path.
pub const DEFAULT_RELOAD_PATH: &str = "/portico/reload";

/// Default administrative certificate-reload path.
pub const DEFAULT_CERT_RELOAD_PATH: &str = "/portico/load-cert";

/// Default directory holding the persisted key and certificate.
pub const DEFAULT_CERT_DIR: &str = "cert";

/// Default ceiling for a single mesh message or frame (100 MiB).
pub const DEFAULT_MESH_MAX_PAYLOAD: usize = 104_857_600;

/// Default host queried for the public address greeting.
pub const DEFAULT_CHECK_IP_HOST: &str = "checkip.amazonaws.com";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Default deployment environment.
pub fn default_environment() -> crate::environment::Environment {
    crate::environment::Environment::Development
}

/// Default credential directory.
pub fn default_cert_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_CERT_DIR)
}
