//! Test configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use portico_config::{Config, Environment};
use tempfile::TempDir;

use crate::bootstrap::ConfigLoader;

/// Loader that binds loopback ephemeral ports and keeps credentials in a
/// temporary directory.
pub struct TestConfigLoader {
    dir: TempDir,
    tls_enabled: bool,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temporary credential directory"),
            tls_enabled: false,
        }
    }

    /// Enables the secure listener.
    #[must_use]
    pub fn with_tls(mut self) -> Self {
        self.tls_enabled = true;
        self
    }

    /// Directory credentials are persisted in.
    #[must_use]
    pub fn cert_dir(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().join("cert"))
            .expect("temporary directory was not valid UTF-8")
    }

    /// The configuration this loader hands out.
    #[must_use]
    pub fn config(&self) -> Config {
        Config {
            http_port: 0,
            https_port: 0,
            bind_host: "127.0.0.1".to_owned(),
            tls_enabled: Some(self.tls_enabled),
            environment: Environment::Local,
            cert_dir: self.cert_dir(),
            shutdown_grace_ms: Some(500),
            ..Config::default()
        }
    }
}

impl Default for TestConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config())
    }
}

/// Loader that intentionally fails by passing invalid CLI arguments.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("porticod"),
            OsString::from("--http-port"),
            OsString::from("not-a-port"),
        ];
        Config::load_from_iter(args)
    }
}
