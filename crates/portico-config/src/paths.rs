//! Derives credential and administrative paths shared by the daemon modules.
//!
//! The credential directory houses the persisted private key and certificate.
//! Both the secure context manager and the lifecycle manager need to agree on
//! the file layout so renewal overwrites exactly what startup reads.

use std::fs::DirBuilder;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::Config;

/// File name of the persisted private key.
pub const KEY_FILE_NAME: &str = "privatekey.pem";

/// File name of the persisted certificate chain.
pub const CERT_FILE_NAME: &str = "certificate.pem";

/// Suffix appended to the reload path to form the reset path.
pub const RELOAD_RESET_SUFFIX: &str = "-reset";

/// Canonical paths for the persisted credential pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPaths {
    dir: PathBuf,
    key_path: PathBuf,
    cert_path: PathBuf,
}

impl CredentialPaths {
    /// Derives credential paths from the shared configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::in_dir(config.cert_dir().as_std_path())
    }

    /// Derives credential paths rooted at `dir`.
    #[must_use]
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        Self {
            key_path: dir.join(KEY_FILE_NAME),
            cert_path: dir.join(CERT_FILE_NAME),
            dir,
        }
    }

    /// Directory holding the credential pair.
    pub fn dir(&self) -> &Path {
        self.dir.as_path()
    }

    /// Path to the private key.
    pub fn key_path(&self) -> &Path {
        self.key_path.as_path()
    }

    /// Path to the certificate chain.
    pub fn cert_path(&self) -> &Path {
        self.cert_path.as_path()
    }

    /// Ensures the credential directory exists with restrictive permissions.
    pub fn prepare(&self) -> Result<(), CredentialPathsError> {
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        if let Err(source) = builder.create(&self.dir)
            && source.kind() != std::io::ErrorKind::AlreadyExists
        {
            return Err(CredentialPathsError::CreateDirectory {
                path: self.dir.clone(),
                source,
            });
        }
        Ok(())
    }
}

/// Administrative HTTP paths served by the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPaths {
    reload: String,
    reload_reset: String,
    cert_reload: String,
}

impl AdminPaths {
    /// Derives administrative paths from the shared configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.reload_path(), config.cert_reload_path())
    }

    /// Builds administrative paths from explicit reload and certificate paths.
    #[must_use]
    pub fn new(reload: &str, cert_reload: &str) -> Self {
        Self {
            reload: reload.to_string(),
            reload_reset: format!("{reload}{RELOAD_RESET_SUFFIX}"),
            cert_reload: cert_reload.to_string(),
        }
    }

    /// Path that triggers a hot reload.
    #[must_use]
    pub fn reload(&self) -> &str {
        &self.reload
    }

    /// Path that clears a stuck reload.
    #[must_use]
    pub fn reload_reset(&self) -> &str {
        &self.reload_reset
    }

    /// Path that triggers a certificate refresh.
    #[must_use]
    pub fn cert_reload(&self) -> &str {
        &self.cert_reload
    }
}

/// Errors raised while preparing credential paths.
#[derive(Debug, Error)]
pub enum CredentialPathsError {
    /// Creating the credential directory failed.
    #[error("failed to prepare credential directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_credential_files_inside_directory() {
        let paths = CredentialPaths::in_dir("/var/lib/portico/cert");
        assert!(paths.key_path().ends_with(KEY_FILE_NAME));
        assert!(paths.cert_path().ends_with(CERT_FILE_NAME));
        assert_eq!(paths.dir(), Path::new("/var/lib/portico/cert"));
    }

    #[test]
    fn prepare_creates_nested_directory() {
        let temp = tempfile::tempdir().expect("temp dir");
        let paths = CredentialPaths::in_dir(temp.path().join("a").join("b"));
        paths.prepare().expect("prepare should succeed");
        assert!(paths.dir().is_dir());
        paths.prepare().expect("prepare is idempotent");
    }

    #[test]
    fn reset_path_extends_reload_path() {
        let paths = AdminPaths::new("/portico/reload", "/portico/load-cert");
        assert_eq!(paths.reload_reset(), "/portico/reload-reset");
        assert_eq!(paths.cert_reload(), "/portico/load-cert");
    }
}
