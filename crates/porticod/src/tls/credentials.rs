//! Persisted key and certificate pair.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use portico_config::CredentialPaths;
use rustls::pki_types::CertificateDer;
use rustls::sign::CertifiedKey;
use tracing::debug;

use super::TLS_TARGET;
use super::errors::{CredentialError, TlsError};

const KEY_MODE: u32 = 0o600;
const CERT_MODE: u32 = 0o644;

/// PEM encoded private key and certificate chain.
#[derive(Clone, PartialEq, Eq)]
pub struct SecureContext {
    key_pem: String,
    cert_pem: String,
}

impl SecureContext {
    /// Wraps a PEM key and certificate chain.
    #[must_use]
    pub fn new(key_pem: impl Into<String>, cert_pem: impl Into<String>) -> Self {
        Self {
            key_pem: key_pem.into(),
            cert_pem: cert_pem.into(),
        }
    }

    /// PEM encoded private key.
    #[must_use]
    pub fn key_pem(&self) -> &str {
        &self.key_pem
    }

    /// PEM encoded certificate chain.
    #[must_use]
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    /// Parses the pair into the form rustls serves.
    ///
    /// # Errors
    ///
    /// Returns [`TlsError::Certificate`] or [`TlsError::PrivateKey`] when the
    /// PEM material is malformed or the key type is unsupported, and
    /// [`TlsError::KeyMismatch`] when the key does not belong to the leaf
    /// certificate.
    pub fn certified_key(&self) -> Result<Arc<CertifiedKey>, TlsError> {
        let certs = rustls_pemfile::certs(&mut self.cert_pem.as_bytes())
            .collect::<Result<Vec<CertificateDer<'static>>, _>>()
            .map_err(|error| TlsError::Certificate {
                message: error.to_string(),
            })?;
        if certs.is_empty() {
            return Err(TlsError::Certificate {
                message: "no certificate found in PEM input".to_owned(),
            });
        }
        let key = rustls_pemfile::private_key(&mut self.key_pem.as_bytes())
            .map_err(|error| TlsError::PrivateKey {
                message: error.to_string(),
            })?
            .ok_or_else(|| TlsError::PrivateKey {
                message: "no private key found in PEM input".to_owned(),
            })?;
        let signing_key = rustls::crypto::ring::sign::any_supported_type(&key).map_err(
            |error| TlsError::PrivateKey {
                message: error.to_string(),
            },
        )?;
        let certified = CertifiedKey::new(certs, signing_key);
        match certified.keys_match() {
            Ok(()) | Err(rustls::Error::InconsistentKeys(rustls::InconsistentKeys::Unknown)) => {
                Ok(Arc::new(certified))
            }
            Err(error) => Err(TlsError::KeyMismatch {
                message: error.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for SecureContext {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SecureContext")
            .field("key_pem", &"<redacted>")
            .field("cert_pem_len", &self.cert_pem.len())
            .finish()
    }
}

/// Reads and writes the credential pair under the configured directory.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    paths: CredentialPaths,
}

impl CredentialStore {
    /// Creates a store over `paths`.
    #[must_use]
    pub fn new(paths: CredentialPaths) -> Self {
        Self { paths }
    }

    /// Locations of the persisted files.
    #[must_use]
    pub fn paths(&self) -> &CredentialPaths {
        &self.paths
    }

    /// Loads the pair when both files exist.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Read`] when a present file cannot be read.
    pub fn load(&self) -> Result<Option<SecureContext>, CredentialError> {
        let key_path = self.paths.key_path();
        let cert_path = self.paths.cert_path();
        if !key_path.is_file() || !cert_path.is_file() {
            return Ok(None);
        }
        let key_pem = read(key_path)?;
        let cert_pem = read(cert_path)?;
        debug!(
            target: TLS_TARGET,
            dir = %self.paths.dir().display(),
            "loaded persisted credentials"
        );
        Ok(Some(SecureContext::new(key_pem, cert_pem)))
    }

    /// Overwrites both files with `context`.
    ///
    /// Both files are first written to sibling temporary files; nothing is
    /// renamed into place until both are staged. The key file is readable by
    /// the owner only.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when the directory cannot be prepared or a
    /// file cannot be written. A staging failure leaves the previous pair
    /// untouched.
    pub fn persist(&self, context: &SecureContext) -> Result<(), CredentialError> {
        self.paths.prepare()?;
        let key = stage(self.paths.key_path(), context.key_pem(), KEY_MODE)?;
        let cert = match stage(self.paths.cert_path(), context.cert_pem(), CERT_MODE) {
            Ok(cert) => cert,
            Err(error) => {
                key.discard();
                return Err(error);
            }
        };
        if let Err(error) = key.commit() {
            cert.discard();
            return Err(error);
        }
        cert.commit()?;
        debug!(
            target: TLS_TARGET,
            dir = %self.paths.dir().display(),
            "persisted credentials"
        );
        Ok(())
    }
}

fn read(path: &Path) -> Result<String, CredentialError> {
    fs::read_to_string(path).map_err(|source| CredentialError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// A fully written temporary file waiting to be renamed over its target.
struct Staged<'a> {
    target: &'a Path,
    staging: PathBuf,
}

impl Staged<'_> {
    fn commit(self) -> Result<(), CredentialError> {
        fs::rename(&self.staging, self.target).map_err(|source| CredentialError::Write {
            path: self.target.to_path_buf(),
            source,
        })
    }

    fn discard(self) {
        if let Err(error) = fs::remove_file(&self.staging) {
            debug!(
                target: TLS_TARGET,
                path = %self.staging.display(),
                error = %error,
                "could not remove staged credential file"
            );
        }
    }
}

fn stage<'a>(target: &'a Path, contents: &str, mode: u32) -> Result<Staged<'a>, CredentialError> {
    let mut staging_name = target.as_os_str().to_owned();
    staging_name.push(".tmp");
    let staging = PathBuf::from(staging_name);
    let write_error = |source: io::Error| CredentialError::Write {
        path: target.to_path_buf(),
        source,
    };

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    if staging.exists() {
        fs::remove_file(&staging).map_err(write_error)?;
    }
    let mut file = options.open(&staging).map_err(write_error)?;
    file.write_all(contents.as_bytes()).map_err(write_error)?;
    file.sync_all().map_err(write_error)?;
    Ok(Staged { target, staging })
}
