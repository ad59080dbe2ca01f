//! Error types for secure context acquisition and installation.

use std::io;
use std::path::PathBuf;

use portico_config::CredentialPathsError;
use thiserror::Error;

/// Errors raised while reading or writing the persisted credential pair.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Reading a credential file failed.
    #[error("failed to read credential file '{path}': {source}", path = path.display())]
    Read {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing or renaming a credential file failed.
    #[error("failed to write credential file '{path}': {source}", path = path.display())]
    Write {
        /// File that could not be written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The credential directory could not be created.
    #[error(transparent)]
    Directory(#[from] CredentialPathsError),
}

/// Errors reported by a certificate issuer.
#[derive(Debug, Error)]
pub enum IssuanceError {
    /// The issuing authority or its transport failed.
    #[error("certificate provisioning for '{domain}' failed: {message}")]
    Provider {
        /// Domain the certificate was requested for.
        domain: String,
        /// Issuer-supplied description.
        message: String,
    },
    /// Local certificate generation failed.
    #[error("failed to generate certificate for '{domain}': {source}")]
    Generate {
        /// Domain the certificate was generated for.
        domain: String,
        /// Underlying generator error.
        #[source]
        source: rcgen::Error,
    },
}

impl IssuanceError {
    /// Builds a provider failure.
    #[must_use]
    pub fn provider(domain: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            domain: domain.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by the secure context manager.
#[derive(Debug, Error)]
pub enum TlsError {
    /// Persisted credentials could not be read or written.
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    /// Issuing a new certificate failed.
    #[error(transparent)]
    Issuance(#[from] IssuanceError),
    /// The certificate chain could not be parsed.
    #[error("invalid certificate: {message}")]
    Certificate {
        /// Parser diagnostic.
        message: String,
    },
    /// The private key could not be parsed or is unsupported.
    #[error("invalid private key: {message}")]
    PrivateKey {
        /// Parser diagnostic.
        message: String,
    },
    /// The private key does not belong to the leaf certificate.
    #[error("private key does not match the certificate: {message}")]
    KeyMismatch {
        /// Consistency check diagnostic.
        message: String,
    },
    /// Building the server configuration failed.
    #[error("failed to build TLS configuration: {source}")]
    Config {
        /// Underlying rustls error.
        #[source]
        source: rustls::Error,
    },
}
