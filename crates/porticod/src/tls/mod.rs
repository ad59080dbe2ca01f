//! Secure context management for the TLS listener.
//!
//! Credentials live as a PEM pair on disk. The [`SecureContextManager`]
//! decides whether to reuse that pair or ask a [`CertificateIssuer`] for a
//! new one, and installs the result into a [`SwappableCertResolver`] so the
//! running listener picks it up without rebinding.

mod credentials;
mod errors;
mod issuer;
mod manager;
mod resolver;

pub use credentials::{CredentialStore, SecureContext};
pub use errors::{CredentialError, IssuanceError, TlsError};
#[cfg(test)]
pub use issuer::MockCertificateIssuer;
pub use issuer::{CertificateIssuer, SelfSignedIssuer};
pub use manager::SecureContextManager;
pub use resolver::{SwappableCertResolver, server_config};

pub(crate) const TLS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::tls");
