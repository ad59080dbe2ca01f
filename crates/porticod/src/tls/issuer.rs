//! Certificate issuance collaborators.

use async_trait::async_trait;

use super::credentials::SecureContext;
use super::errors::IssuanceError;

/// Provisions a key and certificate for a domain.
///
/// Production deployments plug in an ACME client here; the daemon only relies
/// on the returned PEM pair.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CertificateIssuer: Send + Sync {
    /// Issues or renews a certificate for `domain`.
    async fn provision(&self, domain: &str) -> Result<SecureContext, IssuanceError>;
}

/// Issuer that signs certificates with a freshly generated key.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelfSignedIssuer;

impl SelfSignedIssuer {
    /// Builds the issuer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CertificateIssuer for SelfSignedIssuer {
    async fn provision(&self, domain: &str) -> Result<SecureContext, IssuanceError> {
        let generated =
            rcgen::generate_simple_self_signed(vec![domain.to_owned()]).map_err(|source| {
                IssuanceError::Generate {
                    domain: domain.to_owned(),
                    source,
                }
            })?;
        Ok(SecureContext::new(
            generated.key_pair.serialize_pem(),
            generated.cert.pem(),
        ))
    }
}
