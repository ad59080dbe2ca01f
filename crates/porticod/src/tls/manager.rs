//! Acquires, renews and installs the live secure context.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::state::RedirectFlag;

use super::TLS_TARGET;
use super::credentials::{CredentialStore, SecureContext};
use super::errors::TlsError;
use super::issuer::CertificateIssuer;
use super::resolver::SwappableCertResolver;

/// Owns the credential lifecycle for one domain.
pub struct SecureContextManager {
    domain: String,
    store: CredentialStore,
    issuer: Arc<dyn CertificateIssuer>,
    redirect: Arc<RedirectFlag>,
    resolver: Arc<SwappableCertResolver>,
    renewal: Mutex<()>,
}

impl SecureContextManager {
    /// Creates a manager; nothing is installed until [`Self::install`] runs.
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        store: CredentialStore,
        issuer: Arc<dyn CertificateIssuer>,
        redirect: Arc<RedirectFlag>,
    ) -> Self {
        Self {
            domain: domain.into(),
            store,
            issuer,
            redirect,
            resolver: Arc::new(SwappableCertResolver::new()),
            renewal: Mutex::new(()),
        }
    }

    /// Domain certificates are issued for.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Resolver the secure listener consults on every handshake.
    #[must_use]
    pub fn resolver(&self) -> Arc<SwappableCertResolver> {
        Arc::clone(&self.resolver)
    }

    /// Returns a usable key and certificate pair.
    ///
    /// Without `renew`, a complete persisted pair is returned as is when its
    /// key matches its certificate. Otherwise the issuer is asked for a new
    /// pair, which is validated and persisted before it is returned.
    /// Redirects are suspended for the duration of the issuer call.
    /// Overlapping calls run one at a time.
    ///
    /// # Errors
    ///
    /// Returns [`TlsError`] when reading, issuing, validating or persisting
    /// fails; the persisted files are left untouched in the first three
    /// cases.
    pub async fn acquire(&self, renew: bool) -> Result<SecureContext, TlsError> {
        let _serial = self.renewal.lock().await;
        self.acquire_locked(renew).await
    }

    async fn acquire_locked(&self, renew: bool) -> Result<SecureContext, TlsError> {
        if !renew && let Some(existing) = self.store.load()? {
            match existing.certified_key() {
                Ok(_) => return Ok(existing),
                Err(error) => warn!(
                    target: TLS_TARGET,
                    domain = %self.domain,
                    error = %error,
                    "persisted credentials unusable; requesting a new pair"
                ),
            }
        }

        info!(
            target: TLS_TARGET,
            domain = %self.domain,
            renew,
            "requesting certificate"
        );
        let issued = {
            let _suspended = self.redirect.suspend();
            self.issuer.provision(&self.domain).await
        };
        let context = issued.inspect_err(|error| {
            warn!(
                target: TLS_TARGET,
                domain = %self.domain,
                error = %error,
                "certificate request failed"
            );
        })?;
        context.certified_key()?;
        self.store.persist(&context)?;
        Ok(context)
    }

    /// Makes `context` the live certificate for new handshakes.
    ///
    /// # Errors
    ///
    /// Returns [`TlsError`] when the PEM material cannot be parsed; the
    /// previous context stays live.
    pub fn install(&self, context: &SecureContext) -> Result<(), TlsError> {
        let key = context.certified_key()?;
        self.resolver.replace(key);
        info!(
            target: TLS_TARGET,
            domain = %self.domain,
            "secure context installed"
        );
        Ok(())
    }

    /// Renews the certificate and swaps it in.
    ///
    /// The swap happens before the next renewal may start, so the live
    /// context always matches the persisted pair.
    ///
    /// # Errors
    ///
    /// See [`Self::acquire`]; on failure the previous context stays live.
    pub async fn refresh(&self) -> Result<(), TlsError> {
        let _serial = self.renewal.lock().await;
        let context = self.acquire_locked(true).await?;
        self.install(&context)
    }
}

impl std::fmt::Debug for SecureContextManager {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SecureContextManager")
            .field("domain", &self.domain)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
