//! SNI resolver whose certificate can be replaced while serving.

use std::sync::{Arc, PoisonError, RwLock};

use rustls::ServerConfig;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;

use super::errors::TlsError;

const ALPN_H2: &[u8] = b"h2";
const ALPN_HTTP11: &[u8] = b"http/1.1";

/// Hands every handshake the currently installed certificate.
///
/// Handshakes already underway keep the key they resolved; later handshakes
/// see the replacement.
#[derive(Debug, Default)]
pub struct SwappableCertResolver {
    current: RwLock<Option<Arc<CertifiedKey>>>,
}

impl SwappableCertResolver {
    /// Creates a resolver with nothing installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Swaps in `key` as a whole.
    pub fn replace(&self, key: Arc<CertifiedKey>) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Some(key);
    }

    /// Currently installed key, if any.
    #[must_use]
    pub fn current(&self) -> Option<Arc<CertifiedKey>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ResolvesServerCert for SwappableCertResolver {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        self.current()
    }
}

/// Builds the secure listener's configuration around `resolver`.
///
/// # Errors
///
/// Returns [`TlsError::Config`] when the protocol versions are rejected by
/// the crypto provider.
pub fn server_config(resolver: Arc<SwappableCertResolver>) -> Result<Arc<ServerConfig>, TlsError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|source| TlsError::Config { source })?
        .with_no_client_auth()
        .with_cert_resolver(resolver);
    config.alpn_protocols = vec![ALPN_H2.to_vec(), ALPN_HTTP11.to_vec()];
    Ok(Arc::new(config))
}
