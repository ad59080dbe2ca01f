//! Service mesh attachment.
//!
//! Mesh peers share a listener with the REST surface. Requests asking for a
//! WebSocket upgrade are answered with `101 Switching Protocols` and, once
//! hyper hands over the raw connection, the socket is registered with a
//! [`MeshRegistry`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;
use hyper::header::{
    CONNECTION, HeaderMap, HeaderValue, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY,
    SEC_WEBSOCKET_VERSION, UPGRADE,
};
use hyper::upgrade::Upgraded;
use hyper::{Method, StatusCode};
use hyper_util::rt::TokioIo;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::{Role, WebSocketConfig};
use tracing::{debug, info, warn};

use crate::http::{HttpRequest, responses};
use crate::transport::{HttpResponse, ListenerKind};

const MESH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::mesh");
const WEBSOCKET_VERSION: &str = "13";

/// WebSocket carried over an upgraded HTTP connection.
pub type MeshSocket = WebSocketStream<TokioIo<Upgraded>>;

/// Upgraded connection handed to the registry.
#[derive(Debug)]
pub struct MeshConnection {
    /// Open WebSocket.
    pub socket: MeshSocket,
    /// Remote address of the peer.
    pub peer: SocketAddr,
    /// Request path the peer upgraded on.
    pub path: String,
}

/// Receives upgraded mesh connections.
#[async_trait]
pub trait MeshRegistry: Send + Sync {
    /// Takes ownership of a new mesh connection.
    async fn attach(&self, connection: MeshConnection);
}

/// Registry that keeps peers connected and logs their traffic.
#[derive(Debug, Default)]
pub struct LoggingMeshRegistry {
    active: AtomicUsize,
}

impl LoggingMeshRegistry {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of peers currently connected.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MeshRegistry for LoggingMeshRegistry {
    async fn attach(&self, connection: MeshConnection) {
        let MeshConnection {
            mut socket,
            peer,
            path,
        } = connection;
        let peers = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        info!(target: MESH_TARGET, %peer, path = %path, peers, "mesh peer attached");
        while let Some(frame) = socket.next().await {
            match frame {
                Ok(message) => debug!(
                    target: MESH_TARGET,
                    %peer,
                    bytes = message.len(),
                    "mesh message received"
                ),
                Err(error) => {
                    debug!(target: MESH_TARGET, %peer, error = %error, "mesh read failed");
                    break;
                }
            }
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        info!(target: MESH_TARGET, %peer, "mesh peer detached");
    }
}

/// Upgrades mesh requests on one listener.
#[derive(Clone)]
pub struct MeshAttachment {
    registry: Arc<dyn MeshRegistry>,
    config: WebSocketConfig,
    listener: ListenerKind,
}

impl MeshAttachment {
    /// Serves upgrades on `listener`, bounding messages and frames to
    /// `max_payload` bytes.
    #[must_use]
    pub fn new(
        registry: Arc<dyn MeshRegistry>,
        max_payload: usize,
        listener: ListenerKind,
    ) -> Self {
        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(max_payload);
        config.max_frame_size = Some(max_payload);
        Self {
            registry,
            config,
            listener,
        }
    }

    /// Listener the attachment serves.
    #[must_use]
    pub fn listener(&self) -> ListenerKind {
        self.listener
    }

    /// Limits applied to upgraded sockets.
    #[must_use]
    pub fn websocket_config(&self) -> &WebSocketConfig {
        &self.config
    }

    /// Completes the handshake and hands the connection to the registry
    /// once hyper releases it.
    #[must_use]
    pub fn accept(&self, mut request: HttpRequest, peer: SocketAddr) -> HttpResponse {
        let headers = request.headers();
        if !header_is(headers, &SEC_WEBSOCKET_VERSION, WEBSOCKET_VERSION) {
            let mut response = responses::text(
                StatusCode::UPGRADE_REQUIRED,
                "unsupported WebSocket version",
            );
            response.headers_mut().insert(
                SEC_WEBSOCKET_VERSION,
                HeaderValue::from_static(WEBSOCKET_VERSION),
            );
            return response;
        }
        let Some(key) = headers.get(SEC_WEBSOCKET_KEY) else {
            return responses::text(StatusCode::BAD_REQUEST, "missing Sec-WebSocket-Key");
        };
        let Ok(accept) = HeaderValue::from_str(&derive_accept_key(key.as_bytes())) else {
            return responses::text(StatusCode::BAD_REQUEST, "invalid Sec-WebSocket-Key");
        };

        let path = request.uri().path().to_owned();
        let on_upgrade = hyper::upgrade::on(&mut request);
        let registry = Arc::clone(&self.registry);
        let config = self.config.clone();
        tokio::spawn(async move {
            match on_upgrade.await {
                Ok(upgraded) => {
                    let socket = WebSocketStream::from_raw_socket(
                        TokioIo::new(upgraded),
                        Role::Server,
                        Some(config),
                    )
                    .await;
                    registry.attach(MeshConnection { socket, peer, path }).await;
                }
                Err(error) => warn!(
                    target: MESH_TARGET,
                    %peer,
                    error = %error,
                    "mesh upgrade failed"
                ),
            }
        });

        let mut response = responses::text(StatusCode::SWITCHING_PROTOCOLS, "");
        let response_headers = response.headers_mut();
        response_headers.remove(hyper::header::CONTENT_TYPE);
        response_headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
        response_headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
        response_headers.insert(SEC_WEBSOCKET_ACCEPT, accept);
        response
    }
}

impl std::fmt::Debug for MeshAttachment {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("MeshAttachment")
            .field("listener", &self.listener)
            .field("max_message_size", &self.config.max_message_size)
            .finish_non_exhaustive()
    }
}

/// Returns `true` for a WebSocket upgrade request.
#[must_use]
pub fn is_upgrade_request(request: &HttpRequest) -> bool {
    let headers = request.headers();
    *request.method() == Method::GET
        && header_is(headers, &UPGRADE, "websocket")
        && headers
            .get_all(CONNECTION)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
}

fn header_is(headers: &HeaderMap, name: &hyper::header::HeaderName, expected: &str) -> bool {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case(expected))
}
