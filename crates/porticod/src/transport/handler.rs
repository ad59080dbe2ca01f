//! Request handling abstractions for the listeners.

use std::fmt;
use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};

/// Response type produced by every handler.
pub type HttpResponse = Response<Full<Bytes>>;

/// Which listener accepted a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    /// Unencrypted listener.
    Plain,
    /// TLS listener.
    Secure,
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Plain => "plain",
            Self::Secure => "secure",
        })
    }
}

/// Facts about the connection a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Listener that accepted the connection.
    pub kind: ListenerKind,
    /// Remote address of the client.
    pub peer: SocketAddr,
}

/// Handles requests accepted by a listener.
#[async_trait]
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Produces the response for one request. Implementations should avoid
    /// panicking; a panic drops the connection.
    async fn handle(
        &self,
        request: Request<Incoming>,
        connection: ConnectionInfo,
    ) -> HttpResponse;
}
