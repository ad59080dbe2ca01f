//! Test helpers for the transport module.

use std::net::SocketAddr;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::{ConnectionHandler, ConnectionInfo, HttpResponse};

pub(crate) struct CountingHandler {
    count: Arc<AtomicUsize>,
}

impl CountingHandler {
    pub(crate) fn new() -> (Arc<AtomicUsize>, Arc<Self>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(Self {
            count: Arc::clone(&count),
        });
        (count, handler)
    }
}

#[async_trait]
impl ConnectionHandler for CountingHandler {
    async fn handle(
        &self,
        _request: Request<Incoming>,
        connection: ConnectionInfo,
    ) -> HttpResponse {
        self.count.fetch_add(1, Ordering::SeqCst);
        Response::new(Full::new(Bytes::from(format!("ok {}", connection.kind))))
    }
}

/// Reads from `stream` until the received text ends with `suffix`.
///
/// Used on keep-alive connections where the server does not hang up.
pub(crate) async fn read_response_ending(
    stream: &mut TcpStream,
    suffix: &str,
) -> std::io::Result<String> {
    let mut received = Vec::new();
    let mut chunk = [0_u8; 1024];
    loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            let partial = String::from_utf8_lossy(&received).into_owned();
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("connection closed after {partial:?}"),
            ));
        }
        received.extend_from_slice(chunk.get(..read).unwrap_or_default());
        let text = String::from_utf8_lossy(&received);
        if text.ends_with(suffix) {
            return Ok(text.into_owned());
        }
    }
}

/// Writes `request` verbatim and returns everything the server sent back.
pub(crate) async fn send_raw_request(addr: SocketAddr, request: &str) -> std::io::Result<String> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(request.as_bytes()).await?;
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;
    Ok(String::from_utf8_lossy(&response).into_owned())
}
