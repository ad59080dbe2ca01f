//! Serves one accepted connection with hyper.

use std::convert::Infallible;
use std::sync::Arc;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_rustls::TlsAcceptor;
use tracing::debug;

use super::LISTENER_TARGET;
use super::handler::{ConnectionHandler, ConnectionInfo};
use super::listener::ListenerPhase;

/// Completes the optional TLS handshake, then serves HTTP on the stream.
///
/// `_tracker` is held until the connection ends so the accept loop can tell
/// when every connection has drained.
pub(super) async fn serve_stream(
    stream: TcpStream,
    info: ConnectionInfo,
    handler: Arc<dyn ConnectionHandler>,
    tls: Option<TlsAcceptor>,
    mut phase: watch::Receiver<ListenerPhase>,
    _tracker: mpsc::Sender<()>,
) {
    match tls {
        Some(acceptor) => {
            let handshake = tokio::select! {
                handshake = acceptor.accept(stream) => handshake,
                () = closed(&mut phase) => return,
            };
            match handshake {
                Ok(secured) => serve_connection(secured, info, handler, phase).await,
                Err(error) => debug!(
                    target: LISTENER_TARGET,
                    peer = %info.peer,
                    error = %error,
                    "TLS handshake failed"
                ),
            }
        }
        None => serve_connection(stream, info, handler, phase).await,
    }
}

/// Serves requests until the peer hangs up or the listener is closed.
///
/// Draining does not interrupt the connection: later requests still reach the
/// handler, which answers them while shutdown is in progress.
async fn serve_connection<IO>(
    io: IO,
    info: ConnectionInfo,
    handler: Arc<dyn ConnectionHandler>,
    mut phase: watch::Receiver<ListenerPhase>,
) where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = service_fn(move |request| {
        let handler = Arc::clone(&handler);
        async move { Ok::<_, Infallible>(handler.handle(request, info).await) }
    });
    let builder = auto::Builder::new(TokioExecutor::new());
    let connection = builder.serve_connection_with_upgrades(TokioIo::new(io), service);
    tokio::pin!(connection);

    tokio::select! {
        outcome = connection.as_mut() => {
            if let Err(error) = outcome {
                debug!(
                    target: LISTENER_TARGET,
                    peer = %info.peer,
                    listener = %info.kind,
                    error = %error,
                    "connection closed with error"
                );
            }
        }
        () = closed(&mut phase) => debug!(
            target: LISTENER_TARGET,
            peer = %info.peer,
            listener = %info.kind,
            "connection dropped by forced close"
        ),
    }
}

/// Resolves once the listener is force-closed.
///
/// A dropped listener handle leaves open connections to finish on their own.
async fn closed(phase: &mut watch::Receiver<ListenerPhase>) {
    loop {
        if *phase.borrow_and_update() == ListenerPhase::Closed {
            return;
        }
        if phase.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
