//! Listener implementation for the HTTP endpoints.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use portico_config::ListenerAddress;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};

use super::connection::serve_stream;
use super::handler::{ConnectionHandler, ConnectionInfo, ListenerKind};
use super::{LISTENER_TARGET, ListenerError};

const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Accepting state shared by the accept loop and its connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ListenerPhase {
    Accepting,
    Draining,
    Closed,
}

/// Bound TCP listener that has not started accepting yet.
#[derive(Debug)]
pub struct HttpListener {
    listener: TcpListener,
    kind: ListenerKind,
    local_addr: SocketAddr,
}

impl HttpListener {
    /// Resolves `address` and binds to the first result.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when resolution or binding fails.
    pub async fn bind(
        address: &ListenerAddress,
        kind: ListenerKind,
    ) -> Result<Self, ListenerError> {
        let listener = bind_tcp(&address.host, address.port).await?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::LocalAddr { source })?;
        Ok(Self {
            listener,
            kind,
            local_addr,
        })
    }

    /// Address the socket is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Which endpoint this listener serves.
    #[must_use]
    pub fn kind(&self) -> ListenerKind {
        self.kind
    }

    /// Starts accepting in a background task.
    ///
    /// With `tls` set every connection completes a TLS handshake before any
    /// request is read.
    #[must_use]
    pub fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
        tls: Option<TlsAcceptor>,
    ) -> ListenerHandle {
        let (phase, observed) = watch::channel(ListenerPhase::Accepting);
        let local_addr = self.local_addr;
        let task = tokio::spawn(run_accept_loop(self, handler, tls, observed));
        ListenerHandle {
            phase: Arc::new(phase),
            task,
            local_addr,
        }
    }
}

/// Handle to a running listener.
#[derive(Debug)]
pub struct ListenerHandle {
    phase: Arc<watch::Sender<ListenerPhase>>,
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

/// Force-closes a listener whose handle is busy draining.
#[derive(Debug, Clone)]
pub struct ListenerCloser {
    phase: Arc<watch::Sender<ListenerPhase>>,
}

impl ListenerCloser {
    /// Drops every open connection, including ones with requests in flight.
    pub fn close(&self) {
        self.phase.send_replace(ListenerPhase::Closed);
    }
}

impl ListenerHandle {
    /// Address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting new sockets.
    ///
    /// Open connections keep being served until the peer hangs up or
    /// [`ListenerCloser::close`] runs.
    pub fn shutdown(&self) {
        self.phase.send_if_modified(|phase| {
            if *phase == ListenerPhase::Accepting {
                *phase = ListenerPhase::Draining;
                true
            } else {
                false
            }
        });
    }

    /// Stops accepting and drops every open connection.
    pub fn close(&self) {
        self.closer().close();
    }

    /// Returns a closer usable after the handle moved into [`Self::drained`].
    #[must_use]
    pub fn closer(&self) -> ListenerCloser {
        ListenerCloser {
            phase: Arc::clone(&self.phase),
        }
    }

    /// Waits until the socket is closed and every connection has ended.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Task`] when the accept task panicked.
    pub async fn drained(self) -> Result<(), ListenerError> {
        let Self { phase, task, .. } = self;
        let outcome = task.await;
        drop(phase);
        outcome.map_err(ListenerError::from)
    }
}

async fn run_accept_loop(
    listener: HttpListener,
    handler: Arc<dyn ConnectionHandler>,
    tls: Option<TlsAcceptor>,
    mut phase: watch::Receiver<ListenerPhase>,
) {
    let HttpListener {
        listener,
        kind,
        local_addr,
    } = listener;
    info!(
        target: LISTENER_TARGET,
        listener = %kind,
        address = %local_addr,
        "listener active"
    );

    let (tracker, mut drained) = mpsc::channel::<()>(1);
    let mut last_error = None::<io::ErrorKind>;
    loop {
        tokio::select! {
            biased;
            _ = phase.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    last_error = None;
                    let info = ConnectionInfo { kind, peer };
                    tokio::spawn(serve_stream(
                        stream,
                        info,
                        Arc::clone(&handler),
                        tls.clone(),
                        phase.clone(),
                        tracker.clone(),
                    ));
                }
                Err(error) => {
                    let error_kind = error.kind();
                    if last_error != Some(error_kind) {
                        warn!(
                            target: LISTENER_TARGET,
                            listener = %kind,
                            error = %error,
                            "socket accept error"
                        );
                    }
                    last_error = Some(error_kind);
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            },
        }
    }

    drop(listener);
    drop(tracker);
    info!(
        target: LISTENER_TARGET,
        listener = %kind,
        "listener closed; waiting for open connections"
    );
    let _ = drained.recv().await;
    info!(
        target: LISTENER_TARGET,
        listener = %kind,
        "open connections finished"
    );
}

async fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    let addr = addrs.next().ok_or_else(|| ListenerError::ResolveEmpty {
        host: host.to_owned(),
        port,
    })?;
    TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::BindTcp { addr, source })
}
