//! Tests for the HTTP listener.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};
use portico_config::ListenerAddress;
use rstest::{fixture, rstest};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::time::timeout;

use super::{
    ConnectionHandler, ConnectionInfo, CountingHandler, HttpListener, HttpResponse, ListenerError,
    ListenerKind, read_response_ending, send_raw_request,
};

const WAIT: Duration = Duration::from_secs(5);
const CLOSE_REQUEST: &str = "GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
const KEEP_ALIVE_REQUEST: &str = "GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";

#[fixture]
fn loopback() -> ListenerAddress {
    ListenerAddress::new("127.0.0.1", 0)
}

/// Handler that parks each request until released.
struct ParkedHandler {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl ConnectionHandler for ParkedHandler {
    async fn handle(
        &self,
        _request: Request<Incoming>,
        _connection: ConnectionInfo,
    ) -> HttpResponse {
        self.entered.notify_one();
        self.release.notified().await;
        Response::new(Full::new(Bytes::from_static(b"finished")))
    }
}

#[rstest]
#[tokio::test]
async fn listener_serves_requests(loopback: ListenerAddress) {
    let listener = HttpListener::bind(&loopback, ListenerKind::Plain)
        .await
        .expect("bind listener");
    let addr = listener.local_addr();
    let (count, handler) = CountingHandler::new();
    let handle = listener.start(handler, None);

    for _ in 0..2 {
        let response = timeout(WAIT, send_raw_request(addr, CLOSE_REQUEST))
            .await
            .expect("response within deadline")
            .expect("request");
        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert!(response.ends_with("ok plain"), "{response}");
    }
    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 2);

    handle.shutdown();
    timeout(WAIT, handle.drained())
        .await
        .expect("drained within deadline")
        .expect("listener task");
}

#[rstest]
#[tokio::test]
async fn occupied_port_is_reported(loopback: ListenerAddress) {
    let first = HttpListener::bind(&loopback, ListenerKind::Plain)
        .await
        .expect("bind listener");
    let taken = ListenerAddress::new("127.0.0.1", first.local_addr().port());
    let error = HttpListener::bind(&taken, ListenerKind::Secure)
        .await
        .expect_err("port already bound");
    assert!(matches!(error, ListenerError::BindTcp { .. }));
}

#[rstest]
#[tokio::test]
async fn unresolvable_host_is_reported() {
    let address = ListenerAddress::new("host.invalid", 80);
    let error = HttpListener::bind(&address, ListenerKind::Plain)
        .await
        .expect_err("resolution should fail");
    assert!(matches!(
        error,
        ListenerError::Resolve { .. } | ListenerError::ResolveEmpty { .. }
    ));
}

#[rstest]
#[tokio::test]
async fn shutdown_stops_accepting(loopback: ListenerAddress) {
    let listener = HttpListener::bind(&loopback, ListenerKind::Plain)
        .await
        .expect("bind listener");
    let addr = listener.local_addr();
    let (_count, handler) = CountingHandler::new();
    let handle = listener.start(handler, None);

    handle.shutdown();
    timeout(WAIT, handle.drained())
        .await
        .expect("drained within deadline")
        .expect("listener task");

    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[rstest]
#[tokio::test]
async fn shutdown_lets_in_flight_requests_finish(loopback: ListenerAddress) {
    let listener = HttpListener::bind(&loopback, ListenerKind::Plain)
        .await
        .expect("bind listener");
    let addr = listener.local_addr();
    let handler = Arc::new(ParkedHandler {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let handle = listener.start(handler.clone(), None);

    let client = tokio::spawn(send_raw_request(addr, CLOSE_REQUEST));
    timeout(WAIT, handler.entered.notified())
        .await
        .expect("request reached handler");

    handle.shutdown();
    let drained = tokio::spawn(handle.drained());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!drained.is_finished(), "drain must wait for the open request");

    handler.release.notify_one();
    let response = timeout(WAIT, client)
        .await
        .expect("client within deadline")
        .expect("client task")
        .expect("request");
    assert!(response.ends_with("finished"), "{response}");
    timeout(WAIT, drained)
        .await
        .expect("drained within deadline")
        .expect("join")
        .expect("listener task");
}

#[rstest]
#[tokio::test]
async fn open_connections_keep_serving_while_draining(loopback: ListenerAddress) {
    let listener = HttpListener::bind(&loopback, ListenerKind::Plain)
        .await
        .expect("bind listener");
    let addr = listener.local_addr();
    let (count, handler) = CountingHandler::new();
    let handle = listener.start(handler, None);

    let mut client = TcpStream::connect(addr).await.expect("connect");
    client
        .write_all(KEEP_ALIVE_REQUEST.as_bytes())
        .await
        .expect("first request");
    timeout(WAIT, read_response_ending(&mut client, "ok plain"))
        .await
        .expect("first response within deadline")
        .expect("first response");

    handle.shutdown();
    let drained = tokio::spawn(handle.drained());

    client
        .write_all(KEEP_ALIVE_REQUEST.as_bytes())
        .await
        .expect("second request");
    let second = timeout(WAIT, read_response_ending(&mut client, "ok plain"))
        .await
        .expect("second response within deadline")
        .expect("second response");
    assert!(second.starts_with("HTTP/1.1 200 OK"), "{second}");
    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert!(!drained.is_finished(), "drain must wait for the open connection");

    drop(client);
    timeout(WAIT, drained)
        .await
        .expect("drained within deadline")
        .expect("join")
        .expect("listener task");
    assert!(TcpStream::connect(addr).await.is_err());
}

#[rstest]
#[tokio::test]
async fn close_drops_connections_still_in_flight(loopback: ListenerAddress) {
    let listener = HttpListener::bind(&loopback, ListenerKind::Plain)
        .await
        .expect("bind listener");
    let addr = listener.local_addr();
    let handler = Arc::new(ParkedHandler {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let handle = listener.start(handler.clone(), None);

    let client = tokio::spawn(send_raw_request(addr, CLOSE_REQUEST));
    timeout(WAIT, handler.entered.notified())
        .await
        .expect("request reached handler");

    let closer = handle.closer();
    handle.shutdown();
    let drained = tokio::spawn(handle.drained());
    closer.close();

    timeout(WAIT, drained)
        .await
        .expect("drained within deadline")
        .expect("join")
        .expect("listener task");
    let response = timeout(WAIT, client)
        .await
        .expect("client within deadline")
        .expect("client task")
        .unwrap_or_default();
    assert!(!response.contains("finished"), "{response}");
}
