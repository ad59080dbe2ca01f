//! TCP listeners for the plain and secure HTTP endpoints.
//!
//! The transport module binds configured addresses, accepts connections in
//! a background task, optionally terminates TLS and hands each request to a
//! [`ConnectionHandler`]. Stopping a listener closes the socket first and
//! then keeps serving open connections until they end or are force-closed.

mod connection;
mod errors;
mod handler;
mod listener;
#[cfg(test)]
mod listener_tests;
#[cfg(test)]
mod test_utils;

pub use self::errors::ListenerError;
pub use self::handler::{ConnectionHandler, ConnectionInfo, HttpResponse, ListenerKind};
pub use self::listener::{HttpListener, ListenerCloser, ListenerHandle};
#[cfg(test)]
pub(crate) use self::test_utils::{CountingHandler, read_response_ending, send_raw_request};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
