//! Request pipeline shared by the plain and secure listeners.
//!
//! Every request passes the same stages in order: the shutdown gate, the
//! redirect policy, mesh upgrades, administrative paths, the authorization
//! gate and finally the route table.

mod auth;
mod pipeline;
pub mod responses;
mod routes;

use bytes::Bytes;
use hyper::Request;

pub use self::auth::{AllowAll, AuthorizationGate};
#[cfg(test)]
pub use self::auth::MockAuthorizationGate;
pub use self::pipeline::{Gateway, GatewayParts, GatewaySettings};
#[cfg(test)]
pub use self::routes::MockRouteHandler;
pub use self::routes::{PathPattern, RouteHandler, RouteParams, RouteTable, SharedRoutes};

/// Request with its body fully buffered.
pub type HttpRequest = Request<Bytes>;
