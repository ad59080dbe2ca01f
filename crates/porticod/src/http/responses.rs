//! Canned responses shared by the pipeline stages.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{CONNECTION, CONTENT_TYPE, HeaderValue, LOCATION};
use hyper::{Response, StatusCode};

use crate::transport::HttpResponse;

/// Body sent to every request while the daemon drains.
pub const DRAINING_BODY: &str = "Server is in the process of restarting.";

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";

/// Plain text response.
#[must_use]
pub fn text(status: StatusCode, body: impl Into<Bytes>) -> HttpResponse {
    with_type(status, TEXT_PLAIN, body.into())
}

/// HTML response with status 200.
#[must_use]
pub fn html(body: impl Into<Bytes>) -> HttpResponse {
    with_type(StatusCode::OK, TEXT_HTML, body.into())
}

/// JSON response.
#[must_use]
pub fn json(status: StatusCode, body: &serde_json::Value) -> HttpResponse {
    with_type(status, APPLICATION_JSON, Bytes::from(body.to_string()))
}

/// 404 for paths nothing claimed.
#[must_use]
pub fn not_found() -> HttpResponse {
    text(StatusCode::NOT_FOUND, "Not Found")
}

/// 503 answered to every request once shutdown has begun.
#[must_use]
pub fn draining() -> HttpResponse {
    let mut response = text(StatusCode::SERVICE_UNAVAILABLE, DRAINING_BODY);
    response
        .headers_mut()
        .insert(CONNECTION, HeaderValue::from_static("close"));
    response
}

/// 301 pointing at `location`.
///
/// A location that is not a valid header value yields 400 instead.
#[must_use]
pub fn moved_permanently(location: &str) -> HttpResponse {
    match HeaderValue::from_str(location) {
        Ok(value) => {
            let body = format!("Redirecting to {location}");
            let mut response = text(StatusCode::MOVED_PERMANENTLY, body);
            response.headers_mut().insert(LOCATION, value);
            response
        }
        Err(_) => text(StatusCode::BAD_REQUEST, "Bad Request"),
    }
}

fn with_type(status: StatusCode, content_type: &'static str, body: Bytes) -> HttpResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
