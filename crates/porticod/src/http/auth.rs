//! Authorization seam in front of the route table.

use async_trait::async_trait;

use super::HttpRequest;
use crate::transport::HttpResponse;

/// Decides whether a request may reach the route table.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthorizationGate: Send + Sync {
    /// Returns `Ok(())` to continue or the response that ends the request.
    async fn authorize(&self, request: &HttpRequest) -> Result<(), HttpResponse>;
}

/// Gate that admits every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

#[async_trait]
impl AuthorizationGate for AllowAll {
    async fn authorize(&self, _request: &HttpRequest) -> Result<(), HttpResponse> {
        Ok(())
    }
}
