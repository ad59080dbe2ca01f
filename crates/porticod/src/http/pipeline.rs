//! The gateway that every listener hands requests to.

use std::sync::Arc;

use async_trait::async_trait;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::{Request, StatusCode, Uri};
use portico_config::{AdminPaths, Config};
use tracing::debug;

use super::auth::AuthorizationGate;
use super::routes::SharedRoutes;
use super::{HttpRequest, responses};
use crate::health::HealthReporter;
use crate::mesh::{self, MeshAttachment};
use crate::reload::{ReloadCoordinator, ReloadError, ReloadOutcome};
use crate::state::{RedirectFlag, ShutdownState};
use crate::tls::SecureContextManager;
use crate::transport::{ConnectionHandler, ConnectionInfo, HttpResponse, ListenerKind};

const HTTP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::http");

const RESET_BODY: &str = "reload status reset...try again";
const RELOADED_BODY: &str = "<h1>hot reload complete</h1>";
const CLUSTER_RELOAD_BODY: &str = "<h1>starting cluster reload</h1>";
const CERT_RELOADED_BODY: &str = "certificate reloaded";

/// Values the pipeline reads from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Domain used in redirect locations.
    pub domain: String,
    /// Port of the secure listener used in redirect locations.
    pub https_port: u16,
    /// Whether the secure listener exists.
    pub tls_enabled: bool,
    /// Administrative paths.
    pub admin: AdminPaths,
}

impl GatewaySettings {
    /// Extracts the pipeline settings from `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            domain: config.domain().to_owned(),
            https_port: config.https_port(),
            tls_enabled: config.tls_enabled(),
            admin: AdminPaths::from_config(config),
        }
    }

    /// Secure URL for `uri` on the configured domain and port.
    #[must_use]
    pub fn secure_location(&self, uri: &Uri) -> String {
        let path = uri
            .path_and_query()
            .map_or("/", |path_and_query| path_and_query.as_str());
        format!("https://{}:{}{}", self.domain, self.https_port, path)
    }
}

/// Collaborators assembled into a [`Gateway`].
pub struct GatewayParts {
    /// Configuration-derived settings.
    pub settings: GatewaySettings,
    /// Process-wide shutdown marker.
    pub shutdown: Arc<ShutdownState>,
    /// Process-wide redirect flag.
    pub redirect: Arc<RedirectFlag>,
    /// Mesh upgrades, when enabled.
    pub mesh: Option<MeshAttachment>,
    /// Credential manager; absent without TLS.
    pub contexts: Option<Arc<SecureContextManager>>,
    /// Hot reload coordinator.
    pub reload: Arc<ReloadCoordinator>,
    /// Authorization policy for routed requests.
    pub auth: Arc<dyn AuthorizationGate>,
    /// Live route table.
    pub routes: Arc<SharedRoutes>,
    /// Lifecycle event sink.
    pub reporter: Arc<dyn HealthReporter>,
}

/// Runs the request pipeline.
pub struct Gateway {
    parts: GatewayParts,
}

impl Gateway {
    /// Assembles a gateway.
    #[must_use]
    pub fn new(parts: GatewayParts) -> Self {
        Self { parts }
    }

    /// Pipeline settings.
    #[must_use]
    pub fn settings(&self) -> &GatewaySettings {
        &self.parts.settings
    }

    /// Runs a buffered request through every stage.
    pub async fn dispatch(&self, request: HttpRequest, connection: ConnectionInfo) -> HttpResponse {
        let parts = &self.parts;
        if parts.shutdown.is_shutting_down() {
            return responses::draining();
        }

        if connection.kind == ListenerKind::Plain
            && parts.settings.tls_enabled
            && parts.redirect.is_enabled()
        {
            let location = parts.settings.secure_location(request.uri());
            return responses::moved_permanently(&location);
        }

        if let Some(attachment) = &parts.mesh
            && attachment.listener() == connection.kind
            && mesh::is_upgrade_request(&request)
        {
            return attachment.accept(request, connection.peer);
        }

        if let Some(response) = self.admin(&request).await {
            return response;
        }

        if let Err(denied) = parts.auth.authorize(&request).await {
            return denied;
        }

        let table = parts.routes.load();
        match table.resolve(request.method(), request.uri().path()) {
            Some((handler, params)) => handler.handle(request, params).await,
            None => responses::not_found(),
        }
    }

    async fn admin(&self, request: &HttpRequest) -> Option<HttpResponse> {
        let admin = &self.parts.settings.admin;
        let path = request.uri().path();
        if path == admin.reload_reset() {
            Some(self.reset_reload().await)
        } else if path == admin.reload() {
            Some(self.reload().await)
        } else if path == admin.cert_reload() {
            let contexts = self.parts.contexts.as_ref()?;
            Some(self.refresh_certificate(contexts).await)
        } else {
            None
        }
    }

    async fn reload(&self) -> HttpResponse {
        let reporter = &self.parts.reporter;
        match self.parts.reload.reload().await {
            Ok(outcome) => {
                reporter.reload_completed(outcome);
                match outcome {
                    ReloadOutcome::Reloaded { .. } => responses::html(RELOADED_BODY),
                    ReloadOutcome::ClusterRestartRequested => responses::html(CLUSTER_RELOAD_BODY),
                }
            }
            Err(error) => {
                reporter.reload_failed(&error);
                let status = match error {
                    ReloadError::InProgress => StatusCode::CONFLICT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                responses::text(status, error.to_string())
            }
        }
    }

    async fn reset_reload(&self) -> HttpResponse {
        match self.parts.reload.reset().await {
            Ok(()) => responses::text(StatusCode::OK, RESET_BODY),
            Err(error) => {
                self.parts.reporter.reload_failed(&error);
                responses::text(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
        }
    }

    async fn refresh_certificate(&self, contexts: &SecureContextManager) -> HttpResponse {
        match contexts.refresh().await {
            Ok(()) => {
                self.parts.reporter.context_installed(contexts.domain());
                responses::text(StatusCode::OK, CERT_RELOADED_BODY)
            }
            Err(error) => {
                self.parts.reporter.context_failed(&error);
                responses::text(StatusCode::BAD_GATEWAY, error.to_string())
            }
        }
    }
}

#[async_trait]
impl ConnectionHandler for Gateway {
    async fn handle(
        &self,
        request: Request<Incoming>,
        connection: ConnectionInfo,
    ) -> HttpResponse {
        let (head, body) = request.into_parts();
        match body.collect().await {
            Ok(collected) => {
                let buffered = Request::from_parts(head, collected.to_bytes());
                self.dispatch(buffered, connection).await
            }
            Err(error) => {
                debug!(
                    target: HTTP_TARGET,
                    peer = %connection.peer,
                    error = %error,
                    "failed to read request body"
                );
                responses::text(StatusCode::BAD_REQUEST, "Bad Request")
            }
        }
    }
}
