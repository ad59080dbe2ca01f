//! Service module that exposes worker pools over HTTP.
//!
//! `POST <api root>/<pool>/<command>` sends the JSON body to the pool's
//! worker as a command; `GET <api root>/<pool>/ping` checks liveness.
//! Pools started through [`WorkerPoolModule::spawn`] also have their event
//! channel connected: events a worker raises for the supervisor are
//! published on the supervisor bus with a `pool` field added.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use hyper::{Method, StatusCode};
use portico_worker::{
    CommandResult, Event, EventBus, LocalEventBus, PortLoader, SupervisorEvents, Worker,
    WorkerError, WorkerHandle,
};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::http::{HttpRequest, RouteHandler, RouteParams, RouteTable, responses};
use crate::reload::{ReloadError, ServiceModule};
use crate::transport::HttpResponse;

const POOLS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pools");

type Pools = Arc<BTreeMap<String, WorkerHandle>>;

/// Mounts worker pools under the API root.
#[derive(Debug, Clone)]
pub struct WorkerPoolModule {
    api_root: String,
    pools: Pools,
    event_senders: Arc<BTreeMap<String, mpsc::Sender<Event>>>,
}

impl WorkerPoolModule {
    /// Serves `workers` under `api_root`, keyed by pool name.
    ///
    /// The workers' event channels are left unconnected.
    #[must_use]
    pub fn new(
        api_root: impl Into<String>,
        workers: impl IntoIterator<Item = WorkerHandle>,
    ) -> Self {
        let pools = workers
            .into_iter()
            .map(|worker| (worker.pool().to_owned(), worker))
            .collect();
        Self {
            api_root: api_root.into().trim_end_matches('/').to_owned(),
            pools: Arc::new(pools),
            event_senders: Arc::new(BTreeMap::new()),
        }
    }

    /// Starts one worker per name in `pool_names` and connects its events.
    ///
    /// Each worker gets its own [`LocalEventBus`]. Events it raises for the
    /// supervisor are published on `supervisor` until the worker exits.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError`] when a pool name is empty or a worker exits
    /// before its event channel is connected.
    pub async fn spawn<S: AsRef<str>>(
        api_root: impl Into<String>,
        pool_names: &[S],
        ports: &dyn PortLoader,
        supervisor: Arc<dyn EventBus>,
    ) -> Result<Self, WorkerError> {
        let mut pools = BTreeMap::new();
        let mut event_senders = BTreeMap::new();
        for name in pool_names {
            let bus = Arc::new(LocalEventBus::new());
            let worker = Worker::spawn(name.as_ref(), ports, bus).await?;
            let events = worker.connect_events().await?;
            let pool = worker.pool().to_owned();
            let sender = relay_events(&pool, events, Arc::clone(&supervisor));
            event_senders.insert(pool.clone(), sender);
            pools.insert(pool, worker);
        }
        info!(
            target: POOLS_TARGET,
            pools = ?pools.keys().collect::<Vec<_>>(),
            "worker pools started"
        );
        Ok(Self {
            api_root: api_root.into().trim_end_matches('/').to_owned(),
            pools: Arc::new(pools),
            event_senders: Arc::new(event_senders),
        })
    }

    /// Names of the mounted pools.
    #[must_use]
    pub fn pool_names(&self) -> Vec<&str> {
        self.pools.keys().map(String::as_str).collect()
    }

    /// Pushes `event` into the worker serving `pool`.
    ///
    /// Returns `false` when the pool is unknown, its event channel is not
    /// connected, or the worker has exited.
    pub async fn send_event(&self, pool: &str, event: Event) -> bool {
        match self.event_senders.get(pool) {
            Some(sender) => sender.send(event).await.is_ok(),
            None => false,
        }
    }
}

fn relay_events(
    pool: &str,
    events: SupervisorEvents,
    supervisor: Arc<dyn EventBus>,
) -> mpsc::Sender<Event> {
    let (to_worker, mut from_worker) = events.split();
    let pool = pool.to_owned();
    tokio::spawn(async move {
        while let Some(event) = from_worker.recv().await {
            debug!(
                target: POOLS_TARGET,
                pool = %pool,
                event = event.name(),
                "event from worker"
            );
            supervisor.notify(event.with_field("pool", Value::String(pool.clone())));
        }
        debug!(target: POOLS_TARGET, pool = %pool, "worker event channel closed");
    });
    to_worker
}

#[async_trait]
impl ServiceModule for WorkerPoolModule {
    async fn start(&self, routes: &mut RouteTable) -> Result<(), ReloadError> {
        let pools = Arc::clone(&self.pools);
        routes
            .add(
                Method::GET,
                &format!("{}/:pool/ping", self.api_root),
                Arc::new(PingRoute {
                    pools: Arc::clone(&pools),
                }),
            )
            .add(
                Method::POST,
                &format!("{}/:pool/:command", self.api_root),
                Arc::new(CommandRoute { pools }),
            );
        Ok(())
    }

    fn clear_caches(&self) {
        debug!(target: POOLS_TARGET, "worker pool module holds no caches");
    }
}

struct CommandRoute {
    pools: Pools,
}

#[async_trait]
impl RouteHandler for CommandRoute {
    async fn handle(&self, request: HttpRequest, params: RouteParams) -> HttpResponse {
        let Some(worker) = find_pool(&self.pools, &params) else {
            return responses::not_found();
        };
        let command = params.get("command").unwrap_or_default();
        let body = request.into_body();
        let data = if body.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice(&body) {
                Ok(data) => data,
                Err(error) => {
                    return responses::json(
                        StatusCode::BAD_REQUEST,
                        &json!({ "error": error.to_string() }),
                    );
                }
            }
        };

        match worker.call(command, data).await {
            Ok(CommandResult::Success(value)) => responses::json(StatusCode::OK, &value),
            Ok(failure @ CommandResult::Failure(_)) => match serde_json::to_value(&failure) {
                Ok(envelope) => responses::json(StatusCode::INTERNAL_SERVER_ERROR, &envelope),
                Err(error) => {
                    responses::text(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
                }
            },
            Err(error) => {
                warn!(
                    target: POOLS_TARGET,
                    pool = worker.pool(),
                    command,
                    error = %error,
                    "worker call failed"
                );
                responses::text(StatusCode::SERVICE_UNAVAILABLE, error.to_string())
            }
        }
    }
}

struct PingRoute {
    pools: Pools,
}

#[async_trait]
impl RouteHandler for PingRoute {
    async fn handle(&self, _request: HttpRequest, params: RouteParams) -> HttpResponse {
        let Some(worker) = find_pool(&self.pools, &params) else {
            return responses::not_found();
        };
        match worker.ping().await {
            Ok(true) => responses::text(StatusCode::OK, "pong"),
            Ok(false) => responses::text(StatusCode::BAD_GATEWAY, "unexpected ping reply"),
            Err(error) => responses::text(StatusCode::SERVICE_UNAVAILABLE, error.to_string()),
        }
    }
}

fn find_pool<'a>(pools: &'a Pools, params: &RouteParams) -> Option<&'a WorkerHandle> {
    params.get("pool").and_then(|pool| pools.get(pool))
}
