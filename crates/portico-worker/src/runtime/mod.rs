//! Worker startup and the supervisor-side handle.
//!
//! [`Worker::spawn`] resolves the pool's domain ports and starts the worker
//! loop. The returned [`WorkerHandle`] is cheap to clone; every call owns a
//! one-shot reply channel, so concurrent calls never see each other's
//! results.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::bridge::{self, DEFAULT_EVENT_CAPACITY, SupervisorEvents};
use crate::bus::EventBus;
use crate::dispatch::CommandDispatcher;
use crate::error::WorkerError;
use crate::ports::{DomainPorts, PortLoader};
use crate::protocol::{CommandMessage, CommandResult, PING_REPLY, WorkerInbound};

const WORKER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::runtime");
const INBOX_CAPACITY: usize = 64;

/// Entry point for starting workers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Worker;

impl Worker {
    /// Starts a worker serving `pool_name`.
    ///
    /// Ports are requested from `loader` under the upper-cased pool name. A
    /// loader failure is logged and the worker runs with no ports: `ping`
    /// still answers and every other command yields the unknown-command
    /// envelope.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::MissingPoolName`] for an empty pool name.
    pub async fn spawn(
        pool_name: &str,
        loader: &dyn PortLoader,
        bus: Arc<dyn EventBus>,
    ) -> Result<WorkerHandle, WorkerError> {
        let pool = pool_name.trim();
        if pool.is_empty() {
            error!(target: WORKER_TARGET, "no pool name specified");
            return Err(WorkerError::MissingPoolName);
        }

        let model = pool.to_uppercase();
        let ports = match loader.load(&model).await {
            Ok(ports) => ports,
            Err(load_error) => {
                error!(
                    target: WORKER_TARGET,
                    pool,
                    model = %model,
                    error = %load_error,
                    "failed to load domain ports"
                );
                DomainPorts::new()
            }
        };

        info!(
            target: WORKER_TARGET,
            pool,
            ports = ?ports.names(),
            "worker running"
        );
        let dispatcher = CommandDispatcher::new(ports);
        let (inbox, receiver) = mpsc::channel(INBOX_CAPACITY);
        let pool: Arc<str> = Arc::from(pool);
        tokio::spawn(run_worker(Arc::clone(&pool), receiver, dispatcher, bus));
        Ok(WorkerHandle { pool, inbox })
    }
}

async fn run_worker(
    pool: Arc<str>,
    mut receiver: mpsc::Receiver<WorkerInbound>,
    dispatcher: CommandDispatcher,
    bus: Arc<dyn EventBus>,
) {
    while let Some(inbound) = receiver.recv().await {
        match inbound {
            WorkerInbound::Command { message, reply } => {
                let dispatcher = dispatcher.clone();
                let pool = Arc::clone(&pool);
                tokio::spawn(async move {
                    let command = message.name().to_owned();
                    let result = dispatcher.dispatch(message).await;
                    if reply.send(result).is_err() {
                        debug!(
                            target: WORKER_TARGET,
                            pool = %pool,
                            command = %command,
                            "caller went away before the reply"
                        );
                    }
                });
            }
            WorkerInbound::ConnectEvents(port) => {
                if let Err(bridge_error) =
                    bridge::connect_event_channel(&pool, port, Arc::clone(&bus))
                {
                    warn!(
                        target: WORKER_TARGET,
                        pool = %pool,
                        error = %bridge_error,
                        "event channel not connected"
                    );
                }
            }
            WorkerInbound::Close => break,
        }
    }
    info!(target: WORKER_TARGET, pool = %pool, "worker closed");
}

/// Supervisor-side handle to a running worker.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    pool: Arc<str>,
    inbox: mpsc::Sender<WorkerInbound>,
}

impl WorkerHandle {
    /// Pool served by the worker.
    #[must_use]
    pub fn pool(&self) -> &str {
        &self.pool
    }

    /// Sends a command and waits for its one result.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Closed`] when the worker no longer accepts
    /// messages and [`WorkerError::ReplyDropped`] when it exits mid-call.
    pub async fn call(
        &self,
        name: impl Into<String>,
        data: Value,
    ) -> Result<CommandResult, WorkerError> {
        self.send_command(CommandMessage::new(name, data)).await
    }

    /// Sends a prepared command message.
    ///
    /// # Errors
    ///
    /// See [`WorkerHandle::call`].
    pub async fn send_command(
        &self,
        message: CommandMessage,
    ) -> Result<CommandResult, WorkerError> {
        let command = message.name().to_owned();
        let (reply, response) = oneshot::channel();
        self.inbox
            .send(WorkerInbound::Command { message, reply })
            .await
            .map_err(|_| WorkerError::closed(&self.pool))?;
        response.await.map_err(|_| WorkerError::ReplyDropped {
            pool: self.pool.to_string(),
            command,
        })
    }

    /// Checks liveness; `true` when the worker answered with the
    /// acknowledgment.
    ///
    /// # Errors
    ///
    /// See [`WorkerHandle::call`].
    pub async fn ping(&self) -> Result<bool, WorkerError> {
        let result = self.send_command(CommandMessage::ping()).await?;
        Ok(result.value().and_then(Value::as_str) == Some(PING_REPLY))
    }

    /// Hands the worker an event channel and returns the supervisor end.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Closed`] when the worker has exited.
    pub async fn connect_events(&self) -> Result<SupervisorEvents, WorkerError> {
        let (port, supervisor) = bridge::event_channel(DEFAULT_EVENT_CAPACITY);
        self.inbox
            .send(WorkerInbound::ConnectEvents(port))
            .await
            .map_err(|_| WorkerError::closed(&self.pool))?;
        Ok(supervisor)
    }

    /// Asks the worker loop to stop. Calls already in flight still complete.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Closed`] when the worker has already exited.
    pub async fn close(&self) -> Result<(), WorkerError> {
        self.inbox
            .send(WorkerInbound::Close)
            .await
            .map_err(|_| WorkerError::closed(&self.pool))
    }

    /// Returns `true` once the worker loop has exited.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inbox.is_closed()
    }
}
