//! Resolves command messages against the worker's domain ports.
//!
//! Each invocation runs in its own task so a panicking handler is contained
//! and reported as an [`ErrorEnvelope`] while the worker keeps serving.

use std::any::Any;
use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinError;
use tracing::{debug, warn};

use crate::ports::DomainPorts;
use crate::protocol::{CommandMessage, CommandResult, ErrorEnvelope, PING_COMMAND, PING_REPLY};

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

const PANIC_ERROR: &str = "Panic";
const CANCELLED_ERROR: &str = "Cancelled";

/// Routes commands to domain ports and shapes their results.
#[derive(Debug, Clone, Default)]
pub struct CommandDispatcher {
    ports: Arc<DomainPorts>,
}

impl CommandDispatcher {
    /// Creates a dispatcher over `ports`.
    #[must_use]
    pub fn new(ports: DomainPorts) -> Self {
        Self {
            ports: Arc::new(ports),
        }
    }

    /// Ports visible to this dispatcher.
    #[must_use]
    pub fn ports(&self) -> &DomainPorts {
        &self.ports
    }

    /// Runs `message` and produces its single result.
    ///
    /// `ping` is answered with `"pong"` without consulting the ports. Unknown
    /// names yield `not a function: <name>`.
    pub async fn dispatch(&self, message: CommandMessage) -> CommandResult {
        let (name, data) = message.into_parts();
        if name == PING_COMMAND {
            return CommandResult::Success(Value::String(PING_REPLY.to_owned()));
        }

        let Some(port) = self.ports.get(&name) else {
            warn!(
                target: DISPATCH_TARGET,
                command = %name,
                "not a domain port"
            );
            return CommandResult::Failure(ErrorEnvelope::unknown_command(&name));
        };

        debug!(target: DISPATCH_TARGET, command = %name, "invoking domain port");
        let invocation = tokio::spawn(async move { port.invoke(data).await });
        match invocation.await {
            Ok(Ok(value)) => CommandResult::Success(value),
            Ok(Err(error)) => {
                warn!(
                    target: DISPATCH_TARGET,
                    command = %name,
                    error = %error,
                    "domain port failed"
                );
                CommandResult::Failure(error.into_envelope())
            }
            Err(join_error) => {
                let envelope = envelope_for_join_error(&name, join_error);
                warn!(
                    target: DISPATCH_TARGET,
                    command = %name,
                    error = envelope.message(),
                    "domain port aborted"
                );
                CommandResult::Failure(envelope)
            }
        }
    }
}

fn envelope_for_join_error(command: &str, error: JoinError) -> ErrorEnvelope {
    match error.try_into_panic() {
        Ok(payload) => {
            let message = panic_message(payload.as_ref());
            let stack = format!("{PANIC_ERROR}: {message}\n    at command '{command}'");
            ErrorEnvelope::new(PANIC_ERROR, message, stack)
        }
        Err(cancelled) => ErrorEnvelope::new(CANCELLED_ERROR, cancelled.to_string(), String::new()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_owned()
    }
}

#[cfg(test)]
mod tests;
