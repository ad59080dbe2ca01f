//! Message types exchanged between the supervisor and a worker.
//!
//! Every payload crossing the boundary is plain data (`serde_json::Value`),
//! so nothing executable or reference-bearing ever leaves a worker. A
//! [`CommandMessage`] yields exactly one [`CommandResult`]; on the wire a
//! failure is an object carrying `"hasError": true` and anything else is a
//! success.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tokio::sync::oneshot;

use crate::bridge::EventPort;

/// Reserved command answered directly by the worker loop.
pub const PING_COMMAND: &str = "ping";

/// Fixed acknowledgment returned for [`PING_COMMAND`].
pub const PING_REPLY: &str = "pong";

/// Error name used when a command does not resolve to a domain port.
const UNKNOWN_COMMAND_ERROR: &str = "Error";

const HAS_ERROR_FIELD: &str = "hasError";

/// Request to invoke a named domain port.
///
/// # Example
///
/// ```
/// use portico_worker::CommandMessage;
/// use serde_json::json;
///
/// let message = CommandMessage::new("createWidget", json!({ "color": "red" }));
/// assert_eq!(message.name(), "createWidget");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandMessage {
    name: String,
    #[serde(default)]
    data: Value,
}

impl CommandMessage {
    /// Creates a command message.
    #[must_use]
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Builds the reserved liveness check.
    #[must_use]
    pub fn ping() -> Self {
        Self::new(PING_COMMAND, Value::Null)
    }

    /// Returns the command name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the opaque payload.
    #[must_use]
    pub const fn data(&self) -> &Value {
        &self.data
    }

    /// Splits the message into its name and payload.
    #[must_use]
    pub fn into_parts(self) -> (String, Value) {
        (self.name, self.data)
    }
}

/// Serializable description of a failed command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    name: String,
    message: String,
    #[serde(default)]
    stack: String,
    #[serde(rename = "hasError")]
    has_error: bool,
}

impl ErrorEnvelope {
    /// Creates an envelope for an error kind and message.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        message: impl Into<String>,
        stack: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: stack.into(),
            has_error: true,
        }
    }

    /// Envelope returned when `command` is not bound to any domain port.
    #[must_use]
    pub fn unknown_command(command: &str) -> Self {
        Self::new(
            UNKNOWN_COMMAND_ERROR,
            format!("not a function: {command}"),
            String::new(),
        )
    }

    /// Error kind, e.g. the failing type's name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Human-readable failure message.
    #[must_use]
    pub const fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Rendered cause chain; may be empty.
    #[must_use]
    pub const fn stack(&self) -> &str {
        self.stack.as_str()
    }
}

/// Outcome of a single command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Plain-data value returned by the domain port.
    Success(Value),
    /// Captured failure.
    Failure(ErrorEnvelope),
}

impl CommandResult {
    /// Returns `true` for [`CommandResult::Failure`].
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Returns the success value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// Returns the error envelope, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&ErrorEnvelope> {
        match self {
            Self::Success(_) => None,
            Self::Failure(envelope) => Some(envelope),
        }
    }
}

impl Serialize for CommandResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Success(value) => value.serialize(serializer),
            Self::Failure(envelope) => envelope.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for CommandResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let flagged = value
            .get(HAS_ERROR_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if flagged {
            serde_json::from_value(value)
                .map(Self::Failure)
                .map_err(D::Error::custom)
        } else {
            Ok(Self::Success(value))
        }
    }
}

/// Named event with arbitrary plain-data fields.
///
/// Serialises as `{ "eventName": ..., ...fields }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    #[serde(rename = "eventName")]
    event_name: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Event {
    /// Creates an event without fields.
    #[must_use]
    pub fn new(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            fields: Map::new(),
        }
    }

    /// Adds a field, replacing any previous value under `key`.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Returns the event name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.event_name.as_str()
    }

    /// Returns the payload fields.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Looks up a single payload field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Messages accepted by a worker loop.
#[derive(Debug)]
pub enum WorkerInbound {
    /// Invoke a domain port and answer on `reply`.
    Command {
        /// Command to run.
        message: CommandMessage,
        /// Channel owned by this call; receives exactly one result.
        reply: oneshot::Sender<CommandResult>,
    },
    /// Attach the event channel.
    ConnectEvents(EventPort),
    /// Stop accepting messages.
    Close,
}

#[cfg(test)]
mod tests;
