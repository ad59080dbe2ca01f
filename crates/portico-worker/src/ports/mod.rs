//! Domain ports: the named callables a worker exposes to the supervisor.
//!
//! A [`PortLoader`] supplies the [`DomainPorts`] for a pool when the worker
//! starts. Each port receives the command payload as plain data and returns
//! plain data; typed handlers are adapted with [`port_fn`], which performs
//! the DTO conversion at the boundary.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::protocol::ErrorEnvelope;

const INVALID_INPUT: &str = "InvalidInput";
const INVALID_OUTPUT: &str = "InvalidOutput";

/// Failure reported by a domain port.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct PortError {
    name: String,
    message: String,
    stack: String,
}

impl PortError {
    /// Creates an error with an explicit kind and message.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: String::new(),
        }
    }

    /// Captures a Rust error, its type name and its cause chain.
    #[must_use]
    pub fn from_error<E>(error: &E) -> Self
    where
        E: StdError + 'static,
    {
        let name = short_type_name(std::any::type_name::<E>());
        let mut stack = format!("{name}: {error}");
        let mut source = error.source();
        while let Some(cause) = source {
            stack.push_str("\n    caused by: ");
            stack.push_str(&cause.to_string());
            source = cause.source();
        }
        Self {
            name: name.to_owned(),
            message: error.to_string(),
            stack,
        }
    }

    /// Replaces the rendered stack.
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = stack.into();
        self
    }

    fn renamed(mut self, name: &str) -> Self {
        name.clone_into(&mut self.name);
        self
    }

    /// Error kind.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Failure message.
    #[must_use]
    pub const fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Converts the error into its wire representation.
    #[must_use]
    pub fn into_envelope(self) -> ErrorEnvelope {
        ErrorEnvelope::new(self.name, self.message, self.stack)
    }
}

fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A callable bound to a command name.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DomainPort: Send + Sync {
    /// Invokes the port with the command payload.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the underlying operation fails.
    async fn invoke(&self, data: Value) -> Result<Value, PortError>;
}

/// Registry of domain ports keyed by command name.
#[derive(Clone, Default)]
pub struct DomainPorts {
    ports: HashMap<String, Arc<dyn DomainPort>>,
}

impl DomainPorts {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `port` to `name`, replacing any previous binding.
    pub fn register(&mut self, name: impl Into<String>, port: Arc<dyn DomainPort>) -> &mut Self {
        self.ports.insert(name.into(), port);
        self
    }

    /// Builder-style variant of [`DomainPorts::register`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, port: Arc<dyn DomainPort>) -> Self {
        self.register(name, port);
        self
    }

    /// Looks up the port bound to `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn DomainPort>> {
        self.ports.get(name).map(Arc::clone)
    }

    /// Returns the bound command names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.ports.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of bound ports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Returns `true` when no ports are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

impl fmt::Debug for DomainPorts {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DomainPorts")
            .field("ports", &self.names())
            .finish()
    }
}

/// Adapts a typed async handler into a [`DomainPort`].
///
/// The payload is deserialised into `I` and the output serialised from `O`;
/// either conversion failing is reported as a [`PortError`].
///
/// # Example
///
/// ```
/// use portico_worker::{DomainPorts, PortError, port_fn};
/// use serde_json::Value;
///
/// let ports = DomainPorts::new().with(
///     "echo",
///     port_fn(|input: Value| async move { Ok::<_, PortError>(input) }),
/// );
/// assert!(ports.get("echo").is_some());
/// ```
pub fn port_fn<F, Fut, I, O>(handler: F) -> Arc<dyn DomainPort>
where
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, PortError>> + Send + 'static,
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    Arc::new(FnPort {
        handler,
        _types: PhantomData,
    })
}

struct FnPort<F, I, O> {
    handler: F,
    _types: PhantomData<fn(I) -> O>,
}

#[async_trait]
impl<F, Fut, I, O> DomainPort for FnPort<F, I, O>
where
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, PortError>> + Send + 'static,
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    async fn invoke(&self, data: Value) -> Result<Value, PortError> {
        let input = serde_json::from_value::<I>(data)
            .map_err(|error| PortError::from_error(&error).renamed(INVALID_INPUT))?;
        let output = (self.handler)(input).await?;
        serde_json::to_value(output)
            .map_err(|error| PortError::from_error(&error).renamed(INVALID_OUTPUT))
    }
}

/// Supplies the domain ports for a pool when a worker starts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PortLoader: Send + Sync {
    /// Loads the ports for `model`, the upper-cased pool name.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the port bundle cannot be loaded.
    async fn load(&self, model: &str) -> Result<DomainPorts, PortError>;
}

/// Loader that hands out a fixed set of ports regardless of the pool.
#[derive(Debug, Clone, Default)]
pub struct StaticPortLoader {
    ports: DomainPorts,
}

impl StaticPortLoader {
    /// Creates a loader returning `ports`.
    #[must_use]
    pub const fn new(ports: DomainPorts) -> Self {
        Self { ports }
    }
}

#[async_trait]
impl PortLoader for StaticPortLoader {
    async fn load(&self, _model: &str) -> Result<DomainPorts, PortError> {
        Ok(self.ports.clone())
    }
}

#[cfg(test)]
mod tests;
