//! Route table populated by the loaded service module.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use hyper::Method;

use super::HttpRequest;
use crate::transport::HttpResponse;

/// Values captured by `:name` segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams(HashMap<String, String>);

impl RouteParams {
    /// Captured value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Number of captured values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Handles requests matched to a route.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RouteHandler: Send + Sync {
    /// Produces the response for a matched request.
    async fn handle(&self, request: HttpRequest, params: RouteParams) -> HttpResponse;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Path pattern such as `/orders/:id/items`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parses a pattern; empty segments are ignored.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let segments = split(raw)
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_owned()),
                None => Segment::Literal(segment.to_owned()),
            })
            .collect();
        Self {
            raw: raw.to_owned(),
            segments,
        }
    }

    /// Pattern text as registered.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Matches `path`, returning the captured parameters.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<RouteParams> {
        let mut params = HashMap::new();
        let mut remaining = split(path);
        for segment in &self.segments {
            let actual = remaining.next()?;
            match segment {
                Segment::Literal(expected) if expected == actual => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), actual.to_owned());
                }
            }
        }
        if remaining.next().is_some() {
            return None;
        }
        Some(RouteParams(params))
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

struct Route {
    method: Method,
    pattern: PathPattern,
    handler: Arc<dyn RouteHandler>,
}

/// Ordered set of routes; the first match wins.
#[derive(Default, Clone)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
}

impl RouteTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` on `pattern`.
    pub fn add(
        &mut self,
        method: Method,
        pattern: &str,
        handler: Arc<dyn RouteHandler>,
    ) -> &mut Self {
        self.routes.push(Arc::new(Route {
            method,
            pattern: PathPattern::parse(pattern),
            handler,
        }));
        self
    }

    /// Finds the handler for `method` and `path`.
    #[must_use]
    pub fn resolve(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(Arc<dyn RouteHandler>, RouteParams)> {
        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                route
                    .pattern
                    .matches(path)
                    .map(|params| (Arc::clone(&route.handler), params))
            })
    }

    /// Copy of the table without routes whose pattern starts with `prefix`.
    #[must_use]
    pub fn without_prefix(&self, prefix: &str) -> Self {
        let routes = self
            .routes
            .iter()
            .filter(|route| !route.pattern.as_str().starts_with(prefix))
            .cloned()
            .collect();
        Self { routes }
    }

    /// Registered patterns in registration order.
    #[must_use]
    pub fn patterns(&self) -> Vec<&str> {
        self.routes
            .iter()
            .map(|route| route.pattern.as_str())
            .collect()
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` when no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_list()
            .entries(
                self.routes
                    .iter()
                    .map(|route| format!("{} {}", route.method, route.pattern.as_str())),
            )
            .finish()
    }
}

/// Live route table, replaced as a whole on reload.
#[derive(Debug, Default)]
pub struct SharedRoutes {
    current: RwLock<Arc<RouteTable>>,
}

impl SharedRoutes {
    /// Wraps an initial table.
    #[must_use]
    pub fn new(table: RouteTable) -> Self {
        Self {
            current: RwLock::new(Arc::new(table)),
        }
    }

    /// Snapshot of the live table.
    #[must_use]
    pub fn load(&self) -> Arc<RouteTable> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swaps in `table`.
    pub fn replace(&self, table: RouteTable) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(table);
    }
}
