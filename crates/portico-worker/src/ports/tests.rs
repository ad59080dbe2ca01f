//! Unit tests for domain ports and the typed adaptor.

use rstest::{fixture, rstest};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::*;

#[derive(Debug, Deserialize)]
struct CreateWidget {
    color: String,
}

#[derive(Debug, Serialize)]
struct WidgetCreated {
    id: String,
    color: String,
}

#[derive(Debug, Error)]
#[error("storage offline")]
struct StorageOffline {
    #[source]
    source: std::io::Error,
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[fixture]
fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("build runtime")
}

#[fixture]
fn widget_port() -> Arc<dyn DomainPort> {
    port_fn(|input: CreateWidget| async move {
        Ok(WidgetCreated {
            id: "w1".into(),
            color: input.color,
        })
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[rstest]
fn port_fn_converts_typed_payloads(
    runtime: tokio::runtime::Runtime,
    widget_port: Arc<dyn DomainPort>,
) {
    let value = runtime
        .block_on(widget_port.invoke(json!({ "color": "red" })))
        .expect("invoke");
    assert_eq!(value, json!({ "id": "w1", "color": "red" }));
}

#[rstest]
fn port_fn_reports_invalid_input(
    runtime: tokio::runtime::Runtime,
    widget_port: Arc<dyn DomainPort>,
) {
    let error = runtime
        .block_on(widget_port.invoke(json!({ "shape": "round" })))
        .expect_err("missing field should fail");
    assert_eq!(error.name(), "InvalidInput");
    assert!(error.message().contains("color"), "got {error}");
}

#[rstest]
fn from_error_renders_the_cause_chain() {
    let error = StorageOffline {
        source: std::io::Error::other("disk unplugged"),
    };
    let port_error = PortError::from_error(&error);
    assert_eq!(port_error.name(), "StorageOffline");
    assert_eq!(port_error.message(), "storage offline");

    let envelope = port_error.into_envelope();
    assert!(envelope.stack().starts_with("StorageOffline: storage offline"));
    assert!(envelope.stack().contains("caused by: disk unplugged"));
}

#[rstest]
#[case::plain("std::io::Error", "Error")]
#[case::generic("alloc::boxed::Box<dyn core::error::Error>", "Box")]
#[case::bare("Oops", "Oops")]
fn short_type_name_keeps_the_last_segment(#[case] full: &str, #[case] expected: &str) {
    assert_eq!(short_type_name(full), expected);
}

#[rstest]
fn registry_lists_sorted_names(widget_port: Arc<dyn DomainPort>) {
    let mut ports = DomainPorts::new();
    ports
        .register("updateWidget", Arc::clone(&widget_port))
        .register("createWidget", widget_port);
    assert_eq!(ports.names(), vec!["createWidget", "updateWidget"]);
    assert_eq!(ports.len(), 2);
    assert!(ports.get("deleteWidget").is_none());
}

#[rstest]
fn static_loader_ignores_the_model(
    runtime: tokio::runtime::Runtime,
    widget_port: Arc<dyn DomainPort>,
) {
    let loader = StaticPortLoader::new(DomainPorts::new().with("createWidget", widget_port));
    let ports = runtime.block_on(loader.load("WIDGET")).expect("load");
    assert!(ports.get("createWidget").is_some());
}
