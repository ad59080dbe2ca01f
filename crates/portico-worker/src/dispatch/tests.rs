//! Unit tests for the command dispatcher.

use async_trait::async_trait;
use rstest::{fixture, rstest};
use serde_json::json;

use super::*;
use crate::ports::{DomainPort, MockDomainPort, PortError, port_fn};

struct Exploding;

#[async_trait]
impl DomainPort for Exploding {
    async fn invoke(&self, _data: Value) -> Result<Value, PortError> {
        panic!("kaboom")
    }
}

#[fixture]
fn ports() -> DomainPorts {
    DomainPorts::new()
        .with(
            "createWidget",
            port_fn(|_input: Value| async move { Ok::<_, PortError>(json!({ "id": "w1" })) }),
        )
        .with("explode", Arc::new(Exploding))
}

#[rstest]
#[tokio::test]
async fn resolves_named_port() {
    let mut port = MockDomainPort::new();
    port.expect_invoke()
        .withf(|data| *data == json!({ "color": "red" }))
        .times(1)
        .returning(|_| Ok(json!({ "id": "w1" })));
    let ports = DomainPorts::new().with("createWidget", Arc::new(port));
    let dispatcher = CommandDispatcher::new(ports);

    let result = dispatcher
        .dispatch(CommandMessage::new("createWidget", json!({ "color": "red" })))
        .await;

    assert_eq!(result, CommandResult::Success(json!({ "id": "w1" })));
}

#[rstest]
#[tokio::test]
async fn unknown_command_yields_envelope(ports: DomainPorts) {
    let dispatcher = CommandDispatcher::new(ports);
    let result = dispatcher
        .dispatch(CommandMessage::new("doesNotExist", Value::Null))
        .await;
    let envelope = result.error().expect("failure");
    assert_eq!(envelope.message(), "not a function: doesNotExist");
}

#[rstest]
#[tokio::test]
async fn ping_bypasses_ports() {
    let dispatcher = CommandDispatcher::default();
    let result = dispatcher.dispatch(CommandMessage::ping()).await;
    assert_eq!(result, CommandResult::Success(json!("pong")));
}

#[rstest]
#[tokio::test]
async fn port_errors_become_envelopes() {
    let mut port = MockDomainPort::new();
    port.expect_invoke()
        .times(1)
        .returning(|_| Err(PortError::new("Error", "boom").with_stack("Error: boom")));
    let dispatcher = CommandDispatcher::new(DomainPorts::new().with("fail", Arc::new(port)));

    let result = dispatcher
        .dispatch(CommandMessage::new("fail", Value::Null))
        .await;

    let envelope = result.error().expect("failure");
    assert_eq!(envelope.name(), "Error");
    assert_eq!(envelope.message(), "boom");
    assert_eq!(envelope.stack(), "Error: boom");
}

#[rstest]
#[tokio::test]
async fn panics_are_contained(ports: DomainPorts) {
    let dispatcher = CommandDispatcher::new(ports);

    let result = dispatcher
        .dispatch(CommandMessage::new("explode", Value::Null))
        .await;
    let envelope = result.error().expect("failure");
    assert_eq!(envelope.name(), "Panic");
    assert_eq!(envelope.message(), "kaboom");

    let after = dispatcher
        .dispatch(CommandMessage::new("createWidget", Value::Null))
        .await;
    assert!(!after.is_error(), "dispatcher should keep serving");
}

#[rstest]
#[case::str_payload(Box::new("static"), "static")]
#[case::string_payload(Box::new(String::from("owned")), "owned")]
#[case::other_payload(Box::new(7_u8), "handler panicked")]
fn panic_message_reads_common_payloads(
    #[case] payload: Box<dyn Any + Send>,
    #[case] expected: &str,
) {
    assert_eq!(panic_message(payload.as_ref()), expected);
}
