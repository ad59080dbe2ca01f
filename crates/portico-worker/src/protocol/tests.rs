//! Unit tests for the worker wire types.

use rstest::rstest;
use serde_json::json;

use super::*;

#[rstest]
fn error_envelope_serialises_with_has_error_flag() {
    let envelope = ErrorEnvelope::new("PortError", "boom", "PortError: boom");
    let value = serde_json::to_value(CommandResult::Failure(envelope)).expect("serialise");
    assert_eq!(
        value,
        json!({
            "name": "PortError",
            "message": "boom",
            "stack": "PortError: boom",
            "hasError": true
        })
    );
}

#[rstest]
fn unknown_command_names_the_command() {
    let envelope = ErrorEnvelope::unknown_command("doesNotExist");
    assert_eq!(envelope.message(), "not a function: doesNotExist");
    assert_eq!(envelope.name(), "Error");
}

#[rstest]
#[case::object(json!({ "id": "w1" }))]
#[case::string(json!("pong"))]
#[case::null(Value::Null)]
#[case::false_flag(json!({ "name": "x", "message": "y", "hasError": false }))]
fn values_without_error_flag_are_successes(#[case] value: Value) {
    let result: CommandResult = serde_json::from_value(value.clone()).expect("deserialise");
    assert_eq!(result, CommandResult::Success(value));
}

#[rstest]
fn flagged_object_is_a_failure() {
    let result: CommandResult = serde_json::from_value(json!({
        "name": "TypeError",
        "message": "bad input",
        "hasError": true
    }))
    .expect("deserialise");
    let envelope = result.error().expect("failure");
    assert_eq!(envelope.message(), "bad input");
    assert!(envelope.stack().is_empty());
}

#[rstest]
fn event_flattens_fields_beside_name() {
    let event = Event::new("widgetCreated").with_field("id", json!("w1"));
    let value = serde_json::to_value(&event).expect("serialise");
    assert_eq!(value, json!({ "eventName": "widgetCreated", "id": "w1" }));

    let parsed: Event = serde_json::from_value(value).expect("deserialise");
    assert_eq!(parsed.field("id"), Some(&json!("w1")));
    assert_eq!(parsed.name(), "widgetCreated");
}

#[rstest]
fn command_message_defaults_missing_data() {
    let message: CommandMessage =
        serde_json::from_value(json!({ "name": "ping" })).expect("deserialise");
    assert_eq!(message, CommandMessage::ping());
}
