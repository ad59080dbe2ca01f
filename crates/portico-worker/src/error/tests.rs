//! Unit tests for worker error formatting.

use rstest::rstest;

use super::*;

#[rstest]
fn closed_names_the_pool() {
    let error = WorkerError::closed("widget");
    assert_eq!(error.to_string(), "worker 'widget' is closed");
}

#[rstest]
#[case::missing(WorkerError::MissingPoolName, "worker pool name must not be empty")]
#[case::dropped(
    WorkerError::ReplyDropped { pool: "widget".into(), command: "createWidget".into() },
    "worker 'widget' dropped the reply for command 'createWidget'"
)]
fn worker_errors_render_context(#[case] error: WorkerError, #[case] expected: &str) {
    assert_eq!(error.to_string(), expected);
}

#[rstest]
fn bridge_port_closed_names_the_pool() {
    let error = BridgeError::PortClosed {
        pool: "widget".into(),
    };
    assert!(error.to_string().contains("'widget'"));
}
