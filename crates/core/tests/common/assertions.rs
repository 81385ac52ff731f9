//! Custom assertion helpers for integration tests.

use nk_core::engine::error::{ErrorKind, PipelineError};
use nk_core::engine::state::PipelineState;
use nk_protocol::ipc::Event;
use nk_protocol::message_models::MessageStatus;
use tokio::sync::mpsc::UnboundedReceiver;

/// Drain every event currently in the channel.
#[allow(dead_code)]
pub fn drain_events(rx: &mut UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Status updates of one message, in emission order.
#[allow(dead_code)]
pub fn status_sequence(events: &[Event], id: u64) -> Vec<MessageStatus> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::MessageStatusUpdate { message_id, status } if *message_id == id => Some(*status),
            _ => None,
        })
        .collect()
}

/// Message ids in the order they started processing.
#[allow(dead_code)]
pub fn processing_order(events: &[Event]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::MessageStatusUpdate {
                message_id,
                status: MessageStatus::Processing,
            } => Some(*message_id),
            _ => None,
        })
        .collect()
}

/// Assert that the run committed without error.
#[allow(dead_code)]
pub fn assert_committed(state: &PipelineState) {
    assert!(
        state.error.is_none(),
        "Expected a successful run, got error: {:?}",
        state.error
    );
    assert!(state.committed, "Expected the run to commit");
}

/// Assert that the run failed with an error of `kind`.
#[allow(dead_code)]
pub fn assert_failed_with(state: &PipelineState, kind: ErrorKind) -> PipelineError {
    let error = state
        .error
        .clone()
        .unwrap_or_else(|| panic!("Expected a {kind} error, run succeeded"));
    assert_eq!(error.kind(), kind, "unexpected error: {error}");
    assert!(!state.committed, "A failed run must not commit");
    error
}

/// Assert that a string contains a substring (case-insensitive).
#[allow(dead_code)]
pub fn assert_contains_ci(haystack: &str, needle: &str) {
    let haystack_lower = haystack.to_lowercase();
    let needle_lower = needle.to_lowercase();
    assert!(
        haystack_lower.contains(&needle_lower),
        "Expected '{haystack}' to contain '{needle}' (case-insensitive)"
    );
}
