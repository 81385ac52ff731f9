//! Queued message state machine.
//!
//! Free functions that move a `QueuedMessage` through its lifecycle and
//! emit the matching events. `Queued → Processing → Completed | Failed`
//! is the only path; terminal states are never left.

use chrono::Utc;
use nk_protocol::ipc::Event;
use nk_protocol::message_models::{MessageResult, MessageStatus, QueuedMessage};
use tokio::sync::mpsc::UnboundedSender;

/// Create a new message with Queued status.
///
/// # Arguments
///
/// * `id` - Sequential message id
/// * `content` - Raw user input
pub fn create_message(id: u64, content: String) -> QueuedMessage {
    QueuedMessage::new(id, content)
}

/// Announce a message that was added to the queue.
///
/// # Arguments
///
/// * `message` - The queued message
/// * `position` - 1-based position among waiting messages
/// * `events_tx` - Channel to send the event
pub fn announce_message(message: &QueuedMessage, position: usize, events_tx: &UnboundedSender<Event>) {
    let _ = events_tx.send(Event::MessageQueued {
        message_id: message.id,
        position,
    });
}

/// Transition the message to Processing status and emit event.
pub fn start_message(message: &mut QueuedMessage, events_tx: &UnboundedSender<Event>) {
    message.status = MessageStatus::Processing;
    send_status(message, events_tx);
}

/// Mark the message as completed, store its result and emit events.
///
/// # Arguments
///
/// * `message` - The message to complete
/// * `events_tx` - Channel to send the status update and completion events
/// * `result` - What the handler produced
pub fn complete_message(message: &mut QueuedMessage, events_tx: &UnboundedSender<Event>, result: MessageResult) {
    message.status = MessageStatus::Completed;
    message.result = Some(result.clone());
    message.finished_at = Some(Utc::now());
    send_status(message, events_tx);
    let _ = events_tx.send(Event::MessageCompleted {
        message_id: message.id,
        result,
    });
}

/// Mark the message as failed and emit error event.
///
/// # Arguments
///
/// * `message` - The message to fail
/// * `events_tx` - Channel to send the status update and error events
/// * `error` - Error message describing the failure
pub fn fail_message(message: &mut QueuedMessage, events_tx: &UnboundedSender<Event>, error: String) {
    message.status = MessageStatus::Failed;
    message.error = Some(error.clone());
    message.finished_at = Some(Utc::now());
    send_status(message, events_tx);
    let _ = events_tx.send(Event::MessageFailed {
        message_id: message.id,
        error,
    });
}

fn send_status(message: &QueuedMessage, events_tx: &UnboundedSender<Event>) {
    let _ = events_tx.send(Event::MessageStatusUpdate {
        message_id: message.id,
        status: message.status,
    });
}
