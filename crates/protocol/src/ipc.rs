//! Core-to-front-end communication protocol.
//!
//! The core emits `Event`s on a channel while it works through the message
//! queue. Front ends (the chat REPL, a future web socket bridge) render them.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::message_models::{MessageResult, MessageStatus};

/// Events sent from the Core to front ends.
///
/// Uses tagged enum serialization for TypeScript compatibility:
/// ```json
/// {
///   "type": "messageStatusUpdate",
///   "payload": {
///     "message_id": 3,
///     "status": "PROCESSING"
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// A message was accepted by the queue.
    MessageQueued {
        #[ts(type = "number")]
        message_id: u64,
        /// Messages waiting ahead of this one, this one included.
        position: usize,
    },

    /// A message changed status.
    MessageStatusUpdate {
        #[ts(type = "number")]
        message_id: u64,
        status: MessageStatus,
    },

    /// A message finished successfully.
    MessageCompleted {
        #[ts(type = "number")]
        message_id: u64,
        result: MessageResult,
    },

    /// A message finished with an error.
    MessageFailed {
        #[ts(type = "number")]
        message_id: u64,
        error: String,
    },

    /// The queue stopped. Listed messages were never started.
    QueueShutdown {
        #[ts(type = "Array<number>")]
        abandoned: Vec<u64>,
    },
}
