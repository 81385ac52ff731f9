//! Message queue state models.
//!
//! A message is one user submission waiting for, or going through, the
//! update pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Lifecycle status of a queued message.
///
/// Queued -> Processing -> Completed | Failed
///
/// A message still Queued when the queue shuts down stays Queued.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    /// Waiting for the worker.
    Queued,

    /// The worker is running the message through the pipeline.
    Processing,

    /// Finished successfully. `result` is set.
    Completed,

    /// Finished with an error. `error` is set.
    Failed,
}

impl MessageStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, MessageStatus::Completed | MessageStatus::Failed)
    }
}

/// Files touched by a successful pipeline run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, TS)]
pub struct UpdateDetails {
    pub files: Vec<String>,
    pub commit_message: String,
    /// Commit identifier, absent when the run changed nothing.
    pub commit_id: Option<String>,
}

/// Outcome of handling one message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, TS)]
pub struct MessageResult {
    /// Text shown to the user.
    pub response: String,

    /// Paths of documents written or deleted.
    pub updated_docs: Vec<String>,

    pub update_details: Option<UpdateDetails>,
}

impl MessageResult {
    /// A result that only carries a response.
    pub fn reply(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            ..Self::default()
        }
    }
}

/// A message owned by the queue.
#[derive(Serialize, Deserialize, Debug, Clone, TS)]
pub struct QueuedMessage {
    /// Sequential identifier, starting at 1 and never reused.
    #[ts(type = "number")]
    pub id: u64,

    /// Raw user input.
    pub content: String,

    pub status: MessageStatus,

    pub result: Option<MessageResult>,

    pub error: Option<String>,

    pub enqueued_at: DateTime<Utc>,

    pub finished_at: Option<DateTime<Utc>>,
}

impl QueuedMessage {
    pub fn new(id: u64, content: String) -> Self {
        Self {
            id,
            content,
            status: MessageStatus::Queued,
            result: None,
            error: None,
            enqueued_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Snapshot of the queue.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, TS)]
pub struct QueueStatus {
    /// Messages currently tracked, finished ones included.
    pub total: usize,

    /// Ids waiting for the worker, oldest first.
    #[ts(type = "Array<number>")]
    pub queued: Vec<u64>,

    /// Id of the message being processed, if any.
    #[ts(type = "number | null")]
    pub processing: Option<u64>,

    pub completed_count: usize,

    pub failed_count: usize,
}
