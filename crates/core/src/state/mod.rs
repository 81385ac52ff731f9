//! Queued message state.
//!
//! This module provides:
//! - The message state machine (`message`)
//! - `MessageQueue`, the FIFO queue with its single worker (`queue`)

pub mod message;
pub mod queue;

pub use queue::{MessageHandler, MessageQueue, QueueError, QueueSettings, ShutdownReport};
