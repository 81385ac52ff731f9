//! # nk-core
//!
//! Core note pipeline, message queue and agent management for notekit.
//!
//! This crate provides:
//! - Configuration loading from the `.notekit/` directory
//! - Agent abstraction layer and adapter pattern implementation
//! - The edit validator and the atomic committer over a document store
//! - The pipeline engine that turns a note into one commit
//! - The sequential message queue and the chat session it drives
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and management
//! - [`agents`]: Agent trait and adapter implementations
//! - [`store`]: Document stores (git working tree, in memory)
//! - [`edit`]: Search/replace edit validation
//! - [`committer`]: Validate-then-apply commits
//! - [`engine`]: Pipeline execution engine
//! - [`state`]: Message queue and message state machine
//! - [`session`]: Chat commands, transcripts and note routing

pub mod agents;
pub mod committer;
pub mod config;
pub mod edit;
pub mod engine;
pub mod init;
pub mod logging;
pub mod session;
pub mod state;
pub mod store;
pub mod summaries;
