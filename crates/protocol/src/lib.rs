//! # nk-protocol
//!
//! Core protocol definitions and data models for notekit.
//!
//! This crate defines all shared data structures used for:
//! - Configuration file parsing (TOML config, Markdown agents)
//! - Structured agent output (document updates and update plans)
//! - Message queue state
//! - Events streamed from the core to front ends
//!
//! ## Modules
//!
//! - [`agent_models`]: Agent definition structures
//! - [`config_models`]: Global configuration from config.toml
//! - [`update_models`]: Document updates, edits and plans
//! - [`message_models`]: Queued message state and results
//! - [`ipc`]: Events for Core-to-front-end communication
//!
//! ## Design Principles
//!
//! - Minimal dependencies: Only serde, ts-rs, and chrono
//! - TypeScript generation: All types derive `TS` for client compatibility
//! - Independent compilation: No dependencies on other notekit crates

pub mod agent_models;
pub mod config_models;
pub mod ipc;
pub mod message_models;
pub mod update_models;

// Re-export all public types for convenience
pub use agent_models::*;
pub use config_models::*;
pub use ipc::*;
pub use message_models::*;
pub use update_models::*;
