//! Agent abstraction and management.
//!
//! This module provides the `Agent` trait (Adapter Pattern), the
//! `AgentManager` that maps pipeline roles to agents, and helpers that turn
//! agent streams into typed answers.

pub mod adapters;
pub mod agent_type;
pub mod base;
pub mod cli_executor;
pub mod factory;
pub mod manager;
pub mod structured;

pub use adapters::{ClaudeAdapter, MockAgent};
pub use agent_type::AgentType;
pub use base::{Agent, AgentError, AgentEvent, AgentStream, ExecutionContext};
pub use factory::AgentFactory;
pub use manager::{AgentManager, ARCHITECT, PLANNER, SELECTOR, SUMMARIZER};
pub use structured::{generate_structured, generate_text, parse_structured};
