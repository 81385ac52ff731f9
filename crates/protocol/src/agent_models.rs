//! Agent definition models for `.notekit/agents/*.md`.
//!
//! Agents are defined as Markdown files with YAML front matter. The body of
//! the file is the agent's system prompt.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Represents an LLM agent's configuration and system prompt.
///
/// # Example
///
/// ```markdown
/// ---
/// name: architect
/// description: Turns a note into document edits
/// model: claude-sonnet-4
/// role: architect
/// ---
///
/// You maintain project documents. Respond with a JSON document update.
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, TS)]
pub struct AgentDefinition {
    /// Unique identifier for this agent.
    pub name: String,

    /// Human-readable description of the agent's purpose.
    pub description: String,

    /// Model to use for this agent (e.g., "claude-sonnet-4").
    pub model: String,

    /// Pipeline role this agent fills.
    ///
    /// One of `architect`, `planner`, `selector`, `summarizer`. When absent
    /// the agent's name is used as its role.
    #[serde(default)]
    pub role: Option<String>,

    /// The main content of the .md file, not part of the front matter.
    ///
    /// This field is skipped during serialization as it's not part of the
    /// front matter metadata.
    #[serde(skip)]
    pub system_prompt: String,
}

impl AgentDefinition {
    /// The role this agent is registered under.
    pub fn role(&self) -> &str {
        self.role.as_deref().unwrap_or(&self.name)
    }
}
