//! Agent trait and the types agents exchange with the pipeline.
//!
//! An agent receives one [`ExecutionContext`] and answers with a stream of
//! [`AgentEvent`]s. Pipeline stages only look at the message chunks; see
//! [`crate::agents::structured`] for turning them into typed answers.

use async_trait::async_trait;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio_stream::Stream;

/// Everything an agent needs for one call.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// The prompt built by the pipeline stage.
    pub instruction: String,

    /// Working directory of CLI agents, normally the data directory.
    pub project_path: String,

    /// Extra system prompt appended to the agent's own.
    pub system_prompt: Option<String>,

    /// Upper bound for the whole call. `None` lets the agent run until it
    /// finishes.
    pub timeout: Option<Duration>,
}

impl ExecutionContext {
    /// Create a context for `instruction` running in the current directory.
    pub fn new(instruction: String) -> Self {
        let project_path = std::env::current_dir()
            .ok()
            .and_then(|dir| dir.to_str().map(str::to_string))
            .unwrap_or_else(|| ".".to_string());
        Self {
            instruction,
            project_path,
            system_prompt: None,
            timeout: None,
        }
    }

    pub fn with_project_path(mut self, path: String) -> Self {
        self.project_path = path;
        self
    }

    /// Append an extra system prompt.
    pub fn with_system_prompt(mut self, prompt: String) -> Self {
        self.system_prompt = Some(prompt);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    Thought(String),
    ToolCall(String),
    /// A piece of the answer text.
    MessageChunk(String),
    Completed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("Agent not available: {0}")]
    NotAvailable(String),

    /// The model provider reported a failure.
    #[error("API call failed: {0}")]
    ApiError(String),

    #[error("Stream parsing error: {0}")]
    StreamParseError(String),

    #[error("Execution failed: {0}")]
    ExecutionError(String),

    #[error("Agent timed out after {0:?}")]
    Timeout(Duration),

    /// The agent answered, but not with the requested structure.
    #[error("Invalid agent output: {0}")]
    InvalidOutput(String),
}

pub type AgentStream = Pin<Box<dyn Stream<Item = Result<AgentEvent, AgentError>> + Send>>;

/// A model the pipeline can ask. Implementations never retry on their own;
/// retries are decided by the pipeline.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn check_availability(&self) -> bool;

    async fn execute(&self, context: &ExecutionContext) -> Result<AgentStream, AgentError>;
}
