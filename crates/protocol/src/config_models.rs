//! Global configuration models for `.notekit/config.toml`.
//!
//! Every field has a default so an empty or missing file yields a usable
//! configuration.

use serde::Deserialize;
use serde::Serialize;
use ts_rs::TS;

/// How the pipeline treats plan entries that would create new documents.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationMode {
    /// Accept every plan entry without asking.
    #[default]
    Auto,
    /// Ask the configured confirmer before creating a new document.
    Interactive,
}

/// Represents global settings from `.notekit/config.toml`.
///
/// # Example
///
/// ```toml
/// # .notekit/config.toml
/// data_dir = "data"
/// model = "claude-sonnet-4"
/// max_retries = 3
/// create_prefix = "projects/"
/// planning = false
/// confirmation = "auto"
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(default)]
pub struct GlobalConfig {
    /// Directory holding the documents and their git repository.
    ///
    /// Relative paths are resolved against the project root.
    pub data_dir: String,

    /// Default model for agents that do not name one.
    pub model: String,

    /// How many times generation is retried after a retryable edit failure.
    pub max_retries: u32,

    /// Path prefix under which new documents may be created.
    pub create_prefix: String,

    /// Ask the planner agent for a multi-file plan instead of updating
    /// only the addressed project document.
    pub planning: bool,

    /// Confirmation behaviour for new documents.
    pub confirmation: ConfirmationMode,

    /// Seconds an agent call may run before it is killed.
    pub agent_timeout_secs: u64,

    /// Worker poll interval in milliseconds.
    pub queue_poll_ms: u64,

    /// Seconds the queue waits for an in-flight message during shutdown.
    pub shutdown_timeout_secs: u64,

    /// Seconds a finished message is retained before being pruned.
    pub retention_secs: u64,

    /// Author name used for commits in the data directory.
    pub git_author_name: String,

    /// Author email used for commits in the data directory.
    pub git_author_email: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            model: "claude-sonnet-4".to_string(),
            max_retries: 3,
            create_prefix: "projects/".to_string(),
            planning: false,
            confirmation: ConfirmationMode::Auto,
            agent_timeout_secs: 300,
            queue_poll_ms: 1000,
            shutdown_timeout_secs: 30,
            retention_secs: 600,
            git_author_name: "notekit".to_string(),
            git_author_email: "notekit@localhost".to_string(),
        }
    }
}
