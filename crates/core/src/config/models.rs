//! Configuration models that aggregate all settings.
//!
//! This module provides the unified `AppConfig` structure that combines
//! global settings and agent definitions into a single configuration object.

use nk_protocol::agent_models::AgentDefinition;
use nk_protocol::config_models::GlobalConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Unified application configuration loaded from `.notekit/` directory.
///
/// This structure aggregates all configuration sources:
/// - `config.toml`: Global settings
/// - `agents/*.md`: Agent definitions (built-in templates when none exist)
///
/// # Example
///
/// ```rust,no_run
/// use nk_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Loaded {} agents, data in {}",
///          config.agents.len(),
///          config.data_dir(Path::new(".")).display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Global settings from `config.toml`.
    pub global: GlobalConfig,

    /// All agent definitions loaded from `agents/*.md`.
    pub agents: Vec<AgentDefinition>,
}

impl AppConfig {
    /// Resolve the data directory against the project root.
    pub fn data_dir(&self, root: &Path) -> PathBuf {
        let dir = Path::new(&self.global.data_dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            root.join(dir)
        }
    }

    /// Find the agent registered for a pipeline role.
    pub fn agent_for_role(&self, role: &str) -> Option<&AgentDefinition> {
        self.agents.iter().find(|agent| agent.role() == role)
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.global.agent_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.global.queue_poll_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.global.shutdown_timeout_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.global.retention_secs)
    }
}
