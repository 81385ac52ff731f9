//! Test fixtures for creating sample configurations, engines and handlers.

use async_trait::async_trait;
use nk_core::agents::{AgentManager, MockAgent, ARCHITECT};
use nk_core::engine::{EngineSettings, PipelineEngine};
use nk_core::state::MessageHandler;
use nk_core::store::MemoryStore;
use nk_core::summaries::JsonSummaryCache;
use nk_protocol::message_models::MessageResult;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;

/// Create a temporary project directory with `.notekit` configuration.
///
/// This creates:
/// - `.notekit/config.toml` with a custom creation prefix
/// - `.notekit/agents/architect.md`
///
/// Returns a TempDir that must be kept alive for the test duration.
#[allow(dead_code)]
pub fn create_test_project() -> std::io::Result<TempDir> {
    let temp_dir = tempfile::tempdir()?;
    let root = temp_dir.path();

    std::fs::create_dir_all(root.join(".notekit/agents"))?;
    std::fs::write(
        root.join(".notekit/config.toml"),
        "data_dir = \"library\"\nmax_retries = 2\ncreate_prefix = \"notes/\"\n",
    )?;
    std::fs::write(
        root.join(".notekit/agents/architect.md"),
        "---\nname: architect\ndescription: Test architect\nmodel: test-model\nrole: architect\n---\nUpdate documents.\n",
    )?;

    Ok(temp_dir)
}

/// Agent manager with only an architect.
#[allow(dead_code)]
pub fn architect_only(architect: &MockAgent) -> AgentManager {
    AgentManager::default().with_agent(ARCHITECT, Arc::new(architect.clone()))
}

/// Engine over `store` with default settings and an in-memory summary cache.
#[allow(dead_code)]
pub fn create_engine(store: &Arc<MemoryStore>, agents: AgentManager) -> PipelineEngine {
    create_engine_with(store, agents, EngineSettings::default())
}

#[allow(dead_code)]
pub fn create_engine_with(
    store: &Arc<MemoryStore>,
    agents: AgentManager,
    settings: EngineSettings,
) -> PipelineEngine {
    PipelineEngine::new(
        store.clone(),
        Arc::new(agents),
        Arc::new(JsonSummaryCache::in_memory()),
        settings,
    )
}

/// Handler that records what it saw and how many ran at once.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingHandler {
    pub seen: Mutex<Vec<String>>,
    pub running: Mutex<usize>,
    pub max_running: Mutex<usize>,
    pub delay: Duration,
}

#[allow(dead_code)]
impl RecordingHandler {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(&self, content: &str) -> anyhow::Result<MessageResult> {
        {
            let mut running = self.running.lock().await;
            *running += 1;
            let mut max = self.max_running.lock().await;
            *max = (*max).max(*running);
        }
        self.seen.lock().await.push(content.to_string());
        tokio::time::sleep(self.delay).await;
        *self.running.lock().await -= 1;

        if content.contains("fail") {
            anyhow::bail!("could not handle '{content}'");
        }
        Ok(MessageResult::reply(format!("handled {content}")))
    }
}

/// Poll interval short enough for tests.
#[allow(dead_code)]
pub fn fast_queue_settings() -> nk_core::state::QueueSettings {
    nk_core::state::QueueSettings {
        poll_interval: Duration::from_millis(10),
        retention: Duration::from_secs(600),
    }
}

/// True when the git binary is available.
#[allow(dead_code)]
pub fn git_available() -> bool {
    which::which("git").is_ok()
}
