//! Everything a command needs to work on one project root.

use color_eyre::eyre::{eyre, WrapErr};
use nk_core::agents::AgentManager;
use nk_core::config::loader::load_config;
use nk_core::config::AppConfig;
use nk_core::engine::input::{project_path, validate_project_name};
use nk_core::engine::{EngineSettings, PipelineEngine};
use nk_core::store::GitStore;
use nk_core::summaries::JsonSummaryCache;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub struct Workspace {
    pub config: AppConfig,
    pub data_dir: PathBuf,
    pub store: Arc<GitStore>,
    pub agents: Arc<AgentManager>,
    pub summaries: Arc<JsonSummaryCache>,
}

impl Workspace {
    /// Load the configuration below `root` and open the data repository,
    /// creating it when missing.
    pub async fn open(root: &Path) -> color_eyre::Result<Self> {
        let config = load_config(root)
            .await
            .wrap_err_with(|| format!("failed to load configuration from {}", root.display()))?;
        let data_dir = config.data_dir(root);

        let store = GitStore::new(&data_dir)
            .with_author(&config.global.git_author_name, &config.global.git_author_email);
        store
            .ensure_repository()
            .await
            .wrap_err_with(|| format!("failed to open data repository {}", data_dir.display()))?;

        let summaries = JsonSummaryCache::open(&data_dir).await?;
        let agents = AgentManager::new(config.agents.clone()).with_timeout(config.agent_timeout());
        debug!(data_dir = %data_dir.display(), agents = ?agents.list_agents(), "workspace opened");

        Ok(Self {
            config,
            data_dir,
            store: Arc::new(store),
            agents: Arc::new(agents),
            summaries: Arc::new(summaries),
        })
    }

    pub fn settings(&self) -> EngineSettings {
        EngineSettings::from(&self.config.global)
    }

    pub fn engine(&self, settings: EngineSettings) -> PipelineEngine {
        PipelineEngine::new(
            self.store.clone(),
            Arc::clone(&self.agents),
            self.summaries.clone(),
            settings,
        )
    }

    /// Store path of a project document.
    pub fn project_path(&self, project: &str) -> color_eyre::Result<String> {
        validate_project_name(project).map_err(|e| eyre!(e))?;
        Ok(project_path(&self.config.global.create_prefix, project))
    }
}
