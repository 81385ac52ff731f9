//! Pipeline execution engine.
//!
//! The `PipelineEngine` turns one user input into at most one commit. It
//! runs the stages `Ingest → Context → Plan → Confirm → Generate → Commit`
//! on a `PipelineState` that is passed by value, and loops back to Generate
//! when the committer rejects an edit that a new generation could fix.

pub mod confirm;
pub mod error;
pub mod input;
pub mod prompt;
pub mod state;

use crate::agents::{AgentManager, ExecutionContext, ARCHITECT, PLANNER, SELECTOR};
use crate::committer::AtomicCommitter;
use crate::engine::confirm::{rank_suggestions, Confirmer, SUGGESTION_LIMIT};
use crate::engine::error::PipelineError;
use crate::engine::input::{parse_input, project_path};
use crate::engine::prompt::{generation_prompt, plan_prompt, selector_prompt, GenerationRequest};
use crate::engine::state::{fail, CommandKind, Flow, PipelineState, RetryContext, Stage, StageResult};
use crate::store::{DocumentStore, StoreError};
use crate::summaries::{content_hash, SummaryCache};
use nk_protocol::config_models::{ConfirmationMode, GlobalConfig};
use nk_protocol::update_models::{
    ConfirmationDecision, DocumentUpdate, FileAction, FilePlan, UpdatePlan,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Pipeline settings taken from the global configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub max_retries: u32,
    pub create_prefix: String,
    pub planning: bool,
    pub confirmation: ConfirmationMode,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&GlobalConfig::default())
    }
}

impl From<&GlobalConfig> for EngineSettings {
    fn from(config: &GlobalConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            create_prefix: config.create_prefix.clone(),
            planning: config.planning,
            confirmation: config.confirmation,
        }
    }
}

/// Where the engine goes after the last stage or a stage failure.
enum Next {
    Retry(PipelineState),
    Done(PipelineState),
}

/// The main pipeline execution engine.
pub struct PipelineEngine {
    store: Arc<dyn DocumentStore>,
    agents: Arc<AgentManager>,
    summaries: Arc<dyn SummaryCache>,
    committer: AtomicCommitter,
    confirmer: Option<Arc<dyn Confirmer>>,
    settings: EngineSettings,
}

impl PipelineEngine {
    /// Create a new PipelineEngine.
    ///
    /// # Arguments
    ///
    /// * `store` - Store holding the documents
    /// * `agents` - Agents by pipeline role; `architect` is required for notes
    /// * `summaries` - Summary cache used for context selection and refreshed
    ///   after each commit
    /// * `settings` - Retry, guardrail and planning settings
    pub fn new(
        store: Arc<dyn DocumentStore>,
        agents: Arc<AgentManager>,
        summaries: Arc<dyn SummaryCache>,
        settings: EngineSettings,
    ) -> Self {
        let committer = AtomicCommitter::new(Arc::clone(&store), &settings.create_prefix)
            .with_enrichment(Arc::clone(&agents), Arc::clone(&summaries));
        Self {
            store,
            agents,
            summaries,
            committer,
            confirmer: None,
            settings,
        }
    }

    /// Set the confirmer asked in interactive confirmation mode.
    pub fn with_confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = Some(confirmer);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Run the pipeline for one input with the configured confirmation mode.
    ///
    /// The returned state holds either the commit (`committed`, `commit_id`,
    /// `changed_files`) or the error the run ended with. A run never panics
    /// and never returns half-applied changes.
    pub async fn run(&self, input: &str) -> PipelineState {
        self.run_with_mode(input, self.settings.confirmation).await
    }

    /// Run the pipeline with an explicit confirmation mode.
    #[tracing::instrument(skip(self))]
    pub async fn run_with_mode(&self, input: &str, confirmation_mode: ConfirmationMode) -> PipelineState {
        let mut state = PipelineState::new(input, confirmation_mode);
        let mut stage = Stage::Ingest;

        loop {
            state.trace.push(stage);
            info!(run_id = %state.run_id, %stage, "stage started");

            match self.run_stage(stage, state).await {
                Ok(Flow::Continue(next_state)) => match stage.next() {
                    Some(next) => {
                        state = next_state;
                        stage = next;
                    }
                    None => match decide_retry(next_state, self.settings.max_retries) {
                        Next::Retry(retry_state) => {
                            state = retry_state;
                            stage = Stage::Generate;
                        }
                        Next::Done(done) => return done,
                    },
                },
                Ok(Flow::Finish(done)) => {
                    info!(run_id = %done.run_id, %stage, "run finished early");
                    return done;
                }
                Err(failure) => {
                    let mut failed = failure.state;
                    debug!(run_id = %failed.run_id, %stage, error = %failure.error, "stage failed");
                    failed.error = Some(failure.error);
                    match decide_retry(failed, self.settings.max_retries) {
                        Next::Retry(retry_state) => {
                            state = retry_state;
                            stage = Stage::Generate;
                        }
                        Next::Done(done) => return done,
                    }
                }
            }
        }
    }

    async fn run_stage(&self, stage: Stage, state: PipelineState) -> StageResult {
        match stage {
            Stage::Ingest => self.ingest(state).await,
            Stage::Context => self.context(state).await,
            Stage::Plan => self.plan(state).await,
            Stage::Confirm => self.confirm(state).await,
            Stage::Generate => self.generate(state).await,
            Stage::Commit => self.commit(state).await,
        }
    }

    async fn ingest(&self, mut state: PipelineState) -> StageResult {
        let parsed = match parse_input(&state.user_input) {
            Ok(parsed) => parsed,
            Err(e) => return fail(state, e),
        };
        state.note = parsed.note;

        match parsed.command {
            CommandKind::List => {
                let pattern = format!("{}/*.md", self.settings.create_prefix.trim_end_matches('/'));
                match self.store.list(&pattern).await {
                    Ok(listing) => state.listing = listing,
                    Err(e) => return fail(state, store_failure("", e)),
                }
                state.command = Some(CommandKind::List);
                Ok(Flow::Finish(state))
            }
            CommandKind::Note { project } => {
                state.target_files = vec![project_path(&self.settings.create_prefix, &project)];
                state.command = Some(CommandKind::Note { project });
                Ok(Flow::Continue(state))
            }
        }
    }

    async fn context(&self, mut state: PipelineState) -> StageResult {
        let documents = match self.store.list("**/*.md").await {
            Ok(documents) => documents,
            Err(e) => return fail(state, store_failure("", e)),
        };

        for path in &documents {
            let content = match self.store.read(path).await {
                Ok(Some(content)) => content,
                Ok(None) => continue,
                Err(e) => return fail(state, store_failure(path, e)),
            };
            if let Some(summary) = self.summaries.get(path, &content_hash(&content)).await {
                state.summaries.insert(path.clone(), summary);
            }
        }

        let mut selected = Vec::new();
        if self.agents.has_agent(SELECTOR) && !state.summaries.is_empty() {
            let context = ExecutionContext::new(selector_prompt(&state.note, &state.summaries));
            match self.agents.generate::<Vec<String>>(SELECTOR, &context).await {
                Ok(paths) => selected = paths.into_iter().filter(|p| documents.contains(p)).collect(),
                Err(e) => warn!(run_id = %state.run_id, error = %e, "context selection failed"),
            }
        }
        // Without a usable selection every document is context
        if selected.is_empty() {
            selected = documents.clone();
        }

        let wanted: Vec<String> = selected.iter().chain(state.target_files.iter()).cloned().collect();
        for path in wanted {
            if state.context_files.contains_key(&path) {
                continue;
            }
            match self.store.read(&path).await {
                Ok(Some(content)) => {
                    state.context_files.insert(path, content);
                }
                Ok(None) => {}
                Err(e) => return fail(state, store_failure(&path, e)),
            }
        }

        debug!(
            run_id = %state.run_id,
            documents = documents.len(),
            selected = selected.len(),
            loaded = state.context_files.len(),
            "context loaded"
        );
        state.selected_files = selected;
        Ok(Flow::Continue(state))
    }

    async fn plan(&self, mut state: PipelineState) -> StageResult {
        let plan = if self.settings.planning && self.agents.has_agent(PLANNER) {
            let documents: Vec<String> = match self.store.list("**/*.md").await {
                Ok(documents) => documents,
                Err(e) => return fail(state, store_failure("", e)),
            };
            let context = ExecutionContext::new(plan_prompt(&state.note, &documents, &state.summaries));
            match self.agents.generate::<UpdatePlan>(PLANNER, &context).await {
                Ok(plan) => plan,
                Err(e) => return fail(state, PipelineError::agent(Stage::Plan.name(), e)),
            }
        } else {
            let Some(target) = state.target_files.first().cloned() else {
                return fail(state, PipelineError::Input("no target document".to_string()));
            };
            let action = if state.context_files.contains_key(&target) {
                FileAction::Modify
            } else {
                FileAction::Create
            };
            UpdatePlan {
                file_plans: vec![FilePlan {
                    target_file: target,
                    action,
                    description: state.note.clone(),
                }],
                ..UpdatePlan::default()
            }
        };

        if plan.file_plans.is_empty() {
            info!(run_id = %state.run_id, "plan is empty, nothing to do");
            state.plan = Some(plan);
            return Ok(Flow::Finish(state));
        }

        state.updates = vec![None; plan.file_plans.len()];
        state.plan = Some(plan);
        Ok(Flow::Continue(state))
    }

    async fn confirm(&self, mut state: PipelineState) -> StageResult {
        if state.confirmation_mode == ConfirmationMode::Auto {
            return Ok(Flow::Continue(state));
        }
        let Some(confirmer) = self.confirmer.clone() else {
            warn!(run_id = %state.run_id, "interactive confirmation without a confirmer, accepting plan");
            return Ok(Flow::Continue(state));
        };
        let Some(mut plan) = state.plan.take() else {
            return Ok(Flow::Continue(state));
        };

        let candidates: Vec<(String, Option<String>)> = match self.store.list("**/*.md").await {
            Ok(documents) => documents
                .into_iter()
                .map(|path| {
                    let summary = state.summaries.get(&path).cloned();
                    (path, summary)
                })
                .collect(),
            Err(e) => {
                state.plan = Some(plan);
                return fail(state, store_failure("", e));
            }
        };

        let suggestions = rank_suggestions(&state.note, &candidates, SUGGESTION_LIMIT);
        for entry in plan.file_plans.iter_mut() {
            if entry.action != FileAction::Create {
                continue;
            }
            let decision = confirmer.confirm(entry, &suggestions).await;
            state.confirmations.push((entry.target_file.clone(), decision.clone()));

            match decision {
                ConfirmationDecision::Confirm => {}
                ConfirmationDecision::Redirect { to } => {
                    let exists = matches!(self.store.exists(&to).await, Ok(true));
                    info!(run_id = %state.run_id, from = %entry.target_file, to = %to, "plan entry redirected");
                    entry.action = if exists { FileAction::Modify } else { FileAction::Create };
                    entry.target_file = to;
                }
                ConfirmationDecision::Cancel => {
                    state.plan = Some(plan);
                    return fail(state, PipelineError::Cancelled);
                }
            }
        }

        state.plan = Some(plan);
        Ok(Flow::Continue(state))
    }

    async fn generate(&self, mut state: PipelineState) -> StageResult {
        let Some(plan) = state.plan.clone() else {
            return fail(state, PipelineError::agent(Stage::Generate.name(), "no plan to generate from"));
        };
        if state.updates.len() != plan.file_plans.len() {
            state.updates.resize(plan.file_plans.len(), None);
        }

        for (index, entry) in plan.file_plans.iter().enumerate() {
            if state.updates[index].is_some() {
                continue;
            }

            if entry.action == FileAction::Delete {
                state.updates[index] = Some(DocumentUpdate::delete(&entry.target_file));
                continue;
            }

            let current = match self.store.read(&entry.target_file).await {
                Ok(current) => current,
                Err(e) => return fail(state, store_failure(&entry.target_file, e)),
            };
            let retry = state
                .retry
                .as_ref()
                .filter(|r| r.file_index.map_or(true, |i| i == index));
            let prompt = generation_prompt(&GenerationRequest {
                note: &state.note,
                plan: entry,
                current: current.as_deref(),
                context: &state.context_files,
                retry,
            });
            let context = ExecutionContext::new(prompt);

            let mut update = match self.agents.generate::<DocumentUpdate>(ARCHITECT, &context).await {
                Ok(update) => update,
                Err(e) => return fail(state, PipelineError::agent(Stage::Generate.name(), e)),
            };

            if update.target_file != entry.target_file {
                warn!(
                    run_id = %state.run_id,
                    planned = %entry.target_file,
                    generated = %update.target_file,
                    "generated update targets another file, overriding"
                );
                update.target_file = entry.target_file.clone();
            }
            if update.delete_file {
                return fail(
                    state,
                    PipelineError::agent(Stage::Generate.name(), "generated a delete for a non-delete plan entry"),
                );
            }
            if entry.action == FileAction::Create {
                update.create_if_missing = true;
            }
            if let Some(reason) = update.shape_error() {
                return fail(state, PipelineError::agent(Stage::Generate.name(), reason));
            }

            debug!(run_id = %state.run_id, file = %entry.target_file, edits = update.edits.len(), "update generated");
            state.updates[index] = Some(update);
        }

        Ok(Flow::Continue(state))
    }

    async fn commit(&self, mut state: PipelineState) -> StageResult {
        let expected = state.plan.as_ref().map_or(0, |p| p.file_plans.len());
        let updates: Vec<DocumentUpdate> = state.updates.iter().flatten().cloned().collect();
        if updates.len() != expected {
            return fail(
                state,
                PipelineError::PlanMismatch {
                    expected,
                    actual: updates.len(),
                },
            );
        }

        let plan_message = state
            .plan
            .as_ref()
            .map(|p| p.commit_message.trim().to_string())
            .unwrap_or_default();
        let message = match (plan_message.is_empty(), updates.as_slice()) {
            (false, _) => plan_message,
            (true, [single]) => single.commit_message.clone(),
            (true, _) => String::new(),
        };

        match self.committer.commit(&updates, &message).await {
            Ok(outcome) => {
                state.committed = true;
                state.commit_id = outcome.commit_id;
                state.commit_message = outcome.message;
                state.changed_files = outcome.changed;
                state.deleted_files = outcome.deleted;
                state.failed_index = None;
                state.retry = None;
                Ok(Flow::Continue(state))
            }
            Err(failure) => {
                state.failed_index = failure.index;
                fail(state, failure.error)
            }
        }
    }
}

/// Decide between success, another generation and terminal failure.
fn decide_retry(mut state: PipelineState, max_retries: u32) -> Next {
    if state.committed {
        info!(run_id = %state.run_id, commit = ?state.commit_id, retries = state.retry_count, "run committed");
        return Next::Done(state);
    }
    let Some(error) = state.error.clone() else {
        return Next::Done(state);
    };

    if error.is_retryable() && state.retry_count < max_retries {
        state.retry_count += 1;
        warn!(
            run_id = %state.run_id,
            attempt = state.retry_count,
            max_retries,
            error = %error,
            "retrying generation"
        );

        match state.failed_index {
            Some(index) if index < state.updates.len() => state.updates[index] = None,
            _ => state.updates.iter_mut().for_each(|slot| *slot = None),
        }
        state.retry = Some(retry_context(&error, state.failed_index, &state));
        state.error = None;
        state.failed_index = None;
        return Next::Retry(state);
    }

    error!(
        run_id = %state.run_id,
        kind = %error.kind(),
        retries = state.retry_count,
        error = %error,
        "run failed"
    );
    Next::Done(state)
}

fn retry_context(error: &PipelineError, file_index: Option<usize>, state: &PipelineState) -> RetryContext {
    let (target_file, search) = match error {
        PipelineError::SearchNotFound { file, search, .. } | PipelineError::Ambiguous { file, search, .. } => {
            (file.clone(), search.clone())
        }
        _ => (
            state.target_files.first().cloned().unwrap_or_default(),
            String::new(),
        ),
    };
    RetryContext {
        file_index,
        target_file,
        search,
        message: error.detail(),
    }
}

fn store_failure(path: &str, error: StoreError) -> PipelineError {
    PipelineError::Commit {
        path: path.to_string(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::MockAgent;
    use crate::edit::EditError;
    use crate::store::MemoryStore;
    use crate::summaries::JsonSummaryCache;

    fn engine_with(store: Arc<MemoryStore>, architect: MockAgent) -> PipelineEngine {
        let agents = AgentManager::default().with_agent(ARCHITECT, Arc::new(architect));
        PipelineEngine::new(
            store,
            Arc::new(agents),
            Arc::new(JsonSummaryCache::in_memory()),
            EngineSettings::default(),
        )
    }

    fn not_found() -> PipelineError {
        PipelineError::from_edit(
            "projects/a.md",
            EditError::NotFound {
                edit_number: 1,
                search: "missing".to_string(),
                nearby: vec![],
            },
        )
    }

    #[test]
    fn test_decide_retry_clears_failed_slot() {
        let mut state = PipelineState::new("/a x", ConfirmationMode::Auto);
        state.updates = vec![
            Some(DocumentUpdate::delete("projects/old.md")),
            Some(DocumentUpdate::create("projects/a.md", "# A\n")),
        ];
        state.error = Some(not_found());
        state.failed_index = Some(1);

        let Next::Retry(state) = decide_retry(state, 3) else {
            panic!("expected a retry");
        };

        assert_eq!(state.retry_count, 1);
        assert!(state.error.is_none());
        assert!(state.updates[0].is_some());
        assert!(state.updates[1].is_none());
        let retry = state.retry.expect("retry context");
        assert_eq!(retry.file_index, Some(1));
        assert_eq!(retry.search, "missing");
    }

    #[test]
    fn test_decide_retry_stops_at_limit() {
        let mut state = PipelineState::new("/a x", ConfirmationMode::Auto);
        state.error = Some(not_found());
        state.retry_count = 3;

        let Next::Done(state) = decide_retry(state, 3) else {
            panic!("expected the run to end");
        };
        assert_eq!(state.error, Some(not_found()));
        assert_eq!(state.retry_count, 3);
    }

    #[test]
    fn test_decide_retry_never_retries_fatal_errors() {
        let mut state = PipelineState::new("/a x", ConfirmationMode::Auto);
        state.error = Some(PipelineError::MissingFile {
            path: "projects/a.md".to_string(),
        });

        assert!(matches!(decide_retry(state, 3), Next::Done(s) if s.retry_count == 0));
    }

    #[tokio::test]
    async fn test_list_finishes_after_ingest() {
        let store = Arc::new(MemoryStore::with_files([
            ("projects/a.md", "# A\n"),
            ("sessions/s.md", "# S\n"),
        ]));
        let engine = engine_with(store, MockAgent::success());

        let state = engine.run("/list").await;

        assert!(state.succeeded());
        assert_eq!(state.trace, vec![Stage::Ingest]);
        assert_eq!(state.listing, vec!["projects/a.md"]);
    }

    #[tokio::test]
    async fn test_synthesized_plan_modifies_existing_document() {
        let store = Arc::new(MemoryStore::with_files([("projects/a.md", "# A\n")]));
        let architect = MockAgent::responding(vec![
            r#"{"target_file":"projects/a.md","edits":[{"search":"","replace":"- x\n"}],"commit_message":"a: add x"}"#,
        ]);
        let engine = engine_with(store.clone(), architect);

        let state = engine.run("/a add x").await;

        assert!(state.succeeded(), "{:?}", state.error);
        let plan = state.plan.expect("plan");
        assert_eq!(plan.file_plans[0].action, FileAction::Modify);
        assert_eq!(state.commit_message, "a: add x");
        assert_eq!(store.files().await["projects/a.md"], "# A\n- x\n");
    }

    #[tokio::test]
    async fn test_context_loads_every_document_without_summaries() {
        let store = Arc::new(MemoryStore::with_files([
            ("projects/a.md", "# A\n"),
            ("projects/b.md", "# B\n"),
        ]));
        let architect = MockAgent::responding(vec![
            r#"{"target_file":"projects/a.md","edits":[{"search":"","replace":"- see b\n"}]}"#,
        ]);
        let engine = engine_with(store, architect);

        let state = engine.run("/a see b").await;

        assert!(state.succeeded(), "{:?}", state.error);
        assert_eq!(state.selected_files, vec!["projects/a.md", "projects/b.md"]);
        let loaded: Vec<_> = state.context_files.keys().cloned().collect();
        assert_eq!(loaded, vec!["projects/a.md", "projects/b.md"]);
    }

    #[tokio::test]
    async fn test_mismatched_target_is_overridden() {
        let store = Arc::new(MemoryStore::new());
        let architect = MockAgent::responding(vec![
            r##"{"target_file":"projects/other.md","full_content":"# Garden\n"}"##,
        ]);
        let engine = engine_with(store.clone(), architect);

        let state = engine.run("/garden start").await;

        assert!(state.succeeded(), "{:?}", state.error);
        assert_eq!(state.changed_files, vec!["projects/garden.md"]);
        assert!(!store.files().await.contains_key("projects/other.md"));
    }

    #[tokio::test]
    async fn test_generated_delete_is_an_agent_error() {
        let store = Arc::new(MemoryStore::with_files([("projects/a.md", "# A\n")]));
        let architect = MockAgent::responding(vec![r#"{"target_file":"projects/a.md","delete_file":true}"#]);
        let engine = engine_with(store.clone(), architect);

        let state = engine.run("/a drop it").await;

        assert!(matches!(state.error, Some(PipelineError::Agent { .. })));
        assert_eq!(state.retry_count, 0);
        assert_eq!(store.commits().await.len(), 0);
    }
}
