//! Pipeline run state.
//!
//! One `PipelineState` is threaded through every stage. Stages take it by
//! value and hand back a new one, so a stage never observes a half-updated
//! state of another.

use crate::engine::error::PipelineError;
use nk_protocol::config_models::ConfirmationMode;
use nk_protocol::update_models::{ConfirmationDecision, DocumentUpdate, UpdatePlan};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Ingest,
    Context,
    Plan,
    Confirm,
    Generate,
    Commit,
}

impl Stage {
    /// The stage that follows this one, `None` after Commit.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Ingest => Some(Stage::Context),
            Stage::Context => Some(Stage::Plan),
            Stage::Plan => Some(Stage::Confirm),
            Stage::Confirm => Some(Stage::Generate),
            Stage::Generate => Some(Stage::Commit),
            Stage::Commit => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Context => "context",
            Stage::Plan => "plan",
            Stage::Confirm => "confirm",
            Stage::Generate => "generate",
            Stage::Commit => "commit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// Integrate a note into a project document.
    Note { project: String },
    /// List the project documents.
    List,
}

/// Information handed to the generator after a retryable failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryContext {
    /// Plan entry whose update failed. `None` when the failure could not be
    /// attributed to one entry.
    pub file_index: Option<usize>,
    pub target_file: String,
    /// The search text that was missing or ambiguous.
    pub search: String,
    /// Full failure description, near-miss lines included.
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct PipelineState {
    /// Correlates the log lines of one run.
    pub run_id: Uuid,
    pub user_input: String,
    pub command: Option<CommandKind>,
    /// The note text without the command prefix.
    pub note: String,
    pub target_files: Vec<String>,
    /// Documents loaded as context, by path.
    pub context_files: BTreeMap<String, String>,
    /// Cached summaries, by path.
    pub summaries: BTreeMap<String, String>,
    pub selected_files: Vec<String>,
    /// Project documents, filled by the list command.
    pub listing: Vec<String>,
    pub plan: Option<UpdatePlan>,
    pub confirmation_mode: ConfirmationMode,
    pub confirmations: Vec<(String, ConfirmationDecision)>,
    /// One slot per plan entry. A slot is emptied when its update has to be
    /// generated again.
    pub updates: Vec<Option<DocumentUpdate>>,
    pub error: Option<PipelineError>,
    /// Plan entry the last commit failure belongs to.
    pub failed_index: Option<usize>,
    pub committed: bool,
    pub commit_id: Option<String>,
    pub commit_message: String,
    pub changed_files: Vec<String>,
    pub deleted_files: Vec<String>,
    pub retry_count: u32,
    pub retry: Option<RetryContext>,
    /// Stages visited, in order.
    pub trace: Vec<Stage>,
}

impl PipelineState {
    pub fn new(user_input: &str, confirmation_mode: ConfirmationMode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            user_input: user_input.to_string(),
            command: None,
            note: String::new(),
            target_files: Vec::new(),
            context_files: BTreeMap::new(),
            summaries: BTreeMap::new(),
            selected_files: Vec::new(),
            listing: Vec::new(),
            plan: None,
            confirmation_mode,
            confirmations: Vec::new(),
            updates: Vec::new(),
            error: None,
            failed_index: None,
            committed: false,
            commit_id: None,
            commit_message: String::new(),
            changed_files: Vec::new(),
            deleted_files: Vec::new(),
            retry_count: 0,
            retry: None,
            trace: Vec::new(),
        }
    }

    /// True when the run ended without error.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// How many times a stage ran.
    pub fn visits(&self, stage: Stage) -> usize {
        self.trace.iter().filter(|s| **s == stage).count()
    }

    /// Paths written or deleted by the run.
    pub fn updated_docs(&self) -> Vec<String> {
        self.changed_files
            .iter()
            .chain(self.deleted_files.iter())
            .cloned()
            .collect()
    }
}

/// How a stage hands over to the engine.
#[derive(Debug)]
pub enum Flow {
    /// Go on with the next stage.
    Continue(PipelineState),
    /// End the run successfully without running later stages.
    Finish(PipelineState),
}

/// A failed stage: the state as it was plus the typed error.
#[derive(Debug)]
pub struct StageFailure {
    pub state: PipelineState,
    pub error: PipelineError,
}

pub type StageResult = Result<Flow, Box<StageFailure>>;

/// Fail a stage.
pub(crate) fn fail(state: PipelineState, error: PipelineError) -> StageResult {
    Err(Box::new(StageFailure { state, error }))
}
