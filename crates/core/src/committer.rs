//! All-or-nothing application of document updates.
//!
//! A batch of updates is committed in two phases:
//!
//! 1. **Validate**: read current content, check guardrails and apply every
//!    edit in memory. Nothing is written. The first failure aborts the batch.
//! 2. **Apply**: delete, write, then record everything in exactly one
//!    commit. This phase runs on its own task so cancelling the caller
//!    cannot stop it halfway.
//!
//! After a successful commit the summary cache is refreshed on a best-effort
//! basis; failures there are logged and never undo the commit.

use crate::agents::{AgentManager, ExecutionContext, SUMMARIZER};
use crate::edit::apply_update;
use crate::engine::error::PipelineError;
use crate::engine::prompt::summary_prompt;
use crate::store::{normalize_path, DocumentStore, StoreError};
use crate::summaries::{content_hash, SummaryCache};
use nk_protocol::update_models::DocumentUpdate;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A validated change to one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Write { path: String, content: String },
    Delete { path: String },
}

impl Change {
    pub fn path(&self) -> &str {
        match self {
            Change::Write { path, .. } | Change::Delete { path } => path,
        }
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Paths written, in first-touch order.
    pub changed: Vec<String>,
    pub deleted: Vec<String>,
    /// `None` when the batch left every document unchanged.
    pub commit_id: Option<String>,
    pub message: String,
    /// Summaries refreshed after the commit.
    pub summaries_refreshed: usize,
}

/// Why a batch was not committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFailure {
    /// Index of the update that failed validation. `None` for failures
    /// while applying.
    pub index: Option<usize>,
    pub error: PipelineError,
}

impl CommitFailure {
    fn at(index: usize, error: PipelineError) -> Self {
        Self {
            index: Some(index),
            error,
        }
    }
}

/// Summary refresh after a commit.
struct Enrichment {
    agents: Arc<AgentManager>,
    cache: Arc<dyn SummaryCache>,
}

pub struct AtomicCommitter {
    store: Arc<dyn DocumentStore>,
    create_prefix: String,
    enrichment: Option<Enrichment>,
}

impl AtomicCommitter {
    /// # Arguments
    ///
    /// * `store` - Store the updates are applied to
    /// * `create_prefix` - Only paths below this prefix may be created
    pub fn new(store: Arc<dyn DocumentStore>, create_prefix: &str) -> Self {
        Self {
            store,
            create_prefix: create_prefix.to_string(),
            enrichment: None,
        }
    }

    /// Refresh summaries of changed documents after each commit.
    pub fn with_enrichment(mut self, agents: Arc<AgentManager>, cache: Arc<dyn SummaryCache>) -> Self {
        self.enrichment = Some(Enrichment { agents, cache });
        self
    }

    /// Validate `updates` without writing anything.
    ///
    /// Later updates see the result of earlier ones on the same path. The
    /// returned changes hold the final state of every touched path that
    /// differs from the store.
    ///
    /// # Errors
    ///
    /// The first failing update, as a `CommitFailure` carrying its index:
    /// - `MissingFile` for a delete of, or an edit to, a missing document
    ///   without `create_if_missing`
    /// - `Guardrail` for a new document outside the creation prefix
    /// - `SearchNotFound` / `Ambiguous` from the edit validator
    pub async fn validate(&self, updates: &[DocumentUpdate]) -> Result<Vec<Change>, CommitFailure> {
        let mut order: Vec<String> = Vec::new();
        let mut originals: HashMap<String, Option<String>> = HashMap::new();
        let mut scratch: HashMap<String, Option<String>> = HashMap::new();

        for (index, update) in updates.iter().enumerate() {
            let path = normalize_path(&update.target_file).map_err(|_| {
                CommitFailure::at(
                    index,
                    PipelineError::Guardrail {
                        path: update.target_file.clone(),
                        allowed_prefix: self.create_prefix.clone(),
                    },
                )
            })?;

            if let Some(reason) = update.shape_error() {
                return Err(CommitFailure::at(
                    index,
                    PipelineError::Commit {
                        path,
                        message: reason.to_string(),
                    },
                ));
            }

            let current = match scratch.get(&path) {
                Some(content) => content.clone(),
                None => {
                    let content = self
                        .store
                        .read(&path)
                        .await
                        .map_err(|e| CommitFailure::at(index, store_error(&path, e)))?;
                    order.push(path.clone());
                    originals.insert(path.clone(), content.clone());
                    content
                }
            };

            if update.delete_file {
                if current.is_none() {
                    return Err(CommitFailure::at(index, PipelineError::MissingFile { path }));
                }
                scratch.insert(path, None);
                continue;
            }

            if current.is_none() {
                if !update.create_if_missing {
                    return Err(CommitFailure::at(index, PipelineError::MissingFile { path }));
                }
                if !path.starts_with(&self.create_prefix) {
                    return Err(CommitFailure::at(
                        index,
                        PipelineError::Guardrail {
                            path,
                            allowed_prefix: self.create_prefix.clone(),
                        },
                    ));
                }
            }

            let content = apply_update(current.as_deref(), update)
                .map_err(|e| CommitFailure::at(index, PipelineError::from_edit(&path, e)))?;
            scratch.insert(path, Some(content));
        }

        let changes = order
            .into_iter()
            .filter_map(|path| {
                let original = originals.remove(&path).flatten();
                match scratch.remove(&path).flatten() {
                    Some(content) if original.as_deref() != Some(content.as_str()) => {
                        Some(Change::Write { path, content })
                    }
                    None if original.is_some() => Some(Change::Delete { path }),
                    _ => None,
                }
            })
            .collect();

        Ok(changes)
    }

    /// Validate and apply `updates` as one commit.
    ///
    /// An empty `message` is replaced by one naming the changed paths.
    #[tracing::instrument(skip_all, fields(updates = updates.len()))]
    pub async fn commit(
        &self,
        updates: &[DocumentUpdate],
        message: &str,
    ) -> Result<CommitOutcome, CommitFailure> {
        let changes = self.validate(updates).await?;

        let message = if message.trim().is_empty() {
            default_message(&changes)
        } else {
            message.trim().to_string()
        };

        let mut outcome = self.apply(changes.clone(), message).await?;

        if let Some(enrichment) = &self.enrichment {
            outcome.summaries_refreshed = enrichment.refresh(&changes).await;
        }

        Ok(outcome)
    }

    async fn apply(&self, changes: Vec<Change>, message: String) -> Result<CommitOutcome, CommitFailure> {
        let changed: Vec<String> = changes
            .iter()
            .filter_map(|c| match c {
                Change::Write { path, .. } => Some(path.clone()),
                Change::Delete { .. } => None,
            })
            .collect();
        let deleted: Vec<String> = changes
            .iter()
            .filter_map(|c| match c {
                Change::Delete { path } => Some(path.clone()),
                Change::Write { .. } => None,
            })
            .collect();

        if changes.is_empty() {
            info!("no document changed, skipping commit");
            return Ok(CommitOutcome {
                message,
                ..CommitOutcome::default()
            });
        }

        let store = Arc::clone(&self.store);
        let task_changed = changed.clone();
        let task_deleted = deleted.clone();
        let task_message = message.clone();

        // Detached from the caller: dropping the caller's future does not
        // abort a half-written batch.
        let handle = tokio::spawn(async move {
            let mut originals: Vec<(String, Option<String>)> = Vec::new();
            let result = write_all(store.as_ref(), &changes, &mut originals).await;
            let result = match result {
                Ok(()) => store
                    .commit(&task_changed, &task_deleted, &task_message)
                    .await
                    .map_err(|e| ("commit".to_string(), e)),
                Err(e) => Err(e),
            };
            if result.is_err() {
                roll_back(store.as_ref(), originals).await;
            }
            result
        });

        let commit_id = match handle.await {
            Ok(Ok(id)) => id,
            Ok(Err((path, e))) => {
                return Err(CommitFailure {
                    index: None,
                    error: store_error(&path, e),
                })
            }
            Err(e) => {
                return Err(CommitFailure {
                    index: None,
                    error: PipelineError::Commit {
                        path: String::new(),
                        message: format!("apply task failed: {e}"),
                    },
                })
            }
        };

        info!(commit = %commit_id, changed = changed.len(), deleted = deleted.len(), "committed");
        Ok(CommitOutcome {
            changed,
            deleted,
            commit_id: Some(commit_id),
            message,
            summaries_refreshed: 0,
        })
    }
}

/// Perform deletes then writes, remembering the prior content of each path.
async fn write_all(
    store: &dyn DocumentStore,
    changes: &[Change],
    originals: &mut Vec<(String, Option<String>)>,
) -> Result<(), (String, StoreError)> {
    let deletes = changes.iter().filter(|c| matches!(c, Change::Delete { .. }));
    let writes = changes.iter().filter(|c| matches!(c, Change::Write { .. }));

    for change in deletes.chain(writes) {
        let path = change.path();
        let before = store.read(path).await.map_err(|e| (path.to_string(), e))?;
        originals.push((path.to_string(), before));
        let result = match change {
            Change::Delete { path } => store.delete(path).await,
            Change::Write { path, content } => store.write(path, content).await,
        };
        result.map_err(|e| (path.to_string(), e))?;
        debug!(path, "applied change");
    }
    Ok(())
}

/// Restore prior content after a failed apply.
async fn roll_back(store: &dyn DocumentStore, originals: Vec<(String, Option<String>)>) {
    for (path, before) in originals.into_iter().rev() {
        let result = match &before {
            Some(content) => store.write(&path, content).await,
            None => match store.delete(&path).await {
                Err(StoreError::NotFound(_)) => Ok(()),
                other => other,
            },
        };
        if let Err(e) = result {
            warn!(path = %path, error = %e, "failed to restore document after aborted commit");
        }
    }
}

fn store_error(path: &str, error: StoreError) -> PipelineError {
    PipelineError::Commit {
        path: path.to_string(),
        message: error.to_string(),
    }
}

fn default_message(changes: &[Change]) -> String {
    let paths: Vec<&str> = changes.iter().map(Change::path).collect();
    format!("Update {}", paths.join(", "))
}

impl Enrichment {
    /// Returns the number of summaries written.
    async fn refresh(&self, changes: &[Change]) -> usize {
        let mut refreshed = 0;
        let summarize = self.agents.has_agent(SUMMARIZER);

        for change in changes {
            match change {
                Change::Delete { path } => {
                    if let Err(e) = self.cache.remove(path).await {
                        warn!(path = %path, error = %e, "failed to drop summary");
                    }
                }
                Change::Write { path, content } if summarize => {
                    let hash = content_hash(content);
                    if self.cache.get(path, &hash).await.is_some() {
                        continue;
                    }
                    let context = ExecutionContext::new(summary_prompt(path, content));
                    let summary = match self.agents.generate_text(SUMMARIZER, &context).await {
                        Ok(summary) => summary,
                        Err(e) => {
                            warn!(path = %path, error = %e, "summary refresh failed");
                            continue;
                        }
                    };
                    match self.cache.set(path, &hash, &summary).await {
                        Ok(()) => refreshed += 1,
                        Err(e) => warn!(path = %path, error = %e, "failed to store summary"),
                    }
                }
                Change::Write { .. } => {}
            }
        }
        refreshed
    }
}
