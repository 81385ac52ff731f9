//! Pipeline error taxonomy.
//!
//! Every failure a pipeline run can end with is one typed variant.
//! Retry decisions match on the variant, never on message text.

use crate::edit::EditError;
use std::fmt;
use thiserror::Error;

/// Coarse error category shown to users and used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Guardrail,
    NotFound,
    Ambiguous,
    Agent,
    Commit,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Input => "input",
            ErrorKind::Guardrail => "guardrail",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Ambiguous => "ambiguous",
            ErrorKind::Agent => "agent",
            ErrorKind::Commit => "commit",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The user input cannot be routed to a document.
    #[error("Invalid input: {0}")]
    Input(String),

    /// A new document outside the allowed prefix.
    #[error("Refusing to create {path}: new documents must live under {allowed_prefix}")]
    Guardrail { path: String, allowed_prefix: String },

    /// An update targets a missing document without permission to create it.
    #[error("{path} does not exist and the update does not allow creating it")]
    MissingFile { path: String },

    #[error("{file}: edit {edit_number} search text not found")]
    SearchNotFound {
        file: String,
        edit_number: usize,
        search: String,
        nearby: Vec<(usize, String)>,
    },

    #[error("{file}: edit {edit_number} search text appears {occurrences} times")]
    Ambiguous {
        file: String,
        edit_number: usize,
        search: String,
        occurrences: usize,
    },

    /// An agent failed or produced unusable output.
    #[error("{stage} agent failed: {message}")]
    Agent { stage: String, message: String },

    /// The number of generated updates differs from the plan.
    #[error("Plan has {expected} entries but {actual} updates were generated")]
    PlanMismatch { expected: usize, actual: usize },

    #[error("Cancelled by user")]
    Cancelled,

    /// Writing or committing failed.
    #[error("Commit failed for {path}: {message}")]
    Commit { path: String, message: String },
}

impl PipelineError {
    /// Attach the file name to an edit failure.
    pub fn from_edit(file: &str, error: EditError) -> Self {
        match error {
            EditError::NotFound {
                edit_number,
                search,
                nearby,
            } => PipelineError::SearchNotFound {
                file: file.to_string(),
                edit_number,
                search,
                nearby,
            },
            EditError::Ambiguous {
                edit_number,
                search,
                occurrences,
            } => PipelineError::Ambiguous {
                file: file.to_string(),
                edit_number,
                search,
                occurrences,
            },
        }
    }

    pub fn agent(stage: &str, message: impl fmt::Display) -> Self {
        PipelineError::Agent {
            stage: stage.to_string(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Input(_) => ErrorKind::Input,
            PipelineError::Guardrail { .. } => ErrorKind::Guardrail,
            PipelineError::SearchNotFound { .. } => ErrorKind::NotFound,
            PipelineError::Ambiguous { .. } => ErrorKind::Ambiguous,
            PipelineError::Agent { .. } => ErrorKind::Agent,
            PipelineError::MissingFile { .. }
            | PipelineError::PlanMismatch { .. }
            | PipelineError::Commit { .. } => ErrorKind::Commit,
            PipelineError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Only edit failures can be fixed by generating again.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound | ErrorKind::Ambiguous)
    }

    /// The message plus the offending search text and near-miss lines.
    pub fn detail(&self) -> String {
        match self {
            PipelineError::SearchNotFound { search, nearby, .. } => {
                let mut text = format!("{self}\nsearch text:\n{search}");
                if !nearby.is_empty() {
                    text.push_str("\nsimilar lines:");
                    for (line, content) in nearby {
                        text.push_str(&format!("\n  {line}: {content}"));
                    }
                }
                text
            }
            PipelineError::Ambiguous { search, .. } => format!("{self}\nsearch text:\n{search}"),
            _ => self.to_string(),
        }
    }
}
