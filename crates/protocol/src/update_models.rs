//! Structured output of the planning and generation agents.
//!
//! Agents answer with JSON matching these types. The core validates the
//! shape before anything touches the document store.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A single search/replace edit.
///
/// An empty `search` means "append `replace` to the end of the document".
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct Edit {
    /// Exact text to find. Must occur exactly once in the document.
    #[serde(default)]
    pub search: String,

    /// Text that replaces the match.
    #[serde(default)]
    pub replace: String,
}

impl Edit {
    pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replace: replace.into(),
        }
    }

    /// Shorthand for an edit that appends `text`.
    pub fn append(text: impl Into<String>) -> Self {
        Self::new(String::new(), text)
    }

    pub fn is_append(&self) -> bool {
        self.search.is_empty()
    }
}

/// A proposed change to one document.
///
/// Exactly one of three shapes is valid:
/// - `delete_file` set, no body and no edits
/// - `full_content` set, no edits
/// - one or more `edits`, no body
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct DocumentUpdate {
    /// Path of the document, relative to the data directory.
    pub target_file: String,

    /// Full replacement body. Used for new documents.
    #[serde(default)]
    pub full_content: Option<String>,

    /// Ordered edits applied to the current content.
    #[serde(default)]
    pub edits: Vec<Edit>,

    /// Commit message proposed by the agent.
    #[serde(default)]
    pub commit_message: String,

    /// Allow creating the document when it does not exist yet.
    #[serde(default)]
    pub create_if_missing: bool,

    /// Delete the document instead of writing it.
    #[serde(default)]
    pub delete_file: bool,
}

impl DocumentUpdate {
    /// An update that applies `edits` to an existing document.
    pub fn with_edits(target_file: impl Into<String>, edits: Vec<Edit>) -> Self {
        Self {
            target_file: target_file.into(),
            full_content: None,
            edits,
            commit_message: String::new(),
            create_if_missing: false,
            delete_file: false,
        }
    }

    /// An update that creates (or overwrites) a document with `content`.
    pub fn create(target_file: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            target_file: target_file.into(),
            full_content: Some(content.into()),
            edits: Vec::new(),
            commit_message: String::new(),
            create_if_missing: true,
            delete_file: false,
        }
    }

    /// An update that deletes a document.
    pub fn delete(target_file: impl Into<String>) -> Self {
        Self {
            target_file: target_file.into(),
            full_content: None,
            edits: Vec::new(),
            commit_message: String::new(),
            create_if_missing: false,
            delete_file: true,
        }
    }

    pub fn with_commit_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = message.into();
        self
    }

    /// Describe why this update is malformed, or `None` if its shape is valid.
    pub fn shape_error(&self) -> Option<&'static str> {
        if self.target_file.trim().is_empty() {
            return Some("target_file is empty");
        }
        if self.delete_file {
            if !self.edits.is_empty() || self.full_content.is_some() {
                return Some("a delete must not carry edits or content");
            }
            return None;
        }
        match (&self.full_content, self.edits.is_empty()) {
            (Some(_), false) => Some("full_content and edits are mutually exclusive"),
            (None, true) => Some("update has neither full_content nor edits"),
            _ => None,
        }
    }
}

/// What a plan entry does to its file.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Create,
    Modify,
    Delete,
}

/// One entry of an [`UpdatePlan`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct FilePlan {
    pub target_file: String,
    pub action: FileAction,
    /// What should change in this file and why.
    #[serde(default)]
    pub description: String,
}

/// Ordered list of file changes sharing one commit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, TS)]
pub struct UpdatePlan {
    #[serde(default)]
    pub file_plans: Vec<FilePlan>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub commit_message: String,
}

/// Answer of a confirmer for a plan entry that creates a new document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum ConfirmationDecision {
    /// Create the document as planned.
    Confirm,
    /// Update an existing document instead.
    Redirect { to: String },
    /// Abort the whole run.
    Cancel,
}
