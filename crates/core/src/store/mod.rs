//! Document storage.
//!
//! A [`DocumentStore`] owns the documents of one data directory: plain
//! read/write/delete/list operations plus one atomic multi-file commit.
//! [`GitStore`] keeps history in a dedicated git repository,
//! [`MemoryStore`] keeps everything in memory.

pub mod git;
pub mod memory;

pub use git::GitStore;
pub use memory::{CommitRecord, MemoryStore};

use async_trait::async_trait;
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Component, Path};
use thiserror::Error;

/// Errors raised by document stores.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid document path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: globset::Error,
    },

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("git executable not found on PATH")]
    GitUnavailable,

    #[error("Nothing to commit")]
    NothingToCommit,

    #[error("Store task failed: {0}")]
    Task(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage for the documents of one data directory.
///
/// Paths are relative to the data directory and use `/` separators.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document. Returns `None` when it does not exist.
    async fn read(&self, path: &str) -> StoreResult<Option<String>>;

    async fn exists(&self, path: &str) -> StoreResult<bool>;

    /// Write a document, creating parent directories as needed.
    async fn write(&self, path: &str, content: &str) -> StoreResult<()>;

    async fn delete(&self, path: &str) -> StoreResult<()>;

    /// List documents matching a glob pattern, sorted.
    async fn list(&self, pattern: &str) -> StoreResult<Vec<String>>;

    /// Record `changed` and `deleted` in one commit and return its id.
    async fn commit(
        &self,
        changed: &[String],
        deleted: &[String],
        message: &str,
    ) -> StoreResult<String>;
}

/// Check that `path` stays inside the data directory and return its
/// normalized form.
pub fn normalize_path(path: &str) -> StoreResult<String> {
    let invalid = |reason| StoreError::InvalidPath {
        path: path.to_string(),
        reason,
    };

    let trimmed = path.trim().trim_start_matches("./");
    if trimmed.is_empty() {
        return Err(invalid("path is empty"));
    }
    if trimmed.contains('\\') {
        return Err(invalid("use '/' as separator"));
    }

    let candidate = Path::new(trimmed);
    if candidate.is_absolute() {
        return Err(invalid("path must be relative"));
    }

    for component in candidate.components() {
        match component {
            Component::Normal(part) if part == ".git" || part == ".notekit" => {
                return Err(invalid("path points into a reserved directory"));
            }
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(invalid("path must not leave the data directory")),
        }
    }

    Ok(trimmed.to_string())
}

/// Compile a glob in which `*` never crosses a `/`.
pub(crate) fn compile_glob(pattern: &str) -> StoreResult<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|source| StoreError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_accepts_relative_paths() {
        assert_eq!(normalize_path("projects/a.md").unwrap(), "projects/a.md");
        assert_eq!(normalize_path("./projects/a.md").unwrap(), "projects/a.md");
    }

    #[test]
    fn test_normalize_path_rejects_escapes() {
        for bad in ["", "  ", "/etc/passwd", "../x.md", "projects/../../x.md", ".git/config", ".notekit/summaries.json"] {
            assert!(
                matches!(normalize_path(bad), Err(StoreError::InvalidPath { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_compile_glob_star_does_not_cross_separator() {
        let matcher = compile_glob("projects/*.md").unwrap();
        assert!(matcher.is_match("projects/a.md"));
        assert!(!matcher.is_match("projects/sub/a.md"));

        let recursive = compile_glob("**/*.md").unwrap();
        assert!(recursive.is_match("a.md"));
        assert!(recursive.is_match("projects/sub/a.md"));
    }
}
