//! Document store backed by a dedicated git repository.
//!
//! The repository lives in the data directory and is driven through the
//! `git` executable. `GIT_DIR` and `GIT_WORK_TREE` are pinned to the data
//! directory so an enclosing repository is never touched.

use super::{compile_glob, normalize_path, DocumentStore, StoreError, StoreResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Git-backed document store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct GitStore {
    root: PathBuf,
    author_name: String,
    author_email: String,
}

impl GitStore {
    /// Create a store for `root`. Call [`GitStore::ensure_repository`]
    /// before the first commit.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            author_name: "notekit".to_string(),
            author_email: "notekit@localhost".to_string(),
        }
    }

    /// Set the identity used for commits.
    pub fn with_author(mut self, name: &str, email: &str) -> Self {
        self.author_name = name.to_string();
        self.author_email = email.to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the data directory and its repository if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::GitUnavailable` when `git` is not installed and
    /// `StoreError::Git` when `git init` fails.
    pub async fn ensure_repository(&self) -> StoreResult<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StoreError::Io {
                path: self.root.display().to_string(),
                source,
            })?;

        if self.root.join(".git").exists() {
            return Ok(());
        }

        which::which("git").map_err(|_| StoreError::GitUnavailable)?;
        self.git(&["-c", "init.defaultBranch=main", "init", "-q"])
            .await?;
        debug!(root = %self.root.display(), "initialized git repository");
        Ok(())
    }

    /// Id of the current `HEAD` commit, `None` before the first commit.
    pub async fn head(&self) -> StoreResult<Option<String>> {
        match self.git(&["rev-parse", "--verify", "-q", "HEAD"]).await {
            Ok(id) => Ok(Some(id.trim().to_string())),
            Err(StoreError::Git { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn full_path(&self, path: &str) -> StoreResult<PathBuf> {
        Ok(self.root.join(normalize_path(path)?))
    }

    /// Run `git` inside the data directory and return its stdout.
    async fn git(&self, args: &[&str]) -> StoreResult<String> {
        let mut cmd = Command::new("git");
        cmd.args(["-c", &format!("user.name={}", self.author_name)])
            .args(["-c", &format!("user.email={}", self.author_email)])
            .args(["-c", "commit.gpgsign=false"])
            .args(args)
            .current_dir(&self.root)
            .env("GIT_DIR", self.root.join(".git"))
            .env("GIT_WORK_TREE", &self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StoreError::GitUnavailable
            } else {
                StoreError::Io {
                    path: self.root.display().to_string(),
                    source: e,
                }
            }
        })?;

        if !output.status.success() {
            let command = args
                .iter()
                .find(|arg| !arg.starts_with('-') && !arg.contains('='))
                .copied()
                .unwrap_or("command")
                .to_string();
            return Err(StoreError::Git {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// True when the index holds changes for `paths`.
    async fn has_staged_changes(&self, paths: &[String]) -> StoreResult<bool> {
        let mut args = vec!["diff", "--cached", "--name-only", "--"];
        args.extend(paths.iter().map(String::as_str));
        Ok(!self.git(&args).await?.trim().is_empty())
    }

    async fn stage_and_commit(
        &self,
        changed: &[String],
        deleted: &[String],
        message: &str,
    ) -> StoreResult<String> {
        if !changed.is_empty() {
            let mut args = vec!["add", "--"];
            args.extend(changed.iter().map(String::as_str));
            self.git(&args).await?;
        }
        if !deleted.is_empty() {
            let mut args = vec!["rm", "--cached", "--ignore-unmatch", "-q", "--"];
            args.extend(deleted.iter().map(String::as_str));
            self.git(&args).await?;
        }

        let all: Vec<String> = changed.iter().chain(deleted.iter()).cloned().collect();
        if !self.has_staged_changes(&all).await? {
            return Err(StoreError::NothingToCommit);
        }

        self.git(&["commit", "-q", "-m", message]).await?;
        Ok(self.git(&["rev-parse", "HEAD"]).await?.trim().to_string())
    }

    /// Reset the index entries of `paths` to `HEAD`.
    async fn unstage(&self, paths: &[String]) {
        if paths.is_empty() {
            return;
        }
        let mut args = vec!["reset", "-q", "--"];
        args.extend(paths.iter().map(String::as_str));
        if let Err(e) = self.git(&args).await {
            warn!(error = %e, "failed to unstage paths of a failed commit");
        }
    }
}

#[async_trait]
impl DocumentStore for GitStore {
    async fn read(&self, path: &str) -> StoreResult<Option<String>> {
        let full = self.full_path(path)?;
        match tokio::fs::read_to_string(&full).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                path: path.to_string(),
                source,
            }),
        }
    }

    async fn exists(&self, path: &str) -> StoreResult<bool> {
        Ok(self.full_path(path)?.is_file())
    }

    async fn write(&self, path: &str, content: &str) -> StoreResult<()> {
        let full = self.full_path(path)?;
        let io_err = |source| StoreError::Io {
            path: path.to_string(),
            source,
        };

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&full, content).await.map_err(io_err)?;
        debug!(path, bytes = content.len(), "wrote document");
        Ok(())
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        let full = self.full_path(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => {
                debug!(path, "deleted document");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(path.to_string())),
            Err(source) => Err(StoreError::Io {
                path: path.to_string(),
                source,
            }),
        }
    }

    async fn list(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let matcher = compile_glob(pattern)?;
        let root = self.root.clone();

        tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            let walker = WalkDir::new(&root)
                .min_depth(1)
                .into_iter()
                .filter_entry(|entry| {
                    let name = entry.file_name().to_string_lossy();
                    name != ".git" && name != ".notekit"
                });

            for entry in walker {
                let entry = entry.map_err(|e| StoreError::Io {
                    path: root.display().to_string(),
                    source: e.into(),
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&root) else {
                    continue;
                };
                let relative = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if matcher.is_match(&relative) {
                    files.push(relative);
                }
            }
            files.sort();
            Ok(files)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn commit(
        &self,
        changed: &[String],
        deleted: &[String],
        message: &str,
    ) -> StoreResult<String> {
        let changed = changed
            .iter()
            .map(|p| normalize_path(p))
            .collect::<StoreResult<Vec<_>>>()?;
        let deleted = deleted
            .iter()
            .map(|p| normalize_path(p))
            .collect::<StoreResult<Vec<_>>>()?;

        let all: Vec<String> = changed.iter().chain(deleted.iter()).cloned().collect();
        match self.stage_and_commit(&changed, &deleted, message).await {
            Ok(id) => {
                debug!(commit = %id, files = all.len(), "committed");
                Ok(id)
            }
            Err(e) => {
                // Nothing of a failed commit may stay staged for the next one
                self.unstage(&all).await;
                Err(e)
            }
        }
    }
}
