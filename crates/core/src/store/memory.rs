//! In-memory document store.
//!
//! Keeps documents in a map and commits in a log. Used by tests and dry runs.

use super::{compile_glob, normalize_path, DocumentStore, StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// One recorded commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub id: String,
    pub message: String,
    pub changed: Vec<String>,
    pub deleted: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    files: BTreeMap<String, String>,
    commits: Vec<CommitRecord>,
    writes: usize,
}

/// Document store holding everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_commits: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with documents.
    pub fn with_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let files = files
            .into_iter()
            .map(|(path, content)| (path.into(), content.into()))
            .collect();
        Self {
            inner: Mutex::new(Inner {
                files,
                ..Inner::default()
            }),
            fail_commits: AtomicBool::new(false),
        }
    }

    /// Make every following commit fail.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of all documents.
    pub async fn files(&self) -> BTreeMap<String, String> {
        self.inner.lock().await.files.clone()
    }

    pub async fn commits(&self) -> Vec<CommitRecord> {
        self.inner.lock().await.commits.clone()
    }

    /// Number of write and delete calls seen so far.
    pub async fn write_count(&self) -> usize {
        self.inner.lock().await.writes
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read(&self, path: &str) -> StoreResult<Option<String>> {
        let path = normalize_path(path)?;
        Ok(self.inner.lock().await.files.get(&path).cloned())
    }

    async fn exists(&self, path: &str) -> StoreResult<bool> {
        let path = normalize_path(path)?;
        Ok(self.inner.lock().await.files.contains_key(&path))
    }

    async fn write(&self, path: &str, content: &str) -> StoreResult<()> {
        let path = normalize_path(path)?;
        let mut inner = self.inner.lock().await;
        inner.writes += 1;
        inner.files.insert(path, content.to_string());
        Ok(())
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        let path = normalize_path(path)?;
        let mut inner = self.inner.lock().await;
        inner.writes += 1;
        inner
            .files
            .remove(&path)
            .map(|_| ())
            .ok_or(StoreError::NotFound(path))
    }

    async fn list(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let matcher = compile_glob(pattern)?;
        Ok(self
            .inner
            .lock()
            .await
            .files
            .keys()
            .filter(|path| matcher.is_match(path.as_str()))
            .cloned()
            .collect())
    }

    async fn commit(
        &self,
        changed: &[String],
        deleted: &[String],
        message: &str,
    ) -> StoreResult<String> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Git {
                command: "commit".to_string(),
                stderr: "simulated commit failure".to_string(),
            });
        }
        if changed.is_empty() && deleted.is_empty() {
            return Err(StoreError::NothingToCommit);
        }

        let mut inner = self.inner.lock().await;
        let id = format!("mem-{}", inner.commits.len() + 1);
        inner.commits.push(CommitRecord {
            id: id.clone(),
            message: message.to_string(),
            changed: changed.to_vec(),
            deleted: deleted.to_vec(),
        });
        Ok(id)
    }
}
