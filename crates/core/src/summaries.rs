//! Per-document summary cache.
//!
//! Summaries are keyed by document path and tagged with a hash of the
//! content they were written for, so a stale entry is never returned.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::sync::Mutex;

/// Location of the cache file inside the data directory.
pub const SUMMARY_FILE: &str = ".notekit/summaries.json";

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("Failed to access summary cache at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Summary cache at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub type SummaryResult<T> = Result<T, SummaryError>;

/// Short content hash: the first 16 hex digits of a blake3 digest.
pub fn content_hash(content: &str) -> String {
    let mut hex = blake3::hash(content.as_bytes()).to_hex().to_string();
    hex.truncate(16);
    hex
}

#[async_trait]
pub trait SummaryCache: Send + Sync {
    /// Summary of `path`, if one was stored for exactly this content hash.
    async fn get(&self, path: &str, content_hash: &str) -> Option<String>;

    async fn set(&self, path: &str, content_hash: &str, summary: &str) -> SummaryResult<()>;

    async fn remove(&self, path: &str) -> SummaryResult<()>;

    /// Every cached summary, keyed by path.
    async fn all(&self) -> BTreeMap<String, String>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct Entry {
    hash: String,
    summary: String,
}

/// Summary cache persisted as one JSON file.
///
/// Without a file path it only lives in memory.
#[derive(Debug, Default)]
pub struct JsonSummaryCache {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, Entry>>,
}

impl JsonSummaryCache {
    /// A cache that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the cache of a data directory, loading existing entries.
    ///
    /// # Errors
    ///
    /// `SummaryError::Corrupt` when the file exists but is not valid JSON.
    pub async fn open(data_dir: &Path) -> SummaryResult<Self> {
        let path = data_dir.join(SUMMARY_FILE);
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|source| SummaryError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(SummaryError::Io { path, source }),
        };

        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    /// Write the entries through a temporary file and rename it in place.
    async fn persist(&self, entries: &BTreeMap<String, Entry>) -> SummaryResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let io_err = |source| SummaryError::Io {
            path: path.clone(),
            source,
        };

        let json = serde_json::to_vec_pretty(entries).map_err(|source| SummaryError::Corrupt {
            path: path.clone(),
            source,
        })?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(dir).await.map_err(io_err)?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(&json).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl SummaryCache for JsonSummaryCache {
    async fn get(&self, path: &str, content_hash: &str) -> Option<String> {
        self.entries
            .lock()
            .await
            .get(path)
            .filter(|entry| entry.hash == content_hash)
            .map(|entry| entry.summary.clone())
    }

    async fn set(&self, path: &str, content_hash: &str, summary: &str) -> SummaryResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            path.to_string(),
            Entry {
                hash: content_hash.to_string(),
                summary: summary.to_string(),
            },
        );
        self.persist(&entries).await
    }

    async fn remove(&self, path: &str) -> SummaryResult<()> {
        let mut entries = self.entries.lock().await;
        if entries.remove(path).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }

    async fn all(&self) -> BTreeMap<String, String> {
        self.entries
            .lock()
            .await
            .iter()
            .map(|(path, entry)| (path.clone(), entry.summary.clone()))
            .collect()
    }
}
