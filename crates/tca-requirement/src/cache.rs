//! Persistent requirement cache
//!
//! Key-value store keyed by requirement id, plus one reserved key holding the
//! fingerprint of the document the entries were extracted from.

use crate::error::ResolveError;
use moka::future::Cache;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Reserved key for the source-document fingerprint
pub const DOCUMENT_HASH_KEY: &str = "_document_hash";

/// Requirement text cache
#[async_trait::async_trait]
pub trait RequirementCache: Send + Sync {
    /// Get value
    async fn get(&self, key: &str) -> Result<Option<String>, ResolveError>;

    /// Set value, overwriting
    async fn set(&self, key: &str, value: &str) -> Result<(), ResolveError>;

    /// Remove every entry, including the fingerprint
    async fn clear(&self) -> Result<(), ResolveError>;
}

/// In-process cache backed by moka
#[derive(Debug, Clone)]
pub struct MemoryRequirementCache {
    inner: Cache<String, String>,
}

impl MemoryRequirementCache {
    /// Create cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }
}

impl Default for MemoryRequirementCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait::async_trait]
impl RequirementCache for MemoryRequirementCache {
    async fn get(&self, key: &str) -> Result<Option<String>, ResolveError> {
        Ok(self.inner.get(key).await)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ResolveError> {
        self.inner.insert(key.to_string(), value.to_string()).await;
        Ok(())
    }

    async fn clear(&self) -> Result<(), ResolveError> {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
        Ok(())
    }
}

/// Cache persisted as one JSON object on disk
///
/// Loaded lazily on first access. Every write rewrites the file through a
/// sibling temporary file and a rename. Assumes a single writer process.
#[derive(Debug)]
pub struct FileRequirementCache {
    path: PathBuf,
    entries: Mutex<Option<BTreeMap<String, String>>>,
}

impl FileRequirementCache {
    /// Create cache stored at `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(None),
        }
    }

    /// Backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> ResolveError {
        ResolveError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, ResolveError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                ResolveError::Cache(format!("{} is corrupt: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), ResolveError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| ResolveError::Cache(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }
}

#[async_trait::async_trait]
impl RequirementCache for FileRequirementCache {
    async fn get(&self, key: &str) -> Result<Option<String>, ResolveError> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        Ok(guard.as_ref().and_then(|entries| entries.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ResolveError> {
        let mut guard = self.entries.lock().await;
        let mut entries = match guard.take() {
            Some(entries) => entries,
            None => self.load().await?,
        };
        entries.insert(key.to_string(), value.to_string());
        let result = self.persist(&entries).await;
        *guard = Some(entries);
        result
    }

    async fn clear(&self) -> Result<(), ResolveError> {
        let mut guard = self.entries.lock().await;
        let entries = BTreeMap::new();
        let result = self.persist(&entries).await;
        *guard = Some(entries);
        result
    }
}
