//! Requirement resolution errors

use std::path::PathBuf;
use tca_model::{ModelError, Transient};

/// Requirement resolution error
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Requirement id absent from the source
    #[error("Requirement {req_id} not found")]
    NotFound { req_id: String },

    /// Model call failed after retries
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Vector index failure
    #[error("vector index error: {0}")]
    Index(#[from] IndexError),

    /// Source document unreadable
    #[error("source document error: {0}")]
    Document(String),

    /// Persistent cache failure
    #[error("requirement cache error: {0}")]
    Cache(String),

    /// Identifier pattern rejected
    #[error("invalid requirement id pattern: {0}")]
    InvalidPattern(String),

    /// File system failure
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ResolveError {
    /// Create not-found error
    #[inline]
    pub fn not_found(req_id: impl Into<String>) -> Self {
        Self::NotFound {
            req_id: req_id.into(),
        }
    }

    /// Check if the requirement was simply absent
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Vector index error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// Index service temporarily unavailable; retryable
    #[error("index unavailable: {0}")]
    Unavailable(String),

    /// Query failed
    #[error("query failed: {0}")]
    Query(String),
}

impl Transient for IndexError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
