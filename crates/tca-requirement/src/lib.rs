//! TCA Requirement Resolution
//!
//! Resolves a requirement id to its full description text.
//!
//! Two strategies share the [`RequirementResolver`] contract:
//! - [`DeterministicResolver`]: identifier-pattern extraction over a
//!   [`SourceDocument`], cached in a [`RequirementCache`] that is cleared
//!   whenever the document fingerprint changes
//! - [`SemanticResolver`]: [`VectorIndex`] retrieval followed by a model call
//!   that keeps only the requirement's own text
//!
//! [`ChainedResolver`] combines them: semantic retrieval runs only when the
//! deterministic path reports not-found.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tca_requirement::{DeterministicResolver, FileRequirementCache, RequirementResolver, TextFileDocument};
//!
//! let resolver = DeterministicResolver::new(
//!     Arc::new(TextFileDocument::new("dataset/SRS.txt")),
//!     Arc::new(FileRequirementCache::new(".cache/requirements.json")),
//! );
//! let text = resolver.resolve("SKYRADAR-ARR-044").await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cache;
pub mod chained;
pub mod deterministic;
pub mod document;
pub mod error;
pub mod semantic;

pub use cache::{FileRequirementCache, MemoryRequirementCache, RequirementCache, DOCUMENT_HASH_KEY};
pub use chained::ChainedResolver;
pub use deterministic::{DeterministicResolver, RequirementPattern, DEFAULT_ID_PATTERN};
pub use document::{InMemoryDocument, Page, SourceDocument, TextFileDocument};
pub use error::{IndexError, ResolveError};
pub use semantic::{
    extract_requirement_capability, Chunk, ChunkFilter, ExtractedRequirement, SearchOptions,
    SemanticResolver, VectorIndex, EXTRACT_REQUIREMENT,
};

/// Requirement id → description text
#[async_trait::async_trait]
pub trait RequirementResolver: Send + Sync {
    /// Resolve `req_id`
    ///
    /// # Errors
    /// `ResolveError::NotFound` when the id is absent; other variants for
    /// failures of the collaborators involved
    async fn resolve(&self, req_id: &str) -> Result<String, ResolveError>;

    /// Strategy name for logs
    fn name(&self) -> &'static str;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
