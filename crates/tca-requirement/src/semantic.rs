//! Semantic-retrieval fallback
//!
//! Queries a vector index for chunks mentioning the requirement, then asks the
//! model to keep only the text that belongs to it.

use crate::error::{IndexError, ResolveError};
use crate::RequirementResolver;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tca_model::{call_structured, Capability, LanguageModel, RetryExecutor};

/// Capability name for requirement extraction
pub const EXTRACT_REQUIREMENT: &str = "extract_requirement";

/// Retrieved document chunk
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text
    pub page_content: String,
    /// Source metadata (`type`, `chunk_index`, `page`, ...)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Chunk {
    /// Create chunk without metadata
    #[must_use]
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// With metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Metadata equality filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFilter {
    /// Metadata key
    pub key: String,
    /// Required value
    pub value: String,
}

/// Vector retrieval service
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Top-`k` chunks by similarity
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<ChunkFilter>,
    ) -> Result<Vec<Chunk>, IndexError>;

    /// Top-`k` of `fetch_k` candidates, penalizing redundancy by `diversity`
    async fn max_marginal_relevance_search(
        &self,
        query: &str,
        k: usize,
        fetch_k: usize,
        diversity: f32,
    ) -> Result<Vec<Chunk>, IndexError>;
}

/// Retrieval settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Chunks passed to the model
    pub top_k: usize,
    /// Use maximal-marginal-relevance search
    pub use_mmr: bool,
    /// Candidates considered by MMR
    pub fetch_k: usize,
    /// MMR diversity weight, 0 = relevance only
    pub diversity: f32,
    /// Restrict similarity search to chunks with this `type` tag
    pub chunk_type: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 2,
            use_mmr: false,
            fetch_k: 8,
            diversity: 0.5,
            chunk_type: None,
        }
    }
}

/// Structured response of the extraction capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedRequirement {
    /// Requirement text with surrounding material removed; empty if absent
    pub requirement_text: String,
}

/// Extraction capability definition
#[must_use]
pub fn extract_requirement_capability() -> Capability {
    Capability::new::<ExtractedRequirement>(
        EXTRACT_REQUIREMENT,
        "You are a requirement extraction expert.\n\
         Extract ONLY the complete text of the specified requirement from the provided chunks.\n\n\
         Remove any surrounding text, headers, or unrelated content.\n\
         Return only the requirement description itself.\n\n\
         If the requirement is not found in the chunks, return an empty string.",
        "Requirement ID: {req_id}\n\n\
         Retrieved chunks:\n{chunks}\n\n\
         Extract the complete text for requirement {req_id}.",
        &["req_id", "chunks"],
    )
}

/// Join chunks for the extraction prompt
#[must_use]
pub fn combine_chunks(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let source = chunk
                .metadata
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", ");
            if source.is_empty() {
                format!("Chunk {}:\n{}", i + 1, chunk.page_content)
            } else {
                format!("Chunk {} [{source}]:\n{}", i + 1, chunk.page_content)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// Vector-index search plus model extraction
pub struct SemanticResolver {
    index: Arc<dyn VectorIndex>,
    model: Arc<dyn LanguageModel>,
    capability: Capability,
    retry: RetryExecutor,
    options: SearchOptions,
    temperature: f32,
}

impl std::fmt::Debug for SemanticResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticResolver")
            .field("capability", &self.capability.name())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SemanticResolver {
    /// Create resolver
    #[must_use]
    pub fn new(
        index: Arc<dyn VectorIndex>,
        model: Arc<dyn LanguageModel>,
        capability: Capability,
        retry: RetryExecutor,
    ) -> Self {
        Self {
            index,
            model,
            capability,
            retry,
            options: SearchOptions::default(),
            temperature: 0.0,
        }
    }

    /// With search options
    #[inline]
    #[must_use]
    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    /// With sampling temperature
    #[inline]
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    async fn retrieve(&self, query: &str) -> Result<Vec<Chunk>, IndexError> {
        let index = self.index.as_ref();
        let opts = &self.options;
        self.retry
            .execute(move || async move {
                if opts.use_mmr {
                    index
                        .max_marginal_relevance_search(query, opts.top_k, opts.fetch_k, opts.diversity)
                        .await
                } else {
                    let filter = opts.chunk_type.clone().map(|value| ChunkFilter {
                        key: "type".to_string(),
                        value,
                    });
                    index.similarity_search(query, opts.top_k, filter).await
                }
            })
            .await
    }
}

#[async_trait::async_trait]
impl RequirementResolver for SemanticResolver {
    async fn resolve(&self, req_id: &str) -> Result<String, ResolveError> {
        let query = format!("Requirement {req_id}");
        let chunks = self.retrieve(&query).await?;
        if chunks.is_empty() {
            tracing::debug!(req_id, "no chunks retrieved");
            return Err(ResolveError::not_found(req_id));
        }

        let combined = combine_chunks(&chunks);
        let vars = [("req_id", req_id), ("chunks", combined.as_str())];
        let vars = vars.as_slice();
        let (model, capability, temperature) =
            (self.model.as_ref(), &self.capability, self.temperature);
        let extracted: ExtractedRequirement = self
            .retry
            .execute(move || call_structured(model, capability, vars, temperature))
            .await?;

        let text = extracted.requirement_text.trim();
        if text.is_empty() {
            return Err(ResolveError::not_found(req_id));
        }
        tracing::debug!(req_id, chunks = chunks.len(), "requirement extracted from index");
        Ok(text.to_string())
    }

    fn name(&self) -> &'static str {
        "semantic"
    }
}
