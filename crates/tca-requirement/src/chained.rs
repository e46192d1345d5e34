//! Deterministic-then-semantic resolution

use crate::error::ResolveError;
use crate::RequirementResolver;
use std::sync::Arc;

/// Tries `primary`, falling back to `fallback` only when the id is not found
///
/// Transport, cache and document failures from `primary` propagate unchanged.
pub struct ChainedResolver {
    primary: Arc<dyn RequirementResolver>,
    fallback: Arc<dyn RequirementResolver>,
}

impl std::fmt::Debug for ChainedResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainedResolver")
            .field("primary", &self.primary.name())
            .field("fallback", &self.fallback.name())
            .finish()
    }
}

impl ChainedResolver {
    /// Create chain
    #[inline]
    #[must_use]
    pub fn new(
        primary: Arc<dyn RequirementResolver>,
        fallback: Arc<dyn RequirementResolver>,
    ) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait::async_trait]
impl RequirementResolver for ChainedResolver {
    async fn resolve(&self, req_id: &str) -> Result<String, ResolveError> {
        match self.primary.resolve(req_id).await {
            Err(err) if err.is_not_found() => {
                tracing::info!(
                    req_id,
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    "requirement not found, falling back"
                );
                self.fallback.resolve(req_id).await
            }
            other => other,
        }
    }

    fn name(&self) -> &'static str {
        "chained"
    }
}
