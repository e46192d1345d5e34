//! Error types for the coverage pipeline
//!
//! Every node converts its failure into one [`PipelineError`] and records its
//! display string in the pipeline state. Nothing escapes the orchestrator.

use crate::stage::Stage;
use std::path::PathBuf;
use tca_model::{ModelError, RegistryError};
use tca_requirement::ResolveError;
use tca_scenario::ScenarioError;

/// Pipeline error
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Discovery returned no scenarios
    #[error("No scenarios found for {req_id}")]
    NoScenarios { req_id: String },

    /// Requirement id absent from the source
    #[error("Requirement {req_id} not found")]
    NotFound { req_id: String },

    /// Service still unavailable after every retry
    #[error("{0}")]
    TransientService(String),

    /// Non-retryable service failure
    #[error("{0}")]
    FatalService(String),

    /// Structured output missing or invalid
    #[error("{0}")]
    Parse(String),

    /// File or storage failure
    #[error("{0}")]
    Io(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Orchestrator attempted a transition the machine forbids
    #[error("illegal stage transition: {from:?} -> {to:?}")]
    IllegalTransition { from: Stage, to: Stage },
}

impl PipelineError {
    /// Check if the failure was a service outage that outlasted retries
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientService(_))
    }
}

impl From<ModelError> for PipelineError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Transient { .. } => Self::TransientService(err.to_string()),
            ModelError::Parse(_) => Self::Parse(err.to_string()),
            ModelError::Fatal { .. }
            | ModelError::Template(_)
            | ModelError::UnknownCapability(_) => Self::FatalService(err.to_string()),
        }
    }
}

impl From<ResolveError> for PipelineError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound { req_id } => Self::NotFound { req_id },
            ResolveError::Model(model) => model.into(),
            ResolveError::Index(_) => Self::FatalService(err.to_string()),
            ResolveError::InvalidPattern(reason) => Self::Config(ConfigError::Invalid(reason)),
            ResolveError::Document(_) | ResolveError::Cache(_) | ResolveError::Io { .. } => {
                Self::Io(err.to_string())
            }
        }
    }
}

impl From<ScenarioError> for PipelineError {
    fn from(err: ScenarioError) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<RegistryError> for PipelineError {
    fn from(err: RegistryError) -> Self {
        Self::Config(ConfigError::Invalid(err.to_string()))
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File unreadable
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML malformed
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value rejected by validation
    #[error("{0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_scenarios_message() {
        let err = PipelineError::NoScenarios {
            req_id: "REQ-001".into(),
        };
        assert_eq!(err.to_string(), "No scenarios found for REQ-001");
    }

    #[test]
    fn model_errors_map_to_taxonomy() {
        assert!(PipelineError::from(ModelError::classify(Some(503), "busy")).is_transient());
        assert!(matches!(
            PipelineError::from(ModelError::classify(Some(401), "denied")),
            PipelineError::FatalService(_)
        ));
        assert!(matches!(
            PipelineError::from(ModelError::parse("bad")),
            PipelineError::Parse(_)
        ));
    }

    #[test]
    fn resolve_not_found_keeps_id() {
        let err = PipelineError::from(ResolveError::not_found("REQ-9"));
        assert_eq!(err.to_string(), "Requirement REQ-9 not found");
    }
}
