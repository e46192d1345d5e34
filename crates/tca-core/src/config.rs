//! Pipeline configuration
//!
//! Loaded from TOML; every section and field is optional.
//!
//! ```toml
//! [model]
//! base_url = "https://api.openai.com/v1"
//! model = "gpt-4o-mini"
//!
//! [retry]
//! max_retries = 3
//! initial_delay_ms = 5000
//!
//! [requirement]
//! document_path = "dataset/SRS.txt"
//! strategy = "deterministic_then_semantic"
//!
//! [scenarios]
//! root = "dataset"
//! layout = "convention"
//!
//! [pipeline]
//! error_policy = "lenient"
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tca_model::{ModelSettings, RetryPolicy};
use tca_requirement::{RequirementPattern, SearchOptions, DEFAULT_ID_PATTERN};
use tca_scenario::ScenarioSettings;

/// How requirement text is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Pattern extraction from the source document
    #[default]
    Deterministic,
    /// Vector-index retrieval plus model extraction
    Semantic,
    /// Deterministic, then semantic on not-found
    DeterministicThenSemantic,
}

/// Whether a scenario failure stops the remaining scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Only errors recorded before the loop stop it
    #[default]
    Lenient,
    /// Any recorded error stops it
    HaltOnScenarioError,
}

/// Requirement resolution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequirementSettings {
    /// Source specification text (form feeds separate pages)
    pub document_path: PathBuf,
    /// Persistent cache file; in-memory cache when unset
    pub cache_path: Option<PathBuf>,
    /// Requirement id pattern with one capture group
    pub id_pattern: String,
    /// Project id prefix, e.g. `SKYRADAR`; replaces `id_pattern` when set
    pub id_prefix: Option<String>,
    /// Resolution strategy
    pub strategy: ResolutionStrategy,
    /// Semantic retrieval options
    #[serde(flatten)]
    pub search: SearchOptions,
}

impl Default for RequirementSettings {
    fn default() -> Self {
        Self {
            document_path: PathBuf::from("dataset/SRS.txt"),
            cache_path: Some(PathBuf::from(".cache/requirements.json")),
            id_pattern: DEFAULT_ID_PATTERN.to_string(),
            id_prefix: None,
            strategy: ResolutionStrategy::Deterministic,
            search: SearchOptions::default(),
        }
    }
}

/// Orchestrator behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Loop guard policy
    pub error_policy: ErrorPolicy,
    /// Run false-positive verification on present verdicts
    pub verify_false_positives: bool,
    /// Requirement characters sent with each coverage prompt; 0 sends all
    pub requirement_excerpt_chars: usize,
}

impl PipelineSettings {
    /// Excerpt limit, `None` when unlimited
    #[inline]
    #[must_use]
    pub fn excerpt_limit(&self) -> Option<usize> {
        (self.requirement_excerpt_chars > 0).then_some(self.requirement_excerpt_chars)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::Lenient,
            verify_false_positives: true,
            requirement_excerpt_chars: 4_000,
        }
    }
}

/// Report output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Directory receiving report files
    pub output_dir: PathBuf,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("reports"),
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub model: ModelSettings,
    pub retry: RetryPolicy,
    pub requirement: RequirementSettings,
    pub scenarios: ScenarioSettings,
    pub pipeline: PipelineSettings,
    pub report: ReportSettings,
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// `ConfigError::Parse` for malformed TOML, `ConfigError::Invalid` for
    /// rejected values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io` if unreadable, otherwise as [`Self::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Check value constraints
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first rejected field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.multiplier < 1 {
            return Err(ConfigError::Invalid(
                "retry.multiplier must be at least 1".to_string(),
            ));
        }
        if self.requirement.search.top_k < 1 {
            return Err(ConfigError::Invalid(
                "requirement.top_k must be at least 1".to_string(),
            ));
        }
        if self.requirement.search.use_mmr
            && self.requirement.search.fetch_k < self.requirement.search.top_k
        {
            return Err(ConfigError::Invalid(
                "requirement.fetch_k must be at least top_k".to_string(),
            ));
        }
        self.id_pattern()?;
        Ok(())
    }

    /// Compiled requirement id pattern, built from `id_prefix` when set
    ///
    /// # Errors
    /// `ConfigError::Invalid` if the pattern does not compile or lacks a
    /// capture group, or the prefix is blank
    pub fn id_pattern(&self) -> Result<RequirementPattern, ConfigError> {
        match &self.requirement.id_prefix {
            Some(prefix) => RequirementPattern::for_prefix(prefix)
                .map_err(|e| ConfigError::Invalid(format!("requirement.id_prefix: {e}"))),
            None => RequirementPattern::new(&self.requirement.id_pattern)
                .map_err(|e| ConfigError::Invalid(format!("requirement.id_pattern: {e}"))),
        }
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// With scenario settings
    #[inline]
    #[must_use]
    pub fn with_scenarios(mut self, scenarios: ScenarioSettings) -> Self {
        self.scenarios = scenarios;
        self
    }

    /// With requirement settings
    #[inline]
    #[must_use]
    pub fn with_requirement(mut self, requirement: RequirementSettings) -> Self {
        self.requirement = requirement;
        self
    }

    /// With error policy
    #[inline]
    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.pipeline.error_policy = policy;
        self
    }

    /// With report output directory
    #[inline]
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report.output_dir = dir.into();
        self
    }
}
