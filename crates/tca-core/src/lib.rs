//! TCA Core - Coverage Auditing Pipeline
//!
//! Audits how well a requirement's scenarios cover it:
//! 1. Locate the requirement's scenario files
//! 2. Resolve the requirement text
//! 3. Generate the canonical test cases (nominal, negation, transitions, boundaries)
//! 4. For each scenario, judge which test cases it implements, then re-check
//!    every positive verdict for false positives
//! 5. OR-fold the per-scenario verdicts into one coverage list
//!
//! Partial success is a normal outcome: the terminal [`PipelineState`] always
//! carries whatever was aggregated alongside any recorded `errors`.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tca_core::{CoverageReport, Orchestrator, PipelineConfig};
//! use tca_model::OpenAiCompatibleClient;
//!
//! let config = PipelineConfig::load("tca.toml")?;
//! let model = Arc::new(OpenAiCompatibleClient::from_settings(config.model.clone())?);
//! let orchestrator = Orchestrator::from_config(&config, model, None)?;
//!
//! let state = orchestrator.run("SKYRADAR-ARR-044").await;
//! CoverageReport::from_state(&state).write_to(&config.report.output_dir).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod aggregator;
pub mod analyzer;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod generator;
pub mod model;
pub mod observer;
pub mod orchestrator;
pub mod report;
pub mod stage;
pub mod state;
pub mod verifier;

pub use aggregator::{aggregate, covered_count};
pub use analyzer::{CoverageAnalyzer, ScenarioAnalysis};
pub use capabilities::standard_registry;
pub use config::{
    ErrorPolicy, PipelineConfig, PipelineSettings, ReportSettings, RequirementSettings,
    ResolutionStrategy,
};
pub use error::{ConfigError, PipelineError};
pub use generator::TestCaseGenerator;
pub use model::{FalsePositive, RunId, ScenarioResult, TestCase};
pub use observer::{NoopObserver, PipelineObserver};
pub use orchestrator::{has_more_scenarios, Orchestrator};
pub use report::{score_bucket, CoverageReport, CoverageSummary, RunStatus};
pub use stage::{allowed_transitions, validate_transition, Stage};
pub use state::{PipelineState, StateDelta};
pub use tca_scenario::validate_req_id;
pub use verifier::{FalsePositiveVerifier, NO_EVIDENCE};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
