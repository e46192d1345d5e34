//! TCA Scenario Discovery
//!
//! Finds the scenario files belonging to a requirement and loads them.
//! An absent requirement folder yields an empty list, never an error; callers
//! decide what "no scenarios" means.
//!
//! # Example
//!
//! ```rust,ignore
//! use tca_scenario::{ConventionLocator, ScenarioLocator, load_scenario};
//!
//! let locator = ConventionLocator::new("dataset");
//! for path in locator.locate("SKYRADAR-ARR-044").await? {
//!     let scenario = load_scenario(&path).await?;
//!     println!("{}: {} bytes", scenario.name, scenario.content.len());
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod convention;
pub mod document;
pub mod error;
pub mod search;

pub use convention::{ConventionLocator, LayoutConvention};
pub use document::{load_scenario, scenario_name, ScenarioDocument};
pub use error::ScenarioError;
pub use search::{mentions_id, resolve_within, SandboxSearchLocator};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Reject ids that would leave their folder when joined into a path
///
/// # Errors
/// `ScenarioError::InvalidId` for an empty id, one containing a path
/// separator or `..`, or one with control characters
pub fn validate_req_id(req_id: &str) -> Result<(), ScenarioError> {
    let unsafe_char = |c: char| c == '/' || c == '\\' || c.is_control();
    if req_id.trim().is_empty() || req_id.contains("..") || req_id.chars().any(unsafe_char) {
        return Err(ScenarioError::InvalidId(req_id.to_string()));
    }
    Ok(())
}

/// Requirement id → scenario file paths
#[async_trait::async_trait]
pub trait ScenarioLocator: Send + Sync {
    /// Scenario paths for `req_id`, in deterministic order
    async fn locate(&self, req_id: &str) -> Result<Vec<PathBuf>, ScenarioError>;

    /// Strategy name for logs
    fn name(&self) -> &'static str;
}

/// Discovery strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// Fixed directory convention
    #[default]
    Convention,
    /// Exploratory search under the root
    Search,
}

/// Scenario discovery settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioSettings {
    /// Dataset root
    pub root: PathBuf,
    /// Discovery strategy
    pub layout: Layout,
    /// Naming convention
    #[serde(flatten)]
    pub convention: LayoutConvention,
    /// Walk depth for search
    pub max_depth: usize,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("dataset"),
            layout: Layout::Convention,
            convention: LayoutConvention::default(),
            max_depth: 6,
        }
    }
}

impl ScenarioSettings {
    /// Build the configured locator
    #[must_use]
    pub fn build_locator(&self) -> Arc<dyn ScenarioLocator> {
        match self.layout {
            Layout::Convention => Arc::new(
                ConventionLocator::new(&self.root).with_convention(self.convention.clone()),
            ),
            Layout::Search => Arc::new(
                SandboxSearchLocator::new(&self.root)
                    .with_extension(self.convention.extension.clone())
                    .with_max_depth(self.max_depth),
            ),
        }
    }
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
