//! Pipeline data model

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use ulid::Ulid;

/// Unique pipeline run identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Generate new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Abstract condition to verify, derived from a requirement
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestCase {
    /// Identifier, unique within a generation batch (e.g. `TC-001`)
    pub id: String,
    /// What the case checks
    pub description: String,
    /// Whether a scenario exercises and checks it
    #[serde(default)]
    pub present: bool,
}

impl TestCase {
    /// Create uncovered test case
    #[must_use]
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            present: false,
        }
    }

    /// With coverage flag
    #[inline]
    #[must_use]
    pub fn with_present(mut self, present: bool) -> Self {
        self.present = present;
        self
    }
}

/// Verdicts for one scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Scenario file stem
    pub scenario_name: String,
    /// Scenario path
    pub scenario_path: PathBuf,
    /// Verdicts, in the order the analysis returned them
    pub test_cases: Vec<TestCase>,
}

impl ScenarioResult {
    /// Number of cases marked present
    #[must_use]
    pub fn covered(&self) -> usize {
        self.test_cases.iter().filter(|tc| tc.present).count()
    }
}

/// A present verdict the verifier found unjustified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FalsePositive {
    /// Scenario file stem
    pub scenario_name: String,
    /// Scenario path
    pub scenario_path: PathBuf,
    /// Test case id
    pub test_case_id: String,
    /// Test case description
    pub test_case_description: String,
    /// Why the coverage claim does not hold
    pub reason: String,
    /// Setup or verification elements the scenario lacks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_elements: Vec<String>,
}
