//! Pipeline state and deltas
//!
//! Nodes never mutate [`PipelineState`] directly: they return a [`StateDelta`]
//! which the orchestrator merges with [`PipelineState::apply`]. Result lists
//! and `errors` are append-only; `current_index` only moves forward.

use crate::model::{FalsePositive, RunId, ScenarioResult, TestCase};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Scenario being processed between analysis and bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlightScenario {
    /// Verdicts so far
    pub result: ScenarioResult,
    /// Scenario content, kept for verification prompts
    pub content: String,
    /// Evidence by test case id
    pub evidence: HashMap<String, String>,
}

/// Single mutable aggregate threaded through the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineState {
    /// Run identifier
    pub run_id: RunId,
    /// Requirement id
    pub req_name: String,
    /// Scenario paths, in processing order
    pub scenario_paths: Vec<PathBuf>,
    /// Next scenario to process
    pub current_index: usize,
    /// Resolved requirement text
    pub requirement_description: String,
    /// Test-case templates; `present` is always false here
    pub generated_test_cases: Vec<TestCase>,
    /// One entry per processed scenario
    pub scenario_results: Vec<ScenarioResult>,
    /// OR-fold of `scenario_results`
    pub aggregated_test_cases: Vec<TestCase>,
    /// Confirmed false positives
    pub false_positives: Vec<FalsePositive>,
    /// Node failures, one line each
    pub errors: Vec<String>,
    /// Error count when the scenario loop was entered
    #[serde(skip)]
    pub(crate) loop_entry_errors: Option<usize>,
    #[serde(skip)]
    pub(crate) in_flight: Option<InFlightScenario>,
}

impl PipelineState {
    /// Create state for `req_name`
    #[must_use]
    pub fn new(req_name: impl Into<String>) -> Self {
        Self {
            run_id: RunId::new(),
            req_name: req_name.into(),
            scenario_paths: Vec::new(),
            current_index: 0,
            requirement_description: String::new(),
            generated_test_cases: Vec::new(),
            scenario_results: Vec::new(),
            aggregated_test_cases: Vec::new(),
            false_positives: Vec::new(),
            errors: Vec::new(),
            loop_entry_errors: None,
            in_flight: None,
        }
    }

    /// Check if any node failed
    #[inline]
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Errors recorded before the scenario loop began
    #[must_use]
    pub fn setup_errors(&self) -> &[String] {
        let count = self.loop_entry_errors.unwrap_or(self.errors.len());
        &self.errors[..count.min(self.errors.len())]
    }

    /// Scenario at `current_index`, if any remain
    #[must_use]
    pub fn current_scenario(&self) -> Option<&PathBuf> {
        self.scenario_paths.get(self.current_index)
    }

    /// Merge `delta`
    pub fn apply(&mut self, delta: StateDelta) {
        if let Some(paths) = delta.scenario_paths {
            self.scenario_paths = paths;
            self.current_index = 0;
        }
        if let Some(description) = delta.requirement_description {
            self.requirement_description = description;
        }
        if let Some(test_cases) = delta.generated_test_cases {
            self.generated_test_cases = test_cases;
        }
        if let Some(in_flight) = delta.in_flight {
            self.in_flight = Some(in_flight);
        }

        self.false_positives.extend(delta.false_positives);
        self.errors.extend(delta.errors);

        if delta.enter_loop {
            self.loop_entry_errors = Some(self.errors.len());
        }
        if delta.advance {
            if let Some(done) = self.in_flight.take() {
                self.scenario_results.push(done.result);
            }
            self.current_index = (self.current_index + 1).min(self.scenario_paths.len());
        }
        if let Some(aggregated) = delta.aggregated_test_cases {
            self.aggregated_test_cases = aggregated;
        }
    }
}

/// Changes produced by one node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDelta {
    pub scenario_paths: Option<Vec<PathBuf>>,
    pub requirement_description: Option<String>,
    pub generated_test_cases: Option<Vec<TestCase>>,
    pub in_flight: Option<InFlightScenario>,
    pub false_positives: Vec<FalsePositive>,
    pub errors: Vec<String>,
    /// Record the error count as the loop-entry baseline
    pub enter_loop: bool,
    /// Store the in-flight result and move to the next scenario
    pub advance: bool,
    pub aggregated_test_cases: Option<Vec<TestCase>>,
}

impl StateDelta {
    /// Empty delta
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Delta carrying one error
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
            ..Self::default()
        }
    }

    /// With loop-entry marker
    #[inline]
    #[must_use]
    pub fn entering_loop(mut self) -> Self {
        self.enter_loop = true;
        self
    }

    /// With advance marker
    #[inline]
    #[must_use]
    pub fn advancing(mut self) -> Self {
        self.advance = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str) -> ScenarioResult {
        ScenarioResult {
            scenario_name: name.to_string(),
            scenario_path: PathBuf::from(format!("{name}.xml")),
            test_cases: vec![TestCase::new("TC-001", "a").with_present(true)],
        }
    }

    #[test]
    fn advance_is_bounded() {
        let mut state = PipelineState::new("REQ-1");
        state.apply(StateDelta {
            scenario_paths: Some(vec![PathBuf::from("a.xml")]),
            ..StateDelta::default()
        });

        state.apply(StateDelta::none().advancing());
        state.apply(StateDelta::none().advancing());
        assert_eq!(state.current_index, 1);
    }

    #[test]
    fn advance_moves_in_flight_into_results() {
        let mut state = PipelineState::new("REQ-1");
        state.apply(StateDelta {
            scenario_paths: Some(vec![PathBuf::from("s1.xml"), PathBuf::from("s2.xml")]),
            ..StateDelta::default()
        });
        state.apply(StateDelta {
            in_flight: Some(InFlightScenario {
                result: result("s1"),
                content: String::new(),
                evidence: HashMap::new(),
            }),
            ..StateDelta::default()
        });

        state.apply(StateDelta::none().advancing());
        assert_eq!(state.scenario_results, vec![result("s1")]);
        assert!(state.in_flight.is_none());

        state.apply(StateDelta::error("Coverage analysis error").advancing());
        assert_eq!(state.scenario_results.len(), 1);
        assert_eq!(state.current_index, 2);
    }

    #[test]
    fn setup_errors_exclude_loop_errors() {
        let mut state = PipelineState::new("REQ-1");
        assert!(state.setup_errors().is_empty());

        state.apply(StateDelta::none().entering_loop());
        state.apply(StateDelta::error("scenario failed"));

        assert!(state.has_errors());
        assert!(state.setup_errors().is_empty());
    }

    #[test]
    fn serialization_skips_transient_fields() {
        let state = PipelineState::new("REQ-1");
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("in_flight").is_none());
        assert_eq!(json["req_name"], "REQ-1");
    }
}
