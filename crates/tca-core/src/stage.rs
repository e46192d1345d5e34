//! Orchestrator stages and their legal transitions

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    LoadScenarios,
    ResolveRequirement,
    GenerateTestCases,
    AnalyzeScenario,
    VerifyFalsePositives,
    Advance,
    Aggregate,
    Done,
}

impl Stage {
    /// Check if no transition leaves this stage
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::LoadScenarios => "load_scenarios",
            Self::ResolveRequirement => "resolve_requirement",
            Self::GenerateTestCases => "generate_test_cases",
            Self::AnalyzeScenario => "analyze_scenario",
            Self::VerifyFalsePositives => "verify_false_positives",
            Self::Advance => "advance",
            Self::Aggregate => "aggregate",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Stages reachable from `from` in one step
///
/// `GenerateTestCases` and `Advance` carry the loop guard; every other edge
/// is unconditional.
#[must_use]
pub fn allowed_transitions(from: Stage) -> Vec<Stage> {
    use Stage::*;
    match from {
        Init => vec![LoadScenarios],
        LoadScenarios => vec![ResolveRequirement],
        ResolveRequirement => vec![GenerateTestCases],
        GenerateTestCases => vec![AnalyzeScenario, Aggregate],
        AnalyzeScenario => vec![VerifyFalsePositives],
        VerifyFalsePositives => vec![Advance],
        Advance => vec![AnalyzeScenario, Aggregate],
        Aggregate => vec![Done],
        Done => vec![],
    }
}

/// Validate a stage transition
///
/// # Errors
/// `PipelineError::IllegalTransition` if `to` is not reachable from `from`
pub fn validate_transition(from: Stage, to: Stage) -> Result<(), PipelineError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(PipelineError::IllegalTransition { from, to })
    }
}
