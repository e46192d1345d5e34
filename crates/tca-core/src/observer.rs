//! Progress hooks for hosts embedding the pipeline

use crate::model::{RunId, ScenarioResult};
use crate::stage::Stage;

/// Receives orchestrator progress
///
/// Both hooks default to doing nothing.
pub trait PipelineObserver: Send + Sync {
    /// Stage about to run
    fn on_stage(&self, _run_id: RunId, _stage: Stage) {}

    /// Scenario stored, after verification
    fn on_scenario_done(&self, _run_id: RunId, _index: usize, _result: &ScenarioResult) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}
