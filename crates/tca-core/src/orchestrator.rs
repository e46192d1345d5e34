//! Pipeline orchestrator
//!
//! Drives the [`Stage`] machine over one [`PipelineState`]:
//!
//! ```text
//! Init → LoadScenarios → ResolveRequirement → GenerateTestCases
//!      → [AnalyzeScenario → VerifyFalsePositives → Advance]* → Aggregate → Done
//! ```
//!
//! Scenarios run strictly one after another. Node failures become one line in
//! `errors`; the loop always advances and `Aggregate` always runs once.

use crate::aggregator::aggregate;
use crate::analyzer::CoverageAnalyzer;
use crate::capabilities::{standard_registry, GENERATE_TEST_CASES, IDENTIFY_COVERAGE, VERIFY_FALSE_POSITIVE};
use crate::config::{ErrorPolicy, PipelineConfig, PipelineSettings, ResolutionStrategy};
use crate::error::{ConfigError, PipelineError};
use crate::generator::TestCaseGenerator;
use crate::model::ScenarioResult;
use crate::observer::{NoopObserver, PipelineObserver};
use crate::stage::{validate_transition, Stage};
use crate::state::{InFlightScenario, PipelineState, StateDelta};
use crate::verifier::FalsePositiveVerifier;
use std::sync::Arc;
use tca_model::{CapabilityRegistry, LanguageModel, RetryExecutor};
use tca_requirement::{
    ChainedResolver, DeterministicResolver, FileRequirementCache, MemoryRequirementCache,
    RequirementCache, RequirementResolver, SemanticResolver, TextFileDocument, VectorIndex,
    EXTRACT_REQUIREMENT,
};
use tca_scenario::{load_scenario, ScenarioLocator};
use tracing::Instrument;

/// Loop guard: true while scenarios remain and no blocking error exists
///
/// Under [`ErrorPolicy::Lenient`] only errors recorded before the loop block
/// it; under [`ErrorPolicy::HaltOnScenarioError`] any error does.
#[must_use]
pub fn has_more_scenarios(state: &PipelineState, policy: ErrorPolicy) -> bool {
    let blocking = match policy {
        ErrorPolicy::Lenient => state.setup_errors(),
        ErrorPolicy::HaltOnScenarioError => state.errors.as_slice(),
    };
    blocking.is_empty() && state.current_index < state.scenario_paths.len()
}

/// Coverage pipeline
pub struct Orchestrator {
    locator: Arc<dyn ScenarioLocator>,
    resolver: Arc<dyn RequirementResolver>,
    generator: TestCaseGenerator,
    analyzer: CoverageAnalyzer,
    verifier: FalsePositiveVerifier,
    settings: PipelineSettings,
    observer: Arc<dyn PipelineObserver>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("locator", &self.locator.name())
            .field("resolver", &self.resolver.name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create orchestrator from its collaborators
    #[must_use]
    pub fn new(
        locator: Arc<dyn ScenarioLocator>,
        resolver: Arc<dyn RequirementResolver>,
        generator: TestCaseGenerator,
        analyzer: CoverageAnalyzer,
        verifier: FalsePositiveVerifier,
    ) -> Self {
        Self {
            locator,
            resolver,
            generator,
            analyzer,
            verifier,
            settings: PipelineSettings::default(),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Wire every collaborator from configuration
    ///
    /// `index` backs semantic resolution. Without it the semantic strategy is
    /// rejected and the chained strategy degrades to deterministic.
    ///
    /// # Errors
    /// `PipelineError::Config` for invalid settings or capability definitions
    pub fn from_config(
        config: &PipelineConfig,
        model: Arc<dyn LanguageModel>,
        index: Option<Arc<dyn VectorIndex>>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let registry = standard_registry()?;
        let retry = RetryExecutor::new(config.retry);
        let temperature = config.model.temperature;

        let resolver = build_resolver(config, &registry, model.clone(), index, &retry)?;
        let generator = TestCaseGenerator::new(
            model.clone(),
            registry.require(GENERATE_TEST_CASES)?.clone(),
            retry.clone(),
        );
        let analyzer = CoverageAnalyzer::new(
            model.clone(),
            registry.require(IDENTIFY_COVERAGE)?.clone(),
            retry.clone(),
        )
        .with_temperature(temperature)
        .with_excerpt_chars(config.pipeline.excerpt_limit());
        let verifier = FalsePositiveVerifier::new(
            model,
            registry.require(VERIFY_FALSE_POSITIVE)?.clone(),
            retry,
        )
        .with_temperature(temperature);

        let locator = config.scenarios.build_locator();
        tracing::info!(
            locator = locator.name(),
            resolver = resolver.name(),
            max_retries = config.retry.max_retries,
            "pipeline configured"
        );
        Ok(Self::new(
            locator,
            resolver,
            generator,
            analyzer,
            verifier,
        )
        .with_settings(config.pipeline))
    }

    /// With pipeline settings
    #[inline]
    #[must_use]
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// With progress observer
    #[inline]
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Get settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run the pipeline for `req_id` to completion
    ///
    /// Never fails: every problem is recorded in the returned state's
    /// `errors`.
    #[tracing::instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self, req_id: &str) -> PipelineState {
        let mut state = PipelineState::new(req_id);
        tracing::Span::current().record("run_id", tracing::field::display(state.run_id));
        tracing::info!("pipeline started");

        let mut stage = Stage::Init;
        let mut steps = 0usize;
        while !stage.is_terminal() {
            steps += 1;
            if steps > step_budget(&state) && stage != Stage::Aggregate {
                tracing::error!(%stage, steps, "step budget exhausted");
                state.apply(StateDelta::error(format!("step budget exhausted at {stage}")));
                stage = Stage::Aggregate;
                continue;
            }

            self.observer.on_stage(state.run_id, stage);
            let next = self.step(stage, &mut state).await;
            stage = match validate_transition(stage, next) {
                Ok(()) => next,
                Err(err) => {
                    tracing::error!(error = %err, "illegal transition");
                    state.apply(StateDelta::error(err.to_string()));
                    if stage == Stage::Aggregate {
                        Stage::Done
                    } else {
                        Stage::Aggregate
                    }
                }
            };
        }
        self.observer.on_stage(state.run_id, Stage::Done);

        tracing::info!(
            scenarios = state.scenario_results.len(),
            test_cases = state.aggregated_test_cases.len(),
            false_positives = state.false_positives.len(),
            errors = state.errors.len(),
            "pipeline finished"
        );
        state
    }

    /// Execute one stage, merge its delta and return the next stage
    pub async fn step(&self, stage: Stage, state: &mut PipelineState) -> Stage {
        match stage {
            Stage::Init => Stage::LoadScenarios,
            Stage::LoadScenarios => {
                let delta = self.load_scenarios(state).await;
                state.apply(delta);
                Stage::ResolveRequirement
            }
            Stage::ResolveRequirement => {
                let delta = self.resolve_requirement(state).await;
                state.apply(delta);
                Stage::GenerateTestCases
            }
            Stage::GenerateTestCases => {
                let delta = self.generate_test_cases(state).await;
                state.apply(delta.entering_loop());
                self.loop_or_aggregate(state)
            }
            Stage::AnalyzeScenario => {
                let index = state.current_index;
                let span = tracing::info_span!("scenario", index);
                let delta = self.analyze_scenario(state).instrument(span).await;
                state.apply(delta);
                Stage::VerifyFalsePositives
            }
            Stage::VerifyFalsePositives => {
                let index = state.current_index;
                let span = tracing::info_span!("scenario", index);
                let delta = self.verify_false_positives(state).instrument(span).await;
                state.apply(delta);
                Stage::Advance
            }
            Stage::Advance => {
                let stored = state.in_flight.is_some();
                let index = state.current_index;
                state.apply(StateDelta::none().advancing());
                if let (true, Some(result)) = (stored, state.scenario_results.last()) {
                    self.observer.on_scenario_done(state.run_id, index, result);
                }
                self.loop_or_aggregate(state)
            }
            Stage::Aggregate => {
                let aggregated = aggregate(&state.scenario_results);
                state.apply(StateDelta {
                    aggregated_test_cases: Some(aggregated),
                    ..StateDelta::default()
                });
                Stage::Done
            }
            Stage::Done => Stage::Done,
        }
    }

    fn loop_or_aggregate(&self, state: &PipelineState) -> Stage {
        if has_more_scenarios(state, self.settings.error_policy) {
            Stage::AnalyzeScenario
        } else {
            Stage::Aggregate
        }
    }

    async fn load_scenarios(&self, state: &PipelineState) -> StateDelta {
        let req_id = state.req_name.as_str();
        match self.locator.locate(req_id).await {
            Ok(paths) if paths.is_empty() => {
                tracing::warn!(req_id, locator = self.locator.name(), "no scenarios found");
                StateDelta::error(
                    PipelineError::NoScenarios {
                        req_id: req_id.to_string(),
                    }
                    .to_string(),
                )
            }
            Ok(paths) => {
                tracing::info!(req_id, count = paths.len(), "scenarios located");
                StateDelta {
                    scenario_paths: Some(paths),
                    ..StateDelta::default()
                }
            }
            Err(err) => StateDelta::error(PipelineError::from(err).to_string()),
        }
    }

    async fn resolve_requirement(&self, state: &PipelineState) -> StateDelta {
        if state.has_errors() {
            return StateDelta::none();
        }
        let req_id = state.req_name.as_str();
        match self.resolver.resolve(req_id).await {
            Ok(text) => {
                tracing::info!(req_id, resolver = self.resolver.name(), chars = text.len(), "requirement resolved");
                StateDelta {
                    requirement_description: Some(text),
                    ..StateDelta::default()
                }
            }
            Err(err) => {
                let err = PipelineError::from(err);
                tracing::error!(req_id, error = %err, "requirement resolution failed");
                StateDelta::error(err.to_string())
            }
        }
    }

    async fn generate_test_cases(&self, state: &PipelineState) -> StateDelta {
        if state.has_errors() {
            return StateDelta::none();
        }
        match self
            .generator
            .generate(&state.req_name, &state.requirement_description)
            .await
        {
            Ok(test_cases) => StateDelta {
                generated_test_cases: Some(test_cases),
                ..StateDelta::default()
            },
            Err(err) => {
                tracing::error!(error = %err, "test case generation failed");
                StateDelta::error(format!("Test case generation error: {err}"))
            }
        }
    }

    async fn analyze_scenario(&self, state: &PipelineState) -> StateDelta {
        let Some(path) = state.current_scenario() else {
            return StateDelta::none();
        };
        let scenario = match load_scenario(path).await {
            Ok(scenario) => scenario,
            Err(err) => {
                tracing::error!(error = %err, "scenario unreadable");
                return StateDelta::error(PipelineError::from(err).to_string());
            }
        };

        match self
            .analyzer
            .analyze(
                &state.req_name,
                &state.requirement_description,
                &scenario,
                &state.generated_test_cases,
            )
            .await
        {
            Ok(analysis) => StateDelta {
                in_flight: Some(InFlightScenario {
                    result: ScenarioResult {
                        scenario_name: scenario.name,
                        scenario_path: scenario.path,
                        test_cases: analysis.test_cases,
                    },
                    content: scenario.content,
                    evidence: analysis.evidence,
                }),
                ..StateDelta::default()
            },
            Err(err) => {
                tracing::error!(scenario = %scenario.name, error = %err, "coverage analysis failed");
                StateDelta::error(format!("Coverage analysis error: {err}"))
            }
        }
    }

    async fn verify_false_positives(&self, state: &mut PipelineState) -> StateDelta {
        match state.in_flight.take() {
            Some(mut in_flight) if self.settings.verify_false_positives => {
                let false_positives = self
                    .verifier
                    .verify_all(
                        &state.req_name,
                        &mut in_flight.result,
                        &in_flight.evidence,
                        &in_flight.content,
                    )
                    .await;
                StateDelta {
                    in_flight: Some(in_flight),
                    false_positives,
                    ..StateDelta::default()
                }
            }
            in_flight => StateDelta {
                in_flight,
                ..StateDelta::default()
            },
        }
    }
}

/// Upper bound on steps for the current scenario count
fn step_budget(state: &PipelineState) -> usize {
    8 + 3 * state.scenario_paths.len()
}

fn build_resolver(
    config: &PipelineConfig,
    registry: &CapabilityRegistry,
    model: Arc<dyn LanguageModel>,
    index: Option<Arc<dyn VectorIndex>>,
    retry: &RetryExecutor,
) -> Result<Arc<dyn RequirementResolver>, PipelineError> {
    let settings = &config.requirement;
    let deterministic = || -> Result<Arc<dyn RequirementResolver>, PipelineError> {
        let document = Arc::new(TextFileDocument::new(settings.document_path.clone()));
        let cache: Arc<dyn RequirementCache> = match &settings.cache_path {
            Some(path) => Arc::new(FileRequirementCache::new(path.clone())),
            None => Arc::new(MemoryRequirementCache::default()),
        };
        Ok(Arc::new(
            DeterministicResolver::new(document, cache).with_pattern(config.id_pattern()?),
        ))
    };
    let semantic = |index: Arc<dyn VectorIndex>| -> Result<Arc<dyn RequirementResolver>, PipelineError> {
        let capability = registry.require(EXTRACT_REQUIREMENT)?.clone();
        Ok(Arc::new(
            SemanticResolver::new(index, model.clone(), capability, retry.clone())
                .with_options(settings.search.clone())
                .with_temperature(config.model.temperature),
        ))
    };

    match (settings.strategy, index) {
        (ResolutionStrategy::Deterministic, _) => deterministic(),
        (ResolutionStrategy::Semantic, Some(index)) => semantic(index),
        (ResolutionStrategy::Semantic, None) => Err(ConfigError::Invalid(
            "semantic resolution requires a vector index".to_string(),
        )
        .into()),
        (ResolutionStrategy::DeterministicThenSemantic, Some(index)) => Ok(Arc::new(
            ChainedResolver::new(deterministic()?, semantic(index)?),
        )),
        (ResolutionStrategy::DeterministicThenSemantic, None) => {
            tracing::warn!("no vector index available; using deterministic resolution only");
            deterministic()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn state_with(paths: usize, errors: &[&str]) -> PipelineState {
        let mut state = PipelineState::new("REQ-1");
        state.apply(StateDelta {
            scenario_paths: Some((0..paths).map(|i| PathBuf::from(format!("s{i}.xml"))).collect()),
            errors: errors.iter().map(ToString::to_string).collect(),
            ..StateDelta::default()
        });
        state
    }

    #[test]
    fn guard_stops_on_setup_errors() {
        let mut state = state_with(2, &["Requirement REQ-1 not found"]);
        state.apply(StateDelta::none().entering_loop());
        assert!(!has_more_scenarios(&state, ErrorPolicy::Lenient));
        assert!(!has_more_scenarios(&state, ErrorPolicy::HaltOnScenarioError));
    }

    #[test]
    fn lenient_guard_ignores_scenario_errors() {
        let mut state = state_with(2, &[]);
        state.apply(StateDelta::none().entering_loop());
        state.apply(StateDelta::error("Coverage analysis error: boom").advancing());

        assert!(has_more_scenarios(&state, ErrorPolicy::Lenient));
        assert!(!has_more_scenarios(&state, ErrorPolicy::HaltOnScenarioError));
    }

    #[test]
    fn guard_stops_at_end() {
        let mut state = state_with(1, &[]);
        state.apply(StateDelta::none().entering_loop());
        assert!(has_more_scenarios(&state, ErrorPolicy::Lenient));
        state.apply(StateDelta::none().advancing());
        assert!(!has_more_scenarios(&state, ErrorPolicy::Lenient));
    }

    #[test]
    fn step_budget_covers_every_scenario() {
        let state = state_with(3, &[]);
        // Init..Generate (4) + 3 per scenario + Aggregate
        assert!(step_budget(&state) >= 4 + 3 * 3 + 1);
    }
}
