//! End-to-end pipeline runs over real scenario trees and a scripted model

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tca_core::capabilities::{
    generate_test_cases, identify_coverage, verify_false_positive, GENERATE_TEST_CASES,
    IDENTIFY_COVERAGE, VERIFY_FALSE_POSITIVE,
};
use tca_core::{
    CoverageAnalyzer, CoverageReport, ErrorPolicy, FalsePositiveVerifier, Orchestrator,
    PipelineConfig, PipelineError, PipelineObserver, PipelineSettings, RequirementSettings,
    ResolutionStrategy, RunId, RunStatus, ScenarioResult, Stage, TestCase, TestCaseGenerator,
};
use tca_model::{ModelError, RetryExecutor, RetryPolicy};
use tca_requirement::{DeterministicResolver, InMemoryDocument, MemoryRequirementCache};
use tca_scenario::{ConventionLocator, ScenarioSettings};
use tca_test_utils::{scenario_xml, service_unavailable, RecordingSleeper, ScenarioTree, ScriptedModel};

const SRS: &str = "REQ-001 The system shall raise an alarm when altitude is below 500 ft.\n\
REQ-002 The system shall log every alarm.\n";

fn orchestrator(root: &Path, model: &Arc<ScriptedModel>, sleeper: &Arc<RecordingSleeper>) -> Orchestrator {
    let retry = RetryExecutor::with_sleeper(
        RetryPolicy::new(3, Duration::from_millis(10)),
        sleeper.clone(),
    );
    let resolver = DeterministicResolver::new(
        Arc::new(InMemoryDocument::new(SRS)),
        Arc::new(MemoryRequirementCache::default()),
    );
    Orchestrator::new(
        Arc::new(ConventionLocator::new(root)),
        Arc::new(resolver),
        TestCaseGenerator::new(model.clone(), generate_test_cases(), retry.clone()),
        CoverageAnalyzer::new(model.clone(), identify_coverage(), retry.clone()),
        FalsePositiveVerifier::new(model.clone(), verify_false_positive(), retry),
    )
}

fn generated(ids: &[&str]) -> Value {
    let cases: Vec<Value> = ids
        .iter()
        .map(|id| json!({"id": id, "description": format!("condition {id}")}))
        .collect();
    json!({ "test_cases": cases })
}

fn verdicts(entries: &[(&str, bool)]) -> Value {
    let cases: Vec<Value> = entries
        .iter()
        .map(|(id, present)| {
            json!({
                "id": id,
                "present": present,
                "evidence": if *present { "<verify>alarm</verify>" } else { "" }
            })
        })
        .collect();
    json!({ "test_cases": cases })
}

fn genuine() -> Value {
    json!({"is_false_positive": false, "reason": "setup and check present", "missing_elements": []})
}

fn flags(cases: &[TestCase]) -> Vec<(String, bool)> {
    cases.iter().map(|tc| (tc.id.clone(), tc.present)).collect()
}

#[tokio::test]
async fn missing_scenarios_short_circuit_everything() {
    let tree = ScenarioTree::new();
    tree.add("REQ-002", "test_1", "scenario_1", "<other/>");
    let model = ScriptedModel::new();

    let state = orchestrator(tree.root(), &model, &RecordingSleeper::new())
        .run("REQ-001")
        .await;

    assert_eq!(state.errors, vec!["No scenarios found for REQ-001".to_string()]);
    assert!(state.aggregated_test_cases.is_empty());
    assert!(state.requirement_description.is_empty());
    assert!(model.calls().is_empty());
    assert_eq!(RunStatus::of(&state), RunStatus::Failed);
}

#[tokio::test]
async fn path_escaping_requirement_id_is_refused() {
    let tree = ScenarioTree::new();
    tree.add("REQ-001", "test_1", "scenario_1", "<a/>");
    let model = ScriptedModel::new();

    let state = orchestrator(&tree.root().join("nested"), &model, &RecordingSleeper::new())
        .run("../TS_REQ-001")
        .await;

    assert_eq!(state.errors.len(), 1);
    assert!(state.errors[0].contains("invalid requirement id"));
    assert!(state.scenario_paths.is_empty());
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn single_scenario_with_verified_coverage() {
    let tree = ScenarioTree::new();
    tree.add("REQ-001", "test_1", "scenario_1", &scenario_xml("low", "alt=400", "alarm"));
    let model = ScriptedModel::new();
    model
        .push_ok(GENERATE_TEST_CASES, generated(&["TC-001"]))
        .push_ok(IDENTIFY_COVERAGE, verdicts(&[("TC-001", true)]))
        .push_ok(VERIFY_FALSE_POSITIVE, genuine());

    let state = orchestrator(tree.root(), &model, &RecordingSleeper::new())
        .run("REQ-001")
        .await;

    assert!(state.errors.is_empty(), "{:?}", state.errors);
    assert_eq!(
        state.aggregated_test_cases,
        vec![TestCase::new("TC-001", "condition TC-001").with_present(true)]
    );
    assert!(state.false_positives.is_empty());
    assert_eq!(state.current_index, 1);
    assert!(state
        .requirement_description
        .starts_with("REQ-001 The system shall raise an alarm"));

    let verify = model.calls_for(VERIFY_FALSE_POSITIVE);
    assert_eq!(verify.len(), 1);
    assert!(verify[0].user_prompt.contains("<verify>alarm</verify>"));
}

#[tokio::test]
async fn false_positive_is_corrected() {
    let tree = ScenarioTree::new();
    tree.add(
        "REQ-001",
        "test_1",
        "scenario_1",
        "<scenario><!-- TC-001: alarm below 500 ft --></scenario>",
    );
    let model = ScriptedModel::new();
    model
        .push_ok(GENERATE_TEST_CASES, generated(&["TC-001"]))
        .push_ok(IDENTIFY_COVERAGE, verdicts(&[("TC-001", true)]))
        .push_ok(
            VERIFY_FALSE_POSITIVE,
            json!({
                "is_false_positive": true,
                "reason": "only mentioned in a comment",
                "missing_elements": ["altitude input", "alarm check"]
            }),
        );

    let state = orchestrator(tree.root(), &model, &RecordingSleeper::new())
        .run("REQ-001")
        .await;

    assert!(state.errors.is_empty());
    assert!(!state.scenario_results[0].test_cases[0].present);
    assert_eq!(state.false_positives.len(), 1);
    let fp = &state.false_positives[0];
    assert_eq!(fp.test_case_id, "TC-001");
    assert_eq!(fp.scenario_name, "scenario_1");
    assert_eq!(fp.reason, "only mentioned in a comment");
    assert_eq!(flags(&state.aggregated_test_cases), vec![("TC-001".to_string(), false)]);
}

#[tokio::test]
async fn coverage_is_or_folded_across_scenarios() {
    let tree = ScenarioTree::new();
    tree.add("REQ-001", "test_1", "scenario_1", &scenario_xml("a", "alt=400", "alarm"));
    tree.add("REQ-001", "test_2", "scenario_2", &scenario_xml("b", "alt=600", "none"));
    let model = ScriptedModel::new();
    model
        .push_ok(GENERATE_TEST_CASES, generated(&["TC-001", "TC-002"]))
        .respond_with(IDENTIFY_COVERAGE, |request| {
            if request.user_prompt.contains("Scenario: scenario_1") {
                Ok(verdicts(&[("TC-001", false), ("TC-002", true)]))
            } else {
                Ok(verdicts(&[("TC-001", true), ("TC-002", false)]))
            }
        })
        .respond_with(VERIFY_FALSE_POSITIVE, |_| Ok(genuine()));

    let state = orchestrator(tree.root(), &model, &RecordingSleeper::new())
        .run("REQ-001")
        .await;

    assert!(state.errors.is_empty());
    let names: Vec<&str> = state
        .scenario_results
        .iter()
        .map(|r| r.scenario_name.as_str())
        .collect();
    assert_eq!(names, vec!["scenario_1", "scenario_2"]);
    assert_eq!(
        flags(&state.aggregated_test_cases),
        vec![("TC-001".to_string(), true), ("TC-002".to_string(), true)]
    );
    assert_eq!(model.call_count(VERIFY_FALSE_POSITIVE), 2);
}

#[tokio::test]
async fn scenario_failure_does_not_block_the_rest() {
    let tree = ScenarioTree::new();
    tree.add("REQ-001", "test_1", "scenario_1", "<a/>");
    tree.add("REQ-001", "test_2", "scenario_2", "<b/>");
    let model = ScriptedModel::new();
    model
        .push_ok(GENERATE_TEST_CASES, generated(&["TC-001"]))
        .push_err(IDENTIFY_COVERAGE, ModelError::classify(Some(400), "bad request"))
        .push_ok(IDENTIFY_COVERAGE, verdicts(&[("TC-001", true)]))
        .push_ok(VERIFY_FALSE_POSITIVE, genuine());

    let state = orchestrator(tree.root(), &model, &RecordingSleeper::new())
        .run("REQ-001")
        .await;

    assert_eq!(state.errors.len(), 1);
    assert!(state.errors[0].starts_with("Coverage analysis error:"));
    assert_eq!(state.scenario_results.len(), 1);
    assert_eq!(state.scenario_results[0].scenario_name, "scenario_2");
    assert_eq!(state.current_index, 2);
    assert_eq!(flags(&state.aggregated_test_cases), vec![("TC-001".to_string(), true)]);
    assert_eq!(
        CoverageReport::from_state(&state).status,
        RunStatus::Partial
    );
}

#[tokio::test]
async fn halt_policy_stops_after_first_failure() {
    let tree = ScenarioTree::new();
    tree.add("REQ-001", "test_1", "scenario_1", "<a/>");
    tree.add("REQ-001", "test_2", "scenario_2", "<b/>");
    let model = ScriptedModel::new();
    model
        .push_ok(GENERATE_TEST_CASES, generated(&["TC-001"]))
        .push_err(IDENTIFY_COVERAGE, ModelError::classify(Some(400), "bad request"));

    let settings = PipelineSettings {
        error_policy: ErrorPolicy::HaltOnScenarioError,
        ..PipelineSettings::default()
    };
    let state = orchestrator(tree.root(), &model, &RecordingSleeper::new())
        .with_settings(settings)
        .run("REQ-001")
        .await;

    assert_eq!(state.errors.len(), 1);
    assert!(state.scenario_results.is_empty());
    assert!(state.aggregated_test_cases.is_empty());
    assert_eq!(state.current_index, 1);
    assert_eq!(model.call_count(IDENTIFY_COVERAGE), 1);
}

#[tokio::test]
async fn unknown_requirement_skips_generation() {
    let tree = ScenarioTree::new();
    tree.add("REQ-404", "test_1", "scenario_1", "<a/>");
    let model = ScriptedModel::new();

    let state = orchestrator(tree.root(), &model, &RecordingSleeper::new())
        .run("REQ-404")
        .await;

    assert_eq!(state.errors, vec!["Requirement REQ-404 not found".to_string()]);
    assert!(model.calls().is_empty());
    assert!(state.scenario_results.is_empty());
    assert_eq!(state.current_index, 0);
}

#[tokio::test]
async fn empty_generation_is_recorded() {
    let tree = ScenarioTree::new();
    tree.add("REQ-001", "test_1", "scenario_1", "<a/>");
    let model = ScriptedModel::new();
    model.push_ok(GENERATE_TEST_CASES, json!({"test_cases": []}));

    let state = orchestrator(tree.root(), &model, &RecordingSleeper::new())
        .run("REQ-001")
        .await;

    assert_eq!(
        state.errors,
        vec!["Test case generation error: no parsed response: empty test case list".to_string()]
    );
    assert_eq!(model.call_count(IDENTIFY_COVERAGE), 0);
}

#[tokio::test]
async fn transient_analysis_failures_back_off() {
    let tree = ScenarioTree::new();
    tree.add("REQ-001", "test_1", "scenario_1", "<a/>");
    let model = ScriptedModel::new();
    model
        .push_ok(GENERATE_TEST_CASES, generated(&["TC-001"]))
        .push_err(IDENTIFY_COVERAGE, service_unavailable())
        .push_err(IDENTIFY_COVERAGE, service_unavailable())
        .push_ok(IDENTIFY_COVERAGE, verdicts(&[("TC-001", false)]));
    let sleeper = RecordingSleeper::new();

    let state = orchestrator(tree.root(), &model, &sleeper)
        .run("REQ-001")
        .await;

    assert!(state.errors.is_empty());
    assert_eq!(model.call_count(IDENTIFY_COVERAGE), 3);
    assert_eq!(
        sleeper.slept(),
        vec![Duration::from_millis(10), Duration::from_millis(20)]
    );
    assert_eq!(model.call_count(VERIFY_FALSE_POSITIVE), 0);
}

#[tokio::test]
async fn unreadable_scenario_is_recorded_and_skipped() {
    let tree = ScenarioTree::new();
    let bad = tree.root().join("TS_REQ-001/test_1");
    std::fs::create_dir_all(&bad).unwrap();
    std::fs::write(bad.join("scenario_1.xml"), [0xff, 0xfe]).unwrap();
    tree.add("REQ-001", "test_2", "scenario_2", "<b/>");
    let model = ScriptedModel::new();
    model
        .push_ok(GENERATE_TEST_CASES, generated(&["TC-001"]))
        .push_ok(IDENTIFY_COVERAGE, verdicts(&[("TC-001", false)]));

    let state = orchestrator(tree.root(), &model, &RecordingSleeper::new())
        .run("REQ-001")
        .await;

    assert_eq!(state.errors.len(), 1);
    assert!(state.errors[0].contains("scenario_1.xml"));
    assert_eq!(state.scenario_results.len(), 1);
    assert_eq!(flags(&state.aggregated_test_cases), vec![("TC-001".to_string(), false)]);
}

#[tokio::test]
async fn verification_can_be_disabled() {
    let tree = ScenarioTree::new();
    tree.add("REQ-001", "test_1", "scenario_1", "<a/>");
    let model = ScriptedModel::new();
    model
        .push_ok(GENERATE_TEST_CASES, generated(&["TC-001"]))
        .push_ok(IDENTIFY_COVERAGE, verdicts(&[("TC-001", true)]));

    let settings = PipelineSettings {
        verify_false_positives: false,
        ..PipelineSettings::default()
    };
    let state = orchestrator(tree.root(), &model, &RecordingSleeper::new())
        .with_settings(settings)
        .run("REQ-001")
        .await;

    assert_eq!(model.call_count(VERIFY_FALSE_POSITIVE), 0);
    assert_eq!(flags(&state.aggregated_test_cases), vec![("TC-001".to_string(), true)]);
}

#[derive(Default)]
struct Recorder {
    stages: Mutex<Vec<Stage>>,
    scenarios: Mutex<Vec<(usize, String)>>,
}

impl PipelineObserver for Recorder {
    fn on_stage(&self, _run_id: RunId, stage: Stage) {
        self.stages.lock().unwrap().push(stage);
    }

    fn on_scenario_done(&self, _run_id: RunId, index: usize, result: &ScenarioResult) {
        self.scenarios
            .lock()
            .unwrap()
            .push((index, result.scenario_name.clone()));
    }
}

#[tokio::test]
async fn observer_sees_every_stage_in_order() {
    let tree = ScenarioTree::new();
    tree.add("REQ-001", "test_1", "scenario_1", "<a/>");
    let model = ScriptedModel::new();
    model
        .push_ok(GENERATE_TEST_CASES, generated(&["TC-001"]))
        .push_ok(IDENTIFY_COVERAGE, verdicts(&[("TC-001", false)]));
    let recorder = Arc::new(Recorder::default());

    orchestrator(tree.root(), &model, &RecordingSleeper::new())
        .with_observer(recorder.clone())
        .run("REQ-001")
        .await;

    assert_eq!(
        *recorder.stages.lock().unwrap(),
        vec![
            Stage::Init,
            Stage::LoadScenarios,
            Stage::ResolveRequirement,
            Stage::GenerateTestCases,
            Stage::AnalyzeScenario,
            Stage::VerifyFalsePositives,
            Stage::Advance,
            Stage::Aggregate,
            Stage::Done,
        ]
    );
    assert_eq!(
        *recorder.scenarios.lock().unwrap(),
        vec![(0, "scenario_1".to_string())]
    );
}

#[tokio::test]
async fn configured_pipeline_runs_and_writes_reports() {
    let tree = ScenarioTree::new();
    tree.add("REQ-001", "test_1", "scenario_1", "<a/>");
    let srs = tree.write("SRS.txt", SRS);
    let model = ScriptedModel::new();
    model
        .push_ok(GENERATE_TEST_CASES, generated(&["TC-001", "TC-002"]))
        .push_ok(IDENTIFY_COVERAGE, verdicts(&[("TC-001", true), ("TC-002", false)]))
        .push_ok(VERIFY_FALSE_POSITIVE, genuine());

    let config = PipelineConfig::new()
        .with_retry(RetryPolicy::no_retry())
        .with_scenarios(ScenarioSettings {
            root: tree.root().to_path_buf(),
            ..ScenarioSettings::default()
        })
        .with_requirement(RequirementSettings {
            document_path: srs,
            cache_path: None,
            ..RequirementSettings::default()
        })
        .with_output_dir(tree.root().join("reports"));

    let orchestrator = Orchestrator::from_config(&config, model.clone(), None).unwrap();
    let state = orchestrator.run("REQ-001").await;
    assert!(state.errors.is_empty(), "{:?}", state.errors);

    let report = CoverageReport::from_state(&state);
    assert_eq!(report.summary.covered, 1);
    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.score, 6);

    let written = report.write_to(&config.report.output_dir).await.unwrap();
    assert!(written[0].ends_with("REQ-001_coverage.json"));
    assert!(written[1].ends_with("REQ-001_false_positives.txt"));
}

#[test]
fn semantic_strategy_requires_an_index() {
    let config = PipelineConfig::new().with_requirement(RequirementSettings {
        strategy: ResolutionStrategy::Semantic,
        ..RequirementSettings::default()
    });

    let err = Orchestrator::from_config(&config, ScriptedModel::new(), None).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
}
