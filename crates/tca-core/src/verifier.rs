//! False-positive verification
//!
//! One call per present test case, all launched together and joined before
//! returning. A call that fails counts as "not a false positive" for that
//! case only.

use crate::capabilities::FalsePositiveCheck;
use crate::model::{FalsePositive, ScenarioResult};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tca_model::{call_structured, Capability, LanguageModel, ModelError, RetryExecutor};

/// Evidence placeholder when the analysis quoted nothing
pub const NO_EVIDENCE: &str = "No evidence provided";

/// Re-checks present verdicts against the scenario content
pub struct FalsePositiveVerifier {
    model: Arc<dyn LanguageModel>,
    capability: Capability,
    retry: RetryExecutor,
    temperature: f32,
}

impl std::fmt::Debug for FalsePositiveVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FalsePositiveVerifier")
            .field("capability", &self.capability.name())
            .finish_non_exhaustive()
    }
}

impl FalsePositiveVerifier {
    /// Create verifier
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>, capability: Capability, retry: RetryExecutor) -> Self {
        Self {
            model,
            capability,
            retry,
            temperature: 0.0,
        }
    }

    /// With sampling temperature
    #[inline]
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Verify every present case of `result`
    ///
    /// Confirmed false positives flip the case's `present` flag in `result`
    /// and are returned.
    pub async fn verify_all(
        &self,
        req_id: &str,
        result: &mut ScenarioResult,
        evidence: &HashMap<String, String>,
        scenario_content: &str,
    ) -> Vec<FalsePositive> {
        let scenario_name = result.scenario_name.as_str();
        let checks = result
            .test_cases
            .iter()
            .filter(|tc| tc.present)
            .map(|tc| {
                let claimed = evidence
                    .get(&tc.id)
                    .map(String::as_str)
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or(NO_EVIDENCE);
                async move {
                    let outcome = self
                        .check(
                            req_id,
                            scenario_name,
                            &tc.id,
                            &tc.description,
                            claimed,
                            scenario_content,
                        )
                        .await;
                    (tc.id.clone(), tc.description.clone(), outcome)
                }
            });
        let outcomes = join_all(checks).await;

        let mut confirmed = Vec::new();
        for (id, description, outcome) in outcomes {
            match outcome {
                Ok(check) if check.is_false_positive => {
                    tracing::info!(
                        scenario = %result.scenario_name,
                        test_case = %id,
                        reason = %check.reason,
                        "false positive confirmed"
                    );
                    confirmed.push(FalsePositive {
                        scenario_name: result.scenario_name.clone(),
                        scenario_path: result.scenario_path.clone(),
                        test_case_id: id,
                        test_case_description: description,
                        reason: check.reason,
                        missing_elements: check.missing_elements,
                    });
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(
                        scenario = %result.scenario_name,
                        test_case = %id,
                        error = %err,
                        "verification failed; keeping verdict"
                    );
                }
            }
        }

        for fp in &confirmed {
            if let Some(tc) = result
                .test_cases
                .iter_mut()
                .find(|tc| tc.id == fp.test_case_id)
            {
                tc.present = false;
            }
        }
        confirmed
    }

    async fn check(
        &self,
        req_id: &str,
        scenario_name: &str,
        test_case_id: &str,
        test_case_description: &str,
        evidence: &str,
        scenario_content: &str,
    ) -> Result<FalsePositiveCheck, ModelError> {
        let vars = [
            ("req_name", req_id),
            ("scenario_name", scenario_name),
            ("test_case_id", test_case_id),
            ("test_case_description", test_case_description),
            ("evidence", evidence),
            ("scenario_content", scenario_content),
        ];
        let vars = vars.as_slice();
        let (model, capability, temperature) =
            (self.model.as_ref(), &self.capability, self.temperature);
        self.retry
            .execute(move || call_structured(model, capability, vars, temperature))
            .await
    }
}
