//! Test case generation
//!
//! One structured call per requirement, always at temperature 0.

use crate::capabilities::TestCaseList;
use crate::error::PipelineError;
use crate::model::TestCase;
use std::collections::HashSet;
use std::sync::Arc;
use tca_model::{call_structured, Capability, LanguageModel, RetryExecutor};

/// Requirement text → canonical test-case templates
pub struct TestCaseGenerator {
    model: Arc<dyn LanguageModel>,
    capability: Capability,
    retry: RetryExecutor,
}

impl std::fmt::Debug for TestCaseGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCaseGenerator")
            .field("capability", &self.capability.name())
            .finish_non_exhaustive()
    }
}

impl TestCaseGenerator {
    /// Create generator
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>, capability: Capability, retry: RetryExecutor) -> Self {
        Self {
            model,
            capability,
            retry,
        }
    }

    /// Generate test cases for `req_id`
    ///
    /// Every returned case has `present == false`.
    ///
    /// # Errors
    /// - `PipelineError::Parse` if the list is empty or an id/description is
    ///   blank or repeated
    /// - the model error once retries are exhausted
    pub async fn generate(
        &self,
        req_id: &str,
        requirement_text: &str,
    ) -> Result<Vec<TestCase>, PipelineError> {
        let vars = [
            ("req_name", req_id),
            ("requirement_description", requirement_text),
        ];
        let vars = vars.as_slice();
        let (model, capability) = (self.model.as_ref(), &self.capability);
        let list: TestCaseList = self
            .retry
            .execute(move || call_structured(model, capability, vars, 0.0))
            .await?;

        let test_cases = validate(list)?;
        tracing::info!(req_id, count = test_cases.len(), "test cases generated");
        Ok(test_cases)
    }
}

fn validate(list: TestCaseList) -> Result<Vec<TestCase>, PipelineError> {
    if list.test_cases.is_empty() {
        return Err(PipelineError::Parse(
            "no parsed response: empty test case list".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut test_cases = Vec::with_capacity(list.test_cases.len());
    for generated in list.test_cases {
        let id = generated.id.trim();
        let description = generated.description.trim();
        if id.is_empty() {
            return Err(PipelineError::Parse("test case with empty id".to_string()));
        }
        if description.is_empty() {
            return Err(PipelineError::Parse(format!(
                "test case {id} has an empty description"
            )));
        }
        if !seen.insert(id.to_string()) {
            return Err(PipelineError::Parse(format!("duplicate test case id {id}")));
        }
        test_cases.push(TestCase::new(id, description));
    }
    Ok(test_cases)
}
