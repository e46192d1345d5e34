//! Per-scenario coverage analysis

use crate::capabilities::CoverageAnalysis;
use crate::error::PipelineError;
use crate::model::TestCase;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tca_model::{call_structured, Capability, LanguageModel, RetryExecutor};
use tca_scenario::ScenarioDocument;

/// Verdicts for one scenario plus the evidence behind each present case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioAnalysis {
    /// One entry per known test case the model judged, in response order
    pub test_cases: Vec<TestCase>,
    /// Quoted excerpt per test case id
    pub evidence: HashMap<String, String>,
}

/// Prefix of `text` holding at most `max_chars` characters
#[must_use]
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Markdown list of test cases for the coverage prompt
#[must_use]
pub fn format_test_cases(test_cases: &[TestCase]) -> String {
    let mut list = String::new();
    for tc in test_cases {
        let _ = writeln!(list, "- {}: {}", tc.id, tc.description);
    }
    list
}

/// Judges which test cases one scenario implements
pub struct CoverageAnalyzer {
    model: Arc<dyn LanguageModel>,
    capability: Capability,
    retry: RetryExecutor,
    temperature: f32,
    excerpt_chars: Option<usize>,
}

impl std::fmt::Debug for CoverageAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverageAnalyzer")
            .field("capability", &self.capability.name())
            .field("temperature", &self.temperature)
            .field("excerpt_chars", &self.excerpt_chars)
            .finish_non_exhaustive()
    }
}

impl CoverageAnalyzer {
    /// Create analyzer
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>, capability: Capability, retry: RetryExecutor) -> Self {
        Self {
            model,
            capability,
            retry,
            temperature: 0.0,
            excerpt_chars: None,
        }
    }

    /// With sampling temperature
    #[inline]
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// With requirement excerpt limit (characters)
    #[inline]
    #[must_use]
    pub fn with_excerpt_chars(mut self, limit: Option<usize>) -> Self {
        self.excerpt_chars = limit;
        self
    }

    /// Analyze `scenario` against `templates`
    ///
    /// Verdicts for ids not in `templates` are dropped; for repeated ids the
    /// first verdict wins. Descriptions always come from `templates`.
    ///
    /// # Errors
    /// The model error once retries are exhausted, or `Parse` for a
    /// malformed response
    pub async fn analyze(
        &self,
        req_id: &str,
        requirement: &str,
        scenario: &ScenarioDocument,
        templates: &[TestCase],
    ) -> Result<ScenarioAnalysis, PipelineError> {
        let requirement = match self.excerpt_chars {
            Some(limit) => excerpt(requirement, limit),
            None => requirement,
        };
        let list = format_test_cases(templates);
        let vars = [
            ("req_name", req_id),
            ("requirement_excerpt", requirement),
            ("scenario_name", scenario.name.as_str()),
            ("test_cases_list", list.as_str()),
            ("scenario_content", scenario.content.as_str()),
        ];
        let vars = vars.as_slice();
        let (model, capability, temperature) =
            (self.model.as_ref(), &self.capability, self.temperature);
        let response: CoverageAnalysis = self
            .retry
            .execute(move || call_structured(model, capability, vars, temperature))
            .await?;

        let descriptions: HashMap<&str, &str> = templates
            .iter()
            .map(|tc| (tc.id.as_str(), tc.description.as_str()))
            .collect();

        let mut test_cases = Vec::with_capacity(response.test_cases.len());
        let mut evidence: HashMap<String, String> = HashMap::new();
        for verdict in response.test_cases {
            let Some(description) = descriptions.get(verdict.id.as_str()) else {
                tracing::warn!(
                    scenario = %scenario.name,
                    test_case = %verdict.id,
                    "verdict for unknown test case dropped"
                );
                continue;
            };
            if evidence.contains_key(&verdict.id) {
                tracing::debug!(test_case = %verdict.id, "repeated verdict ignored");
                continue;
            }
            test_cases.push(TestCase::new(verdict.id.clone(), *description).with_present(verdict.present));
            evidence.insert(verdict.id, verdict.evidence);
        }

        tracing::info!(
            scenario = %scenario.name,
            judged = test_cases.len(),
            present = test_cases.iter().filter(|tc| tc.present).count(),
            "coverage analyzed"
        );
        Ok(ScenarioAnalysis {
            test_cases,
            evidence,
        })
    }
}
