//! Coverage report rendering
//!
//! Built from the terminal [`PipelineState`]: a JSON document with the
//! aggregated verdicts and a plain-text false-positive report grouped by
//! scenario.

use crate::aggregator::covered_count;
use crate::model::{FalsePositive, RunId, TestCase};
use crate::state::PipelineState;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tca_scenario::validate_req_id;

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No errors
    Complete,
    /// Verdicts available alongside diagnostics
    Partial,
    /// Errors and nothing aggregated
    Failed,
}

impl RunStatus {
    /// Derive status from the terminal state
    #[must_use]
    pub fn of(state: &PipelineState) -> Self {
        match (state.errors.is_empty(), state.aggregated_test_cases.is_empty()) {
            (true, _) => Self::Complete,
            (false, true) => Self::Failed,
            (false, false) => Self::Partial,
        }
    }
}

/// Coverage figures
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    /// Covered test cases
    pub covered: usize,
    /// Aggregated test cases
    pub total: usize,
    /// `covered / total × 100`, 0 when there is nothing to cover
    pub percentage: f64,
    /// 1-10 bucket of `percentage`
    pub score: u8,
}

impl CoverageSummary {
    /// Summarize an aggregation
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn of(aggregated: &[TestCase]) -> Self {
        let covered = covered_count(aggregated);
        let total = aggregated.len();
        let percentage = if total == 0 {
            0.0
        } else {
            covered as f64 * 100.0 / total as f64
        };
        Self {
            covered,
            total,
            percentage,
            score: score_bucket(percentage),
        }
    }
}

/// Map a percentage onto 1-10: 0-9% → 1, 10-19% → 2, …, 90-100% → 10
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn score_bucket(percentage: f64) -> u8 {
    let decile = (percentage.clamp(0.0, 100.0) / 10.0).floor() as u8;
    (decile + 1).min(10)
}

/// Report of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub run_id: RunId,
    pub req_id: String,
    pub generated_at: DateTime<Utc>,
    pub status: RunStatus,
    pub summary: CoverageSummary,
    /// Scenarios analyzed successfully
    pub scenarios_analyzed: usize,
    pub test_cases: Vec<TestCase>,
    pub false_positives: Vec<FalsePositive>,
    pub errors: Vec<String>,
}

impl CoverageReport {
    /// Build from the terminal state
    #[must_use]
    pub fn from_state(state: &PipelineState) -> Self {
        Self {
            run_id: state.run_id,
            req_id: state.req_name.clone(),
            generated_at: Utc::now(),
            status: RunStatus::of(state),
            summary: CoverageSummary::of(&state.aggregated_test_cases),
            scenarios_analyzed: state.scenario_results.len(),
            test_cases: state.aggregated_test_cases.clone(),
            false_positives: state.false_positives.clone(),
            errors: state.errors.clone(),
        }
    }

    /// Pretty JSON rendering
    ///
    /// # Errors
    /// Serialization failure
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Plain-text false-positive report, grouped by scenario file
    #[must_use]
    pub fn false_positive_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "False positive report for {}", self.req_id);
        let _ = writeln!(out, "Run: {}", self.run_id);
        let _ = writeln!(
            out,
            "Coverage: {}/{} ({:.1}%), score {}/10",
            self.summary.covered, self.summary.total, self.summary.percentage, self.summary.score
        );

        if self.false_positives.is_empty() {
            let _ = writeln!(out, "\nNo false positives detected.");
            return out;
        }

        let mut by_scenario: IndexMap<&Path, Vec<&FalsePositive>> = IndexMap::new();
        for fp in &self.false_positives {
            by_scenario
                .entry(fp.scenario_path.as_path())
                .or_default()
                .push(fp);
        }

        for (path, entries) in by_scenario {
            let _ = writeln!(out, "\n== {} ({}) ==", entries[0].scenario_name, path.display());
            for fp in entries {
                let _ = writeln!(out, "- {}: {}", fp.test_case_id, fp.test_case_description);
                let _ = writeln!(out, "  Reason: {}", fp.reason);
                if !fp.missing_elements.is_empty() {
                    let _ = writeln!(out, "  Missing: {}", fp.missing_elements.join(", "));
                }
            }
        }
        out
    }

    /// Write `<req>_coverage.json` and `<req>_false_positives.txt` into `dir`
    ///
    /// # Errors
    /// `InvalidInput` when the requirement id cannot name a file, otherwise
    /// I/O or serialization failure
    pub async fn write_to(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        validate_req_id(&self.req_id)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        tokio::fs::create_dir_all(dir).await?;

        let json_path = dir.join(format!("{}_coverage.json", self.req_id));
        let json = self.to_json().map_err(std::io::Error::other)?;
        tokio::fs::write(&json_path, json).await?;

        let text_path = dir.join(format!("{}_false_positives.txt", self.req_id));
        tokio::fs::write(&text_path, self.false_positive_text()).await?;

        tracing::info!(dir = %dir.display(), "reports written");
        Ok(vec![json_path, text_path])
    }
}
