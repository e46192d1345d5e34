//! Cross-scenario OR-fold
//!
//! A test case is covered when at least one scenario covers it. Ids keep the
//! position of their first appearance.

use crate::model::{ScenarioResult, TestCase};
use indexmap::IndexMap;

/// Fold per-scenario verdicts into one entry per test-case id
#[must_use]
pub fn aggregate(results: &[ScenarioResult]) -> Vec<TestCase> {
    let mut merged: IndexMap<&str, TestCase> = IndexMap::new();
    for result in results {
        for tc in &result.test_cases {
            merged
                .entry(tc.id.as_str())
                .and_modify(|seen| seen.present |= tc.present)
                .or_insert_with(|| tc.clone());
        }
    }
    merged.into_values().collect()
}

/// Number of covered cases in an aggregation
#[must_use]
pub fn covered_count(aggregated: &[TestCase]) -> usize {
    aggregated.iter().filter(|tc| tc.present).count()
}
