//! Fixed directory convention
//!
//! `<root>/<req prefix><req_id>/<test prefix>*/<file prefix>*.<ext>`

use crate::error::ScenarioError;
use crate::{validate_req_id, ScenarioLocator};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Naming convention for scenario trees
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConvention {
    /// Prefix of the per-requirement folder
    pub requirement_dir_prefix: String,
    /// Prefix of per-test subfolders
    pub test_dir_prefix: String,
    /// Prefix of scenario files
    pub file_prefix: String,
    /// Scenario file extension, without the dot
    pub extension: String,
}

impl Default for LayoutConvention {
    fn default() -> Self {
        Self {
            requirement_dir_prefix: "TS_".to_string(),
            test_dir_prefix: "test_".to_string(),
            file_prefix: "scenario_".to_string(),
            extension: "xml".to_string(),
        }
    }
}

impl LayoutConvention {
    /// Folder holding every test of `req_id`
    #[must_use]
    pub fn requirement_dir(&self, root: &Path, req_id: &str) -> PathBuf {
        root.join(format!("{}{req_id}", self.requirement_dir_prefix))
    }

    /// Check if `path` names a scenario file
    #[must_use]
    pub fn is_scenario_file(&self, path: &Path) -> bool {
        let has_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension));
        let has_prefix = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(&self.file_prefix));
        has_extension && has_prefix
    }
}

/// Locator following a [`LayoutConvention`]
#[derive(Debug, Clone)]
pub struct ConventionLocator {
    root: PathBuf,
    convention: LayoutConvention,
}

impl ConventionLocator {
    /// Create locator with the default convention
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            convention: LayoutConvention::default(),
        }
    }

    /// With naming convention
    #[inline]
    #[must_use]
    pub fn with_convention(mut self, convention: LayoutConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Dataset root
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

async fn entries(dir: &Path) -> Result<Vec<PathBuf>, ScenarioError> {
    let mut reader = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ScenarioError::io(dir, e))?;
    let mut out = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| ScenarioError::io(dir, e))?
    {
        out.push(entry.path());
    }
    out.sort();
    Ok(out)
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

#[async_trait::async_trait]
impl ScenarioLocator for ConventionLocator {
    async fn locate(&self, req_id: &str) -> Result<Vec<PathBuf>, ScenarioError> {
        validate_req_id(req_id)?;
        let req_dir = self.convention.requirement_dir(&self.root, req_id);
        if !is_dir(&req_dir).await {
            tracing::debug!(req_id, dir = %req_dir.display(), "requirement folder absent");
            return Ok(Vec::new());
        }

        let mut scenarios = Vec::new();
        for test_dir in entries(&req_dir).await? {
            let is_test_dir = test_dir
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&self.convention.test_dir_prefix));
            if !is_test_dir || !is_dir(&test_dir).await {
                continue;
            }
            for path in entries(&test_dir).await? {
                if self.convention.is_scenario_file(&path) && is_file(&path).await {
                    scenarios.push(path);
                }
            }
        }

        scenarios.sort();
        tracing::debug!(req_id, count = scenarios.len(), "scenarios located");
        Ok(scenarios)
    }

    fn name(&self) -> &'static str {
        "convention"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn scenario_file_detection() {
        let convention = LayoutConvention::default();
        assert!(convention.is_scenario_file(Path::new("a/scenario_1.xml")));
        assert!(convention.is_scenario_file(Path::new("a/scenario_1.XML")));
        assert!(!convention.is_scenario_file(Path::new("a/dataset_1.xml")));
        assert!(!convention.is_scenario_file(Path::new("a/scenario_1.json")));
    }

    #[test]
    fn requirement_dir_uses_prefix() {
        let convention = LayoutConvention::default();
        assert_eq!(
            convention.requirement_dir(Path::new("/data"), "REQ-001"),
            Path::new("/data/TS_REQ-001")
        );
    }
}
