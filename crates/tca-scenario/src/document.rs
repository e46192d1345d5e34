//! Scenario loading

use crate::error::ScenarioError;
use std::path::{Path, PathBuf};

/// Loaded scenario file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioDocument {
    /// File stem, e.g. `scenario_1`
    pub name: String,
    /// Path as located
    pub path: PathBuf,
    /// Full UTF-8 content
    pub content: String,
}

/// Scenario name for `path`: its file stem
#[must_use]
pub fn scenario_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read a scenario as UTF-8
///
/// # Errors
/// - `ScenarioError::Io` if the file cannot be read
/// - `ScenarioError::NotUtf8` if the content is not UTF-8
pub async fn load_scenario(path: &Path) -> Result<ScenarioDocument, ScenarioError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ScenarioError::io(path, e))?;
    let content =
        String::from_utf8(bytes).map_err(|_| ScenarioError::NotUtf8(path.to_path_buf()))?;

    Ok(ScenarioDocument {
        name: scenario_name(path),
        path: path.to_path_buf(),
        content,
    })
}
