//! Scenario errors

use std::path::PathBuf;

/// Scenario discovery or loading error
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// File system failure
    #[error("Error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Path resolves outside the search root
    #[error("{0} is outside the scenario root")]
    OutsideSandbox(PathBuf),

    /// Content is not valid UTF-8
    #[error("Error reading {0}: content is not valid UTF-8")]
    NotUtf8(PathBuf),

    /// Requirement id unusable as a path component
    #[error("invalid requirement id '{0}'")]
    InvalidId(String),

    /// Background search task failed
    #[error("scenario search aborted: {0}")]
    Search(String),
}

impl ScenarioError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
