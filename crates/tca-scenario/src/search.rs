//! Exploratory search confined to a root directory

use crate::error::ScenarioError;
use crate::{validate_req_id, ScenarioLocator};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Canonicalize `candidate` and require it to stay under `root`
///
/// `root` must already be canonical.
///
/// # Errors
/// - `ScenarioError::Io` if `candidate` cannot be resolved
/// - `ScenarioError::OutsideSandbox` if it resolves outside `root`
pub fn resolve_within(root: &Path, candidate: &Path) -> Result<PathBuf, ScenarioError> {
    let resolved = candidate
        .canonicalize()
        .map_err(|e| ScenarioError::io(candidate, e))?;
    if resolved.starts_with(root) {
        Ok(resolved)
    } else {
        Err(ScenarioError::OutsideSandbox(candidate.to_path_buf()))
    }
}

/// Check if `name` contains `req_id` as a whole token
///
/// The id must not be glued to further letters or digits, so `REQ-1` is not
/// found in `TS_REQ-10`.
#[must_use]
pub fn mentions_id(name: &str, req_id: &str) -> bool {
    if req_id.is_empty() {
        return false;
    }
    name.match_indices(req_id).any(|(start, _)| {
        let before = name[..start].chars().next_back();
        let after = name[start + req_id.len()..].chars().next();
        !before.is_some_and(|c| c.is_alphanumeric()) && !after.is_some_and(|c| c.is_alphanumeric())
    })
}

/// Walks the root for files whose relative path mentions the requirement id
///
/// Every candidate is canonicalized; anything that escapes the root through a
/// symlink is skipped.
#[derive(Debug, Clone)]
pub struct SandboxSearchLocator {
    root: PathBuf,
    extension: String,
    max_depth: usize,
}

impl SandboxSearchLocator {
    /// Create locator for `.xml` files, depth 6
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: "xml".to_string(),
            max_depth: 6,
        }
    }

    /// With file extension
    #[inline]
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// With maximum walk depth
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn search(&self, req_id: &str) -> Result<Vec<PathBuf>, ScenarioError> {
        let root = match self.root.canonicalize() {
            Ok(root) => root,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ScenarioError::io(&self.root, e)),
        };

        let mut found = Vec::new();
        for entry in WalkDir::new(&root)
            .max_depth(self.max_depth)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let matches_extension = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension));
            let mentions_req = path
                .strip_prefix(&root)
                .unwrap_or(path)
                .components()
                .any(|c| mentions_id(&c.as_os_str().to_string_lossy(), req_id));
            if !matches_extension || !mentions_req {
                continue;
            }

            match resolve_within(&root, path) {
                Ok(resolved) => found.push(resolved),
                Err(err) => tracing::warn!(error = %err, "skipping scenario candidate"),
            }
        }

        found.sort();
        found.dedup();
        Ok(found)
    }
}

#[async_trait::async_trait]
impl ScenarioLocator for SandboxSearchLocator {
    async fn locate(&self, req_id: &str) -> Result<Vec<PathBuf>, ScenarioError> {
        validate_req_id(req_id)?;
        let locator = self.clone();
        let req_id_owned = req_id.to_string();
        let found = tokio::task::spawn_blocking(move || locator.search(&req_id_owned))
            .await
            .map_err(|e| ScenarioError::Search(e.to_string()))??;
        tracing::debug!(req_id, count = found.len(), "scenarios found by search");
        Ok(found)
    }

    fn name(&self) -> &'static str {
        "search"
    }
}
