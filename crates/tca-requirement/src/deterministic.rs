//! Pattern-based requirement extraction
//!
//! A requirement owns the text from its identifier up to the next identifier
//! (or document end). Extracted text is cached; the whole cache is dropped
//! when the document fingerprint changes.

use crate::cache::{RequirementCache, DOCUMENT_HASH_KEY};
use crate::document::SourceDocument;
use crate::error::ResolveError;
use crate::RequirementResolver;
use regex::Regex;
use std::sync::Arc;

/// Default identifier pattern, e.g. `SKYRADAR-ARR-044` or `REQ-001`
///
/// Ids only count at the start of a line, optionally after a section number,
/// so references such as `DO-178` inside a requirement body do not end it.
pub const DEFAULT_ID_PATTERN: &str =
    r"(?m)^[ \t]*(?:\d+(?:\.\d+)*\.?[ \t]+)?([A-Z][A-Z0-9]+(?:-[A-Z]+)*-\d+)\b";

/// Compiled identifier pattern; group 1 is the id
#[derive(Debug, Clone)]
pub struct RequirementPattern {
    regex: Regex,
}

impl RequirementPattern {
    /// Compile pattern
    ///
    /// # Errors
    /// `ResolveError::InvalidPattern` if it does not compile or lacks a capture group
    pub fn new(pattern: &str) -> Result<Self, ResolveError> {
        let regex =
            Regex::new(pattern).map_err(|e| ResolveError::InvalidPattern(e.to_string()))?;
        if regex.captures_len() < 2 {
            return Err(ResolveError::InvalidPattern(format!(
                "'{pattern}' has no capture group"
            )));
        }
        Ok(Self { regex })
    }

    /// Line-anchored pattern for ids of one project, e.g. `SKYRADAR`
    /// matches `SKYRADAR-ARR-044` but not `DO-178`
    ///
    /// # Errors
    /// `ResolveError::InvalidPattern` if `prefix` is blank
    pub fn for_prefix(prefix: &str) -> Result<Self, ResolveError> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(ResolveError::InvalidPattern("empty id prefix".to_string()));
        }
        Self::new(&format!(
            r"(?m)^[ \t]*(?:\d+(?:\.\d+)*\.?[ \t]+)?({}(?:-[A-Z0-9]+)*-\d+)\b",
            regex::escape(prefix)
        ))
    }

    /// Pattern source
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Every occurrence as `(start of id, id)`
    fn occurrences<'t>(&self, text: &'t str) -> Vec<(usize, &'t str)> {
        self.regex
            .captures_iter(text)
            .filter_map(|caps| {
                let id = caps.get(1)?;
                Some((id.start(), id.as_str()))
            })
            .collect()
    }

    /// Text owned by `req_id`, normalized; first occurrence wins
    #[must_use]
    pub fn extract(&self, req_id: &str, text: &str) -> Option<String> {
        let occurrences = self.occurrences(text);
        let index = occurrences.iter().position(|(_, id)| *id == req_id)?;
        let start = occurrences[index].0;
        let end = occurrences
            .get(index + 1)
            .map_or(text.len(), |(next, _)| *next);
        Some(normalize(&text[start..end]))
    }
}

impl Default for RequirementPattern {
    fn default() -> Self {
        Self {
            regex: Regex::new(DEFAULT_ID_PATTERN)
                .unwrap_or_else(|_| unreachable!("static pattern")),
        }
    }
}

/// Trim every line and drop blank ones
#[must_use]
pub fn normalize(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cached pattern extraction over a source document
pub struct DeterministicResolver {
    document: Arc<dyn SourceDocument>,
    cache: Arc<dyn RequirementCache>,
    pattern: RequirementPattern,
}

impl std::fmt::Debug for DeterministicResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeterministicResolver")
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

impl DeterministicResolver {
    /// Create resolver with the default identifier pattern
    #[must_use]
    pub fn new(document: Arc<dyn SourceDocument>, cache: Arc<dyn RequirementCache>) -> Self {
        Self {
            document,
            cache,
            pattern: RequirementPattern::default(),
        }
    }

    /// With identifier pattern
    #[inline]
    #[must_use]
    pub fn with_pattern(mut self, pattern: RequirementPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Clear the cache if the document changed since it was filled
    async fn sync_fingerprint(&self) -> Result<(), ResolveError> {
        let current = self.document.fingerprint().await?;
        let stored = self.cache.get(DOCUMENT_HASH_KEY).await?;

        if stored.as_deref() != Some(current.as_str()) {
            tracing::info!(
                fingerprint = %current,
                had_previous = stored.is_some(),
                "source document changed; clearing requirement cache"
            );
            self.cache.clear().await?;
            self.cache.set(DOCUMENT_HASH_KEY, &current).await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RequirementResolver for DeterministicResolver {
    async fn resolve(&self, req_id: &str) -> Result<String, ResolveError> {
        if req_id == DOCUMENT_HASH_KEY {
            return Err(ResolveError::not_found(req_id));
        }

        self.sync_fingerprint().await?;

        if let Some(text) = self.cache.get(req_id).await? {
            tracing::debug!(req_id, "requirement cache hit");
            return Ok(text);
        }

        let text = self.document.full_text().await?;
        match self.pattern.extract(req_id, &text) {
            Some(found) => {
                self.cache.set(req_id, &found).await?;
                tracing::debug!(req_id, chars = found.len(), "requirement extracted");
                Ok(found)
            }
            None => Err(ResolveError::not_found(req_id)),
        }
    }

    fn name(&self) -> &'static str {
        "deterministic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOC: &str = "Intro text\n\
        SKYRADAR-ARR-044  The system shall raise an alarm\n\
        \n\
           when altitude drops below 500 ft.  \n\
        SKYRADAR-CPDLC-047 The system shall log messages.\n";

    #[test]
    fn extract_runs_to_next_id() {
        let pattern = RequirementPattern::default();
        assert_eq!(
            pattern.extract("SKYRADAR-ARR-044", DOC).unwrap(),
            "SKYRADAR-ARR-044  The system shall raise an alarm\nwhen altitude drops below 500 ft."
        );
    }

    #[test]
    fn extract_runs_to_document_end() {
        let pattern = RequirementPattern::default();
        assert_eq!(
            pattern.extract("SKYRADAR-CPDLC-047", DOC).unwrap(),
            "SKYRADAR-CPDLC-047 The system shall log messages."
        );
    }

    #[test]
    fn extract_missing_id() {
        assert_eq!(RequirementPattern::default().extract("REQ-999", DOC), None);
    }

    #[test]
    fn first_occurrence_wins() {
        let text = "REQ-001 first\nREQ-002 other\nREQ-001 again";
        let pattern = RequirementPattern::default();
        assert_eq!(pattern.extract("REQ-001", text).unwrap(), "REQ-001 first");
        assert_eq!(pattern.extract("REQ-002", text).unwrap(), "REQ-002 other");
    }

    #[test]
    fn references_inside_a_body_do_not_end_it() {
        let text = "REQ-001 The system shall comply with DO-178 level B\n\
            and MIL-1553 bus timing.\n\
            REQ-002 Next requirement.";
        assert_eq!(
            RequirementPattern::default().extract("REQ-001", text).unwrap(),
            "REQ-001 The system shall comply with DO-178 level B\nand MIL-1553 bus timing."
        );
    }

    #[test]
    fn section_numbers_before_ids_are_skipped() {
        let text = "3.2.1 SKYRADAR-ARR-044 Raise the alarm.\n3.2.2 SKYRADAR-ARR-045 Log it.";
        assert_eq!(
            RequirementPattern::default().extract("SKYRADAR-ARR-044", text).unwrap(),
            "SKYRADAR-ARR-044 Raise the alarm."
        );
    }

    #[test]
    fn prefix_pattern_ignores_other_projects() {
        let pattern = RequirementPattern::for_prefix("SKYRADAR").unwrap();
        let text = "SKYRADAR-ARR-044 Raise the alarm.\n\
            ISO-26262 applies here.\n\
            SKYRADAR-CPDLC-047 Log messages.";
        assert_eq!(
            pattern.extract("SKYRADAR-ARR-044", text).unwrap(),
            "SKYRADAR-ARR-044 Raise the alarm.\nISO-26262 applies here."
        );
        assert_eq!(pattern.extract("ISO-26262", text), None);
        assert!(RequirementPattern::for_prefix("  ").is_err());
    }

    #[test]
    fn pattern_requires_capture_group() {
        assert!(matches!(
            RequirementPattern::new(r"REQ-\d+"),
            Err(ResolveError::InvalidPattern(_))
        ));
        assert!(RequirementPattern::new(r"(REQ-\d+)").is_ok());
        assert!(RequirementPattern::new(r"(REQ-\d+").is_err());
    }

    #[test]
    fn normalize_drops_blank_lines() {
        assert_eq!(normalize("  a \n\n \t\n b\n"), "a\nb");
    }
}
