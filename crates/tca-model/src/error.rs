//! Error types for model calls
//!
//! Every failure that can come back from the model boundary is either
//! transient (worth retrying) or not. Only service-unavailability is transient.

/// HTTP status the service uses to signal temporary unavailability
pub const SERVICE_UNAVAILABLE: u16 = 503;

/// Model boundary error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Service temporarily unavailable; retryable
    #[error("service unavailable: {message}")]
    Transient { message: String },

    /// Non-retryable service failure (bad request, auth, quota, transport)
    #[error("model call failed{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Fatal {
        /// HTTP status, when the failure came from a response
        status: Option<u16>,
        /// Service or transport message
        message: String,
    },

    /// Structured output missing or not matching the schema
    #[error("structured output invalid: {0}")]
    Parse(String),

    /// Prompt could not be rendered
    #[error("prompt error: {0}")]
    Template(#[from] TemplateError),

    /// Capability not registered
    #[error("unknown capability: {0}")]
    UnknownCapability(String),
}

impl ModelError {
    /// Classify a service failure by status code and message
    ///
    /// Status 503, or a message mentioning "503" or "service unavailable"
    /// (any case), is transient. Everything else is fatal.
    #[must_use]
    pub fn classify(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        let unavailable = status == Some(SERVICE_UNAVAILABLE)
            || lowered.contains("503")
            || lowered.contains("service unavailable");

        if unavailable {
            Self::Transient { message }
        } else {
            Self::Fatal { status, message }
        }
    }

    /// Create a parse error
    #[inline]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Check if error came from malformed structured output
    #[inline]
    #[must_use]
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}

/// Prompt template errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// Variable used by the template was not supplied
    #[error("missing template variable '{0}'")]
    MissingVariable(String),

    /// Template uses a placeholder that was never declared
    #[error("undeclared placeholder '{{{0}}}'")]
    UndeclaredPlaceholder(String),

    /// Declared variable never appears in the template
    #[error("declared variable '{0}' is unused")]
    UnusedVariable(String),
}
