//! HTTP client for OpenAI-compatible chat-completions endpoints

use crate::error::ModelError;
use crate::request::{LanguageModel, StructuredRequest};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

/// Model endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Base URL, without the `/chat/completions` suffix
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Sampling temperature for calls that do not pin their own
    pub temperature: f32,
    /// Completion token limit
    pub max_tokens: Option<u32>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.0,
            max_tokens: None,
            request_timeout_secs: 120,
        }
    }
}

impl ModelSettings {
    /// Full completions URL
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

/// [`LanguageModel`] over HTTP using strict JSON-schema response format
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    settings: ModelSettings,
    api_key: Option<String>,
}

impl OpenAiCompatibleClient {
    /// Build client, reading the API key from the configured environment variable
    ///
    /// # Errors
    /// `ModelError::Fatal` if the HTTP client cannot be constructed
    pub fn from_settings(settings: ModelSettings) -> Result<Self, ModelError> {
        let api_key = std::env::var(&settings.api_key_env).ok();
        if api_key.is_none() {
            tracing::warn!(
                env = %settings.api_key_env,
                "API key variable not set; sending unauthenticated requests"
            );
        }
        Self::with_api_key(settings, api_key)
    }

    /// Build client with explicit API key
    ///
    /// # Errors
    /// `ModelError::Fatal` if the HTTP client cannot be constructed
    pub fn with_api_key(
        settings: ModelSettings,
        api_key: Option<String>,
    ) -> Result<Self, ModelError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| ModelError::Fatal {
                status: None,
                message: format!("http client: {e}"),
            })?;

        Ok(Self {
            http,
            settings,
            api_key,
        })
    }

    /// Get settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    fn payload(&self, request: &StructuredRequest) -> serde_json::Value {
        let mut payload = json!({
            "model": self.settings.model,
            "temperature": request.temperature,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema_name,
                    "schema": request.schema,
                    "strict": true,
                }
            }
        });
        if let (Some(limit), Some(obj)) = (self.settings.max_tokens, payload.as_object_mut()) {
            obj.insert("max_tokens".to_string(), json!(limit));
        }
        payload
    }
}

/// Extract the structured instance from a completions body
fn structured_content(body: &[u8]) -> Result<serde_json::Value, ModelError> {
    let response: CompletionResponse = serde_json::from_slice(body)
        .map_err(|e| ModelError::parse(format!("completion body: {e}")))?;

    let message = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| ModelError::parse("no parsed response: empty choices"))?;

    if let Some(refusal) = message.refusal {
        return Err(ModelError::parse(format!("model refused: {refusal}")));
    }

    let content = message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ModelError::parse("no parsed response: empty content"))?;

    serde_json::from_str(&content).map_err(|e| ModelError::parse(format!("content is not JSON: {e}")))
}

#[async_trait::async_trait]
impl LanguageModel for OpenAiCompatibleClient {
    async fn complete_structured(
        &self,
        request: &StructuredRequest,
    ) -> Result<serde_json::Value, ModelError> {
        let mut builder = self
            .http
            .post(self.settings.endpoint())
            .json(&self.payload(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            let status = e.status().map(|s| s.as_u16());
            ModelError::classify(status, format!("request error: {e}"))
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ModelError::classify(Some(status.as_u16()), format!("body: {e}")))?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            tracing::debug!(status = status.as_u16(), capability = %request.capability, "model call rejected");
            return Err(ModelError::classify(
                Some(status.as_u16()),
                format!("HTTP {status}: {}", text.trim()),
            ));
        }

        structured_content(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
    #[allow(dead_code)]
    struct CoverageVerdict {
        id: String,
        present: bool,
    }

    #[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
    #[allow(dead_code)]
    struct CoverageAnalysis {
        test_cases: Vec<CoverageVerdict>,
    }

    fn request() -> StructuredRequest {
        crate::Capability::new::<CoverageAnalysis>(
            "identify_coverage",
            "sys",
            "{scenario}",
            &["scenario"],
        )
        .request(&[("scenario", "user")], 0.0)
        .unwrap()
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let settings = ModelSettings {
            base_url: "http://localhost:8000/v1/".to_string(),
            ..ModelSettings::default()
        };
        assert_eq!(settings.endpoint(), "http://localhost:8000/v1/chat/completions");
    }

    #[test]
    fn payload_uses_strict_schema() {
        let settings = ModelSettings {
            max_tokens: Some(512),
            ..ModelSettings::default()
        };
        let client = OpenAiCompatibleClient::with_api_key(settings, None).unwrap();
        let payload = client.payload(&request());

        assert_eq!(payload["response_format"]["type"], "json_schema");
        assert_eq!(payload["response_format"]["json_schema"]["strict"], true);
        assert_eq!(
            payload["response_format"]["json_schema"]["name"],
            "CoverageAnalysis"
        );
        assert_eq!(payload["messages"][1]["content"], "user");
        assert_eq!(payload["max_tokens"], 512);

        let schema = &payload["response_format"]["json_schema"]["schema"];
        assert!(schema.get("$schema").is_none());
        assert!(schema.get("definitions").is_none());
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["required"], json!(["test_cases"]));
        let verdict = &schema["properties"]["test_cases"]["items"];
        assert_eq!(verdict["additionalProperties"], false);
        assert_eq!(verdict["required"], json!(["id", "present"]));
    }

    #[test]
    fn extracts_json_content() {
        let body = br#"{"choices":[{"message":{"content":"{\"ok\":true}"}}]}"#;
        assert_eq!(structured_content(body).unwrap(), json!({"ok": true}));
    }

    #[test]
    fn empty_choices_are_parse_errors() {
        assert!(structured_content(br#"{"choices":[]}"#).unwrap_err().is_parse());
        assert!(structured_content(br#"{"choices":[{"message":{"content":""}}]}"#)
            .unwrap_err()
            .is_parse());
    }

    #[test]
    fn refusal_is_parse_error() {
        let body = br#"{"choices":[{"message":{"content":null,"refusal":"no"}}]}"#;
        let err = structured_content(body).unwrap_err();
        assert_eq!(err, ModelError::Parse("model refused: no".to_string()));
    }

    #[test]
    fn non_json_content_is_parse_error() {
        let body = br#"{"choices":[{"message":{"content":"not json"}}]}"#;
        assert!(structured_content(body).unwrap_err().is_parse());
    }
}
