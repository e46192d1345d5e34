//! Structured requests and the language-model seam

use crate::capability::Capability;
use crate::error::ModelError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// One structured completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredRequest {
    /// Capability that produced the request
    pub capability: String,
    /// System prompt
    pub system_prompt: String,
    /// Rendered user prompt
    pub user_prompt: String,
    /// Schema name sent to the service
    pub schema_name: String,
    /// JSON schema the response must satisfy
    pub schema: serde_json::Value,
    /// Sampling temperature
    pub temperature: f32,
}

/// Language-model service
///
/// Treated as a black box: prompt + schema in, a JSON instance of the schema
/// out. Implementations classify their failures with [`ModelError::classify`].
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one structured completion
    async fn complete_structured(
        &self,
        request: &StructuredRequest,
    ) -> Result<serde_json::Value, ModelError>;
}

/// Render `capability`, call the model once, and decode the response as `T`
///
/// # Errors
/// - `ModelError::Template` if a variable is missing
/// - whatever the model returns
/// - `ModelError::Parse` if the response does not decode as `T`
pub async fn call_structured<T>(
    model: &dyn LanguageModel,
    capability: &Capability,
    vars: &[(&str, &str)],
    temperature: f32,
) -> Result<T, ModelError>
where
    T: DeserializeOwned,
{
    let request = capability.request(vars, temperature)?;
    tracing::debug!(capability = %request.capability, "structured model call");

    let value = model.complete_structured(&request).await?;
    if value.is_null() {
        return Err(ModelError::parse(format!(
            "no parsed response for '{}'",
            request.capability
        )));
    }

    serde_json::from_value(value)
        .map_err(|e| ModelError::parse(format!("{}: {e}", request.capability)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde_json::json;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Echo {
        text: String,
    }

    struct Fixed(serde_json::Value);

    #[async_trait::async_trait]
    impl LanguageModel for Fixed {
        async fn complete_structured(
            &self,
            _request: &StructuredRequest,
        ) -> Result<serde_json::Value, ModelError> {
            Ok(self.0.clone())
        }
    }

    fn echo_capability() -> Capability {
        Capability::new::<Echo>("echo", "Repeat the input.", "Input: {input}", &["input"])
    }

    #[tokio::test]
    async fn decodes_matching_response() {
        let model = Fixed(json!({"text": "hello"}));
        let echo: Echo = call_structured(&model, &echo_capability(), &[("input", "hello")], 0.0)
            .await
            .unwrap();
        assert_eq!(echo.text, "hello");
    }

    #[tokio::test]
    async fn null_response_is_parse_error() {
        let model = Fixed(serde_json::Value::Null);
        let result: Result<Echo, _> =
            call_structured(&model, &echo_capability(), &[("input", "x")], 0.0).await;
        assert!(matches!(result, Err(ModelError::Parse(msg)) if msg.contains("no parsed response")));
    }

    #[tokio::test]
    async fn schema_mismatch_is_parse_error() {
        let model = Fixed(json!({"other": 1}));
        let result: Result<Echo, _> =
            call_structured(&model, &echo_capability(), &[("input", "x")], 0.0).await;
        assert!(result.unwrap_err().is_parse());
    }

    #[tokio::test]
    async fn missing_variable_never_reaches_model() {
        let model = Fixed(json!({"text": "unused"}));
        let result: Result<Echo, _> = call_structured(&model, &echo_capability(), &[], 0.0).await;
        assert!(matches!(result, Err(ModelError::Template(_))));
    }
}
