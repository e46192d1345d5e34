//! Capability registry
//!
//! A capability is a named model call with a fixed system prompt, a user
//! prompt template and the JSON schema of its response type. Capabilities
//! are registered and validated once at startup; callers look them up by
//! name and never build prompts ad hoc.

use crate::error::{ModelError, TemplateError};
use crate::request::StructuredRequest;
use indexmap::IndexMap;
use regex::{Captures, Regex};
use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{([a-z_][a-z0-9_]*)\}").unwrap_or_else(|_| unreachable!("static pattern"))
    })
}

/// User prompt template with `{name}` placeholders
///
/// Rendering is single-pass: substituted values are never rescanned, so
/// scenario content containing braces is inserted verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
}

impl PromptTemplate {
    /// Create template
    #[inline]
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Template text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Placeholder names, deduplicated and sorted
    #[must_use]
    pub fn placeholders(&self) -> BTreeSet<String> {
        placeholder_regex()
            .captures_iter(&self.source)
            .map(|c| c[1].to_string())
            .collect()
    }

    /// Substitute every placeholder
    ///
    /// # Errors
    /// `TemplateError::MissingVariable` for the first placeholder without a value
    pub fn render(&self, vars: &[(&str, &str)]) -> Result<String, TemplateError> {
        if let Some(missing) = self
            .placeholders()
            .into_iter()
            .find(|name| !vars.iter().any(|(k, _)| *k == name.as_str()))
        {
            return Err(TemplateError::MissingVariable(missing));
        }

        let rendered = placeholder_regex().replace_all(&self.source, |caps: &Captures<'_>| {
            vars.iter()
                .find(|(k, _)| *k == &caps[1])
                .map(|(_, v)| (*v).to_string())
                .unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }
}

/// Response schema of `T` in the form strict structured-output endpoints
/// accept: subschemas inlined, no `$schema`, `title`, `definitions` or
/// `default`, and every object closed with all its properties required
#[must_use]
pub fn strict_schema<T: JsonSchema>() -> Value {
    let settings = SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
        s.meta_schema = None;
    });
    let root = settings.into_generator().into_root_schema_for::<T>();
    let mut schema = serde_json::to_value(root).unwrap_or(Value::Null);
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("definitions");
    }
    close_objects(&mut schema);
    schema
}

fn close_objects(schema: &mut Value) {
    let Some(obj) = schema.as_object_mut() else {
        return;
    };
    obj.remove("title");
    obj.remove("default");

    let mut required = None;
    if let Some(Value::Object(properties)) = obj.get_mut("properties") {
        for property in properties.values_mut() {
            close_objects(property);
        }
        required = Some(properties.keys().cloned().map(Value::String).collect());
    }
    if let Some(required) = required {
        obj.insert("required".to_string(), Value::Array(required));
        obj.insert("additionalProperties".to_string(), Value::Bool(false));
    }

    if let Some(items) = obj.get_mut("items") {
        match items {
            Value::Array(schemas) => schemas.iter_mut().for_each(close_objects),
            other => close_objects(other),
        }
    }
    for key in ["anyOf", "oneOf", "allOf"] {
        if let Some(Value::Array(schemas)) = obj.get_mut(key) {
            schemas.iter_mut().for_each(close_objects);
        }
    }
}

/// Named, typed model call
#[derive(Debug, Clone)]
pub struct Capability {
    name: String,
    system_prompt: String,
    template: PromptTemplate,
    variables: Vec<String>,
    schema_name: String,
    schema: serde_json::Value,
}

impl Capability {
    /// Define capability whose response decodes as `T`
    #[must_use]
    pub fn new<T: JsonSchema>(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        template: impl Into<String>,
        variables: &[&str],
    ) -> Self {
        let schema = strict_schema::<T>();

        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            template: PromptTemplate::new(template),
            variables: variables.iter().map(ToString::to_string).collect(),
            schema_name: T::schema_name(),
            schema,
        }
    }

    /// Capability name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// System prompt
    #[inline]
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// User prompt template
    #[inline]
    #[must_use]
    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Response schema
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &serde_json::Value {
        &self.schema
    }

    /// Check prompt, schema and declared variables agree
    ///
    /// # Errors
    /// `RegistryError::Invalid` describing the first problem found
    pub fn validate(&self) -> Result<(), RegistryError> {
        let invalid = |reason: String| RegistryError::Invalid {
            name: self.name.clone(),
            reason,
        };

        if self.system_prompt.trim().is_empty() {
            return Err(invalid("empty system prompt".to_string()));
        }
        if !self.schema.is_object() {
            return Err(invalid("response schema is not a JSON object".to_string()));
        }

        let declared: BTreeSet<String> = self.variables.iter().cloned().collect();
        let used = self.template.placeholders();

        if let Some(name) = used.difference(&declared).next() {
            return Err(invalid(
                TemplateError::UndeclaredPlaceholder(name.clone()).to_string(),
            ));
        }
        if let Some(name) = declared.difference(&used).next() {
            return Err(invalid(TemplateError::UnusedVariable(name.clone()).to_string()));
        }
        Ok(())
    }

    /// Build request for this capability
    ///
    /// # Errors
    /// `ModelError::Template` if a declared variable is missing
    pub fn request(
        &self,
        vars: &[(&str, &str)],
        temperature: f32,
    ) -> Result<StructuredRequest, ModelError> {
        Ok(StructuredRequest {
            capability: self.name.clone(),
            system_prompt: self.system_prompt.clone(),
            user_prompt: self.template.render(vars)?,
            schema_name: self.schema_name.clone(),
            schema: self.schema.clone(),
            temperature,
        })
    }
}

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Name registered twice
    #[error("capability registered twice: {0}")]
    Duplicate(String),

    /// Capability failed validation
    #[error("capability '{name}' is invalid: {reason}")]
    Invalid { name: String, reason: String },

    /// Capability not found
    #[error("unknown capability: {0}")]
    Unknown(String),
}

impl From<RegistryError> for ModelError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Unknown(name) => ModelError::UnknownCapability(name),
            other => ModelError::Fatal {
                status: None,
                message: other.to_string(),
            },
        }
    }
}

/// Registry of capabilities, in registration order
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: IndexMap<String, Capability>,
}

impl CapabilityRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability after validating it
    ///
    /// # Errors
    /// - `RegistryError::Duplicate` if the name is taken
    /// - `RegistryError::Invalid` if the capability fails validation
    pub fn register(&mut self, capability: Capability) -> Result<(), RegistryError> {
        if self.capabilities.contains_key(capability.name()) {
            return Err(RegistryError::Duplicate(capability.name().to_string()));
        }
        capability.validate()?;
        self.capabilities
            .insert(capability.name().to_string(), capability);
        Ok(())
    }

    /// Look up capability
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.capabilities.get(name)
    }

    /// Look up capability, failing if absent
    ///
    /// # Errors
    /// `RegistryError::Unknown`
    pub fn require(&self, name: &str) -> Result<&Capability, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))
    }

    /// Ensure every name in `required` is registered
    ///
    /// # Errors
    /// `RegistryError::Unknown` for the first missing name
    pub fn ensure(&self, required: &[&str]) -> Result<(), RegistryError> {
        required.iter().try_for_each(|name| self.require(name).map(|_| ()))
    }

    /// Registered names
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.capabilities.keys().map(String::as_str).collect()
    }

    /// Number of capabilities
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}
