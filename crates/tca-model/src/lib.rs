//! TCA Model Boundary
//!
//! Everything the pipeline needs to talk to a language model:
//! - [`LanguageModel`]: the black-box service (prompt + schema → JSON instance)
//! - [`CapabilityRegistry`]: typed prompt/schema definitions validated at startup
//! - [`RetryExecutor`]: bounded exponential backoff on transient failures
//! - [`OpenAiCompatibleClient`]: HTTP implementation for chat-completions endpoints
//!
//! # Example
//!
//! ```rust,ignore
//! use tca_model::{call_structured, Capability, RetryExecutor, RetryPolicy};
//!
//! # async fn example(model: &dyn tca_model::LanguageModel) -> Result<(), tca_model::ModelError> {
//! let capability = Capability::new::<Answer>("answer", "You answer.", "Q: {question}", &["question"]);
//! let executor = RetryExecutor::new(RetryPolicy::default());
//!
//! let answer: Answer = executor
//!     .execute(|| call_structured(model, &capability, &[("question", "why?")], 0.0))
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod capability;
pub mod error;
pub mod http;
pub mod request;
pub mod retry;

pub use capability::{strict_schema, Capability, CapabilityRegistry, PromptTemplate, RegistryError};
pub use error::{ModelError, TemplateError};
pub use http::{ModelSettings, OpenAiCompatibleClient};
pub use request::{call_structured, LanguageModel, StructuredRequest};
pub use retry::{RetryExecutor, RetryPolicy, Sleeper, TokioSleeper, Transient};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
