//! # Model Client Abstraction Layer
//!
//! Trait and implementations for language-model backends.
//!
//! All clients implement [`LanguageModel`], exposing two capabilities:
//!
//! - `generate_text`: free-text completion for steps with no declared outputs
//! - `generate_structured`: completion constrained to a
//!   [`SchemaDescriptor`](crate::schema::SchemaDescriptor), for steps that
//!   declare outputs
//!
//! | Client   | Use case   | Behavior |
//! |----------|------------|----------|
//! | `mock`   | Testing    | Deterministic queued responses, records requests |
//! | `openai` | Production | Chat Completions API with `json_schema` response format |
//!
//! Selection happens once, at construction, via [`create_client`], from an
//! explicit configuration value. The engine never inspects ambient
//! environment state to pick a client.

mod mock;
mod openai;

pub use mock::MockClient;
pub use openai::OpenAiClient;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::error::MaestroError;
use crate::schema::SchemaDescriptor;

/// Default sampling temperature when the caller does not set one
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// A single generation request
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Fully-substituted prompt text
    pub prompt: String,
    /// Model identifier (e.g. "gpt-4o", "mock-v1")
    pub model: String,
    /// Sampling temperature (0.0 - 1.0)
    pub temperature: f32,
    /// Optional system message setting the context
    pub system_message: Option<String>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            system_message: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_system_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = Some(message.into());
        self
    }
}

/// Core trait that all model clients implement.
///
/// All methods are async to support HTTP-backed APIs; the engine awaits them
/// without blocking other concurrent runs in the process.
#[async_trait]
pub trait LanguageModel: Send + Sync + std::fmt::Debug {
    /// Client name ("mock", "openai")
    fn name(&self) -> &str;

    /// Model used when the run configuration does not name one
    fn default_model(&self) -> &str;

    /// Free-text generation
    async fn generate_text(&self, request: GenerateRequest) -> Result<String>;

    /// Generation constrained to an output schema.
    ///
    /// Returns the parsed object on success. A client that could not honor
    /// the contract may return a `Value::String`; the engine's heuristic
    /// extraction tier handles that case.
    async fn generate_structured(
        &self,
        request: GenerateRequest,
        schema: &SchemaDescriptor,
    ) -> Result<Value>;
}

/// Create a client instance by name.
///
/// | Name     | Requires |
/// |----------|----------|
/// | `mock`   | Nothing  |
/// | `openai` | `OPENAI_API_KEY` env var |
pub fn create_client(name: &str) -> Result<Box<dyn LanguageModel>, MaestroError> {
    match name.to_lowercase().as_str() {
        "mock" => Ok(Box::new(MockClient::new())),
        "openai" => Ok(Box::new(OpenAiClient::new()?)),
        _ => Err(MaestroError::UnknownClient {
            name: name.to_string(),
        }),
    }
}
