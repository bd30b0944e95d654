//! OpenAI client using the Chat Completions API
//!
//! Requires `OPENAI_API_KEY`, read once at construction. Structured calls use
//! the `json_schema` response format; if the API returns content that is not
//! valid JSON, the raw text is passed through for heuristic extraction.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{GenerateRequest, LanguageModel};
use crate::error::MaestroError;
use crate::schema::SchemaDescriptor;

/// OpenAI API endpoint
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default system message when a run does not set one
const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful assistant.";

#[derive(Debug)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    /// Create a new OpenAI client, reading `OPENAI_API_KEY` from the environment
    pub fn new() -> Result<Self, MaestroError> {
        let api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| MaestroError::ClientConfig {
                details: "OPENAI_API_KEY environment variable not set".to_string(),
            })?;
        Ok(Self::with_api_key(api_key))
    }

    /// Create with a specific API key
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: "gpt-4o".to_string(),
        }
    }

    /// Set the default model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn build_messages(&self, request: &GenerateRequest) -> Vec<ChatMessage> {
        vec![
            ChatMessage {
                role: "system".to_string(),
                content: request
                    .system_message
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SYSTEM_MESSAGE.to_string()),
            },
            ChatMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            },
        ]
    }

    async fn complete(
        &self,
        request: &GenerateRequest,
        response_format: Option<Value>,
    ) -> Result<String> {
        let payload = ChatCompletionRequest {
            model: if request.model.is_empty() {
                self.model.clone()
            } else {
                request.model.clone()
            },
            messages: self.build_messages(request),
            temperature: request.temperature,
            response_format,
        };

        tracing::debug!(
            client = "openai",
            model = %payload.model,
            structured = payload.response_format.is_some(),
            "Sending request to OpenAI API"
        );

        let response = self
            .client
            .post(OPENAI_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .context("Failed to send request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(
                client = "openai",
                status = %status,
                error = %error_text,
                "OpenAI API error"
            );
            anyhow::bail!("OpenAI API error ({}): {}", status, error_text);
        }

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI API response")?;

        Ok(api_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn generate_text(&self, request: GenerateRequest) -> Result<String> {
        self.complete(&request, None).await
    }

    async fn generate_structured(
        &self,
        request: GenerateRequest,
        schema: &SchemaDescriptor,
    ) -> Result<Value> {
        let response_format = json!({
            "type": "json_schema",
            "json_schema": {
                "name": "step_outputs",
                "schema": schema.as_json(),
            }
        });

        let content = self.complete(&request, Some(response_format)).await?;

        // The API normally honors the schema; a refusal or truncation comes
        // back as plain text, which the extraction fallback handles.
        Ok(serde_json::from_str(&content).unwrap_or(Value::String(content)))
    }
}

// ============================================================================
// API TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
