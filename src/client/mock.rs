//! Mock client for testing
//!
//! Returns configurable responses without making real API calls, and is fully
//! deterministic: the same queue produces the same run, byte for byte.
//! Essential for unit tests and CI pipelines.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::{GenerateRequest, LanguageModel};
use crate::schema::SchemaDescriptor;

/// Mock client that returns predefined responses
#[derive(Debug)]
pub struct MockClient {
    /// Queue of responses to return (FIFO), shared across text and structured calls
    responses: Arc<Mutex<Vec<Value>>>,
    /// Default response when the queue is empty
    default_response: Value,
    /// Track all requests made (for assertions)
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// A request the mock has seen, with the schema it was given (if structured)
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request: GenerateRequest,
    pub schema: Option<Value>,
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![])),
            default_response: Value::String("Mock response".to_string()),
            requests: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Create with a queue of responses. Objects feed the structured path;
    /// strings exercise the heuristic extraction tiers.
    pub fn with_responses(responses: Vec<Value>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            default_response: Value::String("Mock response".to_string()),
            requests: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Set the default response for when the queue is empty
    pub fn with_default(mut self, response: Value) -> Self {
        self.default_response = response;
        self
    }

    /// Add a response to the queue
    pub fn queue_response(&self, response: Value) {
        self.responses.lock().unwrap().push(response);
    }

    /// Get all requests made to this client
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Get the last request made
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    fn next_response(&self) -> Value {
        let mut queue = self.responses.lock().unwrap();
        if queue.is_empty() {
            self.default_response.clone()
        } else {
            queue.remove(0)
        }
    }

    fn record(&self, request: &GenerateRequest, schema: Option<&SchemaDescriptor>) {
        self.requests.lock().unwrap().push(RecordedRequest {
            request: request.clone(),
            schema: schema.map(|s| s.as_json().clone()),
        });
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for MockClient {
    fn name(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        "mock-v1"
    }

    async fn generate_text(&self, request: GenerateRequest) -> Result<String> {
        self.record(&request, None);
        let response = self.next_response();
        Ok(match response {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    async fn generate_structured(
        &self,
        request: GenerateRequest,
        schema: &SchemaDescriptor,
    ) -> Result<Value> {
        self.record(&request, Some(schema));
        Ok(self.next_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::OutputSpec;
    use serde_json::json;

    fn schema(keys: &[&str]) -> SchemaDescriptor {
        let outputs: Vec<OutputSpec> = keys
            .iter()
            .map(|name| OutputSpec {
                name: name.to_string(),
                description: String::new(),
            })
            .collect();
        SchemaDescriptor::for_outputs(&outputs)
    }

    #[tokio::test]
    async fn default_response_when_queue_empty() {
        let client = MockClient::new();
        let text = client
            .generate_text(GenerateRequest::new("Hello", "mock-v1"))
            .await
            .unwrap();
        assert_eq!(text, "Mock response");
    }

    #[tokio::test]
    async fn queued_responses_in_fifo_order() {
        let client = MockClient::with_responses(vec![json!("first"), json!("second")]);

        let r1 = client
            .generate_text(GenerateRequest::new("a", "m"))
            .await
            .unwrap();
        let r2 = client
            .generate_text(GenerateRequest::new("b", "m"))
            .await
            .unwrap();
        let r3 = client
            .generate_text(GenerateRequest::new("c", "m"))
            .await
            .unwrap();

        assert_eq!(r1, "first");
        assert_eq!(r2, "second");
        assert_eq!(r3, "Mock response");
    }

    #[tokio::test]
    async fn structured_returns_queued_object() {
        let client = MockClient::with_responses(vec![json!({"x": "hello"})]);
        let value = client
            .generate_structured(GenerateRequest::new("go", "m"), &schema(&["x"]))
            .await
            .unwrap();
        assert_eq!(value, json!({"x": "hello"}));
    }

    #[tokio::test]
    async fn records_requests_with_schema() {
        let client = MockClient::new();

        client
            .generate_text(GenerateRequest::new("plain", "m"))
            .await
            .unwrap();
        client
            .generate_structured(
                GenerateRequest::new("structured", "m").with_temperature(0.1),
                &schema(&["x"]),
            )
            .await
            .unwrap();

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].schema.is_none());
        assert_eq!(requests[1].request.prompt, "structured");
        assert_eq!(requests[1].request.temperature, 0.1);
        assert_eq!(
            requests[1].schema.as_ref().unwrap()["required"],
            json!(["x"])
        );
    }

    #[tokio::test]
    async fn text_call_stringifies_structured_queue_entry() {
        let client = MockClient::with_responses(vec![json!({"k": 1})]);
        let text = client
            .generate_text(GenerateRequest::new("p", "m"))
            .await
            .unwrap();
        assert_eq!(text, r#"{"k":1}"#);
    }
}
