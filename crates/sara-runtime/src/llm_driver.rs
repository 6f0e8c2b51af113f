//! [`LlmDriver`] – OpenAI-compatible chat-completions client.
//!
//! Talks to any server exposing `/v1/chat/completions`, such as
//! [Ollama](https://ollama.com) (`http://localhost:11434`).  Structured calls
//! carry a JSON Schema in `response_format` so the model is constrained to
//! the expected shape.
//!
//! # Example
//!
//! ```rust,no_run
//! use sara_runtime::llm_driver::{ChatMessage, LlmDriver, Role};
//!
//! let driver = LlmDriver::new("http://localhost:11434", "llama3");
//! let messages = vec![ChatMessage::user("What is the capital of India?")];
//!
//! // Requires a running Ollama instance.
//! // let reply = driver.complete(&messages).await.unwrap();
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from LLM driver operations.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The HTTP request to the model server failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The response from the model server could not be parsed.
    #[error("Unexpected response format: {0}")]
    BadResponse(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Message types (OpenAI-compatible)
// ─────────────────────────────────────────────────────────────────────────────

/// The role of a participant in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal request / response shapes
// ─────────────────────────────────────────────────────────────────────────────

/// `response_format` field that enforces structured JSON Schema output.
#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: serde_json::Value,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

// ─────────────────────────────────────────────────────────────────────────────
// LlmDriver
// ─────────────────────────────────────────────────────────────────────────────

/// An async client for an OpenAI-compatible chat-completions endpoint.
///
/// Construct once and share; every call is a single round-trip with no
/// retry.
pub struct LlmDriver {
    base_url: String,
    model: String,
    api_key: Option<Zeroizing<String>>,
    client: reqwest::Client,
}

fn build_client(timeout: Option<Duration>) -> reqwest::Client {
    let mut builder = reqwest::Client::builder();
    if let Some(t) = timeout {
        builder = builder.timeout(t);
    }
    builder.build().unwrap_or_else(|_| reqwest::Client::new())
}

impl LlmDriver {
    /// Create a new driver pointing at `base_url` (e.g. `"http://localhost:11434"`)
    /// and using `model` (e.g. `"llama3"`).
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
            client: build_client(None),
        }
    }

    /// Bound every request to `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(Some(timeout));
        self
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty()).map(Zeroizing::new);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `messages` and return the assistant's reply text.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Http`] if the request fails, or
    /// [`LlmError::BadResponse`] if the response shape is unexpected.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.send(messages, None).await
    }

    /// Like [`complete`][Self::complete] but constrains the reply to `schema`
    /// via `response_format`.
    pub async fn complete_structured(
        &self,
        messages: &[ChatMessage],
        schema: serde_json::Value,
    ) -> Result<String, LlmError> {
        self.send(
            messages,
            Some(ResponseFormat {
                kind: "json_schema",
                json_schema: schema,
            }),
        )
        .await
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        response_format: Option<ResponseFormat>,
    ) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            response_format,
        };
        debug!(url = %url, model = %self.model, messages = messages.len(), "sending chat completion");

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.as_str());
        }
        let response: ChatResponse = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::BadResponse("empty choices array".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_role_variants_serialize() {
        let roles = [
            (Role::System, "system"),
            (Role::User, "user"),
            (Role::Assistant, "assistant"),
        ];
        for (role, expected) in roles {
            let msg = ChatMessage {
                role,
                content: String::new(),
            };
            let json = serde_json::to_string(&msg).unwrap();
            assert!(json.contains(expected));
        }
    }

    #[test]
    fn plain_request_omits_response_format() {
        let messages = [ChatMessage::user("hi")];
        let body = ChatRequest {
            model: "llama3",
            messages: &messages,
            stream: false,
            response_format: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("response_format").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn structured_request_carries_schema() {
        let messages = [ChatMessage::user("plan")];
        let body = ChatRequest {
            model: "llama3",
            messages: &messages,
            stream: false,
            response_format: Some(ResponseFormat {
                kind: "json_schema",
                json_schema: serde_json::json!({ "title": "AutomationPlan" }),
            }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_schema");
        assert_eq!(json["response_format"]["json_schema"]["title"], "AutomationPlan");
    }

    #[test]
    fn trailing_slash_is_trimmed_and_empty_key_ignored() {
        let driver = LlmDriver::new("http://localhost:11434/", "llama3").with_api_key(Some(String::new()));
        assert_eq!(driver.base_url, "http://localhost:11434");
        assert!(driver.api_key.is_none());
        assert_eq!(driver.model(), "llama3");
    }

    #[tokio::test]
    async fn unreachable_server_is_http_error() {
        let driver = LlmDriver::new("http://127.0.0.1:1", "llama3").with_timeout(Duration::from_secs(2));
        let err = driver.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, LlmError::Http(_)));
    }
}
