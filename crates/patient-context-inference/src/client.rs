// crates/patient-context-inference/src/client.rs
// ============================================================================
// Module: Inference Client
// Description: Blocking chat-completions client for the local backend.
// Purpose: Issue bounded, single-shot summarization calls with no retries.
// Dependencies: reqwest, serde_json
// ============================================================================

//! ## Overview
//! The inference client issues one blocking HTTP POST per summarization call
//! against the configured chat-completions endpoint. There are no retries:
//! transport failures, timeouts, and non-success statuses surface as
//! [`InferenceError::Backend`] and the caller decides how they map onto the
//! protocol surface.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::sanitize::SanitizeError;
use crate::sanitize::sanitize_and_parse;

/// User agent string for outbound backend requests.
const USER_AGENT: &str = "patient-context/0.1";

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the inference client.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceConfig {
    /// Full chat completions endpoint URL.
    pub chat_url: String,
    /// Backend model identifier.
    pub model: String,
    /// Output token budget per call.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

// ============================================================================
// SECTION: Client Implementation
// ============================================================================

/// Blocking client for the local chat-completions backend.
pub struct InferenceClient {
    /// Client configuration, including the endpoint and sampling limits.
    config: InferenceConfig,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl InferenceClient {
    /// Creates a new inference client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::Client`] when the HTTP client cannot be built.
    pub fn new(config: InferenceConfig) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(USER_AGENT)
            .redirect(Policy::none())
            .build()
            .map_err(|_| InferenceError::Client("http client build failed".to_string()))?;
        Ok(Self {
            config,
            client,
        })
    }

    /// Calls the backend with the fixed system instruction and user input,
    /// returning the sanitized structured summary.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError`] on transport failure, non-success status,
    /// unusable response shape, or unparseable output. Failures are never
    /// retried.
    pub fn summarize(
        &self,
        system_instruction: &str,
        user_input: &str,
    ) -> Result<Value, InferenceError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: user_input,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        let response = self
            .client
            .post(&self.config.chat_url)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .map_err(|err| InferenceError::Backend(format!("backend request failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(InferenceError::Backend(format!("backend returned status {status}")));
        }
        let parsed: ChatResponse = response
            .json()
            .map_err(|err| InferenceError::Response(format!("backend body unreadable: {err}")))?;
        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            InferenceError::Response("backend response has no choices".to_string())
        })?;
        let content = choice
            .message
            .content
            .ok_or_else(|| InferenceError::Response("backend message has no content".to_string()))?;
        let text = match content {
            MessageContent::Text(text) => text,
            MessageContent::Parts(parts) => {
                parts.iter().map(|part| part.text.as_deref().unwrap_or_default()).collect()
            }
        };
        Ok(sanitize_and_parse(&text)?)
    }
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Chat completions request body.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    /// Backend model identifier.
    model: &'a str,
    /// Conversation messages (system instruction + user input).
    messages: Vec<ChatMessage<'a>>,
    /// Output token budget.
    max_tokens: u32,
    /// Sampling temperature.
    temperature: f64,
}

/// Single chat message.
#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    /// Message role (`system` or `user`).
    role: &'static str,
    /// Message text.
    content: &'a str,
}

/// Chat completions response body.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    /// Returned completion choices.
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

/// Single completion choice.
#[derive(Debug, Deserialize)]
struct ChatChoice {
    /// Choice message payload.
    message: ChoiceMessage,
}

/// Message payload inside a choice.
#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    /// Message content: a single string or a sequence of parts.
    #[serde(default)]
    content: Option<MessageContent>,
}

/// Backend message content shapes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    /// Content returned as a single string.
    Text(String),
    /// Content returned as a sequence of text parts.
    Parts(Vec<ContentPart>),
}

/// One part of a multi-part content sequence.
#[derive(Debug, Deserialize)]
struct ContentPart {
    /// Text field of the part; parts without text contribute nothing.
    #[serde(default)]
    text: Option<String>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Inference client errors.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// HTTP client construction failed.
    #[error("inference client error: {0}")]
    Client(String),
    /// Transport failure, timeout, or non-success backend status.
    #[error("inference backend error: {0}")]
    Backend(String),
    /// Backend response shape was unusable.
    #[error("inference response error: {0}")]
    Response(String),
    /// Backend output failed to parse after sanitation.
    #[error("inference output error: {0}")]
    Parse(#[from] SanitizeError),
}

impl InferenceError {
    /// Returns a stable label for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Client(_) => "client",
            Self::Backend(_) => "backend",
            Self::Response(_) => "response",
            Self::Parse(_) => "parse",
        }
    }
}
