//! LLM completion gateway.
//!
//! Every natural-language generation step in the pipeline issues exactly one
//! request through the `CompletionGateway` trait: single prompt in, single
//! response out, no streaming, no multi-turn history. The HTTP implementation
//! talks to an OpenAI-compatible chat-completions endpoint.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Errors from a single gateway call.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Cannot connect to completion endpoint at {0}")]
    Connection(String),

    #[error("Completion request timed out after {0}s")]
    Timeout(u64),

    #[error("Completion endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Completion response had no choices")]
    EmptyResponse,

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Single-request/single-response text completion.
///
/// Implementations must be safe for concurrent use by multiple in-flight
/// pipeline runs.
pub trait CompletionGateway {
    fn complete(&self, prompt: &str) -> Result<String, GatewayError>;
}

/// HTTP gateway for an OpenAI-compatible chat-completions API.
pub struct OpenAiGateway {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OpenAiGateway {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        }
    }

    /// Build a gateway from process configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.gateway_base_url,
            &config.credentials.openai_api_key,
            &config.gateway_model,
            config.gateway_timeout_secs,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Request body for /v1/chat/completions
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Response body from /v1/chat/completions
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl CompletionGateway for OpenAiGateway {
    fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        tracing::info!(target: "audit", model = %self.model, prompt, "gateway request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    GatewayError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    GatewayError::Timeout(self.timeout_secs)
                } else {
                    GatewayError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| GatewayError::HttpClient(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(GatewayError::EmptyResponse)?;

        tracing::info!(target: "audit", response = %text, "gateway response");

        Ok(text)
    }
}

/// Scripted gateway for tests: pops one canned response per call and records
/// every prompt it receives.
pub struct MockGateway {
    responses: Mutex<std::collections::VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    fail_when_exhausted: bool,
}

impl MockGateway {
    /// A gateway that answers every call with the same text.
    pub fn new(response: &str) -> Self {
        Self::script(vec![response.to_string()])
    }

    /// A gateway that answers calls in order from `responses`. The last
    /// response is repeated once the script is exhausted.
    pub fn script(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
            fail_when_exhausted: false,
        }
    }

    /// A gateway that answers calls in order from `responses`, then fails
    /// every further call with a connection error.
    pub fn script_then_fail(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
            fail_when_exhausted: true,
        }
    }

    /// A gateway whose every call fails with a connection error.
    pub fn unavailable() -> Self {
        Self::script_then_fail(vec![])
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl CompletionGateway for MockGateway {
    fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let mut responses = self.responses.lock().unwrap();
        if self.fail_when_exhausted {
            return responses
                .pop_front()
                .ok_or_else(|| GatewayError::Connection("mock://gateway".to_string()));
        }

        let next = if responses.len() > 1 {
            responses.pop_front()
        } else {
            responses.front().cloned()
        };
        next.ok_or(GatewayError::EmptyResponse)
    }
}
