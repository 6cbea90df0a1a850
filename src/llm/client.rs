//! Chat-completions client shared by the answer generator and the judge.
//!
//! Speaks the OpenAI `/v1/chat/completions` protocol, so any compatible
//! server (OpenAI, vLLM, Ollama, LiteLLM) works.

use crate::config::LlmConfig;
use crate::error::{EvalError, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

impl<'a> CompletionRequest<'a> {
    fn new(config: &'a LlmConfig, system: Option<&'a str>, user: &'a str) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(content) = system {
            messages.push(ChatMessage {
                role: "system",
                content,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user,
        });

        Self {
            model: &config.model,
            messages,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Client for one configured model.
#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    config: LlmConfig,
    endpoint: String,
}

impl LlmClient {
    /// Build a client whose requests give up after `config.timeout_secs`.
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EvalError::Config(format!("Failed to create HTTP client: {e}")))?;
        let endpoint = format!(
            "{}/v1/chat/completions",
            config.api_base.trim_end_matches('/')
        );

        Ok(Self {
            http,
            config,
            endpoint,
        })
    }

    /// Model this client talks to.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send an optional system prompt and one user message, returning the
    /// text of the first choice.
    pub async fn complete(&self, system: Option<&str>, user: &str) -> Result<String> {
        let request = CompletionRequest::new(&self.config, system, user);
        debug!(
            model = %self.config.model,
            messages = request.messages.len(),
            "Sending chat completion"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        parse_completion(status, &body)
    }

    /// Check that the endpoint answers a trivial prompt.
    pub async fn test_connection(&self) -> Result<()> {
        let reply = self
            .complete(None, "Say 'hello' and nothing else.")
            .await?;

        if reply.to_lowercase().contains("hello") {
            Ok(())
        } else {
            Err(EvalError::LlmApi(format!("Unexpected response: {reply}")))
        }
    }
}

fn parse_completion(status: StatusCode, body: &str) -> Result<String> {
    if !status.is_success() {
        warn!(%status, "Chat completion failed");
        let detail = serde_json::from_str::<ErrorBody>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());
        return Err(EvalError::LlmApi(format!("Request failed ({status}): {detail}")));
    }

    let completion: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| EvalError::LlmParse(format!("Invalid completion body: {e}")))?;

    if let Some(usage) = &completion.usage {
        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Chat completion finished"
        );
    }

    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| EvalError::LlmParse("Completion has no message content".to_string()))
}
