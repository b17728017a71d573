use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{BackendClient, BackendError, BackendReply, BackendSettings, BackendSpec};

const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1";
const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 4096;

/// Client for the chat-completions transport family (OpenRouter-style API).
///
/// This wire format has no request-metadata field, so the caller identity is
/// not forwarded by this family.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http: Client,
    url: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsClient {
    pub fn new(spec: &BackendSpec, settings: &BackendSettings) -> Result<Self> {
        if settings.openrouter_api_key.trim().is_empty() {
            bail!("OpenRouter API key must be provided via REVIEW_GATE_OPENROUTER_API_KEY");
        }
        let base = settings
            .openrouter_endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let url = format!("{}/chat/completions", base.trim_end_matches('/'));
        let http = Client::builder()
            .user_agent("review-gate/0.3")
            .timeout(Duration::from_secs(settings.timeout_secs.unwrap_or(120)))
            .build()
            .context("failed to build chat-completions HTTP client")?;
        Ok(Self {
            http,
            url,
            api_key: settings.openrouter_api_key.clone(),
            model: spec.model_id.clone(),
        })
    }
}

#[async_trait]
impl BackendClient for ChatCompletionsClient {
    async fn invoke(
        &self,
        system: &str,
        prompt: &str,
        _caller: &str,
    ) -> Result<BackendReply, BackendError> {
        let payload = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackendError::Api(response.status()));
        }

        let chat: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|_| BackendError::Decode("chat response body is not valid JSON"))?;
        let text = chat
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or(BackendError::Decode("chat response missing message content"))?;
        let usage = chat.usage.unwrap_or_default();

        Ok(BackendReply {
            text,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}
