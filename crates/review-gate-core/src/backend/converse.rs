use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{BackendClient, BackendError, BackendReply, BackendSettings, BackendSpec};

const DEFAULT_ENDPOINT: &str = "https://bedrock-runtime.eu-west-2.amazonaws.com";
const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 4096;

/// Client for the Converse transport family (Bedrock-runtime REST shape).
///
/// Carries the caller identity in `requestMetadata` for cost attribution.
#[derive(Debug, Clone)]
pub struct ConverseClient {
    http: Client,
    url: String,
    api_key: String,
}

impl ConverseClient {
    pub fn new(spec: &BackendSpec, settings: &BackendSettings) -> Result<Self> {
        if settings.converse_api_key.trim().is_empty() {
            bail!("Converse API key must be provided via REVIEW_GATE_CONVERSE_API_KEY");
        }
        let base = settings
            .converse_endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let url = format!(
            "{}/model/{}/converse",
            base.trim_end_matches('/'),
            spec.model_id
        );
        let http = Client::builder()
            .user_agent("review-gate/0.3")
            .timeout(Duration::from_secs(settings.timeout_secs.unwrap_or(120)))
            .build()
            .context("failed to build Converse HTTP client")?;
        Ok(Self {
            http,
            url,
            api_key: settings.converse_api_key.clone(),
        })
    }
}

#[async_trait]
impl BackendClient for ConverseClient {
    async fn invoke(
        &self,
        system: &str,
        prompt: &str,
        caller: &str,
    ) -> Result<BackendReply, BackendError> {
        let payload = ConverseRequest {
            messages: vec![ConverseMessage {
                role: "user",
                content: vec![ContentBlock {
                    text: prompt.to_string(),
                }],
            }],
            system: vec![ContentBlock {
                text: system.to_string(),
            }],
            inference_config: InferenceConfig {
                temperature: TEMPERATURE,
                max_tokens: MAX_TOKENS,
            },
            request_metadata: RequestMetadata {
                developer: caller.to_string(),
                service: "code-review",
            },
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

        let body: ConverseResponse = response
            .json()
            .await
            .map_err(|_| BackendError::Decode("converse response body is not valid JSON"))?;
        let text = body
            .output
            .message
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or(BackendError::Decode("converse response missing message text"))?;
        let usage = body.usage.unwrap_or_default();

        Ok(BackendReply {
            text,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConverseRequest {
    messages: Vec<ConverseMessage>,
    system: Vec<ContentBlock>,
    inference_config: InferenceConfig,
    request_metadata: RequestMetadata,
}

#[derive(Serialize)]
struct ConverseMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Serialize)]
struct ContentBlock {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InferenceConfig {
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct RequestMetadata {
    developer: String,
    service: &'static str,
}

#[derive(Deserialize)]
struct ConverseResponse {
    output: ConverseOutput,
    #[serde(default)]
    usage: Option<ConverseUsage>,
}

#[derive(Deserialize)]
struct ConverseOutput {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConverseUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}
