//! Reviewer backend abstraction.
//!
//! One [`BackendClient`] variant exists per transport family; everything a
//! family knows about its wire format stays inside its own module. The rest
//! of the pipeline only sees normalized [`BackendOutcome`] values.

mod chat;
mod converse;
mod settings;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::verdict::{parse_section, parse_verdict, Verdict};

pub use chat::ChatCompletionsClient;
pub use converse::ConverseClient;
pub use settings::BackendSettings;

/// Ceiling for a single backend call, independent of the HTTP client timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Transport family a backend belongs to. Closed set: new families are new
/// variants with their own client module, never widened call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendFamily {
    Converse,
    ChatCompletions,
}

/// Static configuration entry for one reviewer backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSpec {
    pub name: String,
    pub model_id: String,
    pub family: BackendFamily,
}

impl BackendSpec {
    pub fn new(name: impl Into<String>, model_id: impl Into<String>, family: BackendFamily) -> Self {
        Self {
            name: name.into(),
            model_id: model_id.into(),
            family,
        }
    }
}

/// Raw result of a successful backend call: response text plus usage counts.
#[derive(Debug, Clone)]
pub struct BackendReply {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Failure of a single backend call.
///
/// Only [`BackendError::category`] ever reaches a caller-visible outcome;
/// raw transport detail stays in the logs.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request could not be completed")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned status {0}")]
    Api(reqwest::StatusCode),
    #[error("backend response could not be decoded: {0}")]
    Decode(&'static str),
    #[error("call exceeded the {0:?} ceiling")]
    Timeout(Duration),
    #[error("backend task aborted before completion")]
    Aborted,
}

impl BackendError {
    /// Generic failure category, safe to surface to callers.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport error",
            Self::Api(_) => "api error",
            Self::Decode(_) => "malformed response",
            Self::Timeout(_) => "timeout",
            Self::Aborted => "task failure",
        }
    }
}

/// Capability shared by every backend family: accept a prompt and system
/// instruction, return text plus usage, or fail.
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn invoke(
        &self,
        system: &str,
        prompt: &str,
        caller: &str,
    ) -> Result<BackendReply, BackendError>;
}

/// Construct the client for a spec's transport family.
pub fn build_client(spec: &BackendSpec, settings: &BackendSettings) -> Result<Arc<dyn BackendClient>> {
    match spec.family {
        BackendFamily::Converse => Ok(Arc::new(ConverseClient::new(spec, settings)?)),
        BackendFamily::ChatCompletions => Ok(Arc::new(ChatCompletionsClient::new(spec, settings)?)),
    }
}

/// Input/output token counts for one or many backend calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

impl TokenUsage {
    pub fn accumulate(&mut self, other: TokenUsage) {
        self.input += other.input;
        self.output += other.output;
    }
}

/// Call status of one backend invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Ok,
    Error,
}

/// Normalized record of one backend call, immutable once constructed.
#[derive(Debug, Clone, Serialize)]
pub struct BackendOutcome {
    pub model: String,
    pub status: CallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub verdict: Verdict,
    pub issues: Vec<String>,
    pub notes: Vec<String>,
    pub tokens: TokenUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BackendOutcome {
    /// Build a successful outcome by parsing the backend's response text.
    pub fn from_reply(model: &str, reply: BackendReply) -> Self {
        let verdict = parse_verdict(&reply.text);
        let issues = parse_section(&reply.text, "ISSUES");
        let notes = parse_section(&reply.text, "NOTES");
        Self {
            model: model.to_string(),
            status: CallStatus::Ok,
            verdict,
            issues,
            notes,
            tokens: TokenUsage {
                input: reply.input_tokens,
                output: reply.output_tokens,
            },
            text: Some(reply.text),
            error: None,
        }
    }

    /// Build an error outcome: `SKIP` vote, zero tokens, generic description.
    pub fn failure(model: &str, err: &BackendError) -> Self {
        Self {
            model: model.to_string(),
            status: CallStatus::Error,
            text: None,
            verdict: Verdict::Skip,
            issues: Vec::new(),
            notes: Vec::new(),
            tokens: TokenUsage::default(),
            error: Some(format!("Model call failed ({})", err.category())),
        }
    }
}

/// Invoke one backend under a per-call timeout and normalize the result.
///
/// Every failure mode (transport, auth, decode, timeout) is absorbed into an
/// error outcome here; nothing propagates as a hard error.
pub async fn run_backend(
    spec: &BackendSpec,
    client: &dyn BackendClient,
    system: &str,
    prompt: &str,
    caller: &str,
    ceiling: Duration,
) -> BackendOutcome {
    match tokio::time::timeout(ceiling, client.invoke(system, prompt, caller)).await {
        Ok(Ok(reply)) => {
            debug!(
                backend = %spec.name,
                input_tokens = reply.input_tokens,
                output_tokens = reply.output_tokens,
                "backend call completed"
            );
            BackendOutcome::from_reply(&spec.name, reply)
        }
        Ok(Err(err)) => {
            warn!(backend = %spec.name, error = %err, "backend call failed");
            BackendOutcome::failure(&spec.name, &err)
        }
        Err(_) => {
            let err = BackendError::Timeout(ceiling);
            warn!(backend = %spec.name, error = %err, "backend call timed out");
            BackendOutcome::failure(&spec.name, &err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_outcome_is_parsed_and_ok() {
        let reply = BackendReply {
            text: "VERDICT: PASS\n\nISSUES:\n\nNOTES:\n- clean change\n".into(),
            input_tokens: 120,
            output_tokens: 40,
        };
        let outcome = BackendOutcome::from_reply("Qwen3 Coder Next", reply);
        assert_eq!(outcome.status, CallStatus::Ok);
        assert_eq!(outcome.verdict, Verdict::Pass);
        assert!(outcome.issues.is_empty());
        assert_eq!(outcome.notes, vec!["clean change".to_string()]);
        assert_eq!(outcome.tokens, TokenUsage { input: 120, output: 40 });
        assert!(outcome.error.is_none());
    }

    #[test]
    fn unparseable_reply_fails_closed_but_stays_ok() {
        let reply = BackendReply {
            text: "I forgot the format, sorry".into(),
            input_tokens: 0,
            output_tokens: 0,
        };
        let outcome = BackendOutcome::from_reply("DeepSeek V3.2", reply);
        assert_eq!(outcome.status, CallStatus::Ok);
        assert_eq!(outcome.verdict, Verdict::Fail);
    }

    #[test]
    fn failure_outcome_skips_with_generic_description() {
        let err = BackendError::Timeout(Duration::from_secs(120));
        let outcome = BackendOutcome::failure("Kimi K2.5", &err);
        assert_eq!(outcome.status, CallStatus::Error);
        assert_eq!(outcome.verdict, Verdict::Skip);
        assert_eq!(outcome.tokens, TokenUsage::default());
        assert_eq!(outcome.error.as_deref(), Some("Model call failed (timeout)"));
    }

    #[test]
    fn failure_description_never_carries_transport_detail() {
        let err = BackendError::Decode("converse response missing message text");
        let outcome = BackendOutcome::failure("Devstral 2 123B", &err);
        let description = outcome.error.unwrap();
        assert_eq!(description, "Model call failed (malformed response)");
        assert!(!description.contains("converse"));
    }

    struct SlowClient;

    #[async_trait]
    impl BackendClient for SlowClient {
        async fn invoke(
            &self,
            _system: &str,
            _prompt: &str,
            _caller: &str,
        ) -> Result<BackendReply, BackendError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!("call should have timed out first");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn run_backend_enforces_the_ceiling() {
        let spec = BackendSpec::new("Slow", "slow.model", BackendFamily::Converse);
        let outcome = run_backend(
            &spec,
            &SlowClient,
            "system",
            "prompt",
            "dev",
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(outcome.status, CallStatus::Error);
        assert_eq!(outcome.verdict, Verdict::Skip);
        assert_eq!(outcome.error.as_deref(), Some("Model call failed (timeout)"));
    }
}
