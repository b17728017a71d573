use anyhow::{Context, Result};
use std::collections::HashMap;

/// Environment-driven configuration shared by the backend clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub converse_endpoint: Option<String>,
    pub converse_api_key: String,
    pub openrouter_endpoint: Option<String>,
    pub openrouter_api_key: String,
    pub timeout_secs: Option<u64>,
}

impl BackendSettings {
    const CONVERSE_ENDPOINT_ENV: &'static str = "REVIEW_GATE_CONVERSE_ENDPOINT";
    const CONVERSE_KEY_ENV: &'static str = "REVIEW_GATE_CONVERSE_API_KEY";
    const OPENROUTER_ENDPOINT_ENV: &'static str = "REVIEW_GATE_OPENROUTER_ENDPOINT";
    const OPENROUTER_KEY_ENV: &'static str = "REVIEW_GATE_OPENROUTER_API_KEY";
    const TIMEOUT_ENV: &'static str = "REVIEW_GATE_TIMEOUT_SECS";

    /// Load settings from environment variables.
    ///
    /// * `REVIEW_GATE_CONVERSE_API_KEY`   — bearer token for the converse family (required).
    /// * `REVIEW_GATE_OPENROUTER_API_KEY` — bearer token for the chat-completions family (required).
    /// * `REVIEW_GATE_CONVERSE_ENDPOINT` / `REVIEW_GATE_OPENROUTER_ENDPOINT` — optional base URL overrides.
    /// * `REVIEW_GATE_TIMEOUT_SECS`       — optional per-request HTTP timeout.
    pub fn from_env() -> Result<Self> {
        Self::from_map(std::env::vars().collect())
    }

    fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        let converse_api_key = vars
            .get(Self::CONVERSE_KEY_ENV)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .with_context(|| format!("environment variable {} must be set", Self::CONVERSE_KEY_ENV))?;
        let openrouter_api_key = vars
            .get(Self::OPENROUTER_KEY_ENV)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .with_context(|| {
                format!("environment variable {} must be set", Self::OPENROUTER_KEY_ENV)
            })?;
        let converse_endpoint = vars
            .get(Self::CONVERSE_ENDPOINT_ENV)
            .cloned()
            .filter(|v| !v.trim().is_empty());
        let openrouter_endpoint = vars
            .get(Self::OPENROUTER_ENDPOINT_ENV)
            .cloned()
            .filter(|v| !v.trim().is_empty());
        let timeout_secs = vars
            .get(Self::TIMEOUT_ENV)
            .and_then(|v| v.trim().parse::<u64>().ok());

        Ok(Self {
            converse_endpoint,
            converse_api_key,
            openrouter_endpoint,
            openrouter_api_key,
            timeout_secs,
        })
    }
}
