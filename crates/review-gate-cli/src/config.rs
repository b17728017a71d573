//! Deployment configuration: the fixed backend fan-out list plus gate
//! parameters, layered from built-in defaults and an optional TOML file.

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, File, FileFormat};
use serde::Deserialize;

use review_gate_core::{BackendFamily, BackendSpec, DEFAULT_MAX_DIFF_CHARS};

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub max_diff_chars: usize,
    pub quorum: usize,
    pub backends: Vec<BackendSpec>,
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    max_diff_chars: Option<usize>,
    quorum: Option<usize>,
    backends: Option<Vec<BackendSpec>>,
}

impl GateConfig {
    /// Load the deployment config. Without a file, the five reference
    /// backends apply with a quorum of three.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                File::from(path.to_path_buf())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }
        let raw: RawConfig = builder
            .build()
            .and_then(Config::try_deserialize)
            .with_context(|| match path {
                Some(path) => format!("failed to load gate config from {}", path.display()),
                None => "failed to load default gate config".to_string(),
            })?;

        let backends = raw.backends.unwrap_or_else(default_backends);
        let quorum = raw.quorum.unwrap_or_else(|| majority(backends.len()));
        Ok(Self {
            max_diff_chars: raw.max_diff_chars.unwrap_or(DEFAULT_MAX_DIFF_CHARS),
            quorum,
            backends,
        })
    }
}

/// Strict majority of the configured backend count.
fn majority(count: usize) -> usize {
    count / 2 + 1
}

/// The five reference reviewers.
fn default_backends() -> Vec<BackendSpec> {
    vec![
        BackendSpec::new("Qwen3 Coder Next", "qwen.qwen3-coder-next", BackendFamily::Converse),
        BackendSpec::new("DeepSeek V3.2", "deepseek.v3.2", BackendFamily::Converse),
        BackendSpec::new("Kimi K2.5", "moonshotai.kimi-k2.5", BackendFamily::Converse),
        BackendSpec::new("Devstral 2 123B", "mistral.devstral-2-123b", BackendFamily::Converse),
        BackendSpec::new(
            "Gemini 3.1 Pro",
            "google/gemini-3.1-pro-preview",
            BackendFamily::ChatCompletions,
        ),
    ]
}
