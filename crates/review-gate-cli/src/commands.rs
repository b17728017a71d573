//! Subcommand implementations: submitting a review and administering keys.

use std::io::Read;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use tracing::debug;

use review_gate_core::{
    build_client, Aggregator, BackendSettings, FileKeyStore, KeyStore, Reviewer, ReviewPipeline,
    Verdict,
};

use crate::config::GateConfig;
use crate::render;

pub const API_KEY_ENV: &str = "REVIEW_GATE_API_KEY";

/// Submit a diff for review. Exit code 0 means PASS, 1 means FAIL (or that
/// the request could not be completed).
pub async fn review(
    config_path: Option<&Path>,
    keys_file: &Path,
    diff_file: Option<&Path>,
    api_key: Option<String>,
    json: bool,
) -> Result<ExitCode> {
    let api_key = api_key
        .or_else(|| std::env::var(API_KEY_ENV).ok())
        .filter(|key| !key.trim().is_empty())
        .with_context(|| format!("an API key is required (--api-key or {API_KEY_ENV})"))?;

    let store = FileKeyStore::new(keys_file);
    let Some(developer) = store.authenticate(&api_key).await? else {
        bail!("invalid or disabled API key");
    };
    debug!(developer, "authenticated");

    let diff = read_diff(diff_file)?;

    let gate = GateConfig::load(config_path)?;
    let settings = BackendSettings::from_env()?;
    let mut reviewers = Vec::with_capacity(gate.backends.len());
    for spec in &gate.backends {
        let client = build_client(spec, &settings)
            .with_context(|| format!("failed to build client for {}", spec.name))?;
        reviewers.push(Reviewer {
            spec: spec.clone(),
            client,
        });
    }

    let aggregator = Aggregator::new(reviewers).with_quorum(gate.quorum);
    let pipeline = ReviewPipeline::new(aggregator).with_max_diff_chars(gate.max_diff_chars);
    let response = pipeline.review(&diff, &developer).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print!("{}", render::render_response(&response));
    }

    Ok(if response.result.verdict == Verdict::Pass {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn read_diff(diff_file: Option<&Path>) -> Result<String> {
    match diff_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read diff from {}", path.display())),
        None => {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .context("failed to read diff from stdin")?;
            Ok(body)
        }
    }
}

pub async fn keys_create(keys_file: &Path, developer: &str) -> Result<()> {
    let record = FileKeyStore::new(keys_file).create(developer).await?;
    println!("Created API key for {}:", record.developer_name.bold());
    println!("  {}", record.api_key);
    Ok(())
}

pub async fn keys_list(keys_file: &Path) -> Result<()> {
    let records = FileKeyStore::new(keys_file).list().await?;
    if records.is_empty() {
        println!("No keys issued.");
        return Ok(());
    }
    println!(
        "{:<38} {:<16} {:<21} {:<8} {}",
        "KEY".bold(),
        "DEVELOPER".bold(),
        "CREATED".bold(),
        "ENABLED".bold(),
        "USES".bold()
    );
    for record in records {
        let enabled = if record.enabled { "yes" } else { "no" };
        println!(
            "{:<38} {:<16} {:<21} {:<8} {}",
            record.api_key, record.developer_name, record.created_at, enabled, record.usage_count
        );
    }
    Ok(())
}

pub async fn keys_set_enabled(keys_file: &Path, api_key: &str, enabled: bool) -> Result<()> {
    let known = FileKeyStore::new(keys_file)
        .set_enabled(api_key, enabled)
        .await?;
    if !known {
        bail!("unknown API key: {api_key}");
    }
    let state = if enabled { "enabled" } else { "disabled" };
    println!("Key {state}.");
    Ok(())
}

pub async fn keys_usage(keys_file: &Path) -> Result<()> {
    let records = FileKeyStore::new(keys_file).list().await?;
    if records.is_empty() {
        println!("No keys issued.");
        return Ok(());
    }
    let mut totals: Vec<(String, u64)> = Vec::new();
    for record in records {
        match totals.iter_mut().find(|(name, _)| *name == record.developer_name) {
            Some((_, count)) => *count += record.usage_count,
            None => totals.push((record.developer_name, record.usage_count)),
        }
    }
    totals.sort_by(|a, b| b.1.cmp(&a.1));
    println!("{:<16} {}", "DEVELOPER".bold(), "REVIEWS".bold());
    let mut grand_total = 0;
    for (developer, count) in totals {
        println!("{developer:<16} {count}");
        grand_total += count;
    }
    println!("{:<16} {grand_total}", "TOTAL".bold());
    Ok(())
}
