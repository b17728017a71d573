//! Pipeline entry: input validation, truncation, and result shaping.
//!
//! This is the composition root's front door. Authentication happens outside;
//! the pipeline receives an already-resolved caller identity. Once input
//! validation passes, the contract never returns a hard error — the worst
//! outcome is a well-formed FAIL with a warning.

use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use crate::aggregate::{AggregateResult, Aggregator};

/// Subject-text ceiling in characters. Oversized input is truncated with an
/// explicit omission marker, never rejected.
pub const DEFAULT_MAX_DIFF_CHARS: usize = 50_000;

/// Input-validation failures — the only hard errors the pipeline surfaces.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("no diff provided")]
    EmptyDiff,
}

/// Aggregate result with the caller identity attached.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewResponse {
    pub developer: String,
    #[serde(flatten)]
    pub result: AggregateResult,
}

pub struct ReviewPipeline {
    aggregator: Aggregator,
    max_diff_chars: usize,
}

impl ReviewPipeline {
    pub fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator,
            max_diff_chars: DEFAULT_MAX_DIFF_CHARS,
        }
    }

    pub fn with_max_diff_chars(mut self, ceiling: usize) -> Self {
        self.max_diff_chars = ceiling;
        self
    }

    /// Validate and normalize the request body, then run the review round.
    #[instrument(name = "review_request", skip(self, body), fields(body_len = body.len(), developer))]
    pub async fn review(&self, body: &str, developer: &str) -> Result<ReviewResponse, RequestError> {
        let started = Instant::now();
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Err(RequestError::EmptyDiff);
        }

        let diff = truncate_diff(trimmed, self.max_diff_chars);
        let result = self.aggregator.review(&diff, developer).await;

        info!(
            developer,
            verdict = %result.verdict,
            breakdown = %result.vote_breakdown,
            input_tokens = result.tokens_used.input,
            output_tokens = result.tokens_used.output,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "review complete"
        );

        Ok(ReviewResponse {
            developer: developer.to_string(),
            result,
        })
    }
}

/// Truncate to the character ceiling, appending a marker that states the
/// exact number of omitted characters.
fn truncate_diff(diff: &str, ceiling: usize) -> String {
    let total = diff.chars().count();
    if total <= ceiling {
        return diff.to_string();
    }
    let omitted = total - ceiling;
    let mut kept: String = diff.chars().take(ceiling).collect();
    kept.push_str(&format!("\n\n... (truncated, {omitted} chars omitted)"));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Reviewer;
    use crate::backend::{
        BackendClient, BackendError, BackendFamily, BackendReply, BackendSpec,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingBackend {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BackendClient for CountingBackend {
        async fn invoke(
            &self,
            _system: &str,
            prompt: &str,
            _caller: &str,
        ) -> Result<BackendReply, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Echo part of the prompt so tests can observe truncation.
            Ok(BackendReply {
                text: format!("VERDICT: PASS\n\nNOTES:\n- saw {} chars\n", prompt.len()),
                input_tokens: 1,
                output_tokens: 1,
            })
        }
    }

    fn pipeline_with_counter(calls: Arc<AtomicUsize>) -> ReviewPipeline {
        let reviewers = (0..3)
            .map(|i| Reviewer {
                spec: BackendSpec::new(
                    format!("backend-{i}"),
                    "test.model",
                    BackendFamily::Converse,
                ),
                client: Arc::new(CountingBackend {
                    calls: Arc::clone(&calls),
                }),
            })
            .collect();
        ReviewPipeline::new(Aggregator::new(reviewers))
    }

    #[tokio::test]
    async fn empty_body_is_rejected_before_any_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = pipeline_with_counter(Arc::clone(&calls));

        let err = pipeline.review("", "alice").await.unwrap_err();
        assert_eq!(err, RequestError::EmptyDiff);
        let err = pipeline.review("   \n\t  ", "alice").await.unwrap_err();
        assert_eq!(err, RequestError::EmptyDiff);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversized_body_is_truncated_not_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = pipeline_with_counter(Arc::clone(&calls)).with_max_diff_chars(10);

        let response = pipeline.review(&"x".repeat(25), "alice").await.unwrap();
        assert_eq!(response.result.reviewers.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn response_attaches_the_caller_identity() {
        let pipeline = pipeline_with_counter(Arc::new(AtomicUsize::new(0)));
        let response = pipeline.review("+fn main() {}", "alice").await.unwrap();
        assert_eq!(response.developer, "alice");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["developer"], "alice");
        // Flattened aggregate fields sit at the top level.
        assert!(value["vote_breakdown"].is_string());
        assert!(value["reviewers"].is_array());
    }

    #[test]
    fn truncation_marker_states_the_exact_omission() {
        let out = truncate_diff(&"a".repeat(120), 100);
        assert!(out.ends_with("... (truncated, 20 chars omitted)"));
        assert_eq!(out.chars().take(100).collect::<String>(), "a".repeat(100));
    }

    #[test]
    fn short_input_is_left_untouched() {
        assert_eq!(truncate_diff("short", 100), "short");
        assert_eq!(truncate_diff("exact", 5), "exact");
    }

    #[test]
    fn truncation_is_char_based_not_byte_based() {
        let input = "é".repeat(12);
        let out = truncate_diff(&input, 10);
        assert!(out.starts_with(&"é".repeat(10)));
        assert!(out.contains("2 chars omitted"));
    }
}
