//! Fan-out/join review aggregation.
//!
//! One task per configured backend, all started together, joined as a single
//! barrier: every outcome is always collected before the vote is tallied, so
//! token accounting and the reviewer listing are complete regardless of the
//! winning verdict.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::backend::{
    run_backend, BackendClient, BackendError, BackendOutcome, BackendSpec, TokenUsage,
    DEFAULT_CALL_TIMEOUT,
};
use crate::prompt::{build_review_prompt, SYSTEM_PROMPT};
use crate::verdict::Verdict;

/// Minimum non-skipped responses required before the vote is trusted.
/// Majority of the five reference backends.
pub const DEFAULT_QUORUM: usize = 3;

/// One configured backend together with its constructed client.
pub struct Reviewer {
    pub spec: BackendSpec,
    pub client: Arc<dyn BackendClient>,
}

/// Per-reviewer projection exposed in the aggregate result.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewerSummary {
    pub model: String,
    pub verdict: Verdict,
    pub issues: Vec<String>,
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<BackendOutcome> for ReviewerSummary {
    fn from(outcome: BackendOutcome) -> Self {
        Self {
            model: outcome.model,
            verdict: outcome.verdict,
            issues: outcome.issues,
            notes: outcome.notes,
            error: outcome.error,
        }
    }
}

/// Combined verdict over all configured backends, constructed once per
/// request and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub verdict: Verdict,
    pub vote_breakdown: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub reviewers: Vec<ReviewerSummary>,
    pub issues: Vec<String>,
    pub tokens_used: TokenUsage,
}

/// Fans a single prompt out to every configured backend and reduces the
/// outcomes under the quorum/majority rule.
pub struct Aggregator {
    reviewers: Vec<Reviewer>,
    quorum: usize,
    call_timeout: Duration,
}

impl Aggregator {
    pub fn new(reviewers: Vec<Reviewer>) -> Self {
        Self {
            reviewers,
            quorum: DEFAULT_QUORUM,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_quorum(mut self, quorum: usize) -> Self {
        self.quorum = quorum;
        self
    }

    pub fn with_call_timeout(mut self, ceiling: Duration) -> Self {
        self.call_timeout = ceiling;
        self
    }

    pub fn reviewer_count(&self) -> usize {
        self.reviewers.len()
    }

    /// Run one review round: dispatch, join all, reduce.
    #[instrument(name = "aggregate_review", skip(self, diff), fields(backends = self.reviewers.len(), diff_len = diff.len()))]
    pub async fn review(&self, diff: &str, caller: &str) -> AggregateResult {
        let prompt: Arc<str> = Arc::from(build_review_prompt(diff));
        let caller: Arc<str> = Arc::from(caller);

        let mut handles = Vec::with_capacity(self.reviewers.len());
        for reviewer in &self.reviewers {
            let spec = reviewer.spec.clone();
            let client = Arc::clone(&reviewer.client);
            let prompt = Arc::clone(&prompt);
            let caller = Arc::clone(&caller);
            let ceiling = self.call_timeout;
            handles.push(tokio::spawn(async move {
                run_backend(&spec, client.as_ref(), SYSTEM_PROMPT, &prompt, &caller, ceiling).await
            }));
        }

        // Join in configured order: the issue list and token totals must not
        // depend on which backend finishes first.
        let mut outcomes = Vec::with_capacity(handles.len());
        for (handle, reviewer) in handles.into_iter().zip(&self.reviewers) {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    warn!(backend = %reviewer.spec.name, error = %err, "backend task aborted");
                    outcomes.push(BackendOutcome::failure(
                        &reviewer.spec.name,
                        &BackendError::Aborted,
                    ));
                }
            }
        }

        let tally = tally_votes(&outcomes, self.quorum);
        let issues = dedup_issues(&outcomes);
        let tokens_used = sum_tokens(&outcomes);
        info!(
            verdict = %tally.verdict,
            breakdown = %tally.breakdown,
            issues = issues.len(),
            "review aggregated"
        );

        AggregateResult {
            verdict: tally.verdict,
            vote_breakdown: tally.breakdown,
            warning: tally.warning,
            reviewers: outcomes.into_iter().map(ReviewerSummary::from).collect(),
            issues,
            tokens_used,
        }
    }
}

struct VoteTally {
    verdict: Verdict,
    breakdown: String,
    warning: Option<String>,
}

/// Apply the quorum/majority rule. SKIP outcomes are excluded from both
/// sides of the vote but still count toward the reported total. Ties resolve
/// to FAIL.
fn tally_votes(outcomes: &[BackendOutcome], quorum: usize) -> VoteTally {
    let pass = outcomes.iter().filter(|o| o.verdict == Verdict::Pass).count();
    let fail = outcomes.iter().filter(|o| o.verdict == Verdict::Fail).count();
    let responded = pass + fail;
    let total = outcomes.len();
    let breakdown = format!("PASS:{pass} FAIL:{fail} (of {total} models)");

    if responded < quorum {
        VoteTally {
            verdict: Verdict::Fail,
            breakdown,
            warning: Some(format!(
                "Only {responded}/{total} models responded — defaulting to FAIL (quorum not reached)"
            )),
        }
    } else {
        let verdict = if pass > fail { Verdict::Pass } else { Verdict::Fail };
        VoteTally {
            verdict,
            breakdown,
            warning: None,
        }
    }
}

/// Deduplicate issues across outcomes in configured order. The key is the
/// trimmed, lowercased text; the first literal form seen is kept.
fn dedup_issues(outcomes: &[BackendOutcome]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut issues = Vec::new();
    for outcome in outcomes {
        for issue in &outcome.issues {
            let key = issue.trim().to_lowercase();
            if seen.insert(key) {
                issues.push(issue.clone());
            }
        }
    }
    issues
}

/// Sum token usage over all outcomes; error outcomes contribute zero.
fn sum_tokens(outcomes: &[BackendOutcome]) -> TokenUsage {
    let mut total = TokenUsage::default();
    for outcome in outcomes {
        total.accumulate(outcome.tokens);
    }
    total
}
