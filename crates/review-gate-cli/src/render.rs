//! Terminal rendering of a review response.

use colored::Colorize;

use review_gate_core::{ReviewResponse, ReviewerSummary, Verdict};

/// Render the full human-readable report.
pub fn render_response(response: &ReviewResponse) -> String {
    let result = &response.result;
    let mut out = String::new();

    out.push('\n');
    out.push_str(&banner(result.verdict));
    out.push('\n');
    out.push_str(&format!("Vote: {}\n", result.vote_breakdown));
    if let Some(warning) = &result.warning {
        out.push_str(&format!("{} {}\n", "Warning:".yellow().bold(), warning));
    }

    out.push_str(&format!("\n{}\n", "Per-model verdicts:".bold()));
    for reviewer in &result.reviewers {
        out.push_str(&render_reviewer(reviewer));
    }

    if !result.issues.is_empty() {
        out.push_str(&format!(
            "\n{}\n",
            format!("Issues ({}):", result.issues.len()).bold()
        ));
        for issue in &result.issues {
            out.push_str(&format!("  {} {}\n", "•".red(), issue));
        }
    }

    let notes: Vec<(&str, &str)> = result
        .reviewers
        .iter()
        .flat_map(|r| r.notes.iter().map(move |n| (r.model.as_str(), n.as_str())))
        .collect();
    if !notes.is_empty() {
        out.push_str(&format!("\n{}\n", "Notes:".bold()));
        for (model, note) in notes {
            out.push_str(&format!("  [{}] {}\n", model.dimmed(), note));
        }
    }

    out.push_str(&format!(
        "\nTokens: {} in / {} out\n",
        result.tokens_used.input, result.tokens_used.output
    ));
    out
}

fn banner(verdict: Verdict) -> String {
    let label = match verdict {
        Verdict::Pass => "  PASS  ".green().bold(),
        Verdict::Fail => "  FAIL  ".red().bold(),
        Verdict::Skip => "  SKIP  ".yellow().bold(),
    };
    format!("{}\n{}{}{}\n{}\n", "========".bold(), "|".bold(), label, "|".bold(), "========".bold())
}

fn render_reviewer(reviewer: &ReviewerSummary) -> String {
    let verdict = match reviewer.verdict {
        Verdict::Pass => "PASS".green(),
        Verdict::Fail => "FAIL".red(),
        Verdict::Skip => "SKIP".yellow(),
    };
    let mut line = format!("  {:<20} {}\n", reviewer.model, verdict);
    if let Some(error) = &reviewer.error {
        line.push_str(&format!("    {}\n", error.dimmed()));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_gate_core::{AggregateResult, TokenUsage};

    fn summary(model: &str, verdict: Verdict, error: Option<&str>) -> ReviewerSummary {
        ReviewerSummary {
            model: model.to_string(),
            verdict,
            issues: vec![],
            notes: vec![],
            error: error.map(str::to_string),
        }
    }

    fn response() -> ReviewResponse {
        ReviewResponse {
            developer: "alice".to_string(),
            result: AggregateResult {
                verdict: Verdict::Fail,
                vote_breakdown: "PASS:1 FAIL:1 (of 3 models)".to_string(),
                warning: Some(
                    "Only 2/3 models responded — defaulting to FAIL (quorum not reached)"
                        .to_string(),
                ),
                reviewers: vec![
                    summary("Alpha", Verdict::Pass, None),
                    summary("Beta", Verdict::Fail, None),
                    summary("Gamma", Verdict::Skip, Some("Model call failed (timeout)")),
                ],
                issues: vec!["missing error handling".to_string()],
                tokens_used: TokenUsage {
                    input: 200,
                    output: 40,
                },
            },
        }
    }

    #[test]
    fn report_carries_every_section() {
        colored::control::set_override(false);
        let out = render_response(&response());
        assert!(out.contains("FAIL"));
        assert!(out.contains("Vote: PASS:1 FAIL:1 (of 3 models)"));
        assert!(out.contains("Only 2/3 models responded"));
        assert!(out.contains("Gamma"));
        assert!(out.contains("Model call failed (timeout)"));
        assert!(out.contains("Issues (1):"));
        assert!(out.contains("missing error handling"));
        assert!(out.contains("Tokens: 200 in / 40 out"));
    }

    #[test]
    fn empty_issue_list_is_omitted() {
        colored::control::set_override(false);
        let mut response = response();
        response.result.issues.clear();
        let out = render_response(&response);
        assert!(!out.contains("Issues"));
    }
}
