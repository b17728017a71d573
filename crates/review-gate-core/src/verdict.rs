use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Per-backend or aggregate classification of a review.
///
/// `Skip` is only ever produced for backends whose call failed; it never
/// appears as an aggregate verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
    Skip,
}

impl Verdict {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Skip => "SKIP",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

static VERDICT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)VERDICT:\s*(PASS|FAIL)").expect("verdict pattern is valid")
});

/// Extract the `VERDICT: PASS|FAIL` marker from a model response.
///
/// First match wins. Missing or malformed markers resolve to `Fail`: a
/// backend whose output cannot be confidently read as PASS is a failing
/// vote, never a silently ignored one.
pub fn parse_verdict(text: &str) -> Verdict {
    match VERDICT_RE.captures(text) {
        Some(caps) if caps[1].eq_ignore_ascii_case("PASS") => Verdict::Pass,
        Some(_) => Verdict::Fail,
        None => Verdict::Fail,
    }
}

/// Collect the `- ` bullet lines of a named section.
///
/// A section starts at a `<NAME>:` line and runs until the next all-caps
/// `<WORD>:` header line or the end of the text. Anything outside recognized
/// sections is tolerated; absent or malformed sections yield an empty list.
pub fn parse_section(text: &str, section_name: &str) -> Vec<String> {
    let pattern = format!(
        r"(?is)(?:^|\n){}:\s*\n(.*?)(?:\n[A-Z]+:\s*\n|\z)",
        regex::escape(section_name)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };
    let Some(caps) = re.captures(text) else {
        return Vec::new();
    };
    caps[1]
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            line.strip_prefix("- ").map(|item| item.trim().to_string())
        })
        .collect()
}
