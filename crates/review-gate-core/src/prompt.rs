//! Static review prompt configuration shared by every backend call.

pub const SYSTEM_PROMPT: &str =
    "You are a thorough senior code reviewer. Follow the response format exactly.";

pub const REVIEW_PROMPT_TEMPLATE: &str = r#"You are a senior code reviewer evaluating a set of code changes.
Be thorough and verbose in your analysis.

## Context
Automatic code review gate.

## Code Changes
```diff
{diff}
```

## Evaluation Criteria
Evaluate each area. For each, explain what you checked and whether it passes:

1. **Correctness**: Logic bugs, off-by-one, race conditions, incorrect assumptions?
2. **Security** (OWASP-informed — check ALL that apply):
   - **Injection**: SQL injection, NoSQL injection, OS command injection, LDAP injection, template injection (SSTI)
   - **XSS**: Unescaped user input in HTML/templates, dangerouslySetInnerHTML, innerHTML, unsanitized URL params
   - **Secrets**: Hardcoded API keys, tokens, passwords, connection strings. Check for anything that looks like sk-, AKIA, ghp_, Bearer, base64-encoded credentials
   - **Auth/Access**: Missing authentication checks, broken access control, IDOR, privilege escalation
   - **SSRF**: User-controlled URLs passed to HTTP clients without allowlist validation
   - **Path traversal**: User input in file paths without sanitization
   - **Insecure defaults**: HTTP instead of HTTPS, verify=False, rejectUnauthorized: false, overly permissive CORS, missing CSP headers
   - **Deserialization**: Unsafe pickle.loads, yaml.load without SafeLoader, JSON.parse of untrusted data
   - **Cryptography**: Weak algorithms (MD5, SHA1 for security), hardcoded IVs/salts, Math.random() for security purposes
3. **Best practices**: Modern, idiomatic code? Current library versions? Deprecated APIs?
4. **Error handling**: Missing try/catch? Unhandled null/undefined? Edge cases? Sensitive info leaked in error messages?
5. **Architecture**: Well-structured? Separation of concerns? Code smells?
6. **Performance**: N+1 queries, unnecessary loops, memory leaks, blocking ops?

## Response Format
You MUST respond with exactly this structure:

VERDICT: PASS or FAIL

ANALYSIS:
[1-3 sentences per criterion. Reference file:line where relevant.]

ISSUES:
- [Each blocking issue. Include file:line. Explain WHY and WHAT to do instead.]

NOTES:
- [Non-blocking observations and positive feedback.]

Only FAIL for real problems — not style preferences."#;

/// Substitute the diff into the review prompt template.
pub fn build_review_prompt(diff: &str) -> String {
    REVIEW_PROMPT_TEMPLATE.replace("{diff}", diff)
}
