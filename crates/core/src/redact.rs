// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sensitive-data redaction shared by the logger and error formatters.
//!
//! Worker stderr, spawn environments and credential errors all pass through
//! here before any sink sees them. Redaction is pattern-based and
//! best-effort; it must never fail, so it works on plain string scanning
//! rather than a parser.

const REDACTED: &str = "[REDACTED]";

/// Env-style assignment keys whose values are always masked.
const SECRET_ENV_KEYS: &[&str] = &[
    "LLM_API_KEY",
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "AWS_SECRET_ACCESS_KEY",
    "MB_BRIDGE_TOKEN",
];

/// Maximum log-string length after redaction.
const LOG_TRUNCATE_BYTES: usize = 1024;
/// Maximum raw-capture length (stderr tails, diagnostics blobs).
const CAPTURE_TRUNCATE_BYTES: usize = 64 * 1024;

/// Mask credential material in `input`.
///
/// Patterns: `KEY=value` assignments for known secret keys (and any
/// `*_API_KEY`), `sk-` prefixed tokens, `Bearer <token>` pairs, and bare
/// hex tokens of 32+ chars.
pub fn redact(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_word_is_bearer = false;

    let mut rest = input;
    while !rest.is_empty() {
        // Copy leading separators verbatim.
        let word_start = rest.find(|c: char| !c.is_whitespace()).unwrap_or(rest.len());
        out.push_str(&rest[..word_start]);
        rest = &rest[word_start..];
        if rest.is_empty() {
            break;
        }

        let word_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let word = &rest[..word_end];
        rest = &rest[word_end..];

        if prev_word_is_bearer {
            out.push_str(REDACTED);
        } else {
            out.push_str(&mask_word(word));
        }
        prev_word_is_bearer = word.eq_ignore_ascii_case("bearer");
    }

    out
}

fn mask_word(word: &str) -> String {
    // KEY=value assignments
    if let Some(eq) = word.find('=') {
        let key = &word[..eq];
        if is_secret_key(key) {
            return format!("{key}={REDACTED}");
        }
    }

    // sk- API tokens
    if let Some(tail) = word.strip_prefix("sk-") {
        if tail.len() >= 8 && tail.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return format!("sk-{REDACTED}");
        }
    }

    // Long bare hex tokens
    if word.len() >= 32 && word.chars().all(|c| c.is_ascii_hexdigit()) {
        return REDACTED.to_string();
    }

    word.to_string()
}

fn is_secret_key(key: &str) -> bool {
    SECRET_ENV_KEYS.contains(&key) || key.ends_with("_API_KEY") || key.ends_with("_SECRET_KEY")
}

/// Redact, then bound to the 1 KB log-string budget.
pub fn truncate_for_log(input: &str) -> String {
    truncate_at(&redact(input), LOG_TRUNCATE_BYTES)
}

/// Redact, then bound to the raw-capture budget (stderr tails etc).
pub fn truncate_capture(input: &str) -> String {
    truncate_at(&redact(input), CAPTURE_TRUNCATE_BYTES)
}

fn truncate_at(s: &str, limit: usize) -> String {
    if s.len() <= limit {
        return s.to_string();
    }
    // Back off to a char boundary so we never split a code point.
    let mut cut = limit;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}… [truncated]", &s[..cut])
}

#[cfg(test)]
#[path = "redact_tests.rs"]
mod tests;
