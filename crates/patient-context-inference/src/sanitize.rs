// crates/patient-context-inference/src/sanitize.rs
// ============================================================================
// Module: Response Sanitizer
// Description: Strip presentation wrapping from backend text output.
// Purpose: Guarantee syntactic JSON validity before structural use.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Local models frequently wrap JSON answers in fenced code blocks. The
//! sanitizer removes a leading ```` ```json ```` or ```` ``` ```` marker and a
//! trailing fence, then parses the remainder as JSON. Parsing is the only
//! guarantee: the resulting value is untyped and may not match any expected
//! shape.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

/// Maximum cleaned-text excerpt carried in a parse error.
const MAX_ERROR_EXCERPT_BYTES: usize = 2048;

// ============================================================================
// SECTION: Sanitizer
// ============================================================================

/// Strips fence markers from `raw` and parses the remainder as JSON.
///
/// Idempotent on already-clean input: sanitizing twice yields the same value
/// as sanitizing once.
///
/// # Errors
///
/// Returns [`SanitizeError`] when the cleaned text is not valid JSON.
pub fn sanitize_and_parse(raw: &str) -> Result<Value, SanitizeError> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(cleaned).map_err(|err| SanitizeError::Parse {
        detail: err.to_string(),
        cleaned: excerpt(cleaned),
    })
}

/// Removes surrounding code-fence markers and whitespace.
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let mut text = text.trim();
    if starts_with_ignore_ascii_case(text, "```json") {
        text = text[7..].trim();
    }
    if let Some(rest) = text.strip_prefix("```") {
        text = rest.trim();
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim();
    }
    text
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Sanitizer failures.
#[derive(Debug, Error)]
pub enum SanitizeError {
    /// Cleaned text failed to parse as JSON.
    #[error("json parse failed: {detail}")]
    Parse {
        /// Parser error message.
        detail: String,
        /// Excerpt of the cleaned text for the diagnostic trace.
        cleaned: String,
    },
}

impl SanitizeError {
    /// Returns the cleaned-text excerpt for trace emission.
    #[must_use]
    pub fn cleaned_excerpt(&self) -> &str {
        match self {
            Self::Parse {
                cleaned, ..
            } => cleaned,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// ASCII case-insensitive prefix check.
fn starts_with_ignore_ascii_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Truncates cleaned text to a bounded excerpt on a char boundary.
fn excerpt(text: &str) -> String {
    if text.len() <= MAX_ERROR_EXCERPT_BYTES {
        return text.to_string();
    }
    let mut end = MAX_ERROR_EXCERPT_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )]

    use serde_json::json;

    use super::sanitize_and_parse;
    use super::strip_code_fences;

    #[test]
    fn fenced_json_block_round_trips() {
        let fenced = "```json\n{\"a\":1}\n```";
        let bare = "{\"a\":1}";
        assert_eq!(sanitize_and_parse(fenced).unwrap(), sanitize_and_parse(bare).unwrap());
        assert_eq!(sanitize_and_parse(fenced).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn untagged_fence_is_stripped() {
        let fenced = "```\n{\"a\":1}\n```";
        assert_eq!(sanitize_and_parse(fenced).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn uppercase_json_tag_is_stripped() {
        let fenced = "```JSON\n{\"fact\":\"asthma\"}\n```";
        assert_eq!(sanitize_and_parse(fenced).unwrap(), json!({"fact": "asthma"}));
    }

    #[test]
    fn clean_input_is_idempotent() {
        let clean = "{\"relevant_background\":[],\"reasoning_for_relevancy\":\"none\"}";
        let once = strip_code_fences(clean);
        let twice = strip_code_fences(once);
        assert_eq!(once, twice);
        assert_eq!(sanitize_and_parse(once).unwrap(), sanitize_and_parse(clean).unwrap());
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let padded = "  \n```json\n{\"a\":true}\n```  \n";
        assert_eq!(sanitize_and_parse(padded).unwrap(), json!({"a": true}));
    }

    #[test]
    fn non_json_after_cleaning_is_an_error() {
        let err = sanitize_and_parse("```json\nnot json at all\n```").unwrap_err();
        assert!(err.to_string().contains("json parse failed"));
        assert_eq!(err.cleaned_excerpt(), "not json at all");
    }

    #[test]
    fn empty_fence_is_an_error() {
        assert!(sanitize_and_parse("```json\n```").is_err());
    }
}
