//! Embedded JSON extraction
//!
//! Recovers a single JSON value from model output that mixes prose, markdown
//! fences and serialized payloads. Every function here is pure: the same
//! input always yields the same output and nothing panics on malformed text.

#[cfg(test)]
mod proptests;

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static LEADING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^```(?:json)?\s*").expect("valid regex"));
static TRAILING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*```\s*$").expect("valid regex"));
static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));
static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|\n)\s*//[^\n]*").expect("valid regex"));
static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("valid regex"));

/// Extract the first JSON value embedded in `text`.
///
/// Order of attempts:
/// 1. the whole (unfenced) text parsed directly,
/// 2. the first balanced `{...}` / `[...]` span, scanned string-aware,
/// 3. that same span after [`normalize_json_text`].
///
/// Only one start index is ever tried. Returns `None` when nothing parses.
pub fn extract_json(text: &str) -> Option<Value> {
    let raw = text.trim();
    if raw.is_empty() {
        return None;
    }

    let unfenced = strip_fences(raw);

    if let Ok(value) = serde_json::from_str::<Value>(&unfenced) {
        return Some(value);
    }

    let candidate = balanced_span(&unfenced)?;
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => Some(value),
        Err(_) => serde_json::from_str::<Value>(&normalize_json_text(candidate)).ok(),
    }
}

/// Like [`extract_json`], but only accepts objects and arrays.
///
/// Free text such as a bare number or quoted string is not treated as a
/// structured payload.
pub fn extract_object_or_array(text: &str) -> Option<Value> {
    extract_json(text).filter(|v| v.is_object() || v.is_array())
}

/// Light cleanup for almost-JSON emitted by models.
///
/// Straightens smart quotes, removes trailing commas before a closing
/// delimiter, then drops `/* */` comments and whole-line `//` comments.
pub fn normalize_json_text(candidate: &str) -> String {
    let straightened: String = candidate
        .trim()
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect();

    // Commas go before comments, so a comma separated from its closer by a
    // comment survives.
    let without_commas = TRAILING_COMMA.replace_all(&straightened, "$1");
    let without_blocks = BLOCK_COMMENT.replace_all(&without_commas, "");
    let without_lines = LINE_COMMENT.replace_all(&without_blocks, "$1");

    without_lines.trim().to_string()
}

/// Remove one leading ```` ``` ```` / ```` ```json ```` fence and one trailing fence.
fn strip_fences(raw: &str) -> String {
    let leading = LEADING_FENCE.replace(raw, "");
    let trailing = TRAILING_FENCE.replace(&leading, "");
    trailing.trim().to_string()
}

/// Locate the first balanced object/array span.
///
/// Depth only counts the delimiter type that opened the span. Characters
/// inside string literals never affect depth; a backslash inside a string
/// escapes exactly the next character.
fn balanced_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let open = if text.as_bytes()[start] == b'{' { '{' } else { '[' };
    let close = if open == '{' { '}' } else { ']' };

    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text.get(start..)?.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        if ch == '"' {
            in_string = true;
        } else if ch == open {
            depth += 1;
        } else if ch == close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return text.get(start..=start + offset);
            }
        }
    }

    None
}
