//! Property-based tests for embedded JSON extraction
//!
//! Invariants:
//! - Extraction is deterministic (idempotent on identical input)
//! - Any object/array embedded in prose or fences is recovered intact
//! - Arbitrary text never causes a panic

use super::{extract_json, normalize_json_text};
use proptest::prelude::*;
use serde_json::Value;

// ============================================================================
// Strategies
// ============================================================================

/// Strings that stress the scanner: quotes, braces, brackets and backslashes
fn arb_tricky_string() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 {}\\[\\]\"\\\\:,]{0,20}"
}

fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-10_000i64..10_000).prop_map(|n| Value::Number(n.into())),
        arb_tricky_string().prop_map(Value::String),
    ]
}

/// Nested JSON values of bounded depth
fn arb_json() -> impl Strategy<Value = Value> {
    arb_leaf().prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..5).prop_map(Value::Array),
            proptest::collection::btree_map("[a-z_]{1,8}", inner, 0..5)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Top-level containers only: scalars cannot be located inside prose
fn arb_container() -> impl Strategy<Value = Value> {
    prop_oneof![
        proptest::collection::vec(arb_json(), 0..4).prop_map(Value::Array),
        proptest::collection::btree_map("[a-z_]{1,8}", arb_json(), 0..4)
            .prop_map(|m| Value::Object(m.into_iter().collect())),
    ]
}

/// Prose without any JSON delimiters
fn arb_prose() -> impl Strategy<Value = String> {
    "[a-zA-Z :,.!]{0,40}"
}

#[derive(Debug, Clone, Copy)]
enum Embedding {
    Bare,
    Prose,
    Fenced,
    FencedAfterProse,
    Pretty,
}

fn arb_embedding() -> impl Strategy<Value = Embedding> {
    prop_oneof![
        Just(Embedding::Bare),
        Just(Embedding::Prose),
        Just(Embedding::Fenced),
        Just(Embedding::FencedAfterProse),
        Just(Embedding::Pretty),
    ]
}

fn embed(value: &Value, how: Embedding, before: &str, after: &str) -> String {
    let compact = serde_json::to_string(value).unwrap();
    match how {
        Embedding::Bare => compact,
        Embedding::Prose => format!("{before} {compact} {after}"),
        Embedding::Fenced => format!("```json\n{compact}\n```"),
        Embedding::FencedAfterProse => format!("{before}```json\n{compact}\n```"),
        Embedding::Pretty => {
            let pretty = serde_json::to_string_pretty(value).unwrap();
            format!("{before}\n{pretty}\n{after}")
        }
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {

    /// Embedded values come back unchanged
    #[test]
    fn prop_extract_recovers_embedded_value(
        value in arb_container(),
        how in arb_embedding(),
        before in arb_prose(),
        after in arb_prose(),
    ) {
        let text = embed(&value, how, &before, &after);
        prop_assert_eq!(extract_json(&text), Some(value));
    }

    /// Same input, same output
    #[test]
    fn prop_extract_is_idempotent(text in ".{0,200}") {
        prop_assert_eq!(extract_json(&text), extract_json(&text));
    }

    /// Arbitrary text with JSON-ish characters never panics
    #[test]
    fn prop_extract_never_panics(text in "[\\{\\}\\[\\]\"\\\\a-z0-9 ,:/*\u{201C}\u{201D}`\n]{0,200}") {
        let _ = extract_json(&text);
    }

    /// Normalization leaves already-valid compact JSON parseable to the same value
    /// when no string contains comment or comma-before-closer patterns
    #[test]
    fn prop_normalize_preserves_simple_json(
        m in proptest::collection::btree_map("[a-z]{1,6}", "[a-zA-Z0-9 ]{0,12}", 0..6)
    ) {
        let value = Value::Object(
            m.into_iter().map(|(k, v)| (k, Value::String(v))).collect(),
        );
        let text = serde_json::to_string(&value).unwrap();
        let normalized = normalize_json_text(&text);
        prop_assert_eq!(serde_json::from_str::<Value>(&normalized).unwrap(), value);
    }
}
