//! Choosing a turn's final answer

use crate::extract::extract_json;
use crate::turn::TurnOutput;
use serde::Serialize;
use serde_json::Value;

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    PreferredTool,
    ExtractedText,
    RawText,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub value: Value,
    pub source: ResolutionSource,
}

/// Pick the turn's answer: the preferred tool's result, else JSON found in
/// the model text, else the model text itself. An extracted `null` counts as
/// nothing found.
pub fn resolve(turn: &TurnOutput, preferred_tool: Option<&str>) -> Resolution {
    if let Some(value) = preferred_tool.and_then(|name| turn.tool_results.get(name)) {
        return Resolution {
            value: value.clone(),
            source: ResolutionSource::PreferredTool,
        };
    }

    match extract_json(&turn.text).filter(|value| !value.is_null()) {
        Some(value) => Resolution {
            value,
            source: ResolutionSource::ExtractedText,
        },
        None => Resolution {
            value: Value::String(turn.text.clone()),
            source: ResolutionSource::RawText,
        },
    }
}
