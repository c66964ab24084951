//! Turn event consumption
//!
//! A turn is the ordered event sequence produced by one user message. The
//! consumer folds it into accumulated model text plus the last result of each
//! tool, strictly in arrival order.

use crate::extract::extract_object_or_array;
use crate::runtime::RuntimeError;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::collections::HashMap;

/// Name under which JSON recovered from free-text events is recorded
pub const UNKNOWN_TOOL: &str = "unknown";

/// One unit of the agent runtime's output stream
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A fragment of the model's reply
    ModelTextDelta { text: String },
    /// A tool's structured result
    ToolResult { name: String, value: Value },
    /// Anything else; may carry free text (e.g. a tool that only emits text)
    Other { text: Option<String> },
}

impl Event {
    pub fn text(text: impl Into<String>) -> Self {
        Event::ModelTextDelta { text: text.into() }
    }

    pub fn tool_result(name: impl Into<String>, value: Value) -> Self {
        Event::ToolResult {
            name: name.into(),
            value,
        }
    }

    pub fn other(text: Option<String>) -> Self {
        Event::Other { text }
    }
}

/// Tool name -> last value recorded during one turn.
///
/// Recording a name twice replaces the earlier value; values are never merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolResultMap {
    results: HashMap<String, Value>,
}

impl ToolResultMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `name`, returning the value it replaced
    pub fn record(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.results.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.results.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.results.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Recorded tool names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.results.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// A completed turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOutput {
    /// Model text, concatenated in arrival order without separators
    pub text: String,
    pub tool_results: ToolResultMap,
}

impl TurnOutput {
    /// Fold one event into the turn
    pub fn apply(&mut self, event: Event) {
        match event {
            Event::ModelTextDelta { text } => self.text.push_str(&text),
            Event::ToolResult { name, value } => {
                tracing::debug!(tool = %name, "Captured tool result");
                self.tool_results.record(name, value);
            }
            Event::Other { text: Some(text) } => {
                if let Some(value) = extract_object_or_array(&text) {
                    tracing::debug!("Captured JSON from free-text event");
                    self.tool_results.record(UNKNOWN_TOOL, value);
                }
            }
            Event::Other { text: None } => {}
        }
    }
}

/// Consume a turn's event stream to completion.
///
/// The first error ends the turn; whatever was accumulated so far is dropped.
pub async fn consume_turn<S>(mut events: S) -> Result<TurnOutput, RuntimeError>
where
    S: Stream<Item = Result<Event, RuntimeError>> + Unpin,
{
    let mut output = TurnOutput::default();
    while let Some(event) = events.next().await {
        output.apply(event?);
    }

    tracing::debug!(
        text_len = output.text.len(),
        tools = ?output.tool_results.names(),
        "Turn consumed"
    );
    Ok(output)
}
