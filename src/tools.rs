//! Tool contracts for agent runtimes
//!
//! A tool is `{name, parameter schema, execute(args)}`. Failures are
//! structured (`code` + `message`) so they reach the model as one error
//! object rather than a free-form string.

mod http;

pub use http::{HttpTool, HttpToolSpec};

use crate::llm::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Structured failure raised by a tool's `execute`
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("tool error {code}: {message}")]
pub struct ToolError {
    pub code: u16,
    pub message: String,
}

impl ToolError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    /// The single error object handed back to the model
    pub fn to_model_payload(&self) -> Value {
        json!({ "error": { "code": self.code, "message": self.message } })
    }

    /// Recognize a `{"error": {"code", "message"}}` payload
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let error = payload.get("error")?;
        let code = error.get("code")?.as_u64()?;
        let message = error.get("message")?.as_str()?;
        Some(Self::new(u16::try_from(code).ok()?, message))
    }
}

/// Per-call context handed to tools
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Session the call belongs to
    pub session_id: String,
    /// Fires when the turn is abandoned
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(session_id: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            session_id: session_id.into(),
            cancel,
        }
    }
}

/// Trait for tools that can be executed by an agent
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name
    fn name(&self) -> &str;

    /// Tool description for LLM
    fn description(&self) -> String;

    /// JSON schema for tool arguments
    fn parameter_schema(&self) -> Value;

    /// Execute the tool
    async fn execute(&self, args: Value, ctx: ToolContext) -> Result<Value, ToolError>;
}

/// Shape a raw tool result as a JSON object.
///
/// Function responses must be objects: arrays are wrapped as `items`,
/// scalars and `null` as `value`.
pub fn normalize_tool_result(result: Value) -> Value {
    match result {
        Value::Object(_) => result,
        Value::Array(items) => json!({ "items": items }),
        other => json!({ "value": other }),
    }
}

/// Collection of tools available to agents
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registry restricted to `names`; unknown names are returned as the error
    pub fn subset(&self, names: &[String]) -> Result<ToolRegistry, Vec<String>> {
        let mut missing = Vec::new();
        let mut tools = Vec::new();
        for name in names {
            match self.get(name) {
                Some(tool) => tools.push(tool),
                None => missing.push(name.clone()),
            }
        }
        if missing.is_empty() {
            Ok(ToolRegistry { tools })
        } else {
            Err(missing)
        }
    }

    /// Get all tool definitions for LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description(),
                input_schema: t.parameter_schema(),
            })
            .collect()
    }

    /// Execute a tool by name; `None` when no such tool is registered
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        ctx: ToolContext,
    ) -> Option<Result<Value, ToolError>> {
        let tool = self.get(name)?;
        Some(tool.execute(args, ctx).await)
    }
}
