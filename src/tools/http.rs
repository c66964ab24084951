//! Tool backed by an HTTP endpoint
//!
//! Integrations (job search, news ingestion, ...) live behind their own
//! services. The tool POSTs the model's arguments as JSON and hands the
//! response body back.

use super::{Tool, ToolContext, ToolError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Declarative description of an HTTP tool (as found in the agent catalog)
#[derive(Debug, Clone, Deserialize)]
pub struct HttpToolSpec {
    pub name: String,
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub parameters: Value,
    pub endpoint: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

pub struct HttpTool {
    spec: HttpToolSpec,
    client: Client,
}

impl HttpTool {
    pub fn new(spec: HttpToolSpec) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(
                spec.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
            .build()
            .expect("Failed to create HTTP client");
        Self { spec, client }
    }

    async fn call(&self, args: Value, session_id: &str) -> Result<Value, ToolError> {
        let response = self
            .client
            .post(&self.spec.endpoint)
            .header("x-session-id", session_id)
            .json(&args)
            .send()
            .await
            .map_err(|e| ToolError::new(502, format!("{} unreachable: {e}", self.spec.name)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::new(502, format!("Failed to read response: {e}")))?;
        let parsed = serde_json::from_str::<Value>(&body).ok();

        if let Some(err) = parsed.as_ref().and_then(ToolError::from_payload) {
            return Err(err);
        }

        if !status.is_success() {
            let snippet: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(ToolError::new(status.as_u16(), snippet));
        }

        Ok(parsed.unwrap_or(Value::String(body)))
    }
}

#[async_trait]
impl Tool for HttpTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> String {
        self.spec.description.clone()
    }

    fn parameter_schema(&self) -> Value {
        self.spec.parameters.clone()
    }

    async fn execute(&self, args: Value, ctx: ToolContext) -> Result<Value, ToolError> {
        tokio::select! {
            result = self.call(args, &ctx.session_id) => result,
            () = ctx.cancel.cancelled() => Err(ToolError::new(499, "Tool call cancelled")),
        }
    }
}
