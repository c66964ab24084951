//! API request and response types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /api/agent/:name`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    /// A string, or a profile object for agents that accept one
    #[serde(default)]
    pub prompt: Value,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub success: bool,
    pub result: Value,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub service: String,
}

/// Error response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    /// Unparseable model output; only with `DEBUG_AI_JSON=1`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output_snippet: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
            raw_output_snippet: None,
        }
    }
}
