//! Error taxonomy for the turn service

use crate::llm::LlmError;
use crate::runtime::RuntimeError;
use crate::structured::{StructuredOutputError, UnparseableOutputError};
use crate::tools::ToolError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Missing or malformed caller input
    #[error("{0}")]
    Validation(String),

    #[error("Agent '{name}' not found. Available agents: {}", available.join(", "))]
    AgentNotFound { name: String, available: Vec<String> },

    #[error("Session '{session_id}' belongs to agent '{bound}', not '{requested}'")]
    SessionAgentMismatch {
        session_id: String,
        bound: String,
        requested: String,
    },

    /// A tool's structured error ended the turn
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Unparseable(#[from] UnparseableOutputError),

    /// Runtime, model or network failure, surfaced as-is
    #[error(transparent)]
    Upstream(#[from] LlmError),

    /// The server was started without something this operation needs
    #[error("{0}")]
    NotConfigured(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<RuntimeError> for CoreError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Tool(e) => Self::Tool(e),
            RuntimeError::Upstream(e) => Self::Upstream(e),
        }
    }
}

impl From<StructuredOutputError> for CoreError {
    fn from(err: StructuredOutputError) -> Self {
        match err {
            StructuredOutputError::Unparseable(e) => Self::Unparseable(e),
            StructuredOutputError::Upstream(e) => Self::Upstream(e),
        }
    }
}
