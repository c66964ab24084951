//! Upstream failure taxonomy
//!
//! Everything on the far side of a turn reports through [`LlmError`]: the
//! model provider, the transport to it, and the agent runtime driving it. The
//! service never retries, so the kind only feeds logs and HTTP mapping.

use thiserror::Error;

/// Failure reported by a model provider or an agent runtime
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
}

impl LlmError {
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Network, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::ServerError, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Auth, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::InvalidRequest, message)
    }

    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::MalformedResponse, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Runtime, message)
    }

    /// Classify a non-success provider status
    pub fn from_status(status: u16, message: &str) -> Self {
        match status {
            400 | 404 | 422 => Self::invalid_request(format!("Invalid request: {message}")),
            401 | 403 => Self::auth(format!("Authentication failed: {message}")),
            429 => Self::rate_limit(format!("Rate limit exceeded: {message}")),
            500..=599 => Self::server_error(format!("Server error: {message}")),
            _ => Self::malformed_response(format!("HTTP {status}: {message}")),
        }
    }
}

/// Which side of the turn failed and how
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Provider unreachable, timed out, or the body could not be read
    Network,
    /// Provider quota exhausted (429)
    RateLimit,
    /// Provider failed internally (5xx)
    ServerError,
    /// Credentials rejected (401, 403)
    Auth,
    /// Provider refused the request as built
    InvalidRequest,
    /// Provider answered with something we cannot interpret
    MalformedResponse,
    /// The agent runtime gave up on the turn
    Runtime,
}

impl LlmErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::RateLimit => "rate_limit",
            Self::ServerError => "server_error",
            Self::Auth => "auth",
            Self::InvalidRequest => "invalid_request",
            Self::MalformedResponse => "malformed_response",
            Self::Runtime => "runtime",
        }
    }
}
