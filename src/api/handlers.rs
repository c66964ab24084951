//! HTTP request handlers

use super::types::{AgentRequest, AgentResponse, ErrorResponse, HealthResponse};
use super::AppState;
use crate::error::CoreError;
use crate::service::{PromptInput, TurnRequest};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/agent/:name", post(run_agent))
        .route("/health", get(health))
        .with_state(state)
}

// ============================================================
// Agent Turns
// ============================================================

async fn run_agent(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<AgentRequest>, JsonRejection>,
) -> Result<Json<AgentResponse>, AppError> {
    let debug = state.service.debug_snippets();
    let Json(req) = body.map_err(|e| AppError::bad_request(e.body_text()))?;

    let prompt = match req.prompt {
        Value::String(text) => PromptInput::Text(text),
        Value::Object(fields) => PromptInput::Structured(fields),
        _ => PromptInput::Text(String::new()),
    };

    let response = state
        .service
        .run_turn(TurnRequest {
            agent: name,
            session_id: req.session_id,
            prompt,
        })
        .await
        .map_err(|error| AppError::new(error, debug))?;

    Ok(Json(AgentResponse {
        success: true,
        result: response.result,
        session_id: response.session_id,
        finish_reason: response.finish_reason,
    }))
}

// ============================================================
// Health
// ============================================================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
        service: state.service_name.clone(),
    })
}

// ============================================================
// Error Handling
// ============================================================

struct AppError {
    error: CoreError,
    /// Include unparseable model output in the body
    debug_snippets: bool,
}

impl AppError {
    fn new(error: CoreError, debug_snippets: bool) -> Self {
        Self {
            error,
            debug_snippets,
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(CoreError::validation(message), false)
    }

    fn status(&self) -> StatusCode {
        match &self.error {
            CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::AgentNotFound { .. } => StatusCode::NOT_FOUND,
            CoreError::SessionAgentMismatch { .. } => StatusCode::CONFLICT,
            CoreError::Unparseable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::Tool(_) | CoreError::Upstream(_) => StatusCode::BAD_GATEWAY,
            CoreError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.error, "Agent request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self.error, "Agent request rejected");
        }

        let mut body = ErrorResponse::new(self.error.to_string());
        if let CoreError::Unparseable(e) = &self.error {
            if self.debug_snippets {
                body.raw_output_snippet = Some(e.snippet.clone());
            }
        }
        (status, Json(body)).into_response()
    }
}
