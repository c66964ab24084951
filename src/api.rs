//! HTTP API
//!
//! `POST /api/agent/:name` runs one turn; `GET /health` reports liveness.

mod handlers;
mod types;

pub use handlers::create_router;
pub use types::*;

use crate::service::TurnService;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TurnService>,
    /// Reported by the health check
    pub service_name: String,
}

impl AppState {
    pub fn new(service: Arc<TurnService>, service_name: impl Into<String>) -> Self {
        Self {
            service,
            service_name: service_name.into(),
        }
    }
}
