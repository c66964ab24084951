//! Trait abstractions for agent runtimes
//!
//! These traits let the turn service run against the in-memory runner in
//! production and scripted runtimes in tests.

use super::{EventStream, RuntimeError};
use crate::agents::AgentDefinition;
use async_trait::async_trait;
use std::sync::Arc;

/// Conversation runtime for one agent
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Register a session with the runtime. Called once per session before
    /// the first submit.
    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<(), RuntimeError>;

    /// Submit a user message; the returned stream ends when the turn is done
    async fn submit(&self, session_id: &str, user_text: &str) -> Result<EventStream, RuntimeError>;
}

/// Builds the runtime that backs a new session.
///
/// Called while the session registry holds its insert lock, so it must be
/// cheap and must not perform I/O.
pub trait RuntimeFactory: Send + Sync {
    fn create(&self, agent: &AgentDefinition) -> Result<Arc<dyn AgentRuntime>, RuntimeError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: AgentRuntime + ?Sized> AgentRuntime for Arc<T> {
    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<(), RuntimeError> {
        (**self).create_session(app_name, user_id, session_id).await
    }

    async fn submit(&self, session_id: &str, user_text: &str) -> Result<EventStream, RuntimeError> {
        (**self).submit(session_id, user_text).await
    }
}

impl<T: RuntimeFactory + ?Sized> RuntimeFactory for Arc<T> {
    fn create(&self, agent: &AgentDefinition) -> Result<Arc<dyn AgentRuntime>, RuntimeError> {
        (**self).create(agent)
    }
}
