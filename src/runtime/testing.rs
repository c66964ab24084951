//! Mock implementations for testing
//!
//! These mocks let the turn service, runner and structured-output generator
//! run without a model or network.

use super::traits::*;
use super::{EventStream, RuntimeError};
use crate::agents::AgentDefinition;
use crate::llm::{
    Generation, GenerateOptions, LlmError, LlmRequest, LlmResponse, LlmService, TextGenerator,
};
use crate::tools::{Tool, ToolContext, ToolError};
use crate::turn::Event;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock LLM Service
// ============================================================================

/// Mock LLM service that returns queued responses
pub struct MockLlmService {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmService {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlmService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Mock Text Generator
// ============================================================================

/// Text generator that replays queued generations and records every call
#[derive(Default)]
pub struct MockTextGenerator {
    outputs: Mutex<VecDeque<Result<Generation, LlmError>>>,
    calls: Mutex<Vec<(String, GenerateOptions)>>,
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a generation that stopped normally
    pub fn queue_text(&self, text: impl Into<String>) {
        self.queue(Generation {
            text: text.into(),
            finish_reason: Some(crate::llm::FinishReason::Stop),
        });
    }

    pub fn queue(&self, generation: Generation) {
        self.outputs.lock().unwrap().push_back(Ok(generation));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.outputs.lock().unwrap().push_back(Err(error));
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn options(&self) -> Vec<GenerateOptions> {
        self.calls.lock().unwrap().iter().map(|(_, o)| *o).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Generation, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), *options));
        self.outputs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock generation queued")))
    }
}

// ============================================================================
// Scripted Runtime
// ============================================================================

type Script = Vec<Result<Event, RuntimeError>>;

/// Runtime that replays one queued event script per submitted turn
#[derive(Default)]
pub struct ScriptedRuntime {
    scripts: Mutex<VecDeque<Script>>,
    submitted: Mutex<Vec<(String, String)>>,
    created_sessions: Mutex<Vec<String>>,
    create_attempts: AtomicUsize,
    create_failures: Mutex<VecDeque<RuntimeError>>,
    create_delay: Option<Duration>,
    turn_delay: Option<Duration>,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `create_session` slow, to widen race windows in tests
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    /// Make every submitted turn take at least `delay`
    pub fn with_turn_delay(mut self, delay: Duration) -> Self {
        self.turn_delay = Some(delay);
        self
    }

    /// Fail the next `create_session` call with `error`; later calls succeed
    pub fn fail_next_create(&self, error: RuntimeError) {
        self.create_failures.lock().unwrap().push_back(error);
    }

    /// Number of `create_session` calls, failed ones included
    pub fn create_attempts(&self) -> usize {
        self.create_attempts.load(Ordering::SeqCst)
    }

    pub fn queue_turn(&self, events: Script) {
        self.scripts.lock().unwrap().push_back(events);
    }

    /// Every `(session_id, user_text)` submitted so far
    pub fn submitted(&self) -> Vec<(String, String)> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn created_sessions(&self) -> Vec<String> {
        self.created_sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    async fn create_session(
        &self,
        _app_name: &str,
        _user_id: &str,
        session_id: &str,
    ) -> Result<(), RuntimeError> {
        self.create_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.create_failures.lock().unwrap().pop_front();
        if let Some(err) = failure {
            return Err(err);
        }
        self.created_sessions
            .lock()
            .unwrap()
            .push(session_id.to_string());
        Ok(())
    }

    async fn submit(&self, session_id: &str, user_text: &str) -> Result<EventStream, RuntimeError> {
        self.submitted
            .lock()
            .unwrap()
            .push((session_id.to_string(), user_text.to_string()));
        if let Some(delay) = self.turn_delay {
            tokio::time::sleep(delay).await;
        }
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Box::pin(futures::stream::iter(script)))
    }
}

/// Factory handing out one shared [`ScriptedRuntime`], counting creations
pub struct ScriptedFactory {
    runtime: Arc<ScriptedRuntime>,
    created: AtomicUsize,
}

impl ScriptedFactory {
    pub fn new(runtime: Arc<ScriptedRuntime>) -> Self {
        Self {
            runtime,
            created: AtomicUsize::new(0),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl RuntimeFactory for ScriptedFactory {
    fn create(&self, _agent: &AgentDefinition) -> Result<Arc<dyn AgentRuntime>, RuntimeError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.runtime.clone())
    }
}

// ============================================================================
// Mock Tools
// ============================================================================

/// Tool that answers `{"echo": args}`
pub struct EchoTool {
    name: String,
}

impl EchoTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        "Echoes its arguments".to_string()
    }

    fn parameter_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, args: Value, _ctx: ToolContext) -> Result<Value, ToolError> {
        Ok(json!({ "echo": args }))
    }
}

/// Tool that always fails with the given error
pub struct FailingTool {
    name: String,
    error: ToolError,
}

impl FailingTool {
    pub fn new(name: impl Into<String>, error: ToolError) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        "Always fails".to_string()
    }

    fn parameter_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value, _ctx: ToolContext) -> Result<Value, ToolError> {
        Err(self.error.clone())
    }
}

/// Tool whose result is a bare string
pub struct TextTool {
    name: String,
    text: String,
}

impl TextTool {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

#[async_trait]
impl Tool for TextTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        "Returns fixed text".to_string()
    }

    fn parameter_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value, _ctx: ToolContext) -> Result<Value, ToolError> {
        Ok(Value::String(self.text.clone()))
    }
}
