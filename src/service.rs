//! Turn service
//!
//! `run_turn` is the one operation callers need: resolve the agent, find or
//! create the session, submit the prompt, consume the turn and pick the
//! answer.

use crate::agents::{AgentCatalog, AgentDefinition};
use crate::error::CoreError;
use crate::llm::TextGenerator;
use crate::resolve::{resolve, ResolutionSource};
use crate::runtime::{AgentRuntime, RuntimeError, RuntimeFactory};
use crate::session::{Session, SessionRegistry};
use crate::structured::{StructuredOutput, StructuredOutputGenerator, StructuredOutputRequest};
use crate::turn::consume_turn;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Per-session state kept in the registry
pub struct SessionState {
    runtime: Arc<dyn AgentRuntime>,
    /// Set once the runtime has accepted `create_session`
    ready: OnceCell<()>,
}

impl SessionState {
    pub fn new(runtime: Arc<dyn AgentRuntime>) -> Self {
        Self {
            runtime,
            ready: OnceCell::new(),
        }
    }

    /// Create the runtime-side session on first use; a failure leaves the
    /// cell empty so the next turn tries again.
    async fn ensure_created(&self, app_name: &str, user_id: &str, session_id: &str) -> Result<(), RuntimeError> {
        self.ready
            .get_or_try_init(|| async {
                self.runtime
                    .create_session(app_name, user_id, session_id)
                    .await
            })
            .await?;
        Ok(())
    }
}

/// What the caller sent as the prompt
#[derive(Debug, Clone, PartialEq)]
pub enum PromptInput {
    Text(String),
    /// Profile-style object, accepted only by agents with `structured_prompt`
    Structured(Map<String, Value>),
}

impl PromptInput {
    /// Render the prompt as the text submitted to the agent
    pub fn render(&self, agent: &AgentDefinition) -> Result<String, CoreError> {
        let text = match self {
            PromptInput::Text(text) => text.trim().to_string(),
            PromptInput::Structured(_) if !agent.structured_prompt => {
                return Err(CoreError::validation(format!(
                    "Agent '{}' expects prompt to be a string. Structured prompt objects are not supported for this agent.",
                    agent.name
                )));
            }
            PromptInput::Structured(fields) => render_structured(fields),
        };

        if text.is_empty() {
            return Err(CoreError::validation(
                "Missing prompt. Send { prompt: \"...\" }.",
            ));
        }
        Ok(text)
    }
}

fn render_structured(fields: &Map<String, Value>) -> String {
    let mut lines = Vec::new();
    if let Some(role) = fields.get("role").and_then(display_value) {
        lines.push(format!("Role: {role}"));
    }
    if let Some(skills) = fields.get("skills").and_then(display_value) {
        lines.push(format!("Skills: {skills}"));
    }
    if let Some(interests) = fields.get("interests").and_then(Value::as_str) {
        if !interests.trim().is_empty() {
            lines.push(format!("Interests: {}", interests.trim()));
        }
    }
    if let Some(experience) = fields.get("experience") {
        lines.push(format!("Experience (JSON): {experience}"));
    }

    let rest: Map<String, Value> = fields
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "role" | "skills" | "experience" | "interests"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if !rest.is_empty() {
        lines.push(format!("Additional context (JSON): {}", Value::Object(rest)));
    }

    if lines.is_empty() {
        Value::Object(fields.clone()).to_string()
    } else {
        lines.join("\n")
    }
}

/// Human-readable form of a field; `None` for blank values
fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64().is_some_and(|f| f.abs() < f64::EPSILON) => None,
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest {
    pub agent: String,
    /// Existing session to continue; a new id is generated when absent
    pub session_id: Option<String>,
    pub prompt: PromptInput,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnResponse {
    pub result: Value,
    pub session_id: String,
    /// Only set by structured-output call sites
    pub finish_reason: Option<String>,
    pub source: ResolutionSource,
}

pub struct TurnService {
    catalog: AgentCatalog,
    factory: Arc<dyn RuntimeFactory>,
    sessions: Arc<SessionRegistry<SessionState>>,
    text_generator: Option<Arc<dyn TextGenerator>>,
    app_name: String,
    user_id: String,
    debug_snippets: bool,
}

impl TurnService {
    pub fn new(
        catalog: AgentCatalog,
        factory: Arc<dyn RuntimeFactory>,
        sessions: Arc<SessionRegistry<SessionState>>,
    ) -> Self {
        Self {
            catalog,
            factory,
            sessions,
            text_generator: None,
            app_name: "agent-turns".to_string(),
            user_id: "user-1".to_string(),
            debug_snippets: false,
        }
    }

    /// App name and user id reported to the runtime on session creation
    #[must_use]
    pub fn with_identity(mut self, app_name: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self.user_id = user_id.into();
        self
    }

    #[must_use]
    pub fn with_text_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.text_generator = Some(generator);
        self
    }

    #[must_use]
    pub fn with_debug_snippets(mut self, enabled: bool) -> Self {
        self.debug_snippets = enabled;
        self
    }

    pub fn catalog(&self) -> &AgentCatalog {
        &self.catalog
    }

    pub fn debug_snippets(&self) -> bool {
        self.debug_snippets
    }

    /// Run one turn against an agent and resolve its answer
    pub async fn run_turn(&self, request: TurnRequest) -> Result<TurnResponse, CoreError> {
        if let PromptInput::Text(text) = &request.prompt {
            if text.trim().is_empty() {
                return Err(CoreError::validation(
                    "Missing prompt. Send { prompt: \"...\" }.",
                ));
            }
        }

        let agent = self
            .catalog
            .get(&request.agent)
            .ok_or_else(|| CoreError::AgentNotFound {
                name: request.agent.clone(),
                available: self.catalog.names(),
            })?;
        let user_text = request.prompt.render(&agent)?;

        let session_id = request
            .session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("session-{}", uuid::Uuid::new_v4()));

        let session = self.session_for(&session_id, &agent)?;
        let _turn = session.begin_turn();
        session
            .state
            .ensure_created(&self.app_name, &session.user_id, &session_id)
            .await?;

        tracing::info!(
            agent = %agent.name,
            session_id = %session_id,
            prompt_len = user_text.len(),
            "Running turn"
        );

        let events = session.state.runtime.submit(&session_id, &user_text).await?;
        let output = consume_turn(events).await.map_err(|e| {
            tracing::warn!(agent = %agent.name, session_id = %session_id, error = %e, "Turn failed");
            CoreError::from(e)
        })?;

        let resolution = resolve(&output, agent.preferred_tool.as_deref());
        tracing::info!(
            agent = %agent.name,
            session_id = %session_id,
            source = ?resolution.source,
            "Turn resolved"
        );

        Ok(TurnResponse {
            result: resolution.value,
            session_id,
            finish_reason: None,
            source: resolution.source,
        })
    }

    fn session_for(
        &self,
        session_id: &str,
        agent: &AgentDefinition,
    ) -> Result<Arc<Session<SessionState>>, CoreError> {
        self.sessions
            .get_or_create(session_id, &agent.name, &self.user_id, || {
                let runtime = self.factory.create(agent)?;
                Ok(SessionState::new(runtime))
            })
    }

    /// Generate a JSON value with the service's text generator
    pub async fn generate_structured(
        &self,
        request: &StructuredOutputRequest,
    ) -> Result<StructuredOutput, CoreError> {
        let generator = self
            .text_generator
            .as_deref()
            .ok_or_else(|| {
                CoreError::NotConfigured(
                    "No text generator configured; set GEMINI_API_KEY or LLM_GATEWAY".to_string(),
                )
            })?;

        let output = StructuredOutputGenerator::new(generator)
            .with_debug_snippets(self.debug_snippets)
            .generate(request)
            .await?;
        Ok(output)
    }
}
