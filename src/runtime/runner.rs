//! In-memory agent runner
//!
//! Drives one agent through the model/tool loop: call the model, stream its
//! text, run the tools it asks for, feed the results back, repeat until the
//! model answers without calling a tool.

use super::{AgentRuntime, EventStream, RuntimeError, RuntimeFactory};
use crate::agents::AgentDefinition;
use crate::llm::{
    ContentBlock, LlmError, LlmMessage, LlmRequest, LlmService, MessageRole, ModelRegistry,
    ResponseFormat, SystemContent, ToolDefinition,
};
use crate::tools::{normalize_tool_result, ToolContext, ToolError, ToolRegistry};
use crate::turn::Event;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Knobs for the model/tool loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunnerConfig {
    /// Model calls that may request tools before the turn is abandoned
    pub max_tool_rounds: u32,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 8,
            temperature: None,
            max_output_tokens: None,
        }
    }
}

type History = Arc<tokio::sync::Mutex<Vec<LlmMessage>>>;

/// Runtime that keeps conversation history in memory, per session
pub struct InMemoryRunner {
    agent_name: String,
    system: Vec<SystemContent>,
    llm: Arc<dyn LlmService>,
    tools: ToolRegistry,
    config: RunnerConfig,
    sessions: Mutex<HashMap<String, History>>,
}

impl InMemoryRunner {
    pub fn new(
        agent: &AgentDefinition,
        llm: Arc<dyn LlmService>,
        tools: ToolRegistry,
        config: RunnerConfig,
    ) -> Self {
        let system = if agent.instructions.trim().is_empty() {
            vec![]
        } else {
            vec![SystemContent::new(agent.instructions.clone())]
        };
        Self {
            agent_name: agent.name.clone(),
            system,
            llm,
            tools,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn history(&self, session_id: &str) -> Option<History> {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(session_id)
            .cloned()
    }
}

#[async_trait]
impl AgentRuntime for InMemoryRunner {
    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<(), RuntimeError> {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(session_id.to_string())
            .or_default();
        tracing::info!(
            app = %app_name,
            user_id = %user_id,
            session_id = %session_id,
            agent = %self.agent_name,
            "Runner session created"
        );
        Ok(())
    }

    async fn submit(&self, session_id: &str, user_text: &str) -> Result<EventStream, RuntimeError> {
        let history = self.history(session_id).ok_or_else(|| {
            LlmError::runtime(format!("Unknown runner session: {session_id}"))
        })?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let driver = TurnDriver {
            session_id: session_id.to_string(),
            system: self.system.clone(),
            definitions: self.tools.definitions(),
            llm: self.llm.clone(),
            tools: self.tools.clone(),
            config: self.config,
            tx,
        };
        tokio::spawn(driver.run(history, user_text.to_string()));

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Why a turn stopped before the model finished
enum TurnAbort {
    Failed(RuntimeError),
    /// Nobody is listening to the event stream any more
    Abandoned,
}

impl From<LlmError> for TurnAbort {
    fn from(err: LlmError) -> Self {
        TurnAbort::Failed(RuntimeError::Upstream(err))
    }
}

/// One turn's worth of model/tool loop, run on its own task
struct TurnDriver {
    session_id: String,
    system: Vec<SystemContent>,
    definitions: Vec<ToolDefinition>,
    llm: Arc<dyn LlmService>,
    tools: ToolRegistry,
    config: RunnerConfig,
    tx: mpsc::Sender<Result<Event, RuntimeError>>,
}

impl TurnDriver {
    async fn run(self, history: History, user_text: String) {
        // Held for the whole turn: turns on one session never interleave
        let mut history = history.lock().await;
        let checkpoint = history.len();
        let cancel = CancellationToken::new();

        if let Err(abort) = self.drive(&mut history, user_text, &cancel).await {
            cancel.cancel();
            history.truncate(checkpoint);
            match abort {
                TurnAbort::Failed(err) => {
                    tracing::warn!(session_id = %self.session_id, error = %err, "Turn failed");
                    let _ = self.tx.send(Err(err)).await;
                }
                TurnAbort::Abandoned => {
                    tracing::info!(session_id = %self.session_id, "Turn abandoned by consumer");
                }
            }
        }
    }

    async fn drive(
        &self,
        history: &mut Vec<LlmMessage>,
        user_text: String,
        cancel: &CancellationToken,
    ) -> Result<(), TurnAbort> {
        history.push(LlmMessage {
            role: MessageRole::User,
            content: vec![ContentBlock::text(user_text)],
        });

        let mut rounds = 0;
        loop {
            let request = LlmRequest {
                system: self.system.clone(),
                messages: history.clone(),
                tools: self.definitions.clone(),
                max_tokens: self.config.max_output_tokens,
                temperature: self.config.temperature,
                response_format: ResponseFormat::Text,
            };
            let response = self.llm.complete(&request).await?;

            for block in &response.content {
                if let ContentBlock::Text { text } = block {
                    self.emit(Event::text(text.clone())).await?;
                }
            }

            let calls: Vec<(String, String, Value)> = response
                .tool_uses()
                .into_iter()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();

            history.push(LlmMessage {
                role: MessageRole::Assistant,
                content: response.content,
            });

            if calls.is_empty() {
                return Ok(());
            }
            if rounds >= self.config.max_tool_rounds {
                return Err(LlmError::runtime(format!(
                    "Agent exceeded {} tool rounds",
                    self.config.max_tool_rounds
                ))
                .into());
            }
            rounds += 1;

            let mut results = Vec::with_capacity(calls.len());
            for (id, name, input) in calls {
                let (payload, is_error) = self.run_tool(&name, input, cancel).await?;
                results.push(ContentBlock::tool_result(id, name, payload, is_error));
            }
            history.push(LlmMessage {
                role: MessageRole::User,
                content: results,
            });
        }
    }

    /// Execute one tool call and report it; returns what the model sees
    async fn run_tool(
        &self,
        name: &str,
        input: Value,
        cancel: &CancellationToken,
    ) -> Result<(Value, bool), TurnAbort> {
        let ctx = ToolContext::new(self.session_id.clone(), cancel.child_token());
        let outcome = match self.tools.execute(name, input, ctx).await {
            Some(outcome) => outcome,
            None => Err(ToolError::not_found(format!("Unknown tool: {name}"))),
        };

        match outcome {
            Ok(Value::String(text)) => {
                // Text-only tools surface as free text; the consumer recovers any JSON
                self.emit(Event::other(Some(text.clone()))).await?;
                Ok((normalize_tool_result(Value::String(text)), false))
            }
            Ok(value) => {
                let value = normalize_tool_result(value);
                self.emit(Event::tool_result(name, value.clone())).await?;
                Ok((value, false))
            }
            Err(err) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    tool = %name,
                    code = err.code,
                    message = %err.message,
                    "Tool failed; forwarding error to model"
                );
                Ok((err.to_model_payload(), true))
            }
        }
    }

    async fn emit(&self, event: Event) -> Result<(), TurnAbort> {
        self.tx
            .send(Ok(event))
            .await
            .map_err(|_| TurnAbort::Abandoned)
    }
}

/// Builds one [`InMemoryRunner`] per session
pub struct RunnerFactory {
    models: Arc<ModelRegistry>,
    tools: ToolRegistry,
    config: RunnerConfig,
}

impl RunnerFactory {
    pub fn new(models: Arc<ModelRegistry>, tools: ToolRegistry, config: RunnerConfig) -> Self {
        Self {
            models,
            tools,
            config,
        }
    }
}

impl RuntimeFactory for RunnerFactory {
    fn create(
        &self,
        agent: &AgentDefinition,
    ) -> Result<Arc<dyn super::AgentRuntime>, RuntimeError> {
        let llm = self
            .models
            .get_or_default(agent.model.as_deref())
            .ok_or_else(|| {
                LlmError::runtime("No LLM available; set GEMINI_API_KEY or LLM_GATEWAY")
            })?;
        let tools = self.tools.subset(&agent.tools).map_err(|missing| {
            LlmError::runtime(format!(
                "Agent '{}' references unknown tools: {}",
                agent.name,
                missing.join(", ")
            ))
        })?;
        Ok(Arc::new(InMemoryRunner::new(agent, llm, tools, self.config)))
    }
}
