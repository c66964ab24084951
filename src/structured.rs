//! Structured-output generation with one repair attempt
//!
//! A model asked for JSON sometimes wraps it in prose, fences it, truncates it
//! or sprinkles comments into it. The generator extracts what it can from the
//! first answer and, failing that, asks the model once to repair its own
//! output before giving up.
//!
//! The flow is an explicit state machine: [`GenerationState::validate`] is a
//! pure transition and the generator only performs the model calls in between.

use crate::extract::extract_json;
use crate::llm::{FinishReason, GenerateOptions, Generation, LlmError, ResponseFormat, TextGenerator};
use serde_json::Value;
use thiserror::Error;

/// Upper bound on how much of the first output is quoted in the repair prompt
pub const MAX_REPAIR_INPUT_CHARS: usize = 12_000;
/// Upper bound on the snippet carried by [`UnparseableOutputError`]
pub const MAX_SNIPPET_CHARS: usize = 2_000;
const DEFAULT_REPAIR_TEMPERATURE: f32 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct StructuredOutputRequest {
    pub prompt: String,
    /// Human-readable JSON schema the output must follow
    pub schema_description: String,
    pub temperature: f32,
    pub max_output_size: u32,
    /// Defaults to 0.1; never above `temperature`
    pub repair_temperature: Option<f32>,
}

impl StructuredOutputRequest {
    pub fn new(
        prompt: impl Into<String>,
        schema_description: impl Into<String>,
        temperature: f32,
        max_output_size: u32,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            schema_description: schema_description.into(),
            temperature,
            max_output_size,
            repair_temperature: None,
        }
    }

    fn repair_temperature(&self) -> f32 {
        self.repair_temperature
            .unwrap_or(DEFAULT_REPAIR_TEMPERATURE)
            .min(self.temperature)
    }

    fn options(&self, temperature: f32) -> GenerateOptions {
        GenerateOptions {
            temperature,
            max_output_size: self.max_output_size,
            response_format: ResponseFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructuredOutput {
    pub value: Value,
    pub finish_reason: Option<FinishReason>,
    /// The value came from the repair call
    pub repaired: bool,
    /// Text the value was extracted from
    pub raw_text: String,
}

impl StructuredOutput {
    /// The model stopped on its output limit; the value may be incomplete
    pub fn is_truncated(&self) -> bool {
        self.finish_reason == Some(FinishReason::MaxTokens)
    }
}

/// Both the first answer and the repair were unusable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to parse model JSON")]
pub struct UnparseableOutputError {
    /// Leading part of the last non-empty model output
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructuredOutputError {
    #[error(transparent)]
    Unparseable(#[from] UnparseableOutputError),
    /// A model call failed; never retried
    #[error(transparent)]
    Upstream(#[from] LlmError),
}

#[derive(Debug, Clone, PartialEq)]
enum Attempt {
    First,
    Repair { first_output: String },
}

#[derive(Debug, Clone, PartialEq)]
enum GenerationState {
    Generating { attempt: Attempt, prompt: String },
    Validating { attempt: Attempt, generation: Generation },
    Repairing { first_output: String },
    Succeeded(StructuredOutput),
    Failed { snippet: String },
}

impl GenerationState {
    /// Decide what a generation leads to; only a JSON object counts as success
    fn validate(attempt: Attempt, generation: Generation) -> Self {
        if let Some(value) = extract_json(&generation.text).filter(Value::is_object) {
            return Self::Succeeded(StructuredOutput {
                value,
                finish_reason: generation.finish_reason,
                repaired: matches!(attempt, Attempt::Repair { .. }),
                raw_text: generation.text,
            });
        }

        match attempt {
            Attempt::First => Self::Repairing {
                first_output: generation.text,
            },
            Attempt::Repair { first_output } => {
                let source = if generation.text.is_empty() {
                    first_output
                } else {
                    generation.text
                };
                Self::Failed {
                    snippet: truncate_chars(&source, MAX_SNIPPET_CHARS),
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Generating { .. } => "generating",
            Self::Validating { .. } => "validating",
            Self::Repairing { .. } => "repairing",
            Self::Succeeded(_) => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Runs the generate → validate → repair flow against a [`TextGenerator`]
pub struct StructuredOutputGenerator<'a, G: TextGenerator + ?Sized> {
    generator: &'a G,
    debug_snippets: bool,
}

impl<'a, G: TextGenerator + ?Sized> StructuredOutputGenerator<'a, G> {
    pub fn new(generator: &'a G) -> Self {
        Self {
            generator,
            debug_snippets: false,
        }
    }

    /// Log the failing output when parsing gives up
    #[must_use]
    pub fn with_debug_snippets(mut self, enabled: bool) -> Self {
        self.debug_snippets = enabled;
        self
    }

    /// Generate a JSON value, repairing the model's output at most once
    pub async fn generate(
        &self,
        request: &StructuredOutputRequest,
    ) -> Result<StructuredOutput, StructuredOutputError> {
        let mut state = GenerationState::Generating {
            attempt: Attempt::First,
            prompt: initial_prompt(request),
        };

        loop {
            tracing::debug!(state = state.name(), "Structured output transition");
            state = match state {
                GenerationState::Generating { attempt, prompt } => {
                    let temperature = match attempt {
                        Attempt::First => request.temperature,
                        Attempt::Repair { .. } => request.repair_temperature(),
                    };
                    let generation = self
                        .generator
                        .generate(&prompt, &request.options(temperature))
                        .await?;
                    GenerationState::Validating {
                        attempt,
                        generation,
                    }
                }
                GenerationState::Validating {
                    attempt,
                    generation,
                } => GenerationState::validate(attempt, generation),
                GenerationState::Repairing { first_output } => {
                    tracing::warn!(
                        output_len = first_output.len(),
                        "Model output was not valid JSON; attempting repair"
                    );
                    GenerationState::Generating {
                        prompt: repair_prompt(&request.schema_description, &first_output),
                        attempt: Attempt::Repair { first_output },
                    }
                }
                GenerationState::Succeeded(output) => {
                    if output.is_truncated() {
                        tracing::warn!(repaired = output.repaired, "Structured output hit the token limit");
                    }
                    return Ok(output);
                }
                GenerationState::Failed { snippet } => {
                    if self.debug_snippets {
                        tracing::error!(
                            snippet = %truncate_chars(&snippet, 1200),
                            "Structured output parse failed after repair"
                        );
                    } else {
                        tracing::error!("Structured output parse failed after repair");
                    }
                    return Err(UnparseableOutputError { snippet }.into());
                }
            };
        }
    }
}

fn initial_prompt(request: &StructuredOutputRequest) -> String {
    let schema = request.schema_description.trim();
    if schema.is_empty() {
        return request.prompt.clone();
    }
    format!(
        "{}\n\nReturn ONLY valid JSON matching this schema:\n{schema}",
        request.prompt.trim_end()
    )
}

fn repair_prompt(schema: &str, first_output: &str) -> String {
    format!(
        "You are a JSON repair tool. Regenerate STRICT valid minified JSON ONLY.\n\n\
         JSON SCHEMA (must match exactly):\n{schema}\n\n\
         IMPORTANT RULES:\n\
         - Return ONLY a single JSON object.\n\
         - Use double quotes for all keys and string values.\n\
         - No markdown, no code fences, no comments.\n\
         - Ensure the JSON is COMPLETE (must end with a closing }}).\n\n\
         OUTPUT TO FIX (may be truncated / may include extra text):\n{}\n\n\
         Return ONLY JSON.",
        truncate_chars(first_output, MAX_REPAIR_INPUT_CHARS)
    )
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
