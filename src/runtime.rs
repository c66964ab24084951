//! Agent runtime abstraction
//!
//! A runtime owns an agent's conversation: it creates sessions and turns one
//! user message into a stream of [`Event`]s. The core only consumes that
//! stream; it never looks inside a runtime.

mod runner;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use runner::{InMemoryRunner, RunnerConfig, RunnerFactory};
pub use traits::*;

use crate::llm::LlmError;
use crate::tools::ToolError;
use crate::turn::Event;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

/// Failure that ends a turn from the runtime side
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// A tool failed and the runtime chose to end the turn
    #[error(transparent)]
    Tool(#[from] ToolError),
    /// Runtime, model or network failure
    #[error(transparent)]
    Upstream(#[from] LlmError),
}

/// Event sequence of one turn
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event, RuntimeError>> + Send>>;
