//! Agent turn resolution and structured-output recovery
//!
//! Runs one user message through a tool-calling agent, consumes the turn's
//! event stream and resolves a single answer from it: a preferred tool's
//! result, JSON recovered from the model's prose, or the prose itself. Also
//! provides generation of schema-shaped JSON with one self-repair attempt.

pub mod agents;
pub mod api;
pub mod config;
pub mod error;
pub mod extract;
pub mod llm;
pub mod resolve;
pub mod runtime;
pub mod service;
pub mod session;
pub mod structured;
pub mod tools;
pub mod turn;

pub use error::CoreError;
pub use service::{PromptInput, TurnRequest, TurnResponse, TurnService};
