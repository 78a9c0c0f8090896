//! Finance Chat Agent
//!
//! A personal-finance chat backend that:
//! - Forwards user messages to an LLM configured with callable tools
//! - Executes every tool call the model requests (account analysis,
//!   web/news/finance/event search) and feeds results back
//! - Normalizes heterogeneous provider payloads into one schema
//! - Delivers the resulting trace as one JSON response or an SSE stream
//!
//! LOOP:
//! MESSAGE → LLM → tool_use? → DISPATCH → RESULTS → LLM … → ANSWER

pub mod accounts;
pub mod agent;
pub mod api;
pub mod error;
pub mod gateway;
pub mod llm;
pub mod models;
pub mod normalize;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use agent::{AgentEvent, Orchestrator};
pub use models::*;
