//! Error types for the finance chat agent

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("LLM call timed out after {0}s")]
    LlmTimeout(u64),

    #[error("Tool error: {0}")]
    ToolError(String),

    #[error("Tool gateway error: {0}")]
    GatewayError(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    #[error("Run cancelled: {0}")]
    RunCancelled(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
