//! Error types for lesson agents.

use thiserror::Error;

/// Errors that can occur during agent execution.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Content generation failed.
    #[error("Content generation failed: {0}")]
    GenerationFailed(String),

    /// A context key the agent depends on is missing.
    #[error("Agent '{agent}' requires missing context key '{key}'")]
    MissingContextKey { agent: String, key: String },

    /// A validator received input it cannot score.
    #[error("Invalid validator input: {0}")]
    InvalidInput(String),

    /// Template rendering failed.
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Creates a missing-context-key error.
    pub fn missing_key(agent: impl Into<String>, key: impl Into<String>) -> Self {
        AgentError::MissingContextKey {
            agent: agent.into(),
            key: key.into(),
        }
    }
}

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;
