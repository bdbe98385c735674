//! Custom error types for EVANA
//!
//! Provides a unified error handling system across all modules.

use thiserror::Error;

/// Main error type for EVANA operations
#[derive(Error, Debug)]
pub enum EvanaError {
    /// Ollama connection or API errors
    #[error("Ollama error: {0}")]
    Ollama(String),

    /// Hosted (OpenAI-compatible) API errors
    #[error("Hosted model API error: {0}")]
    Hosted(String),

    /// Backend could not be reached at all
    #[error("Cannot reach {backend} at {url}. Is it running?")]
    BackendUnreachable { backend: String, url: String },

    /// Model not available
    #[error("Model '{0}' is not available on the selected backend")]
    ModelNotFound(String),

    /// Tool execution errors
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Checkpoint load/save errors
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Speech front-end errors that the caller chose to treat as fatal
    #[error("Speech error: {0}")]
    Speech(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for EVANA operations
pub type Result<T> = std::result::Result<T, EvanaError>;

impl EvanaError {
    /// Create an Ollama error
    pub fn ollama(msg: impl Into<String>) -> Self {
        Self::Ollama(msg.into())
    }

    /// Create a hosted API error
    pub fn hosted(msg: impl Into<String>) -> Self {
        Self::Hosted(msg.into())
    }

    /// Create a tool execution error
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::ToolExecution(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a checkpoint error
    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::Checkpoint(msg.into())
    }

    pub fn unreachable(backend: impl Into<String>, url: impl Into<String>) -> Self {
        Self::BackendUnreachable {
            backend: backend.into(),
            url: url.into(),
        }
    }
}
