//! Error types shared across the engine
//!
//! `EngineError` covers the engine's own failure modes; backend failures
//! arrive wrapped from [`crate::llm::LlmError`]. Cancellation is a benign
//! error everywhere: callers check [`EngineError::is_cancelled`] and exit
//! quietly instead of reporting it.

use thiserror::Error;

use crate::llm::LlmError;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur in the engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration loading or validation failure
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backup document could not be parsed or applied
    #[error("Invalid backup: {0}")]
    InvalidBackup(String),

    /// A message id did not resolve in the log
    #[error("Unknown message: {0}")]
    UnknownMessage(String),

    /// A bot slot id did not resolve
    #[error("Unknown bot: {0}")]
    UnknownBot(String),

    /// A template uid did not resolve in the bank
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    /// Generation backend failure
    #[error(transparent)]
    Provider(#[from] LlmError),

    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// True when the underlying failure is a superseded-request cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Provider(e) if e.is_cancelled())
    }
}
