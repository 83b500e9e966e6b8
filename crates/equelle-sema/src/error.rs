use equelle_types::ErrorCode;
use thiserror::Error;

/// A rejected construct. The grammar driver attaches the location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct SemanticError {
    pub code: ErrorCode,
    pub message: String,
}

impl SemanticError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// A broken checker invariant. Never caused by user input alone.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::INTERNAL, message)
    }
}

pub type SemaResult<T> = Result<T, SemanticError>;
