//! Codegen error types.

use thiserror::Error;

/// Errors that can occur while emitting target code.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// A construct the CPU runtime has no counterpart for.
    #[error("unsupported feature: {0}")]
    Unsupported(String),

    /// An internal consistency check failed.
    #[error("internal codegen error: {0}")]
    Internal(String),

    /// A name or entity set could not be resolved in the symbol table.
    #[error("unresolved symbol: {0}")]
    UnresolvedSymbol(String),

    /// The IO report could not be serialized.
    #[error("report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Codegen result type alias.
pub type CodegenResult<T> = Result<T, CodegenError>;
