//! Shared types for the Equelle compiler.
//!
//! This crate defines the value-type model, the typed syntax tree and its
//! traversal, source spans, and the diagnostics shared by every stage.

mod error;
mod span;
pub mod ast;
pub mod ty;
pub mod visit;

pub use error::{CompileErrors, EquelleError, ErrorCategory, ErrorCode, MAX_ERRORS};
pub use span::{SourceFile, Span};
pub use ty::{
    BasicKind, Composite, Domain, DynamicReturn, EntitySetId, FunctionSignature, Param, ValueType,
};
