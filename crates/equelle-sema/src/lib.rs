//! Semantic layer of the Equelle compiler.
//!
//! [`SymbolTable`] tracks variables, functions, scopes and the lattice of
//! entity sets. [`SemanticActions`] type-checks each production as the
//! grammar driver recognizes it and builds the typed tree.

pub mod actions;
pub mod builtins;
mod error;
pub mod symbols;

pub use actions::{CollectionQualifier, LoopHeader, PendingFunction, SemanticActions};
pub use error::{SemaResult, SemanticError};
pub use symbols::{ScopeId, ScopeKind, SymbolTable};
