//! Equelle code generator: compiles a checked program to C++.
//!
//! # Architecture
//!
//! Both generators are [`AstVisitor`](equelle_types::visit::AstVisitor)s
//! driven by [`walk`](equelle_types::visit::walk). They read the typed tree
//! together with the [`SymbolTable`](equelle_sema::SymbolTable) it was
//! checked against; nothing here re-checks types.
//!
//! ## CPU backend
//! [`emit_cpu`] produces a complete C++ program for the serial CPU runtime:
//! - `main` builds an `equelle::EquelleRuntimeCPU` from the command-line
//!   parameters and calls `equelleGeneratedCode(er)`
//! - every Equelle statement becomes one C++ statement in that function
//! - built-ins (names starting with an uppercase letter) are methods of the
//!   runtime object: `Divergence(f)` → `er.divergence(f)`
//! - user functions become `std::function` closures, once on plain values
//!   and once on automatic-differentiation values (`ADname`)
//! - stencil statements run a lambda over an `equelle::CartesianGrid`
//!
//! ## IO report
//! [`IoReport`] lists the tagged inputs a run needs and the outputs it
//! writes.

pub mod cpu;
pub mod error;
pub mod io_report;
pub mod skeleton;

pub use cpu::{cpp_type, emit_cpu, runtime_name, CpuEmitter, EmitMode};
pub use error::{CodegenError, CodegenResult};
pub use io_report::{IoEntry, IoReport};
