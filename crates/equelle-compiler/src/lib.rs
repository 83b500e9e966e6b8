//! Equelle compiler: orchestrates the full compilation pipeline.
//!
//! ```text
//! Equelle source → Lexer → Parser + semantic actions → Code generator → C++ / IO report
//! ```
//!
//! Diagnostics from every front-end stage are collected into one
//! [`CompileErrors`]. Code generation only runs on a program that produced
//! none.

pub mod cli;

use equelle_codegen::{emit_cpu, CodegenError, IoReport};
use equelle_types::{CompileErrors, EquelleError, ErrorCode, SourceFile, Span};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

pub use cli::Cli;

// ══════════════════════════════════════════════════════════════════════════════
// Options
// ══════════════════════════════════════════════════════════════════════════════

/// What the compiler produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// A C++ program for the serial CPU runtime.
    #[default]
    Cpu,
    /// The list of inputs and outputs of the program.
    Io,
}

/// How diagnostics and the IO report are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Name used in diagnostics.
    pub file_name: String,
    pub backend: Backend,
    pub format: OutputFormat,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            file_name: "<stdin>".to_string(),
            backend: Backend::default(),
            format: OutputFormat::default(),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Errors and results
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum CompileError {
    /// The program was rejected; the collection holds every diagnostic.
    #[error("{} error(s) found", .0.total_errors)]
    Diagnostics(CompileErrors),

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error("diagnostic serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a compilation in a serializable form for tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileResult {
    pub success: bool,
    /// Generated text when successful.
    pub output: Option<String>,
    pub errors: CompileErrors,
}

// ══════════════════════════════════════════════════════════════════════════════
// Pipeline
// ══════════════════════════════════════════════════════════════════════════════

/// Check a source file without generating code.
#[instrument(skip(source), fields(bytes = source.len()))]
pub fn type_check(source: &str, file_name: &str) -> CompileErrors {
    let sf = SourceFile::new(file_name, source);
    let result = equelle_parser::parse(&sf);
    debug!(errors = result.errors.total_errors, "checked");
    result.errors
}

/// Compile a source file with the given options.
#[instrument(skip(source, options), fields(file = %options.file_name, backend = ?options.backend))]
pub fn compile(source: &str, options: &CompileOptions) -> Result<String, CompileError> {
    let sf = SourceFile::new(&options.file_name, source);
    let result = equelle_parser::parse(&sf);
    let program = match result.program {
        Some(program) if !result.errors.has_errors() => program,
        _ => return Err(CompileError::Diagnostics(result.errors)),
    };

    let output = match options.backend {
        Backend::Cpu => emit_cpu(&program, &result.symbols)?,
        Backend::Io => {
            let report = IoReport::collect(&program, &result.symbols)?;
            match options.format {
                OutputFormat::Text => report.to_string(),
                OutputFormat::Json => report.to_json()?,
            }
        }
    };
    info!(bytes = output.len(), "compiled");
    Ok(output)
}

/// Compile and fold every failure into a [`CompileResult`].
pub fn compile_to_result(source: &str, options: &CompileOptions) -> CompileResult {
    match compile(source, options) {
        Ok(output) => CompileResult {
            success: true,
            output: Some(output),
            errors: CompileErrors::empty(),
        },
        Err(CompileError::Diagnostics(errors)) => CompileResult {
            success: false,
            output: None,
            errors,
        },
        Err(other) => {
            let mut errors = CompileErrors::empty();
            errors.push_error(EquelleError::new(
                &options.file_name,
                ErrorCode::INTERNAL,
                other.to_string(),
                Span::point(1, 1),
                "",
            ));
            CompileResult {
                success: false,
                output: None,
                errors,
            }
        }
    }
}

/// Render diagnostics in the requested format.
pub fn render_diagnostics(
    errors: &CompileErrors,
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Text => Ok(errors.to_string()),
        OutputFormat::Json => serde_json::to_string_pretty(errors),
    }
}
