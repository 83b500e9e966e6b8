//! Command-line front end.
//!
//! ```text
//! equelle [INPUT] [-o OUTPUT] [--backend cpu|io] [--format text|json]
//! ```
//!
//! Reads standard input when no input file is named and writes standard
//! output when no output file is named.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing::debug;

use crate::{compile, render_diagnostics, Backend, CompileError, CompileOptions, OutputFormat};

#[derive(Parser, Debug, Clone)]
#[command(name = "equelle", version, about = "Compile Equelle simulator programs")]
pub struct Cli {
    /// Equelle source file; standard input when omitted.
    pub input: Option<PathBuf>,

    /// Output file; standard output when omitted.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Backend::Cpu)]
    pub backend: Backend,

    /// Format of diagnostics and of the IO report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl Cli {
    pub fn options(&self) -> CompileOptions {
        let file_name = match &self.input {
            Some(path) => path.display().to_string(),
            None => "<stdin>".to_string(),
        };
        CompileOptions {
            file_name,
            backend: self.backend,
            format: self.format,
        }
    }
}

fn read_source(input: Option<&PathBuf>) -> Result<String, CompileError> {
    match input {
        Some(path) => fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.display().to_string(),
            source,
        }),
        None => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .map_err(|source| CompileError::Io {
                    path: "<stdin>".to_string(),
                    source,
                })?;
            Ok(source)
        }
    }
}

fn write_output(output: Option<&PathBuf>, text: &str) -> Result<(), CompileError> {
    match output {
        Some(path) => fs::write(path, text).map_err(|source| CompileError::Io {
            path: path.display().to_string(),
            source,
        }),
        None => io::stdout()
            .write_all(text.as_bytes())
            .map_err(|source| CompileError::Io {
                path: "<stdout>".to_string(),
                source,
            }),
    }
}

/// Compile the input named on the command line and write the result.
pub fn run(cli: &Cli) -> Result<(), CompileError> {
    let options = cli.options();
    let source = read_source(cli.input.as_ref())?;
    debug!(file = %options.file_name, bytes = source.len(), "read source");
    let output = compile(&source, &options)?;
    write_output(cli.output.as_ref(), &output)
}

/// Text for a failed run, with diagnostics in the requested format.
pub fn describe_failure(error: &CompileError, format: OutputFormat) -> String {
    match error {
        CompileError::Diagnostics(errors) => match render_diagnostics(errors, format) {
            Ok(text) => text.trim_end().to_string(),
            Err(e) => format!("error: {e}"),
        },
        other => format!("error: {other}"),
    }
}
