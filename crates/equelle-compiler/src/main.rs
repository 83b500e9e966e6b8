use std::process::ExitCode;

use clap::Parser;
use equelle_compiler::cli::{describe_failure, run, Cli};
use tracing::error;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(file = ?cli.input, "compilation failed");
            eprintln!("{}", describe_failure(&e, cli.format));
            ExitCode::FAILURE
        }
    }
}
