//! Burrow CLI - builds native projects and their dependency graphs

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use burrow::util::diagnostic::{emit, Diagnostic};
use burrow::BuildError;

mod cli;
mod run;

use cli::Cli;

fn main() {
    if let Err(e) = run() {
        match e.downcast_ref::<BuildError>() {
            Some(build_error) => {
                let diag = Diagnostic {
                    message: format!("{:#}", e),
                    ..build_error.to_diagnostic()
                };
                emit(&diag, std::io::stderr().is_terminal());
            }
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("burrow=debug")
        } else {
            EnvFilter::new("burrow=info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    run::execute(cli.command.verb(), cli.command.args())
}
