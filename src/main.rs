//! # nsbl CLI
//!
//! Binary entry point for the `nsbl` command-line tool.
//!
//! It parses the command line, runs the selected command and turns the
//! outcome into an exit code:
//! - `0` on success,
//! - the executor's own exit code when a run fails,
//! - `11` when a run is interrupted,
//! - `1` for every other error.
//!
//! The compiler itself lives in the `nsbl` library crate.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use nsbl::defaults::INTERRUPTED_EXIT_CODE;
use nsbl::error::Error;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(u8::try_from(exit_code(&err)).unwrap_or(1))
        }
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<Error>() {
        Some(Error::Interrupted) => INTERRUPTED_EXIT_CODE,
        Some(Error::ExecutorFailure { code }) if (1..=255).contains(code) => *code,
        _ => 1,
    }
}
