//! # Execute Command Implementation
//!
//! Renders the environment and runs its launcher script, streaming the
//! executor's output. Ctrl-C stops the run; the command then fails with
//! [`Error::Interrupted`] and the binary exits with code 11. A failing run
//! keeps the executor's exit code.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use log::{debug, info};

use nsbl::error::Error;
use nsbl::executor::{self, CancelToken, RunOptions};
use nsbl::output::{OutputConfig, Status};
use nsbl::phases::orchestrator;
use nsbl::phases::write::AnsibleGalaxy;
use nsbl::suggestions;

use super::{CompileArgs, RenderArgs};

/// Render an environment and run it
#[derive(Args, Debug)]
pub struct ExecuteArgs {
    #[command(flatten)]
    pub compile: CompileArgs,

    /// Directory the environment is rendered into (a temporary directory when omitted)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Keep the temporary environment directory after the run
    #[arg(long, conflicts_with = "output")]
    pub keep: bool,

    /// Stop the run when the executor prints nothing for this many seconds
    #[arg(long, value_name = "SECS")]
    pub idle_timeout: Option<u64>,

    /// Ask the executor for structured (machine readable) output
    #[arg(long)]
    pub structured: bool,

    #[command(flatten)]
    pub render: RenderArgs,
}

/// Execute the `execute` command.
pub fn execute(args: ExecuteArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel()).context("Failed to install the Ctrl-C handler")?;

    let result = run_cancellable(&args, &out, &cancel);
    if let Err(err) = &result {
        if matches!(err.downcast_ref::<Error>(), Some(Error::Interrupted)) {
            eprintln!("{}", out.status(Status::Warning, "Run interrupted"));
        }
    }
    result
}

fn ensure_not_cancelled(cancel: &CancelToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Interrupted.into());
    }
    Ok(())
}

/// Compiles, renders and runs, stopping between the steps once `cancel`
/// fires.
fn run_cancellable(args: &ExecuteArgs, out: &OutputConfig, cancel: &CancelToken) -> Result<()> {
    ensure_not_cancelled(cancel)?;
    let model = args.compile.compile()?;
    ensure_not_cancelled(cancel)?;

    let (scratch, target) = match &args.output {
        Some(output) => (None, output.clone()),
        None => {
            let dir = tempfile::Builder::new()
                .prefix("nsbl-env-")
                .tempdir()
                .context("Failed to create a temporary environment directory")?;
            let target = dir.path().join("env");
            (Some(dir), target)
        }
    };

    let options = args.render.options(&target);
    let env_dir =
        orchestrator::render(&model, &options, &AnsibleGalaxy).map_err(|e| suggestions::explain(e, None))?;
    info!("Environment rendered into {}", env_dir.display());
    ensure_not_cancelled(cancel)?;

    let run_options = RunOptions {
        idle_timeout: args.idle_timeout.map(Duration::from_secs),
        structured_output: args.structured,
        ask_become_pass: args.render.ask_become_pass,
        ..RunOptions::default()
    };
    let result = executor::run(&env_dir, &run_options, cancel, |line| println!("{}", line));

    if let Some(dir) = scratch {
        if args.keep {
            let kept = dir.keep();
            eprintln!(
                "{}",
                out.status(Status::Info, format!("Kept environment in {}", kept.display()))
            );
        } else {
            debug!("Removing {}", dir.path().display());
        }
    }

    match result {
        Ok(()) => {
            eprintln!("{}", out.status(Status::Success, "Run finished"));
            Ok(())
        }
        Err(err @ Error::Interrupted) => Err(err.into()),
        Err(err @ Error::ExecutorFailure { .. }) => {
            eprintln!("{}", out.status(Status::Failure, err.to_string()));
            Err(err.into())
        }
        Err(err) => Err(suggestions::explain(err, None)),
    }
}
