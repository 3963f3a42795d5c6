//! # Create Command Implementation
//!
//! Compiles the configuration sources and renders the environment directory:
//! inventory, playbooks, roles, tasklists, plugins and the launcher script.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use nsbl::output::{OutputConfig, Status};
use nsbl::phases::orchestrator;
use nsbl::phases::write::AnsibleGalaxy;
use nsbl::suggestions;

use super::{CompileArgs, RenderArgs};

/// Render an environment directory
#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    pub compile: CompileArgs,

    /// Directory the environment is rendered into
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    #[command(flatten)]
    pub render: RenderArgs,
}

/// Execute the `create` command.
pub fn execute(args: CreateArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let spinner = spinner()?;

    spinner.set_message("Compiling");
    let model = match args.compile.compile() {
        Ok(model) => model,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };

    spinner.set_message("Rendering");
    let options = args.render.options(&args.output);
    let written = orchestrator::render(&model, &options, &AnsibleGalaxy);
    spinner.finish_and_clear();
    let written = written.map_err(|e| suggestions::explain(e, None))?;

    println!(
        "{}",
        out.status(
            Status::Success,
            format!(
                "Rendered {} environment(s) into {}",
                model.environments.len(),
                out.name(written.display().to_string())
            )
        )
    );
    if !model.external_roles().is_empty() && !options.install_external_roles {
        println!(
            "{}",
            out.status(
                Status::Warning,
                "External roles were not installed; run ansible-galaxy with roles/external/roles_requirements.yml"
            )
        );
    }
    Ok(())
}

/// Status spinner on stderr; hidden when stderr is not a terminal.
fn spinner() -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}...")?);
    spinner.enable_steady_tick(Duration::from_millis(120));
    Ok(spinner)
}
