//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// nsbl - Compile abbreviated inventories and task lists into runnable Ansible environments
#[derive(Parser, Debug)]
#[command(name = "nsbl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render an environment directory from configuration sources
    Create(commands::create::CreateArgs),

    /// List the groups of the compiled inventory
    ListGroups(commands::list::ListArgs),

    /// List the hosts of the compiled inventory
    ListHosts(commands::list::ListArgs),

    /// Show the compiled tasks of every environment as a tree
    ListTasks(commands::list::ListArgs),

    /// Render an environment and run it
    Execute(commands::execute::ExecuteArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        match self.command {
            Commands::Create(args) => commands::create::execute(args, &self.color),
            Commands::ListGroups(args) => commands::list::groups(args),
            Commands::ListHosts(args) => commands::list::hosts(args),
            Commands::ListTasks(args) => commands::list::tasks(args),
            Commands::Execute(args) => commands::execute::execute(args, &self.color),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

fn init_logging(level: &str) {
    let mut builder = env_logger::Builder::new();
    if std::env::var_os("RUST_LOG").is_some() {
        builder.parse_default_env();
    } else {
        builder.parse_filters(level);
    }
    builder.format_timestamp(None);
    // A second initialization (tests) keeps the first logger.
    let _ = builder.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create() {
        let cli = Cli::try_parse_from([
            "nsbl",
            "create",
            "env.yml",
            "--output",
            "out",
            "--allow-remote",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "warn");
        match cli.command {
            Commands::Create(args) => {
                assert_eq!(args.compile.sources, vec!["env.yml".to_string()]);
                assert!(args.compile.allow_remote);
                assert_eq!(args.render.verbose, 2);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_sources_are_required() {
        assert!(Cli::try_parse_from(["nsbl", "list-hosts"]).is_err());
    }
}
