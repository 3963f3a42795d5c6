//! # CLI Command Implementations
//!
//! One module per subcommand of the `nsbl` tool. Each module has an `Args`
//! struct derived with `clap` and an `execute` function that calls into the
//! `nsbl` library.
//!
//! The flags every compiling command shares live here: [`CompileArgs`]
//! (where configuration comes from) and [`RenderArgs`] (how the environment
//! is written).

pub mod completions;
pub mod create;
pub mod execute;
pub mod list;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use log::debug;

use nsbl::config::{CompilerConfig, LauncherOptions, RenderOptions};
use nsbl::context::CompileContext;
use nsbl::defaults::DEFAULT_CONFIG_FILENAME;
use nsbl::inventory::EnvKind;
use nsbl::phases::{orchestrator, CompiledModel};
use nsbl::suggestions;

/// Configuration sources and resolver settings.
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Configuration sources: files, URLs or abbreviations such as 'gh:user/repo/env.yml'
    #[arg(required = true, value_name = "SOURCE")]
    pub sources: Vec<String>,

    /// Compiler configuration file (defaults to ./nsbl.yml when present)
    #[arg(long, value_name = "FILE", env = "NSBL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Role repository: a directory or a git URL (repeatable)
    #[arg(short = 'r', long = "role-repo", value_name = "REPO")]
    pub role_repos: Vec<String>,

    /// Task alias file or directory (repeatable)
    #[arg(long = "alias-path", value_name = "PATH")]
    pub alias_paths: Vec<PathBuf>,

    /// Directory searched for included tasklists (repeatable)
    #[arg(long = "tasklist-path", value_name = "DIR")]
    pub tasklist_paths: Vec<PathBuf>,

    /// Directory holding action/callback/filter plugins or library modules (repeatable)
    #[arg(long = "plugin-path", value_name = "DIR")]
    pub plugin_paths: Vec<PathBuf>,

    /// Allow remote tasklists, role repositories and external roles
    #[arg(long)]
    pub allow_remote: bool,

    /// Fold runs of module tasks into generated roles
    #[arg(long)]
    pub dynamic_roles: bool,

    /// Host that plain task lists are attached to
    #[arg(long, value_name = "NAME")]
    pub default_env: Option<String>,

    /// Type of environments whose type cannot be inferred (host or group)
    #[arg(long, value_name = "TYPE")]
    pub default_env_type: Option<EnvKind>,

    /// Where remote role repositories are cloned to
    #[arg(long, value_name = "DIR", env = "NSBL_CACHE")]
    pub cache_root: Option<PathBuf>,
}

impl CompileArgs {
    /// Reads the configuration file (if any) and layers the flags on top.
    pub fn load_config(&self) -> Result<CompilerConfig> {
        let mut config = match &self.config {
            Some(path) if !path.is_file() => return Err(suggestions::config_not_found(path)),
            Some(path) => CompilerConfig::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILENAME).is_file() => {
                debug!("Using {}", DEFAULT_CONFIG_FILENAME);
                CompilerConfig::from_file(DEFAULT_CONFIG_FILENAME)?
            }
            None => CompilerConfig::default(),
        };

        config.role_repos.extend(self.role_repos.iter().cloned());
        config.alias_paths.extend(self.alias_paths.iter().cloned());
        config.tasklist_paths.extend(self.tasklist_paths.iter().cloned());
        config.plugin_paths.extend(self.plugin_paths.iter().cloned());
        config.allow_remote |= self.allow_remote;
        config.dynamic_roles |= self.dynamic_roles;
        if let Some(name) = &self.default_env {
            config.default_env_name = name.clone();
        }
        if let Some(kind) = self.default_env_type {
            config.default_env_type = kind;
        }
        if let Some(cache_root) = &self.cache_root {
            config.cache_root = Some(cache_root.clone());
        }
        Ok(config)
    }

    /// Builds the context and compiles every source.
    pub fn compile(&self) -> Result<CompiledModel> {
        if self.sources.is_empty() {
            return Err(suggestions::no_sources());
        }
        let config = self.load_config()?;
        let mut ctx = CompileContext::new(config).map_err(|e| suggestions::explain(e, None))?;
        let compiled = orchestrator::compile(&mut ctx, &self.sources);
        compiled.map_err(|e| suggestions::explain(e, Some(&ctx)))
    }
}

/// How the compiled environment is written.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Replace an existing target directory
    #[arg(short, long)]
    pub force: bool,

    /// Write variables to group_vars/ and host_vars/ instead of the inventory file
    #[arg(long)]
    pub extract_vars: bool,

    /// Append a timestamp to the target directory name
    #[arg(long)]
    pub timestamp: bool,

    /// With --timestamp, make the requested path a symlink to the new directory
    #[arg(long, requires = "timestamp")]
    pub symlink: bool,

    /// Do not install external roles after rendering
    #[arg(long)]
    pub no_role_install: bool,

    /// Executor verbosity; repeat for more (-vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Make the launcher prompt for the privilege-escalation password
    #[arg(long)]
    pub ask_become_pass: bool,

    /// Prepended to PATH before the executor is started
    #[arg(long, value_name = "PATH")]
    pub extra_path: Option<String>,
}

impl RenderArgs {
    pub fn options(&self, target: &Path) -> RenderOptions {
        RenderOptions {
            force: self.force,
            extract_vars: self.extract_vars,
            add_timestamp: self.timestamp,
            add_symlink: self.symlink,
            install_external_roles: !self.no_role_install,
            launcher: LauncherOptions {
                verbosity: self.verbose,
                ask_become_pass: self.ask_become_pass,
                extra_path: self.extra_path.clone(),
            },
            ..RenderOptions::new(target)
        }
    }
}
