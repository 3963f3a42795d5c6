//! # Compiler Configuration
//!
//! This module defines the settings that shape a compilation: where roles,
//! task aliases, tasklists and plugins are looked up, whether remote content
//! may be fetched, and how the rendered environment is laid out on disk.
//!
//! ## Key Components
//!
//! - **`CompilerConfig`**: The resolver context. Usually read from an
//!   `nsbl.yml` file (kebab-case keys, every key optional) and then extended by
//!   CLI flags.
//!
//! - **`RenderOptions`** / **`LauncherOptions`**: Per-render switches such as
//!   `force`, variable extraction, the timestamp suffix and the parameters the
//!   launcher script is stamped with.
//!
//! Relative paths in a configuration file are resolved against the directory
//! that contains the file, so a configuration behaves the same no matter where
//! the compiler is invoked from.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;

use crate::defaults::{self, DEFAULT_ENV_NAME};
use crate::error::{Error, Result};
use crate::inventory::EnvKind;

/// Settings that drive document expansion and tasklist compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CompilerConfig {
    /// Role repository roots: local directories or git repository URLs.
    pub role_repos: Vec<String>,
    /// Directories (searched recursively) or files holding task aliases.
    pub alias_paths: Vec<PathBuf>,
    /// Ordered search path for relative tasklist references.
    pub tasklist_paths: Vec<PathBuf>,
    /// Directories containing `action_plugins/`, `callback_plugins/`,
    /// `filter_plugins/` or `library/` subdirectories.
    pub plugin_paths: Vec<PathBuf>,
    /// Whether remote tasklists, role repositories and external roles may be
    /// used.
    pub allow_remote: bool,
    /// Type given to environments whose type cannot be inferred.
    pub default_env_type: EnvKind,
    /// Host that task-only documents are attached to.
    pub default_env_name: String,
    /// Variables added to every rendered playbook.
    pub vars: Mapping,
    /// Fold runs of module tasks into synthetic roles.
    pub dynamic_roles: bool,
    /// Extra file abbreviations (`prefix` -> URL template), on top of the
    /// built-in `gh`, `gl` and `bb`.
    pub url_abbreviations: BTreeMap<String, String>,
    /// Where remote role repositories are cloned to.
    pub cache_root: Option<PathBuf>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            role_repos: Vec::new(),
            alias_paths: Vec::new(),
            tasklist_paths: Vec::new(),
            plugin_paths: Vec::new(),
            allow_remote: false,
            default_env_type: EnvKind::Group,
            default_env_name: DEFAULT_ENV_NAME.to_string(),
            vars: Mapping::new(),
            dynamic_roles: false,
            url_abbreviations: BTreeMap::new(),
            cache_root: None,
        }
    }
}

impl CompilerConfig {
    /// Parses a configuration from YAML text. An empty document yields the
    /// defaults.
    pub fn parse(yaml_content: &str) -> Result<Self> {
        if yaml_content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml_content)
            .map_err(|e| Error::malformed("compiler configuration", e.to_string()))
    }

    /// Reads a configuration file and resolves its relative paths against the
    /// file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&content).map_err(|e| match e {
            Error::MalformedDocument { message, .. } => {
                Error::malformed(path.display().to_string(), message)
            }
            other => other,
        })?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        Ok(config)
    }

    /// Makes every relative local path absolute with respect to `base`.
    pub fn rebase(&mut self, base: &Path) {
        let join = |p: &PathBuf| {
            if p.is_relative() {
                base.join(p)
            } else {
                p.clone()
            }
        };
        self.alias_paths = self.alias_paths.iter().map(join).collect();
        self.tasklist_paths = self.tasklist_paths.iter().map(join).collect();
        self.plugin_paths = self.plugin_paths.iter().map(join).collect();
        self.cache_root = self.cache_root.as_ref().map(join);
        self.role_repos = self
            .role_repos
            .iter()
            .map(|repo| {
                if crate::resolve::is_remote_repo(repo) || Path::new(repo).is_absolute() {
                    repo.clone()
                } else {
                    base.join(repo).display().to_string()
                }
            })
            .collect();
    }

    /// Cache root for cloned role repositories.
    pub fn cache_root(&self) -> PathBuf {
        self.cache_root
            .clone()
            .unwrap_or_else(defaults::default_cache_root)
    }
}

/// Parameters the launcher script is stamped with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LauncherOptions {
    /// Number of `-v` flags passed to the executor.
    pub verbosity: u8,
    /// Prompt for the privilege-escalation password by default.
    pub ask_become_pass: bool,
    /// Prepended to `PATH` before the executor is started.
    pub extra_path: Option<String>,
}

/// Options that control how a compiled model is written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Directory the environment is rendered into.
    pub target: PathBuf,
    /// Replace an existing target.
    pub force: bool,
    /// Write variables into `group_vars/` and `host_vars/`.
    pub extract_vars: bool,
    /// Append a `_%Y%m%d_%H%M%S` suffix to the target directory.
    pub add_timestamp: bool,
    /// With `add_timestamp`, make `target` a symlink to the fresh directory.
    pub add_symlink: bool,
    /// Run the role downloader for external roles after rendering.
    pub install_external_roles: bool,
    /// Launcher script parameters.
    pub launcher: LauncherOptions,
}

impl RenderOptions {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            force: false,
            extract_vars: false,
            add_timestamp: false,
            add_symlink: false,
            install_external_roles: true,
            launcher: LauncherOptions::default(),
        }
    }
}
