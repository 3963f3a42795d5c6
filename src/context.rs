//! # Compilation Context
//!
//! [`CompileContext`] carries everything a compilation needs besides the
//! input documents: the configuration, the role index, the alias index, the
//! discovered plugins, the fetcher used for remote content and the tasklist
//! id counter. It is built once and passed by reference through the phases;
//! nothing in it is process global.
//!
//! Role repository scans are cached per root in the context. A later
//! context can start from that cache ([`ContextBuilder::role_cache`]) so
//! unchanged repositories are not walked again; dropping the cache is the
//! only invalidation.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

use crate::aliases::TaskAliasIndex;
use crate::config::CompilerConfig;
use crate::error::Result;
use crate::git::{GitOperations, SystemGit};
use crate::resolve::{Abbreviations, Fetcher, HttpFetcher};
use crate::roles::{resolve_repo_roots, RoleIndex, RoleRepoCache};
use crate::tasklist::{AdditionalFile, FileKind, FileSource};

/// Owned state shared by the phases of one compilation.
pub struct CompileContext {
    config: CompilerConfig,
    abbreviations: Abbreviations,
    role_index: RoleIndex,
    role_cache: RoleRepoCache,
    aliases: TaskAliasIndex,
    plugins: Vec<AdditionalFile>,
    fetcher: Box<dyn Fetcher>,
    next_tasklist_id: u32,
}

impl std::fmt::Debug for CompileContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileContext")
            .field("config", &self.config)
            .field("roles", &self.role_index.len())
            .field("aliases", &self.aliases.len())
            .field("plugins", &self.plugins.len())
            .finish()
    }
}

impl CompileContext {
    /// Builds a context with the default HTTP fetcher and system `git`.
    pub fn new(config: CompilerConfig) -> Result<Self> {
        ContextBuilder::new(config).build()
    }

    pub fn builder(config: CompilerConfig) -> ContextBuilder {
        ContextBuilder::new(config)
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn abbreviations(&self) -> &Abbreviations {
        &self.abbreviations
    }

    pub fn role_index(&self) -> &RoleIndex {
        &self.role_index
    }

    pub fn role_cache(&self) -> &RoleRepoCache {
        &self.role_cache
    }

    /// Gives up the context, keeping its role repository scans.
    pub fn into_role_cache(self) -> RoleRepoCache {
        self.role_cache
    }

    pub fn aliases(&self) -> &TaskAliasIndex {
        &self.aliases
    }

    pub fn plugins(&self) -> &[AdditionalFile] {
        &self.plugins
    }

    pub fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    pub fn allow_remote(&self) -> bool {
        self.config.allow_remote
    }

    /// Hands out the next tasklist id.
    pub fn next_tasklist_id(&mut self) -> u32 {
        let id = self.next_tasklist_id;
        self.next_tasklist_id += 1;
        id
    }
}

/// Assembles a [`CompileContext`], optionally with substitute collaborators.
pub struct ContextBuilder {
    config: CompilerConfig,
    fetcher: Box<dyn Fetcher>,
    git: Box<dyn GitOperations>,
    role_cache: RoleRepoCache,
}

impl ContextBuilder {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            fetcher: Box::new(HttpFetcher),
            git: Box::new(SystemGit),
            role_cache: RoleRepoCache::new(),
        }
    }

    /// Starts from the repository scans of an earlier context.
    pub fn role_cache(mut self, cache: RoleRepoCache) -> Self {
        self.role_cache = cache;
        self
    }

    pub fn fetcher(mut self, fetcher: Box<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn git(mut self, git: Box<dyn GitOperations>) -> Self {
        self.git = git;
        self
    }

    /// Clones remote role repositories, then indexes roles, aliases and
    /// plugins.
    pub fn build(self) -> Result<CompileContext> {
        let config = self.config;
        let roots = resolve_repo_roots(
            &config.role_repos,
            config.allow_remote,
            self.git.as_ref(),
            &config.cache_root(),
        )?;
        let mut role_cache = self.role_cache;
        let role_index = role_cache.build_index(&roots);
        let aliases = TaskAliasIndex::load(&config.alias_paths)?;
        let plugins = discover_plugins(&config.plugin_paths);
        debug!(
            "Context ready: {} roles, {} aliases, {} plugins",
            role_index.len(),
            aliases.len(),
            plugins.len()
        );

        Ok(CompileContext {
            abbreviations: Abbreviations::with_extra(&config.url_abbreviations),
            config,
            role_index,
            role_cache,
            aliases,
            plugins,
            fetcher: self.fetcher,
            next_tasklist_id: 0,
        })
    }
}

/// Collects plugin files from `<path>/{action_plugins,callback_plugins,
/// filter_plugins,library}/`.
pub fn discover_plugins(paths: &[PathBuf]) -> Vec<AdditionalFile> {
    let mut plugins = Vec::new();
    for path in paths {
        if !path.is_dir() {
            warn!("Plugin path {} does not exist, skipping", path.display());
            continue;
        }
        for kind in FileKind::PLUGINS {
            let dir = path.join(kind.source_dir_name());
            if dir.is_dir() {
                plugins.extend(plugin_files(&dir, kind));
            }
        }
    }
    plugins
}

fn plugin_files(dir: &Path, kind: FileKind) -> Vec<AdditionalFile> {
    WalkDir::new(dir)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .map(|entry| AdditionalFile {
            kind,
            target: entry.file_name().to_string_lossy().into_owned(),
            source: FileSource::Path(entry.path().to_path_buf()),
            var_name: None,
        })
        .collect()
}
