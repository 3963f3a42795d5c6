//! Default values and fixed names used across the compiler.
//!
//! Everything that the rendered environment layout or the input syntax
//! depends on by name lives here, so the renderer, the compiler stages and the
//! CLI agree on one spelling.

use std::path::PathBuf;

/// Default compiler configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILENAME: &str = "nsbl.yml";

/// File name of task-alias definition files.
pub const TASK_ALIASES_FILENAME: &str = "task-aliases.yml";

/// Name of the implicit host environment that task-only documents attach to.
pub const DEFAULT_ENV_NAME: &str = "localhost";

/// Environment variable that switches the executor into structured output.
pub const STRUCTURED_OUTPUT_ENV_VAR: &str = "NSBL_STRUCTURED_OUTPUT";

/// Exit code used when the user interrupts a run.
pub const INTERRUPTED_EXIT_CODE: i32 = 11;

/// Directory names never descended into while indexing role repositories.
pub const ROLE_SCAN_EXCLUDES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".tox",
    ".cache",
    ".idea",
    ".venv",
    "venv",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    "node_modules",
];

/// True if a directory of this name is skipped while scanning.
pub fn is_excluded_dir(name: &str) -> bool {
    ROLE_SCAN_EXCLUDES.contains(&name)
}

/// Executor keywords that are passed through at the top level of a rendered
/// task instead of being treated as module arguments.
pub const RESERVED_KEYWORDS: &[&str] = &[
    "any_errors_fatal",
    "async",
    "become",
    "become_flags",
    "become_method",
    "become_user",
    "changed_when",
    "check_mode",
    "connection",
    "debugger",
    "delay",
    "delegate_facts",
    "delegate_to",
    "diff",
    "environment",
    "failed_when",
    "ignore_errors",
    "loop",
    "loop_control",
    "name",
    "no_log",
    "notify",
    "poll",
    "port",
    "register",
    "remote_user",
    "retries",
    "run_once",
    "tags",
    "until",
    "when",
];

/// Returns true if `key` is one of [`RESERVED_KEYWORDS`].
pub fn is_reserved_keyword(key: &str) -> bool {
    RESERVED_KEYWORDS.contains(&key)
}

/// Built-in abbreviations for single remote files.
///
/// `gh:user/repo/path/to/file.yml` expands to the raw file on the default
/// branch of that repository.
pub const FILE_ABBREVIATIONS: &[(&str, &str)] = &[
    ("gh", "https://raw.githubusercontent.com/{user}/{repo}/master/{path}"),
    ("gl", "https://gitlab.com/{user}/{repo}/raw/master/{path}"),
    ("bb", "https://bitbucket.org/{user}/{repo}/raw/master/{path}"),
];

/// Built-in abbreviations for whole git repositories (role repositories).
pub const REPO_ABBREVIATIONS: &[(&str, &str)] = &[
    ("gh", "https://github.com/{user}/{repo}.git"),
    ("gl", "https://gitlab.com/{user}/{repo}.git"),
    ("bb", "https://bitbucket.org/{user}/{repo}.git"),
];

/// Returns the default cache root directory for cloned role repositories.
///
/// Uses the platform cache directory (`~/.cache/nsbl` on Linux) and falls
/// back to `.nsbl-cache` in the current directory.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".nsbl-cache"))
        .join("nsbl")
}
