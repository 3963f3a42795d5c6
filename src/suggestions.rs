//! # Error Suggestions
//!
//! Turns compiler errors into messages that also say how to fix them.
//!
//! ```rust,ignore
//! use nsbl::suggestions;
//!
//! let model = orchestrator::compile(&mut ctx, &sources)
//!     .map_err(|e| suggestions::explain(e, Some(&ctx)))?;
//! ```
//!
//! Errors without a hint are passed through unchanged, so callers can still
//! downcast them to [`Error`] (the binary does this for exit codes).

use std::path::Path;

use crate::context::CompileContext;
use crate::error::Error;

/// The configuration file given with `--config` does not exist.
pub fn config_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Compiler configuration not found: {path}\n\n\
         hint: Drop the --config flag to run without a configuration file\n\
         hint: Unset NSBL_CONFIG if it points to a stale file",
        path = path.display()
    )
}

/// A command that compiles was given no configuration sources.
pub fn no_sources() -> anyhow::Error {
    anyhow::anyhow!(
        "No configuration sources given\n\n\
         hint: Pass one or more files, URLs or abbreviations (e.g. 'gh:user/repo/env.yml')"
    )
}

/// Adds hints to `err`. `ctx` is used to suggest similar role names.
pub fn explain(err: Error, ctx: Option<&CompileContext>) -> anyhow::Error {
    match err {
        Error::UnknownRole { name } => {
            let known: Vec<&str> = ctx
                .map(|ctx| ctx.role_index().iter().map(|(role, _)| role).collect())
                .unwrap_or_default();
            let did_you_mean = find_similar(&name, &known)
                .map(|s| format!("\nhint: Did you mean '{s}'?"))
                .unwrap_or_default();
            anyhow::anyhow!(
                "Role '{name}' is not in any role repository{did_you_mean}\n\n\
                 hint: Add the directory holding it with --role-repo\n\
                 hint: Pass --allow-remote to install it with the role downloader"
            )
        }
        Error::RemoteFetchDenied { url } => anyhow::anyhow!(
            "Remote content is disabled, not fetching {url}\n\n\
             hint: Pass --allow-remote (or set 'allow-remote: true' in nsbl.yml)"
        ),
        Error::TasklistNotFound { name, searched } => {
            let searched = searched
                .iter()
                .map(|p| format!("  {}", p.display()))
                .collect::<Vec<_>>()
                .join("\n");
            anyhow::anyhow!(
                "Tasklist '{name}' not found, searched:\n{searched}\n\n\
                 hint: Add its directory with --tasklist-path"
            )
        }
        Error::TargetExists { path } => anyhow::anyhow!(
            "Target {path} already exists\n\n\
             hint: Pass --force to replace it\n\
             hint: Pass --timestamp to render into a fresh directory next to it",
            path = path.display()
        ),
        Error::CircularInclude { chain } => anyhow::anyhow!(
            "Tasklists include each other: {chain}\n\n\
             hint: Remove one of the includes to break the cycle"
        ),
        Error::DuplicateAlias { alias, file } => anyhow::anyhow!(
            "Task alias '{alias}' is bound twice with different templates ({file})\n\n\
             hint: Rename one of them or drop one alias path",
            file = file.display()
        ),
        other => anyhow::Error::new(other),
    }
}

/// Returns the candidate closest to `input`, if it is at most two edits away.
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&candidate| (candidate, edit_distance(input, candidate)))
        .filter(|&(_, distance)| distance <= 2 && distance < input.chars().count())
        .min_by_key(|&(_, distance)| distance)
        .map(|(candidate, _)| candidate)
}

/// Levenshtein distance, two rows at a time.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        previous = current;
    }
    previous[b.len()]
}
