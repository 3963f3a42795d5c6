//! Shallow cloning of remote role repositories with the system `git`.

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::resolve::expand_repo;

/// A trait that defines the interface for git operations, so that cloning
/// can be replaced in tests.
pub trait GitOperations: Send + Sync {
    /// Clones `url` (optionally at `ref_name`) into `target_dir`.
    fn clone_shallow(&self, url: &str, ref_name: Option<&str>, target_dir: &Path) -> Result<()>;
}

/// [`GitOperations`] backed by the `git` binary on `PATH`.
///
/// Using the system command picks up SSH keys, credential helpers and any
/// other authentication configured for the user.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemGit;

impl GitOperations for SystemGit {
    fn clone_shallow(&self, url: &str, ref_name: Option<&str>, target_dir: &Path) -> Result<()> {
        clone_shallow(url, ref_name, target_dir)
    }
}

/// `git clone --depth=1 [--branch <ref>] <url> <target_dir>`
pub fn clone_shallow(url: &str, ref_name: Option<&str>, target_dir: &Path) -> Result<()> {
    // git refuses to clone into a non-empty directory
    if target_dir.exists() {
        fs::remove_dir_all(target_dir)?;
    }
    if let Some(parent) = target_dir.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut command = Command::new("git");
    command.args(["clone", "--depth=1"]);
    if let Some(ref_name) = ref_name {
        command.args(["--branch", ref_name]);
    }
    let output = command
        .arg(url)
        .arg(target_dir)
        .output()
        .map_err(|e| Error::ExternalTool {
            tool: "git".to_string(),
            message: format!("failed to run git clone for {}: {}", url, e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = if stderr.contains("Authentication failed")
            || stderr.contains("Permission denied")
            || stderr.contains("Could not read from remote repository")
        {
            format!(
                "cloning {} failed: authentication failed, check your SSH keys or git credentials\n{}",
                url, stderr
            )
        } else {
            format!("cloning {} failed: {}", url, stderr.trim())
        };
        return Err(Error::ExternalTool {
            tool: "git".to_string(),
            message,
        });
    }
    Ok(())
}

/// Cache directory for a repository URL and ref.
pub fn url_to_cache_path(cache_root: &Path, url: &str, ref_name: Option<&str>) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    let url_hash = format!("{:x}", hasher.finish());

    let name = url
        .trim_end_matches('/')
        .trim_end_matches(".git")
        .rsplit(['/', ':'])
        .next()
        .unwrap_or("repo");
    match ref_name {
        Some(r) => cache_root.join(format!("{}-{}-{}", name, url_hash, r.replace('/', "-"))),
        None => cache_root.join(format!("{}-{}", name, url_hash)),
    }
}

/// Splits `repo#ref` and expands repository abbreviations.
pub fn parse_repo_reference(reference: &str) -> Result<(String, Option<String>)> {
    let (repo, ref_name) = match reference.rsplit_once('#') {
        Some((repo, r)) if !r.is_empty() => (repo, Some(r.to_string())),
        _ => (reference, None),
    };
    Ok((expand_repo(repo)?, ref_name))
}

/// Returns a local checkout of `reference`, cloning it on first use.
pub fn checkout(git: &dyn GitOperations, cache_root: &Path, reference: &str) -> Result<PathBuf> {
    let (url, ref_name) = parse_repo_reference(reference)?;
    let path = url_to_cache_path(cache_root, &url, ref_name.as_deref());
    if path.is_dir() {
        debug!("Using cached checkout of {} at {}", url, path.display());
        return Ok(path);
    }
    info!("Cloning role repository {}", url);
    git.clone_shallow(&url, ref_name.as_deref(), &path)?;
    Ok(path)
}


#[cfg(test)]
mod tests {
    use super::testing::FakeGit;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cache_path_is_stable_and_distinct() {
        let root = Path::new("/cache");
        let a = url_to_cache_path(root, "https://github.com/u/roles.git", None);
        let b = url_to_cache_path(root, "https://github.com/u/roles.git", None);
        let c = url_to_cache_path(root, "https://github.com/v/roles.git", None);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.file_name().unwrap().to_string_lossy().starts_with("roles-"));

        let tagged = url_to_cache_path(root, "https://github.com/u/roles.git", Some("feature/x"));
        assert!(tagged.to_string_lossy().ends_with("-feature-x"));
    }

    #[test]
    fn test_parse_repo_reference() {
        assert_eq!(
            parse_repo_reference("gh:u/roles#v1").unwrap(),
            ("https://github.com/u/roles.git".to_string(), Some("v1".to_string()))
        );
        assert_eq!(
            parse_repo_reference("git@github.com:u/roles.git").unwrap(),
            ("git@github.com:u/roles.git".to_string(), None)
        );
    }

    #[test]
    fn test_checkout_clones_once() {
        let temp = TempDir::new().unwrap();
        let git = FakeGit {
            roles: vec!["web".to_string()],
            ..Default::default()
        };

        let first = checkout(&git, temp.path(), "gh:u/roles").unwrap();
        let second = checkout(&git, temp.path(), "gh:u/roles").unwrap();
        assert_eq!(first, second);
        assert!(first.join("web/meta/main.yml").is_file());
        assert_eq!(git.cloned.lock().unwrap().len(), 1);
    }
}
