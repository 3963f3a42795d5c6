//! # Role Repository Index
//!
//! A role repository is a directory tree containing roles. Any directory `D`
//! with a `D/meta/main.yml` file is a role named after `D`'s basename; the
//! scanner does not descend into a role once it has found one. Directories
//! such as `.git` or `node_modules` are never entered.
//!
//! Scans are cached per repository root in a [`RoleRepoCache`] owned by the
//! compilation context, so a root is walked at most once per context.
//! Remote repositories are shallow-cloned with [`crate::git`] before they
//! are scanned.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

use crate::defaults::is_excluded_dir;
use crate::error::{Error, Result};
use crate::git::{self, GitOperations};
use crate::resolve::is_remote_repo;

/// Role name -> role directory, first repository wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleIndex {
    roles: BTreeMap<String, PathBuf>,
}

impl RoleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds roles from one repository; names already present are kept.
    pub fn merge_repo(&mut self, roles: &BTreeMap<String, PathBuf>) {
        for (name, path) in roles {
            match self.roles.get(name) {
                Some(existing) if existing != path => {
                    warn!(
                        "Role '{}' at {} is shadowed by {}",
                        name,
                        path.display(),
                        existing.display()
                    );
                }
                Some(_) => {}
                None => {
                    self.roles.insert(name.clone(), path.clone());
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.roles.get(name).map(PathBuf::as_path)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.roles.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// True if `dir` holds a role.
pub fn is_role_dir(dir: &Path) -> bool {
    dir.join("meta").join("main.yml").is_file()
}

/// Walks one repository root and returns the roles it contains.
pub fn scan_role_repo(root: &Path) -> BTreeMap<String, PathBuf> {
    let mut roles = BTreeMap::new();
    if !root.is_dir() {
        warn!("Role repository {} does not exist, skipping", root.display());
        return roles;
    }

    let mut walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        if entry.depth() > 0 && is_excluded_dir(&entry.file_name().to_string_lossy()) {
            walker.skip_current_dir();
            continue;
        }
        if is_role_dir(entry.path()) {
            let name = entry.file_name().to_string_lossy().into_owned();
            match roles.get(&name) {
                Some(existing) => warn!(
                    "Duplicate role '{}' at {} (keeping {})",
                    name,
                    entry.path().display(),
                    existing.display()
                ),
                None => {
                    debug!("Found role '{}' at {}", name, entry.path().display());
                    roles.insert(name, entry.path().to_path_buf());
                }
            }
            walker.skip_current_dir();
        }
    }
    roles
}

/// Per-root cache of repository scans.
#[derive(Debug, Default)]
pub struct RoleRepoCache {
    scans: HashMap<PathBuf, BTreeMap<String, PathBuf>>,
}

impl RoleRepoCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached scan of `root`, scanning it on first use.
    pub fn get_or_scan(&mut self, root: &Path) -> &BTreeMap<String, PathBuf> {
        self.scans
            .entry(root.to_path_buf())
            .or_insert_with(|| scan_role_repo(root))
    }

    pub fn is_scanned(&self, root: &Path) -> bool {
        self.scans.contains_key(root)
    }

    /// Builds an index over `roots` in order.
    pub fn build_index(&mut self, roots: &[PathBuf]) -> RoleIndex {
        let mut index = RoleIndex::new();
        for root in roots {
            index.merge_repo(self.get_or_scan(root));
        }
        debug!("Indexed {} roles from {} repositories", index.len(), roots.len());
        index
    }
}

/// Turns configured repository references into local roots, cloning remote
/// ones into `cache_root`.
pub fn resolve_repo_roots(
    repos: &[String],
    allow_remote: bool,
    git: &dyn GitOperations,
    cache_root: &Path,
) -> Result<Vec<PathBuf>> {
    repos
        .iter()
        .map(|repo| {
            if is_remote_repo(repo) {
                if !allow_remote {
                    return Err(Error::RemoteFetchDenied { url: repo.clone() });
                }
                git::checkout(git, cache_root, repo)
            } else {
                Ok(PathBuf::from(repo))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testing::FakeGit;
    use tempfile::TempDir;

    fn make_role(root: &Path, rel: &str) {
        let meta = root.join(rel).join("meta");
        std::fs::create_dir_all(&meta).unwrap();
        std::fs::write(meta.join("main.yml"), "---\ndependencies: []\n").unwrap();
    }

    #[test]
    fn test_scan_finds_nested_roles() {
        let temp = TempDir::new().unwrap();
        make_role(temp.path(), "web");
        make_role(temp.path(), "group/ansiblebit.oracle-java");
        std::fs::create_dir_all(temp.path().join("docs")).unwrap();

        let roles = scan_role_repo(temp.path());
        let names: Vec<&String> = roles.keys().collect();
        assert_eq!(names, vec!["ansiblebit.oracle-java", "web"]);
        assert_eq!(roles["web"], temp.path().join("web"));
    }

    #[test]
    fn test_scan_does_not_descend_into_roles_or_excluded_dirs() {
        let temp = TempDir::new().unwrap();
        make_role(temp.path(), "outer");
        make_role(temp.path(), "outer/files/inner");
        make_role(temp.path(), "node_modules/hidden");

        let roles = scan_role_repo(temp.path());
        assert_eq!(roles.keys().collect::<Vec<_>>(), vec!["outer"]);
    }

    #[test]
    fn test_scan_keeps_first_duplicate() {
        let temp = TempDir::new().unwrap();
        make_role(temp.path(), "a/common");
        make_role(temp.path(), "b/common");

        let roles = scan_role_repo(temp.path());
        assert_eq!(roles["common"], temp.path().join("a/common"));
    }

    #[test]
    fn test_scan_missing_root_is_empty() {
        assert!(scan_role_repo(Path::new("/nonexistent/nsbl/roles")).is_empty());
    }

    #[test]
    fn test_index_first_repository_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        make_role(first.path(), "common");
        make_role(second.path(), "common");
        make_role(second.path(), "extra");

        let mut cache = RoleRepoCache::new();
        let index = cache.build_index(&[first.path().to_path_buf(), second.path().to_path_buf()]);
        assert_eq!(index.get("common"), Some(first.path().join("common").as_path()));
        assert!(index.contains("extra"));
        assert!(cache.is_scanned(first.path()));
    }

    #[test]
    fn test_remote_repos_need_permission() {
        let temp = TempDir::new().unwrap();
        let git = FakeGit::default();
        let repos = vec!["gh:u/roles".to_string()];
        let denied = resolve_repo_roots(&repos, false, &git, temp.path());
        assert!(matches!(denied, Err(Error::RemoteFetchDenied { .. })));

        let roots = resolve_repo_roots(&repos, true, &git, temp.path()).unwrap();
        assert_eq!(roots.len(), 1);
        assert!(roots[0].starts_with(temp.path()));
    }
}
