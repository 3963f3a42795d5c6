//! # Path and URL Resolution
//!
//! Turns the short strings users write into concrete locations and loads
//! their content.
//!
//! - **Abbreviations**: `gh:user/repo/path.yml` style prefixes are expanded
//!   through a registry of URL templates. The built-in registry covers GitHub,
//!   GitLab and Bitbucket; the compiler configuration can add more.
//! - **Locations**: a reference is either a local path or a remote URL.
//!   Remote access goes through the [`Fetcher`] trait so that tests (and
//!   callers with special transport needs) can substitute their own.
//! - **Repositories**: role repositories have their own abbreviation table
//!   because they point at whole git repositories rather than at raw files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::debug;

use crate::defaults::{FILE_ABBREVIATIONS, REPO_ABBREVIATIONS};
use crate::error::{Error, Result};

/// Trait for retrieving remote content - allows mocking in tests
pub trait Fetcher: Send + Sync {
    /// Fetches the body of `url` as text.
    fn fetch(&self, url: &str) -> Result<String>;
}

/// The default [`Fetcher`], a blocking HTTP GET.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetcher;

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        debug!("Fetching {}", url);
        let mut response = ureq::get(url).call().map_err(|e| Error::Network {
            url: url.to_string(),
            message: format!("HTTP request failed: {}", e),
        })?;
        response
            .body_mut()
            .read_to_string()
            .map_err(|e| Error::Network {
                url: url.to_string(),
                message: format!("failed to read response: {}", e),
            })
    }
}

/// Registry of abbreviation prefix -> URL template.
///
/// Templates may use `{user}`, `{repo}` and `{path}` (the first, second and
/// remaining `/`-separated segments after the prefix) or `{rest}` (everything
/// after the prefix).
#[derive(Debug, Clone)]
pub struct Abbreviations {
    templates: BTreeMap<String, String>,
}

impl Abbreviations {
    /// The built-in file abbreviations extended by `extra` (which wins on
    /// clashes).
    pub fn with_extra(extra: &BTreeMap<String, String>) -> Self {
        let mut templates: BTreeMap<String, String> = FILE_ABBREVIATIONS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        templates.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { templates }
    }

    /// Returns the registered prefix of `reference`, if any.
    fn split<'a>(&self, reference: &'a str) -> Option<(&str, &'a str)> {
        let (prefix, rest) = reference.split_once(':')?;
        let template = self.templates.get(prefix)?;
        // "gh://..." is not an abbreviation
        if rest.starts_with("//") {
            return None;
        }
        Some((template.as_str(), rest))
    }

    /// True if `reference` starts with a registered prefix.
    pub fn is_abbreviated(&self, reference: &str) -> bool {
        self.split(reference).is_some()
    }

    /// Expands an abbreviated reference. Returns the input unchanged when it
    /// carries no registered prefix.
    pub fn expand(&self, reference: &str) -> Result<String> {
        match self.split(reference) {
            Some((template, rest)) => expand_template(template, rest).ok_or_else(|| {
                Error::malformed(
                    reference,
                    "abbreviated reference needs at least '<user>/<repo>'",
                )
            }),
            None => Ok(reference.to_string()),
        }
    }
}

impl Default for Abbreviations {
    fn default() -> Self {
        Self::with_extra(&BTreeMap::new())
    }
}

fn expand_template(template: &str, rest: &str) -> Option<String> {
    let mut segments = rest.splitn(3, '/');
    let user = segments.next().filter(|s| !s.is_empty());
    let repo = segments.next().filter(|s| !s.is_empty());
    let path = segments.next().unwrap_or("");

    let mut expanded = template.replace("{rest}", rest);
    for (placeholder, value) in [("{user}", user), ("{repo}", repo)] {
        if expanded.contains(placeholder) {
            expanded = expanded.replace(placeholder, value?);
        }
    }
    Some(expanded.replace("{path}", path))
}

/// True if `reference` is an `http(s)` URL.
pub fn is_url(reference: &str) -> bool {
    url::Url::parse(reference)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// True if `reference` looks like a git repository rather than a local
/// directory.
pub fn is_remote_repo(reference: &str) -> bool {
    reference.starts_with("git@")
        || reference.starts_with("ssh://")
        || is_url(reference)
        || REPO_ABBREVIATIONS
            .iter()
            .any(|(prefix, _)| reference.starts_with(&format!("{}:", prefix)))
}

/// Expands a repository abbreviation (`gh:user/repo`) to a clone URL.
pub fn expand_repo(reference: &str) -> Result<String> {
    for (prefix, template) in REPO_ABBREVIATIONS {
        if let Some(rest) = reference.strip_prefix(&format!("{}:", prefix)) {
            return expand_template(template, rest.trim_end_matches('/')).ok_or_else(|| {
                Error::malformed(reference, "repository abbreviation needs '<user>/<repo>'")
            });
        }
    }
    Ok(reference.to_string())
}

/// Where a reference points to once abbreviations are expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    Remote(String),
}

impl Location {
    /// Classifies an (already expanded) reference. `file://` URLs are local.
    pub fn of(reference: &str) -> Self {
        if is_url(reference) {
            return Location::Remote(reference.to_string());
        }
        match url::Url::parse(reference) {
            Ok(u) if u.scheme() == "file" => u
                .to_file_path()
                .map(Location::Local)
                .unwrap_or_else(|_| Location::Local(PathBuf::from(reference))),
            _ => Location::Local(PathBuf::from(reference)),
        }
    }

    /// Last path segment, used as the materialized file name.
    pub fn basename(&self) -> Option<String> {
        match self {
            Location::Local(path) => path.file_name().map(|n| n.to_string_lossy().into_owned()),
            Location::Remote(url) => url::Url::parse(url)
                .ok()
                .and_then(|u| u.path_segments().and_then(|s| s.last().map(|s| s.to_string())))
                .filter(|s| !s.is_empty()),
        }
    }
}

/// Reads the text behind a location. Remote reads require `allow_remote`.
pub fn load_text(location: &Location, fetcher: &dyn Fetcher, allow_remote: bool) -> Result<String> {
    match location {
        Location::Local(path) => read_local(path),
        Location::Remote(url) => {
            if !allow_remote {
                return Err(Error::RemoteFetchDenied { url: url.clone() });
            }
            fetcher.fetch(url)
        }
    }
}

fn read_local(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    String::from_utf8(bytes)
        .map_err(|_| Error::malformed(path.display().to_string(), "content is not valid UTF-8"))
}

/// Parses YAML (a superset of JSON) text, attributing failures to `origin`.
pub fn parse_yaml(origin: &str, content: &str) -> Result<serde_yaml::Value> {
    serde_yaml::from_str(content).map_err(|e| Error::malformed(origin, e.to_string()))
}

/// Loads and parses a local YAML file.
pub fn load_yaml_file(path: &Path) -> Result<serde_yaml::Value> {
    let content = read_local(path)?;
    parse_yaml(&path.display().to_string(), &content)
}
