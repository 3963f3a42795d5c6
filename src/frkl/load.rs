//! Loading stages: reference string -> raw text -> parsed document.

use log::debug;
use serde_yaml::Value;

use super::Processor;
use crate::error::Result;
use crate::resolve::{load_text, parse_yaml, Abbreviations, Fetcher, Location};

/// Text loaded from a reference, together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub origin: String,
    pub content: String,
}

/// A parsed YAML document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub origin: String,
    pub value: Value,
}

impl Document {
    pub fn new(origin: impl Into<String>, value: Value) -> Self {
        Self {
            origin: origin.into(),
            value,
        }
    }
}

/// Expands abbreviated references; everything else passes unchanged.
#[derive(Debug, Clone)]
pub struct UrlAbbrev<'a> {
    abbreviations: &'a Abbreviations,
}

impl<'a> UrlAbbrev<'a> {
    pub fn new(abbreviations: &'a Abbreviations) -> Self {
        Self { abbreviations }
    }
}

impl Processor for UrlAbbrev<'_> {
    type Input = String;
    type Output = String;

    fn process(&mut self, item: String) -> Result<Vec<String>> {
        let expanded = self.abbreviations.expand(&item)?;
        if expanded != item {
            debug!("Expanded '{}' to '{}'", item, expanded);
        }
        Ok(vec![expanded])
    }
}

/// Loads the text behind a local path or a remote URL.
pub struct EnsureUrl<'a> {
    fetcher: &'a dyn Fetcher,
    allow_remote: bool,
}

impl<'a> EnsureUrl<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, allow_remote: bool) -> Self {
        Self {
            fetcher,
            allow_remote,
        }
    }
}

impl Processor for EnsureUrl<'_> {
    type Input = String;
    type Output = RawDocument;

    fn process(&mut self, item: String) -> Result<Vec<RawDocument>> {
        let location = Location::of(&item);
        let content = load_text(&location, self.fetcher, self.allow_remote)?;
        Ok(vec![RawDocument {
            origin: item,
            content,
        }])
    }
}

/// Parses raw text as YAML.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnsureYaml;

impl Processor for EnsureYaml {
    type Input = RawDocument;
    type Output = Document;

    fn process(&mut self, item: RawDocument) -> Result<Vec<Document>> {
        let value = parse_yaml(&item.origin, &item.content)?;
        Ok(vec![Document::new(item.origin, value)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::frkl::{run, ProcessorExt};
    use crate::resolve::testing::StaticFetcher;
    use tempfile::TempDir;

    #[test]
    fn test_load_chain_reads_local_and_remote() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("env.yml");
        std::fs::write(&local, "- apt").unwrap();

        let fetcher = StaticFetcher::default().with(
            "https://raw.githubusercontent.com/user/repo/master/tasks.yml",
            "- git",
        );
        let abbreviations = Abbreviations::default();
        let mut chain = UrlAbbrev::new(&abbreviations)
            .then(EnsureUrl::new(&fetcher, true))
            .then(EnsureYaml);

        let docs = run(
            &mut chain,
            vec![
                local.display().to_string(),
                "gh:user/repo/tasks.yml".to_string(),
            ],
        )
        .unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].value, serde_yaml::from_str::<Value>("- apt").unwrap());
        assert_eq!(
            docs[1].origin,
            "https://raw.githubusercontent.com/user/repo/master/tasks.yml"
        );
    }

    #[test]
    fn test_remote_reference_denied_without_permission() {
        let fetcher = StaticFetcher::default();
        let mut stage = EnsureUrl::new(&fetcher, false);
        let result = stage.process("https://example.com/env.yml".to_string());
        assert!(matches!(result, Err(Error::RemoteFetchDenied { .. })));
    }

    #[test]
    fn test_missing_local_file_is_io_error() {
        let fetcher = StaticFetcher::default();
        let mut stage = EnsureUrl::new(&fetcher, false);
        let result = stage.process("/nonexistent/nsbl/env.yml".to_string());
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_bad_yaml_is_malformed_document() {
        let result = EnsureYaml.process(RawDocument {
            origin: "inline".to_string(),
            content: "a: [b".to_string(),
        });
        assert!(matches!(result, Err(Error::MalformedDocument { .. })));
    }
}
