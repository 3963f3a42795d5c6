//! # Task Aliases
//!
//! A task alias binds a short name to a task template. Alias files are YAML
//! mappings of `alias: template`; every template is a task record (a `task`
//! section plus `vars`) that the augmenting stage lays underneath the user's
//! own record.
//!
//! Directories on the alias path are searched recursively for files named
//! `task-aliases.yml`; files given directly are loaded whatever their name.
//! After loading, every alias `a` gets an uppercase twin `A` whose template
//! also requests privilege escalation, unless `A` is bound explicitly.
//! Aliases differing only in case (`apt`, `Apt`) share a twin; their
//! templates must then agree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde_yaml::{Mapping, Value};
use walkdir::WalkDir;

use crate::defaults::{is_excluded_dir, TASK_ALIASES_FILENAME};
use crate::error::{Error, Result};
use crate::merge::{get_str, key, section_mut};
use crate::resolve::load_yaml_file;

/// Alias name -> normalized task template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskAliasIndex {
    aliases: BTreeMap<String, Value>,
    /// File each alias was first bound in.
    origins: BTreeMap<String, PathBuf>,
}

impl TaskAliasIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every alias file reachable from `paths` and adds the uppercase
    /// twins.
    pub fn load(paths: &[PathBuf]) -> Result<Self> {
        let mut index = Self::new();
        for path in paths {
            for file in alias_files(path) {
                let document = load_yaml_file(&file)?;
                index.insert_document(&file, &document)?;
            }
        }
        index.add_uppercase_aliases()?;
        debug!("Loaded {} task aliases", index.len());
        Ok(index)
    }

    /// Adds every alias of one parsed alias file.
    pub fn insert_document(&mut self, file: &Path, document: &Value) -> Result<()> {
        let entries = match document {
            Value::Null => return Ok(()),
            Value::Mapping(entries) => entries,
            _ => {
                return Err(Error::malformed(
                    file.display().to_string(),
                    "alias file must be a mapping of alias name to task template",
                ))
            }
        };

        for (alias, template) in entries {
            let alias = alias.as_str().ok_or_else(|| {
                Error::malformed(file.display().to_string(), "alias names must be strings")
            })?;
            let template = normalize_template(alias, template).ok_or_else(|| {
                Error::malformed(
                    file.display().to_string(),
                    format!("template of alias '{}' must be a mapping", alias),
                )
            })?;
            self.bind(alias, template, file)?;
        }
        Ok(())
    }

    fn bind(&mut self, alias: &str, template: Value, file: &Path) -> Result<()> {
        match self.aliases.get(alias) {
            Some(existing) if *existing != template => Err(Error::DuplicateAlias {
                alias: alias.to_string(),
                file: file.to_path_buf(),
            }),
            Some(_) => Ok(()),
            None => {
                self.aliases.insert(alias.to_string(), template);
                self.origins.insert(alias.to_string(), file.to_path_buf());
                Ok(())
            }
        }
    }

    /// Adds `UPPER(a)` for every alias `a` that does not bind it already.
    ///
    /// Two aliases with the same uppercase form but different templates
    /// are an [`Error::DuplicateAlias`].
    pub fn add_uppercase_aliases(&mut self) -> Result<()> {
        let mut twins: BTreeMap<String, (Value, &str)> = BTreeMap::new();
        for (alias, template) in &self.aliases {
            let upper = alias.to_uppercase();
            if upper == *alias || self.aliases.contains_key(&upper) {
                continue;
            }
            let mut twin = template.clone();
            let Some(task) = twin.as_mapping_mut().and_then(|m| section_mut(m, "task")) else {
                continue;
            };
            let name = get_str(task, "name").unwrap_or(alias).to_uppercase();
            task.insert(key("name"), Value::from(name));
            task.insert(key("become"), Value::Bool(true));

            match twins.get(&upper) {
                Some((existing, first)) if *existing != twin => {
                    warn!("Aliases '{}' and '{}' both map to '{}'", first, alias, upper);
                    return Err(Error::DuplicateAlias {
                        alias: upper,
                        file: self.origins.get(alias).cloned().unwrap_or_default(),
                    });
                }
                Some(_) => {}
                None => {
                    twins.insert(upper, (twin, alias.as_str()));
                }
            }
        }

        let twins: Vec<(String, Value)> = twins
            .into_iter()
            .map(|(upper, (twin, _))| (upper, twin))
            .collect();
        self.aliases.extend(twins);
        Ok(())
    }

    pub fn get(&self, alias: &str) -> Option<&Value> {
        self.aliases.get(alias)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.aliases.contains_key(alias)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.aliases.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Ensures the template is a mapping with a `task.name`.
fn normalize_template(alias: &str, template: &Value) -> Option<Value> {
    let mut template = match template {
        Value::Null => Value::Mapping(Mapping::new()),
        Value::Mapping(_) => template.clone(),
        _ => return None,
    };
    let task = template.as_mapping_mut().and_then(|m| section_mut(m, "task"))?;
    if get_str(task, "name").is_none() {
        task.insert(key("name"), Value::from(alias));
    }
    Some(template)
}

/// Alias files below `path`, in file-name order.
fn alias_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    if !path.is_dir() {
        warn!("Alias path {} does not exist, skipping", path.display());
        return Vec::new();
    }

    WalkDir::new(path)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !is_excluded_dir(&entry.file_name().to_string_lossy())
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable alias path entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == TASK_ALIASES_FILENAME)
        .map(|entry| entry.into_path())
        .collect()
}
