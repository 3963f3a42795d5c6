//! Task augmentation: alias templates and the uppercase rewrite.

use serde_yaml::{Mapping, Value};

use super::Processor;
use crate::aliases::TaskAliasIndex;
use crate::error::{Error, Result};
use crate::merge::{get_str, is_all_uppercase, key, merged, section_mut};

/// Completes flattened task records.
///
/// For every record:
/// 1. if `task.name` is a known alias, the alias template is laid underneath
///    the record; the template's `task.name` replaces the alias key;
/// 2. an entirely uppercase name is lowercased, `become: true` is set and the
///    original name is kept as `desc` unless one is given;
/// 3. `task-name` defaults to the name and `vars` to an empty mapping.
#[derive(Debug, Clone)]
pub struct AugmentingTask<'a> {
    aliases: &'a TaskAliasIndex,
    origin: String,
}

impl<'a> AugmentingTask<'a> {
    pub fn new(aliases: &'a TaskAliasIndex) -> Self {
        Self {
            aliases,
            origin: "<inline>".to_string(),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Augments a single record.
    pub fn augment(&self, record: &Value) -> Result<Value> {
        let name = record
            .get("task")
            .and_then(|task| task.get("name"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::malformed(self.origin.clone(), "task without a 'name'"))?;

        let mut record = match self.aliases.get(name) {
            Some(template) => {
                let mut user = record.clone();
                if let Some(task) = user.get_mut("task").and_then(Value::as_mapping_mut) {
                    task.remove("name");
                }
                merged(template, &user)
            }
            None => record.clone(),
        };

        let map = record
            .as_mapping_mut()
            .ok_or_else(|| Error::malformed(self.origin.clone(), "task record must be a mapping"))?;
        self.ensure_vars(map)?;

        let task = section_mut(map, "task")
            .ok_or_else(|| Error::malformed(self.origin.clone(), "'task' must be a mapping"))?;
        let name = get_str(task, "name")
            .ok_or_else(|| Error::malformed(self.origin.clone(), "task without a 'name'"))?
            .to_string();

        let name = if is_all_uppercase(&name) {
            let lowered = name.to_lowercase();
            task.insert(key("name"), Value::from(lowered.as_str()));
            task.insert(key("become"), Value::Bool(true));
            if !task.contains_key("desc") {
                task.insert(key("desc"), Value::from(name));
            }
            lowered
        } else {
            name
        };

        if !task.contains_key("task-name") {
            task.insert(key("task-name"), Value::from(name));
        }
        Ok(record)
    }

    fn ensure_vars(&self, map: &mut Mapping) -> Result<()> {
        match map.get("vars") {
            None | Some(Value::Null) => {
                map.insert(key("vars"), Value::Mapping(Mapping::new()));
                Ok(())
            }
            Some(Value::Mapping(_)) => Ok(()),
            Some(_) => Err(Error::malformed(self.origin.clone(), "'vars' must be a mapping")),
        }
    }
}

impl Processor for AugmentingTask<'_> {
    type Input = Value;
    type Output = Value;

    fn process(&mut self, item: Value) -> Result<Vec<Value>> {
        Ok(vec![self.augment(&item)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    fn aliases(s: &str) -> TaskAliasIndex {
        let mut index = TaskAliasIndex::new();
        index.insert_document(Path::new("aliases.yml"), &yaml(s)).unwrap();
        index.add_uppercase_aliases().unwrap();
        index
    }

    #[test]
    fn test_plain_record_gets_task_name_and_vars() {
        let index = TaskAliasIndex::new();
        let result = AugmentingTask::new(&index)
            .augment(&yaml("task: {name: apt}"))
            .unwrap();
        assert_eq!(result, yaml("task: {name: apt, task-name: apt}\nvars: {}"));
    }

    #[test]
    fn test_uppercase_rewrite() {
        let index = TaskAliasIndex::new();
        let result = AugmentingTask::new(&index)
            .augment(&yaml("task: {name: APT}\nvars: {name: zile}"))
            .unwrap();
        assert_eq!(
            result,
            yaml("task: {name: apt, become: true, desc: APT, task-name: apt}\nvars: {name: zile}")
        );
    }

    #[test]
    fn test_uppercase_rewrite_keeps_existing_desc() {
        let index = TaskAliasIndex::new();
        let result = AugmentingTask::new(&index)
            .augment(&yaml("task: {name: APT, desc: install packages}"))
            .unwrap();
        assert_eq!(result["task"]["desc"], Value::from("install packages"));
    }

    #[test]
    fn test_alias_template_lies_under_user_values() {
        let index = aliases(
            "install-java:\n  task: {name: ansiblebit.oracle-java, become: true}\n  vars: {version: 7, accept: true}",
        );
        let result = AugmentingTask::new(&index)
            .augment(&yaml("task: {name: install-java}\nvars: {version: 8}"))
            .unwrap();
        assert_eq!(
            result,
            yaml(
                "task: {name: ansiblebit.oracle-java, become: true, task-name: ansiblebit.oracle-java}\nvars: {version: 8, accept: true}"
            )
        );
    }

    #[test]
    fn test_uppercase_alias_twin() {
        let index = aliases("apt: {}");
        let result = AugmentingTask::new(&index)
            .augment(&yaml("task: {name: APT}"))
            .unwrap();
        assert_eq!(
            result,
            yaml("task: {name: apt, become: true, desc: APT, task-name: apt}\nvars: {}")
        );
    }

    #[test]
    fn test_missing_name_is_malformed() {
        let index = TaskAliasIndex::new();
        let result = AugmentingTask::new(&index).augment(&yaml("task: {become: true}"));
        assert!(matches!(result, Err(Error::MalformedDocument { .. })));
    }

    #[test]
    fn test_non_mapping_vars_is_malformed() {
        let index = TaskAliasIndex::new();
        let result = AugmentingTask::new(&index).augment(&yaml("task: {name: apt}\nvars: [1]"));
        assert!(matches!(result, Err(Error::MalformedDocument { .. })));
    }
}
