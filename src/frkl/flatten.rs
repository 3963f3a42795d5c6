//! The flattening stage.
//!
//! Users write environments and tasks in a compact, nested style: bare
//! strings, single-key abbreviations and groups of children sharing common
//! settings. [`Frkl`] expands these into uniform leaf records, each carrying
//! a leaf section (`meta` or `task`) and the sections other keys were moved
//! into.

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};

use super::Processor;
use crate::defaults::RESERVED_KEYWORDS;
use crate::error::{Error, Result};
use crate::merge::{get_yaml_type_name, key, merge_yaml_values};

const WILDCARD: &str = "*";

/// Describes how one kind of record is flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrklFormat {
    /// Key whose value holds nested child items.
    pub child_marker: String,
    /// Section every emitted record carries.
    pub default_leaf: String,
    /// Key inside the leaf section that a bare string becomes.
    pub default_leaf_key: String,
    /// Source key -> target section; `*` matches any other key.
    pub key_move_map: BTreeMap<String, String>,
    /// Keys kept as they are and not inherited by children.
    pub other_keys: Vec<String>,
}

impl FrklFormat {
    /// Environment records: `meta` leaf, `envs` children, free keys -> `vars`.
    pub fn environments() -> Self {
        Self {
            child_marker: "envs".to_string(),
            default_leaf: "meta".to_string(),
            default_leaf_key: "name".to_string(),
            key_move_map: BTreeMap::from([(WILDCARD.to_string(), "vars".to_string())]),
            other_keys: vec!["tasks".to_string()],
        }
    }

    /// Task records: `task` leaf, `tasks` children, executor keywords ->
    /// `task`, everything else -> `vars`.
    pub fn tasks() -> Self {
        let mut key_move_map: BTreeMap<String, String> = RESERVED_KEYWORDS
            .iter()
            .map(|k| (k.to_string(), "task".to_string()))
            .collect();
        key_move_map.insert(WILDCARD.to_string(), "vars".to_string());
        Self {
            child_marker: "tasks".to_string(),
            default_leaf: "task".to_string(),
            default_leaf_key: "name".to_string(),
            key_move_map,
            other_keys: Vec::new(),
        }
    }

    /// Keys that stay where they are.
    fn is_known(&self, name: &str) -> bool {
        name == self.default_leaf
            || name == self.child_marker
            || self.other_keys.iter().any(|k| k == name)
            || self.key_move_map.values().any(|target| target == name)
    }

    fn move_target(&self, name: &str) -> Option<&str> {
        self.key_move_map
            .get(name)
            .or_else(|| self.key_move_map.get(WILDCARD))
            .map(String::as_str)
    }

    fn leaf_from_name(&self, name: &str) -> Mapping {
        let mut leaf = Mapping::new();
        leaf.insert(key(&self.default_leaf_key), Value::from(name));
        let mut record = Mapping::new();
        record.insert(key(&self.default_leaf), Value::Mapping(leaf));
        record
    }
}

/// Flattens nested items into leaf records.
#[derive(Debug, Clone)]
pub struct Frkl {
    format: FrklFormat,
    origin: String,
}

impl Frkl {
    pub fn new(format: FrklFormat) -> Self {
        Self {
            format,
            origin: "<inline>".to_string(),
        }
    }

    /// Names the source used in error messages.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn format(&self) -> &FrklFormat {
        &self.format
    }

    /// Flattens one item (which may be a list) into leaf records.
    pub fn flatten(&self, item: &Value) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        self.flatten_into(item, &Mapping::new(), &mut out)?;
        Ok(out)
    }

    fn flatten_into(&self, item: &Value, defaults: &Mapping, out: &mut Vec<Value>) -> Result<()> {
        match item {
            Value::Null => Ok(()),
            Value::Sequence(items) => items
                .iter()
                .try_for_each(|child| self.flatten_into(child, defaults, out)),
            Value::String(name) => self.expand(self.format.leaf_from_name(name), defaults, out),
            Value::Mapping(map) => {
                let record = self.normalize(map)?;
                self.expand(record, defaults, out)
            }
            other => Err(self.error(format!(
                "expected a string or a mapping, found {}",
                get_yaml_type_name(other).to_lowercase()
            ))),
        }
    }

    /// Rewrites a mapping item into canonical sections.
    fn normalize(&self, map: &Mapping) -> Result<Mapping> {
        if map.len() == 1 {
            if let Some((Value::String(name), value)) = map.iter().next() {
                if !self.format.is_known(name) && !self.format.key_move_map.contains_key(name) {
                    return self.abbreviated(name, value);
                }
            }
        }

        let mut record = Mapping::new();
        let mut moved: Vec<(String, &str, &Value)> = Vec::new();

        for (k, v) in map {
            let name = k
                .as_str()
                .ok_or_else(|| self.error(format!("non-string key {:?}", k)))?;
            if self.format.is_known(name) {
                let value = if name == self.format.default_leaf {
                    self.leaf_section(v)?
                } else {
                    v.clone()
                };
                record.insert(key(name), value);
            } else {
                let target = self
                    .format
                    .move_target(name)
                    .ok_or_else(|| self.error(format!("unexpected key '{}'", name)))?;
                moved.push((target.to_string(), name, v));
            }
        }

        // explicit section content wins over moved keys
        for (target, name, value) in moved {
            let section = record
                .entry(key(&target))
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            if section.is_null() {
                *section = Value::Mapping(Mapping::new());
            }
            let section = section.as_mapping_mut().ok_or_else(|| {
                self.error(format!("section '{}' must be a mapping", target))
            })?;
            if !section.contains_key(name) {
                section.insert(key(name), value.clone());
            }
        }

        Ok(record)
    }

    /// `{K: V}` where `K` is not a known key.
    fn abbreviated(&self, name: &str, value: &Value) -> Result<Mapping> {
        let mut record = self.format.leaf_from_name(name);
        match value {
            Value::Null => {}
            Value::Mapping(content) => {
                let target = self.format.move_target(name).ok_or_else(|| {
                    self.error(format!("abbreviated item '{}' cannot carry values", name))
                })?;
                record.insert(key(target), Value::Mapping(content.clone()));
            }
            other => {
                return Err(self.error(format!(
                    "value of abbreviated item '{}' must be a mapping, found {}",
                    name,
                    get_yaml_type_name(other).to_lowercase()
                )))
            }
        }
        Ok(record)
    }

    fn leaf_section(&self, value: &Value) -> Result<Value> {
        match value {
            Value::String(_) => {
                let mut leaf = Mapping::new();
                leaf.insert(key(&self.format.default_leaf_key), value.clone());
                Ok(Value::Mapping(leaf))
            }
            Value::Null => Ok(Value::Mapping(Mapping::new())),
            Value::Mapping(_) => Ok(value.clone()),
            other => Err(self.error(format!(
                "'{}' must be a mapping, found {}",
                self.format.default_leaf,
                get_yaml_type_name(other).to_lowercase()
            ))),
        }
    }

    /// Merges `record` over `defaults` and either emits it or descends into
    /// its children.
    fn expand(&self, record: Mapping, defaults: &Mapping, out: &mut Vec<Value>) -> Result<()> {
        let mut merged = Value::Mapping(defaults.clone());
        merge_yaml_values(&mut merged, &Value::Mapping(record));
        let Value::Mapping(mut merged) = merged else {
            return Err(self.error("record did not merge into a mapping"));
        };

        if let Some(children) = merged.remove(self.format.child_marker.as_str()) {
            for other in &self.format.other_keys {
                match merged.remove(other.as_str()) {
                    None | Some(Value::Null) => {}
                    Some(Value::Sequence(items)) if items.is_empty() => {}
                    Some(_) => {
                        return Err(self.error(format!(
                            "'{}' cannot be given next to '{}'; move it into the children",
                            other, self.format.child_marker
                        )))
                    }
                }
            }
            return self.flatten_into(&children, &merged, out);
        }

        if !merged.contains_key(self.format.default_leaf.as_str()) {
            return Err(self.error(format!(
                "item has neither '{}' nor '{}'",
                self.format.default_leaf, self.format.child_marker
            )));
        }
        out.push(Value::Mapping(merged));
        Ok(())
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::malformed(self.origin.clone(), message)
    }
}

impl Processor for Frkl {
    type Input = Value;
    type Output = Value;

    fn process(&mut self, item: Value) -> Result<Vec<Value>> {
        self.flatten(&item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    fn flatten_tasks(s: &str) -> Vec<Value> {
        Frkl::new(FrklFormat::tasks()).flatten(&yaml(s)).unwrap()
    }

    #[test]
    fn test_string_becomes_leaf() {
        assert_eq!(flatten_tasks("[apt]"), vec![yaml("task: {name: apt}")]);
    }

    #[test]
    fn test_abbreviated_mapping() {
        assert_eq!(
            flatten_tasks("- apt: {name: zile}"),
            vec![yaml("task: {name: apt}\nvars: {name: zile}")]
        );
        assert_eq!(flatten_tasks("- apt:"), vec![yaml("task: {name: apt}")]);
    }

    #[test]
    fn test_abbreviated_scalar_value_is_rejected() {
        let result = Frkl::new(FrklFormat::tasks()).flatten(&yaml("- apt: 3"));
        assert!(matches!(result, Err(Error::MalformedDocument { .. })));
    }

    #[test]
    fn test_keys_are_moved_into_sections() {
        assert_eq!(
            flatten_tasks("- task: apt\n  become: true\n  pkg: zile"),
            vec![yaml("task: {name: apt, become: true}\nvars: {pkg: zile}")]
        );
    }

    #[test]
    fn test_explicit_section_wins_over_moved_key() {
        assert_eq!(
            flatten_tasks("- task: {name: apt, when: a}\n  when: b"),
            vec![yaml("task: {name: apt, when: a}")]
        );
    }

    #[test]
    fn test_children_inherit_defaults_in_order() {
        let records = flatten_tasks(
            "- become: true\n  vars: {user: m}\n  tasks:\n    - apt\n    - git: {repo: x}\n- yum",
        );
        assert_eq!(
            records,
            vec![
                yaml("task: {become: true, name: apt}\nvars: {user: m}"),
                yaml("task: {become: true, name: git}\nvars: {user: m, repo: x}"),
                yaml("task: {name: yum}"),
            ]
        );
    }

    #[test]
    fn test_item_without_leaf_or_children_is_malformed() {
        let result = Frkl::new(FrklFormat::tasks()).flatten(&yaml("- vars: {a: 1}"));
        assert!(matches!(result, Err(Error::MalformedDocument { .. })));
    }

    #[test]
    fn test_environment_format() {
        let frkl = Frkl::new(FrklFormat::environments());
        let records = frkl
            .flatten(&yaml(
                "- envs:\n    - meta: {name: a}\n    - meta: {name: b}\n  user: m\n- meta: localhost\n  tasks: [git]",
            ))
            .unwrap();
        assert_eq!(
            records,
            vec![
                yaml("meta: {name: a}\nvars: {user: m}"),
                yaml("meta: {name: b}\nvars: {user: m}"),
                yaml("meta: {name: localhost}\ntasks: [git]"),
            ]
        );
    }

    #[test]
    fn test_tasks_next_to_children_are_rejected() {
        let result = Frkl::new(FrklFormat::environments())
            .with_origin("envs.yml")
            .flatten(&yaml("- envs: [{meta: {name: a}}, {meta: {name: b}}]\n  tasks: [apt]"));
        match result {
            Err(Error::MalformedDocument { origin, message }) => {
                assert_eq!(origin, "envs.yml");
                assert!(message.contains("'tasks'"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_empty_tasks_next_to_children_are_ignored() {
        let records = Frkl::new(FrklFormat::environments())
            .flatten(&yaml("- envs: [{meta: {name: a}}]\n  tasks: []"))
            .unwrap();
        assert_eq!(records, vec![yaml("meta: {name: a}")]);
    }

    #[test]
    fn test_other_scalars_are_malformed() {
        let result = Frkl::new(FrklFormat::tasks())
            .with_origin("tasks.yml")
            .flatten(&yaml("[1]"));
        match result {
            Err(Error::MalformedDocument { origin, .. }) => assert_eq!(origin, "tasks.yml"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_null_contributes_nothing() {
        assert!(flatten_tasks("~").is_empty());
        assert!(flatten_tasks("[]").is_empty());
    }
}
