//! Document merging and small helpers for working with YAML mappings
//!
//! Configuration items travel through the pipeline as plain
//! `serde_yaml::Value` trees. This module holds the deep-merge used for
//! default propagation and alias templates (see [`yaml`]) plus accessors that
//! the stages share for reading and creating sections of a record.

pub mod yaml;

pub use yaml::{get_yaml_type_name, merge_yaml_values, merged};

use serde_yaml::{Mapping, Value};

/// Builds a mapping key.
pub fn key(name: &str) -> Value {
    Value::String(name.to_string())
}

/// Returns the string stored under `name`, if it is a string.
pub fn get_str<'a>(map: &'a Mapping, name: &str) -> Option<&'a str> {
    map.get(name).and_then(Value::as_str)
}

/// Returns the mapping stored under `name`, if it is a mapping.
pub fn get_mapping<'a>(map: &'a Mapping, name: &str) -> Option<&'a Mapping> {
    map.get(name).and_then(Value::as_mapping)
}

/// Returns the mapping stored under `name`, creating it when the key is
/// missing or null. Returns `None` if the key holds a non-mapping value.
pub fn section_mut<'a>(map: &'a mut Mapping, name: &str) -> Option<&'a mut Mapping> {
    let entry = map
        .entry(key(name))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if entry.is_null() {
        *entry = Value::Mapping(Mapping::new());
    }
    entry.as_mapping_mut()
}

/// Reads a sequence of strings, accepting a single string as a one-element
/// list. Returns `None` if the value has any other shape.
pub fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::String(s) => Some(vec![s.clone()]),
        Value::Sequence(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

/// True if `name` has at least one letter and no lowercase letters.
///
/// ```
/// use nsbl::merge::is_all_uppercase;
///
/// assert!(is_all_uppercase("APT"));
/// assert!(is_all_uppercase("APT_GET2"));
/// assert!(!is_all_uppercase("Apt"));
/// assert!(!is_all_uppercase("123"));
/// ```
pub fn is_all_uppercase(name: &str) -> bool {
    name.chars().any(char::is_alphabetic) && !name.chars().any(char::is_lowercase)
}
