//! YAML deep merge
//!
//! Mappings merge key by key, recursing into nested mappings. On any other
//! conflict the overlay wins outright; in particular sequences are replaced,
//! never concatenated. The merge is used both to propagate parent defaults
//! into nested records and to lay alias templates underneath user records.

use log::trace;
use serde_yaml::Value as YamlValue;

/// Recursively merge `overlay` into `target`.
///
/// - Mappings: keys missing from `target` are inserted; keys present in both
///   are merged recursively when both sides are mappings and replaced by the
///   overlay value otherwise.
/// - Everything else: `target` is replaced by `overlay`.
pub fn merge_yaml_values(target: &mut YamlValue, overlay: &YamlValue) {
    match (target, overlay) {
        (YamlValue::Mapping(target_map), YamlValue::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match target_map.get_mut(key) {
                    Some(existing) if existing.is_mapping() && value.is_mapping() => {
                        merge_yaml_values(existing, value);
                    }
                    Some(existing) => {
                        trace!(
                            "Overwriting {:?} with {:?} at key {:?}",
                            get_yaml_type_name(existing),
                            get_yaml_type_name(value),
                            key
                        );
                        *existing = value.clone();
                    }
                    None => {
                        target_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, overlay) => {
            *target = overlay.clone();
        }
    }
}

/// Returns `base` with `overlay` deep-merged on top of it.
pub fn merged(base: &YamlValue, overlay: &YamlValue) -> YamlValue {
    let mut result = base.clone();
    merge_yaml_values(&mut result, overlay);
    result
}

/// Get a human-readable type name for a YAML value
///
/// Used for logging and error messages to describe the type of a value.
pub fn get_yaml_type_name(value: &YamlValue) -> &'static str {
    match value {
        YamlValue::Null => "Null",
        YamlValue::Bool(_) => "Bool",
        YamlValue::Number(_) => "Number",
        YamlValue::String(_) => "String",
        YamlValue::Sequence(_) => "Sequence",
        YamlValue::Mapping(_) => "Mapping",
        YamlValue::Tagged(_) => "Tagged",
    }
}
