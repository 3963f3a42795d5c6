//! Property-based tests for task normalization.
//!
//! These tests use proptest to generate task names and documents and check
//! the laws the compiler relies on.

#[cfg(test)]
mod proptest_tests {
    use crate::aliases::TaskAliasIndex;
    use crate::format::detect;
    use crate::frkl::AugmentingTask;
    use crate::tasklist::tasklist_var_name;
    use proptest::prelude::*;
    use serde_yaml::{Mapping, Value};

    fn task_record(name: &str) -> Value {
        let mut task = Mapping::new();
        task.insert(Value::from("name"), Value::from(name));
        let mut record = Mapping::new();
        record.insert(Value::from("task"), Value::Mapping(task));
        Value::Mapping(record)
    }

    fn task_field<'v>(record: &'v Value, field: &str) -> Option<&'v Value> {
        record.get("task").and_then(|task| task.get(field))
    }

    fn document() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            "[a-z_]{1,8}".prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Sequence),
                prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4).prop_map(|entries| {
                    Value::Mapping(
                        entries
                            .into_iter()
                            .map(|(k, v)| (Value::from(k), v))
                            .collect(),
                    )
                }),
            ]
        })
    }

    // ============================================================================
    // format detection
    // ============================================================================

    proptest! {
        /// Property: detection never panics and gives the same answer twice
        #[test]
        fn detect_is_total_and_deterministic(doc in document()) {
            prop_assert_eq!(detect(&doc), detect(&doc));
        }

        /// Property: a list of bare task names is always compiled
        #[test]
        fn bare_name_lists_are_compiled(names in prop::collection::vec("[a-z][a-z_]{0,10}", 1..6)) {
            let doc = Value::Sequence(names.into_iter().map(Value::from).collect());
            prop_assert!(detect(&doc).is_compiled());
        }
    }

    // ============================================================================
    // augmentation
    // ============================================================================

    proptest! {
        /// Property: an all-uppercase name is lowercased, escalated and
        /// described by its original spelling
        #[test]
        fn uppercase_names_escalate(name in "[A-Z][A-Z0-9_]{0,10}") {
            let aliases = TaskAliasIndex::new();
            let augmented = AugmentingTask::new(&aliases).augment(&task_record(&name)).unwrap();

            let lowered = name.to_lowercase();
            prop_assert_eq!(task_field(&augmented, "name").and_then(Value::as_str), Some(lowered.as_str()));
            prop_assert_eq!(task_field(&augmented, "become"), Some(&Value::Bool(true)));
            prop_assert_eq!(task_field(&augmented, "desc").and_then(Value::as_str), Some(name.as_str()));
        }

        /// Property: names with a lowercase letter keep their spelling and
        /// are not escalated
        #[test]
        fn lowercase_names_are_kept(name in "[a-z][a-zA-Z0-9_]{0,10}") {
            let aliases = TaskAliasIndex::new();
            let augmented = AugmentingTask::new(&aliases).augment(&task_record(&name)).unwrap();

            prop_assert_eq!(task_field(&augmented, "name").and_then(Value::as_str), Some(name.as_str()));
            prop_assert!(task_field(&augmented, "become").is_none());
        }

        /// Property: augmenting an augmented record changes nothing
        #[test]
        fn augmentation_is_idempotent(name in "[a-zA-Z][a-zA-Z0-9_]{0,10}") {
            let aliases = TaskAliasIndex::new();
            let augmenter = AugmentingTask::new(&aliases);
            let once = augmenter.augment(&task_record(&name)).unwrap();
            let twice = augmenter.augment(&once).unwrap();
            prop_assert_eq!(once, twice);
        }
    }

    // ============================================================================
    // tasklist variable names
    // ============================================================================

    proptest! {
        /// Property: tasklist variable names are valid identifiers
        #[test]
        fn tasklist_var_names_are_identifiers(basename in ".*") {
            let name = tasklist_var_name(&basename);
            prop_assert!(name.starts_with("tasklist_"));
            prop_assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        }
    }
}
