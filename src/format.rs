//! Tasklist format detection.
//!
//! A tasklist is either written in the compact native format (aliases,
//! uppercase names, `task` sections) or already in the executor's own
//! format. Foreign tasklists are copied verbatim; native ones are compiled.

use serde_yaml::Value;

use crate::defaults::is_reserved_keyword;
use crate::merge::is_all_uppercase;

/// The detected format of a tasklist document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskListFormat {
    /// Compact format understood by the compiler.
    Native,
    /// The executor's own task syntax.
    Foreign,
    /// No decisive marker; treated like [`TaskListFormat::Native`].
    Unknown,
}

impl TaskListFormat {
    /// Whether a document of this format goes through compilation.
    pub fn is_compiled(self) -> bool {
        !matches!(self, TaskListFormat::Foreign)
    }
}

/// Detects the format of a tasklist document. Total and deterministic.
///
/// - a list of strings (including the empty list) is native;
/// - a list with any mapping using a reserved executor keyword as a key is
///   foreign;
/// - a list with a `task` key, an entirely uppercase key, or a string item
///   is native;
/// - anything else is unknown.
pub fn detect(document: &Value) -> TaskListFormat {
    let Value::Sequence(items) = document else {
        return TaskListFormat::Unknown;
    };

    if items.iter().all(Value::is_string) {
        return TaskListFormat::Native;
    }

    let mapping_keys = || {
        items
            .iter()
            .filter_map(Value::as_mapping)
            .flat_map(|m| m.keys())
            .filter_map(Value::as_str)
    };

    if mapping_keys().any(is_reserved_keyword) {
        return TaskListFormat::Foreign;
    }

    let native_marker = items.iter().any(Value::is_string)
        || mapping_keys().any(|k| k == "task" || is_all_uppercase(k));
    if native_marker {
        TaskListFormat::Native
    } else {
        TaskListFormat::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect_str(s: &str) -> TaskListFormat {
        detect(&serde_yaml::from_str(s).unwrap())
    }

    #[test]
    fn test_string_lists_are_native() {
        assert_eq!(detect_str("[apt, git]"), TaskListFormat::Native);
        assert_eq!(detect_str("[]"), TaskListFormat::Native);
    }

    #[test]
    fn test_executor_keywords_make_foreign() {
        assert_eq!(
            detect_str("- name: install\n  apt: {name: zile}\n  become: true"),
            TaskListFormat::Foreign
        );
        assert_eq!(
            detect_str("- name: install\n  apt: {name: zile}"),
            TaskListFormat::Foreign
        );
    }

    #[test]
    fn test_foreign_wins_over_native_markers() {
        assert_eq!(
            detect_str("- APT\n- {name: x, when: y}"),
            TaskListFormat::Foreign
        );
    }

    #[test]
    fn test_native_markers() {
        assert_eq!(detect_str("- task: {name: apt}"), TaskListFormat::Native);
        assert_eq!(detect_str("- APT: {name: zile}"), TaskListFormat::Native);
        assert_eq!(
            detect_str("- apt\n- git: {repo: x}"),
            TaskListFormat::Native
        );
    }

    #[test]
    fn test_undecided_documents_are_unknown() {
        assert_eq!(detect_str("- apt: {name: zile}"), TaskListFormat::Unknown);
        assert_eq!(detect_str("{apt: {name: zile}}"), TaskListFormat::Unknown);
        assert_eq!(detect_str("42"), TaskListFormat::Unknown);
        assert_eq!(detect(&Value::Null), TaskListFormat::Unknown);
    }

    #[test]
    fn test_unknown_is_compiled() {
        assert!(TaskListFormat::Unknown.is_compiled());
        assert!(TaskListFormat::Native.is_compiled());
        assert!(!TaskListFormat::Foreign.is_compiled());
    }
}
