//! # Task Items
//!
//! A [`TaskItem`] is one fully augmented and classified entry of a tasklist.
//! This module owns the task model, the classification rules that decide
//! whether a task runs a module, a role or another tasklist, and the
//! conversion of an item into the executor's own task syntax.
//!
//! ## Classification
//!
//! Classification looks at the effective task name and the optional explicit
//! `task-type`:
//!
//! - `include_role::` / `import_role::` prefixes, an explicit `role` type, or
//!   a name containing a `.` make a role.
//! - `include_tasks::` / `import_tasks::` prefixes or an explicit `tasklist`
//!   type make a tasklist.
//! - Everything else is a module.
//!
//! An explicit type always wins over the `.` heuristic. An explicit type that
//! contradicts a prefix is rejected. Resolving *where* a role or tasklist
//! comes from needs the compilation context and happens in
//! [`crate::tasklist`].

use std::fmt;
use std::str::FromStr;

use log::warn;
use serde_yaml::{Mapping, Value};

use crate::defaults::is_reserved_keyword;
use crate::error::{Error, Result};
use crate::merge::{get_mapping, get_str, key};

/// Keys of the `task` section that describe the task rather than being
/// passed to the executor.
const TASK_META_KEYS: &[&str] = &["name", "task-name", "task-type", "desc", "parse_ignore"];

/// The explicit `task-type` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    Module,
    Role,
    Tasklist,
}

impl FromStr for TaskType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "module" => Ok(TaskType::Module),
            "role" => Ok(TaskType::Role),
            "tasklist" => Ok(TaskType::Tasklist),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskType::Module => "module",
            TaskType::Role => "role",
            TaskType::Tasklist => "tasklist",
        })
    }
}

/// Whether a role or tasklist is pulled in statically or dynamically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncludeKind {
    Import,
    Include,
}

impl IncludeKind {
    /// Executor keyword for a role reference of this kind.
    pub fn role_keyword(self) -> &'static str {
        match self {
            IncludeKind::Import => "import_role",
            IncludeKind::Include => "include_role",
        }
    }

    /// Executor keyword for a tasklist reference of this kind.
    pub fn tasks_keyword(self) -> &'static str {
        match self {
            IncludeKind::Import => "import_tasks",
            IncludeKind::Include => "include_tasks",
        }
    }
}

/// Where a referenced role comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleOrigin {
    /// Found in the local role index; copied into the rendered environment.
    Internal,
    /// Not available locally; fetched by the role downloader.
    External,
}

/// How a tasklist reference is written into the rendered task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TasklistTarget {
    /// Classified but not resolved yet.
    Pending,
    /// A templated expression, passed through verbatim.
    Expression(String),
    /// A materialized file whose path the playbook exposes in this variable.
    Variable(String),
}

impl TasklistTarget {
    fn render(&self, fallback: &str) -> String {
        match self {
            TasklistTarget::Pending => fallback.to_string(),
            TasklistTarget::Expression(expr) => expr.clone(),
            TasklistTarget::Variable(var) => format!("{{{{ {} }}}}", var),
        }
    }
}

/// The kind of a classified task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    Module,
    Role {
        origin: RoleOrigin,
        include: IncludeKind,
    },
    Tasklist {
        include: IncludeKind,
        target: TasklistTarget,
    },
}

impl TaskKind {
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskKind::Module => TaskType::Module,
            TaskKind::Role { .. } => TaskType::Role,
            TaskKind::Tasklist { .. } => TaskType::Tasklist,
        }
    }
}

/// Result of classifying a task name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub task_type: TaskType,
    /// Include kind for roles and tasklists, `None` for modules.
    pub include: Option<IncludeKind>,
    /// The effective name with any include prefix removed.
    pub target: String,
}

fn split_prefix(name: &str) -> Option<(TaskType, IncludeKind, &str)> {
    const PREFIXES: &[(&str, TaskType, IncludeKind)] = &[
        ("include_role::", TaskType::Role, IncludeKind::Include),
        ("import_role::", TaskType::Role, IncludeKind::Import),
        ("include_tasks::", TaskType::Tasklist, IncludeKind::Include),
        ("import_tasks::", TaskType::Tasklist, IncludeKind::Import),
    ];
    PREFIXES.iter().find_map(|(prefix, task_type, include)| {
        name.strip_prefix(prefix)
            .map(|rest| (*task_type, *include, rest))
    })
}

/// Classifies a task by its effective name and optional explicit type.
pub fn classify(task_name: &str, explicit: Option<TaskType>) -> Result<Classification> {
    let prefixed = split_prefix(task_name);

    let (task_type, include, target) = match (explicit, prefixed) {
        (Some(explicit), Some((prefix_type, _, _))) if explicit != prefix_type => {
            return Err(Error::InvalidTaskType {
                task: task_name.to_string(),
                task_type: explicit.to_string(),
            });
        }
        (_, Some((prefix_type, include, rest))) => (prefix_type, Some(include), rest),
        (Some(TaskType::Module), None) => (TaskType::Module, None, task_name),
        (Some(explicit), None) => (explicit, Some(IncludeKind::Include), task_name),
        (None, None) if task_name.contains('.') => {
            (TaskType::Role, Some(IncludeKind::Include), task_name)
        }
        (None, None) => (TaskType::Module, None, task_name),
    };

    Ok(Classification {
        task_type,
        include,
        target: target.to_string(),
    })
}

/// One compiled task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskItem {
    /// `task.name` after the uppercase rewrite.
    pub name: String,
    /// The module, role or tasklist this task runs.
    pub task_name: String,
    /// Human readable description; rendered as the task's `name`.
    pub desc: Option<String>,
    pub kind: TaskKind,
    /// Arguments (modules) or variables (roles, tasklists).
    pub vars: Mapping,
    /// Executor keywords passed through at the top level of the task.
    pub keywords: Mapping,
    /// Synthesized item that bypasses classification.
    pub parse_ignore: bool,
}

/// The fields of an augmented record that classification needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFields {
    pub name: String,
    pub task_name: String,
    pub task_type: Option<TaskType>,
    pub desc: Option<String>,
    pub vars: Mapping,
    pub keywords: Mapping,
    pub parse_ignore: bool,
}

impl RecordFields {
    /// Reads an augmented record (`{task: {...}, vars: {...}}`).
    pub fn read(record: &Value, origin: &str) -> Result<Self> {
        let map = record
            .as_mapping()
            .ok_or_else(|| Error::malformed(origin, "task record must be a mapping"))?;
        let task = get_mapping(map, "task")
            .ok_or_else(|| Error::malformed(origin, "task record without a 'task' section"))?;
        let name = get_str(task, "name")
            .ok_or_else(|| Error::malformed(origin, "task without a 'name'"))?
            .to_string();
        let task_name = get_str(task, "task-name").unwrap_or(&name).to_string();

        let task_type = match task.get("task-type") {
            None | Some(Value::Null) => None,
            Some(value) => {
                let raw = value.as_str().unwrap_or_default();
                Some(raw.parse::<TaskType>().map_err(|_| Error::InvalidTaskType {
                    task: name.clone(),
                    task_type: value_to_display(value),
                })?)
            }
        };

        let vars = match map.get("vars") {
            None | Some(Value::Null) => Mapping::new(),
            Some(Value::Mapping(vars)) => vars.clone(),
            Some(_) => {
                return Err(Error::malformed(
                    origin,
                    format!("'vars' of task '{}' must be a mapping", name),
                ))
            }
        };

        let mut keywords = Mapping::new();
        for (k, v) in task {
            let Some(k) = k.as_str() else { continue };
            if TASK_META_KEYS.contains(&k) {
                continue;
            }
            if is_reserved_keyword(k) {
                keywords.insert(key(k), v.clone());
            } else {
                warn!("{}: ignoring unknown key '{}' in task '{}'", origin, k, name);
            }
        }

        Ok(Self {
            desc: get_str(task, "desc").map(str::to_string),
            parse_ignore: task
                .get("parse_ignore")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            name,
            task_name,
            task_type,
            vars,
            keywords,
        })
    }

    /// Builds the item once its kind is known; `task_name` is the effective
    /// name (include prefix removed).
    pub fn into_item(self, task_name: String, kind: TaskKind) -> TaskItem {
        TaskItem {
            name: self.name,
            task_name,
            desc: self.desc,
            kind,
            vars: self.vars,
            keywords: self.keywords,
            parse_ignore: self.parse_ignore,
        }
    }
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

impl TaskItem {
    /// Name shown by the executor.
    pub fn display_name(&self) -> &str {
        self.desc.as_deref().unwrap_or(&self.name)
    }

    /// Renders the item as an executor task.
    pub fn render(&self) -> Value {
        let mut task = Mapping::new();
        task.insert(key("name"), Value::from(self.display_name()));

        match &self.kind {
            TaskKind::Module => match self.vars.get("free_form") {
                Some(free_form) => {
                    task.insert(key(&self.task_name), free_form.clone());
                    let mut args = self.vars.clone();
                    args.remove("free_form");
                    if !args.is_empty() {
                        task.insert(key("args"), Value::Mapping(args));
                    }
                }
                None => {
                    task.insert(key(&self.task_name), Value::Mapping(self.vars.clone()));
                }
            },
            TaskKind::Role { include, .. } => {
                let mut role = Mapping::new();
                role.insert(key("name"), Value::from(self.task_name.as_str()));
                task.insert(key(include.role_keyword()), Value::Mapping(role));
                if !self.vars.is_empty() {
                    task.insert(key("vars"), Value::Mapping(self.vars.clone()));
                }
            }
            TaskKind::Tasklist { include, target } => {
                task.insert(
                    key(include.tasks_keyword()),
                    Value::from(target.render(&self.task_name)),
                );
                if !self.vars.is_empty() {
                    task.insert(key("vars"), Value::Mapping(self.vars.clone()));
                }
            }
        }

        for (k, v) in &self.keywords {
            if !task.contains_key(k) {
                task.insert(k.clone(), v.clone());
            }
        }
        Value::Mapping(task)
    }
}
