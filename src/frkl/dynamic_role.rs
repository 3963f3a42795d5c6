//! Folding consecutive module tasks into synthetic roles.

use serde_yaml::Mapping;

use super::Processor;
use crate::error::Result;
use crate::tasks::{IncludeKind, RoleOrigin, TaskItem, TaskKind};

/// A role synthesized from a run of module tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicRole {
    pub name: String,
    pub tasks: Vec<TaskItem>,
}

/// Buffers runs of module tasks and replaces each run with one include of a
/// synthetic role. Role and tasklist items end a run and pass through.
#[derive(Debug)]
pub struct DynamicRoleBuilder {
    prefix: String,
    buffer: Vec<TaskItem>,
    roles: Vec<DynamicRole>,
}

impl DynamicRoleBuilder {
    /// Synthetic roles are named `dyn_role_<scope>_<n>`.
    pub fn new(scope: u32) -> Self {
        Self {
            prefix: format!("dyn_role_{}", scope),
            buffer: Vec::new(),
            roles: Vec::new(),
        }
    }

    /// The roles built so far.
    pub fn roles(&self) -> &[DynamicRole] {
        &self.roles
    }

    pub fn into_roles(self) -> Vec<DynamicRole> {
        self.roles
    }

    fn flush(&mut self) -> Option<TaskItem> {
        if self.buffer.is_empty() {
            return None;
        }
        let name = format!("{}_{}", self.prefix, self.roles.len());
        self.roles.push(DynamicRole {
            name: name.clone(),
            tasks: std::mem::take(&mut self.buffer),
        });
        Some(TaskItem {
            name: name.clone(),
            task_name: name,
            desc: None,
            kind: TaskKind::Role {
                origin: RoleOrigin::Internal,
                include: IncludeKind::Import,
            },
            vars: Mapping::new(),
            keywords: Mapping::new(),
            parse_ignore: false,
        })
    }
}

impl Processor for DynamicRoleBuilder {
    type Input = TaskItem;
    type Output = TaskItem;

    fn process(&mut self, item: TaskItem) -> Result<Vec<TaskItem>> {
        if item.kind == TaskKind::Module {
            self.buffer.push(item);
            return Ok(Vec::new());
        }
        let mut output: Vec<TaskItem> = self.flush().into_iter().collect();
        output.push(item);
        Ok(output)
    }

    fn finalize(&mut self) -> Result<Vec<TaskItem>> {
        Ok(self.flush().into_iter().collect())
    }
}
