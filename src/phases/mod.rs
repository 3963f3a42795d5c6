//! The phases of turning configuration documents into a runnable environment.
//!
//! ## Overview
//!
//! 1. Expansion - Load the documents, flatten environment records and build
//!    the inventory plus one task list request per environment with tasks
//! 2. Compilation - Compile every request into a [`TaskList`]
//! 3. Layout - Lay the compiled model out in a [`crate::filesystem::MemoryFS`]
//! 4. Writing to Disk - Move the layout into the target directory and
//!    install external roles
//!
//! Phases 1 and 2 only need a [`crate::context::CompileContext`]; phases 3
//! and 4 only need the resulting [`CompiledModel`].

use std::collections::BTreeSet;

use crate::inventory::{EnvKind, Inventory};
use crate::tasklist::TaskList;

pub mod compilation;
pub mod expansion;
pub mod layout;
pub mod orchestrator;
pub mod write;

/// The compiled tasks of one environment record.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledEnvironment {
    pub name: String,
    pub kind: EnvKind,
    pub id: u32,
    pub tasklist: TaskList,
}

impl CompiledEnvironment {
    /// File name of the environment's playbook below `plays/`.
    pub fn playbook_name(&self) -> String {
        format!("play_{}_{}.yml", self.name, self.id)
    }
}

/// Everything the renderer needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledModel {
    pub inventory: Inventory,
    /// In registration order.
    pub environments: Vec<CompiledEnvironment>,
}

impl CompiledModel {
    pub fn internal_roles(&self) -> BTreeSet<&str> {
        self.environments
            .iter()
            .flat_map(|env| env.tasklist.internal_roles.iter().map(String::as_str))
            .collect()
    }

    pub fn external_roles(&self) -> BTreeSet<&str> {
        self.environments
            .iter()
            .flat_map(|env| env.tasklist.external_roles.iter().map(String::as_str))
            .collect()
    }
}
