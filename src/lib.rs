//! # nsbl
//!
//! Compiles abbreviated inventory and task configuration into a runnable
//! Ansible environment: an inventory, one playbook per environment, the
//! roles, tasklists and plugins those playbooks need, and a launcher script.
//! The `nsbl` binary is a thin wrapper around this library.
//!
//! ## Quick Example
//!
//! ```
//! use nsbl::config::{CompilerConfig, RenderOptions};
//! use nsbl::context::CompileContext;
//! use nsbl::frkl::Document;
//! use nsbl::phases::orchestrator;
//!
//! let mut ctx = CompileContext::new(CompilerConfig::default()).unwrap();
//! let tasks = serde_yaml::from_str("- apt: {name: zile}").unwrap();
//! let model = orchestrator::compile_documents(&mut ctx, vec![Document::new("inline", tasks)]).unwrap();
//!
//! let staged = orchestrator::stage(&model, &RenderOptions::new("env")).unwrap();
//! assert!(staged.exists("plays/play_localhost_0.yml"));
//! assert!(staged.exists("run_all_plays.sh"));
//! ```
//!
//! ## Core Concepts
//!
//! - **Environments**: hosts and groups with variables and, optionally,
//!   tasks. They make up the [`inventory::Inventory`].
//! - **Tasks**: modules, roles or included tasklists, written as bare names,
//!   single-key mappings or explicit `{task: ..., vars: ...}` records.
//!   Task aliases ([`aliases`]) expand short names into full definitions.
//! - **Processor chains** ([`frkl`]): loading, flattening and augmenting
//!   documents is a chain of small stages.
//! - **Compilation context** ([`context`]): the configuration, role index,
//!   alias index and plugins one compilation works with.
//!
//! ## Execution Flow
//!
//! [`phases::orchestrator`] runs:
//!
//! 1.  **Expansion**: Load documents and build the inventory.
//! 2.  **Compilation**: Compile the tasks of every environment.
//! 3.  **Layout**: Lay the environment out in a [`filesystem::MemoryFS`].
//! 4.  **Disk Output**: Write it to the target directory.
//!
//! [`executor`] then runs the rendered launcher script.

pub mod aliases;
pub mod config;
pub mod context;
pub mod defaults;
pub mod error;
pub mod executor;
pub mod filesystem;
pub mod format;
pub mod frkl;
pub mod git;
pub mod inventory;
pub mod merge;
pub mod output;
pub mod phases;
pub mod resolve;
pub mod roles;
pub mod suggestions;
pub mod tasklist;
pub mod tasks;

#[cfg(test)]
mod properties;
