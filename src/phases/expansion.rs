//! Phase 1: Expansion
//!
//! Loads every configuration source and runs the environment chain:
//!
//! ```text
//! UrlAbbrev -> EnsureUrl -> EnsureYaml -> EnvironmentDocuments -> Frkl -> InventoryCompiler
//! ```
//!
//! A document is one of:
//! - an environment record (a mapping with `meta` or `envs`),
//! - a list of environment records (any item is such a mapping),
//! - a list of tasks, attached to an implicit host environment named after
//!   the configured default environment name.
//!
//! Empty documents contribute nothing.

use log::{debug, info};
use serde_yaml::{Mapping, Value};

use crate::context::CompileContext;
use crate::error::{Error, Result};
use crate::frkl::{run, Document, EnsureUrl, EnsureYaml, Frkl, FrklFormat, Processor, ProcessorExt, UrlAbbrev};
use crate::inventory::{EnvKind, Inventory, InventoryCompiler, TaskListRequest};
use crate::merge::key;

/// Output of the expansion phase.
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    pub inventory: Inventory,
    /// One request per environment record with tasks, in input order.
    pub requests: Vec<TaskListRequest>,
}

/// Sorts parsed documents into environment records.
#[derive(Debug, Clone)]
pub struct EnvironmentDocuments {
    default_env_name: String,
}

impl EnvironmentDocuments {
    pub fn new(default_env_name: impl Into<String>) -> Self {
        Self {
            default_env_name: default_env_name.into(),
        }
    }

    fn implicit_environment(&self, tasks: Value) -> Value {
        let mut meta = Mapping::new();
        meta.insert(key("name"), Value::from(self.default_env_name.as_str()));
        meta.insert(key("type"), Value::from(EnvKind::Host.to_string()));
        let mut record = Mapping::new();
        record.insert(key("meta"), Value::Mapping(meta));
        record.insert(key("tasks"), tasks);
        Value::Mapping(record)
    }
}

fn is_environment_record(value: &Value) -> bool {
    value
        .as_mapping()
        .is_some_and(|m| m.contains_key("meta") || m.contains_key("envs"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    Empty,
    Environments,
    Tasks,
    Invalid,
}

fn document_kind(value: &Value) -> DocumentKind {
    match value {
        Value::Null => DocumentKind::Empty,
        Value::Sequence(items) if items.is_empty() => DocumentKind::Empty,
        Value::Sequence(items) if items.iter().any(is_environment_record) => {
            DocumentKind::Environments
        }
        Value::Sequence(_) => DocumentKind::Tasks,
        value if is_environment_record(value) => DocumentKind::Environments,
        _ => DocumentKind::Invalid,
    }
}

impl Processor for EnvironmentDocuments {
    type Input = Document;
    type Output = Value;

    fn process(&mut self, item: Document) -> Result<Vec<Value>> {
        let kind = document_kind(&item.value);
        debug!("{}: {:?} document", item.origin, kind);
        match kind {
            DocumentKind::Empty => Ok(Vec::new()),
            DocumentKind::Environments => Ok(vec![item.value]),
            DocumentKind::Tasks => Ok(vec![self.implicit_environment(item.value)]),
            DocumentKind::Invalid => Err(Error::malformed(
                item.origin,
                "expected an environment record or a list of environments or tasks",
            )),
        }
    }
}

/// Loads `sources` (paths, URLs or abbreviations) and expands them.
pub fn execute(ctx: &CompileContext, sources: &[String]) -> Result<Expansion> {
    info!("Expanding {} configuration source(s)", sources.len());
    let mut inventory = InventoryCompiler::new(ctx.config().default_env_type);
    let requests = {
        let mut chain = UrlAbbrev::new(ctx.abbreviations())
            .then(EnsureUrl::new(ctx.fetcher(), ctx.allow_remote()))
            .then(EnsureYaml)
            .then(EnvironmentDocuments::new(ctx.config().default_env_name.as_str()))
            .then(Frkl::new(FrklFormat::environments()).with_origin("environments"))
            .then(&mut inventory);
        run(&mut chain, sources.iter().cloned())?
    };
    finish(inventory, requests)
}

/// Expands documents that are already parsed.
pub fn execute_documents(ctx: &CompileContext, documents: Vec<Document>) -> Result<Expansion> {
    let mut inventory = InventoryCompiler::new(ctx.config().default_env_type);
    let requests = {
        let mut chain = EnvironmentDocuments::new(ctx.config().default_env_name.as_str())
            .then(Frkl::new(FrklFormat::environments()).with_origin("environments"))
            .then(&mut inventory);
        run(&mut chain, documents)?
    };
    finish(inventory, requests)
}

fn finish(inventory: InventoryCompiler, requests: Vec<TaskListRequest>) -> Result<Expansion> {
    let inventory = inventory.into_inventory();
    debug!(
        "Inventory: {} hosts, {} groups, {} task lists",
        inventory.hosts().count(),
        inventory.groups().count(),
        requests.len()
    );
    Ok(Expansion {
        inventory,
        requests,
    })
}
