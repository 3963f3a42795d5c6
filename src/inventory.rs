//! # Inventory Compiler
//!
//! The last stage of the document chain. Every flattened environment record
//! registers a host or a group in the [`Inventory`]; records that carry
//! tasks additionally produce a [`TaskListRequest`] for the tasklist
//! compiler.
//!
//! ## Environment types
//!
//! `meta.type` wins when given. Otherwise a record with `meta.hosts` is a
//! group, a record with `meta.groups` is a host, and anything else gets the
//! configured default type.
//!
//! ## Membership
//!
//! - `meta.hosts` of a group lists its hosts. Hosts that are never defined
//!   themselves are registered with empty variables.
//! - `meta.groups` of a host or group lists the groups it belongs to. Those
//!   groups must be defined by the end of the input.
//!
//! Membership is resolved when the stage is finalized, so records may refer
//! to environments defined later in the input.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::defaults::DEFAULT_ENV_NAME;
use crate::error::{Error, Result};
use crate::frkl::Processor;
use crate::merge::{get_mapping, key, string_list};

/// Whether an environment is a single host or a group of hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvKind {
    Host,
    Group,
}

impl FromStr for EnvKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "host" => Ok(EnvKind::Host),
            "group" => Ok(EnvKind::Group),
            other => Err(format!("unknown environment type '{}'", other)),
        }
    }
}

impl fmt::Display for EnvKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EnvKind::Host => "host",
            EnvKind::Group => "group",
        })
    }
}

/// A registered host or group.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub id: u32,
    pub name: String,
    pub kind: EnvKind,
    pub vars: Mapping,
    /// Member hosts (groups only).
    pub hosts: Vec<String>,
    /// Child groups (groups only).
    pub children: Vec<String>,
}

impl Environment {
    fn new(id: u32, name: &str, kind: EnvKind, vars: Mapping) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind,
            vars,
            hosts: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// All hosts and groups of one compilation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    hosts: BTreeMap<String, Environment>,
    groups: BTreeMap<String, Environment>,
}

impl Inventory {
    pub fn hosts(&self) -> impl Iterator<Item = &Environment> {
        self.hosts.values()
    }

    pub fn groups(&self) -> impl Iterator<Item = &Environment> {
        self.groups.values()
    }

    pub fn host(&self, name: &str) -> Option<&Environment> {
        self.hosts.get(name)
    }

    pub fn group(&self, name: &str) -> Option<&Environment> {
        self.groups.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.groups.is_empty()
    }

    /// Groups that list `host` as a member.
    pub fn groups_of(&self, host: &str) -> Vec<&str> {
        self.groups
            .values()
            .filter(|g| g.hosts.iter().any(|h| h == host))
            .map(|g| g.name.as_str())
            .collect()
    }

    /// Renders the INI inventory. With `inline_vars` variables are written
    /// next to the hosts and into `[group:vars]` sections.
    pub fn render_hosts_file(&self, inline_vars: bool) -> Result<String> {
        let grouped: BTreeSet<&str> = self
            .groups
            .values()
            .flat_map(|g| g.hosts.iter().map(String::as_str))
            .collect();
        let mut vars_written: BTreeSet<String> = BTreeSet::new();
        let mut out = String::new();

        let mut host_line = |name: &str, out: &mut String| -> Result<()> {
            out.push_str(name);
            if inline_vars && vars_written.insert(name.to_string()) {
                if let Some(host) = self.hosts.get(name) {
                    for (k, v) in &host.vars {
                        out.push(' ');
                        out.push_str(&inline_var(name, k, v)?);
                    }
                }
            }
            out.push('\n');
            Ok(())
        };

        let mut ungrouped = false;
        for host in self.hosts.keys().filter(|h| !grouped.contains(h.as_str())) {
            host_line(host, &mut out)?;
            ungrouped = true;
        }
        if ungrouped {
            out.push('\n');
        }

        for group in self.groups.values() {
            out.push_str(&format!("[{}]\n", group.name));
            for host in &group.hosts {
                host_line(host, &mut out)?;
            }
            out.push('\n');

            if !group.children.is_empty() {
                out.push_str(&format!("[{}:children]\n", group.name));
                for child in &group.children {
                    out.push_str(child);
                    out.push('\n');
                }
                out.push('\n');
            }

            if inline_vars && !group.vars.is_empty() {
                out.push_str(&format!("[{}:vars]\n", group.name));
                for (k, v) in &group.vars {
                    out.push_str(&inline_var(&group.name, k, v)?);
                    out.push('\n');
                }
                out.push('\n');
            }
        }
        Ok(out)
    }

    /// `group_vars/<g>/<g>.yml` and `host_vars/<h>/<h>.yml` contents, for
    /// environments with variables.
    pub fn vars_files(&self) -> Vec<(PathBuf, &Mapping)> {
        let groups = self
            .groups
            .values()
            .map(|g| ("group_vars", g));
        let hosts = self.hosts.values().map(|h| ("host_vars", h));
        groups
            .chain(hosts)
            .filter(|(_, env)| !env.vars.is_empty())
            .map(|(dir, env)| {
                (
                    PathBuf::from(dir)
                        .join(&env.name)
                        .join(format!("{}.yml", env.name)),
                    &env.vars,
                )
            })
            .collect()
    }
}

fn inline_var(env: &str, k: &Value, v: &Value) -> Result<String> {
    let name = match k {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)?.trim().to_string(),
    };
    let value = serde_json::to_string(v).map_err(|e| Error::MalformedEnvironment {
        name: Some(env.to_string()),
        message: format!("variable '{}' cannot be written inline: {}", name, e),
    })?;
    Ok(format!("{}={}", name, value))
}

/// A request to compile the tasks of one environment record.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskListRequest {
    pub env_name: String,
    pub env_kind: EnvKind,
    pub env_id: u32,
    pub vars: Mapping,
    pub tasks: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberKind {
    Host,
    Group,
}

#[derive(Debug, Clone)]
struct Membership {
    group: String,
    member: String,
    kind: MemberKind,
}

/// Builds the inventory from flattened environment records.
#[derive(Debug)]
pub struct InventoryCompiler {
    default_kind: EnvKind,
    inventory: Inventory,
    next_env_id: u32,
    memberships: Vec<Membership>,
}

impl InventoryCompiler {
    pub fn new(default_kind: EnvKind) -> Self {
        Self {
            default_kind,
            inventory: Inventory::default(),
            next_env_id: 0,
            memberships: Vec::new(),
        }
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn into_inventory(self) -> Inventory {
        self.inventory
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_env_id;
        self.next_env_id += 1;
        id
    }

    fn register(&mut self, record: &Value) -> Result<Option<TaskListRequest>> {
        let map = record.as_mapping().ok_or_else(|| Error::MalformedEnvironment {
            name: None,
            message: "environment record must be a mapping".to_string(),
        })?;
        let meta = get_mapping(map, "meta").ok_or_else(|| Error::MalformedEnvironment {
            name: None,
            message: "environment record without a 'meta' section".to_string(),
        })?;
        let name = meta
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| Error::MalformedEnvironment {
                name: None,
                message: "'meta.name' is required".to_string(),
            })?
            .to_string();

        let malformed = |message: String| Error::MalformedEnvironment {
            name: Some(name.clone()),
            message,
        };
        let list = |field: &str| -> Result<Option<Vec<String>>> {
            match meta.get(field) {
                None => Ok(None),
                Some(value) => string_list(value)
                    .map(Some)
                    .ok_or_else(|| malformed(format!("'meta.{}' must be a list of names", field))),
            }
        };
        let hosts = list("hosts")?;
        let groups = list("groups")?;

        let kind = match meta.get("type") {
            Some(Value::String(t)) => t.parse::<EnvKind>().map_err(malformed)?,
            Some(_) => return Err(malformed("'meta.type' must be 'host' or 'group'".to_string())),
            None if hosts.is_some() => EnvKind::Group,
            None if groups.is_some() => EnvKind::Host,
            None => self.default_kind,
        };

        let vars = match map.get("vars") {
            None | Some(Value::Null) => Mapping::new(),
            Some(Value::Mapping(vars)) => vars.clone(),
            Some(_) => return Err(malformed("'vars' must be a mapping".to_string())),
        };

        let id = self.next_id();
        match kind {
            EnvKind::Host => {
                if hosts.is_some() {
                    return Err(Error::InvalidEnvironmentShape {
                        name,
                        message: "a host cannot list member hosts".to_string(),
                    });
                }
                self.add_host(id, &name, vars.clone())?;
                for group in groups.unwrap_or_default() {
                    self.memberships.push(Membership {
                        group,
                        member: name.clone(),
                        kind: MemberKind::Host,
                    });
                }
            }
            EnvKind::Group => {
                let groups = groups.unwrap_or_default();
                if groups.contains(&name) {
                    return Err(Error::InvalidEnvironmentShape {
                        name,
                        message: "a group cannot be its own child".to_string(),
                    });
                }
                if self.inventory.groups.contains_key(&name) {
                    return Err(Error::InventoryConflict {
                        name,
                        message: "group defined more than once".to_string(),
                    });
                }
                self.inventory
                    .groups
                    .insert(name.clone(), Environment::new(id, &name, kind, vars.clone()));
                for host in hosts.unwrap_or_default() {
                    self.memberships.push(Membership {
                        group: name.clone(),
                        member: host,
                        kind: MemberKind::Host,
                    });
                }
                for parent in groups {
                    self.memberships.push(Membership {
                        group: parent,
                        member: name.clone(),
                        kind: MemberKind::Group,
                    });
                }
            }
        }
        debug!("Registered {} '{}' (env {})", kind, name, id);

        let has_tasks = match map.get("tasks") {
            None | Some(Value::Null) => false,
            Some(Value::Sequence(items)) => !items.is_empty(),
            Some(_) => true,
        };
        Ok(has_tasks.then(|| TaskListRequest {
            env_name: name,
            env_kind: kind,
            env_id: id,
            vars,
            tasks: map.get("tasks").cloned().unwrap_or(Value::Null),
        }))
    }

    fn add_host(&mut self, id: u32, name: &str, vars: Mapping) -> Result<()> {
        match self.inventory.hosts.get_mut(name) {
            None => {
                self.inventory
                    .hosts
                    .insert(name.to_string(), Environment::new(id, name, EnvKind::Host, vars));
                Ok(())
            }
            Some(existing) => {
                if let Some(clash) = vars.keys().find(|k| existing.vars.contains_key(*k)) {
                    return Err(Error::InventoryConflict {
                        name: name.to_string(),
                        message: format!(
                            "variable {} is defined more than once",
                            clash.as_str().unwrap_or("<non-string key>")
                        ),
                    });
                }
                existing.vars.extend(vars);
                Ok(())
            }
        }
    }

    fn resolve_memberships(&mut self) -> Result<()> {
        for membership in std::mem::take(&mut self.memberships) {
            if !self.inventory.groups.contains_key(&membership.group) {
                return Err(Error::UnknownMember {
                    name: membership.group,
                    referenced_by: membership.member,
                });
            }
            if membership.kind == MemberKind::Host
                && !self.inventory.hosts.contains_key(&membership.member)
            {
                let id = self.next_id();
                debug!("Registering implicit host '{}'", membership.member);
                self.add_host(id, &membership.member, Mapping::new())?;
            }
            let Some(group) = self.inventory.groups.get_mut(&membership.group) else {
                continue;
            };
            let members = match membership.kind {
                MemberKind::Host => &mut group.hosts,
                MemberKind::Group => &mut group.children,
            };
            if !members.contains(&membership.member) {
                members.push(membership.member);
            }
        }
        Ok(())
    }
}

impl Processor for InventoryCompiler {
    type Input = Value;
    type Output = TaskListRequest;

    fn process(&mut self, item: Value) -> Result<Vec<TaskListRequest>> {
        Ok(self.register(&item)?.into_iter().collect())
    }

    fn finalize(&mut self) -> Result<Vec<TaskListRequest>> {
        self.resolve_memberships()?;
        if let Some(localhost) = self.inventory.hosts.get_mut(DEFAULT_ENV_NAME) {
            if !localhost.vars.contains_key("connection") {
                localhost
                    .vars
                    .insert(key("connection"), Value::from("local"));
            }
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frkl::run;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    fn compile(records: &[&str]) -> Result<(Inventory, Vec<TaskListRequest>)> {
        let mut compiler = InventoryCompiler::new(EnvKind::Group);
        let requests = run(&mut compiler, records.iter().map(|r| yaml(r)))?;
        Ok((compiler.into_inventory(), requests))
    }

    #[test]
    fn test_type_inference() {
        let (inventory, _) = compile(&[
            "meta: {name: web, hosts: [a]}",
            "meta: {name: b, groups: [web]}",
            "meta: {name: dev}",
            "meta: {name: c, type: host}",
        ])
        .unwrap();
        assert_eq!(inventory.group("web").unwrap().kind, EnvKind::Group);
        assert!(inventory.host("b").is_some());
        assert!(inventory.group("dev").is_some());
        assert!(inventory.host("c").is_some());
        assert_eq!(inventory.group("web").unwrap().hosts, vec!["a", "b"]);
    }

    #[test]
    fn test_implicit_hosts_and_localhost_connection() {
        let (inventory, _) = compile(&["meta: {name: all-local, hosts: [localhost]}"]).unwrap();
        let localhost = inventory.host("localhost").unwrap();
        assert_eq!(localhost.vars, yaml("{connection: local}").as_mapping().unwrap().clone());
    }

    #[test]
    fn test_explicit_connection_is_kept() {
        let (inventory, _) =
            compile(&["meta: {name: localhost, type: host}\nvars: {connection: ssh}"]).unwrap();
        assert_eq!(
            inventory.host("localhost").unwrap().vars.get("connection"),
            Some(&Value::from("ssh"))
        );
    }

    #[test]
    fn test_host_with_hosts_is_invalid() {
        let result = compile(&["meta: {name: x, type: host, hosts: [a]}"]);
        assert!(matches!(result, Err(Error::InvalidEnvironmentShape { .. })));
    }

    #[test]
    fn test_missing_name_is_malformed() {
        let result = compile(&["meta: {type: host}"]);
        assert!(matches!(result, Err(Error::MalformedEnvironment { name: None, .. })));
        let result = compile(&["meta: {name: x, type: cluster}"]);
        assert!(matches!(result, Err(Error::MalformedEnvironment { .. })));
    }

    #[test]
    fn test_duplicate_group_conflicts() {
        let result = compile(&["meta: {name: g, type: group}", "meta: {name: g, type: group}"]);
        assert!(matches!(result, Err(Error::InventoryConflict { .. })));
    }

    #[test]
    fn test_duplicate_host_unions_disjoint_vars() {
        let (inventory, _) = compile(&[
            "meta: {name: h, type: host}\nvars: {a: 1}",
            "meta: {name: h, type: host}\nvars: {b: 2}",
        ])
        .unwrap();
        assert_eq!(inventory.host("h").unwrap().vars.len(), 2);

        let result = compile(&[
            "meta: {name: h, type: host}\nvars: {a: 1}",
            "meta: {name: h, type: host}\nvars: {a: 2}",
        ]);
        assert!(matches!(result, Err(Error::InventoryConflict { .. })));
    }

    #[test]
    fn test_unknown_group_reference() {
        let result = compile(&["meta: {name: h, groups: [missing]}"]);
        match result {
            Err(Error::UnknownMember { name, referenced_by }) => {
                assert_eq!(name, "missing");
                assert_eq!(referenced_by, "h");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_group_cannot_be_own_child() {
        let result = compile(&["meta: {name: g, type: group, groups: [g]}"]);
        assert!(matches!(result, Err(Error::InvalidEnvironmentShape { .. })));
    }

    #[test]
    fn test_requests_only_for_records_with_tasks() {
        let (_, requests) = compile(&[
            "meta: {name: a, type: host}\ntasks: [apt]",
            "meta: {name: b, type: host}",
            "meta: {name: c, type: host}\ntasks: []",
            "meta: {name: d, type: group}\nvars: {x: 1}\ntasks: [git]",
        ])
        .unwrap();
        let names: Vec<(&str, u32)> = requests
            .iter()
            .map(|r| (r.env_name.as_str(), r.env_id))
            .collect();
        assert_eq!(names, vec![("a", 0), ("d", 3)]);
        assert_eq!(requests[1].env_kind, EnvKind::Group);
        assert_eq!(requests[1].vars.len(), 1);
    }

    #[test]
    fn test_render_hosts_file_inline() {
        let (inventory, _) = compile(&[
            "meta: {name: web, hosts: [w1, w2], groups: [prod]}\nvars: {port: 80}",
            "meta: {name: prod, type: group}",
            "meta: {name: w1, type: host}\nvars: {user: m}",
            "meta: {name: lone, type: host}",
        ])
        .unwrap();

        let text = inventory.render_hosts_file(true).unwrap();
        assert_eq!(
            text,
            "lone\n\n[prod]\n\n[prod:children]\nweb\n\n[web]\nw1 user=\"m\"\nw2\n\n[web:vars]\nport=80\n\n"
        );

        let extracted = inventory.render_hosts_file(false).unwrap();
        assert!(!extracted.contains("user="));
        assert!(!extracted.contains(":vars]"));
    }

    #[test]
    fn test_vars_files() {
        let (inventory, _) = compile(&[
            "meta: {name: web, hosts: [w1]}\nvars: {port: 80}",
            "meta: {name: w1, type: host}\nvars: {user: m}",
        ])
        .unwrap();
        let files: Vec<PathBuf> = inventory.vars_files().into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            files,
            vec![
                PathBuf::from("group_vars/web/web.yml"),
                PathBuf::from("host_vars/w1/w1.yml")
            ]
        );
    }
}
