//! # List Commands
//!
//! `list-groups`, `list-hosts` and `list-tasks` compile the configuration
//! sources and print what they contain without rendering anything.

use std::borrow::Cow;
use std::io::{self, Write};

use anyhow::Result;
use clap::Args;
use ptree::{write_tree, Style, TreeItem};

use nsbl::inventory::Inventory;
use nsbl::phases::CompiledEnvironment;
use nsbl::tasklist::TaskList;
use nsbl::tasks::{RoleOrigin, TaskItem, TaskKind, TasklistTarget};

use super::CompileArgs;

/// Arguments shared by the list commands
#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub compile: CompileArgs,
}

/// Prints every group with its member hosts and child groups.
pub fn groups(args: ListArgs) -> Result<()> {
    let model = args.compile.compile()?;
    let stdout = io::stdout();
    write_groups(&model.inventory, &mut stdout.lock())?;
    Ok(())
}

/// Prints every host with the groups it belongs to.
pub fn hosts(args: ListArgs) -> Result<()> {
    let model = args.compile.compile()?;
    let stdout = io::stdout();
    write_hosts(&model.inventory, &mut stdout.lock())?;
    Ok(())
}

/// Prints the compiled tasks of every environment as a tree.
pub fn tasks(args: ListArgs) -> Result<()> {
    let model = args.compile.compile()?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for env in &model.environments {
        write_tree(&environment_tree(env), &mut out)?;
    }
    Ok(())
}

fn write_groups<W: Write>(inventory: &Inventory, out: &mut W) -> io::Result<()> {
    for group in inventory.groups() {
        let mut members: Vec<&str> = group.hosts.iter().map(String::as_str).collect();
        members.extend(group.children.iter().map(String::as_str));
        if members.is_empty() {
            writeln!(out, "{}", group.name)?;
        } else {
            writeln!(out, "{}: {}", group.name, members.join(", "))?;
        }
    }
    Ok(())
}

fn write_hosts<W: Write>(inventory: &Inventory, out: &mut W) -> io::Result<()> {
    for host in inventory.hosts() {
        let groups = inventory.groups_of(&host.name);
        if groups.is_empty() {
            writeln!(out, "{}", host.name)?;
        } else {
            writeln!(out, "{} ({})", host.name, groups.join(", "))?;
        }
    }
    Ok(())
}

/// Tree node for ptree display
#[derive(Clone)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: Write>(&self, f: &mut W, _style: &Style) -> io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        Cow::Borrowed(&self.children)
    }
}

fn environment_tree(env: &CompiledEnvironment) -> TreeNode {
    TreeNode {
        label: format!("{} ({})", env.name, env.kind),
        children: tasklist_nodes(&env.tasklist),
    }
}

fn tasklist_nodes(list: &TaskList) -> Vec<TreeNode> {
    let mut nodes: Vec<TreeNode> = list
        .tasks
        .iter()
        .map(|task| TreeNode {
            label: task_label(task),
            children: Vec::new(),
        })
        .collect();
    nodes.extend(list.children.iter().map(|child| TreeNode {
        label: format!(
            "included: {}",
            child.source.as_deref().unwrap_or("<inline>")
        ),
        children: tasklist_nodes(child),
    }));
    nodes
}

fn task_label(task: &TaskItem) -> String {
    let detail = match &task.kind {
        TaskKind::Module => "module".to_string(),
        TaskKind::Role { origin, include } => {
            let origin = match origin {
                RoleOrigin::Internal => "internal",
                RoleOrigin::External => "external",
            };
            format!("role, {}, {}", origin, include.role_keyword())
        }
        TaskKind::Tasklist { include, target } => match target {
            TasklistTarget::Expression(expr) => format!("tasklist, {}, {}", include.tasks_keyword(), expr),
            _ => format!("tasklist, {}", include.tasks_keyword()),
        },
    };
    if task.display_name() == task.task_name {
        format!("{} [{}]", task.task_name, detail)
    } else {
        format!("{}: {} [{}]", task.display_name(), task.task_name, detail)
    }
}
