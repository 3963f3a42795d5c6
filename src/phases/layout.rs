//! Phase 3: Layout
//!
//! Lays out the compiled model as the files of a runnable environment:
//!
//! ```text
//! <target>/
//!   inventory/hosts                 (+ group_vars/, host_vars/ when extracting)
//!   plays/play_<env>_<id>.yml       one per compiled environment
//!   plays/all_plays.yml             imports every play in registration order
//!   plays/ansible.cfg
//!   plays/{action,callback,filter}_plugins/, plays/library/
//!   roles/internal/<role>/
//!   roles/external/roles_requirements.yml
//!   task_lists/
//!   run_all_plays.sh
//! ```

use std::path::{Path, PathBuf};

use ini::Ini;
use log::debug;
use minijinja::{context, Environment};
use serde_yaml::{Mapping, Value};

use super::CompiledModel;
use crate::config::{LauncherOptions, RenderOptions};
use crate::error::{Error, Result};
use crate::filesystem::{File, MemoryFS};
use crate::merge::key;
use crate::tasklist::{AdditionalFile, AdditionalFiles, FileKind, FileSource};

pub const INVENTORY_FILE: &str = "inventory/hosts";
pub const ALL_PLAYS_FILE: &str = "all_plays.yml";
pub const LAUNCHER_FILE: &str = "run_all_plays.sh";
pub const ROLE_REQUIREMENTS_FILE: &str = "roles/external/roles_requirements.yml";

const LAUNCHER_TEMPLATE: &str = r#"#!/usr/bin/env bash
# Runs all plays of this environment.
set -o pipefail

HERE="$(cd "$(dirname "${BASH_SOURCE[0]}")" && pwd)"
{% if extra_path %}
export PATH="{{ extra_path }}:$PATH"
{% endif %}
ASK_BECOME_PASS={% if ask_become_pass %}true{% else %}false{% endif %}

while [ $# -gt 0 ]; do
  case "$1" in
    -K|--ask-become-pass) ASK_BECOME_PASS=true ;;
    --no-ask-become-pass) ASK_BECOME_PASS=false ;;
    *) break ;;
  esac
  shift
done

ARGS=(-i "$HERE/{{ inventory }}")
{% if verbosity_flag %}
ARGS+=({{ verbosity_flag }})
{% endif %}
if [ "$ASK_BECOME_PASS" = true ]; then
  ARGS+=(--ask-become-pass)
fi

cd "$HERE/plays" || exit 1
ansible-playbook "${ARGS[@]}" "$@" {{ playbook }}
"#;

/// Builds the complete environment in memory.
pub fn execute(model: &CompiledModel, options: &RenderOptions) -> Result<MemoryFS> {
    let mut fs = MemoryFS::new();

    add_inventory(&mut fs, model, options.extract_vars)?;
    add_plays(&mut fs, model)?;
    fs.add_file_string("plays/ansible.cfg", &ansible_cfg()?)?;

    let mut files = AdditionalFiles::new();
    for env in &model.environments {
        files.extend(&env.tasklist.additional_files)?;
    }
    for file in files.iter() {
        add_additional_file(&mut fs, file)?;
    }

    let external = model.external_roles();
    if !external.is_empty() {
        let requirements: Vec<Value> = external
            .iter()
            .map(|name| {
                let mut entry = Mapping::new();
                entry.insert(key("src"), Value::from(*name));
                Value::Mapping(entry)
            })
            .collect();
        fs.add_yaml(ROLE_REQUIREMENTS_FILE, &requirements)?;
    }

    fs.add_file(
        LAUNCHER_FILE,
        File::executable(&render_launcher(&options.launcher)?),
    )?;

    debug!("Laid out {} files", fs.len());
    Ok(fs)
}

fn add_inventory(fs: &mut MemoryFS, model: &CompiledModel, extract_vars: bool) -> Result<()> {
    fs.add_file_string(
        INVENTORY_FILE,
        &model.inventory.render_hosts_file(!extract_vars)?,
    )?;
    if extract_vars {
        for (path, vars) in model.inventory.vars_files() {
            fs.add_yaml(Path::new("inventory").join(path), vars)?;
        }
    }
    Ok(())
}

fn add_plays(fs: &mut MemoryFS, model: &CompiledModel) -> Result<()> {
    let mut imports = Vec::with_capacity(model.environments.len());
    for env in &model.environments {
        let mut play = Mapping::new();
        play.insert(key("hosts"), Value::from(env.name.as_str()));
        play.insert(key("vars"), Value::Mapping(env.tasklist.playbook_vars()));
        play.insert(key("tasks"), env.tasklist.render_tasks());

        let name = env.playbook_name();
        fs.add_yaml(
            Path::new("plays").join(&name),
            &Value::Sequence(vec![Value::Mapping(play)]),
        )?;

        let mut import = Mapping::new();
        import.insert(key("import_playbook"), Value::from(name));
        imports.push(Value::Mapping(import));
    }
    fs.add_yaml(
        Path::new("plays").join(ALL_PLAYS_FILE),
        &Value::Sequence(imports),
    )
}

fn add_additional_file(fs: &mut MemoryFS, file: &AdditionalFile) -> Result<()> {
    let path = file.path();
    match (&file.source, file.kind) {
        (FileSource::Path(source), FileKind::Role) => fs.add_dir_tree(source, path),
        (FileSource::Path(source), _) => fs.add_copy(source, path),
        (FileSource::Inline(tasks), FileKind::Role) => {
            fs.add_file_string(path.join("tasks/main.yml"), tasks)?;
            fs.add_file_string(path.join("meta/main.yml"), "dependencies: []\n")
        }
        (FileSource::Inline(content), _) => fs.add_file_string(path, content),
    }
}

/// `plays/ansible.cfg`, relative to the `plays/` directory.
fn ansible_cfg() -> Result<String> {
    let mut conf = Ini::new();
    let mut section = conf.with_section(Some("defaults"));
    section
        .set("inventory", "../inventory/hosts")
        .set("roles_path", "../roles/internal:../roles/external")
        .set("retry_files_enabled", "False");
    for kind in FileKind::PLUGINS {
        section.set(kind.source_dir_name(), plugin_dir(kind).display().to_string());
    }

    let mut out = Vec::new();
    conf.write_to(&mut out)?;
    String::from_utf8(out).map_err(|e| Error::malformed("ansible.cfg", e.to_string()))
}

fn plugin_dir(kind: FileKind) -> PathBuf {
    let placement = Path::new(kind.placement());
    Path::new("./").join(placement.strip_prefix("plays").unwrap_or(placement))
}

/// Renders the launcher script.
pub fn render_launcher(options: &LauncherOptions) -> Result<String> {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.set_trim_blocks(true);
    env.add_template("launcher", LAUNCHER_TEMPLATE)?;

    let verbosity_flag = if options.verbosity > 0 {
        format!("-{}", "v".repeat(usize::from(options.verbosity)))
    } else {
        String::new()
    };
    let script = env.get_template("launcher")?.render(context! {
        inventory => INVENTORY_FILE,
        playbook => ALL_PLAYS_FILE,
        verbosity_flag => verbosity_flag,
        ask_become_pass => options.ask_become_pass,
        extra_path => options.extra_path.as_deref().unwrap_or_default(),
    })?;
    Ok(script)
}
