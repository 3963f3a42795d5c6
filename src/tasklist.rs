//! # Tasklist Compiler
//!
//! Compiles the tasks of one environment into a [`TaskList`]: every entry is
//! flattened, augmented, classified and resolved, and every file the
//! playbook will need at run time (roles, included tasklists, plugins) is
//! collected as an [`AdditionalFile`].
//!
//! ## Per-tasklist states
//!
//! ```text
//! Raw -> Detected -> Expanded -> Classified -> Resolved -> Ready
//! ```
//!
//! Foreign-format documents skip expansion and classification and are
//! carried verbatim. Any error leaves the tasklist unfinished and is
//! returned to the caller.
//!
//! ## Included tasklists
//!
//! A tasklist reference resolves to a local file (searched next to the
//! including file first, then along the configured tasklist paths) or, when
//! remote access is allowed, a URL. Native files are compiled recursively
//! and rendered inline; foreign files are copied as they are. Either way the
//! file is materialized under `task_lists/` and the playbook exposes its path
//! in a `tasklist_<name>` variable. Including a file that is already being
//! compiled is a [`Error::CircularInclude`].

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde_yaml::{Mapping, Value};

use crate::context::CompileContext;
use crate::error::{Error, Result};
use crate::format::{self, TaskListFormat};
use crate::frkl::{run, AugmentingTask, DynamicRoleBuilder, Frkl, FrklFormat, ProcessorExt};
use crate::inventory::TaskListRequest;
use crate::merge::key;
use crate::resolve::{load_text, parse_yaml, Location};
use crate::tasks::{
    classify, IncludeKind, RecordFields, RoleOrigin, TaskItem, TaskKind, TaskType, TasklistTarget,
};

/// Kinds of files materialized next to the playbooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileKind {
    Tasklist,
    Role,
    ActionPlugin,
    CallbackPlugin,
    FilterPlugin,
    LibraryModule,
}

impl FileKind {
    pub const PLUGINS: [FileKind; 4] = [
        FileKind::ActionPlugin,
        FileKind::CallbackPlugin,
        FileKind::FilterPlugin,
        FileKind::LibraryModule,
    ];

    /// Directory, relative to the environment root, files of this kind are
    /// placed in.
    pub fn placement(self) -> &'static str {
        match self {
            FileKind::Tasklist => "task_lists",
            FileKind::Role => "roles/internal",
            FileKind::ActionPlugin => "plays/action_plugins",
            FileKind::CallbackPlugin => "plays/callback_plugins",
            FileKind::FilterPlugin => "plays/filter_plugins",
            FileKind::LibraryModule => "plays/library",
        }
    }

    /// Name of the directory plugins of this kind are discovered in.
    pub fn source_dir_name(self) -> &'static str {
        match self {
            FileKind::Tasklist => "task_lists",
            FileKind::Role => "roles",
            FileKind::ActionPlugin => "action_plugins",
            FileKind::CallbackPlugin => "callback_plugins",
            FileKind::FilterPlugin => "filter_plugins",
            FileKind::LibraryModule => "library",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileKind::Tasklist => "tasklist",
            FileKind::Role => "role",
            FileKind::ActionPlugin => "action-plugin",
            FileKind::CallbackPlugin => "callback-plugin",
            FileKind::FilterPlugin => "filter-plugin",
            FileKind::LibraryModule => "library-module",
        })
    }
}

/// Where the content of an additional file comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// A file, or for roles a directory, copied as it is.
    Path(PathBuf),
    /// Generated content. For roles this is the role's `tasks/main.yml`.
    Inline(String),
}

impl FileSource {
    fn bytes(&self) -> Option<Vec<u8>> {
        match self {
            FileSource::Path(path) if path.is_file() => std::fs::read(path).ok(),
            FileSource::Path(_) => None,
            FileSource::Inline(content) => Some(content.as_bytes().to_vec()),
        }
    }
}

/// A file the rendered environment needs besides the playbooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditionalFile {
    pub kind: FileKind,
    /// File (or role directory) name below the kind's placement directory.
    pub target: String,
    pub source: FileSource,
    /// Playbook variable holding the file's run-time path (tasklists only).
    pub var_name: Option<String>,
}

impl AdditionalFile {
    /// Path relative to the environment root.
    pub fn path(&self) -> PathBuf {
        Path::new(self.kind.placement()).join(&self.target)
    }

    fn same_content(&self, other: &AdditionalFile) -> bool {
        if self.source == other.source {
            return true;
        }
        match (self.source.bytes(), other.source.bytes()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Additional files keyed by kind and target, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdditionalFiles {
    files: Vec<AdditionalFile>,
}

impl AdditionalFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `file`; an identical file under the same name is ignored, a
    /// different one is an [`Error::AdditionalFileConflict`]. So is a
    /// tasklist whose playbook variable already names another file.
    pub fn add(&mut self, file: AdditionalFile) -> Result<()> {
        if let Some(var_name) = &file.var_name {
            if let Some(taken) = self
                .files
                .iter()
                .find(|f| f.var_name.as_ref() == Some(var_name) && f.target != file.target)
            {
                warn!(
                    "Playbook variable {} would name both {} and {}",
                    var_name, taken.target, file.target
                );
                return Err(Error::AdditionalFileConflict {
                    kind: file.kind.to_string(),
                    target: file.target,
                });
            }
        }
        match self
            .files
            .iter()
            .find(|f| f.kind == file.kind && f.target == file.target)
        {
            Some(existing) if existing.same_content(&file) => Ok(()),
            Some(_) => Err(Error::AdditionalFileConflict {
                kind: file.kind.to_string(),
                target: file.target,
            }),
            None => {
                self.files.push(file);
                Ok(())
            }
        }
    }

    pub fn extend(&mut self, other: &AdditionalFiles) -> Result<()> {
        other.iter().try_for_each(|f| self.add(f.clone()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AdditionalFile> {
        self.files.iter()
    }

    pub fn of_kind(&self, kind: FileKind) -> impl Iterator<Item = &AdditionalFile> {
        self.files.iter().filter(move |f| f.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// The compiled tasks of one environment, or of one included file.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskList {
    pub id: u32,
    pub env_name: String,
    pub env_id: u32,
    /// Where the tasks came from, for included files.
    pub source: Option<String>,
    pub tasks: Vec<TaskItem>,
    pub global_vars: Mapping,
    pub env_vars: Mapping,
    pub internal_roles: BTreeSet<String>,
    pub external_roles: BTreeSet<String>,
    pub modules_used: BTreeSet<String>,
    pub additional_files: AdditionalFiles,
    /// Tasklists compiled for native-format includes.
    pub children: Vec<TaskList>,
}

impl TaskList {
    fn new(id: u32, scope: EnvScope<'_>) -> Self {
        Self {
            id,
            env_name: scope.name.to_string(),
            env_id: scope.id,
            source: None,
            tasks: Vec::new(),
            global_vars: Mapping::new(),
            env_vars: Mapping::new(),
            internal_roles: BTreeSet::new(),
            external_roles: BTreeSet::new(),
            modules_used: BTreeSet::new(),
            additional_files: AdditionalFiles::new(),
            children: Vec::new(),
        }
    }

    /// Executor tasks, in input order.
    pub fn render_tasks(&self) -> Value {
        Value::Sequence(self.tasks.iter().map(TaskItem::render).collect())
    }

    /// Play variables: global vars, overridden by environment vars, plus the
    /// path variable of every materialized tasklist.
    pub fn playbook_vars(&self) -> Mapping {
        let mut vars = self.global_vars.clone();
        for (k, v) in &self.env_vars {
            vars.insert(k.clone(), v.clone());
        }
        for file in self.additional_files.of_kind(FileKind::Tasklist) {
            if let Some(var_name) = &file.var_name {
                vars.insert(
                    key(var_name),
                    Value::from(format!("{{{{ playbook_dir }}}}/../task_lists/{}", file.target)),
                );
            }
        }
        vars
    }

    /// Takes over the roles, modules and files of an included tasklist.
    fn absorb(&mut self, child: &TaskList) -> Result<()> {
        self.internal_roles.extend(child.internal_roles.iter().cloned());
        self.external_roles.extend(child.external_roles.iter().cloned());
        self.modules_used.extend(child.modules_used.iter().cloned());
        self.additional_files.extend(&child.additional_files)
    }
}

/// `tasklist_` followed by the basename with non-alphanumerics replaced.
pub fn tasklist_var_name(basename: &str) -> String {
    let sanitized: String = basename
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("tasklist_{}", sanitized)
}

#[derive(Debug, Clone, Copy)]
struct EnvScope<'r> {
    name: &'r str,
    id: u32,
}

/// Compiles task list requests against a [`CompileContext`].
pub struct TasklistCompiler<'a> {
    ctx: &'a mut CompileContext,
    in_flight: Vec<String>,
}

impl<'a> TasklistCompiler<'a> {
    pub fn new(ctx: &'a mut CompileContext) -> Self {
        Self {
            ctx,
            in_flight: Vec::new(),
        }
    }

    /// Compiles the tasks of one environment.
    pub fn compile_request(&mut self, request: &TaskListRequest) -> Result<TaskList> {
        self.in_flight.clear();
        info!("Compiling tasks of environment '{}'", request.env_name);
        let scope = EnvScope {
            name: &request.env_name,
            id: request.env_id,
        };
        let origin = format!("tasks of environment '{}'", request.env_name);

        let detected = format::detect(&request.tasks);
        debug!("{}: detected {:?} format", origin, detected);
        let (tasks, inline_file) = if detected == TaskListFormat::Foreign {
            let target = format!("env_{}_tasks.yml", request.env_id);
            let var_name = tasklist_var_name(&target);
            let file = AdditionalFile {
                kind: FileKind::Tasklist,
                target,
                source: FileSource::Inline(serde_yaml::to_string(&request.tasks)?),
                var_name: Some(var_name.clone()),
            };
            (import_record(&var_name, &request.env_name), Some(file))
        } else {
            (request.tasks.clone(), None)
        };

        let mut list = self.compile(&tasks, &origin, scope, None)?;
        if let Some(file) = inline_file {
            list.additional_files.add(file)?;
        }
        list.global_vars = self.ctx.config().vars.clone();
        list.env_vars = request.vars.clone();
        for plugin in self.ctx.plugins() {
            list.additional_files.add(plugin.clone())?;
        }
        Ok(list)
    }

    fn compile(
        &mut self,
        tasks: &Value,
        origin: &str,
        scope: EnvScope<'_>,
        base_dir: Option<&Path>,
    ) -> Result<TaskList> {
        let id = self.ctx.next_tasklist_id();
        let mut list = TaskList::new(id, scope);

        let records = {
            let mut chain = Frkl::new(FrklFormat::tasks())
                .with_origin(origin)
                .then(AugmentingTask::new(self.ctx.aliases()).with_origin(origin));
            run(&mut chain, [tasks.clone()])?
        };
        debug!("{}: expanded into {} tasks", origin, records.len());

        let mut items = Vec::with_capacity(records.len());
        for record in &records {
            items.push(self.build_item(record, origin, &mut list, scope, base_dir)?);
        }

        for item in &items {
            let name = item.task_name.clone();
            match &item.kind {
                TaskKind::Module => list.modules_used.insert(name),
                TaskKind::Role {
                    origin: RoleOrigin::Internal,
                    ..
                } => list.internal_roles.insert(name),
                TaskKind::Role {
                    origin: RoleOrigin::External,
                    ..
                } => list.external_roles.insert(name),
                TaskKind::Tasklist { .. } => false,
            };
        }

        if self.ctx.config().dynamic_roles {
            items = self.fold_dynamic_roles(items, &mut list)?;
        }
        list.tasks = items;

        for role in list.internal_roles.clone() {
            if let Some(path) = self.ctx.role_index().get(&role) {
                list.additional_files.add(AdditionalFile {
                    kind: FileKind::Role,
                    target: role,
                    source: FileSource::Path(path.to_path_buf()),
                    var_name: None,
                })?;
            }
        }
        debug!("{}: ready ({} tasks)", origin, list.tasks.len());
        Ok(list)
    }

    fn build_item(
        &mut self,
        record: &Value,
        origin: &str,
        list: &mut TaskList,
        scope: EnvScope<'_>,
        base_dir: Option<&Path>,
    ) -> Result<TaskItem> {
        let fields = RecordFields::read(record, origin)?;
        if fields.parse_ignore {
            let target = fields.task_name.clone();
            let kind = TaskKind::Tasklist {
                include: IncludeKind::Import,
                target: TasklistTarget::Variable(target.clone()),
            };
            return Ok(fields.into_item(target, kind));
        }

        let classification = classify(&fields.task_name, fields.task_type)?;
        let include = classification.include.unwrap_or(IncludeKind::Include);
        let kind = match classification.task_type {
            TaskType::Module => TaskKind::Module,
            TaskType::Role => TaskKind::Role {
                origin: self.resolve_role(&classification.target)?,
                include,
            },
            TaskType::Tasklist => TaskKind::Tasklist {
                include,
                target: self.resolve_tasklist(&classification.target, list, scope, base_dir)?,
            },
        };
        Ok(fields.into_item(classification.target, kind))
    }

    fn resolve_role(&self, name: &str) -> Result<RoleOrigin> {
        if self.ctx.role_index().contains(name) {
            Ok(RoleOrigin::Internal)
        } else if self.ctx.allow_remote() {
            debug!("Role '{}' is not indexed, treating it as external", name);
            Ok(RoleOrigin::External)
        } else {
            Err(Error::UnknownRole {
                name: name.to_string(),
            })
        }
    }

    fn resolve_tasklist(
        &mut self,
        target: &str,
        list: &mut TaskList,
        scope: EnvScope<'_>,
        base_dir: Option<&Path>,
    ) -> Result<TasklistTarget> {
        if target.contains("{{") {
            return Ok(TasklistTarget::Expression(target.to_string()));
        }

        let (location, file_key) = self.locate(target, base_dir)?;
        if self.in_flight.contains(&file_key) {
            let mut chain = self.in_flight.clone();
            chain.push(file_key);
            return Err(Error::CircularInclude {
                chain: chain.join(" -> "),
            });
        }

        let content = load_text(&location, self.ctx.fetcher(), self.ctx.allow_remote())?;
        let document = parse_yaml(&file_key, &content)?;
        let basename = location.basename().ok_or_else(|| Error::TasklistNotFound {
            name: target.to_string(),
            searched: Vec::new(),
        })?;
        let var_name = tasklist_var_name(&basename);

        let source = match format::detect(&document) {
            TaskListFormat::Foreign => match location {
                Location::Local(path) => FileSource::Path(path),
                Location::Remote(_) => FileSource::Inline(content),
            },
            TaskListFormat::Native | TaskListFormat::Unknown => {
                let child_base = match &location {
                    Location::Local(path) => path.parent().map(Path::to_path_buf),
                    Location::Remote(_) => None,
                };
                self.in_flight.push(file_key.clone());
                let child = self.compile(&document, &file_key, scope, child_base.as_deref());
                self.in_flight.pop();
                let mut child = child?;
                child.source = Some(file_key);

                let rendered = serde_yaml::to_string(&child.render_tasks())?;
                list.absorb(&child)?;
                list.children.push(child);
                FileSource::Inline(rendered)
            }
        };

        list.additional_files.add(AdditionalFile {
            kind: FileKind::Tasklist,
            target: basename,
            source,
            var_name: Some(var_name.clone()),
        })?;
        Ok(TasklistTarget::Variable(var_name))
    }

    /// Finds the file behind a tasklist reference. Returns the location and
    /// a key identifying it for cycle detection.
    fn locate(&self, target: &str, base_dir: Option<&Path>) -> Result<(Location, String)> {
        let expanded = self.ctx.abbreviations().expand(target)?;
        let relative = match Location::of(&expanded) {
            Location::Remote(url) => return Ok((Location::Remote(url.clone()), url)),
            Location::Local(path) if path.is_absolute() => {
                return if path.is_file() {
                    Ok(local_location(path))
                } else {
                    Err(Error::TasklistNotFound {
                        name: target.to_string(),
                        searched: vec![path],
                    })
                };
            }
            Location::Local(path) => path,
        };

        let mut searched = Vec::new();
        let dirs = base_dir
            .map(Path::to_path_buf)
            .into_iter()
            .chain(self.ctx.config().tasklist_paths.iter().cloned());
        for dir in dirs {
            let candidate = dir.join(&relative);
            if candidate.is_file() {
                return Ok(local_location(candidate));
            }
            searched.push(candidate);
        }
        Err(Error::TasklistNotFound {
            name: target.to_string(),
            searched,
        })
    }

    fn fold_dynamic_roles(&self, items: Vec<TaskItem>, list: &mut TaskList) -> Result<Vec<TaskItem>> {
        let mut builder = DynamicRoleBuilder::new(list.id);
        let items = run(&mut builder, items)?;
        for role in builder.into_roles() {
            let tasks = Value::Sequence(role.tasks.iter().map(TaskItem::render).collect());
            list.internal_roles.insert(role.name.clone());
            list.additional_files.add(AdditionalFile {
                kind: FileKind::Role,
                target: role.name,
                source: FileSource::Inline(serde_yaml::to_string(&tasks)?),
                var_name: None,
            })?;
        }
        Ok(items)
    }
}

fn local_location(path: PathBuf) -> (Location, String) {
    let path = std::fs::canonicalize(&path).unwrap_or(path);
    let file_key = path.display().to_string();
    (Location::Local(path), file_key)
}

/// Synthetic item importing the materialized tasks of an environment.
fn import_record(var_name: &str, env_name: &str) -> Value {
    let mut task = Mapping::new();
    task.insert(key("name"), Value::from(var_name));
    task.insert(key("task-name"), Value::from(var_name));
    task.insert(key("desc"), Value::from(format!("tasks of {}", env_name)));
    task.insert(key("parse_ignore"), Value::Bool(true));
    let mut record = Mapping::new();
    record.insert(key("task"), Value::Mapping(task));
    record.insert(key("vars"), Value::Mapping(Mapping::new()));
    Value::Sequence(vec![Value::Mapping(record)])
}
