//! # Error Handling
//!
//! This module defines the error taxonomy of the compiler. Every failure the
//! pipeline can surface is a variant of [`Error`], built with `thiserror` so
//! that each one carries its structured context (names, paths, URLs) and a
//! readable message.
//!
//! ## Key Components
//!
//! - **`Error`**: The enum of all failure modes. Document loading, inventory
//!   compilation, alias and role indexing, tasklist compilation, rendering and
//!   executor supervision each have their own variants.
//!
//! - **`ErrorKind`**: A field-less tag for every variant. Callers that need to
//!   branch on *what* went wrong (the CLI, tests) match on
//!   [`Error::kind`] instead of on message text.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! All errors abort the document or render operation in progress and are
//! propagated to the caller unchanged.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for compiler operations
#[derive(Error, Debug)]
pub enum Error {
    /// A document could not be parsed, or its shape does not match what the
    /// consuming stage expects.
    #[error("Malformed document '{origin}': {message}")]
    MalformedDocument { origin: String, message: String },

    /// An environment record is missing required metadata.
    #[error("Malformed environment{}: {message}", name.as_ref().map(|n| format!(" '{}'", n)).unwrap_or_default())]
    MalformedEnvironment {
        name: Option<String>,
        message: String,
    },

    /// An environment record has a shape its type does not allow, e.g. a host
    /// carrying a `hosts` list.
    #[error("Invalid shape for environment '{name}': {message}")]
    InvalidEnvironmentShape { name: String, message: String },

    /// Two environment records cannot be reconciled.
    #[error("Inventory conflict for '{name}': {message}")]
    InventoryConflict { name: String, message: String },

    /// A group referenced as a membership target was never defined.
    #[error("Unknown group '{name}' referenced by '{referenced_by}'")]
    UnknownMember { name: String, referenced_by: String },

    /// Two alias files bind the same alias to different templates.
    #[error("Duplicate task alias '{alias}' in {} conflicts with an earlier definition", file.display())]
    DuplicateAlias { alias: String, file: PathBuf },

    /// A role is neither in the role index nor allowed to be fetched remotely.
    #[error("Unknown role '{name}': not found in any role repository and remote roles are not allowed")]
    UnknownRole { name: String },

    /// An included tasklist could not be located.
    #[error("Tasklist '{name}' not found{}", if searched.is_empty() { String::new() } else { format!(" (searched: {})", searched.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")) })]
    TasklistNotFound { name: String, searched: Vec<PathBuf> },

    /// A remote reference was found but the context forbids remote access.
    #[error("Remote access denied for '{url}': enable allow-remote to fetch remote content")]
    RemoteFetchDenied { url: String },

    /// A task declares a `task-type` outside of module, role and tasklist, or
    /// one that contradicts its include prefix.
    #[error("Invalid task type '{task_type}' for task '{task}'")]
    InvalidTaskType { task: String, task_type: String },

    /// A tasklist includes itself, directly or transitively.
    #[error("Circular tasklist include: {chain}")]
    CircularInclude { chain: String },

    /// Two different files would be materialized under the same name.
    #[error("Conflicting additional {kind} file '{target}'")]
    AdditionalFileConflict { kind: String, target: String },

    /// The render target already exists and `force` was not given.
    #[error("Target '{}' already exists (use force to overwrite)", path.display())]
    TargetExists { path: PathBuf },

    /// The launched executor exited with a non-zero status.
    #[error("Executor failed with exit code {code}")]
    ExecutorFailure { code: i32 },

    /// The executor run was cancelled.
    #[error("Execution interrupted")]
    Interrupted,

    /// The executor produced no output for longer than the idle timeout.
    #[error("Executor produced no output for {seconds}s")]
    IdleTimeout { seconds: u64 },

    /// An external tool (`git`, the role downloader) failed.
    #[error("External tool error: {tool} - {message}")]
    ExternalTool { tool: String, message: String },

    /// Remote content could not be retrieved.
    #[error("Network operation error: {url} - {message}")]
    Network { url: String, message: String },

    /// The launcher template could not be rendered.
    #[error("Template processing error: {0}")]
    Template(#[from] minijinja::Error),

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML (de)serialization error, wrapped from `serde_yaml::Error`.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Field-less classification of [`Error`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedDocument,
    MalformedEnvironment,
    InvalidEnvironmentShape,
    InventoryConflict,
    UnknownMember,
    DuplicateAlias,
    UnknownRole,
    TasklistNotFound,
    RemoteFetchDenied,
    InvalidTaskType,
    CircularInclude,
    AdditionalFileConflict,
    TargetExists,
    ExecutorFailure,
    Interrupted,
    IdleTimeout,
    ExternalTool,
    Network,
    Template,
    Io,
    Yaml,
}

impl Error {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedDocument { .. } => ErrorKind::MalformedDocument,
            Error::MalformedEnvironment { .. } => ErrorKind::MalformedEnvironment,
            Error::InvalidEnvironmentShape { .. } => ErrorKind::InvalidEnvironmentShape,
            Error::InventoryConflict { .. } => ErrorKind::InventoryConflict,
            Error::UnknownMember { .. } => ErrorKind::UnknownMember,
            Error::DuplicateAlias { .. } => ErrorKind::DuplicateAlias,
            Error::UnknownRole { .. } => ErrorKind::UnknownRole,
            Error::TasklistNotFound { .. } => ErrorKind::TasklistNotFound,
            Error::RemoteFetchDenied { .. } => ErrorKind::RemoteFetchDenied,
            Error::InvalidTaskType { .. } => ErrorKind::InvalidTaskType,
            Error::CircularInclude { .. } => ErrorKind::CircularInclude,
            Error::AdditionalFileConflict { .. } => ErrorKind::AdditionalFileConflict,
            Error::TargetExists { .. } => ErrorKind::TargetExists,
            Error::ExecutorFailure { .. } => ErrorKind::ExecutorFailure,
            Error::Interrupted => ErrorKind::Interrupted,
            Error::IdleTimeout { .. } => ErrorKind::IdleTimeout,
            Error::ExternalTool { .. } => ErrorKind::ExternalTool,
            Error::Network { .. } => ErrorKind::Network,
            Error::Template(_) => ErrorKind::Template,
            Error::Io(_) => ErrorKind::Io,
            Error::Yaml(_) => ErrorKind::Yaml,
        }
    }

    /// Shorthand for a [`Error::MalformedDocument`].
    pub(crate) fn malformed(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::MalformedDocument {
            origin: origin.into(),
            message: message.into(),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
