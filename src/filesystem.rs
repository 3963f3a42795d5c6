//! In-memory staging area for a rendered environment.
//!
//! The renderer lays out every file of the environment in a [`MemoryFS`]
//! first; only a complete layout is written to disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::defaults::is_excluded_dir;
use crate::error::{Error, Result};

/// Represents a file with content and permissions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    /// File content as bytes
    pub content: Vec<u8>,
    /// Unix permission bits
    pub permissions: u32,
}

impl File {
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            content,
            permissions: 0o644,
        }
    }

    pub fn from_string(content: &str) -> Self {
        Self::new(content.as_bytes().to_vec())
    }

    /// An executable file (`0o755`).
    pub fn executable(content: &str) -> Self {
        Self {
            permissions: 0o755,
            ..Self::from_string(content)
        }
    }
}

/// Relative path -> file, iterated in path order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryFS {
    files: BTreeMap<PathBuf, File>,
}

impl MemoryFS {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update a file
    pub fn add_file<P: AsRef<Path>>(&mut self, path: P, file: File) -> Result<()> {
        let path = path.as_ref();
        if path.is_absolute() {
            return Err(Error::malformed(
                path.display().to_string(),
                "staged paths must be relative",
            ));
        }
        self.files.insert(path.to_path_buf(), file);
        Ok(())
    }

    pub fn add_file_string<P: AsRef<Path>>(&mut self, path: P, content: &str) -> Result<()> {
        self.add_file(path, File::from_string(content))
    }

    /// Serializes `value` as YAML into `path`.
    pub fn add_yaml<P: AsRef<Path>, T: serde::Serialize>(&mut self, path: P, value: &T) -> Result<()> {
        let content = serde_yaml::to_string(value)?;
        self.add_file_string(path, &content)
    }

    /// Copies the tree below `source` to `prefix`, keeping executable bits.
    pub fn add_dir_tree<P: AsRef<Path>>(&mut self, source: &Path, prefix: P) -> Result<()> {
        let prefix = prefix.as_ref();
        let walker = WalkDir::new(source)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_excluded_dir(&e.file_name().to_string_lossy()));
        for entry in walker {
            let entry = entry.map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "reading {}: {}",
                    source.display(),
                    e
                )))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(source).map_err(|_| {
                Error::malformed(entry.path().display().to_string(), "path escapes its root")
            })?;
            self.add_copy(entry.path(), prefix.join(relative))?;
        }
        Ok(())
    }

    /// Copies a single file from disk, keeping its executable bit.
    pub fn add_copy<P: AsRef<Path>>(&mut self, source: &Path, path: P) -> Result<()> {
        let mut file = File::new(std::fs::read(source)?);
        file.permissions = source_permissions(source)?;
        self.add_file(path, file)
    }

    pub fn get_file<P: AsRef<Path>>(&self, path: P) -> Option<&File> {
        self.files.get(path.as_ref())
    }

    /// File content as text, if the file exists and is UTF-8.
    pub fn read_string<P: AsRef<Path>>(&self, path: P) -> Option<&str> {
        self.get_file(path)
            .and_then(|f| std::str::from_utf8(&f.content).ok())
    }

    pub fn exists<P: AsRef<Path>>(&self, path: P) -> bool {
        self.files.contains_key(path.as_ref())
    }

    pub fn list_files(&self) -> Vec<PathBuf> {
        self.files.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> impl Iterator<Item = (&PathBuf, &File)> {
        self.files.iter()
    }
}

#[cfg(unix)]
fn source_permissions(path: &Path) -> Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(path)?.permissions().mode();
    Ok(if mode & 0o111 != 0 { 0o755 } else { 0o644 })
}

#[cfg(not(unix))]
fn source_permissions(_path: &Path) -> Result<u32> {
    Ok(0o644)
}
