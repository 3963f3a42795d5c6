//! Phase 4: Writing to Disk
//!
//! Writes the laid-out environment to its target directory.
//!
//! ## Process
//!
//! 1.  **Resolve the target**: With `add_timestamp` a `_%Y%m%d_%H%M%S`
//!     suffix is appended to the directory name.
//!
//! 2.  **Check for an existing target**: An existing target is removed when
//!     `force` is set and is a [`Error::TargetExists`] otherwise.
//!
//! 3.  **Stage**: Every file is written into a temporary sibling directory,
//!     with its permissions, which is then renamed into place.
//!
//! 4.  **Install external roles**: If the layout lists external roles the
//!     [`RoleDownloader`] installs them into `roles/external/`.
//!
//! 5.  **Symlink**: With `add_timestamp` and `add_symlink` the requested
//!     target path becomes a symlink to the fresh directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Local;
use log::{debug, info};

use super::layout::ROLE_REQUIREMENTS_FILE;
use crate::config::RenderOptions;
use crate::error::{Error, Result};
use crate::filesystem::MemoryFS;

/// Installs roles listed in a requirements file - allows mocking in tests
pub trait RoleDownloader: Send + Sync {
    fn install(&self, requirements: &Path, roles_dir: &Path) -> Result<()>;
}

/// Installs roles with `ansible-galaxy`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnsibleGalaxy;

impl RoleDownloader for AnsibleGalaxy {
    fn install(&self, requirements: &Path, roles_dir: &Path) -> Result<()> {
        info!("Installing external roles into {}", roles_dir.display());
        let output = Command::new("ansible-galaxy")
            .arg("install")
            .arg("-r")
            .arg(requirements)
            .arg("-p")
            .arg(roles_dir)
            .output()
            .map_err(|e| Error::ExternalTool {
                tool: "ansible-galaxy".to_string(),
                message: format!("failed to start: {}", e),
            })?;

        if !output.status.success() {
            return Err(Error::ExternalTool {
                tool: "ansible-galaxy".to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Writes `staged` according to `options` and returns the directory written.
pub fn execute(
    staged: &MemoryFS,
    options: &RenderOptions,
    downloader: &dyn RoleDownloader,
) -> Result<PathBuf> {
    let target = if options.add_timestamp {
        timestamped(&options.target)
    } else {
        options.target.clone()
    };

    if let Some(link) = symlink_path(options) {
        check_symlink_target(link, options.force)?;
    }
    clear_target(&target, options.force)?;

    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let staging = tempfile::Builder::new()
        .prefix(".nsbl-render-")
        .tempdir_in(&parent)?;
    write_files(staged, staging.path())?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(staging.path(), fs::Permissions::from_mode(0o755))?;
    }
    fs::rename(staging.path(), &target)?;
    info!("Rendered environment into {}", target.display());

    if options.install_external_roles && staged.exists(ROLE_REQUIREMENTS_FILE) {
        downloader.install(
            &target.join(ROLE_REQUIREMENTS_FILE),
            &target.join("roles/external"),
        )?;
    }

    if let Some(link) = symlink_path(options) {
        create_symlink(&target, link)?;
    }
    Ok(target)
}

/// Writes every file of `staged` below `output_path`.
pub fn write_files(staged: &MemoryFS, output_path: &Path) -> Result<()> {
    for (relative_path, file) in staged.files() {
        let full_path = output_path.join(relative_path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full_path, &file.content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, fs::Permissions::from_mode(file.permissions))?;
        }
    }
    debug!("Wrote {} files to {}", staged.len(), output_path.display());
    Ok(())
}

fn timestamped(target: &Path) -> PathBuf {
    let suffix = Local::now().format("_%Y%m%d_%H%M%S").to_string();
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    target.with_file_name(name)
}

fn symlink_path(options: &RenderOptions) -> Option<&Path> {
    (options.add_timestamp && options.add_symlink).then_some(options.target.as_path())
}

fn clear_target(target: &Path, force: bool) -> Result<()> {
    let Ok(metadata) = fs::symlink_metadata(target) else {
        return Ok(());
    };
    if !force {
        return Err(Error::TargetExists {
            path: target.to_path_buf(),
        });
    }
    debug!("Removing existing target {}", target.display());
    if metadata.is_dir() {
        fs::remove_dir_all(target)?;
    } else {
        fs::remove_file(target)?;
    }
    Ok(())
}

/// An existing symlink may be replaced; anything else needs `force`.
fn check_symlink_target(link: &Path, force: bool) -> Result<()> {
    match fs::symlink_metadata(link) {
        Ok(metadata) if metadata.file_type().is_symlink() => Ok(()),
        Ok(_) => clear_target(link, force),
        Err(_) => Ok(()),
    }
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    if fs::symlink_metadata(link).is_ok() {
        fs::remove_file(link)?;
    }
    let absolute = fs::canonicalize(target)?;
    std::os::unix::fs::symlink(absolute, link)?;
    debug!("Linked {} to {}", link.display(), target.display());
    Ok(())
}

#[cfg(not(unix))]
fn create_symlink(_target: &Path, link: &Path) -> Result<()> {
    log::warn!("Symlinks are not supported here, not creating {}", link.display());
    Ok(())
}
