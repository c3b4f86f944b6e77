//! Filesystem primitives used by the platform.

use crate::error::{Error, Result};
use nix::unistd::User;
use std::fs;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};

/// Filesystem operations the platform needs.
///
/// Paths are absolute guest paths. Implementations must be safe to share
/// between threads.
pub trait FileSystem: Send + Sync {
    /// Whether anything (file, directory, device node, symlink target) exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Create `path` and any missing parents, then set `mode` on `path`.
    fn mkdir_all(&self, path: &Path, mode: u32) -> Result<()>;

    /// Write `contents`, replacing any previous file.
    fn write_file(&self, path: &Path, contents: &str) -> Result<()>;

    /// Write `contents` and set the permission bits to `mode`.
    fn write_file_with_mode(&self, path: &Path, contents: &str, mode: u32) -> Result<()>;

    /// Read a whole file as UTF-8.
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Names of the entries in a directory, sorted.
    fn list_dir(&self, path: &Path) -> Result<Vec<String>>;

    /// Follow a symlink one level, resolving a relative target against the
    /// link's directory.
    fn read_link(&self, path: &Path) -> Result<PathBuf>;

    /// Home directory of `username`.
    fn home_dir(&self, username: &str) -> Result<PathBuf>;
}

/// Join a link target onto the link's parent when the target is relative.
pub(crate) fn resolve_link_target(link: &Path, target: PathBuf) -> PathBuf {
    if target.is_absolute() {
        return normalize(&target);
    }
    let base = link.parent().unwrap_or_else(|| Path::new("/"));
    normalize(&base.join(target))
}

/// Lexically collapse `.` and `..` components (no filesystem access).
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// [`FileSystem`] backed by the real OS filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl OsFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for OsFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> Result<()> {
        fs::DirBuilder::new()
            .recursive(true)
            .mode(mode)
            .create(path)?;
        // DirBuilder mode is filtered by the umask; set it explicitly.
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
        Ok(())
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    fn write_file_with_mode(&self, path: &Path, contents: &str, mode: u32) -> Result<()> {
        self.write_file(path, contents)?;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
        Ok(())
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path)?)
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let mut names = fs::read_dir(path)?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    fn read_link(&self, path: &Path) -> Result<PathBuf> {
        let target = fs::read_link(path)?;
        Ok(resolve_link_target(path, target))
    }

    fn home_dir(&self, username: &str) -> Result<PathBuf> {
        let user = User::from_name(username)
            .map_err(|e| Error::config("find home directory", format!("{}: {}", username, e)))?
            .ok_or_else(|| Error::config("find home directory", format!("unknown user {}", username)))?;
        Ok(user.dir)
    }
}
