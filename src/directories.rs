//! Agent directory layout.

use std::path::{Path, PathBuf};

/// Paths under the agent base directory (`/var/vcap` by default).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirProvider {
    base_dir: PathBuf,
}

impl DirProvider {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Ephemeral disk mount point.
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Persistent disk mount point.
    pub fn store_dir(&self) -> PathBuf {
        self.base_dir.join("store")
    }
}
