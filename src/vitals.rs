//! Vitals snapshot reported by the agent.

use crate::directories::DirProvider;
use crate::disk::read_mounts;
use crate::error::Result;
use crate::stats::{DiskStats, MemStats, StatsCollector};
use crate::system::FileSystem;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vitals {
    /// 1, 5 and 15 minute load averages.
    pub load: [f64; 3],
    pub cpu: CpuVitals,
    pub mem: MemoryVitals,
    pub swap: MemoryVitals,
    pub disk: DiskVitals,
}

/// CPU time percentages over the last collection interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CpuVitals {
    pub user: f64,
    pub sys: f64,
    pub wait: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MemoryVitals {
    pub percent: f64,
    pub kb: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DiskUsage {
    pub percent: f64,
    pub inode_percent: f64,
}

/// Usage of the root, ephemeral and persistent filesystems. Disks that are
/// not mounted are left out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DiskVitals {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<DiskUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ephemeral: Option<DiskUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent: Option<DiskUsage>,
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    // One decimal place.
    (used as f64 / total as f64 * 1000.0).round() / 10.0
}

impl From<MemStats> for MemoryVitals {
    fn from(stats: MemStats) -> Self {
        Self {
            percent: percent(stats.used, stats.total),
            kb: stats.used / 1024,
        }
    }
}

impl From<DiskStats> for DiskUsage {
    fn from(stats: DiskStats) -> Self {
        Self {
            percent: percent(stats.used, stats.total),
            inode_percent: percent(stats.inode_used, stats.inode_total),
        }
    }
}

/// Builds [`Vitals`] from the shared stats collector.
pub struct VitalsService {
    stats: Arc<dyn StatsCollector>,
    fs: Arc<dyn FileSystem>,
    dirs: DirProvider,
}

impl VitalsService {
    pub fn new(stats: Arc<dyn StatsCollector>, fs: Arc<dyn FileSystem>, dirs: DirProvider) -> Self {
        Self { stats, fs, dirs }
    }

    pub fn get(&self) -> Result<Vitals> {
        let load = self.stats.cpu_load()?;
        let cpu = self.stats.cpu_stats()?;

        Ok(Vitals {
            load: [load.one, load.five, load.fifteen],
            cpu: CpuVitals {
                user: percent(cpu.user, cpu.total),
                sys: percent(cpu.sys, cpu.total),
                wait: percent(cpu.wait, cpu.total),
            },
            mem: self.stats.mem_stats()?.into(),
            swap: self.stats.swap_stats()?.into(),
            disk: DiskVitals {
                system: self.disk_usage(Path::new("/"), false),
                ephemeral: self.disk_usage(&self.dirs.data_dir(), true),
                persistent: self.disk_usage(&self.dirs.store_dir(), true),
            },
        })
    }

    fn disk_usage(&self, path: &Path, require_mount: bool) -> Option<DiskUsage> {
        if require_mount && !self.is_mount_point(path) {
            return None;
        }
        match self.stats.disk_stats(path) {
            Ok(stats) => Some(stats.into()),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no disk stats");
                None
            }
        }
    }

    fn is_mount_point(&self, path: &Path) -> bool {
        match read_mounts(self.fs.as_ref()) {
            Ok(mounts) => mounts.iter().any(|m| m.mount_point == path),
            Err(e) => {
                debug!(error = %e, "cannot read mount table");
                false
            }
        }
    }
}
