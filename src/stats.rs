//! System statistics sampling.
//!
//! [`ProcStatsCollector`] reads `/proc` and `statvfs(3)`. CPU usage is a rate,
//! so it needs two samples; the background loop started by
//! [`spawn_collector`] keeps the most recent delta around for
//! [`StatsCollector::cpu_stats`].

use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Interval between background CPU samples.
pub const STATS_COLLECTION_INTERVAL: Duration = Duration::from_secs(10);

/// Load averages.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuLoad {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

/// CPU time in clock ticks over a sampling window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuStats {
    pub user: u64,
    pub sys: u64,
    pub wait: u64,
    pub total: u64,
}

impl CpuStats {
    fn delta(&self, earlier: &CpuStats) -> CpuStats {
        CpuStats {
            user: self.user.saturating_sub(earlier.user),
            sys: self.sys.saturating_sub(earlier.sys),
            wait: self.wait.saturating_sub(earlier.wait),
            total: self.total.saturating_sub(earlier.total),
        }
    }
}

/// Memory or swap usage in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemStats {
    pub total: u64,
    pub used: u64,
}

/// Filesystem usage for one mount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskStats {
    pub total: u64,
    pub used: u64,
    pub inode_total: u64,
    pub inode_used: u64,
}

/// Source of system statistics.
pub trait StatsCollector: Send + Sync {
    fn cpu_load(&self) -> Result<CpuLoad>;

    /// CPU time spent over the last collection interval.
    fn cpu_stats(&self) -> Result<CpuStats>;

    fn mem_stats(&self) -> Result<MemStats>;

    fn swap_stats(&self) -> Result<MemStats>;

    fn disk_stats(&self, path: &Path) -> Result<DiskStats>;

    /// Sample CPU counters every `interval` until `stop` fires or its sender
    /// is dropped. Blocks the calling thread.
    fn start_collecting(&self, interval: Duration, stop: Receiver<()>);
}

/// [`StatsCollector`] backed by `/proc`.
pub struct ProcStatsCollector {
    proc_root: PathBuf,
    samples: RwLock<CpuSamples>,
}

#[derive(Default)]
struct CpuSamples {
    previous: Option<CpuStats>,
    delta: Option<CpuStats>,
}

impl Default for ProcStatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcStatsCollector {
    pub fn new() -> Self {
        Self::with_proc_root("/proc")
    }

    /// Read procfs files from `root` instead of `/proc`.
    pub fn with_proc_root(root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: root.into(),
            samples: RwLock::new(CpuSamples::default()),
        }
    }

    fn read_proc(&self, name: &str) -> Result<String> {
        let path = self.proc_root.join(name);
        std::fs::read_to_string(&path)
            .map_err(|e| Error::stats(format!("read {}", name), format!("{}: {}", path.display(), e)))
    }

    fn sample_cpu(&self) -> Result<CpuStats> {
        parse_proc_stat(&self.read_proc("stat")?)
    }

    fn meminfo(&self) -> Result<MemInfo> {
        Ok(parse_meminfo(&self.read_proc("meminfo")?))
    }

    /// Take one CPU sample and update the stored delta.
    fn collect_once(&self) -> Result<()> {
        let current = self.sample_cpu()?;
        let mut samples = self.samples.write();
        if let Some(previous) = samples.previous {
            samples.delta = Some(current.delta(&previous));
        }
        samples.previous = Some(current);
        Ok(())
    }
}

impl StatsCollector for ProcStatsCollector {
    fn cpu_load(&self) -> Result<CpuLoad> {
        parse_loadavg(&self.read_proc("loadavg")?)
    }

    fn cpu_stats(&self) -> Result<CpuStats> {
        if let Some(delta) = self.samples.read().delta {
            return Ok(delta);
        }
        // Not enough samples yet: report totals since boot.
        self.sample_cpu()
    }

    fn mem_stats(&self) -> Result<MemStats> {
        let info = self.meminfo()?;
        let free = info.free + info.buffers + info.cached;
        Ok(MemStats {
            total: info.total,
            used: info.total.saturating_sub(free),
        })
    }

    fn swap_stats(&self) -> Result<MemStats> {
        let info = self.meminfo()?;
        Ok(MemStats {
            total: info.swap_total,
            used: info.swap_total.saturating_sub(info.swap_free),
        })
    }

    fn disk_stats(&self, path: &Path) -> Result<DiskStats> {
        statvfs(path)
    }

    fn start_collecting(&self, interval: Duration, stop: Receiver<()>) {
        info!(interval_ms = interval.as_millis(), "starting stats collection");
        loop {
            if let Err(e) = self.collect_once() {
                warn!(error = %e, "failed to sample cpu stats");
            }
            match stop.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("stats collection stopped");
    }
}

/// Handle to the background collection thread.
///
/// Dropping the handle stops the loop and joins the thread.
pub struct CollectorHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CollectorHandle {
    /// Signal the loop to stop and wait for it to exit.
    pub fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("stats collection thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for CollectorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Start `collector.start_collecting` on its own thread.
pub fn spawn_collector(
    collector: Arc<dyn StatsCollector>,
    interval: Duration,
) -> Result<CollectorHandle> {
    let (stop_tx, stop_rx) = mpsc::channel();
    let thread = std::thread::Builder::new()
        .name("stats-collector".to_string())
        .spawn(move || collector.start_collecting(interval, stop_rx))?;

    Ok(CollectorHandle {
        stop: Some(stop_tx),
        thread: Some(thread),
    })
}

// ============================================================================
// Parsers
// ============================================================================

#[derive(Debug, Default, PartialEq, Eq)]
struct MemInfo {
    total: u64,
    free: u64,
    buffers: u64,
    cached: u64,
    swap_total: u64,
    swap_free: u64,
}

/// Parse `/proc/meminfo`; values are converted from kB to bytes.
fn parse_meminfo(contents: &str) -> MemInfo {
    let mut info = MemInfo::default();
    for line in contents.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Ok(kb) = value.parse::<u64>() else {
            continue;
        };
        let bytes = kb.saturating_mul(1024);
        match key {
            "MemTotal:" => info.total = bytes,
            "MemFree:" => info.free = bytes,
            "Buffers:" => info.buffers = bytes,
            "Cached:" => info.cached = bytes,
            "SwapTotal:" => info.swap_total = bytes,
            "SwapFree:" => info.swap_free = bytes,
            _ => {}
        }
    }
    info
}

fn parse_loadavg(contents: &str) -> Result<CpuLoad> {
    let fields: Vec<f64> = contents
        .split_whitespace()
        .take(3)
        .map(|f| f.parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::stats("parse loadavg", e.to_string()))?;

    match fields.as_slice() {
        [one, five, fifteen] => Ok(CpuLoad {
            one: *one,
            five: *five,
            fifteen: *fifteen,
        }),
        _ => Err(Error::stats("parse loadavg", "expected three load averages")),
    }
}

/// Parse the aggregate `cpu` line of `/proc/stat`.
fn parse_proc_stat(contents: &str) -> Result<CpuStats> {
    let line = contents
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| Error::stats("parse stat", "missing cpu line"))?;

    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|v| v.parse::<u64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::stats("parse stat", e.to_string()))?;

    if values.len() < 5 {
        return Err(Error::stats("parse stat", "too few cpu fields"));
    }

    let field = |i: usize| values.get(i).copied().unwrap_or(0);
    // user nice system idle iowait irq softirq steal
    Ok(CpuStats {
        user: field(0) + field(1),
        sys: field(2) + field(5) + field(6),
        wait: field(4),
        total: values.iter().sum(),
    })
}

fn statvfs(path: &Path) -> Result<DiskStats> {
    use std::os::unix::ffi::OsStrExt;

    let path_cstr = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|e| Error::stats("statvfs", e.to_string()))?;

    // SAFETY: statvfs is a plain C struct that can be zero-initialized.
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    // SAFETY: path_cstr is a valid NUL-terminated string and stat is a valid
    // out-pointer for the duration of the call.
    let rc = unsafe { libc::statvfs(path_cstr.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(Error::stats(
            "statvfs",
            format!("{}: {}", path.display(), std::io::Error::last_os_error()),
        ));
    }

    let frsize = stat.f_frsize as u64;
    let total = stat.f_blocks as u64 * frsize;
    let free = stat.f_bfree as u64 * frsize;
    let inode_total = stat.f_files as u64;
    let inode_free = stat.f_ffree as u64;

    Ok(DiskStats {
        total,
        used: total.saturating_sub(free),
        inode_total,
        inode_used: inode_total.saturating_sub(inode_free),
    })
}
