//! Device path resolution.
//!
//! The hypervisor reports a disk as attached before the guest kernel has
//! finished enumerating it, so every resolver except [`IdentityResolver`] is
//! a bounded poll: look for the device node, sleep, look again, and give up
//! with [`Error::DeviceNotFound`] once the configured wait has passed.
//!
//! # Variants
//!
//! | Resolver | Input | Strategy |
//! |----------|-------|----------|
//! | [`IdentityResolver`] | `path` | returned unchanged |
//! | [`ScsiResolver`] | `volume_id` | rescan SCSI hosts, look up the target in sysfs |
//! | [`MappedResolver`] | `path` | try `/dev/xvdX`, `/dev/vdX`, `/dev/sdX` |
//! | [`IdResolver`] | `id` | udev trigger/settle, then `/dev/disk/by-id` |
//! | [`VirtioResolver`] | `id`, `path` | [`IdResolver`], falling back to [`MappedResolver`] |
//!
//! The provider picks one variant per process with [`build_resolver`].

mod id;
mod identity;
mod mapped;
mod scsi;
mod virtio;

pub use id::IdResolver;
pub use identity::IdentityResolver;
pub use mapped::MappedResolver;
pub use scsi::ScsiResolver;
pub use virtio::VirtioResolver;

use crate::config::{DevicePathResolutionType, LinuxOptions};
use crate::error::{Error, Result};
use crate::system::{FileSystem, Udev};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A disk as the virtualization layer names it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceReference {
    /// Logical path from the settings, e.g. `/dev/sdb`.
    #[serde(default)]
    pub path: String,
    /// Disk id / virtio serial.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// SCSI target id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_id: Option<String>,
}

impl DeviceReference {
    /// Reference by logical path only.
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_volume_id(mut self, volume_id: impl Into<String>) -> Self {
        self.volume_id = Some(volume_id.into());
        self
    }
}

impl std::fmt::Display for DeviceReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)?;
        if let Some(id) = &self.id {
            write!(f, " (id {})", id)?;
        }
        if let Some(volume_id) = &self.volume_id {
            write!(f, " (volume {})", volume_id)?;
        }
        Ok(())
    }
}

/// A kernel device node that existed when it was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RealDevicePath(PathBuf);

impl RealDevicePath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Path of the `number`th partition on this device.
    ///
    /// Devices whose name ends in a digit (`nvme0n1`, `loop0`, `mmcblk0`) use
    /// a `p` separator.
    pub fn partition(&self, number: u32) -> PathBuf {
        let device = self.0.to_string_lossy();
        if device.ends_with(|c: char| c.is_ascii_digit()) {
            PathBuf::from(format!("{}p{}", device, number))
        } else {
            PathBuf::from(format!("{}{}", device, number))
        }
    }
}

impl std::fmt::Display for RealDevicePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for RealDevicePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Maps a [`DeviceReference`] to the device node the guest kernel created.
pub trait DevicePathResolver: Send + Sync {
    fn resolve(&self, reference: &DeviceReference) -> Result<RealDevicePath>;
}

/// Budget for one bounded poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollSchedule {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    pub fn from_options(options: &LinuxOptions) -> Self {
        Self::new(options.disk_wait_timeout, options.device_poll_interval)
    }
}

/// Poll `probe` until it yields a device that still exists, or time out.
///
/// The first candidate the probe reports is locked in: later iterations only
/// re-check that path, so one invocation never alternates between candidates.
/// A candidate is returned only after `fs.exists` confirms it. The last check
/// happens at the deadline, so a miss is reported after at least
/// `schedule.timeout` and at most one interval later.
///
/// An `Err` from the probe is returned immediately.
pub(crate) fn poll_for_device<P>(
    fs: &dyn FileSystem,
    schedule: PollSchedule,
    reference: &DeviceReference,
    mut probe: P,
) -> Result<RealDevicePath>
where
    P: FnMut() -> Result<Option<PathBuf>>,
{
    let start = Instant::now();
    let deadline = start + schedule.timeout;
    let mut observed: Option<PathBuf> = None;
    let mut polls = 0u32;

    loop {
        polls += 1;

        if observed.is_none() {
            observed = probe()?;
            if let Some(candidate) = &observed {
                debug!(reference = %reference, candidate = %candidate.display(), "device candidate observed");
            }
        }

        if let Some(candidate) = &observed {
            if fs.exists(candidate) {
                info!(
                    reference = %reference,
                    device = %candidate.display(),
                    polls = polls,
                    "resolved device path"
                );
                return Ok(RealDevicePath::new(candidate.clone()));
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(Error::device_not_found(
                reference.to_string(),
                now.duration_since(start),
            ));
        }

        std::thread::sleep(schedule.interval.min(deadline - now));
    }
}

/// Build the resolver selected by `options.device_path_resolution_type`.
pub fn build_resolver(
    options: &LinuxOptions,
    fs: Arc<dyn FileSystem>,
    udev: Arc<dyn Udev>,
) -> Arc<dyn DevicePathResolver> {
    let schedule = PollSchedule::from_options(options);
    info!(
        resolution = %options.device_path_resolution_type,
        timeout_ms = schedule.timeout.as_millis(),
        interval_ms = schedule.interval.as_millis(),
        "selected device path resolver"
    );

    match options.device_path_resolution_type {
        DevicePathResolutionType::Virtio => Arc::new(VirtioResolver::new(
            IdResolver::new(schedule, udev, fs.clone()),
            MappedResolver::new(schedule, fs),
        )),
        DevicePathResolutionType::Scsi => Arc::new(ScsiResolver::new(schedule, fs)),
        DevicePathResolutionType::Identity => Arc::new(IdentityResolver),
    }
}
