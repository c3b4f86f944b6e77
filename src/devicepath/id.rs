//! Resolution through udev's `/dev/disk/by-id` links.

use super::{poll_for_device, DevicePathResolver, DeviceReference, PollSchedule, RealDevicePath};
use crate::error::{Error, Result};
use crate::system::{FileSystem, Udev};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Directory udev populates with stable disk links.
pub const DISK_BY_ID_DIR: &str = "/dev/disk/by-id";

/// Virtio exposes at most this many bytes of the disk serial.
const VIRTIO_SERIAL_LEN: usize = 20;

/// Finds the device whose by-id link carries the disk id.
pub struct IdResolver {
    schedule: PollSchedule,
    udev: Arc<dyn Udev>,
    fs: Arc<dyn FileSystem>,
}

impl IdResolver {
    pub fn new(schedule: PollSchedule, udev: Arc<dyn Udev>, fs: Arc<dyn FileSystem>) -> Self {
        Self { schedule, udev, fs }
    }

    /// Look for a by-id entry ending in the (truncated) id and follow it.
    fn lookup(&self, id: &str) -> Result<Option<PathBuf>> {
        self.udev.trigger()?;
        self.udev.settle()?;

        let serial: String = id.chars().take(VIRTIO_SERIAL_LEN).collect();
        let by_id = Path::new(DISK_BY_ID_DIR);

        // by-id does not exist until udev has created the first link.
        let entries = match self.fs.list_dir(by_id) {
            Ok(entries) => entries,
            Err(_) => return Ok(None),
        };

        // Whole-disk links only; partition links carry a "-partN" suffix.
        let Some(name) = entries.iter().find(|name| name.ends_with(&serial)) else {
            return Ok(None);
        };

        let link = by_id.join(name);
        let target = self.fs.read_link(&link)?;
        debug!(link = %link.display(), target = %target.display(), "found by-id link");
        Ok(Some(target))
    }
}

impl DevicePathResolver for IdResolver {
    fn resolve(&self, reference: &DeviceReference) -> Result<RealDevicePath> {
        let id = reference.id.as_deref().ok_or_else(|| {
            Error::config(
                "resolve device by id",
                format!("no disk id configured for {}", reference.path),
            )
        })?;

        poll_for_device(self.fs.as_ref(), self.schedule, reference, || self.lookup(id))
    }
}
