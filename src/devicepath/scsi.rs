//! SCSI resolution via sysfs.

use super::{poll_for_device, DevicePathResolver, DeviceReference, PollSchedule, RealDevicePath};
use crate::error::{Error, Result};
use crate::system::FileSystem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const SCSI_HOST_DIR: &str = "/sys/class/scsi_host";
const SCSI_DEVICES_DIR: &str = "/sys/bus/scsi/devices";

/// Wildcard channel/target/lun written to a host's `scan` file.
const RESCAN_ALL: &str = "- - -";

/// Finds a disk by its SCSI target id.
///
/// Each poll asks every SCSI host to rescan, then looks for a
/// `<host>:0:<volume_id>:0` device in sysfs and reads the block device name
/// the kernel attached to it.
pub struct ScsiResolver {
    schedule: PollSchedule,
    fs: Arc<dyn FileSystem>,
}

impl ScsiResolver {
    pub fn new(schedule: PollSchedule, fs: Arc<dyn FileSystem>) -> Self {
        Self { schedule, fs }
    }

    fn rescan(&self) {
        let hosts = match self.fs.list_dir(Path::new(SCSI_HOST_DIR)) {
            Ok(hosts) => hosts,
            Err(e) => {
                debug!(error = %e, "no scsi hosts to rescan");
                return;
            }
        };

        for host in hosts {
            let scan = Path::new(SCSI_HOST_DIR).join(&host).join("scan");
            // A host that refuses the rescan does not stop the others.
            if let Err(e) = self.fs.write_file(&scan, RESCAN_ALL) {
                warn!(host = %host, error = %e, "scsi rescan failed");
            }
        }
    }

    fn lookup(&self, volume_id: &str) -> Result<Option<PathBuf>> {
        self.rescan();

        let devices = match self.fs.list_dir(Path::new(SCSI_DEVICES_DIR)) {
            Ok(devices) => devices,
            Err(_) => return Ok(None),
        };

        for address in devices.iter().filter(|a| matches_target(a, volume_id)) {
            let block_dir = Path::new(SCSI_DEVICES_DIR).join(address).join("block");
            if let Ok(names) = self.fs.list_dir(&block_dir) {
                if let Some(name) = names.first() {
                    debug!(address = %address, block = %name, "found scsi block device");
                    return Ok(Some(Path::new("/dev").join(name)));
                }
            }
        }

        Ok(None)
    }
}

/// True for sysfs addresses `<host>:0:<target>:0`.
fn matches_target(address: &str, target: &str) -> bool {
    let parts: Vec<&str> = address.split(':').collect();
    matches!(
        parts.as_slice(),
        [host, "0", t, "0"] if *t == target && !host.is_empty() && host.chars().all(|c| c.is_ascii_digit())
    )
}

impl DevicePathResolver for ScsiResolver {
    fn resolve(&self, reference: &DeviceReference) -> Result<RealDevicePath> {
        let volume_id = reference.volume_id.as_deref().ok_or_else(|| {
            Error::config(
                "resolve scsi device",
                format!("no volume id configured for {}", reference.path),
            )
        })?;

        poll_for_device(self.fs.as_ref(), self.schedule, reference, || {
            self.lookup(volume_id)
        })
    }
}
