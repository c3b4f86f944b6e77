//! The platform capability surface.

use crate::devicepath::DeviceReference;
use crate::directories::DirProvider;
use crate::error::Result;
use crate::net::Networks;
use crate::stats::StatsCollector;
use crate::vitals::Vitals;
use std::path::Path;
use std::sync::Arc;

/// Operations the agent performs on the guest OS.
///
/// Every setup call blocks until it finishes. Calls against the same disk or
/// interface must not overlap.
pub trait Platform: Send + Sync {
    /// OS family name this platform was registered under.
    fn name(&self) -> &str;

    /// Install `public_key` as the only authorized key of `username`.
    fn setup_ssh(&self, public_key: &str, username: &str) -> Result<()>;

    fn setup_dhcp(&self, networks: &Networks) -> Result<()>;

    /// Apply static addressing, then announce it with gratuitous ARP.
    ///
    /// Announcement happens in the background and never fails this call.
    fn setup_manual_networking(&self, networks: &Networks) -> Result<()>;

    /// Partition, format and mount an ephemeral disk.
    ///
    /// See [`DiskEngine::setup_ephemeral_disk_with_path`](crate::disk::DiskEngine::setup_ephemeral_disk_with_path).
    fn setup_ephemeral_disk_with_path(
        &self,
        reference: &DeviceReference,
        mount_point: &Path,
    ) -> Result<()>;

    fn mount_persistent_disk(&self, reference: &DeviceReference, mount_point: &Path) -> Result<()>;

    fn is_mounted(&self, mount_point: &Path) -> Result<bool>;

    /// Start monit and wait for it to accept requests.
    fn start_monit(&self) -> Result<()>;

    fn vitals(&self) -> Result<Vitals>;

    fn stats_collector(&self) -> Arc<dyn StatsCollector>;

    fn dirs(&self) -> &DirProvider;
}
