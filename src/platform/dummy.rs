//! No-op platform for tests and bootstrap.

use super::Platform;
use crate::devicepath::DeviceReference;
use crate::directories::DirProvider;
use crate::error::Result;
use crate::net::Networks;
use crate::stats::StatsCollector;
use crate::system::FileSystem;
use crate::vitals::{Vitals, VitalsService};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Accepts every setup call without touching the system.
pub struct DummyPlatform {
    stats: Arc<dyn StatsCollector>,
    dirs: DirProvider,
    vitals: VitalsService,
}

impl DummyPlatform {
    pub fn new(stats: Arc<dyn StatsCollector>, fs: Arc<dyn FileSystem>, dirs: DirProvider) -> Self {
        let vitals = VitalsService::new(stats.clone(), fs, dirs.clone());
        Self {
            stats,
            dirs,
            vitals,
        }
    }
}

impl Platform for DummyPlatform {
    fn name(&self) -> &str {
        "dummy"
    }

    fn setup_ssh(&self, _public_key: &str, username: &str) -> Result<()> {
        debug!(user = %username, "dummy platform: skipping ssh setup");
        Ok(())
    }

    fn setup_dhcp(&self, networks: &Networks) -> Result<()> {
        debug!(networks = networks.len(), "dummy platform: skipping dhcp setup");
        Ok(())
    }

    fn setup_manual_networking(&self, networks: &Networks) -> Result<()> {
        debug!(networks = networks.len(), "dummy platform: skipping manual networking");
        Ok(())
    }

    fn setup_ephemeral_disk_with_path(
        &self,
        reference: &DeviceReference,
        mount_point: &Path,
    ) -> Result<()> {
        debug!(
            reference = %reference,
            mount_point = %mount_point.display(),
            "dummy platform: skipping ephemeral disk"
        );
        Ok(())
    }

    fn mount_persistent_disk(&self, reference: &DeviceReference, mount_point: &Path) -> Result<()> {
        debug!(
            reference = %reference,
            mount_point = %mount_point.display(),
            "dummy platform: skipping persistent disk"
        );
        Ok(())
    }

    fn is_mounted(&self, _mount_point: &Path) -> Result<bool> {
        Ok(false)
    }

    fn start_monit(&self) -> Result<()> {
        Ok(())
    }

    fn vitals(&self) -> Result<Vitals> {
        self.vitals.get()
    }

    fn stats_collector(&self) -> Arc<dyn StatsCollector> {
        self.stats.clone()
    }

    fn dirs(&self) -> &DirProvider {
        &self.dirs
    }
}
