//! Linux platform shared by the Ubuntu and CentOS families.

use super::{Platform, PlatformDeps};
use crate::config::PlatformOptions;
use crate::devicepath::DeviceReference;
use crate::directories::DirProvider;
use crate::disk::{DiskEngine, SfdiskPartitioner};
use crate::error::Result;
use crate::monit;
use crate::net::{NetManager, Networks};
use crate::retry::AttemptRetryStrategy;
use crate::stats::StatsCollector;
use crate::system::{CmdRunner, FileSystem};
use crate::vitals::{Vitals, VitalsService};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const SSH_DIR_MODE: u32 = 0o700;
const AUTHORIZED_KEYS_MODE: u32 = 0o600;

/// [`Platform`] for a Linux distribution; the network dialect comes from the
/// injected [`NetManager`].
pub struct LinuxPlatform {
    name: &'static str,
    runner: Arc<dyn CmdRunner>,
    fs: Arc<dyn FileSystem>,
    stats: Arc<dyn StatsCollector>,
    dirs: DirProvider,
    disks: DiskEngine,
    net: Box<dyn NetManager>,
    vitals: VitalsService,
    monit_strategy: AttemptRetryStrategy,
}

impl LinuxPlatform {
    pub fn new(
        name: &'static str,
        deps: &PlatformDeps,
        net: Box<dyn NetManager>,
        options: &PlatformOptions,
    ) -> Self {
        let disks = DiskEngine::new(
            deps.runner.clone(),
            deps.fs.clone(),
            deps.resolver.clone(),
            Arc::new(SfdiskPartitioner::new(deps.runner.clone())),
            deps.stats.clone(),
            &options.linux,
        );
        let vitals = VitalsService::new(deps.stats.clone(), deps.fs.clone(), deps.dirs.clone());

        Self {
            name,
            runner: deps.runner.clone(),
            fs: deps.fs.clone(),
            stats: deps.stats.clone(),
            dirs: deps.dirs.clone(),
            disks,
            net,
            vitals,
            monit_strategy: AttemptRetryStrategy::for_monit(),
        }
    }

    /// Replace the monit readiness schedule.
    pub fn with_monit_strategy(mut self, strategy: AttemptRetryStrategy) -> Self {
        self.monit_strategy = strategy;
        self
    }
}

impl Platform for LinuxPlatform {
    fn name(&self) -> &str {
        self.name
    }

    fn setup_ssh(&self, public_key: &str, username: &str) -> Result<()> {
        let ssh_dir = self.fs.home_dir(username)?.join(".ssh");
        self.fs.mkdir_all(&ssh_dir, SSH_DIR_MODE)?;
        self.fs.write_file_with_mode(
            &ssh_dir.join("authorized_keys"),
            public_key,
            AUTHORIZED_KEYS_MODE,
        )?;

        let owner = format!("{}:{}", username, username);
        let ssh_dir_str = ssh_dir.to_string_lossy();
        self.runner
            .run_checked("chown", &["-R", owner.as_str(), &*ssh_dir_str])?;

        info!(user = %username, path = %ssh_dir.display(), "installed ssh key");
        Ok(())
    }

    fn setup_dhcp(&self, networks: &Networks) -> Result<()> {
        self.net.setup_dhcp(networks)
    }

    fn setup_manual_networking(&self, networks: &Networks) -> Result<()> {
        self.net.setup_manual_networking(networks)
    }

    fn setup_ephemeral_disk_with_path(
        &self,
        reference: &DeviceReference,
        mount_point: &Path,
    ) -> Result<()> {
        self.disks
            .setup_ephemeral_disk_with_path(reference, mount_point)
    }

    fn mount_persistent_disk(&self, reference: &DeviceReference, mount_point: &Path) -> Result<()> {
        self.disks.mount_persistent_disk(reference, mount_point)
    }

    fn is_mounted(&self, mount_point: &Path) -> Result<bool> {
        self.disks.is_mounted(mount_point)
    }

    fn start_monit(&self) -> Result<()> {
        monit::start_monit(self.runner.as_ref(), &self.monit_strategy)
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
