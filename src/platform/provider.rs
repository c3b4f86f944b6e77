//! Composition root.

use super::{DummyPlatform, LinuxPlatform, Platform, PlatformDeps};
use crate::config::PlatformOptions;
use crate::devicepath::build_resolver;
use crate::directories::DirProvider;
use crate::error::{Error, Result};
use crate::net::{ArpAnnouncer, ArpConfig, Arping, CentosNetManager, UbuntuNetManager};
use crate::stats::{
    spawn_collector, CollectorHandle, ProcStatsCollector, StatsCollector,
    STATS_COLLECTION_INTERVAL,
};
use crate::system::{CmdRunner, ExecCmdRunner, FileSystem, OsFileSystem, UdevAdm};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Builds every supported platform once and hands them out by name.
///
/// The device path resolver is chosen here from the options and shared by all
/// platforms. The provider also owns the background stats collection thread;
/// it stops when the provider is shut down or dropped.
///
/// Gratuitous ARP runs on background threads. A short-lived process calls
/// [`wait_for_announcements`](Self::wait_for_announcements) before exiting.
pub struct PlatformProvider {
    platforms: HashMap<&'static str, Arc<dyn Platform>>,
    arp: Arping,
    collector: CollectorHandle,
}

impl PlatformProvider {
    pub fn new(
        runner: Arc<dyn CmdRunner>,
        fs: Arc<dyn FileSystem>,
        dirs: DirProvider,
        stats: Arc<dyn StatsCollector>,
        options: PlatformOptions,
    ) -> Result<Self> {
        Self::build(runner, fs, dirs, stats, options, ArpConfig::default())
    }

    fn build(
        runner: Arc<dyn CmdRunner>,
        fs: Arc<dyn FileSystem>,
        dirs: DirProvider,
        stats: Arc<dyn StatsCollector>,
        options: PlatformOptions,
        arp_config: ArpConfig,
    ) -> Result<Self> {
        let udev = Arc::new(UdevAdm::new(runner.clone()));
        let resolver = build_resolver(&options.linux, fs.clone(), udev);

        let deps = PlatformDeps {
            runner: runner.clone(),
            fs: fs.clone(),
            stats: stats.clone(),
            resolver: resolver.clone(),
            dirs: dirs.clone(),
        };
        let arping = Arping::new(runner.clone(), fs.clone(), arp_config);
        let arp: Arc<dyn ArpAnnouncer> = Arc::new(arping.clone());

        let ubuntu = LinuxPlatform::new(
            "ubuntu",
            &deps,
            Box::new(UbuntuNetManager::new(runner.clone(), fs.clone(), arp.clone())),
            &options,
        );
        let centos = LinuxPlatform::new(
            "centos",
            &deps,
            Box::new(CentosNetManager::new(runner, fs.clone(), arp)),
            &options,
        );
        let dummy = DummyPlatform::new(stats.clone(), fs, dirs);

        let mut platforms: HashMap<&'static str, Arc<dyn Platform>> = HashMap::new();
        platforms.insert("ubuntu", Arc::new(ubuntu));
        platforms.insert("centos", Arc::new(centos));
        platforms.insert("dummy", Arc::new(dummy));

        let collector = spawn_collector(stats, STATS_COLLECTION_INTERVAL)?;
        info!(
            platforms = platforms.len(),
            resolution = %options.linux.device_path_resolution_type,
            "platform provider ready"
        );

        Ok(Self {
            platforms,
            arp: arping,
            collector,
        })
    }

    /// Provider wired to the real system.
    pub fn with_defaults(dirs: DirProvider, options: PlatformOptions) -> Result<Self> {
        Self::new(
            Arc::new(ExecCmdRunner::new()),
            Arc::new(OsFileSystem::new()),
            dirs,
            Arc::new(ProcStatsCollector::new()),
            options,
        )
    }

    /// Look up the platform registered for an OS family.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Platform>> {
        self.platforms
            .get(name)
            .cloned()
            .ok_or_else(|| Error::platform_not_found(name))
    }

    /// Block until every ARP announcement started so far has finished.
    pub fn wait_for_announcements(&self) {
        self.arp.wait();
    }

    pub fn is_collecting(&self) -> bool {
        self.collector.is_running()
    }

    /// Stop background stats collection.
    pub fn shutdown(&mut self) {
        self.collector.shutdown();
    }
}
