//! Platform abstraction.
//!
//! A [`Platform`] is everything the agent does to the guest OS: disks,
//! networking, ssh keys, the process supervisor and vitals. The
//! [`PlatformProvider`] builds one instance per supported OS family up front
//! and hands them out by name.
//!
//! # Families
//!
//! | Name | Implementation | Network configuration |
//! |------|----------------|-----------------------|
//! | `ubuntu` | [`LinuxPlatform`] | [`UbuntuNetManager`](crate::net::UbuntuNetManager) |
//! | `centos` | [`LinuxPlatform`] | [`CentosNetManager`](crate::net::CentosNetManager) |
//! | `dummy` | [`DummyPlatform`] | none |

mod dummy;
mod linux;
mod provider;
mod traits;

pub use dummy::DummyPlatform;
pub use linux::LinuxPlatform;
pub use provider::PlatformProvider;
pub use traits::Platform;

use crate::devicepath::DevicePathResolver;
use crate::directories::DirProvider;
use crate::stats::StatsCollector;
use crate::system::{CmdRunner, FileSystem};
use std::sync::Arc;

/// Collaborators shared by every platform a provider builds.
#[derive(Clone)]
pub struct PlatformDeps {
    pub runner: Arc<dyn CmdRunner>,
    pub fs: Arc<dyn FileSystem>,
    pub stats: Arc<dyn StatsCollector>,
    pub resolver: Arc<dyn DevicePathResolver>,
    pub dirs: DirProvider,
}
