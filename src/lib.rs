//! guest-agent - platform configuration for VM guests
//!
//! The agent runs inside a freshly booted virtual machine and brings its
//! disks, network interfaces and process supervisor into the state described
//! by the settings it was given, on whichever OS family and device-attachment
//! mechanism it finds itself.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │  PlatformProvider  (ubuntu | centos | dummy)    │
//! ├─────────────────────────────────────────────────┤
//! │  Platform: disks · networking · monit · vitals  │
//! ├────────────────┬──────────────┬─────────────────┤
//! │  DiskEngine    │  NetManager  │  StatsCollector │
//! │  DevicePath-   │  ArpAnnouncer│  (background)   │
//! │  Resolver      │              │                 │
//! ├────────────────┴──────────────┴─────────────────┤
//! │  CmdRunner · FileSystem · Udev                  │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use guest_agent::config::PlatformOptions;
//! use guest_agent::devicepath::DeviceReference;
//! use guest_agent::directories::DirProvider;
//! use guest_agent::platform::PlatformProvider;
//!
//! let dirs = DirProvider::new("/var/vcap");
//! let provider = PlatformProvider::with_defaults(dirs.clone(), PlatformOptions::default())?;
//! let platform = provider.get("ubuntu")?;
//!
//! platform.setup_ephemeral_disk_with_path(
//!     &DeviceReference::from_path("/dev/sdb"),
//!     &dirs.data_dir(),
//! )?;
//! # Ok::<(), guest_agent::Error>(())
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod devicepath;
pub mod directories;
pub mod disk;
pub mod error;
pub mod monit;
pub mod net;
pub mod platform;
pub mod retry;
pub mod stats;
pub mod system;
pub mod vitals;

// Re-export main types for convenience
pub use config::{AgentConfig, DevicePathResolutionType, LinuxOptions, PlatformOptions};
pub use devicepath::{DevicePathResolver, DeviceReference, RealDevicePath};
pub use error::{Error, Result};
pub use platform::{Platform, PlatformProvider};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
