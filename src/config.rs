//! Agent configuration.
//!
//! [`PlatformOptions`] is built once at agent startup and handed by value to
//! every platform. [`AgentConfig`] is the JSON document the `guest-agent`
//! binary reads to pick the OS family and options; every field has a default
//! so an empty object is a valid configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default time a resolver keeps polling for a device.
pub const DEFAULT_DISK_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default spacing between device polls.
pub const DEFAULT_DEVICE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default agent base directory.
pub const DEFAULT_BASE_DIR: &str = "/var/vcap";

/// How virtual disk references are mapped to kernel device nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePathResolutionType {
    /// The guest already sees final device paths.
    #[default]
    Identity,
    /// Rescan SCSI hosts and look the target up in sysfs.
    Scsi,
    /// udev by-id lookup with a mapped-path fallback.
    Virtio,
}

impl DevicePathResolutionType {
    /// Parse a configured value. Unknown values (including `""`) select
    /// [`DevicePathResolutionType::Identity`].
    pub fn parse(value: &str) -> Self {
        match value {
            "virtio" => Self::Virtio,
            "scsi" => Self::Scsi,
            _ => Self::Identity,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "",
            Self::Scsi => "scsi",
            Self::Virtio => "virtio",
        }
    }
}

impl std::fmt::Display for DevicePathResolutionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identity => write!(f, "identity"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

impl std::str::FromStr for DevicePathResolutionType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl Serialize for DevicePathResolutionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DevicePathResolutionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse(&value))
    }
}

/// Linux-specific platform options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinuxOptions {
    /// Which device path resolver to use.
    pub device_path_resolution_type: DevicePathResolutionType,
    /// Bind-mount persistent disks instead of partitioning them.
    pub bind_mount_persistent_disk: bool,
    /// How long a resolver polls before reporting the device missing.
    #[serde(rename = "disk_wait_timeout_ms", with = "duration_ms")]
    pub disk_wait_timeout: Duration,
    /// Spacing between device polls.
    #[serde(rename = "device_poll_interval_ms", with = "duration_ms")]
    pub device_poll_interval: Duration,
}

impl Default for LinuxOptions {
    fn default() -> Self {
        Self {
            device_path_resolution_type: DevicePathResolutionType::Identity,
            bind_mount_persistent_disk: false,
            disk_wait_timeout: DEFAULT_DISK_WAIT_TIMEOUT,
            device_poll_interval: DEFAULT_DEVICE_POLL_INTERVAL,
        }
    }
}

/// Options shared by every platform a provider builds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformOptions {
    pub linux: LinuxOptions,
}

/// Top-level agent configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// OS family to select from the provider (`ubuntu`, `centos`, `dummy`).
    pub platform: String,
    /// Root of the agent's directory layout.
    pub base_dir: PathBuf,
    pub options: PlatformOptions,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            platform: "ubuntu".to_string(),
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            options: PlatformOptions::default(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config("load", format!("{}: {}", path.display(), e)))?;
        Self::from_json(&contents)
            .map_err(|e| Error::config("parse", format!("{}: {}", path.display(), e)))
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(contents: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
