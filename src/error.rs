//! Error types for guest-agent.
//!
//! # Error Message Style Guide
//!
//! All error messages follow a consistent format so an operator reading the
//! agent log can tell a missing device from a formatting tool failure from a
//! timeout:
//!
//! - **Format**: `"<operation> failed: <reason>"` or `"<entity> not found: <identifier>"`
//! - **Case**: All lowercase (Rust convention for error messages)
//! - **Context**: Include the device, mount point or path when available
//!
//! ## Preferred Patterns
//!
//! ```text
//! "device not found: /dev/sdb (waited 10000ms)"
//! "format failed: /dev/xvdb1: mkswap exited with 1: ..."
//! "directory creation failed: /data/sys/log: permission denied"
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using guest-agent's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in platform operations.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Device Resolution Errors
    // ========================================================================
    /// Device path resolution exhausted its polling budget.
    #[error("device not found: {reference} (waited {}ms)", .waited.as_millis())]
    DeviceNotFound {
        /// Human-readable form of the device reference.
        reference: String,
        /// How long the resolver polled before giving up.
        waited: Duration,
    },

    // ========================================================================
    // Disk Setup Errors
    // ========================================================================
    /// Disk size could not be determined.
    #[error("size probe failed: {device}: {reason}")]
    SizeProbe {
        /// Device that was probed.
        device: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Writing the partition table failed.
    #[error("partition failed: {device}: {reason}")]
    Partition {
        /// Device being partitioned.
        device: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Creating a filesystem or swap area failed.
    #[error("format failed: {device}: {reason}")]
    Format {
        /// Partition being formatted.
        device: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Mounting (or activating swap on) a partition failed.
    #[error("mount failed: {device} on {}: {reason}", .mount_point.display())]
    Mount {
        /// Device being mounted.
        device: String,
        /// Target mount point.
        mount_point: PathBuf,
        /// The reason for the failure.
        reason: String,
    },

    /// Post-mount directory layout could not be created.
    #[error("directory creation failed: {}: {reason}", .path.display())]
    DirectoryCreation {
        /// Directory that could not be created.
        path: PathBuf,
        /// The reason for the failure.
        reason: String,
    },

    // ========================================================================
    // Provider Errors
    // ========================================================================
    /// Unknown OS family requested from the provider.
    #[error("platform not found: {name}")]
    PlatformNotFound {
        /// Requested OS family.
        name: String,
    },

    // ========================================================================
    // Retry Errors
    // ========================================================================
    /// A bounded retry gave up.
    #[error("retry failed after {attempts} attempts: {}", last_reason(.last))]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Error reported by the final attempt, if any.
        #[source]
        last: Option<Box<Error>>,
    },

    // ========================================================================
    // Network Errors
    // ========================================================================
    /// Network configuration failed.
    #[error("network operation failed: {operation}: {reason}")]
    Network {
        /// The operation that failed (e.g., "find interface", "restart networking").
        operation: String,
        /// The reason for the failure.
        reason: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration operation failed.
    #[error("config operation failed: {operation}: {reason}")]
    Config {
        /// The operation that failed (e.g., "load", "parse").
        operation: String,
        /// The reason for the failure.
        reason: String,
    },

    // ========================================================================
    // Stats Errors
    // ========================================================================
    /// Statistics sampling failed.
    #[error("stats operation failed: {operation}: {reason}")]
    Stats {
        /// The sample that failed (e.g., "read meminfo").
        operation: String,
        /// The reason for the failure.
        reason: String,
    },

    // ========================================================================
    // Command Execution Errors
    // ========================================================================
    /// External command could not be run or reported failure.
    #[error("command '{command}' failed: {reason}")]
    CommandFailed {
        /// The command that failed.
        command: String,
        /// Error message or reason for failure.
        reason: String,
    },

    // ========================================================================
    // IO Errors
    // ========================================================================
    /// IO error wrapper.
    #[error("io operation failed: {0}")]
    Io(#[from] std::io::Error),
}

fn last_reason(last: &Option<Box<Error>>) -> String {
    match last {
        Some(e) => e.to_string(),
        None => "attempts exhausted".to_string(),
    }
}

impl Error {
    /// Create a device not found error.
    pub fn device_not_found(reference: impl Into<String>, waited: Duration) -> Self {
        Self::DeviceNotFound {
            reference: reference.into(),
            waited,
        }
    }

    /// Create a size probe error.
    pub fn size_probe(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SizeProbe {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Create a partition error.
    pub fn partition(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Partition {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Create a format error.
    pub fn format(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Format {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Create a mount error.
    pub fn mount(
        device: impl Into<String>,
        mount_point: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Mount {
            device: device.into(),
            mount_point: mount_point.into(),
            reason: reason.into(),
        }
    }

    /// Create a directory creation error.
    pub fn directory_creation(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::DirectoryCreation {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a platform not found error.
    pub fn platform_not_found(name: impl Into<String>) -> Self {
        Self::PlatformNotFound { name: name.into() }
    }

    /// Create a network operation error.
    pub fn network(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a config operation error.
    pub fn config(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a stats operation error.
    pub fn stats(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Stats {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a command failed error.
    pub fn command_failed(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error means a device never showed up.
    ///
    /// Virtio resolution uses this to decide whether to fall back.
    pub fn is_device_not_found(&self) -> bool {
        matches!(self, Self::DeviceNotFound { .. })
    }
}
