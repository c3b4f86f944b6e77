//! Disk preparation.
//!
//! An ephemeral disk is split into swap plus a data partition sized from the
//! guest's physical memory, formatted, and mounted with the agent's runtime
//! directory tree on top. Persistent disks get a single ext4 partition (or a
//! bind mount) and are never repartitioned once they carry one.
//!
//! All sizes are in 512-byte blocks.

mod engine;
mod mounter;
mod partitioner;

pub use engine::{DiskEngine, RUNTIME_DIRS};
pub use mounter::{read_mounts, MountEntry, Mounter, PROC_MOUNTS};
pub use partitioner::{Partitioner, SfdiskPartitioner};

use crate::error::{Error, Result};

/// Block unit used for disk and memory sizes.
pub const BLOCK_SIZE: u64 = 512;

/// Convert a byte count to whole blocks.
pub fn bytes_to_blocks(bytes: u64) -> u64 {
    bytes / BLOCK_SIZE
}

/// Partition type as understood by the partitioning tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionType {
    Swap,
    Linux,
}

impl PartitionType {
    /// Single-letter sfdisk type code.
    pub fn sfdisk_code(&self) -> &'static str {
        match self {
            Self::Swap => "S",
            Self::Linux => "L",
        }
    }
}

impl std::fmt::Display for PartitionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Swap => write!(f, "swap"),
            Self::Linux => write!(f, "linux"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub kind: PartitionType,
    pub size_in_blocks: u64,
}

/// Ordered partition layout. Partition numbers are positional, starting at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    partitions: Vec<Partition>,
}

impl PartitionPlan {
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Layout for an ephemeral disk: swap first, data second.
    ///
    /// Swap gets one memory's worth when the disk is larger than twice the
    /// memory, otherwise half the disk. The data partition always receives
    /// the remainder, so the two sizes add up to `disk_blocks`.
    pub fn ephemeral(disk_blocks: u64, memory_blocks: u64) -> Result<Self> {
        if disk_blocks < 2 {
            return Err(Error::size_probe(
                "ephemeral disk",
                format!("{} blocks is too small for swap and data", disk_blocks),
            ));
        }
        if memory_blocks == 0 {
            return Err(Error::size_probe(
                "physical memory",
                "reported total memory is zero",
            ));
        }

        let swap = if disk_blocks > memory_blocks.saturating_mul(2) {
            memory_blocks
        } else {
            disk_blocks / 2
        };

        Ok(Self {
            partitions: vec![
                Partition {
                    kind: PartitionType::Swap,
                    size_in_blocks: swap,
                },
                Partition {
                    kind: PartitionType::Linux,
                    size_in_blocks: disk_blocks - swap,
                },
            ],
        })
    }

    /// Layout for a persistent disk: one Linux partition over the whole disk.
    pub fn single(disk_blocks: u64) -> Result<Self> {
        if disk_blocks == 0 {
            return Err(Error::size_probe("persistent disk", "disk reports zero blocks"));
        }
        Ok(Self {
            partitions: vec![Partition {
                kind: PartitionType::Linux,
                size_in_blocks: disk_blocks,
            }],
        })
    }

    /// sfdisk input (`start,size,type` per line, sectors).
    ///
    /// The last partition is written without a size so it absorbs whatever
    /// the tool's alignment leaves of the disk.
    pub fn to_sfdisk_input(&self) -> String {
        let last = self.partitions.len().saturating_sub(1);
        self.partitions
            .iter()
            .enumerate()
            .map(|(i, p)| {
                if i == last {
                    format!(",,{}\n", p.kind.sfdisk_code())
                } else {
                    format!(",{},{}\n", p.size_in_blocks, p.kind.sfdisk_code())
                }
            })
            .collect()
    }
}
