//! Disk commands.

use super::Context;
use clap::{Args, Subcommand};
use guest_agent::devicepath::DeviceReference;
use std::path::PathBuf;

/// Prepare disks
#[derive(Subcommand, Debug)]
pub enum DiskCmd {
    /// Partition, format and mount the ephemeral disk
    Ephemeral(EphemeralCmd),

    /// Mount a persistent disk, partitioning it on first use
    Persistent(PersistentCmd),
}

impl DiskCmd {
    pub fn run(self, ctx: &Context) -> guest_agent::Result<()> {
        match self {
            DiskCmd::Ephemeral(cmd) => cmd.run(ctx),
            DiskCmd::Persistent(cmd) => cmd.run(ctx),
        }
    }
}

/// Disk as named in the agent settings.
#[derive(Args, Debug)]
pub struct DiskArgs {
    /// Logical device path (e.g. /dev/sdb)
    pub path: String,

    /// Disk id / virtio serial
    #[arg(long)]
    pub id: Option<String>,

    /// SCSI target id
    #[arg(long)]
    pub volume_id: Option<String>,
}

impl DiskArgs {
    fn reference(&self) -> DeviceReference {
        DeviceReference {
            path: self.path.clone(),
            id: self.id.clone(),
            volume_id: self.volume_id.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct EphemeralCmd {
    #[command(flatten)]
    disk: DiskArgs,

    /// Mount point (defaults to <base_dir>/data)
    #[arg(long)]
    mount_point: Option<PathBuf>,
}

impl EphemeralCmd {
    pub fn run(self, ctx: &Context) -> guest_agent::Result<()> {
        let (_provider, platform) = ctx.platform()?;
        let mount_point = self.mount_point.unwrap_or_else(|| ctx.dirs().data_dir());

        platform.setup_ephemeral_disk_with_path(&self.disk.reference(), &mount_point)?;
        println!("Ephemeral disk mounted at {}", mount_point.display());
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct PersistentCmd {
    #[command(flatten)]
    disk: DiskArgs,

    /// Mount point (defaults to <base_dir>/store)
    #[arg(long)]
    mount_point: Option<PathBuf>,
}

impl PersistentCmd {
    pub fn run(self, ctx: &Context) -> guest_agent::Result<()> {
        let (_provider, platform) = ctx.platform()?;
        let mount_point = self.mount_point.unwrap_or_else(|| ctx.dirs().store_dir());

        platform.mount_persistent_disk(&self.disk.reference(), &mount_point)?;
        println!("Persistent disk mounted at {}", mount_point.display());
        Ok(())
    }
}
