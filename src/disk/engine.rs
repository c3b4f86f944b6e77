//! Ephemeral and persistent disk setup.

use super::{bytes_to_blocks, Mounter, PartitionPlan, Partitioner};
use crate::config::LinuxOptions;
use crate::devicepath::{DevicePathResolver, DeviceReference, RealDevicePath};
use crate::error::{Error, Result};
use crate::stats::StatsCollector;
use crate::system::{CmdRunner, FileSystem};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Directories created under an ephemeral mount point.
pub const RUNTIME_DIRS: &[&str] = &["sys/log", "sys/run"];

/// Mode for mount points and runtime directories.
const DIR_MODE: u32 = 0o750;

/// Partitions, formats and mounts disks handed to the agent.
///
/// Every step runs once. A failed step is logged with its name and returned;
/// nothing already written to the disk is undone.
pub struct DiskEngine {
    runner: Arc<dyn CmdRunner>,
    fs: Arc<dyn FileSystem>,
    resolver: Arc<dyn DevicePathResolver>,
    partitioner: Arc<dyn Partitioner>,
    stats: Arc<dyn StatsCollector>,
    mounter: Mounter,
    bind_mount_persistent_disk: bool,
}

impl DiskEngine {
    pub fn new(
        runner: Arc<dyn CmdRunner>,
        fs: Arc<dyn FileSystem>,
        resolver: Arc<dyn DevicePathResolver>,
        partitioner: Arc<dyn Partitioner>,
        stats: Arc<dyn StatsCollector>,
        options: &LinuxOptions,
    ) -> Self {
        let mounter = Mounter::new(runner.clone(), fs.clone());
        Self {
            runner,
            fs,
            resolver,
            partitioner,
            stats,
            mounter,
            bind_mount_persistent_disk: options.bind_mount_persistent_disk,
        }
    }

    /// Split the disk into swap and data, then mount the data partition at
    /// `mount_point` with the runtime directory tree.
    ///
    /// Returns early if the data partition is already mounted there.
    pub fn setup_ephemeral_disk_with_path(
        &self,
        reference: &DeviceReference,
        mount_point: &Path,
    ) -> Result<()> {
        info!(reference = %reference, mount_point = %mount_point.display(), "setting up ephemeral disk");

        let device = step("resolve", reference, self.resolver.resolve(reference))?;
        let disk_blocks = step(
            "size-probe",
            reference,
            self.partitioner.disk_size_in_blocks(&device),
        )?;
        let memory_blocks = step("size-probe", reference, self.memory_blocks())?;
        let plan = step(
            "plan",
            reference,
            PartitionPlan::ephemeral(disk_blocks, memory_blocks),
        )?;

        let swap_partition = device.partition(1);
        let data_partition = device.partition(2);

        if step(
            "mount",
            reference,
            self.mounter.is_mounted_at(&data_partition, mount_point),
        )? {
            info!(
                device = %data_partition.display(),
                mount_point = %mount_point.display(),
                "ephemeral disk already mounted, skipping"
            );
            return Ok(());
        }

        info!(
            device = %device,
            disk_blocks = disk_blocks,
            swap_blocks = plan.partitions()[0].size_in_blocks,
            data_blocks = plan.partitions()[1].size_in_blocks,
            "partitioning ephemeral disk"
        );

        step("partition", reference, self.partitioner.partition(&device, &plan))?;
        step(
            "format",
            reference,
            self.format(&swap_partition, "mkswap", &[]),
        )?;
        step(
            "format",
            reference,
            self.format(&data_partition, "mke2fs", &["-t", "ext4", "-j"]),
        )?;
        step("mount", reference, self.mounter.swap_on(&swap_partition))?;
        step(
            "mount",
            reference,
            self.create_mount_point(&data_partition, mount_point),
        )?;
        step(
            "mount",
            reference,
            self.mounter.mount(&data_partition, mount_point, &[]),
        )?;
        step("mkdir", reference, self.create_runtime_dirs(mount_point))?;

        info!(device = %device, mount_point = %mount_point.display(), "ephemeral disk ready");
        Ok(())
    }

    /// Mount a persistent disk at `mount_point`.
    ///
    /// A disk without a first partition gets one ext4 partition spanning the
    /// disk; an existing partition is mounted as is. With bind mounting
    /// enabled the device is bind-mounted and never partitioned.
    pub fn mount_persistent_disk(&self, reference: &DeviceReference, mount_point: &Path) -> Result<()> {
        info!(reference = %reference, mount_point = %mount_point.display(), "mounting persistent disk");

        let device = step("resolve", reference, self.resolver.resolve(reference))?;

        if self.bind_mount_persistent_disk {
            let source = device.as_path();
            if step("mount", reference, self.mounter.is_mounted_at(source, mount_point))? {
                info!(device = %device, "persistent disk already bind-mounted");
                return Ok(());
            }
            step("mount", reference, self.create_mount_point(source, mount_point))?;
            return step(
                "mount",
                reference,
                self.mounter.mount(source, mount_point, &["--bind"]),
            );
        }

        let partition = device.partition(1);
        if step("mount", reference, self.mounter.is_mounted_at(&partition, mount_point))? {
            info!(device = %partition.display(), "persistent disk already mounted");
            return Ok(());
        }

        if !self.fs.exists(&partition) {
            self.partition_persistent(reference, &device, &partition)?;
        }

        step("mount", reference, self.create_mount_point(&partition, mount_point))?;
        step("mount", reference, self.mounter.mount(&partition, mount_point, &[]))
    }

    /// Returns true if anything is mounted at `mount_point`.
    pub fn is_mounted(&self, mount_point: &Path) -> Result<bool> {
        self.mounter.is_mounted(mount_point)
    }

    fn partition_persistent(
        &self,
        reference: &DeviceReference,
        device: &RealDevicePath,
        partition: &Path,
    ) -> Result<()> {
        let disk_blocks = step(
            "size-probe",
            reference,
            self.partitioner.disk_size_in_blocks(device),
        )?;
        let plan = step("plan", reference, PartitionPlan::single(disk_blocks))?;

        info!(device = %device, disk_blocks = disk_blocks, "partitioning persistent disk");
        step("partition", reference, self.partitioner.partition(device, &plan))?;
        step(
            "format",
            reference,
            self.format(partition, "mke2fs", &["-t", "ext4", "-j"]),
        )
    }

    fn memory_blocks(&self) -> Result<u64> {
        let mem = self
            .stats
            .mem_stats()
            .map_err(|e| Error::size_probe("physical memory", e.to_string()))?;
        Ok(bytes_to_blocks(mem.total))
    }

    fn format(&self, partition: &Path, tool: &str, flags: &[&str]) -> Result<()> {
        let partition_str = partition.to_string_lossy();
        let mut args = flags.to_vec();
        args.push(&*partition_str);

        let output = self
            .runner
            .run(tool, &args)
            .map_err(|e| Error::format(&*partition_str, e.to_string()))?;
        if !output.success() {
            return Err(Error::format(
                &*partition_str,
                format!("{} {}", tool, output.failure_reason()),
            ));
        }

        info!(device = %partition.display(), tool = %tool, "formatted partition");
        Ok(())
    }

    fn create_mount_point(&self, device: &Path, mount_point: &Path) -> Result<()> {
        self.fs.mkdir_all(mount_point, DIR_MODE).map_err(|e| {
            Error::mount(
                device.to_string_lossy(),
                mount_point,
                format!("creating mount point: {}", e),
            )
        })
    }

    fn create_runtime_dirs(&self, mount_point: &Path) -> Result<()> {
        for dir in RUNTIME_DIRS {
            let path = mount_point.join(dir);
            self.fs
                .mkdir_all(&path, DIR_MODE)
                .map_err(|e| Error::directory_creation(&path, e.to_string()))?;
        }
        Ok(())
    }
}

/// Log a failed step with its name before handing the result back.
fn step<T>(name: &'static str, reference: &DeviceReference, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        error!(step = name, reference = %reference, error = %e, "disk setup failed");
    }
    result
}
