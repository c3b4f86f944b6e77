//! Partition table writing and disk size probing.

use super::PartitionPlan;
use crate::devicepath::RealDevicePath;
use crate::error::{Error, Result};
use crate::system::CmdRunner;
use std::sync::Arc;
use tracing::{debug, info};

/// Writes partition tables and reports disk sizes.
pub trait Partitioner: Send + Sync {
    /// Disk size in 512-byte blocks.
    fn disk_size_in_blocks(&self, device: &RealDevicePath) -> Result<u64>;

    /// Replace the partition table of `device` with `plan`.
    fn partition(&self, device: &RealDevicePath, plan: &PartitionPlan) -> Result<()>;
}

/// [`Partitioner`] backed by `blockdev` and `sfdisk`.
pub struct SfdiskPartitioner {
    runner: Arc<dyn CmdRunner>,
}

impl SfdiskPartitioner {
    pub fn new(runner: Arc<dyn CmdRunner>) -> Self {
        Self { runner }
    }
}

impl Partitioner for SfdiskPartitioner {
    fn disk_size_in_blocks(&self, device: &RealDevicePath) -> Result<u64> {
        let device_str = device.to_string();
        let output = self
            .runner
            .run("blockdev", &["--getsz", device_str.as_str()])
            .map_err(|e| Error::size_probe(&device_str, e.to_string()))?;

        if !output.success() {
            return Err(Error::size_probe(&device_str, output.failure_reason()));
        }

        let blocks = output.stdout.trim().parse::<u64>().map_err(|e| {
            Error::size_probe(
                &device_str,
                format!("unexpected blockdev output {:?}: {}", output.stdout.trim(), e),
            )
        })?;

        debug!(device = %device, blocks = blocks, "probed disk size");
        Ok(blocks)
    }

    fn partition(&self, device: &RealDevicePath, plan: &PartitionPlan) -> Result<()> {
        let device_str = device.to_string();
        let layout = plan.to_sfdisk_input();

        info!(
            device = %device,
            partitions = plan.partitions().len(),
            "writing partition table"
        );

        let output = self
            .runner
            .run_with_stdin("sfdisk", &["-uS", device_str.as_str()], &layout)
            .map_err(|e| Error::partition(&device_str, e.to_string()))?;

        if !output.success() {
            return Err(Error::partition(&device_str, output.failure_reason()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::fakes::FakeCmdRunner;
    use crate::system::CmdOutput;

    fn setup() -> (Arc<FakeCmdRunner>, SfdiskPartitioner) {
        let runner = Arc::new(FakeCmdRunner::new());
        let partitioner = SfdiskPartitioner::new(runner.clone());
        (runner, partitioner)
    }

    #[test]
    fn test_size_probe_parses_sectors() {
        let (runner, partitioner) = setup();
        runner.set_result("blockdev --getsz /dev/xvdb", CmdOutput::ok("2000000\n"));

        let size = partitioner
            .disk_size_in_blocks(&RealDevicePath::new("/dev/xvdb"))
            .unwrap();
        assert_eq!(size, 2_000_000);
    }

    #[test]
    fn test_size_probe_rejects_garbage() {
        let (runner, partitioner) = setup();
        runner.set_result("blockdev --getsz /dev/xvdb", CmdOutput::ok("lots"));

        let err = partitioner
            .disk_size_in_blocks(&RealDevicePath::new("/dev/xvdb"))
            .unwrap_err();
        assert!(matches!(err, Error::SizeProbe { .. }));
        assert!(err.to_string().contains("lots"));
    }

    #[test]
    fn test_size_probe_reports_exit_status() {
        let (runner, partitioner) = setup();
        runner.set_result(
            "blockdev --getsz /dev/xvdb",
            CmdOutput::failed(1, "No such device"),
        );

        let err = partitioner
            .disk_size_in_blocks(&RealDevicePath::new("/dev/xvdb"))
            .unwrap_err();
        assert!(err.to_string().contains("No such device"));
    }

    #[test]
    fn test_partition_feeds_layout_on_stdin() {
        let (runner, partitioner) = setup();
        let plan = PartitionPlan::ephemeral(2_000_000, 600_000).unwrap();

        partitioner
            .partition(&RealDevicePath::new("/dev/xvdb"), &plan)
            .unwrap();

        assert_eq!(runner.rendered_commands(), vec!["sfdisk -uS /dev/xvdb"]);
        assert_eq!(runner.stdin_inputs(), vec![",600000,S\n,,L\n"]);
    }

    #[test]
    fn test_partition_failure_is_partition_error() {
        let (runner, partitioner) = setup();
        runner.set_result("sfdisk -uS /dev/xvdb", CmdOutput::failed(1, "device busy"));
        let plan = PartitionPlan::single(1000).unwrap();

        let err = partitioner
            .partition(&RealDevicePath::new("/dev/xvdb"), &plan)
            .unwrap_err();
        assert!(matches!(err, Error::Partition { .. }));
        assert!(err.to_string().contains("device busy"));
    }
}
