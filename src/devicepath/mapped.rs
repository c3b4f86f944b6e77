//! Resolution by device-name mapping.
//!
//! Xen guests see `/dev/sdb` as `/dev/xvdb`, KVM virtio guests as `/dev/vdb`.

use super::{poll_for_device, DevicePathResolver, DeviceReference, PollSchedule, RealDevicePath};
use crate::error::Result;
use crate::system::FileSystem;
use std::path::PathBuf;
use std::sync::Arc;

/// Prefixes tried for an `/dev/sd*` path, in priority order.
const MAPPED_PREFIXES: &[&str] = &["/dev/xvd", "/dev/vd", "/dev/sd"];

/// Tries the `xvd`, `vd` and `sd` spellings of the configured path.
pub struct MappedResolver {
    schedule: PollSchedule,
    fs: Arc<dyn FileSystem>,
}

impl MappedResolver {
    pub fn new(schedule: PollSchedule, fs: Arc<dyn FileSystem>) -> Self {
        Self { schedule, fs }
    }

    fn candidates(path: &str) -> Vec<PathBuf> {
        match path.strip_prefix("/dev/sd") {
            Some(suffix) => MAPPED_PREFIXES
                .iter()
                .map(|prefix| PathBuf::from(format!("{}{}", prefix, suffix)))
                .collect(),
            None => vec![PathBuf::from(path)],
        }
    }
}

impl DevicePathResolver for MappedResolver {
    fn resolve(&self, reference: &DeviceReference) -> Result<RealDevicePath> {
        let candidates = Self::candidates(&reference.path);

        poll_for_device(self.fs.as_ref(), self.schedule, reference, || {
            Ok(candidates.iter().find(|c| self.fs.exists(c)).cloned())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::fakes::FakeFileSystem;
    use std::path::Path;
    use std::time::{Duration, Instant};

    fn resolver(fs: Arc<FakeFileSystem>, timeout_ms: u64) -> MappedResolver {
        MappedResolver::new(
            PollSchedule::new(Duration::from_millis(timeout_ms), Duration::from_millis(20)),
            fs,
        )
    }

    #[test]
    fn test_candidates_order() {
        assert_eq!(
            MappedResolver::candidates("/dev/sdc"),
            vec![
                PathBuf::from("/dev/xvdc"),
                PathBuf::from("/dev/vdc"),
                PathBuf::from("/dev/sdc"),
            ]
        );
        assert_eq!(
            MappedResolver::candidates("/dev/nvme1n1"),
            vec![PathBuf::from("/dev/nvme1n1")]
        );
    }

    #[test]
    fn test_prefers_xvd_when_several_exist() {
        let fs = Arc::new(FakeFileSystem::new());
        fs.touch("/dev/xvda");
        fs.touch("/dev/vda");

        let resolved = resolver(fs, 200)
            .resolve(&DeviceReference::from_path("/dev/sda"))
            .unwrap();
        assert_eq!(resolved.as_path(), Path::new("/dev/xvda"));
    }

    #[test]
    fn test_device_appearing_within_timeout() {
        let fs = Arc::new(FakeFileSystem::new());
        let appear = fs.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            appear.touch("/dev/vda");
        });

        let start = Instant::now();
        let resolved = resolver(fs, 2000)
            .resolve(&DeviceReference::from_path("/dev/sda"))
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(resolved.as_path(), Path::new("/dev/vda"));
        assert!(elapsed >= Duration::from_millis(150));
        assert!(elapsed < Duration::from_millis(150 + 20 + 200), "elapsed {:?}", elapsed);
    }

    #[test]
    fn test_device_appearing_after_timeout() {
        let fs = Arc::new(FakeFileSystem::new());
        let appear = fs.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(400));
            appear.touch("/dev/xvda");
        });

        let err = resolver(fs, 100)
            .resolve(&DeviceReference::from_path("/dev/sda"))
            .unwrap_err();
        assert!(err.is_device_not_found());
    }
}
