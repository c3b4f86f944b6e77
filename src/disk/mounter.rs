//! Mounting, swap activation and mount table queries.

use crate::error::{Error, Result};
use crate::system::{CmdRunner, FileSystem};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Kernel mount table.
pub const PROC_MOUNTS: &str = "/proc/mounts";

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: PathBuf,
    pub fs_type: String,
}

/// Parse `/proc/mounts`, decoding the octal escapes the kernel uses for
/// whitespace in paths.
pub fn parse_mounts(contents: &str) -> Vec<MountEntry> {
    contents
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let device = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next().unwrap_or_default();
            Some(MountEntry {
                device: unescape(device),
                mount_point: PathBuf::from(unescape(mount_point)),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

/// Read and parse the kernel mount table.
pub fn read_mounts(fs: &dyn FileSystem) -> Result<Vec<MountEntry>> {
    let contents = fs.read_to_string(Path::new(PROC_MOUNTS))?;
    Ok(parse_mounts(&contents))
}

fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            if let Some(digits) = bytes.get(i + 1..i + 4) {
                if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                    let value = digits
                        .iter()
                        .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                    if let Ok(byte) = u8::try_from(value) {
                        out.push(byte);
                        i += 4;
                        continue;
                    }
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    // Escaped bytes may be split UTF-8 sequences; decode once at the end.
    String::from_utf8_lossy(&out).into_owned()
}

/// Mount operations through `mount(8)` and `swapon(8)`.
pub struct Mounter {
    runner: Arc<dyn CmdRunner>,
    fs: Arc<dyn FileSystem>,
}

impl Mounter {
    pub fn new(runner: Arc<dyn CmdRunner>, fs: Arc<dyn FileSystem>) -> Self {
        Self { runner, fs }
    }

    /// Mount `device` at `mount_point` with extra `mount` arguments.
    pub fn mount(&self, device: &Path, mount_point: &Path, options: &[&str]) -> Result<()> {
        let device_str = device.to_string_lossy();
        let target = mount_point.to_string_lossy();

        let mut args: Vec<&str> = options.to_vec();
        args.push(&*device_str);
        args.push(&*target);

        let output = self
            .runner
            .run("mount", &args)
            .map_err(|e| Error::mount(&*device_str, mount_point, e.to_string()))?;
        if !output.success() {
            return Err(Error::mount(
                &*device_str,
                mount_point,
                output.failure_reason(),
            ));
        }

        info!(device = %device.display(), mount_point = %mount_point.display(), "mounted");
        Ok(())
    }

    /// Activate swap on `device`.
    pub fn swap_on(&self, device: &Path) -> Result<()> {
        let device_str = device.to_string_lossy();
        let output = self
            .runner
            .run("swapon", &[&*device_str])
            .map_err(|e| Error::mount(&*device_str, "swap", e.to_string()))?;
        if !output.success() {
            return Err(Error::mount(
                &*device_str,
                "swap",
                output.failure_reason(),
            ));
        }

        info!(device = %device.display(), "swap enabled");
        Ok(())
    }

    pub fn mounts(&self) -> Result<Vec<MountEntry>> {
        read_mounts(self.fs.as_ref())
    }

    /// Returns true if anything is mounted at `mount_point`.
    pub fn is_mounted(&self, mount_point: &Path) -> Result<bool> {
        Ok(self.mounts()?.iter().any(|m| m.mount_point == mount_point))
    }

    /// Returns true if `device` is mounted at `mount_point`.
    pub fn is_mounted_at(&self, device: &Path, mount_point: &Path) -> Result<bool> {
        Ok(self
            .mounts()?
            .iter()
            .any(|m| m.mount_point == mount_point && Path::new(&m.device) == device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::fakes::{FakeCmdRunner, FakeFileSystem};
    use crate::system::CmdOutput;

    const MOUNTS: &str = "\
/dev/vda1 / ext4 rw,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
/dev/xvdb2 /var/vcap/data ext4 rw,relatime 0 0
/dev/xvdc1 /mnt/with\\040space ext4 rw 0 0
";

    fn setup() -> (Arc<FakeCmdRunner>, Arc<FakeFileSystem>, Mounter) {
        let runner = Arc::new(FakeCmdRunner::new());
        let fs = Arc::new(FakeFileSystem::new());
        fs.add_file(PROC_MOUNTS, MOUNTS);
        let mounter = Mounter::new(runner.clone(), fs.clone());
        (runner, fs, mounter)
    }

    #[test]
    fn test_parse_mounts() {
        let mounts = parse_mounts(MOUNTS);
        assert_eq!(mounts.len(), 4);
        assert_eq!(mounts[2].device, "/dev/xvdb2");
        assert_eq!(mounts[2].mount_point, PathBuf::from("/var/vcap/data"));
        assert_eq!(mounts[2].fs_type, "ext4");
        assert_eq!(mounts[3].mount_point, PathBuf::from("/mnt/with space"));
    }

    #[test]
    fn test_unescape_multibyte_mount_point() {
        let mounts = parse_mounts("/dev/sdc1 /mnt/caf\\303\\251 ext4 rw 0 0\n");
        assert_eq!(mounts[0].mount_point, PathBuf::from("/mnt/café"));
    }

    #[test]
    fn test_unescape_leaves_incomplete_escapes() {
        assert_eq!(unescape("a\\04"), "a\\04");
        assert_eq!(unescape("tab\\011x"), "tab\tx");
        assert_eq!(unescape("\\999"), "\\999");
    }

    #[test]
    fn test_is_mounted() {
        let (_, _, mounter) = setup();
        assert!(mounter.is_mounted(Path::new("/var/vcap/data")).unwrap());
        assert!(!mounter.is_mounted(Path::new("/var/vcap/store")).unwrap());
        assert!(mounter
            .is_mounted_at(Path::new("/dev/xvdb2"), Path::new("/var/vcap/data"))
            .unwrap());
        assert!(!mounter
            .is_mounted_at(Path::new("/dev/xvdb1"), Path::new("/var/vcap/data"))
            .unwrap());
    }

    #[test]
    fn test_mount_passes_options_before_device() {
        let (runner, _, mounter) = setup();
        mounter
            .mount(Path::new("/dev/sdc"), Path::new("/store"), &["--bind"])
            .unwrap();
        assert_eq!(runner.rendered_commands(), vec!["mount --bind /dev/sdc /store"]);
    }

    #[test]
    fn test_mount_failure_names_device_and_target() {
        let (runner, _, mounter) = setup();
        runner.set_result(
            "mount /dev/xvdb2 /data",
            CmdOutput::failed(32, "wrong fs type"),
        );
        let err = mounter
            .mount(Path::new("/dev/xvdb2"), Path::new("/data"), &[])
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("/dev/xvdb2"));
        assert!(msg.contains("/data"));
        assert!(msg.contains("wrong fs type"));
    }

    #[test]
    fn test_swap_on_failure_is_mount_error() {
        let (runner, _, mounter) = setup();
        runner.set_result("swapon /dev/xvdb1", CmdOutput::failed(255, "invalid argument"));
        let err = mounter.swap_on(Path::new("/dev/xvdb1")).unwrap_err();
        assert!(matches!(err, Error::Mount { .. }));
    }
}
