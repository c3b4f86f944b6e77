//! In-memory collaborators for unit tests.
//!
//! The fakes record what the platform asked for so tests can assert on the
//! exact command sequence and the directories/files created.

use crate::error::{Error, Result};
use crate::stats::{CpuLoad, CpuStats, DiskStats, MemStats, StatsCollector};
use crate::system::command::{render_command, CmdOutput, CmdRunner};
use crate::system::fs::{resolve_link_target, FileSystem};
use crate::system::udev::Udev;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::Receiver;
use std::time::Duration;

// ============================================================================
// Command runner
// ============================================================================

/// Records every command and replays canned results.
///
/// Results are keyed by the rendered command line (`"sfdisk -s /dev/xvda"`).
/// When several results are queued for one command they are consumed in
/// order and the last one sticks. Unknown commands succeed with empty output.
#[derive(Default)]
pub struct FakeCmdRunner {
    commands: Mutex<Vec<Vec<String>>>,
    stdin_inputs: Mutex<Vec<String>>,
    results: Mutex<HashMap<String, VecDeque<CmdOutput>>>,
    spawn_errors: Mutex<HashSet<String>>,
}

impl FakeCmdRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_result(&self, command: &str, output: CmdOutput) {
        self.results
            .lock()
            .insert(command.to_string(), VecDeque::from([output]));
    }

    pub fn queue_results(&self, command: &str, outputs: Vec<CmdOutput>) {
        self.results
            .lock()
            .insert(command.to_string(), outputs.into_iter().collect());
    }

    pub fn fail_to_spawn(&self, command: &str) {
        self.spawn_errors.lock().insert(command.to_string());
    }

    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().clone()
    }

    pub fn rendered_commands(&self) -> Vec<String> {
        self.commands.lock().iter().map(|c| c.join(" ")).collect()
    }

    pub fn stdin_inputs(&self) -> Vec<String> {
        self.stdin_inputs.lock().clone()
    }

    fn record(&self, cmd: &str, args: &[&str]) -> Result<CmdOutput> {
        let mut argv = vec![cmd.to_string()];
        argv.extend(args.iter().map(|a| a.to_string()));
        self.commands.lock().push(argv);

        let key = render_command(cmd, args);
        if self.spawn_errors.lock().contains(&key) {
            return Err(Error::command_failed(key, "no such file or directory"));
        }

        let mut results = self.results.lock();
        let output = match results.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().cloned().unwrap_or_default(),
            None => CmdOutput::default(),
        };
        Ok(output)
    }
}

impl CmdRunner for FakeCmdRunner {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<CmdOutput> {
        self.record(cmd, args)
    }

    fn run_with_stdin(&self, cmd: &str, args: &[&str], stdin: &str) -> Result<CmdOutput> {
        self.stdin_inputs.lock().push(stdin.to_string());
        self.record(cmd, args)
    }
}

// ============================================================================
// Filesystem
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeKind {
    File(String),
    Dir,
    Symlink(PathBuf),
}

/// A recorded filesystem entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeEntry {
    pub kind: FakeKind,
    pub mode: Option<u32>,
    pub created_with: &'static str,
}

/// Map-backed filesystem.
#[derive(Default)]
pub struct FakeFileSystem {
    entries: Mutex<BTreeMap<PathBuf, FakeEntry>>,
    homes: Mutex<HashMap<String, PathBuf>>,
    mkdir_errors: Mutex<HashSet<PathBuf>>,
    write_errors: Mutex<HashSet<PathBuf>>,
}

impl FakeFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty file (e.g. a device node).
    pub fn touch(&self, path: impl AsRef<Path>) {
        self.insert(path.as_ref(), FakeKind::File(String::new()), None, "touch");
    }

    pub fn add_file(&self, path: impl AsRef<Path>, contents: &str) {
        self.insert(path.as_ref(), FakeKind::File(contents.to_string()), None, "add_file");
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        self.insert(path.as_ref(), FakeKind::Dir, None, "add_dir");
    }

    pub fn symlink(&self, link: impl AsRef<Path>, target: impl Into<PathBuf>) {
        self.insert(link.as_ref(), FakeKind::Symlink(target.into()), None, "symlink");
    }

    pub fn set_home(&self, username: &str, home: impl Into<PathBuf>) {
        self.homes.lock().insert(username.to_string(), home.into());
    }

    pub fn fail_mkdir(&self, path: impl Into<PathBuf>) {
        self.mkdir_errors.lock().insert(path.into());
    }

    pub fn fail_write(&self, path: impl Into<PathBuf>) {
        self.write_errors.lock().insert(path.into());
    }

    pub fn stat(&self, path: impl AsRef<Path>) -> Option<FakeEntry> {
        self.entries.lock().get(path.as_ref()).cloned()
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        match self.stat(path)?.kind {
            FakeKind::File(contents) => Some(contents),
            _ => None,
        }
    }

    fn insert(&self, path: &Path, kind: FakeKind, mode: Option<u32>, created_with: &'static str) {
        self.entries.lock().insert(
            path.to_path_buf(),
            FakeEntry {
                kind,
                mode,
                created_with,
            },
        );
    }

    fn not_found(path: &Path) -> Error {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        ))
    }
}

impl FileSystem for FakeFileSystem {
    fn exists(&self, path: &Path) -> bool {
        let entries = self.entries.lock();
        match entries.get(path).map(|e| &e.kind) {
            Some(FakeKind::Symlink(target)) => {
                let target = resolve_link_target(path, target.clone());
                entries.contains_key(&target)
            }
            Some(_) => true,
            None => entries.keys().any(|p| p.starts_with(path) && p != path),
        }
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> Result<()> {
        if self.mkdir_errors.lock().contains(path) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "permission denied",
            )));
        }
        self.insert(path, FakeKind::Dir, Some(mode), "mkdir_all");
        Ok(())
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        if self.write_errors.lock().contains(path) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "permission denied",
            )));
        }
        self.insert(path, FakeKind::File(contents.to_string()), None, "write_file");
        Ok(())
    }

    fn write_file_with_mode(&self, path: &Path, contents: &str, mode: u32) -> Result<()> {
        self.write_file(path, contents)?;
        self.insert(path, FakeKind::File(contents.to_string()), Some(mode), "write_file");
        Ok(())
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.contents(path).ok_or_else(|| Self::not_found(path))
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let entries = self.entries.lock();
        // Intermediate directories are implied by deeper entries.
        let names: Vec<String> = entries
            .keys()
            .filter_map(|p| p.strip_prefix(path).ok())
            .filter_map(|rest| rest.components().next())
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        if names.is_empty() && !matches!(entries.get(path).map(|e| &e.kind), Some(FakeKind::Dir)) {
            return Err(Self::not_found(path));
        }
        Ok(names)
    }

    fn read_link(&self, path: &Path) -> Result<PathBuf> {
        match self.stat(path).map(|e| e.kind) {
            Some(FakeKind::Symlink(target)) => Ok(resolve_link_target(path, target)),
            _ => Err(Self::not_found(path)),
        }
    }

    fn home_dir(&self, username: &str) -> Result<PathBuf> {
        self.homes
            .lock()
            .get(username)
            .cloned()
            .ok_or_else(|| Error::config("find home directory", format!("unknown user {}", username)))
    }
}

// ============================================================================
// udev
// ============================================================================

#[derive(Default)]
pub struct FakeUdev {
    pub triggers: AtomicU32,
    pub settles: AtomicU32,
    fail: Mutex<bool>,
}

impl FakeUdev {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with_error(&self) {
        *self.fail.lock() = true;
    }
}

impl Udev for FakeUdev {
    fn trigger(&self) -> Result<()> {
        self.triggers.fetch_add(1, Ordering::SeqCst);
        if *self.fail.lock() {
            return Err(Error::command_failed("udevadm trigger", "exited with 1"));
        }
        Ok(())
    }

    fn settle(&self) -> Result<()> {
        self.settles.fetch_add(1, Ordering::SeqCst);
        if *self.fail.lock() {
            return Err(Error::command_failed("udevadm settle", "exited with 1"));
        }
        Ok(())
    }
}

// ============================================================================
// Stats
// ============================================================================

/// Stats collector returning fixed values.
#[derive(Default)]
pub struct FakeStatsCollector {
    pub mem: Mutex<MemStats>,
    pub swap: Mutex<MemStats>,
    pub disks: Mutex<HashMap<PathBuf, DiskStats>>,
    pub collect_calls: AtomicU32,
}

impl FakeStatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mem_total(total_bytes: u64) -> Self {
        let fake = Self::default();
        fake.mem.lock().total = total_bytes;
        fake
    }
}

impl StatsCollector for FakeStatsCollector {
    fn cpu_load(&self) -> Result<CpuLoad> {
        Ok(CpuLoad {
            one: 0.5,
            five: 0.25,
            fifteen: 0.125,
        })
    }

    fn cpu_stats(&self) -> Result<CpuStats> {
        Ok(CpuStats {
            user: 30,
            sys: 10,
            wait: 5,
            total: 100,
        })
    }

    fn mem_stats(&self) -> Result<MemStats> {
        Ok(*self.mem.lock())
    }

    fn swap_stats(&self) -> Result<MemStats> {
        Ok(*self.swap.lock())
    }

    fn disk_stats(&self, path: &Path) -> Result<DiskStats> {
        self.disks
            .lock()
            .get(path)
            .copied()
            .ok_or_else(|| Error::stats("statvfs", format!("{} not mounted", path.display())))
    }

    fn start_collecting(&self, _interval: Duration, stop: Receiver<()>) {
        self.collect_calls.fetch_add(1, Ordering::SeqCst);
        // Block like the real loop until told to stop.
        let _ = stop.recv();
    }
}
