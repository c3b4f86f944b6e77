//! Thin wrappers over the guest OS.
//!
//! Everything that touches processes, files or udev lives behind a trait here
//! so the platform logic above it can be driven by in-memory fakes.

pub mod command;
pub mod fs;
pub mod udev;

#[cfg(test)]
pub(crate) mod fakes;

pub use command::{CmdOutput, CmdRunner, ExecCmdRunner};
pub use fs::{FileSystem, OsFileSystem};
pub use udev::{Udev, UdevAdm};
