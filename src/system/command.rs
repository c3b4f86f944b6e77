//! External command execution.
//!
//! Every tool the platform drives (`sfdisk`, `mkswap`, `mount`, `arping`,
//! `udevadm`, ...) goes through [`CmdRunner`] so the orchestration logic can be
//! exercised against a recording fake.

use crate::error::{Error, Result};
use std::io::Write;
use std::process::{Command, Stdio};
use tracing::debug;

/// Captured result of a command that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CmdOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Returns true if the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Short description of a failure, for error messages.
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("exited with {}", self.exit_code)
        } else {
            format!("exited with {}: {}", self.exit_code, stderr)
        }
    }
}

/// Runs external commands.
///
/// An `Err` means the command could not be spawned at all. A command that ran
/// and exited non-zero is reported through [`CmdOutput::exit_code`].
pub trait CmdRunner: Send + Sync {
    /// Run `cmd` with `args` and capture its output.
    fn run(&self, cmd: &str, args: &[&str]) -> Result<CmdOutput>;

    /// Run `cmd` with `args`, feeding `stdin` to the child.
    fn run_with_stdin(&self, cmd: &str, args: &[&str], stdin: &str) -> Result<CmdOutput>;

    /// Run a command and turn a non-zero exit into [`Error::CommandFailed`].
    fn run_checked(&self, cmd: &str, args: &[&str]) -> Result<CmdOutput> {
        let output = self.run(cmd, args)?;
        if output.success() {
            Ok(output)
        } else {
            Err(Error::command_failed(
                render_command(cmd, args),
                output.failure_reason(),
            ))
        }
    }
}

/// Render a command line for logs and error messages.
pub fn render_command(cmd: &str, args: &[&str]) -> String {
    if args.is_empty() {
        cmd.to_string()
    } else {
        format!("{} {}", cmd, args.join(" "))
    }
}

/// [`CmdRunner`] backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecCmdRunner;

impl ExecCmdRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CmdRunner for ExecCmdRunner {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<CmdOutput> {
        debug!(command = %render_command(cmd, args), "running command");

        let output = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::command_failed(render_command(cmd, args), e.to_string()))?;

        Ok(CmdOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    fn run_with_stdin(&self, cmd: &str, args: &[&str], stdin: &str) -> Result<CmdOutput> {
        debug!(command = %render_command(cmd, args), "running command with stdin");

        let rendered = render_command(cmd, args);
        let mut child = Command::new(cmd)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::command_failed(&rendered, e.to_string()))?;

        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(stdin.as_bytes())
                .map_err(|e| Error::command_failed(&rendered, format!("write stdin: {}", e)))?;
            // Dropping the pipe closes it so the child sees EOF.
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::command_failed(&rendered, e.to_string()))?;

        Ok(CmdOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}
