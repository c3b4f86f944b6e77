//! udev event control.

use crate::error::Result;
use crate::system::command::CmdRunner;
use std::sync::Arc;

/// Asks udev to (re)process device events.
pub trait Udev: Send + Sync {
    /// Replay kernel device events so by-id links get created.
    fn trigger(&self) -> Result<()>;

    /// Wait for the udev event queue to drain.
    fn settle(&self) -> Result<()>;
}

/// [`Udev`] that shells out to `udevadm`.
pub struct UdevAdm {
    runner: Arc<dyn CmdRunner>,
}

impl UdevAdm {
    pub fn new(runner: Arc<dyn CmdRunner>) -> Self {
        Self { runner }
    }
}

impl Udev for UdevAdm {
    fn trigger(&self) -> Result<()> {
        self.runner.run_checked("udevadm", &["trigger"])?;
        Ok(())
    }

    fn settle(&self) -> Result<()> {
        self.runner.run_checked("udevadm", &["settle"])?;
        Ok(())
    }
}
