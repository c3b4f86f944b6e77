//! Process supervisor (monit) startup.

use crate::error::{Error, Result};
use crate::retry::{Attempt, AttemptRetryStrategy, Retryable};
use crate::system::CmdRunner;
use tracing::info;

/// Output fragments meaning the monit daemon is not listening yet.
const NOT_LISTENING: &[&str] = &["error connecting to the monit daemon", "connection refused"];

/// One `monit summary` probe per attempt.
///
/// An unreachable daemon is worth another try; any other failure is final.
pub struct MonitReadiness<'a> {
    runner: &'a dyn CmdRunner,
}

impl<'a> MonitReadiness<'a> {
    pub fn new(runner: &'a dyn CmdRunner) -> Self {
        Self { runner }
    }
}

impl Retryable for MonitReadiness<'_> {
    fn attempt(&mut self) -> Attempt {
        let output = match self.runner.run("monit", &["summary"]) {
            Ok(output) => output,
            Err(e) => return Attempt::Fail(e),
        };
        if output.success() {
            return Attempt::Done;
        }

        let err = Error::command_failed("monit summary", output.failure_reason());
        let text = format!("{} {}", output.stdout, output.stderr).to_ascii_lowercase();
        if NOT_LISTENING.iter().any(|fragment| text.contains(fragment)) {
            Attempt::Retry(Some(err))
        } else {
            Attempt::Fail(err)
        }
    }
}

/// Bring monit up through runit and wait until it answers.
pub fn start_monit(runner: &dyn CmdRunner, strategy: &AttemptRetryStrategy) -> Result<()> {
    runner.run_checked("sv", &["up", "monit"])?;
    strategy.run(MonitReadiness::new(runner))?;
    info!("monit is up");
    Ok(())
}
