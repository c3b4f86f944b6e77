//! Bounded-attempt retry.
//!
//! [`AttemptRetryStrategy`] runs a [`Retryable`] up to a fixed number of
//! times with a constant delay between attempts. The retryable decides after
//! each call whether it is done, wants another try, or failed for good; the
//! strategy only enforces the budget.
//!
//! Used for waiting on the process supervisor after it is started and for
//! driving repeated gratuitous ARP rounds.

use crate::error::{Error, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// Retry Configuration Constants
// ============================================================================

/// Attempts made while waiting for monit to answer.
pub const MONIT_MAX_ATTEMPTS: u32 = 10;

/// Delay between monit readiness probes.
pub const MONIT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum Attempt {
    /// Finished successfully; stop.
    Done,
    /// Not there yet; try again if budget remains. Carries the error seen on
    /// this attempt, if any, so it can be reported on exhaustion.
    Retry(Option<Error>),
    /// Failed in a way retrying will not fix; stop.
    Fail(Error),
}

/// Something that can be attempted repeatedly.
pub trait Retryable {
    fn attempt(&mut self) -> Attempt;
}

impl<F> Retryable for F
where
    F: FnMut() -> Attempt,
{
    fn attempt(&mut self) -> Attempt {
        self()
    }
}

type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// Fixed-budget retry with a constant delay.
#[derive(Clone)]
pub struct AttemptRetryStrategy {
    max_attempts: u32,
    delay: Duration,
    name: &'static str,
    sleeper: Sleeper,
}

impl fmt::Debug for AttemptRetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttemptRetryStrategy")
            .field("name", &self.name)
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .finish()
    }
}

impl AttemptRetryStrategy {
    /// Create a strategy. `max_attempts` of 0 is treated as 1.
    pub fn new(name: &'static str, max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            name,
            sleeper: Arc::new(std::thread::sleep),
        }
    }

    /// Strategy used to wait for monit after it is brought up.
    pub fn for_monit() -> Self {
        Self::new("monit readiness", MONIT_MAX_ATTEMPTS, MONIT_RETRY_DELAY)
    }

    /// Replace the blocking sleep, mostly for tests.
    pub fn with_sleeper(mut self, sleeper: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `retryable` until it is done, fails, or the budget is spent.
    ///
    /// On exhaustion returns [`Error::RetryExhausted`] carrying the error from
    /// the final attempt.
    pub fn run<R: Retryable>(&self, mut retryable: R) -> Result<()> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match retryable.attempt() {
                Attempt::Done => {
                    if attempt > 1 {
                        debug!(
                            operation = %self.name,
                            attempts = attempt,
                            "operation succeeded after retry"
                        );
                    }
                    return Ok(());
                }
                Attempt::Fail(e) => {
                    debug!(
                        operation = %self.name,
                        attempt = attempt,
                        error = %e,
                        "operation failed with non-retryable error"
                    );
                    return Err(e);
                }
                Attempt::Retry(last) => {
                    if attempt >= self.max_attempts {
                        match &last {
                            Some(e) => warn!(
                                operation = %self.name,
                                attempts = attempt,
                                error = %e,
                                "operation failed after max attempts"
                            ),
                            None => debug!(
                                operation = %self.name,
                                attempts = attempt,
                                "attempts exhausted"
                            ),
                        }
                        return Err(Error::RetryExhausted {
                            attempts: attempt,
                            last: last.map(Box::new),
                        });
                    }

                    if let Some(e) = &last {
                        debug!(
                            operation = %self.name,
                            attempt = attempt,
                            max_attempts = self.max_attempts,
                            delay_ms = self.delay.as_millis(),
                            error = %e,
                            "attempt failed, will retry"
                        );
                    }

                    (self.sleeper)(self.delay);
                }
            }
        }
    }
}
