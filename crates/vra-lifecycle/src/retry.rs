//! Bookkeeping for the delete convergence loop.

use std::time::Duration;
use tokio::time::Instant;
use vra_core::client::ConvergencePolicy;
use vra_core::{deadline_after, Error};

/// State of one delete call, created when it starts and dropped when it ends.
#[derive(Debug, Clone)]
pub struct RetryState {
    attempt: u32,
    started_at: Instant,
    deadline: Instant,
    last_error: Option<Error>,
}

impl RetryState {
    /// Start the clock for a call bounded by `policy.max_wait`.
    #[must_use]
    pub fn start(policy: &ConvergencePolicy) -> Self {
        let started_at = Instant::now();
        Self {
            attempt: 0,
            started_at,
            deadline: deadline_after(started_at, policy.max_wait),
            last_error: None,
        }
    }

    /// Count a new attempt and return its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Attempts dispatched so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Time since the call started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// When the call stops retrying.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Last transient error recorded.
    #[must_use]
    pub const fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Remember a transient failure.
    pub fn record(&mut self, error: Error) {
        self.last_error = Some(error);
    }

    /// Returns true once the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Pause before the next attempt, clamped so it never ends past the deadline.
    #[must_use]
    pub fn next_delay(&self, policy: &ConvergencePolicy) -> Duration {
        policy
            .delay_for_attempt(self.attempt)
            .min(self.deadline.saturating_duration_since(Instant::now()))
    }

    /// Terminal error for a call that ran out of time.
    #[must_use]
    pub fn exhausted(self) -> Error {
        let elapsed = self.elapsed();
        Error::RetriesExhausted {
            attempts: self.attempt,
            elapsed,
            last_error: Box::new(self.last_error.unwrap_or_else(|| {
                Error::InternalError("no attempt recorded a failure".to_string())
            })),
        }
    }
}
