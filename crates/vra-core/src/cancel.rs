//! Cancellation signal threaded through every lifecycle call.
//!
//! A [`CancelToken`] fires when its [`CancelHandle`] is triggered or when its
//! optional deadline passes, whichever comes first. Tokens are cheap to clone
//! and every clone observes the same signal.

use crate::error::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

// Roughly 30 years; stands in for "no deadline" when a timeout overflows.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `start + timeout`, saturating to a far-future instant instead of
/// overflowing when `timeout` is huge.
#[must_use]
pub fn deadline_after(start: Instant, timeout: Duration) -> Instant {
    start
        .checked_add(timeout)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

/// Trigger side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Fire the signal. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observer side of a cancellation signal, optionally bounded by a deadline.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// Create a linked handle/token pair.
    #[must_use]
    pub fn new() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (
            CancelHandle { tx: Arc::new(tx) },
            Self { rx, deadline: None },
        )
    }

    /// A token that never fires on its own.
    #[must_use]
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx, deadline: None }
    }

    /// Bound the token by an absolute deadline. The earlier deadline wins.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    /// Bound the token by a timeout measured from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(deadline_after(Instant::now(), timeout))
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true once the signal fired or the deadline passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the token fires, yielding the error describing why.
    pub async fn cancelled(&self) -> Error {
        let mut rx = self.rx.clone();
        let signal = async move {
            // A dropped handle can never fire.
            let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
            if closed {
                std::future::pending::<()>().await;
            }
        };

        match self.deadline {
            Some(deadline) => tokio::select! {
                () = signal => Error::Cancelled("operation cancelled".to_string()),
                () = tokio::time::sleep_until(deadline) => {
                    Error::Cancelled("deadline exceeded".to_string())
                }
            },
            None => {
                signal.await;
                Error::Cancelled("operation cancelled".to_string())
            }
        }
    }

    /// Drive `future` to completion unless the token fires first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the token fires before `future` completes,
    /// otherwise whatever `future` returns.
    pub async fn run<T, F>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            err = self.cancelled() => Err(err),
            result = future => result,
        }
    }

    /// Sleep for `duration` unless the token fires first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the token fires during the sleep.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.run(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::never()
    }
}
