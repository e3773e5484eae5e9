//! Cooperative cancellation for long-running simulation loops.
//!
//! The engine is single-threaded and synchronous, so a caller that wants to
//! abort a runaway estimation trips a [`CancelToken`] from another thread
//! (a Ctrl-C handler, a supervisor) or gives it a deadline up front. Loops
//! call [`CancelToken::check`] between batches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Returned when a run was stopped through its [`CancelToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Cancelled {
    /// The token was tripped explicitly.
    #[error("simulation cancelled")]
    Requested,

    /// The token's deadline passed.
    #[error("simulation timed out after {0:?}")]
    TimedOut(Duration),
}

/// Shared cancellation flag with an optional deadline.
///
/// Cloning is cheap; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<(Instant, Duration)>,
}

impl CancelToken {
    /// A token that is only cancelled explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that additionally expires `timeout` from now.
    ///
    /// A timeout too large to represent as an instant means no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: deadline_after(timeout),
        }
    }

    /// A token sharing this token's flag with a fresh deadline `timeout`
    /// from now. Tripping either token stops both.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        Self {
            flag: Arc::clone(&self.flag),
            deadline: deadline_after(timeout),
        }
    }

    /// Trip the token. Every clone sees the cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether the token has been tripped or has expired.
    pub fn is_cancelled(&self) -> bool {
        self.check().is_err()
    }

    /// Return an error if the run should stop.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.flag.load(Ordering::Relaxed) {
            return Err(Cancelled::Requested);
        }
        if let Some((deadline, timeout)) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Cancelled::TimedOut(timeout));
            }
        }
        Ok(())
    }
}

fn deadline_after(timeout: Duration) -> Option<(Instant, Duration)> {
    Instant::now().checked_add(timeout).map(|at| (at, timeout))
}
