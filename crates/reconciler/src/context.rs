//! Deadline and cancellation scope for waits.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Why a [`WaitContext`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// The deadline elapsed.
    DeadlineExceeded,
    /// [`WaitContext::cancel`] was called on this context or a parent.
    Cancelled,
}

impl StopCause {
    /// Build the terminal error for a wait that stopped after `attempts`
    /// probes, carrying the last retryable error.
    pub fn into_error(self, attempts: u32, last: Option<Error>) -> Error {
        let last = last.map(Box::new);
        match self {
            Self::DeadlineExceeded => Error::DeadlineExceeded { attempts, last },
            Self::Cancelled => Error::Cancelled { attempts, last },
        }
    }
}

/// An optional deadline plus a cancellation token.
///
/// Clones share the token, so cancelling any clone stops every wait using it.
#[derive(Debug, Clone, Default)]
pub struct WaitContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl WaitContext {
    /// A context without deadline that only stops when cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    ///
    /// A timeout too large to represent as an instant means no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
            token: CancellationToken::new(),
        }
    }

    /// A child that expires after `timeout` or with this context, whichever
    /// comes first. Cancelling the child leaves the parent running.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now().checked_add(timeout);
        let deadline = match (self.deadline, own) {
            (Some(parent), Some(own)) => Some(parent.min(own)),
            (parent, own) => parent.or(own),
        };
        Self {
            deadline,
            token: self.token.child_token(),
        }
    }

    /// Cancel this context and all of its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The deadline, if any.
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Why the context is done, or `None` while it is still live.
    pub fn stop_cause(&self) -> Option<StopCause> {
        if self.token.is_cancelled() {
            Some(StopCause::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(StopCause::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Resolve once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> StopCause {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    () = self.token.cancelled() => StopCause::Cancelled,
                    () = tokio::time::sleep_until(deadline) => StopCause::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                StopCause::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires() {
        let ctx = WaitContext::with_timeout(Duration::from_secs(3));
        let start = Instant::now();

        assert_eq!(ctx.stop_cause(), None);
        assert_eq!(ctx.done().await, StopCause::DeadlineExceeded);
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert_eq!(ctx.stop_cause(), Some(StopCause::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_wins_over_deadline() {
        let ctx = WaitContext::with_timeout(Duration::from_secs(3));
        ctx.cancel();
        assert_eq!(ctx.done().await, StopCause::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_inherits_earlier_parent_deadline() {
        let parent = WaitContext::with_timeout(Duration::from_secs(5));
        let child = parent.child_with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());

        let short = parent.child_with_timeout(Duration::from_secs(1));
        assert!(short.deadline() < parent.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancel_reaches_child_only_downwards() {
        let parent = WaitContext::background();
        let child = parent.child_with_timeout(Duration::from_secs(10));

        child.cancel();
        assert_eq!(parent.stop_cause(), None);

        let other = parent.child_with_timeout(Duration::from_secs(10));
        parent.cancel();
        assert_eq!(other.stop_cause(), Some(StopCause::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_timeout_means_no_deadline() {
        let ctx = WaitContext::with_timeout(Duration::MAX);
        assert_eq!(ctx.deadline(), None);
        assert_eq!(ctx.stop_cause(), None);

        let child = ctx.child_with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(child.deadline(), None);

        ctx.cancel();
        assert_eq!(child.done().await, StopCause::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_child_timeout_keeps_parent_deadline() {
        let parent = WaitContext::with_timeout(Duration::from_secs(5));
        let child = parent.child_with_timeout(Duration::MAX);
        assert_eq!(child.deadline(), parent.deadline());
        assert_eq!(child.done().await, StopCause::DeadlineExceeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining() {
        let ctx = WaitContext::with_timeout(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(ctx
            .remaining()
            .is_some_and(|left| left <= Duration::from_secs(6)));
        assert_eq!(WaitContext::background().remaining(), None);
    }
}
