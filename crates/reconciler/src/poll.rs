//! Poll-until-satisfied engine.
//!
//! A probe is invoked immediately and then once per `interval` until it
//! reports [`PollOutcome::Done`] or [`PollOutcome::Fatal`], or until the
//! [`WaitContext`] stops. Both the probe and the sleep between attempts are
//! raced against the context, so cancellation takes effect without waiting
//! out the interval.

use std::future::Future;
use std::time::Duration;

use crate::context::WaitContext;
use crate::error::{Error, Result};

/// Classification of a single poll attempt.
#[derive(Debug)]
pub enum PollOutcome {
    /// The awaited state has been observed.
    Done,
    /// Not there yet; the error explains why and the loop continues.
    Retryable(Error),
    /// Unrecoverable; the loop stops and returns the error.
    Fatal(Error),
}

impl PollOutcome {
    /// Retry with a free-form reason.
    pub fn retry(reason: impl Into<String>) -> Self {
        Self::Retryable(Error::pending(reason))
    }

    /// Whether this outcome ends the loop.
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Retryable(_))
    }
}

/// Run `probe` until it is done, fails fatally, or `ctx` stops.
///
/// # Errors
///
/// Returns the probe's error on [`PollOutcome::Fatal`], or
/// [`Error::DeadlineExceeded`] / [`Error::Cancelled`] carrying the number of
/// completed attempts and the last retryable error.
pub async fn poll_until<F, Fut>(ctx: &WaitContext, interval: Duration, mut probe: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PollOutcome>,
{
    let mut attempts: u32 = 0;
    let mut last: Option<Error> = None;

    loop {
        let outcome = tokio::select! {
            biased;
            cause = ctx.done() => return Err(cause.into_error(attempts, last)),
            outcome = probe() => outcome,
        };
        attempts = attempts.saturating_add(1);

        match outcome {
            PollOutcome::Done => return Ok(()),
            PollOutcome::Fatal(e) => return Err(e),
            PollOutcome::Retryable(e) => last = Some(e),
        }

        tokio::select! {
            biased;
            cause = ctx.done() => return Err(cause.into_error(attempts, last)),
            () = tokio::time::sleep(interval) => {}
        }
    }
}
