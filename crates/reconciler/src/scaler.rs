//! Scale a deployment and wait until the rollout settles.
//!
//! A scale runs as a small state machine:
//!
//! ```text
//! Read ──absent──────────────────────────────▶ Done(None)
//!   │
//!   ▼
//! Compare ──equal────────────────────────────▶ Done(Some(current))
//!   │
//!   ▼
//! Mutate ──▶ Verify ──converged──────────────▶ Done(Some(previous))
//! ```
//!
//! Read and write are one-shot and fail fast. Verify polls, and treats a
//! failed status read as "not yet". Each segment gets its own setup timeout.

use std::sync::Arc;
use std::time::Duration;

use settle_core::{ResultExt, SettleConfig};

use crate::client::DeploymentClient;
use crate::context::{StopCause, WaitContext};
use crate::error::{Error, Result};
use crate::poll::{poll_until, PollOutcome};
use crate::report::{PollEvent, PollReporter, ScaleStep, TracingReporter};
use crate::types::{GroupVersionKind, ObjectKey, ReplicaConvergenceState, ScaleTarget};

/// Where a scale currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalePhase {
    /// Read the current replica count.
    Read { desired: i32 },
    /// Decide whether a write is needed.
    Compare(ReplicaConvergenceState),
    /// Write `desired`.
    Mutate { current: i32, desired: i32 },
    /// Wait for the rollout to reach `desired`.
    Verify { previous: i32, desired: i32 },
    /// Finished, holding the count found before the scale.
    Done(Option<i32>),
}

/// Scales deployments and verifies convergence.
pub struct Scaler {
    client: Arc<dyn DeploymentClient>,
    reporter: Arc<dyn PollReporter>,
    interval: Duration,
    setup_timeout: Duration,
}

impl Scaler {
    /// Create a scaler with default settings.
    pub fn new(client: Arc<dyn DeploymentClient>) -> Self {
        let config = SettleConfig::default();
        Self {
            client,
            reporter: Arc::new(TracingReporter),
            interval: config.poll_interval,
            setup_timeout: config.setup_timeout,
        }
    }

    /// Start building a scaler.
    pub fn builder() -> ScalerBuilder {
        ScalerBuilder::new()
    }

    /// Scale `target` to `desired` and wait until the rollout settles.
    ///
    /// Returns the replica count found before scaling, or `None` when
    /// `desired` is `None` or the target does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadFailure`] if the current count cannot be read,
    /// [`Error::WriteFailure`] if the write is rejected, and
    /// [`Error::DeadlineExceeded`] if a segment runs out of time.
    pub async fn scale_and_converge(
        &self,
        target: &ScaleTarget,
        desired: Option<i32>,
    ) -> Result<Option<i32>> {
        self.scale_and_converge_in(&WaitContext::background(), target, desired)
            .await
    }

    /// Like [`Scaler::scale_and_converge`], with every segment bounded by
    /// `ctx` as well as the setup timeout.
    ///
    /// # Errors
    ///
    /// See [`Scaler::scale_and_converge`]. Cancelling `ctx` yields
    /// [`Error::Cancelled`].
    pub async fn scale_and_converge_in(
        &self,
        ctx: &WaitContext,
        target: &ScaleTarget,
        desired: Option<i32>,
    ) -> Result<Option<i32>> {
        let Some(desired) = desired else {
            return Ok(None);
        };

        let mut phase = ScalePhase::Read { desired };
        loop {
            phase = match phase {
                ScalePhase::Done(previous) => return Ok(previous),
                other => self.step(ctx, target, other).await?,
            };
        }
    }

    /// Re-apply a count returned by [`Scaler::scale_and_converge`].
    ///
    /// # Errors
    ///
    /// See [`Scaler::scale_and_converge`].
    pub async fn restore(&self, target: &ScaleTarget, previous: Option<i32>) -> Result<()> {
        self.scale_and_converge(target, previous)
            .await
            .warn_err("Unable to restore deployment replicas")
            .map(|_| ())
    }

    /// Advance one transition.
    ///
    /// A segment that fails is reported as [`PollEvent::ScaleFailed`].
    ///
    /// # Errors
    ///
    /// Returns the error of the segment that ran.
    pub async fn step(
        &self,
        ctx: &WaitContext,
        target: &ScaleTarget,
        phase: ScalePhase,
    ) -> Result<ScalePhase> {
        let result = match phase {
            ScalePhase::Read { desired } => self.read(ctx, target, desired).await,
            ScalePhase::Compare(state) => Ok(self.compare(target, state)),
            ScalePhase::Mutate { current, desired } => {
                self.mutate(ctx, target, current, desired).await
            }
            ScalePhase::Verify { previous, desired } => {
                self.verify(ctx, target, previous, desired).await
            }
            ScalePhase::Done(previous) => Ok(ScalePhase::Done(previous)),
        };
        result.tap_err(|e| self.report_failure(target, phase, e))
    }

    fn report_failure(&self, target: &ScaleTarget, phase: ScalePhase, error: &Error) {
        let step = match phase {
            ScalePhase::Read { .. } => ScaleStep::Read,
            ScalePhase::Mutate { .. } => ScaleStep::Write,
            ScalePhase::Verify { .. } => ScaleStep::Verify,
            ScalePhase::Compare(_) | ScalePhase::Done(_) => return,
        };
        self.reporter.report(&PollEvent::ScaleFailed {
            key: target.key.clone(),
            step,
            reason: error.to_string(),
        });
    }

    async fn read(&self, ctx: &WaitContext, target: &ScaleTarget, desired: i32) -> Result<ScalePhase> {
        let segment = ctx.child_with_timeout(self.setup_timeout);
        let result = tokio::select! {
            biased;
            cause = segment.done() => return Err(cause.into_error(0, None)),
            result = self.client.get_replicas(&target.key) => result,
        };

        match result {
            Ok(Some(current)) => {
                self.reporter.report(&PollEvent::ReplicasRead {
                    key: target.key.clone(),
                    replicas: current,
                });
                Ok(ScalePhase::Compare(ReplicaConvergenceState::new(
                    Some(current),
                    desired,
                )))
            }
            Ok(None) => Ok(self.absent(target)),
            Err(e) if e.is_not_found() => Ok(self.absent(target)),
            Err(e) => Err(Error::read_failure(
                GroupVersionKind::deployment(),
                target.key.clone(),
                e.to_string(),
            )),
        }
    }

    fn absent(&self, target: &ScaleTarget) -> ScalePhase {
        self.reporter.report(&PollEvent::TargetAbsent {
            key: target.key.clone(),
        });
        ScalePhase::Done(None)
    }

    fn compare(&self, target: &ScaleTarget, state: ReplicaConvergenceState) -> ScalePhase {
        match state.current {
            None => self.absent(target),
            Some(current) if state.needs_write() => ScalePhase::Mutate {
                current,
                desired: state.desired,
            },
            Some(current) => {
                self.reporter.report(&PollEvent::ScaleSkipped {
                    key: target.key.clone(),
                    replicas: current,
                });
                ScalePhase::Done(Some(current))
            }
        }
    }

    async fn mutate(
        &self,
        ctx: &WaitContext,
        target: &ScaleTarget,
        current: i32,
        desired: i32,
    ) -> Result<ScalePhase> {
        let segment = ctx.child_with_timeout(self.setup_timeout);
        let result = tokio::select! {
            biased;
            cause = segment.done() => match cause {
                StopCause::Cancelled => return Err(cause.into_error(0, None)),
                StopCause::DeadlineExceeded => {
                    Err(format!("no response within {:?}", self.setup_timeout))
                }
            },
            result = self.client.set_replicas(&target.key, desired) => {
                result.map_err(|e| e.to_string())
            }
        };

        result
            .map_err(|reason| Error::write_failure(target.key.clone(), desired, reason))
            .tap_ok(|_| {
                self.reporter.report(&PollEvent::ScaleWritten {
                    key: target.key.clone(),
                    from: current,
                    to: desired,
                });
            })?;

        Ok(ScalePhase::Verify {
            previous: current,
            desired,
        })
    }

    async fn verify(
        &self,
        ctx: &WaitContext,
        target: &ScaleTarget,
        previous: i32,
        desired: i32,
    ) -> Result<ScalePhase> {
        let segment = ctx.child_with_timeout(self.setup_timeout);
        poll_until(&segment, self.interval, || {
            self.probe_replicas(&target.key, desired)
        })
        .await?;

        self.reporter.report(&PollEvent::Converged {
            key: target.key.clone(),
            replicas: desired,
        });
        Ok(ScalePhase::Done(Some(previous)))
    }

    async fn probe_replicas(&self, key: &ObjectKey, desired: i32) -> PollOutcome {
        let observed = match self.client.observed_replicas(key).await {
            Ok(observed) => observed,
            Err(e) => {
                let kind = GroupVersionKind::deployment();
                self.reporter.report(&PollEvent::FetchFailed {
                    kind: kind.clone(),
                    key: key.clone(),
                    reason: e.to_string(),
                });
                return PollOutcome::Retryable(Error::read_failure(kind, key.clone(), e.to_string()));
            }
        };

        if observed.is_converged(desired) {
            return PollOutcome::Done;
        }

        self.reporter.report(&PollEvent::ReplicasPending {
            key: key.clone(),
            desired,
            observed,
        });
        PollOutcome::Retryable(Error::ReplicasPending {
            key: key.clone(),
            desired,
            observed,
        })
    }
}

/// Builder for [`Scaler`].
pub struct ScalerBuilder {
    client: Option<Arc<dyn DeploymentClient>>,
    reporter: Arc<dyn PollReporter>,
    config: SettleConfig,
}

impl ScalerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            client: None,
            reporter: Arc::new(TracingReporter),
            config: SettleConfig::default(),
        }
    }

    /// Set the deployment client.
    #[must_use]
    pub fn with_client(mut self, client: Arc<dyn DeploymentClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Set a custom reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn PollReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Take interval and setup timeout from `config`.
    #[must_use]
    pub fn with_config(mut self, config: SettleConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the verify poll interval.
    #[must_use]
    pub const fn interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the per-segment timeout.
    #[must_use]
    pub const fn setup_timeout(mut self, timeout: Duration) -> Self {
        self.config.setup_timeout = timeout;
        self
    }

    /// Build the scaler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] without a client, or [`Error::Core`]
    /// if the configuration does not validate.
    pub fn build(self) -> Result<Scaler> {
        let client = self
            .client
            .ok_or_else(|| Error::invalid_config("Deployment client is required"))?;
        self.config.validate()?;

        Ok(Scaler {
            client,
            reporter: self.reporter,
            interval: self.config.poll_interval,
            setup_timeout: self.config.setup_timeout,
        })
    }
}

impl Default for ScalerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
