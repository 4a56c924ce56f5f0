//! Reporting of per-attempt observations.
//!
//! Watchers and scalers describe what they saw through a [`PollReporter`]
//! instead of logging directly. [`TracingReporter`] is the default and
//! forwards to `tracing`; [`RecordingReporter`] keeps events in memory.

use std::fmt;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::types::{Condition, GroupVersionKind, ObjectKey, ObservedReplicas};

/// The scale segment an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleStep {
    Read,
    Write,
    Verify,
}

impl fmt::Display for ScaleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Verify => "verify",
        })
    }
}

/// One classified observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// Fetching the resource failed; the wait continues.
    FetchFailed {
        kind: GroupVersionKind,
        key: ObjectKey,
        reason: String,
    },
    /// The status block could not be decoded; the wait continues.
    DecodeFailed {
        kind: GroupVersionKind,
        key: ObjectKey,
        reason: String,
    },
    /// A condition was seen while scanning the list.
    ConditionObserved {
        kind: GroupVersionKind,
        key: ObjectKey,
        condition: Condition,
    },
    /// The expected condition was found.
    ConditionMatched {
        kind: GroupVersionKind,
        key: ObjectKey,
        condition: Condition,
    },
    /// The list was scanned without finding the expected condition.
    ConditionMissing {
        kind: GroupVersionKind,
        key: ObjectKey,
        expected: Condition,
    },
    /// The condition wait gave up.
    WaitFailed {
        kind: GroupVersionKind,
        key: ObjectKey,
        reason: String,
    },
    /// The scale target does not exist.
    TargetAbsent { key: ObjectKey },
    /// The current replica count was read.
    ReplicasRead { key: ObjectKey, replicas: i32 },
    /// The target already runs the desired count.
    ScaleSkipped { key: ObjectKey, replicas: i32 },
    /// The desired count was written.
    ScaleWritten { key: ObjectKey, from: i32, to: i32 },
    /// The rollout has not reached the desired count yet.
    ReplicasPending {
        key: ObjectKey,
        desired: i32,
        observed: ObservedReplicas,
    },
    /// The rollout reached the desired count.
    Converged { key: ObjectKey, replicas: i32 },
    /// A scale segment stopped with an error.
    ScaleFailed {
        key: ObjectKey,
        step: ScaleStep,
        reason: String,
    },
}

/// Sink for [`PollEvent`]s.
pub trait PollReporter: Send + Sync {
    /// Record one event.
    fn report(&self, event: &PollEvent);
}

/// Reports events as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl PollReporter for TracingReporter {
    fn report(&self, event: &PollEvent) {
        match event {
            PollEvent::FetchFailed { kind, key, reason } => {
                info!(kind = %kind, namespace = %key.namespace, name = %key.name, reason = %reason, "Unable to retrieve resource");
            }
            PollEvent::DecodeFailed { kind, key, reason } => {
                info!(kind = %kind, namespace = %key.namespace, name = %key.name, reason = %reason, "Unable to decode resource status");
            }
            PollEvent::ConditionObserved {
                kind,
                key,
                condition,
            } => {
                debug!(kind = %kind, namespace = %key.namespace, name = %key.name, condition = %condition, "Resource has condition");
            }
            PollEvent::ConditionMatched {
                kind,
                key,
                condition,
            } => {
                info!(kind = %kind, namespace = %key.namespace, name = %key.name, condition = %condition, "Found expected condition");
            }
            PollEvent::ConditionMissing {
                kind,
                key,
                expected,
            } => {
                info!(kind = %kind, namespace = %key.namespace, name = %key.name, expected = %expected, "Resource does not yet contain expected condition");
            }
            PollEvent::WaitFailed { kind, key, reason } => {
                warn!(kind = %kind, namespace = %key.namespace, name = %key.name, reason = %reason, "Condition wait failed");
            }
            PollEvent::TargetAbsent { key } => {
                info!(namespace = %key.namespace, name = %key.name, "Scale target not found, nothing to do");
            }
            PollEvent::ReplicasRead { key, replicas } => {
                debug!(namespace = %key.namespace, name = %key.name, replicas, "Read current replicas");
            }
            PollEvent::ScaleSkipped { key, replicas } => {
                info!(namespace = %key.namespace, name = %key.name, replicas, "Deployment already at desired replicas");
            }
            PollEvent::ScaleWritten { key, from, to } => {
                info!(namespace = %key.namespace, name = %key.name, from, to, "Scaled deployment");
            }
            PollEvent::ReplicasPending {
                key,
                desired,
                observed,
            } => {
                debug!(namespace = %key.namespace, name = %key.name, desired, observed = %observed, "Waiting for rollout");
            }
            PollEvent::Converged { key, replicas } => {
                info!(namespace = %key.namespace, name = %key.name, replicas, "Deployment converged");
            }
            PollEvent::ScaleFailed { key, step, reason } => {
                warn!(namespace = %key.namespace, name = %key.name, step = %step, reason = %reason, "Scale failed");
            }
        }
    }
}

/// Keeps every reported event, for assertions and diagnostics.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<PollEvent>>,
}

impl RecordingReporter {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<PollEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of recorded events matching `predicate`.
    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&PollEvent) -> bool,
    {
        self.events
            .lock()
            .map(|events| events.iter().filter(|e| predicate(e)).count())
            .unwrap_or_default()
    }
}

impl PollReporter for RecordingReporter {
    fn report(&self, event: &PollEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
