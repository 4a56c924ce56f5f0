//! Wait for remote resources to reach a state.
//!
//! This crate polls cluster resources until they report what the caller
//! asked for:
//!
//! - **Poll engine**: run a probe until it is done, fails fatally, or the
//!   [`WaitContext`] expires or is cancelled
//! - **Condition watcher**: wait for an exact `{type, status, reason}` triple
//!   in a resource's `status.conditions`
//! - **Scaler**: read, compare, write, and verify a deployment's replica count
//!
//! # Key Concepts
//!
//! ## Outcomes
//!
//! Every probe attempt is classified as a [`PollOutcome`]:
//!
//! - `Done` - The awaited state is observed
//! - `Retryable` - Not there yet, or a transient read failure
//! - `Fatal` - Stop now and return the error
//!
//! ## Collaborators
//!
//! Cluster access goes through [`ResourceReader`], [`ConditionExtractor`] and
//! [`DeploymentClient`]. Observations go to a [`PollReporter`].
//!
//! # Example
//!
//! ```ignore
//! use settle_reconciler::{
//!     ConditionQuery, ConditionStatus, ConditionWatcher, GroupVersionKind, InMemoryCluster,
//!     ObjectKey, ScaleTarget, Scaler, WaitContext,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> settle_reconciler::Result<()> {
//!     let cluster = InMemoryCluster::new_arc();
//!
//!     let watcher = ConditionWatcher::new(cluster.clone());
//!     let query = ConditionQuery::new(
//!         GroupVersionKind::new("extensions.gardener.cloud", "v1alpha1", "Worker"),
//!         ObjectKey::new("shoot--dev--local", "local"),
//!         "Ready",
//!         ConditionStatus::True,
//!         "Provisioning",
//!     );
//!     watcher
//!         .wait_for_condition(&WaitContext::with_timeout(Duration::from_secs(60)), &query)
//!         .await?;
//!
//!     let scaler = Scaler::new(cluster);
//!     let target = ScaleTarget::resource_manager("garden");
//!     let previous = scaler.scale_and_converge(&target, Some(3)).await?;
//!     scaler.restore(&target, previous).await
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::arithmetic_side_effects)]

pub mod client;
pub mod condition;
pub mod context;
pub mod error;
pub mod memory;
pub mod poll;
pub mod report;
pub mod scaler;
pub mod types;

// Re-export main types
pub use client::{ConditionExtractor, DeploymentClient, ResourceReader, StatusConditions};
pub use condition::{ConditionWatcher, ConditionWatcherBuilder};
pub use context::{StopCause, WaitContext};
pub use error::{ClientError, ClientResult, DecodeError, Error, Result};
pub use memory::{conditions_resource, InMemoryCluster};
pub use poll::{poll_until, PollOutcome};
pub use report::{PollEvent, PollReporter, RecordingReporter, ScaleStep, TracingReporter};
pub use scaler::{ScalePhase, Scaler, ScalerBuilder};
pub use types::{
    Condition, ConditionQuery, ConditionStatus, GroupVersionKind, ObjectKey, ObservedReplicas,
    ReplicaConvergenceState, ScaleTarget, RESOURCE_MANAGER_DEPLOYMENT,
};
