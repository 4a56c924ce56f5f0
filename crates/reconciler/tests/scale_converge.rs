//! Integration tests for scale-and-converge against the in-memory cluster.
//!
//! Scenarios verified:
//! - No desired count, an equal count, or a missing target never write
//! - Scaling 2 -> 5 writes once and returns only after the rollout reports 5
//! - Read and write failures are fatal and reported, status read failures
//!   during verify are retried
//! - Out-of-range timeouts are rejected or treated as unbounded
//! - Cancellation stops a verify wait promptly
//! - Restoring the previous count scales back

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use settle_reconciler::{
    ClientError, Error, InMemoryCluster, PollEvent, RecordingReporter, ScaleStep, ScaleTarget,
    Scaler, WaitContext,
};
use settle_core::SettleConfig;
use tokio::time::Instant;

const INTERVAL: Duration = Duration::from_secs(1);
const SETUP_TIMEOUT: Duration = Duration::from_secs(30);

fn target() -> ScaleTarget {
    ScaleTarget::resource_manager("garden")
}

fn scaler(cluster: Arc<InMemoryCluster>, reporter: Arc<RecordingReporter>) -> Scaler {
    Scaler::builder()
        .with_client(cluster)
        .with_reporter(reporter)
        .interval(INTERVAL)
        .setup_timeout(SETUP_TIMEOUT)
        .build()
        .unwrap()
}

async fn cluster_with(replicas: Option<i32>) -> Arc<InMemoryCluster> {
    let cluster = InMemoryCluster::new_arc();
    cluster.put_deployment(&target().key, replicas).await;
    cluster
}

// ==========================================================================
// No-op paths
// ==========================================================================

#[tokio::test(start_paused = true)]
async fn none_desired_never_touches_client() {
    let cluster = cluster_with(Some(2)).await;
    let s = scaler(cluster.clone(), Arc::new(RecordingReporter::new()));

    let previous = s.scale_and_converge(&target(), None).await.unwrap();

    assert_eq!(previous, None);
    assert_eq!(cluster.replica_reads().await, 0);
    assert!(cluster.writes().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn equal_count_never_writes() {
    let cluster = cluster_with(Some(3)).await;
    let reporter = Arc::new(RecordingReporter::new());
    let s = scaler(cluster.clone(), reporter.clone());

    let previous = s.scale_and_converge(&target(), Some(3)).await.unwrap();

    assert_eq!(previous, Some(3));
    assert!(cluster.writes().await.is_empty());
    assert_eq!(cluster.observed_reads().await, 0);
    assert_eq!(
        reporter.count(|e| matches!(e, PollEvent::ScaleSkipped { .. })),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn missing_target_is_ok_none() {
    let cluster = InMemoryCluster::new_arc();
    let s = scaler(cluster.clone(), Arc::new(RecordingReporter::new()));

    let previous = s.scale_and_converge(&target(), Some(5)).await.unwrap();

    assert_eq!(previous, None);
    assert_eq!(cluster.replica_reads().await, 1);
    assert!(cluster.writes().await.is_empty());
}

// ==========================================================================
// Scale 2 -> 5
// ==========================================================================

#[tokio::test(start_paused = true)]
async fn scales_once_and_waits_for_rollout() {
    let cluster = cluster_with(Some(2)).await;
    cluster.set_rollout_lag(&target().key, 3).await;
    let reporter = Arc::new(RecordingReporter::new());
    let s = scaler(cluster.clone(), reporter.clone());

    let previous = s.scale_and_converge(&target(), Some(5)).await.unwrap();

    assert_eq!(previous, Some(2));
    assert_eq!(cluster.writes().await, vec![(target().key, 5)]);
    assert_eq!(cluster.observed_reads().await, 4);
    assert_eq!(
        reporter.count(|e| matches!(e, PollEvent::ReplicasPending { desired: 5, .. })),
        3
    );

    let events = reporter.events();
    assert!(matches!(
        events.last(),
        Some(PollEvent::Converged { replicas: 5, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn rollout_that_never_settles_hits_deadline() {
    let cluster = cluster_with(Some(2)).await;
    cluster.set_rollout_lag(&target().key, u32::MAX).await;
    let s = scaler(cluster.clone(), Arc::new(RecordingReporter::new()));

    let err = s.scale_and_converge(&target(), Some(5)).await.unwrap_err();

    assert!(matches!(err, Error::DeadlineExceeded { .. }));
    assert!(matches!(err.last_error(), Some(Error::ReplicasPending { desired: 5, .. })));
    assert_eq!(cluster.writes().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn oversized_setup_timeout_is_rejected_before_scaling() {
    let cluster = cluster_with(Some(2)).await;
    let config = SettleConfig::default().setup_timeout(Duration::from_secs(u64::MAX));

    let result = Scaler::builder()
        .with_client(cluster.clone())
        .with_config(config)
        .build();

    assert!(matches!(result, Err(Error::Core(_))));
    assert_eq!(cluster.replica_reads().await, 0);
}

#[tokio::test(start_paused = true)]
async fn unbounded_caller_context_does_not_overflow() {
    let cluster = cluster_with(Some(2)).await;
    let s = scaler(cluster.clone(), Arc::new(RecordingReporter::new()));

    let previous = s
        .scale_and_converge_in(&WaitContext::with_timeout(Duration::MAX), &target(), Some(5))
        .await
        .unwrap();

    assert_eq!(previous, Some(2));
    assert_eq!(cluster.deployment_replicas(&target().key).await, Some(5));
}

// ==========================================================================
// Failure classification
// ==========================================================================

#[tokio::test(start_paused = true)]
async fn write_failure_is_fatal() {
    let cluster = cluster_with(Some(2)).await;
    cluster
        .fail_next_writes(1, ClientError::Rejected("admission webhook denied".into()))
        .await;
    let reporter = Arc::new(RecordingReporter::new());
    let s = scaler(cluster.clone(), reporter.clone());
    let start = Instant::now();

    let err = s.scale_and_converge(&target(), Some(5)).await.unwrap_err();

    assert!(matches!(err, Error::WriteFailure { replicas: 5, .. }));
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("admission webhook denied"));
    assert_eq!(cluster.observed_reads().await, 0);
    assert!(start.elapsed() < INTERVAL);

    let events = reporter.events();
    assert!(matches!(
        events.last(),
        Some(PollEvent::ScaleFailed { step: ScaleStep::Write, reason, .. })
            if reason.contains("admission webhook denied")
    ));
}

#[tokio::test(start_paused = true)]
async fn read_failure_is_reported_before_returning() {
    let cluster = cluster_with(Some(2)).await;
    cluster
        .fail_next_replica_reads(1, ClientError::Unavailable("apiserver unreachable".into()))
        .await;
    let reporter = Arc::new(RecordingReporter::new());
    let s = scaler(cluster.clone(), reporter.clone());

    let err = s.scale_and_converge(&target(), Some(5)).await.unwrap_err();

    assert!(matches!(err, Error::ReadFailure { .. }));
    assert!(cluster.writes().await.is_empty());
    assert_eq!(
        reporter.count(|e| matches!(e, PollEvent::ScaleFailed { step: ScaleStep::Read, .. })),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn verify_read_failures_are_retried() {
    let cluster = cluster_with(Some(2)).await;
    cluster
        .fail_next_observed(3, ClientError::Unavailable("connection reset".into()))
        .await;
    let reporter = Arc::new(RecordingReporter::new());
    let s = scaler(cluster.clone(), reporter.clone());

    let previous = s.scale_and_converge(&target(), Some(5)).await.unwrap();

    assert_eq!(previous, Some(2));
    assert_eq!(cluster.observed_reads().await, 4);
    assert_eq!(
        reporter.count(|e| matches!(e, PollEvent::FetchFailed { .. })),
        3
    );
}

// ==========================================================================
// Cancellation and restore
// ==========================================================================

#[tokio::test(start_paused = true)]
async fn cancel_during_verify_returns_promptly() {
    let cluster = cluster_with(Some(2)).await;
    cluster.set_rollout_lag(&target().key, u32::MAX).await;
    let s = Scaler::builder()
        .with_client(cluster.clone())
        .interval(Duration::from_secs(20))
        .setup_timeout(Duration::from_secs(120))
        .build()
        .unwrap();

    let ctx = WaitContext::background();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        canceller.cancel();
    });
    let start = Instant::now();

    let err = s
        .scale_and_converge_in(&ctx, &target(), Some(5))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled { attempts: 1, .. }));
    assert!(start.elapsed() < Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn restore_scales_back_to_previous() {
    let cluster = cluster_with(Some(2)).await;
    let s = scaler(cluster.clone(), Arc::new(RecordingReporter::new()));

    let previous = s.scale_and_converge(&target(), Some(0)).await.unwrap();
    assert_eq!(cluster.deployment_replicas(&target().key).await, Some(0));

    s.restore(&target(), previous).await.unwrap();

    assert_eq!(cluster.deployment_replicas(&target().key).await, Some(2));
    assert_eq!(
        cluster.writes().await,
        vec![(target().key, 0), (target().key, 2)]
    );
}
