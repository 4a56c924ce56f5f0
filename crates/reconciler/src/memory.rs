//! In-process cluster for tests and dry runs.
//!
//! Resources can be scripted as a sequence of snapshots: each read returns
//! the front snapshot and advances, and the last one sticks. Failures can be
//! queued per operation and are consumed before the normal path runs.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::client::{DeploymentClient, ResourceReader};
use crate::error::{ClientError, ClientResult};
use crate::types::{Condition, GroupVersionKind, ObjectKey, ObservedReplicas};

/// Build a resource whose `status.conditions` holds `conditions`.
pub fn conditions_resource(kind: &GroupVersionKind, key: &ObjectKey, conditions: &[Condition]) -> Value {
    json!({
        "apiVersion": kind.api_version(),
        "kind": kind.kind,
        "metadata": {
            "namespace": key.namespace,
            "name": key.name,
        },
        "status": {
            "conditions": conditions,
        },
    })
}

#[derive(Debug, Clone, Default)]
struct DeploymentState {
    spec: Option<i32>,
    status: ObservedReplicas,
    /// Status reads that still report the old counts after a write.
    rollout_lag: u32,
    pending_reads: u32,
}

impl DeploymentState {
    fn observe(&mut self) -> ObservedReplicas {
        let Some(spec) = self.spec else {
            return self.status;
        };
        if self.status.is_converged(spec) {
            return self.status;
        }
        if self.pending_reads == 0 {
            self.status = ObservedReplicas::new(spec, spec);
        } else {
            self.pending_reads = self.pending_reads.saturating_sub(1);
        }
        self.status
    }
}

#[derive(Debug, Default)]
struct ClusterState {
    resources: HashMap<(GroupVersionKind, ObjectKey), VecDeque<Value>>,
    deployments: HashMap<ObjectKey, DeploymentState>,

    get_failures: VecDeque<ClientError>,
    replica_read_failures: VecDeque<ClientError>,
    write_failures: VecDeque<ClientError>,
    observed_failures: VecDeque<ClientError>,

    replica_read_delay: Option<Duration>,
    write_delay: Option<Duration>,

    get_calls: usize,
    replica_reads: usize,
    observed_reads: usize,
    writes: Vec<(ObjectKey, i32)>,
}

/// Shared-state fake implementing [`ResourceReader`] and [`DeploymentClient`].
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    state: Mutex<ClusterState>,
}

impl InMemoryCluster {
    /// Create an empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cluster wrapped in an Arc.
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Store a single resource snapshot.
    pub async fn put_resource(&self, kind: &GroupVersionKind, key: &ObjectKey, resource: Value) {
        self.script_resource(kind, key, vec![resource]).await;
    }

    /// Store a sequence of snapshots returned by consecutive reads.
    pub async fn script_resource(
        &self,
        kind: &GroupVersionKind,
        key: &ObjectKey,
        snapshots: Vec<Value>,
    ) {
        self.state
            .lock()
            .await
            .resources
            .insert((kind.clone(), key.clone()), snapshots.into());
    }

    /// Store a resource reporting `conditions`.
    pub async fn put_conditions(
        &self,
        kind: &GroupVersionKind,
        key: &ObjectKey,
        conditions: Vec<Condition>,
    ) {
        self.script_conditions(kind, key, vec![conditions]).await;
    }

    /// Store a sequence of condition lists returned by consecutive reads.
    pub async fn script_conditions(
        &self,
        kind: &GroupVersionKind,
        key: &ObjectKey,
        sequence: Vec<Vec<Condition>>,
    ) {
        let snapshots = sequence
            .iter()
            .map(|conditions| conditions_resource(kind, key, conditions))
            .collect();
        self.script_resource(kind, key, snapshots).await;
    }

    /// Store a settled deployment. `None` leaves the spec count unset.
    pub async fn put_deployment(&self, key: &ObjectKey, replicas: Option<i32>) {
        let settled = replicas.unwrap_or_default();
        let mut state = self.state.lock().await;
        let lag = state
            .deployments
            .get(key)
            .map_or(0, |deployment| deployment.rollout_lag);
        state.deployments.insert(
            key.clone(),
            DeploymentState {
                spec: replicas,
                status: ObservedReplicas::new(settled, settled),
                rollout_lag: lag,
                pending_reads: 0,
            },
        );
    }

    /// After each write, report the old counts for `reads` status reads.
    pub async fn set_rollout_lag(&self, key: &ObjectKey, reads: u32) {
        self.state
            .lock()
            .await
            .deployments
            .entry(key.clone())
            .or_default()
            .rollout_lag = reads;
    }

    /// Fail the next `count` resource reads with `error`.
    pub async fn fail_next_gets(&self, count: usize, error: ClientError) {
        self.state
            .lock()
            .await
            .get_failures
            .extend(std::iter::repeat(error).take(count));
    }

    /// Fail the next `count` spec replica reads with `error`.
    pub async fn fail_next_replica_reads(&self, count: usize, error: ClientError) {
        self.state
            .lock()
            .await
            .replica_read_failures
            .extend(std::iter::repeat(error).take(count));
    }

    /// Fail the next `count` replica writes with `error`.
    pub async fn fail_next_writes(&self, count: usize, error: ClientError) {
        self.state
            .lock()
            .await
            .write_failures
            .extend(std::iter::repeat(error).take(count));
    }

    /// Fail the next `count` status reads with `error`.
    pub async fn fail_next_observed(&self, count: usize, error: ClientError) {
        self.state
            .lock()
            .await
            .observed_failures
            .extend(std::iter::repeat(error).take(count));
    }

    /// Stall every spec replica read for `delay`.
    pub async fn delay_replica_reads(&self, delay: Duration) {
        self.state.lock().await.replica_read_delay = Some(delay);
    }

    /// Stall every replica write for `delay`.
    pub async fn delay_writes(&self, delay: Duration) {
        self.state.lock().await.write_delay = Some(delay);
    }

    /// Number of resource reads so far, failed ones included.
    pub async fn get_calls(&self) -> usize {
        self.state.lock().await.get_calls
    }

    /// Number of spec replica reads so far.
    pub async fn replica_reads(&self) -> usize {
        self.state.lock().await.replica_reads
    }

    /// Number of status reads so far.
    pub async fn observed_reads(&self) -> usize {
        self.state.lock().await.observed_reads
    }

    /// Every accepted replica write, in order.
    pub async fn writes(&self) -> Vec<(ObjectKey, i32)> {
        self.state.lock().await.writes.clone()
    }

    /// Spec replica count of a deployment.
    pub async fn deployment_replicas(&self, key: &ObjectKey) -> Option<i32> {
        self.state
            .lock()
            .await
            .deployments
            .get(key)
            .and_then(|deployment| deployment.spec)
    }
}

#[async_trait]
impl ResourceReader for InMemoryCluster {
    async fn get(&self, kind: &GroupVersionKind, key: &ObjectKey) -> ClientResult<Value> {
        let mut state = self.state.lock().await;
        state.get_calls = state.get_calls.saturating_add(1);

        if let Some(error) = state.get_failures.pop_front() {
            return Err(error);
        }

        let snapshots = state
            .resources
            .get_mut(&(kind.clone(), key.clone()))
            .ok_or_else(|| ClientError::not_found(kind.clone(), key.clone()))?;

        let current = if snapshots.len() > 1 {
            snapshots.pop_front()
        } else {
            snapshots.front().cloned()
        };
        current.ok_or_else(|| ClientError::not_found(kind.clone(), key.clone()))
    }
}

#[async_trait]
impl DeploymentClient for InMemoryCluster {
    async fn get_replicas(&self, key: &ObjectKey) -> ClientResult<Option<i32>> {
        let delay = {
            let mut state = self.state.lock().await;
            state.replica_reads = state.replica_reads.saturating_add(1);
            state.replica_read_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        if let Some(error) = state.replica_read_failures.pop_front() {
            return Err(error);
        }
        state
            .deployments
            .get(key)
            .map(|deployment| deployment.spec)
            .ok_or_else(|| ClientError::not_found(GroupVersionKind::deployment(), key.clone()))
    }

    async fn set_replicas(&self, key: &ObjectKey, replicas: i32) -> ClientResult<()> {
        let delay = self.state.lock().await.write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        if let Some(error) = state.write_failures.pop_front() {
            return Err(error);
        }

        let deployment = state
            .deployments
            .get_mut(key)
            .ok_or_else(|| ClientError::not_found(GroupVersionKind::deployment(), key.clone()))?;
        deployment.spec = Some(replicas);
        deployment.pending_reads = deployment.rollout_lag;

        state.writes.push((key.clone(), replicas));
        Ok(())
    }

    async fn observed_replicas(&self, key: &ObjectKey) -> ClientResult<ObservedReplicas> {
        let mut state = self.state.lock().await;
        state.observed_reads = state.observed_reads.saturating_add(1);

        if let Some(error) = state.observed_failures.pop_front() {
            return Err(error);
        }
        state
            .deployments
            .get_mut(key)
            .map(DeploymentState::observe)
            .ok_or_else(|| ClientError::not_found(GroupVersionKind::deployment(), key.clone()))
    }
}
