//! Resource-access collaborators.
//!
//! The engine never talks to a cluster directly; callers plug in a client
//! that implements these traits. [`crate::memory::InMemoryCluster`] is the
//! in-process implementation used by tests.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ClientResult, DecodeError};
use crate::types::{Condition, GroupVersionKind, ObjectKey, ObservedReplicas};

/// Fetches a generic resource representation.
#[async_trait]
pub trait ResourceReader: Send + Sync {
    /// Get the resource of `kind` at `key`.
    ///
    /// A missing resource is reported as [`crate::ClientError::NotFound`].
    async fn get(&self, kind: &GroupVersionKind, key: &ObjectKey) -> ClientResult<Value>;
}

/// Decodes the condition list from a fetched resource.
pub trait ConditionExtractor: Send + Sync {
    /// Return the conditions in the order the resource reports them.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the resource is malformed.
    fn extract_conditions(&self, resource: &Value) -> Result<Vec<Condition>, DecodeError>;
}

/// Reads conditions from `status.conditions`.
///
/// A resource without a status block, or with a null condition list, has no
/// conditions yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusConditions;

impl ConditionExtractor for StatusConditions {
    fn extract_conditions(&self, resource: &Value) -> Result<Vec<Condition>, DecodeError> {
        if !resource.is_object() {
            return Err(DecodeError::new("resource is not an object"));
        }

        match resource.pointer("/status/conditions") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(conditions) => Vec::<Condition>::deserialize(conditions)
                .map_err(|e| DecodeError::new(format!("status.conditions: {e}"))),
        }
    }
}

/// Reads and writes the replica count of deployments.
#[async_trait]
pub trait DeploymentClient: Send + Sync {
    /// Desired replica count from the deployment spec.
    ///
    /// `Ok(None)` means the spec leaves the count unset.
    async fn get_replicas(&self, key: &ObjectKey) -> ClientResult<Option<i32>>;

    /// Set the desired replica count.
    async fn set_replicas(&self, key: &ObjectKey, replicas: i32) -> ClientResult<()>;

    /// Replica counts currently reported by the deployment status.
    async fn observed_replicas(&self, key: &ObjectKey) -> ClientResult<ObservedReplicas>;
}
