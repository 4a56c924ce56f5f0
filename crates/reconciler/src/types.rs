//! Core types for condition waits and replica convergence.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the resource manager deployment scaled during seed setup.
pub const RESOURCE_MANAGER_DEPLOYMENT: &str = "gardener-resource-manager";

/// API group, version, and kind of a remote resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionKind {
    /// API group; empty for the core group.
    pub group: String,
    /// API version within the group.
    pub version: String,
    /// Resource kind.
    pub kind: String,
}

impl GroupVersionKind {
    /// Create a new group/version/kind triple.
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// `apps/v1` Deployment.
    pub fn deployment() -> Self {
        Self::new("apps", "v1", "Deployment")
    }

    /// The `apiVersion` string for this kind.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.api_version())
    }
}

/// Namespace and name of a remote resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    /// Create a new object key.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Status of a condition as reported by the resource.
///
/// Resources may report values beyond the well-known ones; those decode as
/// [`ConditionStatus::Other`] and compare by their exact text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
    Progressing,
    Other(String),
}

impl ConditionStatus {
    /// The status as reported on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::True => "True",
            Self::False => "False",
            Self::Unknown => "Unknown",
            Self::Progressing => "Progressing",
            Self::Other(status) => status,
        }
    }
}

impl From<String> for ConditionStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "True" => Self::True,
            "False" => Self::False,
            "Unknown" => Self::Unknown,
            "Progressing" => Self::Progressing,
            _ => Self::Other(status),
        }
    }
}

impl From<&str> for ConditionStatus {
    fn from(status: &str) -> Self {
        Self::from(status.to_string())
    }
}

impl From<ConditionStatus> for String {
    fn from(status: ConditionStatus) -> Self {
        match status {
            ConditionStatus::Other(status) => status,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `{type, status, reason}` record from a resource's status block.
///
/// Extra fields such as `lastTransitionTime` or `message` are ignored when
/// decoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: String,
}

impl Condition {
    /// Create a new condition record.
    pub fn new(
        condition_type: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            condition_type: condition_type.into(),
            status,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(type: {}, status: {}, reason: {})",
            self.condition_type, self.status, self.reason
        )
    }
}

/// Identifies one resource and the condition to await on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionQuery {
    /// Kind of the resource to fetch.
    pub kind: GroupVersionKind,
    /// Locator of the resource to fetch.
    pub key: ObjectKey,
    /// The exact `{type, status, reason}` triple that ends the wait.
    pub expected: Condition,
}

impl ConditionQuery {
    /// Create a new query.
    pub fn new(
        kind: GroupVersionKind,
        key: ObjectKey,
        condition_type: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            key,
            expected: Condition::new(condition_type, status, reason),
        }
    }

    /// Whether `condition` is exactly the expected triple.
    pub fn matches(&self, condition: &Condition) -> bool {
        *condition == self.expected
    }
}

/// Replica counts reported by a deployment's status block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedReplicas {
    /// Pods currently targeted by the deployment.
    pub replicas: i32,
    /// Pods that are available.
    pub available_replicas: i32,
}

impl ObservedReplicas {
    /// Create a new observation.
    pub const fn new(replicas: i32, available_replicas: i32) -> Self {
        Self {
            replicas,
            available_replicas,
        }
    }

    /// Whether the rollout has settled at `desired`.
    pub const fn is_converged(&self, desired: i32) -> bool {
        self.replicas == desired && self.available_replicas == desired
    }
}

impl fmt::Display for ObservedReplicas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} replicas, {} available",
            self.replicas, self.available_replicas
        )
    }
}

/// Current vs. desired replica count of a scale target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaConvergenceState {
    /// `None` when the target does not exist.
    pub current: Option<i32>,
    pub desired: i32,
}

impl ReplicaConvergenceState {
    /// Create a new state.
    pub const fn new(current: Option<i32>, desired: i32) -> Self {
        Self { current, desired }
    }

    /// Whether a write is required to reach the desired count.
    pub const fn needs_write(&self) -> bool {
        match self.current {
            Some(current) => current != self.desired,
            None => false,
        }
    }
}

/// The deployment a scale operation acts on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScaleTarget {
    pub key: ObjectKey,
}

impl ScaleTarget {
    /// Target an arbitrary deployment.
    pub fn deployment(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: ObjectKey::new(namespace, name),
        }
    }

    /// Target the resource manager deployment in `namespace`.
    pub fn resource_manager(namespace: impl Into<String>) -> Self {
        Self::deployment(namespace, RESOURCE_MANAGER_DEPLOYMENT)
    }
}

impl fmt::Display for ScaleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deployment {}", self.key)
    }
}
