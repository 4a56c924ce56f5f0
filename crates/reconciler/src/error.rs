//! Error types for the reconciler crate.
//!
//! Read, decode, and not-yet-ready errors are retryable: the poll engine
//! absorbs them and only hands the last one back inside a terminal
//! [`Error::DeadlineExceeded`] or [`Error::Cancelled`]. Write failures and
//! one-shot read failures are fatal.

use thiserror::Error;

use crate::types::{GroupVersionKind, ObjectKey, ObservedReplicas};

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
#[derive(Debug, Error)]
pub enum Error {
    /// The resource could not be fetched.
    #[error("unable to retrieve {kind} {key}: {reason}")]
    ReadFailure {
        kind: GroupVersionKind,
        key: ObjectKey,
        reason: String,
    },

    /// The resource was fetched but its status could not be decoded.
    #[error("unable to decode status of {kind} {key}: {reason}")]
    DecodeFailure {
        kind: GroupVersionKind,
        key: ObjectKey,
        reason: String,
    },

    /// The expected condition is not (yet) reported.
    #[error(
        "{kind} {key} does not yet contain expected condition. EXPECTED: {expected}; OBSERVED: {observed}"
    )]
    ConditionMismatch {
        kind: GroupVersionKind,
        key: ObjectKey,
        expected: String,
        observed: String,
    },

    /// The deployment has not rolled out to the desired count (yet).
    #[error("deployment {key} not scaled to {desired} yet ({observed})")]
    ReplicasPending {
        key: ObjectKey,
        desired: i32,
        observed: ObservedReplicas,
    },

    /// A probe-specific retryable reason.
    #[error("{reason}")]
    Pending { reason: String },

    /// A mutation was rejected.
    #[error("failed to scale deployment {key} to {replicas} replicas: {reason}")]
    WriteFailure {
        key: ObjectKey,
        replicas: i32,
        reason: String,
    },

    /// The wait deadline elapsed before the probe reported done.
    #[error("deadline exceeded after {attempts} attempt(s){}", last_error_suffix(.last))]
    DeadlineExceeded {
        attempts: u32,
        last: Option<Box<Error>>,
    },

    /// The caller cancelled the wait.
    #[error("wait cancelled after {attempts} attempt(s){}", last_error_suffix(.last))]
    Cancelled {
        attempts: u32,
        last: Option<Box<Error>>,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Configuration could not be loaded.
    #[error(transparent)]
    Core(#[from] settle_core::Error),
}

fn last_error_suffix(last: &Option<Box<Error>>) -> String {
    last.as_ref()
        .map_or_else(String::new, |e| format!(", last error: {e}"))
}

impl Error {
    /// Create a read failure error.
    pub fn read_failure(kind: GroupVersionKind, key: ObjectKey, reason: impl Into<String>) -> Self {
        Self::ReadFailure {
            kind,
            key,
            reason: reason.into(),
        }
    }

    /// Create a decode failure error.
    pub fn decode_failure(
        kind: GroupVersionKind,
        key: ObjectKey,
        reason: impl Into<String>,
    ) -> Self {
        Self::DecodeFailure {
            kind,
            key,
            reason: reason.into(),
        }
    }

    /// Create a write failure error.
    pub fn write_failure(key: ObjectKey, replicas: i32, reason: impl Into<String>) -> Self {
        Self::WriteFailure {
            key,
            replicas,
            reason: reason.into(),
        }
    }

    /// Create a generic pending error for custom probes.
    pub fn pending(reason: impl Into<String>) -> Self {
        Self::Pending {
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether the poll engine keeps going after this error.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ReadFailure { .. }
                | Self::DecodeFailure { .. }
                | Self::ConditionMismatch { .. }
                | Self::ReplicasPending { .. }
                | Self::Pending { .. }
        )
    }

    /// The last retryable error seen before a wait gave up.
    pub fn last_error(&self) -> Option<&Self> {
        match self {
            Self::DeadlineExceeded { last, .. } | Self::Cancelled { last, .. } => last.as_deref(),
            _ => None,
        }
    }
}

/// Error returned by the resource-access collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The resource does not exist.
    #[error("{kind} {key} not found")]
    NotFound {
        kind: GroupVersionKind,
        key: ObjectKey,
    },

    /// The API could not be reached or did not answer.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The API answered with a refusal.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl ClientError {
    /// Create a not found error.
    pub fn not_found(kind: GroupVersionKind, key: ObjectKey) -> Self {
        Self::NotFound { kind, key }
    }

    /// Whether this error means the resource is absent.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for collaborator calls.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Error returned when a resource's status block cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DecodeError(pub String);

impl DecodeError {
    /// Create a new decode error.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}
