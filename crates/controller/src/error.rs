//! # Errors
//!
//! Error taxonomy shared by the store adapters and every lifecycle component.
//!
//! Only retryable failures are returned from a reconciliation pass; everything
//! else is recorded as a condition on the object being reconciled.

use crate::store::ObjectKey;
use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A write was based on a stale resource version
    #[error("conflict writing {key}: resource version is stale")]
    Conflict { key: ObjectKey },

    /// The object does not exist
    #[error("{key} not found")]
    NotFound { key: ObjectKey },

    /// A create targeted an identity that is already taken
    #[error("{key} already exists")]
    AlreadyExists { key: ObjectKey },

    /// A required reference points at an object that does not exist
    #[error("cannot resolve {reference}: {reason}")]
    ReferenceUnresolvable { reference: String, reason: String },

    /// A ProviderConfig cannot be deleted while Managed resources use it
    #[error("provider config {name} is in use by {users} managed resource(s)")]
    InUse { name: String, users: i64 },

    /// The requested operation is not permitted by the resource's policies
    #[error("policy violation: {0}")]
    PolicyViolation(String),

    /// The pass ran past its deadline and was abandoned
    #[error("reconciliation of {key} exceeded its {seconds}s deadline")]
    DeadlineExceeded { key: String, seconds: u64 },

    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failure reported by an external collaborator (external system, renderer, resolver)
    #[error("external error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    /// Whether the invoking loop should retry the pass with backoff
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Conflict { .. }
            | Error::DeadlineExceeded { .. }
            | Error::Kube(_)
            | Error::External(_) => true,
            Error::NotFound { .. }
            | Error::AlreadyExists { .. }
            | Error::ReferenceUnresolvable { .. }
            | Error::InUse { .. }
            | Error::PolicyViolation(_)
            | Error::Serialization(_) => false,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. })
    }

    /// Short machine-readable label for metrics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Conflict { .. } => "conflict",
            Error::NotFound { .. } => "not-found",
            Error::AlreadyExists { .. } => "already-exists",
            Error::ReferenceUnresolvable { .. } => "reference-unresolvable",
            Error::InUse { .. } => "in-use",
            Error::PolicyViolation(_) => "policy-violation",
            Error::DeadlineExceeded { .. } => "deadline-exceeded",
            Error::Kube(_) => "kube",
            Error::Serialization(_) => "serialization",
            Error::External(_) => "external",
        }
    }
}

/// Treat `NotFound` as success, for delete paths
pub(crate) fn ignore_not_found(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}
