//! Error types for tag lifecycle operations.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::binding::ValidationError;
use crate::store::StoreError;

/// Lifecycle operation, used as error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Attaching a tag.
    Create,
    /// Looking a tag up.
    Read,
    /// Removing a tag.
    Delete,
}

impl Operation {
    /// Lowercase name of the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by [`TagController`](crate::TagController).
///
/// Drift is not an error: a read that finds nothing returns
/// [`Presence::Absent`](crate::Presence::Absent).
#[derive(Debug, Error)]
pub enum TagError {
    /// Input failed validation; no remote call was made.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The tag store call failed.
    #[error("failed to {operation} tag {key}={value:?} on {resource_id}: {source}")]
    Remote {
        operation: Operation,
        resource_id: String,
        key: String,
        value: String,
        #[source]
        source: StoreError,
    },

    /// The mutation did not finish before its deadline.
    #[error("{operation} of tag {key} on {resource_id} timed out after {timeout:?}")]
    Timeout {
        operation: Operation,
        resource_id: String,
        key: String,
        timeout: Duration,
    },
}

impl TagError {
    /// Whether the host may retry the same call.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::Remote { source, .. } => source.is_transient(),
            Self::Timeout { .. } => true,
        }
    }

    /// Underlying store failure, if any.
    #[must_use]
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Remote { source, .. } => Some(source),
            _ => None,
        }
    }
}
