//! Sync error types
//!
//! Errors surfaced by resource syncers to the sync engine.

use thiserror::Error;

/// Result type alias using `SyncError`.
pub type SyncResult<T> = Result<T, SyncError>;

/// Error returned by a syncer operation.
///
/// The sync engine decides whether to abort or continue the overall sync;
/// syncers never suppress a failure on one page by retrying earlier pages.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The upstream call backing the operation failed.
    #[error("{resource_type} {operation} failed: {source}")]
    Upstream {
        resource_type: String,
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// A record could not be turned into a valid resource.
    #[error("invalid resource: {message}")]
    InvalidResource { message: String },

    /// The resource passed in does not carry the trait the operation needs.
    #[error("resource {resource_id} has no {expected} trait")]
    MissingTrait {
        resource_id: String,
        expected: &'static str,
    },
}

impl SyncError {
    /// Wrap an upstream failure with the resource type and operation it broke.
    pub fn upstream<E>(resource_type: impl Into<String>, operation: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SyncError::Upstream {
            resource_type: resource_type.into(),
            operation,
            source: Box::new(source),
        }
    }

    /// Check whether this error is a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}
