//! Runner error types and exit codes

use access_sdk::error::SyncError;
use connector_wiz::WizError;
use thiserror::Error;

/// Exit codes
/// - 0: Success
/// - 1: Sync or validation failure
/// - 2: Invalid configuration
/// - 130: Interrupted
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Connector(#[from] WizError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("{resource_type} {phase} returned the page token '{token}' twice")]
    StalledPaging {
        resource_type: String,
        phase: &'static str,
        token: String,
    },
}

impl AppError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) | AppError::Connector(WizError::Config(_)) => 2,
            AppError::Sync(e) if e.is_cancelled() => 130,
            _ => 1,
        }
    }
}
