//! Logging setup using tracing.
//!
//! Logs go to stderr so stdout stays a clean stream of sync records.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, AppResult};

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Builds the filter from `RUST_LOG`, falling back to `filter`.
fn build_filter(filter: &str) -> AppResult<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .map_err(|e| AppError::Config(format!("invalid log filter '{filter}': {e}")))
}

/// Initialize the tracing subscriber.
///
/// # Errors
///
/// Returns an error if the filter is invalid or a subscriber is already set.
pub fn init_logging(filter: &str, format: LogFormat) -> AppResult<()> {
    let filter_layer = build_filter(filter)?;

    let result = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(filter_layer)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(true)
                    .with_line_number(true)
                    .flatten_event(true),
            )
            .with(filter_layer)
            .try_init(),
    };
    result.map_err(|e| AppError::Config(format!("failed to initialize logging: {e}")))?;

    tracing::debug!(filter = %filter, ?format, "Logging initialized");
    Ok(())
}
