//! wiz-sync - run the Wiz access connector locally
//!
//! - `validate` checks that the configured credentials can read Wiz
//! - `sync` publishes every resource, entitlement and grant as JSON lines

use access_sdk::prelude::*;
use clap::{Args, Parser, Subcommand};
use connector_wiz::{RelationMode, RoleGrantSource, WizConfig, WizConnector, WizCredentials};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod error;
mod logging;
mod runner;

use error::AppResult;
use logging::LogFormat;

/// Wiz access connector
#[derive(Parser)]
#[command(name = "wiz-sync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    wiz: WizArgs,

    /// Log filter directive, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    log_filter: String,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct WizArgs {
    /// Wiz GraphQL endpoint
    #[arg(long, env = "WIZ_API_URL")]
    wiz_api_url: String,

    /// Service account client id
    #[arg(long, env = "WIZ_CLIENT_ID")]
    wiz_client_id: String,

    /// Service account client secret
    #[arg(long, env = "WIZ_CLIENT_SECRET", hide_env_values = true)]
    wiz_client_secret: String,

    /// OAuth2 token endpoint
    #[arg(long, env = "WIZ_AUTH_ENDPOINT")]
    wiz_auth_endpoint: String,

    /// Audience requested with the token
    #[arg(long, env = "WIZ_AUDIENCE", default_value = connector_wiz::DEFAULT_AUDIENCE)]
    audience: String,

    /// Records per page (1-500)
    #[arg(long, env = "WIZ_PAGE_SIZE", default_value_t = connector_wiz::DEFAULT_PAGE_SIZE)]
    page_size: u32,

    /// Per-request timeout in seconds
    #[arg(long, env = "WIZ_REQUEST_TIMEOUT", default_value_t = 30)]
    request_timeout_secs: u64,

    /// Whether user role and project assignments are read: auto, enabled or disabled
    #[arg(long, env = "WIZ_RELATION_MODE", default_value = "auto")]
    relation_mode: RelationMode,

    /// Syncer that emits user-to-role grants: users or roles
    #[arg(long, env = "WIZ_ROLE_GRANTS_FROM", default_value = "users")]
    role_grants_from: RoleGrantSource,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the credentials against the Wiz API
    Validate,

    /// Sync every resource type and print records as JSON lines
    Sync,
}

impl WizArgs {
    fn into_connector(self) -> AppResult<WizConnector> {
        let config = WizConfig::builder()
            .api_url(self.wiz_api_url)
            .auth_endpoint(self.wiz_auth_endpoint)
            .audience(self.audience)
            .page_size(self.page_size)
            .request_timeout(Duration::from_secs(self.request_timeout_secs))
            .relation_mode(self.relation_mode)
            .role_grant_source(self.role_grants_from)
            .build()?;
        let credentials = WizCredentials::new(self.wiz_client_id, self.wiz_client_secret);
        Ok(WizConnector::new(config, credentials)?)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(&cli.log_filter, cli.log_format) {
        eprintln!("{e}");
        std::process::exit(e.exit_code());
    }

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            error!(error = %e, "wiz-sync failed");
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let connector = cli.wiz.into_connector()?;
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let metadata = connector.metadata();
    info!(connector = %metadata.display_name, "Starting");

    match cli.command {
        Commands::Validate => {
            connector
                .validate(&SyncOpAttrs::page(PageToken::first(), cancel))
                .await?;
            info!("Credentials are valid");
        }
        Commands::Sync => {
            let stdout = std::io::stdout().lock();
            let summary = runner::run_sync(&connector, &cancel, stdout).await?;
            info!(
                resources = summary.resources,
                entitlements = summary.entitlements,
                grants = summary.grants,
                annotations = summary.annotations,
                "Sync complete"
            );
        }
    }
    Ok(())
}

/// Cancels in-flight work on Ctrl-C.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            cancel.cancel();
        }
    });
}
