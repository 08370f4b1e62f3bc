//! Wiz Connector
//!
//! Read-only connector that publishes Wiz users, roles, projects and
//! security findings through the `access-sdk` syncer traits.
//!
//! # Features
//!
//! - `OAuth2` client credentials authentication with the Wiz `audience`
//! - GraphQL transport with exponential backoff on transport errors and HTTP 429
//! - Normalization of edge, node and flat-array collection shapes
//! - Fallback to `userAccounts` when role and project assignments are not readable
//!
//! # Example
//!
//! ```no_run
//! use access_sdk::prelude::*;
//! use connector_wiz::{WizConfig, WizConnector, WizCredentials};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WizConfig::builder()
//!     .api_url("https://api.us17.app.wiz.io/graphql")
//!     .auth_endpoint("https://auth.app.wiz.io/oauth/token")
//!     .build()?;
//!
//! let connector = WizConnector::new(config, WizCredentials::new("client-id", "client-secret"))?;
//! connector.validate(&SyncOpAttrs::first_page()).await?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod config;
mod connector;
mod error;
mod graphql;
mod insights;
pub mod models;
mod projects;
pub mod resource_types;
mod retry;
mod roles;
mod users;

// Re-exports
pub use auth::TokenCache;
pub use client::{UserRelations, WizClient};
pub use config::{
    RelationMode, RoleGrantSource, WizConfig, WizConfigBuilder, WizCredentials, DEFAULT_AUDIENCE,
    DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_TIMEOUT, MAX_PAGE_SIZE,
};
pub use connector::WizConnector;
pub use error::{WizError, WizResult};
pub use graphql::GraphQlClient;
pub use insights::{CloudProvider, InsightSyncer};
pub use projects::ProjectSyncer;
pub use retry::RetryPolicy;
pub use roles::RoleSyncer;
pub use users::{UserSyncer, MEMBER};
