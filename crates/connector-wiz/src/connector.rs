//! Wiz connector implementation
//!
//! Wires the shared API client into one syncer per resource type.

use access_sdk::prelude::*;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::client::WizClient;
use crate::config::{WizConfig, WizCredentials};
use crate::error::sync_error;
use crate::insights::InsightSyncer;
use crate::projects::ProjectSyncer;
use crate::resource_types::{self, ROLE};
use crate::roles::RoleSyncer;
use crate::users::UserSyncer;
use crate::WizResult;

pub const DISPLAY_NAME: &str = "Wiz";
pub const DESCRIPTION: &str =
    "Wiz cloud security platform connector for syncing users, roles, projects, and security insights";

/// Read-only connector for the Wiz GraphQL API.
#[derive(Debug)]
pub struct WizConnector {
    config: WizConfig,
    client: Arc<WizClient>,
}

impl WizConnector {
    /// Creates a connector from validated configuration and credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: WizConfig, credentials: WizCredentials) -> WizResult<Self> {
        let client = Arc::new(WizClient::new(&config, credentials)?);
        Ok(Self { config, client })
    }

    /// Returns the connector configuration.
    #[must_use]
    pub fn config(&self) -> &WizConfig {
        &self.config
    }

    /// Returns the shared API client.
    #[must_use]
    pub fn client(&self) -> &Arc<WizClient> {
        &self.client
    }

    /// Every resource type this connector publishes.
    #[must_use]
    pub fn resource_types(&self) -> Vec<ResourceType> {
        resource_types::all()
    }
}

#[async_trait]
impl Connector for WizConnector {
    fn metadata(&self) -> ConnectorMetadata {
        ConnectorMetadata {
            display_name: DISPLAY_NAME.to_string(),
            description: DESCRIPTION.to_string(),
        }
    }

    /// Exercises the credentials by listing roles.
    #[instrument(skip(self, attrs))]
    async fn validate(&self, attrs: &SyncOpAttrs) -> SyncResult<()> {
        let roles = self
            .client
            .list_roles(None, &attrs.cancel)
            .await
            .map_err(|e| sync_error(&ROLE.id, "validate", e))?;

        info!(
            api_url = %self.config.api_url,
            roles = roles.items.len(),
            "Wiz connection validated"
        );
        Ok(())
    }

    fn resource_syncers(&self) -> Vec<Arc<dyn ResourceSyncer>> {
        let source = self.config.role_grant_source;
        let users: Arc<dyn ResourceSyncer> =
            Arc::new(UserSyncer::new(Arc::clone(&self.client), source));
        let roles: Arc<dyn ResourceSyncer> =
            Arc::new(RoleSyncer::new(Arc::clone(&self.client), source));
        let projects: Arc<dyn ResourceSyncer> =
            Arc::new(ProjectSyncer::new(Arc::clone(&self.client)));
        let insights: Arc<dyn ResourceSyncer> =
            Arc::new(InsightSyncer::new(Arc::clone(&self.client)));
        vec![users, roles, projects, insights]
    }
}
