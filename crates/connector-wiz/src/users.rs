//! Principal synchronization.
//!
//! Users are keyed by email: `users` and `userAccounts` return different ids
//! for the same person, and project owners are only referenced by email.

use access_sdk::prelude::*;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::client::{UserRelations, WizClient};
use crate::config::RoleGrantSource;
use crate::error::sync_error;
use crate::models::User;
use crate::resource_types::{PROJECT, ROLE, USER};

/// Slug of every membership entitlement the connector publishes.
pub const MEMBER: &str = "member";

const PROFILE_WIZ_ID: &str = "wiz_id";
const PROFILE_ROLE_ID: &str = "role_id";
const PROFILE_ROLE_NAME: &str = "role_name";
const PROFILE_PROJECT_IDS: &str = "project_ids";

/// Annotation attached to relation results the credentials cannot read.
pub(crate) fn relation_gap(relation: &str) -> Annotation {
    Annotation::CapabilityGap {
        relation: relation.to_string(),
        detail: "credentials cannot read user role and project assignments; \
                 an empty result does not mean no access"
            .to_string(),
    }
}

/// Publishes Wiz principals as `user` resources.
#[derive(Debug)]
pub struct UserSyncer {
    client: Arc<WizClient>,
    role_grant_source: RoleGrantSource,
}

impl UserSyncer {
    pub fn new(client: Arc<WizClient>, role_grant_source: RoleGrantSource) -> Self {
        Self {
            client,
            role_grant_source,
        }
    }
}

/// Maps a principal with an email to a user resource.
///
/// Returns `None` when the principal has no email to key it by.
pub(crate) fn user_resource(user: &User, relations: UserRelations) -> SyncResult<Option<Resource>> {
    let email = user.email.trim();
    if email.is_empty() {
        return Ok(None);
    }

    let mut profile = Map::new();
    if !user.id.is_empty() {
        profile.insert(PROFILE_WIZ_ID.into(), Value::from(user.id.as_str()));
    }
    if relations == UserRelations::Available {
        if let Some(role) = user.effective_role.as_ref().filter(|r| !r.id.is_empty()) {
            profile.insert(PROFILE_ROLE_ID.into(), Value::from(role.id.as_str()));
            if !role.name.is_empty() {
                profile.insert(PROFILE_ROLE_NAME.into(), Value::from(role.name.as_str()));
            }
        }
        let project_ids: Vec<Value> = user
            .effective_assigned_projects
            .iter()
            .flatten()
            .filter(|p| !p.id.is_empty())
            .map(|p| Value::from(p.id.as_str()))
            .collect();
        if !project_ids.is_empty() {
            profile.insert(PROFILE_PROJECT_IDS.into(), Value::Array(project_ids));
        }
    }

    let status = if user.is_suspended == Some(true) {
        UserStatus::Disabled
    } else {
        UserStatus::Enabled
    };

    let display_name = if user.name.trim().is_empty() {
        email
    } else {
        user.name.as_str()
    };

    let resource = Resource::new(&USER, email, display_name)?.with_trait(ResourceTrait::User {
        emails: vec![email.to_string()],
        status,
        profile,
    });
    Ok(Some(resource))
}

#[async_trait]
impl ResourceSyncer for UserSyncer {
    fn resource_type(&self) -> &ResourceType {
        &USER
    }

    #[instrument(skip(self, _parent, attrs), fields(resource_type = "user"))]
    async fn list(
        &self,
        _parent: Option<&ResourceId>,
        attrs: &SyncOpAttrs,
    ) -> SyncResult<(Vec<Resource>, SyncOpResults)> {
        let (page, relations) = self
            .client
            .list_principals(attrs.page_token.cursor(), &attrs.cancel)
            .await
            .map_err(|e| sync_error(&USER.id, "list", e))?;

        let mut resources = Vec::with_capacity(page.items.len());
        let mut skipped = 0usize;
        for user in &page.items {
            match user_resource(user, relations)? {
                Some(resource) => resources.push(resource),
                None => skipped += 1,
            }
        }

        let mut results = SyncOpResults::next(page.page_info.next_page_token());
        if skipped > 0 {
            debug!(skipped, "Skipped users without email");
            results = results.with_annotation(Annotation::SkippedRecords {
                count: skipped,
                reason: "user has no email".to_string(),
            });
        }

        Ok((resources, results))
    }

    async fn entitlements(
        &self,
        _resource: &Resource,
        _attrs: &SyncOpAttrs,
    ) -> SyncResult<(Vec<Entitlement>, SyncOpResults)> {
        Ok((Vec::new(), SyncOpResults::done()))
    }

    /// Emits the role and project grants cached on the user during listing.
    #[instrument(skip(self, resource, attrs), fields(user = %resource.id.resource))]
    async fn grants(
        &self,
        resource: &Resource,
        attrs: &SyncOpAttrs,
    ) -> SyncResult<(Vec<Grant>, SyncOpResults)> {
        if !matches!(resource.traits, Some(ResourceTrait::User { .. })) {
            return Err(SyncError::MissingTrait {
                resource_id: resource.id.to_string(),
                expected: "user",
            });
        }

        let relations = self
            .client
            .user_relations(&attrs.cancel)
            .await
            .map_err(|e| sync_error(&USER.id, "grants", e))?;
        if relations == UserRelations::Unavailable {
            return Ok((
                Vec::new(),
                SyncOpResults::done().with_annotation(relation_gap("user memberships")),
            ));
        }

        let mut grants = Vec::new();

        if self.role_grant_source == RoleGrantSource::Users {
            if let Some(role_id) = resource.profile_str(PROFILE_ROLE_ID) {
                let role = ResourceId::new(ROLE.id.as_str(), role_id);
                grants.push(Grant::new(&role, MEMBER, resource.id.clone()));
            }
        }

        for project_id in resource.profile_str_list(PROFILE_PROJECT_IDS) {
            let project = ResourceId::new(PROJECT.id.as_str(), project_id);
            grants.push(Grant::new(&project, MEMBER, resource.id.clone()));
        }

        debug!("Emitting {} grants", grants.len());
        Ok((grants, SyncOpResults::done()))
    }
}
