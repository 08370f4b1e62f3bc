//! Role synchronization.

use access_sdk::prelude::*;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::client::{UserRelations, WizClient};
use crate::config::RoleGrantSource;
use crate::error::sync_error;
use crate::models::{User, UserRole};
use crate::resource_types::{ROLE, USER};
use crate::users::{relation_gap, MEMBER};

/// Publishes Wiz roles as `role` resources with a `member` entitlement.
#[derive(Debug)]
pub struct RoleSyncer {
    client: Arc<WizClient>,
    role_grant_source: RoleGrantSource,
}

impl RoleSyncer {
    pub fn new(client: Arc<WizClient>, role_grant_source: RoleGrantSource) -> Self {
        Self {
            client,
            role_grant_source,
        }
    }
}

pub(crate) fn role_resource(role: &UserRole) -> SyncResult<Resource> {
    let mut profile = Map::new();
    profile.insert("description".into(), Value::from(role.description.as_str()));
    profile.insert(
        "scopes".into(),
        Value::Array(role.scopes.iter().map(|s| Value::from(s.as_str())).collect()),
    );
    profile.insert("builtin".into(), Value::Bool(role.builtin));
    profile.insert("is_project_scoped".into(), Value::Bool(role.is_project_scoped));

    let display_name = if role.name.is_empty() {
        role.id.as_str()
    } else {
        role.name.as_str()
    };

    Ok(Resource::new(&ROLE, role.id.as_str(), display_name)?
        .with_description(role.description.as_str())
        .with_trait(ResourceTrait::Role { profile }))
}

/// Whether `user` holds the role `resource` describes.
fn holds_role(user: &User, resource: &Resource) -> bool {
    user.effective_role.as_ref().is_some_and(|role| {
        (!role.id.is_empty() && role.id == resource.id.resource)
            || (!role.name.is_empty() && role.name == resource.display_name)
    })
}

#[async_trait]
impl ResourceSyncer for RoleSyncer {
    fn resource_type(&self) -> &ResourceType {
        &ROLE
    }

    #[instrument(skip(self, _parent, attrs), fields(resource_type = "role"))]
    async fn list(
        &self,
        _parent: Option<&ResourceId>,
        attrs: &SyncOpAttrs,
    ) -> SyncResult<(Vec<Resource>, SyncOpResults)> {
        let page = self
            .client
            .list_roles(attrs.page_token.cursor(), &attrs.cancel)
            .await
            .map_err(|e| sync_error(&ROLE.id, "list", e))?;

        let resources = page
            .items
            .iter()
            .filter(|role| !role.id.is_empty())
            .map(role_resource)
            .collect::<SyncResult<Vec<_>>>()?;

        Ok((
            resources,
            SyncOpResults::next(page.page_info.next_page_token()),
        ))
    }

    async fn entitlements(
        &self,
        resource: &Resource,
        _attrs: &SyncOpAttrs,
    ) -> SyncResult<(Vec<Entitlement>, SyncOpResults)> {
        let member = Entitlement::assignment(resource, MEMBER)
            .grantable_to(&USER)
            .with_display_name(format!("{} Role Member", resource.display_name))
            .with_description(format!("Access to {} role in Wiz", resource.display_name));
        Ok((vec![member], SyncOpResults::done()))
    }

    /// Scans one page of principals for holders of this role.
    ///
    /// Empty unless roles own the role grants; users emit them otherwise.
    #[instrument(skip(self, resource, attrs), fields(role = %resource.id.resource))]
    async fn grants(
        &self,
        resource: &Resource,
        attrs: &SyncOpAttrs,
    ) -> SyncResult<(Vec<Grant>, SyncOpResults)> {
        if self.role_grant_source != RoleGrantSource::Roles {
            return Ok((Vec::new(), SyncOpResults::done()));
        }

        let relations = self
            .client
            .user_relations(&attrs.cancel)
            .await
            .map_err(|e| sync_error(&ROLE.id, "grants", e))?;
        if relations == UserRelations::Unavailable {
            return Ok((
                Vec::new(),
                SyncOpResults::done().with_annotation(relation_gap("role members")),
            ));
        }

        let page = self
            .client
            .list_users(attrs.page_token.cursor(), &attrs.cancel)
            .await
            .map_err(|e| sync_error(&ROLE.id, "grants", e))?;

        let grants: Vec<Grant> = page
            .items
            .iter()
            .filter(|user| !user.email.trim().is_empty() && holds_role(user, resource))
            .map(|user| {
                Grant::new(
                    &resource.id,
                    MEMBER,
                    ResourceId::new(USER.id.as_str(), user.email.trim()),
                )
            })
            .collect();

        debug!("Found {} role members on this page", grants.len());
        Ok((grants, SyncOpResults::next(page.page_info.next_page_token())))
    }
}
