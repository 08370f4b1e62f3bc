//! Project synchronization.

use access_sdk::prelude::*;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::client::WizClient;
use crate::error::sync_error;
use crate::models::Project;
use crate::resource_types::{PROJECT, USER};
use crate::users::MEMBER;

/// Publishes Wiz projects as `project` resources.
///
/// Owners and security champions both hold the single `member` entitlement.
#[derive(Debug)]
pub struct ProjectSyncer {
    client: Arc<WizClient>,
}

impl ProjectSyncer {
    pub fn new(client: Arc<WizClient>) -> Self {
        Self { client }
    }
}

pub(crate) fn project_resource(project: &Project) -> SyncResult<Resource> {
    let display_name = if project.name.is_empty() {
        project.id.as_str()
    } else {
        project.name.as_str()
    };
    Ok(Resource::new(&PROJECT, project.id.as_str(), display_name)?
        .with_description(project.description.as_str())
        .with_trait(ResourceTrait::Group {
            profile: serde_json::Map::new(),
        }))
}

/// Member grants for every owner and champion with an email.
pub(crate) fn project_grants(resource: &ResourceId, project: &Project) -> Vec<Grant> {
    let mut seen = HashSet::new();
    project
        .project_owners
        .iter()
        .chain(&project.security_champions)
        .map(|principal| principal.email.trim())
        .filter(|email| !email.is_empty() && seen.insert(*email))
        .map(|email| Grant::new(resource, MEMBER, ResourceId::new(USER.id.as_str(), email)))
        .collect()
}

#[async_trait]
impl ResourceSyncer for ProjectSyncer {
    fn resource_type(&self) -> &ResourceType {
        &PROJECT
    }

    #[instrument(skip(self, _parent, attrs), fields(resource_type = "project"))]
    async fn list(
        &self,
        _parent: Option<&ResourceId>,
        attrs: &SyncOpAttrs,
    ) -> SyncResult<(Vec<Resource>, SyncOpResults)> {
        let page = self
            .client
            .list_projects(attrs.page_token.cursor(), &attrs.cancel)
            .await
            .map_err(|e| sync_error(&PROJECT.id, "list", e))?;

        let resources = page
            .items
            .iter()
            .filter(|project| !project.id.is_empty())
            .map(project_resource)
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
            .with_display_name(format!("{} Project Member", resource.display_name))
            .with_description(format!("Membership in {} project", resource.display_name));
        Ok((vec![member], SyncOpResults::done()))
    }

    /// Looks for the project on the addressed page of the project collection.
    ///
    /// Paging continues only while the project has not been found.
    #[instrument(skip(self, resource, attrs), fields(project = %resource.id.resource))]
    async fn grants(
        &self,
        resource: &Resource,
        attrs: &SyncOpAttrs,
    ) -> SyncResult<(Vec<Grant>, SyncOpResults)> {
        let page = self
            .client
            .list_projects(attrs.page_token.cursor(), &attrs.cancel)
            .await
            .map_err(|e| sync_error(&PROJECT.id, "grants", e))?;

        match page.items.iter().find(|p| p.id == resource.id.resource) {
            Some(project) => {
                let grants = project_grants(&resource.id, project);
                debug!("Found project with {} members", grants.len());
                Ok((grants, SyncOpResults::done()))
            }
            None => Ok((
                Vec::new(),
                SyncOpResults::next(page.page_info.next_page_token()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PrincipalRef;

    fn principal(email: &str) -> PrincipalRef {
        PrincipalRef {
            id: format!("id-{email}"),
            email: email.into(),
        }
    }

    fn project() -> Project {
        Project {
            id: "p-1".into(),
            name: "Payments".into(),
            description: "Payment services".into(),
            project_owners: vec![principal("a@example.com"), principal("b@example.com")],
            security_champions: vec![principal("c@example.com")],
        }
    }

    #[test]
    fn test_two_owners_and_one_champion_yield_three_grants() {
        let id = ResourceId::new("project", "p-1");
        let grants = project_grants(&id, &project());
        assert_eq!(grants.len(), 3);
        let principals: Vec<_> = grants.iter().map(|g| g.principal.resource.as_str()).collect();
        assert_eq!(principals, vec!["a@example.com", "b@example.com", "c@example.com"]);
        assert!(grants.iter().all(|g| g.entitlement_id == "project:p-1:member"));
        assert_eq!(grants[0].id, "project:p-1:member:user:a@example.com");
    }

    #[test]
    fn test_email_less_and_duplicate_principals_are_dropped() {
        let mut p = project();
        p.project_owners.push(principal(""));
        p.security_champions.push(principal("a@example.com"));
        let grants = project_grants(&ResourceId::new("project", "p-1"), &p);
        assert_eq!(grants.len(), 3);
    }

    #[test]
    fn test_project_resource() {
        let resource = project_resource(&project()).unwrap();
        assert_eq!(resource.id, ResourceId::new("project", "p-1"));
        assert_eq!(resource.description.as_deref(), Some("Payment services"));
        assert_eq!(
            resource.traits.as_ref().map(ResourceTrait::kind),
            Some(TraitKind::Group)
        );
    }
}
