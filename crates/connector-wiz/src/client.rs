//! Typed Wiz queries on top of the GraphQL transport.

use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::config::{RelationMode, WizConfig, WizCredentials};
use crate::graphql::GraphQlClient;
use crate::models::{Connection, Issue, Page, Project, User, UserRole};
use crate::{TokenCache, WizError, WizResult};

const PROBE_USER_RELATIONS: &str = r"query ProbeUserRelations {
  users(first: 1) {
    nodes { id effectiveRole { id name } effectiveAssignedProjects { id name } }
  }
}";

const LIST_USERS: &str = r"query ListUsers($first: Int, $after: String) {
  users(first: $first, after: $after) {
    nodes {
      id
      name
      email
      isSuspended
      effectiveRole { id name }
      effectiveAssignedProjects { id name }
    }
    pageInfo { hasNextPage endCursor }
  }
}";

const LIST_USER_ACCOUNTS: &str = r"query ListUserAccounts($first: Int, $after: String) {
  userAccounts(first: $first, after: $after) {
    nodes { id name email }
    pageInfo { hasNextPage endCursor }
    totalCount
  }
}";

const LIST_USER_ROLES: &str = r"query ListUserRoles {
  userRolesV2 { id name description scopes builtin isProjectScoped }
}";

/// Follow-up pages of a role collection that answered in the cursor shape.
const LIST_USER_ROLES_PAGE: &str = r"query ListUserRoles($first: Int, $after: String) {
  userRolesV2(first: $first, after: $after) {
    nodes { id name description scopes builtin isProjectScoped }
    pageInfo { hasNextPage endCursor }
  }
}";

const LIST_PROJECTS: &str = r"query ListProjects($first: Int, $after: String) {
  projects(first: $first, after: $after) {
    edges {
      node {
        id
        name
        description
        projectOwners { id email }
        securityChampions { id email }
      }
    }
    pageInfo { hasNextPage endCursor }
  }
}";

const LIST_ISSUES: &str = r"query ListIssues($first: Int, $after: String, $filterBy: IssueFilters) {
  issues(first: $first, after: $after, filterBy: $filterBy) {
    edges {
      node {
        id
        type
        severity
        status
        createdAt
        sourceRule { name }
        entitySnapshot { id externalId cloudPlatform type name }
      }
    }
    pageInfo { hasNextPage endCursor }
  }
}";

/// Whether the credentials can read the principal-to-role/project relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRelations {
    /// Principals come from `users` with role and project assignments.
    Available,
    /// Principals come from `userAccounts`; assignments are unknown.
    Unavailable,
}

#[derive(Debug, Deserialize)]
struct UsersData {
    users: Connection<User>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserAccountsData {
    user_accounts: Connection<User>,
}

#[derive(Debug, Deserialize)]
struct UserRolesData {
    #[serde(rename = "userRolesV2")]
    user_roles: Connection<UserRole>,
}

#[derive(Debug, Deserialize)]
struct ProjectsData {
    projects: Connection<Project>,
}

#[derive(Debug, Deserialize)]
struct IssuesData {
    issues: Connection<Issue>,
}

/// Wiz API client shared by every syncer.
#[derive(Debug)]
pub struct WizClient {
    graphql: GraphQlClient,
    page_size: u32,
    relation_mode: RelationMode,
    relations: OnceCell<UserRelations>,
}

impl WizClient {
    /// Creates a client from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &WizConfig, credentials: WizCredentials) -> WizResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| WizError::Config(format!("Failed to create HTTP client: {e}")))?;

        let token_cache = Arc::new(TokenCache::new(
            credentials,
            config.auth_endpoint.clone(),
            config.audience.clone(),
            http_client.clone(),
        ));

        let graphql = GraphQlClient::new(
            http_client,
            config.api_url.clone(),
            token_cache,
            config.retry.clone(),
        );

        Ok(Self {
            graphql,
            page_size: config.page_size,
            relation_mode: config.relation_mode,
            relations: OnceCell::new(),
        })
    }

    /// Resolves whether principal relations are readable.
    ///
    /// In [`RelationMode::Auto`] the first call probes the API and the outcome
    /// is cached for the lifetime of the client. A probe failing for reasons
    /// other than authorization is returned and retried on the next call.
    pub async fn user_relations(&self, cancel: &CancellationToken) -> WizResult<UserRelations> {
        match self.relation_mode {
            RelationMode::Enabled => Ok(UserRelations::Available),
            RelationMode::Disabled => Ok(UserRelations::Unavailable),
            RelationMode::Auto => self
                .relations
                .get_or_try_init(|| self.probe_user_relations(cancel))
                .await
                .copied(),
        }
    }

    async fn probe_user_relations(&self, cancel: &CancellationToken) -> WizResult<UserRelations> {
        let probe = self
            .graphql
            .execute::<UsersData>("ProbeUserRelations", PROBE_USER_RELATIONS, json!({}), cancel)
            .await;

        match probe {
            Ok(_) => {
                info!("User role and project relations are readable");
                Ok(UserRelations::Available)
            }
            Err(e) if e.is_permission_denied() => {
                info!(error = %e, "User relations not readable, falling back to user accounts");
                Ok(UserRelations::Unavailable)
            }
            Err(e) => Err(e),
        }
    }

    /// Lists one page of principals through whichever collection the
    /// relation capability allows.
    #[instrument(skip(self, cancel))]
    pub async fn list_principals(
        &self,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> WizResult<(Page<User>, UserRelations)> {
        let relations = self.user_relations(cancel).await?;
        let page = match relations {
            UserRelations::Available => self.list_users(cursor, cancel).await?,
            UserRelations::Unavailable => self.list_user_accounts(cursor, cancel).await?,
        };
        Ok((page, relations))
    }

    /// Lists one page of the `users` collection, relations included.
    #[instrument(skip(self, cancel))]
    pub async fn list_users(
        &self,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> WizResult<Page<User>> {
        let data: UsersData = self
            .graphql
            .execute("ListUsers", LIST_USERS, self.page_variables(cursor), cancel)
            .await?;
        let page = data.users.into_page();
        debug!("Fetched {} users", page.items.len());
        Ok(page)
    }

    /// Lists one page of the `userAccounts` collection.
    #[instrument(skip(self, cancel))]
    pub async fn list_user_accounts(
        &self,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> WizResult<Page<User>> {
        let data: UserAccountsData = self
            .graphql
            .execute(
                "ListUserAccounts",
                LIST_USER_ACCOUNTS,
                self.page_variables(cursor),
                cancel,
            )
            .await?;
        let page = data.user_accounts.into_page();
        debug!("Fetched {} user accounts", page.items.len());
        Ok(page)
    }

    /// Lists the role collection, or the page after `cursor`.
    ///
    /// The first request asks for the flat list. A cursor only exists when
    /// the collection came back paginated, so it is resumed with the paged
    /// form of the query.
    #[instrument(skip(self, cancel))]
    pub async fn list_roles(
        &self,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> WizResult<Page<UserRole>> {
        let (query, variables) = match cursor {
            None => (LIST_USER_ROLES, json!({})),
            Some(_) => (LIST_USER_ROLES_PAGE, self.page_variables(cursor)),
        };
        let data: UserRolesData = self
            .graphql
            .execute("ListUserRoles", query, variables, cancel)
            .await?;
        let page = data.user_roles.into_page();
        debug!("Fetched {} roles", page.items.len());
        Ok(page)
    }

    /// Lists one page of projects with owners and security champions.
    #[instrument(skip(self, cancel))]
    pub async fn list_projects(
        &self,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> WizResult<Page<Project>> {
        let data: ProjectsData = self
            .graphql
            .execute("ListProjects", LIST_PROJECTS, self.page_variables(cursor), cancel)
            .await?;
        let page = data.projects.into_page();
        debug!("Fetched {} projects", page.items.len());
        Ok(page)
    }

    /// Lists one page of open identity-related issues.
    #[instrument(skip(self, cancel))]
    pub async fn list_issues(
        &self,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> WizResult<Page<Issue>> {
        let mut variables = self.page_variables(cursor);
        variables["filterBy"] = json!({
            "status": ["OPEN", "IN_PROGRESS"],
            "relatedEntity": { "type": ["USER_ACCOUNT", "SERVICE_ACCOUNT"] }
        });
        let data: IssuesData = self
            .graphql
            .execute("ListIssues", LIST_ISSUES, variables, cancel)
            .await?;
        let page = data.issues.into_page();
        debug!("Fetched {} issues", page.items.len());
        Ok(page)
    }

    fn page_variables(&self, cursor: Option<&str>) -> serde_json::Value {
        json!({ "first": self.page_size, "after": cursor })
    }
}
