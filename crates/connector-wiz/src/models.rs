//! Wiz GraphQL schema types and page-shape normalization.
//!
//! Wiz collections come back in three shapes depending on the query:
//! relay-style `edges { node }`, `nodes` with a sibling `pageInfo`, or a bare
//! array with no paging at all. [`Connection`] accepts any of them and
//! [`Connection::into_page`] flattens them into one [`Page`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Relay pagination block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub end_cursor: String,
}

impl PageInfo {
    /// Page info of a collection that fits in a single page.
    #[must_use]
    pub fn complete() -> Self {
        Self::default()
    }

    /// Token addressing the next page, empty when there is none.
    #[must_use]
    pub fn next_page_token(&self) -> String {
        if self.has_next_page {
            self.end_cursor.clone()
        } else {
            String::new()
        }
    }
}

/// Relay edge wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct Edge<T> {
    pub node: T,
}

/// Any of the collection shapes the API returns.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Connection<T> {
    Edges {
        edges: Vec<Edge<T>>,
        #[serde(default, rename = "pageInfo")]
        page_info: PageInfo,
    },
    Nodes {
        nodes: Vec<T>,
        #[serde(default, rename = "pageInfo")]
        page_info: PageInfo,
    },
    Flat(Vec<T>),
}

/// One normalized page of records.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_info: PageInfo,
}

impl<T> Connection<T> {
    /// Normalizes the shape into a page.
    ///
    /// A flat array is a complete, single page.
    pub fn into_page(self) -> Page<T> {
        match self {
            Connection::Edges { edges, page_info } => Page {
                items: edges.into_iter().map(|e| e.node).collect(),
                page_info,
            },
            Connection::Nodes { nodes, page_info } => Page {
                items: nodes,
                page_info,
            },
            Connection::Flat(items) => Page {
                items,
                page_info: PageInfo::complete(),
            },
        }
    }
}

/// Reference to a user's effective role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserRoleRef {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// Reference to a project assigned to a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProjectRef {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// A Wiz principal.
///
/// `effective_role` and `effective_assigned_projects` are only populated by
/// the `users` query; `userAccounts` never returns them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default)]
    pub is_suspended: Option<bool>,
    #[serde(default)]
    pub effective_role: Option<UserRoleRef>,
    #[serde(default)]
    pub effective_assigned_projects: Option<Vec<ProjectRef>>,
}

/// A Wiz role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRole {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub builtin: bool,
    #[serde(default)]
    pub is_project_scoped: bool,
}

/// Principal reference inside a project (owner or security champion).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PrincipalRef {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
}

/// A Wiz project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub project_owners: Vec<PrincipalRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub security_champions: Vec<PrincipalRef>,
}

/// Rule that raised an issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SourceRule {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// Snapshot of the cloud resource an issue affects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySnapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub external_id: String,
    #[serde(default)]
    pub cloud_platform: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "null_as_default")]
    pub entity_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// A Wiz security issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, rename = "type", deserialize_with = "null_as_default")]
    pub issue_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub severity: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source_rule: SourceRule,
    #[serde(default, deserialize_with = "null_as_default")]
    pub entity_snapshot: EntitySnapshot,
}

/// GraphQL response envelope.
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

/// One entry of the GraphQL `errors` array.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub path: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub extensions: Option<GraphQlErrorExtensions>,
}

/// Error extensions carrying a machine readable code.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlErrorExtensions {
    #[serde(default)]
    pub code: Option<String>,
}

impl GraphQlError {
    /// Message prefixed with the failing path, when present.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.path {
            Some(path) if !path.is_empty() => {
                let joined = path
                    .iter()
                    .map(|p| match p {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(".");
                format!("{joined}: {}", self.message)
            }
            _ => self.message.clone(),
        }
    }
}

/// Treats an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
