//! Common test utilities for connector-wiz integration tests.

#![allow(dead_code)]

use access_sdk::prelude::*;
use connector_wiz::{RelationMode, RetryPolicy, WizConfig, WizConfigBuilder, WizConnector, WizCredentials};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

/// Test data factory for a principal returned by `users`.
pub fn user_node(id: &str, email: &str, role_id: &str, project_ids: &[&str]) -> Value {
    json!({
        "id": id,
        "name": format!("User {id}"),
        "email": email,
        "isSuspended": false,
        "effectiveRole": { "id": role_id, "name": format!("Role {role_id}") },
        "effectiveAssignedProjects": project_ids
            .iter()
            .map(|p| json!({ "id": p, "name": format!("Project {p}") }))
            .collect::<Vec<_>>()
    })
}

/// Test data factory for a principal returned by `userAccounts`.
pub fn user_account_node(id: &str, email: &str) -> Value {
    json!({ "id": id, "name": format!("Account {id}"), "email": email })
}

/// Test data factory for a role.
pub fn role_node(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "description": format!("{name} role"),
        "scopes": ["read:all"],
        "builtin": true,
        "isProjectScoped": false
    })
}

/// Test data factory for a project.
pub fn project_node(id: &str, owners: &[&str], champions: &[&str]) -> Value {
    let principals = |emails: &[&str]| {
        emails
            .iter()
            .enumerate()
            .map(|(i, e)| json!({ "id": format!("{id}-p{i}"), "email": e }))
            .collect::<Vec<_>>()
    };
    json!({
        "id": id,
        "name": format!("Project {id}"),
        "description": null,
        "projectOwners": principals(owners),
        "securityChampions": principals(champions)
    })
}

/// Test data factory for an issue.
pub fn issue_node(id: &str, external_id: &str) -> Value {
    json!({
        "id": id,
        "type": "TOXIC_COMBINATION",
        "severity": "HIGH",
        "status": "OPEN",
        "createdAt": "2024-05-01T12:00:00Z",
        "sourceRule": { "name": "Admin without MFA" },
        "entitySnapshot": {
            "id": format!("snap-{id}"),
            "externalId": external_id,
            "cloudPlatform": "AWS",
            "type": "USER_ACCOUNT",
            "name": "bob"
        }
    })
}

/// Wraps nodes in a `{ nodes, pageInfo }` connection.
pub fn nodes(items: Vec<Value>, end_cursor: Option<&str>) -> Value {
    json!({
        "nodes": items,
        "pageInfo": { "hasNextPage": end_cursor.is_some(), "endCursor": end_cursor }
    })
}

/// Wraps nodes in an `{ edges { node }, pageInfo }` connection.
pub fn edges(items: Vec<Value>, end_cursor: Option<&str>) -> Value {
    json!({
        "edges": items.into_iter().map(|node| json!({ "node": node })).collect::<Vec<_>>(),
        "pageInfo": { "hasNextPage": end_cursor.is_some(), "endCursor": end_cursor }
    })
}

/// A successful GraphQL response.
pub fn data(payload: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "data": payload }))
}

/// An HTTP 200 response carrying GraphQL errors.
pub fn graphql_errors(errors: &[(&str, Option<&str>)]) -> ResponseTemplate {
    let errors: Vec<Value> = errors
        .iter()
        .map(|(message, code)| match code {
            Some(code) => json!({ "message": message, "extensions": { "code": code } }),
            None => json!({ "message": message }),
        })
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({ "data": null, "errors": errors }))
}

/// Creates a mock OAuth token response.
pub fn token_response(access_token: &str, expires_in: u64) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": expires_in
    })
}

/// Mock Wiz API (token endpoint plus GraphQL endpoint).
pub struct MockWizServer {
    pub server: MockServer,
}

impl MockWizServer {
    /// Starts a server with a working token endpoint.
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(token_response("mock-access-token", 3600)),
            )
            .mount(&server)
            .await;
        Self { server }
    }

    /// Configuration pointing at this server with a fast retry policy.
    pub fn config(&self) -> WizConfigBuilder {
        WizConfig::builder()
            .api_url(format!("{}/graphql", self.server.uri()))
            .auth_endpoint(format!("{}/oauth/token", self.server.uri()))
            .retry(RetryPolicy::for_testing())
    }

    /// Connector with the given relation mode and otherwise default settings.
    pub fn connector(&self, mode: RelationMode) -> WizConnector {
        self.connector_with(self.config().relation_mode(mode))
    }

    pub fn connector_with(&self, config: WizConfigBuilder) -> WizConnector {
        WizConnector::new(
            config.build().expect("valid test config"),
            WizCredentials::new("test-client", "test-secret"),
        )
        .expect("connector")
    }

    /// Matches GraphQL requests for the named operation.
    pub fn operation(name: &str) -> MockBuilder {
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_partial_json(json!({ "operationName": name })))
    }

    /// Answers every request for `name` with `response`.
    pub async fn mock_operation(&self, name: &str, response: ResponseTemplate) {
        Self::operation(name)
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Number of GraphQL requests received for `name`.
    pub async fn request_count(&self, name: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == "/graphql")
            .filter(|r| {
                serde_json::from_slice::<Value>(&r.body)
                    .ok()
                    .and_then(|b| b["operationName"].as_str().map(|s| s == name))
                    .unwrap_or(false)
            })
            .count()
    }
}

/// Returns the syncer publishing `resource_type`.
pub fn syncer(connector: &WizConnector, resource_type: &str) -> Arc<dyn ResourceSyncer> {
    connector
        .resource_syncers()
        .into_iter()
        .find(|s| s.resource_type().id == resource_type)
        .expect("syncer registered")
}

/// Attributes addressing `token` with a fresh cancellation token.
pub fn page(token: &str) -> SyncOpAttrs {
    SyncOpAttrs::page(PageToken::new(token), Default::default())
}
