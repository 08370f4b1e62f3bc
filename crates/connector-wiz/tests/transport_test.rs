//! Transport behavior: retries, error envelopes, cancellation and tokens.

mod common;

use access_sdk::prelude::*;
use common::*;
use connector_wiz::RelationMode;
use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_rate_limit_exhausts_after_five_attempts() {
    let mock = MockWizServer::start().await;
    MockWizServer::operation("ListUserRoles")
        .respond_with(ResponseTemplate::new(429))
        .expect(5)
        .mount(&mock.server)
        .await;

    let connector = mock.connector(RelationMode::Enabled);
    let err = syncer(&connector, "role")
        .list(None, &SyncOpAttrs::first_page())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Upstream { .. }));
    assert!(
        err.to_string().contains("giving up after 5 attempts"),
        "{err}"
    );
    mock.server.verify().await;
}

#[tokio::test]
async fn test_rate_limit_then_success() {
    let mock = MockWizServer::start().await;
    MockWizServer::operation("ListUserRoles")
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&mock.server)
        .await;
    mock.mock_operation(
        "ListUserRoles",
        data(json!({ "userRolesV2": [role_node("r1", "GlobalAdmin")] })),
    )
    .await;

    let connector = mock.connector(RelationMode::Enabled);
    let (roles, _) = syncer(&connector, "role")
        .list(None, &SyncOpAttrs::first_page())
        .await
        .unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(mock.request_count("ListUserRoles").await, 3);
}

#[tokio::test]
async fn test_graphql_errors_are_not_retried() {
    let mock = MockWizServer::start().await;
    MockWizServer::operation("ListUserRoles")
        .respond_with(graphql_errors(&[
            ("first failure", None),
            ("second failure", Some("INTERNAL")),
        ]))
        .expect(1)
        .mount(&mock.server)
        .await;

    let connector = mock.connector(RelationMode::Enabled);
    let err = syncer(&connector, "role")
        .list(None, &SyncOpAttrs::first_page())
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("first failure"), "{message}");
    assert!(message.contains("second failure"), "{message}");
    mock.server.verify().await;
}

#[tokio::test]
async fn test_server_error_fails_without_retry() {
    let mock = MockWizServer::start().await;
    MockWizServer::operation("ListProjects")
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&mock.server)
        .await;

    let connector = mock.connector(RelationMode::Enabled);
    let err = syncer(&connector, "project")
        .list(None, &SyncOpAttrs::first_page())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unexpected status code 500"), "{err}");
    assert!(err.to_string().contains("upstream exploded"), "{err}");
    mock.server.verify().await;
}

#[tokio::test]
async fn test_missing_data_is_a_decode_error() {
    let mock = MockWizServer::start().await;
    mock.mock_operation("ListUserRoles", ResponseTemplate::new(200).set_body_json(json!({})))
        .await;

    let connector = mock.connector(RelationMode::Enabled);
    let err = syncer(&connector, "role")
        .list(None, &SyncOpAttrs::first_page())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no data"), "{err}");
}

#[tokio::test]
async fn test_cancelled_before_send() {
    let mock = MockWizServer::start().await;
    MockWizServer::operation("ListUserRoles")
        .respond_with(data(json!({ "userRolesV2": [] })))
        .expect(0)
        .mount(&mock.server)
        .await;

    let connector = mock.connector(RelationMode::Enabled);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = syncer(&connector, "role")
        .list(None, &SyncOpAttrs::page(PageToken::first(), cancel))
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_cancel_aborts_in_flight_request() {
    let mock = MockWizServer::start().await;
    mock.mock_operation(
        "ListUserRoles",
        data(json!({ "userRolesV2": [] })).set_delay(Duration::from_secs(30)),
    )
    .await;

    let connector = mock.connector(RelationMode::Enabled);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        syncer(&connector, "role").list(None, &SyncOpAttrs::page(PageToken::first(), cancel)),
    )
    .await
    .expect("cancellation should abort the request");
    assert!(result.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn test_cancel_aborts_backoff() {
    let mock = MockWizServer::start().await;
    mock.mock_operation("ListUserRoles", ResponseTemplate::new(429))
        .await;

    let config = mock.config().relation_mode(RelationMode::Enabled).retry(
        connector_wiz::RetryPolicy {
            base_delay: Duration::from_secs(20),
            max_delay: Duration::from_secs(20),
            ..connector_wiz::RetryPolicy::default()
        },
    );
    let connector = mock.connector_with(config);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        syncer(&connector, "role").list(None, &SyncOpAttrs::page(PageToken::first(), cancel)),
    )
    .await
    .expect("cancellation should abort the backoff sleep");
    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(mock.request_count("ListUserRoles").await, 1);
}

/// Answers one request with an error status whose body never finishes.
async fn stalled_error_body_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }
        socket
            .write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 1024\r\n\r\npartial")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        drop(socket);
    });
    format!("http://{addr}/graphql")
}

#[tokio::test]
async fn test_cancel_aborts_error_body_read() {
    let mock = MockWizServer::start().await;
    let api_url = stalled_error_body_server().await;
    let connector = mock.connector_with(
        mock.config()
            .api_url(api_url)
            .relation_mode(RelationMode::Enabled),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        syncer(&connector, "role").list(None, &SyncOpAttrs::page(PageToken::first(), cancel)),
    )
    .await
    .expect("cancellation should abort reading the error body");
    assert!(result.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn test_bearer_token_is_cached_across_calls() {
    let mock = wiremock::MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response("tok-1", 3600)))
        .expect(1)
        .mount(&mock)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(wiremock::matchers::header("Authorization", "Bearer tok-1"))
        .respond_with(data(json!({ "userRolesV2": [] })))
        .expect(2)
        .mount(&mock)
        .await;

    let server = MockWizServer { server: mock };
    let connector = server.connector(RelationMode::Enabled);
    let roles = syncer(&connector, "role");
    roles.list(None, &SyncOpAttrs::first_page()).await.unwrap();
    roles.list(None, &SyncOpAttrs::first_page()).await.unwrap();
    server.server.verify().await;
}

#[tokio::test]
async fn test_unauthorized_refreshes_token_on_next_call() {
    let mock = wiremock::MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response("tok", 3600)))
        .expect(2)
        .mount(&mock)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(data(json!({ "userRolesV2": [] })))
        .mount(&mock)
        .await;

    let server = MockWizServer { server: mock };
    let connector = server.connector(RelationMode::Enabled);
    let roles = syncer(&connector, "role");
    let err = roles
        .list(None, &SyncOpAttrs::first_page())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("401"), "{err}");
    roles.list(None, &SyncOpAttrs::first_page()).await.unwrap();
    server.server.verify().await;
}

#[tokio::test]
async fn test_token_endpoint_failure_is_not_retried() {
    let mock = wiremock::MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
        .expect(1)
        .mount(&mock)
        .await;

    let server = MockWizServer { server: mock };
    let connector = server.connector(RelationMode::Enabled);
    let err = connector
        .validate(&SyncOpAttrs::first_page())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Authentication error"), "{err}");
    server.server.verify().await;
}
