use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;
use warehouse_sdk::{ApiError, ListQueriesRequest, WarehouseClient};

fn client(server: &MockServer) -> WarehouseClient {
    WarehouseClient::new(&server.base_url(), "test-token", Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_list_queries_sends_filter_and_bearer_token() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/2.0/sql/history/queries")
                .header("authorization", "Bearer test-token")
                .json_body(json!({
                    "filter_by": { "warehouse_ids": ["wh1"] },
                    "max_results": 25
                }));
            then.status(200).json_body(json!({
                "res": [{
                    "query_id": "q1",
                    "user_id": 1,
                    "user_name": "alice",
                    "status": "FINISHED",
                    "query_text": "SELECT 1",
                    "query_start_time_ms": 1700000000000_i64,
                    "query_end_time_ms": 1700000005000_i64,
                    "duration": 5000
                }],
                "has_next_page": true,
                "next_page_token": "T1"
            }));
        })
        .await;

    let page = client(&server)
        .list_queries(&ListQueriesRequest::first_page(vec!["wh1".into()], 25))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(page.res.len(), 1);
    assert_eq!(page.res[0].user_name.as_deref(), Some("alice"));
    assert_eq!(page.res[0].duration, Some(5000));
    assert!(page.has_next_page);
    assert_eq!(page.next_page_token.as_deref(), Some("T1"));
}

#[tokio::test]
async fn test_list_queries_next_page_sends_token_only() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/2.0/sql/history/queries")
                .json_body(json!({ "max_results": 25, "page_token": "T1" }));
            then.status(200).json_body(json!({ "has_next_page": false }));
        })
        .await;

    let page = client(&server)
        .list_queries(&ListQueriesRequest::next_page("T1", 25))
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(page.res.is_empty());
    assert!(!page.has_next_page);
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/2.0/sql/history/queries");
            then.status(401).body("Invalid access token");
        })
        .await;

    let err = client(&server)
        .list_queries(&ListQueriesRequest::first_page(vec!["wh1".into()], 25))
        .await
        .unwrap_err();

    match err {
        ApiError::Unauthorized { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "Invalid access token");
        }
        other => panic!("expected Unauthorized, got {:?}", other),
    }
}

#[tokio::test]
async fn test_forbidden_maps_to_auth_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/2.0/sql/warehouses/wh1");
            then.status(403).body("no access");
        })
        .await;

    let err = client(&server).get_warehouse("wh1").await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized { status: 403, .. }));
}

#[tokio::test]
async fn test_server_error_keeps_status_and_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/2.0/sql/history/queries");
            then.status(503).body("temporarily unavailable");
        })
        .await;

    let err = client(&server)
        .list_queries(&ListQueriesRequest::first_page(vec!["wh1".into()], 25))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert!(err.is_retryable());
    assert_eq!(err.to_string(), "HTTP 503: temporarily unavailable");
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/2.0/sql/history/queries");
            then.status(200).body(r#"{"res": "not-a-list"}"#);
        })
        .await;

    let err = client(&server)
        .list_queries(&ListQueriesRequest::first_page(vec!["wh1".into()], 25))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Decode { .. }));
}

#[tokio::test]
async fn test_get_warehouse() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/2.0/sql/warehouses/5badc23414")
                .header("authorization", "Bearer test-token");
            then.status(200).json_body(json!({
                "id": "5badc23414",
                "name": "Analytics",
                "cluster_size": "Medium",
                "min_num_clusters": 1,
                "max_num_clusters": 3,
                "auto_stop_mins": 10,
                "state": "RUNNING",
                "enable_serverless_compute": true
            }));
        })
        .await;

    let info = client(&server).get_warehouse("5badc23414").await.unwrap();

    mock.assert_async().await;
    assert_eq!(info.id, "5badc23414");
    assert_eq!(info.cluster_size.as_deref(), Some("Medium"));
    assert_eq!(info.max_num_clusters, Some(3));
    assert_eq!(info.enable_serverless_compute, Some(true));
}
