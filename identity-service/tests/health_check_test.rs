mod common;

use axum::http::StatusCode;
use common::TestApp;

#[tokio::test]
async fn test_health_reports_store() {
    let app = TestApp::spawn().await;

    let response = app.get("/health", None).await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "up");
    assert_eq!(body["service"], "identity-service-test");
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let app = TestApp::spawn().await;

    let response = app.get("/health", None).await;

    assert_eq!(response.headers["x-content-type-options"], "nosniff");
    assert_eq!(response.headers["x-frame-options"], "DENY");
    assert_eq!(response.headers["cache-control"], "no-store");
    assert!(response.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_scope_catalog_is_public() {
    let app = TestApp::spawn().await;

    let response = app.get("/scopes", None).await;

    assert_eq!(response.status, StatusCode::OK);
    let ids: Vec<String> = response
        .json()
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap().to_string())
        .collect();
    for expected in ["openid", "profile", "email", "phone", "address"] {
        assert!(ids.iter().any(|id| id == expected), "missing {}", expected);
    }
}

#[tokio::test]
async fn test_openapi_document_lists_oauth_paths() {
    let app = TestApp::spawn().await;

    let response = app.get("/.well-known/openapi.json", None).await;

    assert_eq!(response.status, StatusCode::OK);
    let paths = &response.json()["paths"];
    assert!(paths.get("/oauth/authorize").is_some());
    assert!(paths.get("/oauth/token").is_some());
    assert!(paths.get("/developer/apps/{client_id}").is_some());
}

#[tokio::test]
async fn test_metrics_unavailable_without_recorder() {
    let app = TestApp::spawn().await;

    let response = app.get("/metrics", None).await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_stats_counts_users_apps_and_sessions() {
    let app = TestApp::spawn().await;
    let token = app.signed_in_user("ada@example.com").await;
    let client = app.register_app(&token, &["openid"]).await;
    app.authorize(&token, &client.client_id, "openid").await;

    let response = app.get("/stats", Some(&token)).await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["users"], 1);
    assert_eq!(body["apps"], 1);
    assert_eq!(body["authorizations"], 1);
    assert_eq!(body["geo"][0]["ip"], "unknown");

    let limited = app.get("/stats/events?limit=2", Some(&token)).await;
    assert_eq!(limited.json().as_array().unwrap().len(), 2);

    let anonymous = app.get("/stats", None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}
