mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn test_profile_round_trip() {
    let app = TestApp::spawn().await;
    let token = app.signed_in_user("ada@example.com").await;

    let profile = app.get("/user/profile", Some(&token)).await;
    assert_eq!(profile.status, StatusCode::OK);
    assert_eq!(profile.json()["email"], "ada@example.com");
    assert_eq!(profile.json()["name"], "Test User");

    let updated = app
        .put_json(
            "/user/profile",
            Some(&token),
            json!({ "name": "Ada Lovelace", "phone": "+44 20 7946 0000" }),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK, "{}", updated.text);
    assert_eq!(updated.json()["name"], "Ada Lovelace");

    let profile = app.get("/user/profile", Some(&token)).await.json();
    assert_eq!(profile["phone"], "+44 20 7946 0000");
    assert!(profile.get("password_hash").is_none());
}

#[tokio::test]
async fn test_profile_update_validates_fields() {
    let app = TestApp::spawn().await;
    let token = app.signed_in_user("ada@example.com").await;

    let response = app
        .put_json("/user/profile", Some(&token), json!({ "avatar": "not a url" }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_userinfo_with_session_token_sees_everything() {
    let app = TestApp::spawn().await;
    let token = app.signed_in_user("ada@example.com").await;
    app.put_json(
        "/user/profile",
        Some(&token),
        json!({ "phone": "555-0100", "address": "1 Main St" }),
    )
    .await;

    let info = app.get("/user/userinfo", Some(&token)).await.json();
    assert_eq!(info["email"], "ada@example.com");
    assert_eq!(info["name"], "Test User");
    assert_eq!(info["phone"], "555-0100");
    assert_eq!(info["address"], "1 Main St");
}

#[tokio::test]
async fn test_authorization_history_hides_codes() {
    let app = TestApp::spawn().await;
    let token = app.signed_in_user("ada@example.com").await;
    let client = app.register_app(&token, &["openid", "email"]).await;

    let code = app.authorize(&token, &client.client_id, "email").await;
    app.exchange(&code, &client).await;

    let history = app.get("/user/authorizations", Some(&token)).await;
    assert_eq!(history.status, StatusCode::OK);
    let entries = history.json();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["client_id"], client.client_id.as_str());
    assert_eq!(entries[0]["scope"], "email");
    assert_eq!(entries[0]["used"], true);
    assert!(entries[0].get("code").is_none());
    assert!(!history.text.contains(&code));
}

#[tokio::test]
async fn test_history_is_per_user() {
    let app = TestApp::spawn().await;
    let ada = app.signed_in_user("ada@example.com").await;
    let bob = app.signed_in_user("bob@example.com").await;
    let client = app.register_app(&ada, &["openid"]).await;

    app.authorize(&ada, &client.client_id, "openid").await;

    let bob_history = app.get("/user/authorizations", Some(&bob)).await.json();
    assert!(bob_history.as_array().unwrap().is_empty());

    let revoke = app
        .post_json(
            &format!("/user/revoke/{}", client.client_id),
            Some(&bob),
            json!({}),
        )
        .await;
    assert_eq!(revoke.status, StatusCode::OK);
    assert_eq!(revoke.json()["sessions_removed"], 0);

    let ada_history = app.get("/user/authorizations", Some(&ada)).await.json();
    assert_eq!(ada_history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_null_clears_profile_field() {
    let app = TestApp::spawn().await;
    let token = app.signed_in_user("ada@example.com").await;

    let set = app
        .put_json("/user/profile", Some(&token), json!({ "phone": "+1 555" }))
        .await;
    assert_eq!(set.json()["phone"], "+1 555");

    let cleared = app
        .put_json("/user/profile", Some(&token), json!({ "phone": null }))
        .await;
    assert_eq!(cleared.status, StatusCode::OK, "{}", cleared.text);
    assert!(cleared.json()["phone"].is_null());
    assert_eq!(cleared.json()["name"], "Test User");

    let profile = app.get("/user/profile", Some(&token)).await.json();
    assert!(profile["phone"].is_null());
    assert_eq!(profile["name"], "Test User");
}
