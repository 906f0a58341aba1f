//! Authentication integration tests.
//!
//! Tests verify:
//! - Registration issues a usable token and rejects duplicates
//! - Login failures are indistinguishable
//! - The auth gate rejects missing, malformed, forged and expired tokens
//! - Profile reads and partial updates

use axum::http::{Method, StatusCode};
use serde_json::json;

use super::test_utils::{empty_request, json_request, TestApp};

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn test_register_returns_token_that_verifies() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/auth/register",
            None,
            json!({"username": "alice", "email": "Alice@Example.com", "password": "wonderland"}),
        ))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("passwordHash").is_none());

    let token = body["token"].as_str().unwrap();
    let (status, body) = app
        .send(empty_request(Method::GET, "/api/auth/verify", Some(token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
}

#[tokio::test]
async fn test_register_duplicate_identity() {
    let app = TestApp::new().await;
    app.register("alice", "alice@example.com", "wonderland").await;

    // Same email, different case
    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/auth/register",
            None,
            json!({"username": "alice2", "email": "ALICE@example.com", "password": "wonderland"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "User already exists");

    // Same username
    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/auth/register",
            None,
            json!({"username": "alice", "email": "other@example.com", "password": "wonderland"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "User already exists");
}

#[tokio::test]
async fn test_register_validation() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/auth/register",
            None,
            json!({"username": "al", "email": "not-an-email", "password": "123"}),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let details = body["details"].as_object().unwrap();
    assert!(details.contains_key("username"));
    assert!(details.contains_key("email"));
    assert!(details.contains_key("password"));
}

#[tokio::test]
async fn test_register_malformed_json() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/auth/register",
            None,
            json!({"username": "alice"}),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn test_login_success_with_secret_alias() {
    let app = TestApp::new().await;
    let (_, user_id) = app.register("alice", "alice@example.com", "wonderland").await;

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            None,
            json!({"email": "alice@example.com", "secret": "wonderland"}),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user_id.as_str());
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::new().await;
    app.register("alice", "alice@example.com", "wonderland").await;

    let (wrong_status, wrong_body) = app
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            None,
            json!({"email": "alice@example.com", "password": "looking-glass"}),
        ))
        .await;

    let (unknown_status, unknown_body) = app
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            None,
            json!({"email": "nobody@example.com", "password": "wonderland"}),
        ))
        .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
    assert_eq!(wrong_body["message"], "Invalid email or password");
}

// =============================================================================
// Auth Gate
// =============================================================================

#[tokio::test]
async fn test_gate_rejects_missing_and_malformed_tokens() {
    let app = TestApp::new().await;
    let (token, _) = app.register("alice", "alice@example.com", "wonderland").await;

    let (status, body) = app
        .send(empty_request(Method::GET, "/api/auth/verify", None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Please authenticate");

    let (status, _) = app
        .send(empty_request(Method::GET, "/api/auth/verify", Some("garbage")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Token without the Bearer scheme
    let request = axum::http::Request::builder()
        .uri("/api/images/my-images")
        .header("Authorization", token.as_str())
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_gate_rejects_expired_token() {
    let app = TestApp::new().await;
    let (_, user_id) = app.register("alice", "alice@example.com", "wonderland").await;

    let expired = app
        .state
        .tokens
        .issue_with_ttl(&user_id, chrono::Duration::seconds(-5))
        .unwrap();

    let (status, body) = app
        .send(empty_request(Method::GET, "/api/auth/profile", Some(&expired)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Please authenticate");
}

#[tokio::test]
async fn test_gate_rejects_token_signed_with_other_key() {
    let app = TestApp::new().await;
    let (_, user_id) = app.register("alice", "alice@example.com", "wonderland").await;

    let forged = snapshelf::crypto::TokenService::new("some-other-key", chrono::Duration::days(1))
        .issue(&user_id)
        .unwrap();

    let (status, _) = app
        .send(empty_request(Method::GET, "/api/auth/verify", Some(&forged)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_gate_rejects_token_for_unknown_user() {
    let app = TestApp::new().await;

    let token = app.state.tokens.issue("no-such-user").unwrap();

    let (status, _) = app
        .send(empty_request(Method::GET, "/api/auth/verify", Some(&token)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Profile
// =============================================================================

#[tokio::test]
async fn test_get_profile() {
    let app = TestApp::new().await;
    let (token, user_id) = app.register("alice", "alice@example.com", "wonderland").await;

    let (status, body) = app
        .send(empty_request(Method::GET, "/api/auth/profile", Some(&token)))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user_id.as_str());
    assert_eq!(body["user"]["username"], "alice");
    assert!(body["user"]["bio"].is_null());
    assert!(body["user"]["profilePicture"].is_null());
}

#[tokio::test]
async fn test_update_profile_partial() {
    let app = TestApp::new().await;
    let (token, _) = app.register("alice", "alice@example.com", "wonderland").await;

    let (status, body) = app
        .send(json_request(
            Method::PATCH,
            "/api/auth/profile",
            Some(&token),
            json!({"bio": "Curious", "profilePicture": "/uploads/me.png"}),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["bio"], "Curious");
    assert_eq!(body["user"]["profilePicture"], "/uploads/me.png");
    assert_eq!(body["user"]["username"], "alice");

    // Clearing a field with null
    let (status, body) = app
        .send(json_request(
            Method::PATCH,
            "/api/auth/profile",
            Some(&token),
            json!({"bio": null}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["user"]["bio"].is_null());
    assert_eq!(body["user"]["profilePicture"], "/uploads/me.png");
}

#[tokio::test]
async fn test_update_profile_rejects_unknown_keys() {
    let app = TestApp::new().await;
    let (token, _) = app.register("alice", "alice@example.com", "wonderland").await;

    let (status, body) = app
        .send(json_request(
            Method::PATCH,
            "/api/auth/profile",
            Some(&token),
            json!({"bio": "hi", "isAdmin": true}),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid updates");

    // Nothing was applied
    let (_, body) = app
        .send(empty_request(Method::GET, "/api/auth/profile", Some(&token)))
        .await;
    assert!(body["user"]["bio"].is_null());
}

#[tokio::test]
async fn test_update_password_rehashes() {
    let app = TestApp::new().await;
    let (token, _) = app.register("alice", "alice@example.com", "wonderland").await;

    let (status, _) = app
        .send(json_request(
            Method::PATCH,
            "/api/auth/profile",
            Some(&token),
            json!({"password": "through-the-glass"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            None,
            json!({"email": "alice@example.com", "password": "wonderland"}),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            None,
            json!({"email": "alice@example.com", "password": "through-the-glass"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_profile_username_conflict() {
    let app = TestApp::new().await;
    app.register("alice", "alice@example.com", "wonderland").await;
    let (bob_token, _) = app.register("bob", "bob@example.com", "builder1").await;

    let (status, body) = app
        .send(json_request(
            Method::PATCH,
            "/api/auth/profile",
            Some(&bob_token),
            json!({"username": "alice"}),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "User already exists");
}
