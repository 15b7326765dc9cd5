use std::sync::Arc;

use authsvc::{
    app::build_app,
    config::{AppConfig, JwtConfig},
    state::AppState,
    store::{CredentialStore, MemoryStore},
};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

fn test_config() -> AppConfig {
    AppConfig {
        database_url: None,
        jwt: JwtConfig {
            access_secret: "test-access-secret".into(),
            refresh_secret: "test-refresh-secret".into(),
            access_ttl_minutes: 5,
            refresh_ttl_days: 1,
        },
    }
}

fn test_app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::with_store(test_config(), store.clone() as Arc<dyn CredentialStore>);
    (build_app(state), store)
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register(app: &Router, email: &str, username: &str, password: &str) -> (StatusCode, Value) {
    request(
        app,
        "POST",
        "/api/v1/auth/register",
        Some(json!({ "email": email, "username": username, "password": password })),
        None,
    )
    .await
}

async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    request(
        app,
        "POST",
        "/api/v1/auth/login",
        Some(json!({ "email": email, "password": password })),
        None,
    )
    .await
}

#[tokio::test]
async fn health_reports_healthy() {
    let (app, _) = test_app();
    let (status, body) = request(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "healthy" }));
}

#[tokio::test]
async fn index_lists_endpoints() {
    let (app, _) = test_app();
    let (status, body) = request(&app, "GET", "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().is_some());
    assert_eq!(body["endpoints"]["login"], "/api/v1/auth/login");
}

#[tokio::test]
async fn register_login_me_change_password_end_to_end() {
    let (app, _) = test_app();

    let (status, user) = register(&app, "a@x.com", "u1", "pw123456").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["email"], "a@x.com");
    assert_eq!(user["username"], "u1");
    assert_eq!(user["is_active"], true);
    assert!(user["created_at"].as_str().is_some());
    assert!(user.get("password_hash").is_none());

    let (status, tokens) = login(&app, "a@x.com", "pw123456").await;
    assert_eq!(status, StatusCode::OK);
    let access = tokens["access_token"].as_str().unwrap().to_owned();
    let refresh = tokens["refresh_token"].as_str().unwrap().to_owned();
    assert!(!access.is_empty());
    assert!(!refresh.is_empty());
    assert_ne!(access, refresh);
    assert_eq!(tokens["token_type"], "bearer");

    let (status, me) = request(&app, "GET", "/api/v1/auth/me", None, Some(&access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "a@x.com");

    let (status, _) = request(&app, "GET", "/api/v1/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = request(
        &app,
        "POST",
        "/api/v1/auth/change-password",
        Some(json!({ "old_password": "wrong-old", "new_password": "newpw12345" })),
        Some(&access),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = request(
        &app,
        "POST",
        "/api/v1/auth/change-password",
        Some(json!({ "old_password": "pw123456", "new_password": "newpw12345" })),
        Some(&access),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Password changed successfully");

    let (status, _) = login(&app, "a@x.com", "pw123456").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = login(&app, "a@x.com", "newpw12345").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn duplicate_email_always_conflicts() {
    let (app, _) = test_app();
    let (status, _) = register(&app, "a@x.com", "u1", "pw123456").await;
    assert_eq!(status, StatusCode::CREATED);

    // Different username and password make no difference.
    let (status, body) = register(&app, "a@x.com", "someone-else", "otherpw99").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email already registered");
}

#[tokio::test]
async fn register_validates_input_shape() {
    let (app, _) = test_app();

    let (status, _) = register(&app, "not-an-email", "u1", "pw123456").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = register(&app, "a@x.com", "ab", "pw123456").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = register(&app, "a@x.com", "u1", "short").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn login_does_not_reveal_which_credential_failed() {
    let (app, _) = test_app();
    register(&app, "a@x.com", "u1", "pw123456").await;

    let (wrong_password_status, wrong_password_body) = login(&app, "a@x.com", "bad-password").await;
    let (unknown_email_status, unknown_email_body) = login(&app, "ghost@x.com", "pw123456").await;

    assert_eq!(wrong_password_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password_body, unknown_email_body);
}

#[tokio::test]
async fn refresh_issues_a_new_pair() {
    let (app, _) = test_app();
    register(&app, "a@x.com", "u1", "pw123456").await;
    let (_, tokens) = login(&app, "a@x.com", "pw123456").await;
    let refresh = tokens["refresh_token"].as_str().unwrap();

    let (status, new_tokens) = request(
        &app,
        "POST",
        "/api/v1/auth/refresh",
        Some(json!({ "refresh_token": refresh })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(new_tokens["access_token"].as_str().is_some());
    assert!(new_tokens["refresh_token"].as_str().is_some());

    // The fresh access token works against a protected endpoint.
    let access = new_tokens["access_token"].as_str().unwrap();
    let (status, me) = request(&app, "GET", "/api/v1/auth/me", None, Some(access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "a@x.com");
}

#[tokio::test]
async fn token_kinds_are_not_interchangeable() {
    let (app, _) = test_app();
    register(&app, "a@x.com", "u1", "pw123456").await;
    let (_, tokens) = login(&app, "a@x.com", "pw123456").await;
    let access = tokens["access_token"].as_str().unwrap();
    let refresh = tokens["refresh_token"].as_str().unwrap();

    // Refresh token presented as a bearer access token.
    let (status, _) = request(&app, "GET", "/api/v1/auth/me", None, Some(refresh)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Access token presented to the refresh endpoint.
    let (status, _) = request(
        &app,
        "POST",
        "/api/v1/auth/refresh",
        Some(json!({ "refresh_token": access })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_rejected_after_deactivation() {
    let (app, store) = test_app();
    let (_, user) = register(&app, "a@x.com", "u1", "pw123456").await;
    let user_id: Uuid = user["id"].as_str().unwrap().parse().unwrap();
    let (_, tokens) = login(&app, "a@x.com", "pw123456").await;
    let refresh = tokens["refresh_token"].as_str().unwrap();

    assert!(store.deactivate(user_id).await.unwrap());

    let (status, _) = request(
        &app,
        "POST",
        "/api/v1/auth/refresh",
        Some(json!({ "refresh_token": refresh })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_rejected_for_deactivated_account() {
    let (app, store) = test_app();
    let (_, user) = register(&app, "a@x.com", "u1", "pw123456").await;
    let user_id: Uuid = user["id"].as_str().unwrap().parse().unwrap();

    assert!(store.deactivate(user_id).await.unwrap());

    // Credentials are correct, so this is a disabled account, not bad creds.
    let (status, body) = login(&app, "a@x.com", "pw123456").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Account is deactivated");
}

#[tokio::test]
async fn password_change_keeps_live_access_tokens_valid() {
    let (app, _) = test_app();
    register(&app, "a@x.com", "u1", "pw123456").await;
    let (_, tokens) = login(&app, "a@x.com", "pw123456").await;
    let access = tokens["access_token"].as_str().unwrap();

    let (status, _) = request(
        &app,
        "POST",
        "/api/v1/auth/change-password",
        Some(json!({ "old_password": "pw123456", "new_password": "newpw12345" })),
        Some(access),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Current behavior: no revocation state, so the pre-change token still
    // authenticates until it expires.
    let (status, me) = request(&app, "GET", "/api/v1/auth/me", None, Some(access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "a@x.com");
}

#[tokio::test]
async fn logout_requires_a_token_and_changes_nothing() {
    let (app, _) = test_app();
    register(&app, "a@x.com", "u1", "pw123456").await;
    let (_, tokens) = login(&app, "a@x.com", "pw123456").await;
    let access = tokens["access_token"].as_str().unwrap();

    let (status, _) = request(&app, "POST", "/api/v1/auth/logout", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = request(&app, "POST", "/api/v1/auth/logout", None, Some(access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged out successfully");

    // Purely client-side: the token keeps working afterwards.
    let (status, _) = request(&app, "GET", "/api/v1/auth/me", None, Some(access)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn me_rejects_malformed_bearer_tokens() {
    let (app, _) = test_app();

    let (status, _) = request(&app, "GET", "/api/v1/auth/me", None, Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Token signed with a different secret.
    let other = authsvc::auth::jwt::JwtKeys::new(
        "some-other-secret",
        "another-secret",
        std::time::Duration::from_secs(300),
        std::time::Duration::from_secs(3600),
    );
    let forged = other.sign_access(Uuid::new_v4(), "a@x.com").unwrap();
    let (status, _) = request(&app, "GET", "/api/v1/auth/me", None, Some(&forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_reports_user_gone_after_record_disappears() {
    let (app, _) = test_app();
    register(&app, "a@x.com", "u1", "pw123456").await;
    let (_, tokens) = login(&app, "a@x.com", "pw123456").await;
    let access = tokens["access_token"].as_str().unwrap();

    // A second app over a fresh store: token verifies, record is absent.
    let (empty_app, _) = test_app();
    let (status, body) = request(&empty_app, "GET", "/api/v1/auth/me", None, Some(access)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User not found");
}
