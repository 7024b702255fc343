//! Router-level tests for the Turnstile API

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::AUTHORIZATION},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;
use turnstile_api::{AppState, create_router};
use turnstile_auth::{
    Authenticator, INVALID_CREDENTIALS_MESSAGE, IdentityRepository, InMemoryBlacklist,
    NewAccount, PasswordConfig, PasswordHasher, TokenService, TokenUsePolicy,
};
use turnstile_db::{Database, Role};

const ADMIN_PASSWORD: &str = "adminsecret";

struct TestApp {
    router: Router,
    state: AppState,
}

async fn test_app(token_uses: TokenUsePolicy) -> TestApp {
    let db = Database::in_memory().await.unwrap();
    let hasher = PasswordHasher::new(&PasswordConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap();
    let identities = IdentityRepository::new(db, hasher).unwrap();
    identities
        .signup(NewAccount {
            username: "admin".to_string(),
            password: ADMIN_PASSWORD.to_string(),
            email: None,
            role: Role::Admin,
        })
        .await
        .unwrap();

    let tokens = Arc::new(TokenService::new("test-secret", Some(Duration::hours(1))));
    let authenticator = Authenticator::new(
        identities,
        tokens,
        Arc::new(InMemoryBlacklist::new()),
        token_uses,
    );
    let state = AppState::new(Arc::new(authenticator));

    TestApp {
        router: create_router(state.clone(), None),
        state,
    }
}

fn basic(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    authorization: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(authorization) = authorization {
        builder = builder.header(AUTHORIZATION, authorization);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn signup(app: &TestApp, username: &str, password: &str) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/auth/signup",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn test_health() {
    let app = test_app(TokenUsePolicy::Multi).await;
    let (status, body) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, "GET", "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    app.state.identities().database().pool().close().await;
    let (status, body) = send(&app, "GET", "/healthz", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unavailable");
}

#[tokio::test]
async fn test_signup_signin_and_me() {
    let app = test_app(TokenUsePolicy::Multi).await;

    let created = signup(&app, "john", "mysecret").await;
    assert_eq!(created["identity"]["username"], "john");
    assert_eq!(created["identity"]["role"], "user");
    assert!(created["identity"].get("password_hash").is_none());
    let signup_token = created["token"].as_str().unwrap();
    assert!(app.state.tokens().verify(signup_token).is_ok());

    let (status, signed_in) = send(
        &app,
        "POST",
        "/api/v1/auth/signin",
        Some(&basic("john", "mysecret")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(signed_in["identity"]["id"], created["identity"]["id"]);

    let token = signed_in["token"].as_str().unwrap();
    let (status, me) = send(&app, "GET", "/api/v1/auth/me", Some(&bearer(token)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "john");
}

#[tokio::test]
async fn test_signup_stores_hash_not_plaintext() {
    let app = test_app(TokenUsePolicy::Multi).await;
    signup(&app, "john", "mysecret").await;

    let stored = app
        .state
        .identities()
        .find_by_username("john")
        .await
        .unwrap()
        .unwrap();
    assert_ne!(stored.password_hash, "mysecret");
}

#[tokio::test]
async fn test_duplicate_signup_conflicts() {
    let app = test_app(TokenUsePolicy::Multi).await;
    signup(&app, "john", "mysecret").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/signup",
        None,
        Some(json!({ "username": "john", "password": "othersecret" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_signup_validation() {
    let app = test_app(TokenUsePolicy::Multi).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/signup",
        None,
        Some(json!({ "username": "jo:hn", "password": "mysecret" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/signup",
        None,
        Some(json!({ "username": "john", "password": "short" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_every_credential_failure_looks_the_same() {
    let app = test_app(TokenUsePolicy::Multi).await;
    signup(&app, "john", "mysecret").await;

    let wrong_password = basic("john", "wrong");
    let unknown_user = basic("jane", "mysecret");
    let headers: [Option<&str>; 6] = [
        Some(&wrong_password),
        Some(&unknown_user),
        None,
        Some("Digest username=\"john\""),
        Some("Bearer"),
        Some("Bearer not-a-token"),
    ];

    for header in headers {
        let (status, body) = send(&app, "POST", "/api/v1/auth/signin", header, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "header: {:?}", header);
        assert_eq!(body["error"], INVALID_CREDENTIALS_MESSAGE, "header: {:?}", header);
    }
}

#[tokio::test]
async fn test_single_use_tokens() {
    let app = test_app(TokenUsePolicy::Single).await;
    signup(&app, "john", "mysecret").await;

    let (_, signed_in) = send(
        &app,
        "POST",
        "/api/v1/auth/signin",
        Some(&basic("john", "mysecret")),
        None,
    )
    .await;
    let token = signed_in["token"].as_str().unwrap().to_string();

    let (status, first) = send(&app, "GET", "/api/v1/auth/me", Some(&bearer(&token)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["username"], "john");

    let (status, second) = send(&app, "GET", "/api/v1/auth/me", Some(&bearer(&token)), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(second["error"], INVALID_CREDENTIALS_MESSAGE);
}

#[tokio::test]
async fn test_multi_use_tokens() {
    let app = test_app(TokenUsePolicy::Multi).await;
    let created = signup(&app, "john", "mysecret").await;
    let token = created["token"].as_str().unwrap();

    for _ in 0..3 {
        let (status, _) = send(&app, "GET", "/api/v1/auth/me", Some(&bearer(token)), None).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_key_does_not_expire() {
    let app = test_app(TokenUsePolicy::Multi).await;
    signup(&app, "john", "mysecret").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/key",
        Some(&basic("john", "mysecret")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let key = body["key"].as_str().unwrap();
    let far_future = Utc::now() + Duration::days(3650);
    let payload = app.state.tokens().verify_at(key, far_future).unwrap();
    assert_eq!(payload.role, Role::User);

    let (status, _) = send(&app, "GET", "/api/v1/auth/me", Some(&bearer(key)), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_identity_routes_require_admin() {
    let app = test_app(TokenUsePolicy::Multi).await;
    signup(&app, "john", "mysecret").await;

    let (status, _) = send(
        &app,
        "GET",
        "/api/v1/identities",
        Some(&basic("john", "mysecret")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "GET", "/api/v1/identities", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        "GET",
        "/api/v1/identities",
        Some(&basic("admin", ADMIN_PASSWORD)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_oauth_provisioning_is_idempotent() {
    let app = test_app(TokenUsePolicy::Multi).await;
    let admin = basic("admin", ADMIN_PASSWORD);

    let (status, first) = send(
        &app,
        "POST",
        "/api/v1/identities/oauth",
        Some(&admin),
        Some(json!({ "email": "jane@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["username"], "jane@example.com");
    assert_eq!(first["role"], "user");

    let (status, second) = send(
        &app,
        "POST",
        "/api/v1/identities/oauth",
        Some(&admin),
        Some(json!({ "email": "jane@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["id"], first["id"]);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/identities/oauth",
        Some(&admin),
        Some(json!({ "email": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_identity() {
    let app = test_app(TokenUsePolicy::Multi).await;
    let created = signup(&app, "john", "mysecret").await;
    let id = created["identity"]["id"].as_i64().unwrap();
    let admin = basic("admin", ADMIN_PASSWORD);
    let uri = format!("/api/v1/identities/{}", id);

    let (status, body) = send(
        &app,
        "PUT",
        &uri,
        Some(&admin),
        Some(json!({ "role": "editor" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "editor");

    // Role change alone leaves the password working
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/signin",
        Some(&basic("john", "mysecret")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "PUT",
        &uri,
        Some(&admin),
        Some(json!({ "password": "newsecret" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/signin",
        Some(&basic("john", "newsecret")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "PUT",
        &uri,
        Some(&admin),
        Some(json!({ "role": "superuser" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "PUT",
        "/api/v1/identities/9999",
        Some(&admin),
        Some(json!({ "role": "editor" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
