#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use quillgate::{ServerConfig, cli::TokenTransport, create_app, db::Database};
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &[u8] = b"test-jwt-secret-that-is-long-enough";

/// Create a test app with a fresh in-memory database and body transport.
/// Returns the router and a handle to the database for direct inspection.
pub async fn create_test_app() -> (Router, Database) {
    create_test_app_with(TokenTransport::Body).await
}

/// Create a test app with the given token transport.
pub async fn create_test_app_with(transport: TokenTransport) -> (Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: TEST_JWT_SECRET.to_vec(),
        access_token_ttl: 300,
        refresh_token_ttl: 1209600,
        transport,
        secure_cookies: false,
    };
    (create_app(&config), db)
}

/// Send a request with a JSON body and parse the JSON response (if any).
pub async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// Send a request with a JSON body and a bearer token.
pub async fn send_json_auth(
    app: &Router,
    method: &str,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// Send a bodyless request, optionally with a bearer token.
pub async fn send_bare(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = builder.body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

/// Register a user and return the response body.
pub async fn register(
    app: &Router,
    username: &str,
    email: &str,
    password: &str,
) -> serde_json::Value {
    let (status, body) = send_json(
        app,
        "POST",
        "/users",
        serde_json::json!({ "username": username, "email": email, "password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "registration failed: {}", body);
    body
}

/// Log a user in via body transport and return the response body
/// (contains accessToken and refreshToken).
pub async fn login(app: &Router, username: &str, password: &str) -> serde_json::Value {
    let (status, body) = send_json(
        app,
        "POST",
        "/users/login",
        serde_json::json!({ "username": username, "password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body
}

/// Register and log in a user; returns (user_uuid, access_token, refresh_token).
pub async fn register_and_login(app: &Router, username: &str) -> (String, String, String) {
    let registered = register(
        app,
        username,
        &format!("{}@example.com", username),
        "password",
    )
    .await;
    let uuid = registered["uuid"].as_str().unwrap().to_string();

    let body = login(app, username, "password").await;
    (
        uuid,
        body["accessToken"].as_str().unwrap().to_string(),
        body["refreshToken"].as_str().unwrap().to_string(),
    )
}
