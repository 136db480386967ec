mod common;

use axum::http::StatusCode;
use common::{create_test_app, register_and_login, send_bare, send_json};
use serde_json::json;

#[tokio::test]
async fn test_refresh_issues_new_pair_and_rotates() {
    let (app, db) = create_test_app().await;

    let (uuid, _access, refresh) = register_and_login(&app, "Benli").await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/auth/refresh",
        json!({ "refreshToken": refresh }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["_id"], uuid);
    let new_access = body["accessToken"].as_str().unwrap();
    let new_refresh = body["refreshToken"].as_str().unwrap();
    assert!(!new_access.is_empty());
    assert!(!new_refresh.is_empty());
    assert_ne!(new_refresh, refresh);

    // The presented token was rotated out; exactly the new one remains
    let user = db.users().get_by_uuid(&uuid).await.unwrap().unwrap();
    let stored = db.tokens().list_for_user(user.id).await.unwrap();
    assert_eq!(stored.len(), 1);

    // The new access token is accepted by the gate
    let (status, _body) = send_bare(&app, "GET", "/auth/verify", Some(new_access)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_token_is_single_use() {
    let (app, db) = create_test_app().await;

    let (uuid, _access, refresh) = register_and_login(&app, "Benli").await;

    let (status, _body) = send_json(
        &app,
        "POST",
        "/auth/refresh",
        json!({ "refreshToken": refresh }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Second use of the same token is a replay
    let (status, body) = send_json(
        &app,
        "POST",
        "/auth/refresh",
        json!({ "refreshToken": refresh }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());

    // Replay wipes the whole family, including the freshly rotated token
    let user = db.users().get_by_uuid(&uuid).await.unwrap().unwrap();
    assert!(db.tokens().list_for_user(user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_replay_forces_new_login() {
    let (app, _db) = create_test_app().await;

    let (_uuid, _access, refresh) = register_and_login(&app, "Benli").await;

    let (status, first) = send_json(
        &app,
        "POST",
        "/auth/refresh",
        json!({ "refreshToken": refresh }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _body) = send_json(
        &app,
        "POST",
        "/auth/refresh",
        json!({ "refreshToken": refresh }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Even the rotated token from the first refresh is now dead
    let rotated = first["refreshToken"].as_str().unwrap();
    let (status, _body) = send_json(
        &app,
        "POST",
        "/auth/refresh",
        json!({ "refreshToken": rotated }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // A fresh login works again
    let body = common::login(&app, "Benli", "password").await;
    assert!(body["refreshToken"].as_str().is_some());
}

#[tokio::test]
async fn test_refresh_missing_token() {
    let (app, _db) = create_test_app().await;

    let (status, body) = send_json(&app, "POST", "/auth/refresh", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing refresh token");
}

#[tokio::test]
async fn test_refresh_malformed_token() {
    let (app, _db) = create_test_app().await;

    let (status, _body) = send_json(
        &app,
        "POST",
        "/auth/refresh",
        json!({ "refreshToken": "not.a.token" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let (app, _db) = create_test_app().await;

    let (_uuid, access, _refresh) = register_and_login(&app, "Benli").await;

    // An access token is signature-valid but the wrong kind
    let (status, _body) = send_json(
        &app,
        "POST",
        "/auth/refresh",
        json!({ "refreshToken": access }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_expired_token() {
    use quillgate::jwt::{RefreshClaims, TokenType};
    use std::time::{SystemTime, UNIX_EPOCH};

    let (app, _db) = create_test_app().await;

    let (uuid, _access, _refresh) = register_and_login(&app, "Benli").await;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = RefreshClaims {
        jti: uuid::Uuid::new_v4().to_string(),
        sub: uuid,
        token_type: TokenType::Refresh,
        iat: now - 100,
        exp: now - 50,
    };
    let expired = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(common::TEST_JWT_SECRET),
    )
    .unwrap();

    let (status, _body) = send_json(
        &app,
        "POST",
        "/auth/refresh",
        json!({ "refreshToken": expired }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_after_user_deleted() {
    let (app, db) = create_test_app().await;

    let (uuid, _access, refresh) = register_and_login(&app, "Benli").await;

    assert!(db.users().delete(&uuid).await.unwrap());

    let (status, body) = send_json(
        &app,
        "POST",
        "/auth/refresh",
        json!({ "refreshToken": refresh }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User not found.");
}

#[tokio::test]
async fn test_concurrent_refresh_single_winner() {
    let (app, db) = create_test_app().await;

    let (uuid, _access, refresh) = register_and_login(&app, "Benli").await;

    let payload = json!({ "refreshToken": refresh });
    let (first, second) = tokio::join!(
        send_json(&app, "POST", "/auth/refresh", payload.clone()),
        send_json(&app, "POST", "/auth/refresh", payload.clone()),
    );

    // Exactly one concurrent rotation wins; the loser takes the replay path
    let mut statuses = [first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::BAD_REQUEST]);

    // The losing call revoked the user's tokens; depending on interleaving
    // the winner's replacement token may or may not have been stored before
    // the wipe, but the presented token is gone either way.
    let user = db.users().get_by_uuid(&uuid).await.unwrap().unwrap();
    assert!(db.tokens().list_for_user(user.id).await.unwrap().len() <= 1);
}
