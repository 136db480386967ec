//! Session renewal API endpoints.
//!
//! - POST `/refresh` - Exchange a refresh token for a new token pair
//! - GET `/verify` - Check that the current access token is still valid

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

use super::error::{ApiError, ResultExt};
use crate::auth::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, RequireAuth, get_cookie, token_cookie,
};
use crate::cli::TokenTransport;
use crate::db::Database;
use crate::impl_has_auth_state;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct TokensState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub transport: TokenTransport,
    pub secure_cookies: bool,
}

impl_has_auth_state!(TokensState);

pub fn router(state: TokensState) -> Router {
    Router::new()
        .route("/refresh", post(refresh_token))
        .route("/verify", get(verify_token))
        .with_state(state)
}

/// Verify that the current access token is still valid.
/// Returns 200 if valid, 401 if not. A lightweight endpoint for checking
/// auth status without touching the database.
async fn verify_token(RequireAuth(_auth): RequireAuth) -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Deserialize)]
struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    refresh_token: Option<String>,
}

#[derive(Serialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
    #[serde(rename = "_id")]
    id: String,
}

/// Exchange a valid refresh token for a new access/refresh pair.
///
/// Rotation is single-use: the presented token is removed from the store
/// before the new pair is issued. A signature-valid token that is no longer
/// stored has either been consumed already (replay) or force-invalidated;
/// both wipe every refresh token the user holds, forcing a fresh login on
/// all devices.
async fn refresh_token(
    State(state): State<TokensState>,
    request: axum::extract::Request,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();

    let presented = match state.transport {
        TokenTransport::Body => axum::body::to_bytes(body, 64 * 1024)
            .await
            .ok()
            .and_then(|bytes| serde_json::from_slice::<RefreshRequest>(&bytes).ok())
            .and_then(|r| r.refresh_token),
        TokenTransport::Cookie => {
            get_cookie(&parts.headers, REFRESH_COOKIE_NAME).map(str::to_string)
        }
    }
    .ok_or_else(|| ApiError::bad_request("Missing refresh token"))?;

    // Signature and expiry check; no database access yet
    let claims = state
        .jwt
        .validate_refresh_token(&presented)
        .map_err(|_| ApiError::bad_request("Invalid or expired refresh token"))?;

    let user = state
        .db
        .users()
        .get_by_uuid(&claims.sub)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found."))?;

    // Atomic remove-if-present: of N concurrent refreshes presenting the
    // same token, exactly one observes true here. Everyone else falls into
    // the replay branch.
    let consumed = state
        .db
        .tokens()
        .delete_by_jti(&claims.jti)
        .await
        .db_err("Failed to consume refresh token")?;

    if !consumed {
        warn!(user = %user.uuid, jti = %claims.jti, "Refresh token reuse detected, revoking all sessions");
        state
            .db
            .tokens()
            .delete_all_for_user(user.id)
            .await
            .db_err("Failed to revoke tokens")?;
        return Err(ApiError::bad_request("Invalid or expired refresh token"));
    }

    let access = state.jwt.generate_access_token(&user.uuid).map_err(|e| {
        error!("Failed to generate access token: {}", e);
        ApiError::internal("Failed to generate token")
    })?;
    let refresh = state.jwt.generate_refresh_token(&user.uuid).map_err(|e| {
        error!("Failed to generate refresh token: {}", e);
        ApiError::internal("Failed to generate token")
    })?;

    state
        .db
        .tokens()
        .create(&refresh.jti, user.id, refresh.issued_at, refresh.expires_at)
        .await
        .db_err("Failed to store refresh token")?;

    let response = match state.transport {
        TokenTransport::Body => (
            StatusCode::OK,
            Json(RefreshResponse {
                access_token: access.token,
                refresh_token: refresh.token,
                id: user.uuid,
            }),
        )
            .into_response(),
        TokenTransport::Cookie => {
            let access_cookie = token_cookie(
                ACCESS_COOKIE_NAME,
                &access.token,
                access.duration,
                state.secure_cookies,
            );
            let refresh_cookie = token_cookie(
                REFRESH_COOKIE_NAME,
                &refresh.token,
                refresh.duration,
                state.secure_cookies,
            );
            (
                StatusCode::OK,
                AppendHeaders([(SET_COOKIE, access_cookie), (SET_COOKIE, refresh_cookie)]),
                Json(serde_json::json!({ "_id": user.uuid })),
            )
                .into_response()
        }
    };

    Ok(response)
}
