//! User account API endpoints.
//!
//! - POST `/` - Register a new user
//! - GET `/` - List users (authenticated)
//! - GET `/{uuid}` - Get a user (authenticated)
//! - PUT `/{uuid}` - Update own account (authenticated)
//! - DELETE `/{uuid}` - Delete own account (authenticated)
//! - POST `/login` - Verify credentials and issue a token pair
//! - POST `/logout` - Revoke the presented refresh token and clear cookies

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use super::error::{ApiError, ResultExt, validate_uuid};
use crate::auth::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, RequireAuth, clear_cookie, get_cookie, token_cookie,
};
use crate::cli::TokenTransport;
use crate::db::{Database, UserSummary};
use crate::impl_has_auth_state;
use crate::jwt::JwtConfig;
use crate::password::{hash_password, verify_password};

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub transport: TokenTransport,
    pub secure_cookies: bool,
}

impl_has_auth_state!(UsersState);

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/", post(register_user).get(list_users))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route(
            "/{uuid}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .with_state(state)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Minimal email shape check: one '@', non-empty local part, dotted domain.
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

/// Validate a username for registration or update.
fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() {
        return Err(ApiError::bad_request("Username cannot be empty"));
    }
    if username.len() > 32 {
        return Err(ApiError::bad_request(
            "Username cannot be longer than 32 characters",
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    if !is_valid_email(email) {
        return Err(ApiError::bad_request(format!(
            "{} is not a valid email address!",
            email
        )));
    }
    Ok(())
}

#[derive(Deserialize)]
struct RegisterRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
struct RegisterResponse {
    uuid: String,
    username: String,
    email: String,
}

async fn register_user(
    State(state): State<UsersState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload
        .username
        .as_deref()
        .map(str::trim)
        .ok_or_else(|| ApiError::bad_request("username is required"))?;
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .ok_or_else(|| ApiError::bad_request("email is required"))?;
    let password = payload
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("password is required"))?;

    validate_username(username)?;
    validate_email(email)?;

    let password_hash = hash_password(password).map_err(|e| {
        error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to register user")
    })?;

    let uuid = uuid::Uuid::new_v4().to_string();

    match state
        .db
        .users()
        .create(&uuid, username, email, &password_hash)
        .await
    {
        Ok(_) => Ok((
            StatusCode::CREATED,
            Json(RegisterResponse {
                uuid,
                username: username.to_string(),
                email: email.to_string(),
            }),
        )),
        Err(e) if is_unique_violation(&e) => Err(ApiError::bad_request("User already exists")),
        Err(e) => Err(ApiError::db_error("Failed to create user", e)),
    }
}

async fn list_users(
    State(state): State<UsersState>,
    RequireAuth(_auth): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.db.users().list().await.db_err("Failed to list users")?;

    let summaries: Vec<UserSummary> = users.into_iter().map(UserSummary::from).collect();
    Ok(Json(summaries))
}

async fn get_user(
    State(state): State<UsersState>,
    RequireAuth(_auth): RequireAuth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&uuid)?;

    let user = state
        .db
        .users()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserSummary::from(user)))
}

#[derive(Deserialize)]
struct UpdateUserRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

async fn update_user(
    State(state): State<UsersState>,
    RequireAuth(auth): RequireAuth,
    Path(uuid): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&uuid)?;

    if auth.user_uuid != uuid {
        return Err(ApiError::forbidden("You can only update your own account"));
    }

    let username = payload.username.as_deref().map(str::trim);
    let email = payload.email.as_deref().map(str::trim);

    if let Some(username) = username {
        validate_username(username)?;
    }
    if let Some(email) = email {
        validate_email(email)?;
    }

    // Re-hash when a new password is supplied
    let password_hash = match payload.password.as_deref() {
        Some(password) if !password.is_empty() => Some(hash_password(password).map_err(|e| {
            error!("Failed to hash password: {}", e);
            ApiError::internal("Failed to update user")
        })?),
        Some(_) => return Err(ApiError::bad_request("password cannot be empty")),
        None => None,
    };

    let updated = match state
        .db
        .users()
        .update(&uuid, username, email, password_hash.as_deref())
        .await
    {
        Ok(updated) => updated,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::bad_request("User already exists"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to update user", e)),
    };

    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    let user = state
        .db
        .users()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserSummary::from(user)))
}

async fn delete_user(
    State(state): State<UsersState>,
    RequireAuth(auth): RequireAuth,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&uuid)?;

    if auth.user_uuid != uuid {
        return Err(ApiError::forbidden("You can only delete your own account"));
    }

    let deleted = state
        .db
        .users()
        .delete(&uuid)
        .await
        .db_err("Failed to delete user")?;

    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
struct LoginResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
    message: &'static str,
}

async fn login(
    State(state): State<UsersState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let username = payload
        .username
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("username is required"))?;
    let password = payload
        .password
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("password is required"))?;

    let user = state
        .db
        .users()
        .get_by_username(username)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found."))?;

    let matched = verify_password(password, &user.password_hash).map_err(|e| {
        error!("Failed to verify password: {}", e);
        ApiError::internal("An error occurred while logging in.")
    })?;

    if !matched {
        return Err(ApiError::bad_request("wrong credentials. Please try again."));
    }

    let access = state.jwt.generate_access_token(&user.uuid).map_err(|e| {
        error!("Failed to generate access token: {}", e);
        ApiError::internal("An error occurred while logging in.")
    })?;
    let refresh = state.jwt.generate_refresh_token(&user.uuid).map_err(|e| {
        error!("Failed to generate refresh token: {}", e);
        ApiError::internal("An error occurred while logging in.")
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
            Json(LoginResponse {
                access_token: access.token,
                refresh_token: refresh.token,
                message: "logged in successfully.",
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
                Json(serde_json::json!({ "message": "logged in successfully." })),
            )
                .into_response()
        }
    };

    Ok(response)
}

#[derive(Deserialize)]
struct LogoutRequest {
    #[serde(rename = "refreshToken")]
    refresh_token: Option<String>,
}

/// Logout - revoke the presented refresh token and clear client tokens.
///
/// The token is read from the body (body transport) or the refresh cookie
/// (cookie transport). An absent or invalid token is not an error: logout
/// always succeeds from the client's point of view.
async fn logout(
    State(state): State<UsersState>,
    request: axum::extract::Request,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();

    let presented = match state.transport {
        TokenTransport::Body => axum::body::to_bytes(body, 64 * 1024)
            .await
            .ok()
            .and_then(|bytes| serde_json::from_slice::<LogoutRequest>(&bytes).ok())
            .and_then(|r| r.refresh_token),
        TokenTransport::Cookie => {
            get_cookie(&parts.headers, REFRESH_COOKIE_NAME).map(str::to_string)
        }
    };

    if let Some(refresh_token) = presented {
        if let Ok(claims) = state.jwt.validate_refresh_token(&refresh_token) {
            // Server-side revocation; ignore failures, logout is best-effort
            let _ = state.db.tokens().delete_by_jti(&claims.jti).await;
        }
    }

    let message = Json(serde_json::json!({ "message": "logged out successfully." }));

    let response = match state.transport {
        TokenTransport::Body => (StatusCode::OK, message).into_response(),
        TokenTransport::Cookie => {
            let clear_access = clear_cookie(ACCESS_COOKIE_NAME, state.secure_cookies);
            let clear_refresh = clear_cookie(REFRESH_COOKIE_NAME, state.secure_cookies);
            (
                StatusCode::OK,
                AppendHeaders([(SET_COOKIE, clear_access), (SET_COOKIE, clear_refresh)]),
                message,
            )
                .into_response()
        }
    };

    Ok(response)
}
