//! JWT authentication for API routes.
//!
//! Uses a dual-token system:
//! - Access tokens: short-lived, stateless, verified without a database hit
//! - Refresh tokens: long-lived, tracked in the database by JTI
//!
//! Protected routes use the [`RequireAuth`] extractor, which only checks the
//! access token. Expired access tokens are renewed through the explicit
//! refresh endpoint, never silently by this extractor.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::cli::TokenTransport;
use crate::jwt::{AccessClaims, JwtConfig};

/// Cookie name for the access token (cookie transport only).
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Cookie name for the refresh token (cookie transport only).
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Read the access token from a request according to the configured transport.
/// The bearer header always wins; the access cookie is a fallback under
/// cookie transport.
pub fn read_access_token<'a>(
    headers: &'a axum::http::HeaderMap,
    transport: TokenTransport,
) -> Option<&'a str> {
    bearer_token(headers).or_else(|| match transport {
        TokenTransport::Cookie => get_cookie(headers, ACCESS_COOKIE_NAME),
        TokenTransport::Body => None,
    })
}

/// Build a Set-Cookie value for a token cookie (httpOnly, SameSite=Strict).
pub fn token_cookie(name: &str, token: &str, max_age: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}",
        name, token, max_age, secure
    )
}

/// Build a Set-Cookie value that clears a token cookie.
pub fn clear_cookie(name: &str, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0{}",
        name, secure
    )
}

/// Authenticated user information extracted from a valid access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's public UUID (the token subject)
    pub user_uuid: String,
    /// JWT claims from the access token
    pub claims: AccessClaims,
}

/// Authentication errors. Always answered with a 401 JSON body; the
/// distinction only affects the message.
#[derive(Debug)]
pub enum AuthError {
    NotAuthenticated,
    InvalidToken,
}

impl AuthError {
    fn message(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "Not authenticated",
            Self::InvalidToken => "Invalid or expired token",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}

/// Trait for state types that support authentication.
pub trait HasAuthState {
    fn jwt(&self) -> &JwtConfig;
    fn transport(&self) -> TokenTransport;
}

/// Implement [`HasAuthState`] for a state struct with `jwt` and
/// `transport` fields.
#[macro_export]
macro_rules! impl_has_auth_state {
    ($state:ty) => {
        impl $crate::auth::HasAuthState for $state {
            fn jwt(&self) -> &$crate::jwt::JwtConfig {
                &self.jwt
            }

            fn transport(&self) -> $crate::cli::TokenTransport {
                self.transport
            }
        }
    };
}

/// Extractor for endpoints that require authentication.
///
/// Validates the access token and injects the subject. Stateless: no
/// database access on this path.
pub struct RequireAuth(pub AuthUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = read_access_token(&parts.headers, state.transport())
            .ok_or(AuthError::NotAuthenticated)?;

        let claims = state
            .jwt()
            .validate_access_token(token)
            .map_err(|_| AuthError::InvalidToken)?;

        Ok(RequireAuth(AuthUser {
            user_uuid: claims.sub.clone(),
            claims,
        }))
    }
}
