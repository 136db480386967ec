mod error;
mod tokens;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::cli::TokenTransport;
use crate::db::Database;
use crate::jwt::JwtConfig;

pub use tokens::TokensState;
pub use users::UsersState;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    transport: TokenTransport,
    secure_cookies: bool,
) -> Router {
    let users_state = UsersState {
        db: db.clone(),
        jwt: jwt.clone(),
        transport,
        secure_cookies,
    };

    let tokens_state = TokensState {
        db,
        jwt,
        transport,
        secure_cookies,
    };

    Router::new()
        .nest("/users", users::router(users_state))
        .nest("/auth", tokens::router(tokens_state))
}
