//! Refresh token storage for rotation and revocation.
//!
//! Only refresh tokens are stored in the database. Access tokens are
//! stateless and never persisted. Each row is keyed by the token's JTI,
//! the random nonce embedded in the signed payload, so membership and
//! removal by JTI are equivalent to membership by token string.

use sqlx::sqlite::SqlitePool;

/// A stored refresh token record.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub jti: String,
    pub user_id: i64,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Store for the per-user set of currently valid refresh tokens.
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a refresh token to its user's valid set.
    pub async fn create(
        &self,
        jti: &str,
        user_id: i64,
        issued_at: u64,
        expires_at: u64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO refresh_tokens (jti, user_id, issued_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(jti)
        .bind(user_id)
        .bind(issued_at as i64)
        .bind(expires_at as i64)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Get a stored refresh token by its JWT ID.
    pub async fn get_by_jti(&self, jti: &str) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
        let row: Option<(i64, String, i64, i64, i64)> = sqlx::query_as(
            "SELECT id, jti, user_id, issued_at, expires_at FROM refresh_tokens WHERE jti = ?",
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, jti, user_id, issued_at, expires_at)| RefreshTokenRecord {
            id,
            jti,
            user_id,
            issued_at,
            expires_at,
        }))
    }

    /// Remove a token by its JWT ID if it is still present.
    ///
    /// Returns true if this call removed the row. The conditional delete is
    /// what serializes concurrent rotations of the same token: exactly one
    /// caller observes true, every other one observes false.
    pub async fn delete_by_jti(&self, jti: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE jti = ?")
            .bind(jti)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all tokens for a user, forcing re-authentication everywhere.
    pub async fn delete_all_for_user(&self, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete all expired tokens.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < strftime('%s', 'now')")
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// List a user's valid refresh tokens in insertion order.
    pub async fn list_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<RefreshTokenRecord>, sqlx::Error> {
        let rows: Vec<(i64, String, i64, i64, i64)> = sqlx::query_as(
            "SELECT id, jti, user_id, issued_at, expires_at FROM refresh_tokens
             WHERE user_id = ? AND expires_at >= strftime('%s', 'now')
             ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, jti, user_id, issued_at, expires_at)| RefreshTokenRecord {
                id,
                jti,
                user_id,
                issued_at,
                expires_at,
            })
            .collect())
    }
}
