//! Session token queries.

use async_trait::async_trait;

use pizza_core::UserId;

use super::PgDatabase;
use crate::db::{RepositoryError, TokenStore};

#[async_trait]
impl TokenStore for PgDatabase {
    async fn create_token(
        &self,
        user_id: UserId,
        token_hash: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO auth_token (token_hash, user_id)
            VALUES ($1, $2)
            ",
        )
        .bind(token_hash)
        .bind(user_id.as_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if super::is_foreign_key_violation(&e) {
                RepositoryError::NotFound
            } else {
                RepositoryError::Database(e)
            }
        })?;
        Ok(())
    }

    async fn resolve_token(&self, token_hash: &str) -> Result<Option<UserId>, RepositoryError> {
        let user_id: Option<i32> =
            sqlx::query_scalar("SELECT user_id FROM auth_token WHERE token_hash = $1")
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await?;

        Ok(user_id.map(UserId::new))
    }

    async fn revoke_token(&self, token_hash: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM auth_token WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
