//! User directory queries.

use async_trait::async_trait;

use pizza_core::{Email, Role, RoleSet, UserId};

use super::{PgDatabase, insert_role, load_roles, parse_email};
use crate::db::{RepositoryError, UserDirectory, conflict_on_unique};
use crate::models::{NewUser, User, UserUpdate};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    name: String,
    email: String,
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    id: i32,
    name: String,
    email: String,
    password_hash: String,
}

impl UserRow {
    fn into_user(self, roles: RoleSet) -> Result<User, RepositoryError> {
        Ok(User {
            id: UserId::new(self.id),
            name: self.name,
            email: parse_email(&self.email)?,
            roles,
        })
    }
}

impl PgDatabase {
    async fn attach_roles(&self, row: UserRow) -> Result<User, RepositoryError> {
        let mut roles = load_roles(&self.pool, &[row.id]).await?;
        let set = roles.remove(&UserId::new(row.id)).unwrap_or_default();
        row.into_user(set)
    }
}

// =============================================================================
// UserDirectory
// =============================================================================

#[async_trait]
impl UserDirectory for PgDatabase {
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO app_user (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email
            ",
        )
        .bind(&user.name)
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "email"))?;

        let id = UserId::new(row.id);
        for role in user.roles.iter() {
            insert_role(&mut *tx, id, *role).await?;
        }

        tx.commit().await?;

        row.into_user(user.roles)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, name, email FROM app_user WHERE id = $1")
            .bind(id.as_i32())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => self.attach_roles(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row =
            sqlx::query_as::<_, UserRow>("SELECT id, name, email FROM app_user WHERE email = $1")
                .bind(email.as_str())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => self.attach_roles(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn find_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r"
            SELECT id, name, email, password_hash
            FROM app_user
            WHERE email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let user = self
            .attach_roles(UserRow {
                id: row.id,
                name: row.name,
                email: row.email,
            })
            .await?;
        Ok(Some((user, row.password_hash)))
    }

    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE app_user
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                updated_at = now()
            WHERE id = $1
            RETURNING id, name, email
            ",
        )
        .bind(id.as_i32())
        .bind(update.name.as_deref())
        .bind(update.email.as_ref().map(Email::as_str))
        .bind(update.password_hash.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email"))?
        .ok_or(RepositoryError::NotFound)?;

        self.attach_roles(row).await
    }

    async fn grant_role(&self, id: UserId, role: Role) -> Result<(), RepositoryError> {
        insert_role(&self.pool, id, role).await.map_err(|e| {
            if super::is_foreign_key_violation(&e) {
                RepositoryError::NotFound
            } else {
                RepositoryError::Database(e)
            }
        })
    }
}
