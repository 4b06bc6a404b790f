//! `PostgreSQL` backend.
//!
//! Queries are built at runtime with `sqlx::query` / `sqlx::query_as` and
//! decoded through internal row types, one submodule per collaborator.
//! Multi-row writes (orders, franchise creation and deletion) run inside a
//! single transaction.

mod franchises;
mod menu;
mod orders;
mod tokens;
mod users;

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool};

use pizza_core::{Email, FranchiseId, Role, RoleSet, UserId};

use super::{Database, RepositoryError};

/// `PostgreSQL` implementation of every persistence trait.
#[derive(Debug, Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// =============================================================================
// Shared Row Helpers
// =============================================================================

/// Internal row type for `user_role` queries.
#[derive(Debug, sqlx::FromRow)]
struct RoleRow {
    user_id: i32,
    role: String,
    franchise_id: Option<i32>,
}

impl TryFrom<RoleRow> for Role {
    type Error = RepositoryError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        Self::from_parts(&row.role, row.franchise_id.map(FranchiseId::new)).ok_or_else(|| {
            RepositoryError::DataCorruption(format!(
                "invalid role assignment for user {}: {}",
                row.user_id, row.role
            ))
        })
    }
}

fn parse_email(raw: &str) -> Result<Email, RepositoryError> {
    Email::parse(raw)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))
}

/// Load the role sets of several users in one query.
///
/// Users without any role row are absent from the map.
async fn load_roles<'e, E>(
    executor: E,
    user_ids: &[i32],
) -> Result<HashMap<UserId, RoleSet>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, RoleRow>(
        r"
        SELECT user_id, role, franchise_id
        FROM user_role
        WHERE user_id = ANY($1)
        ",
    )
    .bind(user_ids)
    .fetch_all(executor)
    .await?;

    let mut roles: HashMap<UserId, RoleSet> = HashMap::new();
    for row in rows {
        let user_id = UserId::new(row.user_id);
        let role = Role::try_from(row)?;
        roles.entry(user_id).or_default().insert(role);
    }
    Ok(roles)
}

/// Insert a role assignment, ignoring one the user already holds.
async fn insert_role<'e, E>(executor: E, user_id: UserId, role: Role) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r"
        INSERT INTO user_role (user_id, role, franchise_id)
        VALUES ($1, $2, $3)
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(user_id.as_i32())
    .bind(role.tag())
    .bind(role.franchise_id().map(|id| id.as_i32()))
    .execute(executor)
    .await?;
    Ok(())
}

/// Whether an error is a foreign key violation (a referenced row is missing).
fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

/// Number of rows to fetch so that one extra row signals another page.
fn page_window(page: u32, per_page: u32) -> (i64, i64) {
    let limit = i64::from(per_page) + 1;
    let offset = i64::from(page) * i64::from(per_page);
    (limit, offset)
}
