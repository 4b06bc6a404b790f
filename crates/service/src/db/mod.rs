//! Persistence collaborators.
//!
//! Every component reaches the database through one of these traits, never
//! through ad hoc query construction:
//!
//! - [`TokenStore`] - opaque session tokens (stored as SHA-256 digests)
//! - [`UserDirectory`] - users, password hashes, role assignments
//! - [`FranchiseRegistry`] - franchises, their admins, their stores
//! - [`MenuCatalog`] - the global menu
//! - [`OrderLedger`] - orders and their line items
//!
//! Two backends implement them: [`PgDatabase`] for `PostgreSQL` and
//! [`MemoryDatabase`] for tests and local development.
//!
//! # Migrations
//!
//! Migrations live in `crates/service/migrations/` and run via:
//! ```bash
//! cargo run -p pizza-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use pizza_core::{Email, FranchiseId, MenuItemId, Role, StoreId, UserId};

use crate::models::{
    Franchise, FranchisePage, MenuItem, NewMenuItem, NewOrder, NewUser, Order, OrderPage, Store,
    User, UserUpdate,
};

pub use memory::MemoryDatabase;
pub use postgres::PgDatabase;

/// `PIZZA_DATABASE_URL` value that selects the in-memory backend.
pub const MEMORY_DATABASE_URL: &str = "memory";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-violation into `Conflict`, everything else into `Database`.
pub(crate) fn conflict_on_unique(err: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(err)
}

/// Session token persistence.
///
/// Tokens have no expiry; a token is valid until revoked.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Bind a token digest to a user.
    async fn create_token(&self, user_id: UserId, token_hash: &str)
    -> Result<(), RepositoryError>;

    /// Resolve a token digest to its user, if the token is still live.
    async fn resolve_token(&self, token_hash: &str) -> Result<Option<UserId>, RepositoryError>;

    /// Revoke a token. Returns `false` if it was not live.
    async fn revoke_token(&self, token_hash: &str) -> Result<bool, RepositoryError>;
}

/// Users, credentials, and role assignments.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Create a user with the given roles.
    ///
    /// Fails with `Conflict` if the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// Fetch a user together with their password hash.
    async fn find_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    /// Apply a partial update.
    ///
    /// Fails with `NotFound` for an unknown user, `Conflict` if the new
    /// email is taken.
    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<User, RepositoryError>;

    /// Add a role assignment. Granting a role the user already holds is a no-op.
    async fn grant_role(&self, id: UserId, role: Role) -> Result<(), RepositoryError>;
}

/// Filter and paging for the franchise listing.
#[derive(Debug, Clone)]
pub struct FranchiseQuery {
    /// Zero-based page index.
    pub page: u32,
    /// Page size.
    pub limit: u32,
    /// Name pattern; `*` matches any run of characters. Case-insensitive.
    pub name: Option<String>,
}

/// Franchises and their stores.
#[async_trait]
pub trait FranchiseRegistry: Send + Sync {
    /// Create a franchise and grant each admin the franchisee role for it,
    /// in one atomic step.
    ///
    /// Fails with `Conflict` if the name is taken.
    async fn create_franchise(
        &self,
        name: &str,
        admins: &[UserId],
    ) -> Result<Franchise, RepositoryError>;

    /// List franchises with their stores (without revenue), ordered by id.
    async fn list_franchises(&self, query: &FranchiseQuery)
    -> Result<FranchisePage, RepositoryError>;

    /// Franchises the user administers, with per-store revenue.
    async fn franchises_for_admin(&self, user: UserId) -> Result<Vec<Franchise>, RepositoryError>;

    /// A single franchise with admins and per-store revenue.
    async fn get_franchise(&self, id: FranchiseId) -> Result<Option<Franchise>, RepositoryError>;

    /// Delete a franchise, its stores, and the franchisee roles scoped to it,
    /// all or nothing. Returns `false` if it did not exist.
    async fn delete_franchise(&self, id: FranchiseId) -> Result<bool, RepositoryError>;

    /// Create a store. Fails with `NotFound` if the franchise does not exist.
    async fn create_store(&self, franchise: FranchiseId, name: &str)
    -> Result<Store, RepositoryError>;

    async fn get_store(&self, id: StoreId) -> Result<Option<Store>, RepositoryError>;

    /// Delete a store of the given franchise. Returns `false` if no such
    /// store belongs to that franchise.
    async fn delete_store(
        &self,
        franchise: FranchiseId,
        store: StoreId,
    ) -> Result<bool, RepositoryError>;
}

/// The global menu. Append-only.
#[async_trait]
pub trait MenuCatalog: Send + Sync {
    /// All menu items ordered by id.
    async fn list_menu(&self) -> Result<Vec<MenuItem>, RepositoryError>;

    async fn add_menu_item(&self, item: NewMenuItem) -> Result<MenuItem, RepositoryError>;

    async fn get_menu_item(&self, id: MenuItemId) -> Result<Option<MenuItem>, RepositoryError>;
}

/// The authoritative record of all orders.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Write an order and its line items atomically, assigning the next id.
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError>;

    /// One page of a diner's orders, oldest first.
    async fn list_orders(
        &self,
        diner: UserId,
        page: u32,
        per_page: u32,
    ) -> Result<OrderPage, RepositoryError>;
}

/// The full persistence collaborator.
#[async_trait]
pub trait Database:
    TokenStore + UserDirectory + FranchiseRegistry + MenuCatalog + OrderLedger
{
    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Open the backend named by `database_url`.
///
/// # Errors
///
/// Returns `sqlx::Error` if the `PostgreSQL` pool cannot be created.
pub async fn connect(
    database_url: &secrecy::SecretString,
) -> Result<Arc<dyn Database>, sqlx::Error> {
    if database_url.expose_secret() == MEMORY_DATABASE_URL {
        tracing::warn!("Using in-memory database; data is lost on restart");
        return Ok(Arc::new(MemoryDatabase::new()));
    }

    let pool = create_pool(database_url).await?;
    Ok(Arc::new(PgDatabase::new(pool)))
}

/// Whether `name` matches a `*` wildcard pattern, ignoring case.
pub(crate) fn name_matches(pattern: &str, name: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let name = name.to_lowercase();

    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return true;
    };
    let Some(mut rest) = name.strip_prefix(first) else {
        return false;
    };

    let remaining: Vec<&str> = parts.collect();
    let Some((last, middle)) = remaining.split_last() else {
        // No wildcard at all: exact match.
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }

    rest.ends_with(last)
}

/// Translate a `*` wildcard pattern into a SQL `LIKE` pattern.
pub(crate) fn like_pattern(pattern: &str) -> String {
    let escaped = pattern
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    escaped.replace('*', "%")
}
