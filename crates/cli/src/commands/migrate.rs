//! Database migration command.
//!
//! ```bash
//! pizza-cli migrate
//! ```
//!
//! Migrations are embedded from `crates/service/migrations/` at build time.

use thiserror::Error;

use super::{CommandError, connect};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let db = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../service/migrations").run(db.pool()).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
