//! CLI subcommands.

pub mod admin;
pub mod migrate;
pub mod seed;

use secrecy::ExposeSecret;

use pizza_service::config::{ConfigError, database_url_from_env};
use pizza_service::db::{MEMORY_DATABASE_URL, PgDatabase, create_pool};

/// Errors shared by the database-backed commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("commands need PostgreSQL; the in-memory backend does not persist")]
    MemoryBackend,
}

/// Connect to the database named by the environment.
pub async fn connect() -> Result<PgDatabase, CommandError> {
    let database_url = database_url_from_env()?;
    if database_url.expose_secret() == MEMORY_DATABASE_URL {
        return Err(CommandError::MemoryBackend);
    }

    tracing::info!("Connecting to database...");
    let pool = create_pool(&database_url).await?;
    Ok(PgDatabase::new(pool))
}
