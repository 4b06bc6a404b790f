//! Admin user management.
//!
//! ```bash
//! pizza-cli admin create -e admin@example.com -n "Admin Name" -p 'secret'
//! ```
//!
//! Global admins cannot be created over HTTP; this is the bootstrap path.

use thiserror::Error;

use pizza_core::{Email, Role, RoleSet, UserId};
use pizza_service::db::{RepositoryError, UserDirectory};
use pizza_service::models::NewUser;
use pizza_service::services::auth::{AuthError, hash_password};

use super::{CommandError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] pizza_core::EmailError),

    #[error("Password must not be blank")]
    BlankPassword,

    /// User already exists.
    #[error("User already exists with email: {0}")]
    UserExists(String),

    #[error("Failed to hash password: {0}")]
    Hash(#[from] AuthError),

    #[error(transparent)]
    Repository(RepositoryError),
}

/// Create a user holding the global admin role.
///
/// # Errors
///
/// Returns an error for an invalid email, a blank password, a taken email,
/// or a database failure.
pub async fn create_admin(email: &str, name: &str, password: &str) -> Result<UserId, AdminError> {
    let email = Email::parse(email)?;
    if password.trim().is_empty() {
        return Err(AdminError::BlankPassword);
    }
    let password_hash = hash_password(password)?;

    let db = connect().await?;

    tracing::info!("Creating admin user: {}", email);
    let user = db
        .create_user(NewUser {
            name: name.trim().to_string(),
            email: email.clone(),
            password_hash,
            roles: [Role::Admin].into_iter().collect::<RoleSet>(),
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AdminError::UserExists(email.to_string()),
            other => AdminError::Repository(other),
        })?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );
    Ok(user.id)
}
