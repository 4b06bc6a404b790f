//! Authentication service.
//!
//! Password registration and login, opaque bearer tokens, and token
//! resolution for the authorization guard.
//!
//! Tokens are 32 random bytes, URL-safe base64 encoded. Only their SHA-256
//! digest is persisted, so a leaked token table cannot be replayed.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use pizza_core::{Email, RoleSet, UserId};

use crate::db::{Database, RepositoryError};
use crate::models::{NewUser, User, UserUpdate};
use crate::services::authz::Identity;
use crate::telemetry::Metrics;

/// Minimum password length, counted after trimming.
pub const MIN_PASSWORD_LENGTH: usize = 1;

/// A user together with a freshly issued bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user: User,
    pub token: String,
}

/// Partial update to a user's profile or credentials.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate<'a> {
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub password: Option<&'a str>,
}

/// Authentication service.
pub struct AuthService<'a> {
    db: &'a dyn Database,
    metrics: &'a Metrics,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(db: &'a dyn Database, metrics: &'a Metrics) -> Self {
        Self { db, metrics }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new diner and issue a token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingFields` if any field is blank.
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, name, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let name = name.trim();
        if name.is_empty() || email.trim().is_empty() || password.trim().is_empty() {
            return Err(AuthError::MissingFields);
        }

        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .db
            .create_user(NewUser {
                name: name.to_string(),
                email,
                password_hash,
                roles: RoleSet::diner(),
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        info!(user_id = %user.id, "Registered user");
        self.metrics.record_auth(true);
        self.open_session(user).await
    }

    /// Log in with email and password and issue a new token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnknownUser` if the email/password is wrong.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let result = self.check_credentials(email, password).await;
        self.metrics.record_auth(result.is_ok());

        self.open_session(result?).await
    }

    async fn check_credentials(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::UnknownUser)?;

        let (user, password_hash) = self
            .db
            .find_credentials(&email)
            .await?
            .ok_or(AuthError::UnknownUser)?;

        verify_password(password, &password_hash)?;
        Ok(user)
    }

    async fn open_session(&self, user: User) -> Result<Session, AuthError> {
        let token = generate_token();
        self.db.create_token(user.id, &hash_token(&token)).await?;
        self.metrics.session_opened();

        Ok(Session { user, token })
    }

    /// Revoke the token the caller authenticated with.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database operation fails.
    #[instrument(skip(self, identity), fields(user_id = %identity.id()))]
    pub async fn logout(&self, identity: &Identity) -> Result<(), AuthError> {
        if self.db.revoke_token(identity.token_hash()).await? {
            self.metrics.session_closed();
        }
        Ok(())
    }

    // =========================================================================
    // Token Resolution
    // =========================================================================

    /// Resolve a raw bearer token to the caller's identity.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is unknown or revoked,
    /// or its user no longer exists.
    pub async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let token_hash = hash_token(token);

        let user_id = self
            .db
            .resolve_token(&token_hash)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        Ok(Identity::new(user, token_hash))
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Apply a profile update. Authorization is the caller's responsibility.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` / `AuthError::WeakPassword` for bad
    /// input, `AuthError::UserAlreadyExists` if the new email is taken, and
    /// `AuthError::Repository(NotFound)` for an unknown user.
    #[instrument(skip(self, update))]
    pub async fn update_user(
        &self,
        id: UserId,
        update: ProfileUpdate<'_>,
    ) -> Result<User, AuthError> {
        let email = update
            .email
            .filter(|e| !e.trim().is_empty())
            .map(Email::parse)
            .transpose()?;

        let password_hash = match update.password.filter(|p| !p.trim().is_empty()) {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        let changes = UserUpdate {
            name: update
                .name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from),
            email,
            password_hash,
        };

        if changes.is_empty() {
            return self
                .db
                .get_user(id)
                .await?
                .ok_or(AuthError::Repository(RepositoryError::NotFound));
        }

        self.db
            .update_user(id, changes)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Validate password requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.trim().chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::UnknownUser)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::UnknownUser)
}

/// Generate a new opaque bearer token.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Digest under which a token is stored.
#[must_use]
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
