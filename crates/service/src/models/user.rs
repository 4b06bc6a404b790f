//! User domain types.

use serde::Serialize;

use pizza_core::{Email, RoleSet, UserId};

/// A registered user.
///
/// The password hash lives only in the directory and is never part of
/// this type, so it can be serialized straight into responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Unique user id.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Unique, normalized email address.
    pub email: Email,
    /// Role assignments.
    pub roles: RoleSet,
}

/// Parameters for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub roles: RoleSet,
}

/// A partial user update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<Email>,
    pub password_hash: Option<String>,
}

impl UserUpdate {
    /// Whether the update changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password_hash.is_none()
    }
}
