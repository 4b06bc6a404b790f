//! Authorization guard.
//!
//! A resolved [`Identity`] is handed to every service call that needs one.
//! Each operation states the [`Capability`] it requires and the message a
//! caller sees when it is missing.

use pizza_core::{FranchiseId, Role, UserId};

use crate::error::AppError;
use crate::models::User;

/// Something an operation may require of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Global administration (menu, franchise creation and deletion).
    GlobalAdmin,
    /// Administration of one franchise's stores.
    ManageFranchise(FranchiseId),
    /// Acting on behalf of one user (profile updates, franchise view).
    ActAsUser(UserId),
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct Identity {
    user: User,
    token_hash: String,
}

impl Identity {
    pub(crate) const fn new(user: User, token_hash: String) -> Self {
        Self { user, token_hash }
    }

    #[must_use]
    pub const fn user(&self) -> &User {
        &self.user
    }

    #[must_use]
    pub const fn id(&self) -> UserId {
        self.user.id
    }

    /// Digest of the token this identity was resolved from.
    #[must_use]
    pub fn token_hash(&self) -> &str {
        &self.token_hash
    }

    #[must_use]
    pub fn into_user(self) -> User {
        self.user
    }

    /// Whether the caller holds `capability`.
    #[must_use]
    pub fn allows(&self, capability: Capability) -> bool {
        if let Capability::ActAsUser(target) = capability
            && target == self.user.id
        {
            return true;
        }

        self.user
            .roles
            .iter()
            .any(|role| role_grants(*role, capability))
    }

    /// Require `capability`, failing with `Forbidden(action)` otherwise.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` carrying `action` if the capability is missing.
    pub fn require(&self, capability: Capability, action: &str) -> Result<(), AppError> {
        if self.allows(capability) {
            Ok(())
        } else {
            tracing::debug!(user_id = %self.user.id, ?capability, "Capability denied");
            Err(AppError::Forbidden(action.to_string()))
        }
    }
}

fn role_grants(role: Role, capability: Capability) -> bool {
    match (role, capability) {
        (Role::Admin, _) => true,
        (Role::Franchisee { franchise_id }, Capability::ManageFranchise(target)) => {
            franchise_id == target
        }
        (Role::Franchisee { .. }, Capability::GlobalAdmin | Capability::ActAsUser(_))
        | (Role::Diner, _) => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pizza_core::{Email, RoleSet};

    use super::*;

    fn identity(id: i32, roles: &[Role]) -> Identity {
        Identity::new(
            User {
                id: UserId::new(id),
                name: "Test".to_string(),
                email: Email::parse(&format!("u{id}@example.com")).unwrap(),
                roles: roles.iter().copied().collect::<RoleSet>(),
            },
            "hash".to_string(),
        )
    }

    fn franchisee(franchise: i32) -> Role {
        Role::Franchisee {
            franchise_id: FranchiseId::new(franchise),
        }
    }

    #[test]
    fn test_admin_satisfies_everything() {
        let admin = identity(1, &[Role::Admin]);
        assert!(admin.allows(Capability::GlobalAdmin));
        assert!(admin.allows(Capability::ManageFranchise(FranchiseId::new(9))));
        assert!(admin.allows(Capability::ActAsUser(UserId::new(2))));
    }

    #[test]
    fn test_franchisee_is_scoped_to_own_franchise() {
        let owner = identity(2, &[Role::Diner, franchisee(5)]);
        assert!(owner.allows(Capability::ManageFranchise(FranchiseId::new(5))));
        assert!(!owner.allows(Capability::ManageFranchise(FranchiseId::new(6))));
        assert!(!owner.allows(Capability::GlobalAdmin));
    }

    #[test]
    fn test_diner_has_no_administrative_capability() {
        let diner = identity(3, &[Role::Diner]);
        assert!(!diner.allows(Capability::GlobalAdmin));
        assert!(!diner.allows(Capability::ManageFranchise(FranchiseId::new(1))));
        assert!(!diner.allows(Capability::ActAsUser(UserId::new(4))));
        assert!(diner.allows(Capability::ActAsUser(UserId::new(3))));
    }

    #[test]
    fn test_require_carries_action_message() {
        let diner = identity(3, &[Role::Diner]);
        let err = diner
            .require(Capability::GlobalAdmin, "unable to create a franchise")
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(msg) if msg == "unable to create a franchise"));
    }
}
