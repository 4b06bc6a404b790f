//! Role assignments.
//!
//! A user holds a set of role assignments. They are not mutually exclusive:
//! a franchisee normally also keeps the diner role they registered with.

use serde::{Deserialize, Serialize};

use super::id::FranchiseId;

/// A single role assignment.
///
/// Serialized in the shape clients already understand:
///
/// ```
/// use pizza_core::{FranchiseId, Role};
///
/// let json = serde_json::to_string(&Role::Franchisee { franchise_id: FranchiseId::new(7) }).unwrap();
/// assert_eq!(json, r#"{"role":"franchisee","objectId":7}"#);
///
/// let diner: Role = serde_json::from_str(r#"{"role":"diner"}"#).unwrap();
/// assert_eq!(diner, Role::Diner);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Role {
    /// Default role: browse the menu, place and list own orders.
    Diner,
    /// Global administrator.
    Admin,
    /// Administrator of exactly one franchise.
    Franchisee {
        /// The franchise this assignment is scoped to.
        #[serde(rename = "objectId")]
        franchise_id: FranchiseId,
    },
}

impl Role {
    /// Database tag for this role.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Diner => "diner",
            Self::Admin => "admin",
            Self::Franchisee { .. } => "franchisee",
        }
    }

    /// The franchise this role is scoped to, if any.
    #[must_use]
    pub const fn franchise_id(&self) -> Option<FranchiseId> {
        match self {
            Self::Franchisee { franchise_id } => Some(*franchise_id),
            Self::Diner | Self::Admin => None,
        }
    }

    /// Rebuild a role from its database tag and optional scope.
    ///
    /// Returns `None` for unknown tags or a franchisee row without a franchise.
    #[must_use]
    pub fn from_parts(tag: &str, franchise_id: Option<FranchiseId>) -> Option<Self> {
        match (tag, franchise_id) {
            ("diner", _) => Some(Self::Diner),
            ("admin", _) => Some(Self::Admin),
            ("franchisee", Some(franchise_id)) => Some(Self::Franchisee { franchise_id }),
            _ => None,
        }
    }
}

/// An ordered, duplicate-free set of role assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(Vec<Role>);

impl RoleSet {
    /// The role set every newly registered user starts with.
    #[must_use]
    pub fn diner() -> Self {
        Self(vec![Role::Diner])
    }

    /// Add a role, keeping the set ordered and free of duplicates.
    pub fn insert(&mut self, role: Role) {
        if let Err(pos) = self.0.binary_search(&role) {
            self.0.insert(pos, role);
        }
    }

    /// Remove every franchisee assignment scoped to `franchise_id`.
    pub fn remove_franchise(&mut self, franchise_id: FranchiseId) {
        self.0.retain(|role| role.franchise_id() != Some(franchise_id));
    }

    /// Whether the set holds the global admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.0.contains(&Role::Admin)
    }

    /// Whether the set holds a franchisee assignment for `franchise_id`.
    #[must_use]
    pub fn is_franchisee_of(&self, franchise_id: FranchiseId) -> bool {
        self.0.contains(&Role::Franchisee { franchise_id })
    }

    /// Whether the set contains exactly the given role.
    #[must_use]
    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    /// Iterate the roles in order.
    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }

    /// Number of role assignments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        let mut set = Self::default();
        for role in iter {
            set.insert(role);
        }
        set
    }
}
