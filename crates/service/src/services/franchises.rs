//! Franchise and store management.

use serde::Deserialize;
use tracing::{debug, info, instrument};

use pizza_core::{Email, FranchiseId, StoreId, UserId};

use crate::db::{Database, FranchiseQuery, RepositoryError};
use crate::error::{AppError, Result};
use crate::models::{Franchise, FranchisePage, Store};
use crate::services::authz::{Capability, Identity};

/// A franchise admin reference in a create request.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminRef {
    pub email: String,
}

/// Request body for creating a franchise.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFranchise {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub admins: Vec<AdminRef>,
}

/// Request body for creating a store.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateStore {
    #[serde(default)]
    pub name: String,
}

/// Franchise registry operations with authorization applied.
pub struct FranchiseService<'a> {
    db: &'a dyn Database,
}

impl<'a> FranchiseService<'a> {
    #[must_use]
    pub const fn new(db: &'a dyn Database) -> Self {
        Self { db }
    }

    /// Public franchise listing.
    ///
    /// Global admins additionally see each franchise's admins and per-store
    /// revenue.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the registry cannot be read.
    pub async fn list(
        &self,
        caller: Option<&Identity>,
        query: &FranchiseQuery,
    ) -> Result<FranchisePage> {
        let mut page = self.db.list_franchises(query).await?;

        if caller.is_some_and(|identity| identity.allows(Capability::GlobalAdmin)) {
            let mut detailed = Vec::with_capacity(page.franchises.len());
            for franchise in page.franchises {
                // A franchise deleted since the listing read simply drops out.
                if let Some(full) = self.db.get_franchise(franchise.id).await? {
                    detailed.push(full);
                }
            }
            page.franchises = detailed;
        } else {
            for franchise in &mut page.franchises {
                franchise.admins.clear();
            }
        }

        Ok(page)
    }

    /// Franchises administered by `user`, with store revenue.
    ///
    /// Callers other than `user` itself or a global admin get an empty list.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the registry cannot be read.
    pub async fn for_user(&self, identity: &Identity, user: UserId) -> Result<Vec<Franchise>> {
        if !identity.allows(Capability::ActAsUser(user)) {
            debug!(caller = %identity.id(), %user, "Not allowed to view franchises; returning none");
            return Ok(Vec::new());
        }
        Ok(self.db.franchises_for_admin(user).await?)
    }

    /// Create a franchise, granting each listed admin the franchisee role.
    ///
    /// # Errors
    ///
    /// - `AppError::Forbidden` unless the caller is a global admin
    /// - `AppError::BadRequest` for a blank name
    /// - `AppError::NotFound` if an admin email matches no user
    /// - `AppError::Database(Conflict)` if the name is taken
    #[instrument(skip(self, identity, request), fields(user_id = %identity.id(), name = %request.name))]
    pub async fn create(&self, identity: &Identity, request: CreateFranchise) -> Result<Franchise> {
        identity.require(Capability::GlobalAdmin, "unable to create a franchise")?;

        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("franchise name is required".to_string()));
        }

        let mut admins = Vec::with_capacity(request.admins.len());
        for admin in &request.admins {
            admins.push(self.resolve_admin(&admin.email).await?);
        }

        let franchise = self
            .db
            .create_franchise(name, &admins)
            .await
            .map_err(|e| match e {
                // An admin vanished between lookup and insert.
                RepositoryError::NotFound => {
                    AppError::NotFound("unknown user for franchise admin provided".to_string())
                }
                other => AppError::Database(other),
            })?;

        info!(franchise_id = %franchise.id, admins = admins.len(), "Created franchise");
        Ok(franchise)
    }

    async fn resolve_admin(&self, email: &str) -> Result<UserId> {
        let unknown =
            || AppError::NotFound(format!("unknown user for franchise admin {email} provided"));

        let parsed = Email::parse(email).map_err(|_| unknown())?;
        let user = self
            .db
            .find_user_by_email(&parsed)
            .await?
            .ok_or_else(unknown)?;
        Ok(user.id)
    }

    /// Delete a franchise, its stores, and its franchisee roles.
    ///
    /// Deleting an unknown franchise succeeds.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` unless the caller is a global admin.
    #[instrument(skip(self, identity), fields(user_id = %identity.id()))]
    pub async fn delete(&self, identity: &Identity, franchise: FranchiseId) -> Result<()> {
        identity.require(Capability::GlobalAdmin, "unable to delete a franchise")?;

        if self.db.delete_franchise(franchise).await? {
            info!("Deleted franchise");
        } else {
            debug!("Franchise already absent");
        }
        Ok(())
    }

    /// Create a store under a franchise.
    ///
    /// # Errors
    ///
    /// - `AppError::Forbidden` unless the caller is a global admin or an
    ///   admin of this franchise
    /// - `AppError::BadRequest` for a blank name
    /// - `AppError::NotFound` if the franchise does not exist
    #[instrument(skip(self, identity, request), fields(user_id = %identity.id()))]
    pub async fn create_store(
        &self,
        identity: &Identity,
        franchise: FranchiseId,
        request: CreateStore,
    ) -> Result<Store> {
        identity.require(Capability::ManageFranchise(franchise), "unable to create a store")?;

        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("store name is required".to_string()));
        }

        let store = self
            .db
            .create_store(franchise, name)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AppError::NotFound("unknown franchise".to_string()),
                other => AppError::Database(other),
            })?;

        info!(store_id = %store.id, "Created store");
        Ok(store)
    }

    /// Delete a store of a franchise. Deleting an unknown store succeeds.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` unless the caller is a global admin or
    /// an admin of this franchise.
    #[instrument(skip(self, identity), fields(user_id = %identity.id()))]
    pub async fn delete_store(
        &self,
        identity: &Identity,
        franchise: FranchiseId,
        store: StoreId,
    ) -> Result<()> {
        identity.require(Capability::ManageFranchise(franchise), "unable to delete a store")?;

        if self.db.delete_store(franchise, store).await? {
            info!("Deleted store");
        } else {
            debug!("Store already absent");
        }
        Ok(())
    }
}
