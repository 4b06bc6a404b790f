//! Menu service.
//!
//! The full menu is cached for 5 minutes and invalidated whenever an item
//! is added, so readers never see a menu older than the last write from
//! this process.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, info, instrument};

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{MenuItem, NewMenuItem};
use crate::services::authz::{Capability, Identity};

/// Shared cache of the full menu.
#[derive(Clone)]
pub struct MenuCache {
    cache: Cache<(), Arc<Vec<MenuItem>>>,
}

impl std::fmt::Debug for MenuCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MenuCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl Default for MenuCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MenuCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(Duration::from_secs(300)) // 5 minutes
                .build(),
        }
    }
}

/// Menu reads and admin writes.
pub struct MenuService<'a> {
    db: &'a dyn Database,
    cache: &'a MenuCache,
}

impl<'a> MenuService<'a> {
    #[must_use]
    pub const fn new(db: &'a dyn Database, cache: &'a MenuCache) -> Self {
        Self { db, cache }
    }

    /// The full menu, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the menu cannot be loaded.
    pub async fn list(&self) -> Result<Arc<Vec<MenuItem>>> {
        if let Some(menu) = self.cache.cache.get(&()).await {
            debug!("Menu cache hit");
            return Ok(menu);
        }

        let menu = Arc::new(self.db.list_menu().await?);
        self.cache.cache.insert((), Arc::clone(&menu)).await;
        Ok(menu)
    }

    /// Add a menu item and return the updated menu.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` unless the caller is a global admin,
    /// `AppError::BadRequest` for an item without a title.
    #[instrument(skip(self, identity, item), fields(user_id = %identity.id(), title = %item.title))]
    pub async fn add(&self, identity: &Identity, item: NewMenuItem) -> Result<Arc<Vec<MenuItem>>> {
        identity.require(Capability::GlobalAdmin, "unable to add menu item")?;

        if item.title.trim().is_empty() {
            return Err(AppError::BadRequest("menu item title is required".to_string()));
        }

        let added = self.db.add_menu_item(item).await?;
        info!(menu_item_id = %added.id, "Added menu item");

        self.cache.cache.invalidate(&()).await;
        self.list().await
    }
}
