//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::db::Database;
use crate::factory::Fulfillment;
use crate::services::menu::MenuCache;
use crate::telemetry::Telemetry;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. Collaborators are trait
/// objects so tests can swap in the in-memory database and a fake factory.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServiceConfig,
    db: Arc<dyn Database>,
    factory: Arc<dyn Fulfillment>,
    telemetry: Telemetry,
    menu_cache: MenuCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Service configuration
    /// * `db` - Persistence backend
    /// * `factory` - Fulfillment client
    /// * `telemetry` - Request-side telemetry handle
    #[must_use]
    pub fn new(
        config: ServiceConfig,
        db: Arc<dyn Database>,
        factory: Arc<dyn Fulfillment>,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                factory,
                telemetry,
                menu_cache: MenuCache::new(),
            }),
        }
    }

    /// Get a reference to the service configuration.
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    /// Get a reference to the persistence backend.
    #[must_use]
    pub fn db(&self) -> &dyn Database {
        self.inner.db.as_ref()
    }

    /// Get a reference to the fulfillment client.
    #[must_use]
    pub fn factory(&self) -> &dyn Fulfillment {
        self.inner.factory.as_ref()
    }

    #[must_use]
    pub fn telemetry(&self) -> &Telemetry {
        &self.inner.telemetry
    }

    #[must_use]
    pub fn menu_cache(&self) -> &MenuCache {
        &self.inner.menu_cache
    }
}
