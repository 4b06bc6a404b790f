//! Order workflow.
//!
//! Placing an order runs in a fixed sequence:
//!
//! 1. validate the request body (non-empty items)
//! 2. check that the franchise exists and owns the store
//! 3. check that every referenced menu item exists
//! 4. write the order to the ledger
//! 5. submit it to the factory
//!
//! Steps 1-3 short-circuit before any write. Once step 4 succeeds the order
//! stays in the ledger whatever the factory answers; a factory failure is
//! reported to the caller with the factory's diagnostic reference.

use std::collections::BTreeSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use pizza_core::{FranchiseId, StoreId};

use crate::db::Database;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::factory::{Fulfillment, FulfillmentTicket};
use crate::models::{NewOrder, Order, OrderItem, OrderPage};
use crate::services::authz::Identity;
use crate::telemetry::{LogEvent, LogLevel, Telemetry};

/// Request body for placing an order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrder {
    pub franchise_id: FranchiseId,
    pub store_id: StoreId,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

/// A persisted order that the factory accepted.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    #[serde(flatten)]
    pub ticket: FulfillmentTicket,
}

/// Orchestrates order placement and listing.
pub struct OrderWorkflow<'a> {
    db: &'a dyn Database,
    factory: &'a dyn Fulfillment,
    telemetry: &'a Telemetry,
}

impl<'a> OrderWorkflow<'a> {
    #[must_use]
    pub const fn new(
        db: &'a dyn Database,
        factory: &'a dyn Fulfillment,
        telemetry: &'a Telemetry,
    ) -> Self {
        Self {
            db,
            factory,
            telemetry,
        }
    }

    /// Validate, record, and fulfill an order for the caller.
    ///
    /// # Errors
    ///
    /// - `AppError::BadRequest` for an order without items
    /// - `AppError::NotFound` for an unknown franchise, store, or menu item,
    ///   or a store that belongs to another franchise
    /// - `AppError::Database` if the ledger write fails
    /// - `AppError::Upstream` if the factory does not accept the order; the
    ///   order is still recorded
    #[instrument(
        skip(self, identity, request),
        fields(
            user_id = %identity.id(),
            franchise_id = %request.franchise_id,
            store_id = %request.store_id,
        )
    )]
    pub async fn place_order(&self, identity: &Identity, request: PlaceOrder) -> Result<PlacedOrder> {
        self.validate(&request).await?;

        let order = self
            .db
            .create_order(NewOrder {
                diner_id: identity.id(),
                franchise_id: request.franchise_id,
                store_id: request.store_id,
                items: request.items,
            })
            .await?;
        info!(order_id = %order.id, items = order.items.len(), "Recorded order");

        let started = Instant::now();
        let outcome = self.factory.fulfill(identity.user(), &order).await;
        let elapsed = started.elapsed();

        let metrics = self.telemetry.metrics();
        metrics.observe_factory_latency(elapsed);

        let latency_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(ticket) => {
                metrics.record_sale(order.items.len(), order.total());
                self.telemetry.log(LogEvent::new(
                    "factory",
                    LogLevel::Info,
                    json!({
                        "orderId": order.id,
                        "success": true,
                        "latencyMs": latency_ms,
                    }),
                ));
                let order_id = order.id.to_string();
                add_breadcrumb("order", "Order fulfilled", Some(&[("order_id", &order_id)]));
                Ok(PlacedOrder { order, ticket })
            }
            Err(err) => {
                metrics.record_fulfillment_failure();
                warn!(order_id = %order.id, error = %err, "Factory did not fulfill order");
                self.telemetry.log(LogEvent::new(
                    "factory",
                    LogLevel::Error,
                    json!({
                        "orderId": order.id,
                        "success": false,
                        "latencyMs": latency_ms,
                        "error": err.to_string(),
                        "reportUrl": err.report_url(),
                    }),
                ));
                Err(AppError::Upstream(err))
            }
        }
    }

    async fn validate(&self, request: &PlaceOrder) -> Result<()> {
        if request.items.is_empty() {
            return Err(AppError::BadRequest(
                "order must contain at least one item".to_string(),
            ));
        }

        if self.db.get_franchise(request.franchise_id).await?.is_none() {
            return Err(AppError::NotFound("unknown franchise".to_string()));
        }

        match self.db.get_store(request.store_id).await? {
            Some(store) if store.franchise_id == request.franchise_id => {}
            _ => return Err(AppError::NotFound("unknown store".to_string())),
        }

        let menu_ids: BTreeSet<_> = request.items.iter().map(|item| item.menu_id).collect();
        for menu_id in menu_ids {
            if self.db.get_menu_item(menu_id).await?.is_none() {
                return Err(AppError::NotFound(format!("unknown menu item {menu_id}")));
            }
        }

        Ok(())
    }

    /// One page of the caller's own orders, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the ledger cannot be read.
    pub async fn list_orders(
        &self,
        identity: &Identity,
        page: u32,
        per_page: u32,
    ) -> Result<OrderPage> {
        Ok(self.db.list_orders(identity.id(), page, per_page).await?)
    }
}
