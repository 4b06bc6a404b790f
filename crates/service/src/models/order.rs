//! Order ledger types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pizza_core::{FranchiseId, MenuItemId, OrderId, Price, StoreId, UserId};

/// An order line.
///
/// Description and price are snapshots taken when the order was placed;
/// later menu changes never reach them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub menu_id: MenuItemId,
    pub description: String,
    pub price: Price,
}

/// A line item as submitted by the diner.
pub type NewOrderItem = OrderItem;

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub diner_id: UserId,
    pub franchise_id: FranchiseId,
    pub store_id: StoreId,
    pub date: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Total of all line prices.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.iter().map(|item| item.price).sum()
    }
}

/// Parameters for writing an order to the ledger.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub diner_id: UserId,
    pub franchise_id: FranchiseId,
    pub store_id: StoreId,
    pub items: Vec<NewOrderItem>,
}

/// One page of a diner's orders, oldest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub diner_id: UserId,
    pub orders: Vec<Order>,
    /// Zero-based page index.
    pub page: u32,
    /// Whether `page + 1` holds more orders.
    pub more: bool,
}
