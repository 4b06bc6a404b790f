//! Order ledger queries.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use pizza_core::{FranchiseId, MenuItemId, OrderId, Price, StoreId, UserId};

use super::{PgDatabase, page_window};
use crate::db::{OrderLedger, RepositoryError};
use crate::models::{NewOrder, Order, OrderItem, OrderPage};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    diner_id: i32,
    franchise_id: i32,
    store_id: i32,
    date: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    order_id: i32,
    menu_id: i32,
    description: String,
    price: Decimal,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let price = Price::new(row.price).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid price on order {}: {e}", row.order_id))
        })?;

        Ok(Self {
            menu_id: MenuItemId::new(row.menu_id),
            description: row.description,
            price,
        })
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: OrderId::new(self.id),
            diner_id: UserId::new(self.diner_id),
            franchise_id: FranchiseId::new(self.franchise_id),
            store_id: StoreId::new(self.store_id),
            date: self.date,
            items,
        }
    }
}

// =============================================================================
// OrderLedger
// =============================================================================

#[async_trait]
impl OrderLedger for PgDatabase {
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(
            r"
            INSERT INTO diner_order (diner_id, franchise_id, store_id, date)
            VALUES ($1, $2, $3, now())
            RETURNING id, diner_id, franchise_id, store_id, date
            ",
        )
        .bind(order.diner_id.as_i32())
        .bind(order.franchise_id.as_i32())
        .bind(order.store_id.as_i32())
        .fetch_one(&mut *tx)
        .await?;

        for item in &order.items {
            sqlx::query(
                r"
                INSERT INTO order_item (order_id, menu_id, description, price)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(row.id)
            .bind(item.menu_id.as_i32())
            .bind(&item.description)
            .bind(item.price.amount())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(row.into_order(order.items))
    }

    async fn list_orders(
        &self,
        diner: UserId,
        page: u32,
        per_page: u32,
    ) -> Result<OrderPage, RepositoryError> {
        let (limit, offset) = page_window(page, per_page);

        let mut rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, diner_id, franchise_id, store_id, date
            FROM diner_order
            WHERE diner_id = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(diner.as_i32())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let more = rows.len() > per_page as usize;
        rows.truncate(per_page as usize);

        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT order_id, menu_id, description, price
            FROM order_item
            WHERE order_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<i32, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            items
                .entry(row.order_id)
                .or_default()
                .push(OrderItem::try_from(row)?);
        }

        let orders = rows
            .into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect();

        Ok(OrderPage {
            diner_id: diner,
            orders,
            page,
            more,
        })
    }
}
