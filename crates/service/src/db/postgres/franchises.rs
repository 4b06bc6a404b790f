//! Franchise and store queries.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;

use pizza_core::{FranchiseId, Price, Role, StoreId, UserId};

use super::{PgDatabase, insert_role, is_foreign_key_violation, page_window, parse_email};
use crate::db::{FranchiseQuery, FranchiseRegistry, RepositoryError, conflict_on_unique, like_pattern};
use crate::models::{Franchise, FranchiseAdmin, FranchisePage, Store};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct FranchiseRow {
    id: i32,
    name: String,
}

#[derive(Debug, sqlx::FromRow)]
struct AdminRow {
    franchise_id: i32,
    id: i32,
    name: String,
    email: String,
}

#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    id: i32,
    franchise_id: i32,
    name: String,
    total_revenue: Option<Decimal>,
}

impl TryFrom<StoreRow> for Store {
    type Error = RepositoryError;

    fn try_from(row: StoreRow) -> Result<Self, Self::Error> {
        let total_revenue = row
            .total_revenue
            .map(Price::total)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid store revenue: {e}")))?;

        Ok(Self {
            id: StoreId::new(row.id),
            franchise_id: FranchiseId::new(row.franchise_id),
            name: row.name,
            total_revenue,
        })
    }
}

fn map_missing_reference(err: sqlx::Error) -> RepositoryError {
    if is_foreign_key_violation(&err) {
        RepositoryError::NotFound
    } else {
        RepositoryError::Database(err)
    }
}

impl PgDatabase {
    /// Attach admins and stores to a batch of franchise rows, preserving order.
    async fn hydrate(
        &self,
        rows: Vec<FranchiseRow>,
        with_revenue: bool,
    ) -> Result<Vec<Franchise>, RepositoryError> {
        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();

        let admin_rows = sqlx::query_as::<_, AdminRow>(
            r"
            SELECT fa.franchise_id, u.id, u.name, u.email
            FROM franchise_admin fa
            JOIN app_user u ON u.id = fa.user_id
            WHERE fa.franchise_id = ANY($1)
            ORDER BY fa.franchise_id, fa.position
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let store_rows = sqlx::query_as::<_, StoreRow>(
            r"
            SELECT s.id, s.franchise_id, s.name,
                   CASE WHEN $2 THEN (
                       SELECT COALESCE(SUM(oi.price), 0)
                       FROM diner_order o
                       JOIN order_item oi ON oi.order_id = o.id
                       WHERE o.store_id = s.id
                   ) END AS total_revenue
            FROM store s
            WHERE s.franchise_id = ANY($1)
            ORDER BY s.id
            ",
        )
        .bind(&ids)
        .bind(with_revenue)
        .fetch_all(&self.pool)
        .await?;

        let mut admins: HashMap<i32, Vec<FranchiseAdmin>> = HashMap::new();
        for row in admin_rows {
            admins.entry(row.franchise_id).or_default().push(FranchiseAdmin {
                id: UserId::new(row.id),
                name: row.name,
                email: parse_email(&row.email)?,
            });
        }

        let mut stores: HashMap<i32, Vec<Store>> = HashMap::new();
        for row in store_rows {
            stores
                .entry(row.franchise_id)
                .or_default()
                .push(Store::try_from(row)?);
        }

        Ok(rows
            .into_iter()
            .map(|row| Franchise {
                id: FranchiseId::new(row.id),
                admins: admins.remove(&row.id).unwrap_or_default(),
                stores: stores.remove(&row.id).unwrap_or_default(),
                name: row.name,
            })
            .collect())
    }
}

// =============================================================================
// FranchiseRegistry
// =============================================================================

#[async_trait]
impl FranchiseRegistry for PgDatabase {
    async fn create_franchise(
        &self,
        name: &str,
        admins: &[UserId],
    ) -> Result<Franchise, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: i32 = sqlx::query_scalar("INSERT INTO franchise (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| conflict_on_unique(e, "franchise name"))?;

        let franchise_id = FranchiseId::new(id);
        for (position, admin) in (0_i32..).zip(admins) {
            sqlx::query(
                r"
                INSERT INTO franchise_admin (franchise_id, user_id, position)
                VALUES ($1, $2, $3)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(id)
            .bind(admin.as_i32())
            .bind(position)
            .execute(&mut *tx)
            .await
            .map_err(map_missing_reference)?;

            insert_role(&mut *tx, *admin, Role::Franchisee { franchise_id })
                .await
                .map_err(map_missing_reference)?;
        }

        tx.commit().await?;

        self.get_franchise(franchise_id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_franchises(
        &self,
        query: &FranchiseQuery,
    ) -> Result<FranchisePage, RepositoryError> {
        let (limit, offset) = page_window(query.page, query.limit);
        let pattern = query.name.as_deref().map(like_pattern);

        let mut rows = sqlx::query_as::<_, FranchiseRow>(
            r"
            SELECT id, name
            FROM franchise
            WHERE $1::text IS NULL OR name ILIKE $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let more = rows.len() > query.limit as usize;
        rows.truncate(query.limit as usize);

        Ok(FranchisePage {
            franchises: self.hydrate(rows, false).await?,
            more,
        })
    }

    async fn franchises_for_admin(&self, user: UserId) -> Result<Vec<Franchise>, RepositoryError> {
        let rows = sqlx::query_as::<_, FranchiseRow>(
            r"
            SELECT f.id, f.name
            FROM franchise f
            JOIN franchise_admin fa ON fa.franchise_id = f.id
            WHERE fa.user_id = $1
            ORDER BY f.id
            ",
        )
        .bind(user.as_i32())
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows, true).await
    }

    async fn get_franchise(&self, id: FranchiseId) -> Result<Option<Franchise>, RepositoryError> {
        let row = sqlx::query_as::<_, FranchiseRow>("SELECT id, name FROM franchise WHERE id = $1")
            .bind(id.as_i32())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(self.hydrate(vec![row], true).await?.pop())
    }

    async fn delete_franchise(&self, id: FranchiseId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_role WHERE franchise_id = $1")
            .bind(id.as_i32())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM store WHERE franchise_id = $1")
            .bind(id.as_i32())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM franchise_admin WHERE franchise_id = $1")
            .bind(id.as_i32())
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM franchise WHERE id = $1")
            .bind(id.as_i32())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_store(
        &self,
        franchise: FranchiseId,
        name: &str,
    ) -> Result<Store, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(
            r"
            INSERT INTO store (franchise_id, name)
            VALUES ($1, $2)
            RETURNING id, franchise_id, name, NULL::numeric AS total_revenue
            ",
        )
        .bind(franchise.as_i32())
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(map_missing_reference)?;

        Store::try_from(row)
    }

    async fn get_store(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(
            r"
            SELECT id, franchise_id, name, NULL::numeric AS total_revenue
            FROM store
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Store::try_from).transpose()
    }

    async fn delete_store(
        &self,
        franchise: FranchiseId,
        store: StoreId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM store WHERE id = $1 AND franchise_id = $2")
            .bind(store.as_i32())
            .bind(franchise.as_i32())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
