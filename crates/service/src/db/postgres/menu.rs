//! Menu catalog queries.

use async_trait::async_trait;
use rust_decimal::Decimal;

use pizza_core::{MenuItemId, Price};

use super::PgDatabase;
use crate::db::{MenuCatalog, RepositoryError};
use crate::models::{MenuItem, NewMenuItem};

#[derive(Debug, sqlx::FromRow)]
struct MenuItemRow {
    id: i32,
    title: String,
    description: String,
    image: String,
    price: Decimal,
}

impl TryFrom<MenuItemRow> for MenuItem {
    type Error = RepositoryError;

    fn try_from(row: MenuItemRow) -> Result<Self, Self::Error> {
        let price = Price::new(row.price)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid menu price: {e}")))?;

        Ok(Self {
            id: MenuItemId::new(row.id),
            title: row.title,
            description: row.description,
            image: row.image,
            price,
        })
    }
}

#[async_trait]
impl MenuCatalog for PgDatabase {
    async fn list_menu(&self) -> Result<Vec<MenuItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, MenuItemRow>(
            r"
            SELECT id, title, description, image, price
            FROM menu_item
            ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn add_menu_item(&self, item: NewMenuItem) -> Result<MenuItem, RepositoryError> {
        let row = sqlx::query_as::<_, MenuItemRow>(
            r"
            INSERT INTO menu_item (title, description, image, price)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, description, image, price
            ",
        )
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.image)
        .bind(item.price.amount())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_menu_item(&self, id: MenuItemId) -> Result<Option<MenuItem>, RepositoryError> {
        let row = sqlx::query_as::<_, MenuItemRow>(
            r"
            SELECT id, title, description, image, price
            FROM menu_item
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}
