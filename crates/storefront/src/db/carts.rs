//! `PostgreSQL` remote cart repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

use pasta_haus_core::{Cart, UserId};

use super::{CartRepository, PgBackend, RepositoryError, StoredCart};

#[derive(sqlx::FromRow)]
struct CartRow {
    items: Json<Cart>,
    updated_at: DateTime<Utc>,
}

impl From<CartRow> for StoredCart {
    fn from(row: CartRow) -> Self {
        Self {
            cart: row.items.0,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl CartRepository for PgBackend {
    async fn get_cart(&self, user: &UserId) -> Result<Option<StoredCart>, RepositoryError> {
        let row: Option<CartRow> =
            sqlx::query_as("SELECT items, updated_at FROM storefront.carts WHERE user_id = $1")
                .bind(user)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(StoredCart::from))
    }

    async fn put_cart(&self, user: &UserId, cart: &Cart) -> Result<StoredCart, RepositoryError> {
        let row: CartRow = sqlx::query_as(
            r"
            INSERT INTO storefront.carts (user_id, items, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                items = EXCLUDED.items,
                updated_at = EXCLUDED.updated_at
            RETURNING items, updated_at
            ",
        )
        .bind(user)
        .bind(Json(cart))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }
}
