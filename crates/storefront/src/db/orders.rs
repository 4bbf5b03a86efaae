//! `PostgreSQL` order repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

use pasta_haus_core::{
    CartItem, CustomerInfo, Order, OrderId, OrderRecord, OrderStatus, OrderType, Price, UserId,
};

use super::{DateRange, OrderRepository, PgBackend, RepositoryError, conflict_or};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: Option<UserId>,
    items: Json<Vec<CartItem>>,
    total_amount: Price,
    customer_name: Option<String>,
    customer_email: Option<String>,
    customer_phone: Option<String>,
    delivery_address: Option<String>,
    order_type: OrderType,
    special_instructions: Option<String>,
    order_date: DateTime<Utc>,
    status: OrderStatus,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self::from_record(OrderRecord {
            id: row.id,
            items: row.items.0,
            total_amount: row.total_amount,
            customer: CustomerInfo {
                name: row.customer_name,
                email: row.customer_email,
                phone: row.customer_phone,
                delivery_address: row.delivery_address,
                special_instructions: row.special_instructions,
            },
            order_type: row.order_type,
            order_date: row.order_date,
            status: row.status,
            user_id: row.user_id,
        })
    }
}

const SELECT_ORDER: &str = r"
    SELECT id, user_id, items, total_amount, customer_name, customer_email,
           customer_phone, delivery_address, order_type, special_instructions,
           order_date, status
    FROM storefront.orders
";

#[async_trait]
impl OrderRepository for PgBackend {
    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError> {
        let customer = order.customer();

        sqlx::query(
            r"
            INSERT INTO storefront.orders
                (id, user_id, items, total_amount, customer_name, customer_email,
                 customer_phone, delivery_address, order_type, special_instructions,
                 order_date, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ",
        )
        .bind(order.id())
        .bind(order.user_id())
        .bind(Json(order.items()))
        .bind(order.total_amount())
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.delivery_address)
        .bind(order.order_type())
        .bind(&customer.special_instructions)
        .bind(order.order_date())
        .bind(order.status())
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or(e, "order"))?;

        Ok(())
    }

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!("{SELECT_ORDER} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Order::from))
    }

    async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "{SELECT_ORDER} WHERE user_id = $1 ORDER BY order_date DESC, id DESC"
        ))
        .bind(user)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn all_orders(&self, range: Option<DateRange>) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            r"{SELECT_ORDER}
            WHERE ($1::timestamptz IS NULL OR order_date >= $1)
              AND ($2::timestamptz IS NULL OR order_date <= $2)
            ORDER BY order_date DESC, id DESC"
        ))
        .bind(range.map(|r| r.start))
        .bind(range.map(|r| r.end))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn update_order_status(
        &self,
        id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE storefront.orders SET status = $3 WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let exists: Option<(OrderId,)> =
            sqlx::query_as("SELECT id FROM storefront.orders WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        match exists {
            Some(_) => Err(RepositoryError::Conflict(format!(
                "order {id} is no longer {from}"
            ))),
            None => Err(RepositoryError::NotFound),
        }
    }
}
