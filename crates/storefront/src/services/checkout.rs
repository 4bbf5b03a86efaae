//! Order creation from the visitor's cart.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use thiserror::Error;
use tower_sessions::Session;

use pasta_haus_core::{CustomerInfo, Order, OrderId, OrderType};

use super::cart::{LocalCart, ShoppingCart};
use crate::db::{Backend, RepositoryError};
use crate::error::add_breadcrumb;
use crate::models::CurrentUser;

/// Length of the random suffix in generated order ids.
const ORDER_SUFFIX_LEN: usize = 7;

const BASE36: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("your cart is empty")]
    EmptyCart,

    #[error("sign in to place an order")]
    NotAuthenticated,

    #[error("failed to save order: {0}")]
    Persistence(#[from] RepositoryError),
}

/// Turns a cart into a persisted order.
pub struct CheckoutService {
    backend: Arc<dyn Backend>,
}

impl CheckoutService {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Place an order for everything in the session cart.
    ///
    /// The order snapshots the cart lines and total and starts `pending`. The
    /// cart is cleared only after the order is stored.
    ///
    /// # Errors
    ///
    /// - `CheckoutError::EmptyCart` if there is nothing to order
    /// - `CheckoutError::NotAuthenticated` if no customer is signed in
    /// - `CheckoutError::Persistence` if the order could not be stored; the
    ///   cart is left as it was
    pub async fn create_order(
        &self,
        session: &Session,
        user: Option<&CurrentUser>,
        order_type: OrderType,
        customer: CustomerInfo,
    ) -> Result<Order, CheckoutError> {
        let cart = LocalCart::new(session).load().await;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let user = user.ok_or(CheckoutError::NotAuthenticated)?;

        let order = Order::from_cart(
            generate_order_id(),
            &cart,
            order_type,
            tidy(customer),
            user.uid.clone(),
            Utc::now(),
        );

        if let Err(e) = self.backend.insert_order(&order).await {
            tracing::error!(user_id = %user.uid, error = %e, "Failed to save order");
            return Err(e.into());
        }

        ShoppingCart::new(session, Arc::clone(&self.backend), Some(&user.uid))
            .clear()
            .await;

        tracing::info!(
            order_id = %order.id(),
            user_id = %user.uid,
            order_type = %order.order_type(),
            total = %order.total_amount(),
            "Order placed"
        );
        add_breadcrumb(
            "checkout",
            "Order placed",
            Some(&[("order_id", order.id().as_str())]),
        );

        Ok(order)
    }
}

/// `ORDER-<unix millis>-<7 random base-36 characters>`.
#[must_use]
pub fn generate_order_id() -> OrderId {
    let mut rng = rand::rng();
    let suffix: String = (0..ORDER_SUFFIX_LEN)
        .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
        .collect();
    OrderId::new(format!("ORDER-{}-{suffix}", Utc::now().timestamp_millis()))
}

fn tidy(customer: CustomerInfo) -> CustomerInfo {
    fn field(value: Option<String>) -> Option<String> {
        value
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
    }

    CustomerInfo {
        name: field(customer.name),
        email: field(customer.email),
        phone: field(customer.phone),
        delivery_address: field(customer.delivery_address),
        special_instructions: field(customer.special_instructions),
    }
}
