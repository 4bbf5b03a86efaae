//! Order retrieval and the status lifecycle.
//!
//! Customers only ever see their own orders. The admin surface sees every
//! order, usually narrowed to a creation-date window, and moves orders along
//! `pending -> confirmed -> preparing -> ready -> delivering -> completed`.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use thiserror::Error;

use pasta_haus_core::{InvalidTransition, Order, OrderId, OrderStatus, UserId};

use super::live::LiveQuery;
use crate::db::{Backend, Collection, DateRange, RepositoryError};

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order {0} not found")]
    NotFound(OrderId),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("order is already {0}")]
    NoNextStatus(OrderStatus),

    #[error("order {0} was changed by someone else, reload and try again")]
    StatusChanged(OrderId),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Creation-date window for the admin order views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderWindow {
    All,
    Range(DateRange),
    /// The business day in progress at the time of each read.
    Today(FixedOffset),
}

impl OrderWindow {
    #[must_use]
    pub fn resolve(self, now: DateTime<Utc>) -> Option<DateRange> {
        match self {
            Self::All => None,
            Self::Range(range) => Some(range),
            Self::Today(offset) => Some(DateRange::today(now, offset)),
        }
    }
}

/// Order queries and status changes.
#[derive(Clone)]
pub struct OrderService {
    backend: Arc<dyn Backend>,
}

impl OrderService {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// The customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the store cannot be read.
    pub async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.backend.orders_for_user(user).await?)
    }

    /// One of the customer's own orders.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` when the order does not exist or
    /// belongs to someone else.
    pub async fn order_for_user(&self, user: &UserId, id: &OrderId) -> Result<Order, OrderError> {
        self.backend
            .get_order(id)
            .await?
            .filter(|order| order.is_owned_by(user))
            .ok_or_else(|| OrderError::NotFound(id.clone()))
    }

    /// Live view of the customer's orders.
    #[must_use]
    pub fn subscribe_user_orders(&self, user: UserId) -> LiveQuery<Order> {
        let backend = Arc::clone(&self.backend);
        LiveQuery::new(self.backend.changes(), Collection::Orders, move || {
            let backend = Arc::clone(&backend);
            let user = user.clone();
            async move { backend.orders_for_user(&user).await }
        })
    }

    /// Every order in `window`, newest first, optionally with one status.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the store cannot be read.
    pub async fn all_orders(
        &self,
        window: OrderWindow,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, OrderError> {
        let orders = self.backend.all_orders(window.resolve(Utc::now())).await?;
        Ok(filter_status(orders, status))
    }

    /// Live view for the admin dashboard. `OrderWindow::Today` is re-read on
    /// every refresh, so a board left open rolls over at midnight.
    #[must_use]
    pub fn subscribe_all_orders(
        &self,
        window: OrderWindow,
        status: Option<OrderStatus>,
    ) -> LiveQuery<Order> {
        let backend = Arc::clone(&self.backend);
        LiveQuery::new(self.backend.changes(), Collection::Orders, move || {
            let backend = Arc::clone(&backend);
            let range = window.resolve(Utc::now());
            async move { Ok(filter_status(backend.all_orders(range).await?, status)) }
        })
    }

    /// Any order by id.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for an unknown id.
    pub async fn get_order(&self, id: &OrderId) -> Result<Order, OrderError> {
        self.backend
            .get_order(id)
            .await?
            .ok_or_else(|| OrderError::NotFound(id.clone()))
    }

    /// Move an order to `to` if the lifecycle allows it.
    ///
    /// # Errors
    ///
    /// - `OrderError::NotFound` for an unknown id
    /// - `OrderError::InvalidTransition` if the move is not allowed; the
    ///   stored status is unchanged
    /// - `OrderError::StatusChanged` if another writer moved the order after
    ///   it was read
    pub async fn advance_status(&self, id: &OrderId, to: OrderStatus) -> Result<Order, OrderError> {
        let mut order = self.get_order(id).await?;
        let from = order.status();

        if let Err(e) = order.transition(to) {
            tracing::warn!(order_id = %id, %from, %to, "Rejected order status change");
            return Err(e.into());
        }

        self.backend
            .update_order_status(id, from, to)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => OrderError::NotFound(id.clone()),
                RepositoryError::Conflict(_) => OrderError::StatusChanged(id.clone()),
                other => OrderError::Repository(other),
            })?;

        tracing::info!(order_id = %id, %from, %to, "Order status changed");
        Ok(order)
    }

    /// Move an order one step along the fulfillment flow.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NoNextStatus` for completed or cancelled orders.
    pub async fn advance(&self, id: &OrderId) -> Result<Order, OrderError> {
        let current = self.get_order(id).await?.status();
        let next = current.next().ok_or(OrderError::NoNextStatus(current))?;
        self.advance_status(id, next).await
    }

    /// Cancel a non-terminal order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidTransition` for completed or cancelled orders.
    pub async fn cancel(&self, id: &OrderId) -> Result<Order, OrderError> {
        self.advance_status(id, OrderStatus::Cancelled).await
    }
}

fn filter_status(orders: Vec<Order>, status: Option<OrderStatus>) -> Vec<Order> {
    match status {
        Some(status) => orders.into_iter().filter(|o| o.status() == status).collect(),
        None => orders,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, FixedOffset, Utc};
    use pasta_haus_core::{Cart, CustomerInfo, OrderRecord, OrderType};

    use super::*;
    use crate::db::{MemoryBackend, OrderRepository};
    use crate::services::cart::tests::product;

    async fn place(backend: &MemoryBackend, id: &str, user: &str, age_hours: i64) -> OrderId {
        let mut cart = Cart::new();
        cart.add(product("3", 130), 1, None, None);
        let order = Order::from_record(OrderRecord {
            id: OrderId::new(id),
            items: cart.items().to_vec(),
            total_amount: cart.total(),
            customer: CustomerInfo::default(),
            order_type: OrderType::Pickup,
            order_date: Utc::now() - Duration::hours(age_hours),
            status: OrderStatus::Pending,
            user_id: Some(UserId::new(user)),
        });
        backend.insert_order(&order).await.unwrap();
        order.id().clone()
    }

    #[tokio::test]
    async fn test_customers_only_see_their_own_orders() {
        let backend = Arc::new(MemoryBackend::new());
        let mine = place(&backend, "ORDER-1", "alice", 2).await;
        place(&backend, "ORDER-2", "bob", 1).await;
        let newest = place(&backend, "ORDER-3", "alice", 0).await;

        let service = OrderService::new(backend);
        let alice = UserId::new("alice");
        let orders = service.orders_for_user(&alice).await.unwrap();
        let ids: Vec<_> = orders.iter().map(|o| o.id().clone()).collect();
        assert_eq!(ids, vec![newest, mine]);

        let err = service
            .order_for_user(&alice, &OrderId::new("ORDER-2"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_admin_range_and_status_filter() {
        let backend = Arc::new(MemoryBackend::new());
        place(&backend, "ORDER-OLD", "alice", 72).await;
        let today = place(&backend, "ORDER-NOW", "bob", 0).await;

        let service = OrderService::new(backend);
        let utc = FixedOffset::east_opt(0).unwrap();

        let orders = service
            .all_orders(OrderWindow::Today(utc), None)
            .await
            .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id(), &today);

        let last_week = OrderWindow::Range(DateRange::today(Utc::now() - Duration::days(3), utc));
        let orders = service.all_orders(last_week, None).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id().as_str(), "ORDER-OLD");

        assert_eq!(service.all_orders(OrderWindow::All, None).await.unwrap().len(), 2);
        let confirmed = service
            .all_orders(OrderWindow::All, Some(OrderStatus::Confirmed))
            .await
            .unwrap();
        assert!(confirmed.is_empty());
    }

    #[test]
    fn test_today_window_follows_the_clock() {
        let manila = FixedOffset::east_opt(8 * 3600).unwrap();
        let before_midnight = "2026-03-01T15:59:00Z".parse::<DateTime<Utc>>().unwrap();
        let after_midnight = before_midnight + Duration::minutes(2);

        let today = OrderWindow::Today(manila);
        let first = today.resolve(before_midnight).unwrap();
        let second = today.resolve(after_midnight).unwrap();
        assert!(first.contains(before_midnight));
        assert!(!first.contains(after_midnight));
        assert!(second.contains(after_midnight));
        assert_eq!(second.start, first.end + Duration::milliseconds(1));

        assert_eq!(OrderWindow::All.resolve(after_midnight), None);
        assert_eq!(
            OrderWindow::Range(first).resolve(after_midnight),
            Some(first)
        );
    }

    #[tokio::test]
    async fn test_advance_walks_the_flow_then_stops() {
        let backend = Arc::new(MemoryBackend::new());
        let id = place(&backend, "ORDER-1", "alice", 0).await;
        let service = OrderService::new(backend);

        let mut seen = Vec::new();
        while let Ok(order) = service.advance(&id).await {
            seen.push(order.status());
        }
        assert_eq!(
            seen,
            vec![
                OrderStatus::Confirmed,
                OrderStatus::Preparing,
                OrderStatus::Ready,
                OrderStatus::Delivering,
                OrderStatus::Completed,
            ]
        );
        assert!(matches!(
            service.advance(&id).await,
            Err(OrderError::NoNextStatus(OrderStatus::Completed))
        ));
    }

    #[tokio::test]
    async fn test_stale_status_write_cannot_reopen_cancelled_order() {
        let backend = Arc::new(MemoryBackend::new());
        let id = place(&backend, "ORDER-1", "alice", 0).await;

        // Two admins read the order while it is pending; one cancels first.
        backend
            .update_order_status(&id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await
            .unwrap();
        let stale = backend
            .update_order_status(&id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await;
        assert!(matches!(stale, Err(RepositoryError::Conflict(_))));

        let service = OrderService::new(backend);
        assert_eq!(
            service.get_order(&id).await.unwrap().status(),
            OrderStatus::Cancelled
        );
        assert!(matches!(
            service.advance(&id).await,
            Err(OrderError::NoNextStatus(OrderStatus::Cancelled))
        ));
    }

    #[tokio::test]
    async fn test_invalid_transition_leaves_stored_status() {
        let backend = Arc::new(MemoryBackend::new());
        let id = place(&backend, "ORDER-1", "alice", 0).await;
        let service = OrderService::new(backend);

        let err = service
            .advance_status(&id, OrderStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition(_)));
        assert_eq!(service.get_order(&id).await.unwrap().status(), OrderStatus::Pending);

        service.cancel(&id).await.unwrap();
        assert!(matches!(
            service.cancel(&id).await,
            Err(OrderError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let service = OrderService::new(Arc::new(MemoryBackend::new()));
        let err = service
            .advance_status(&OrderId::new("nope"), OrderStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_user_subscription_sees_new_orders() {
        let backend = Arc::new(MemoryBackend::new());
        let service = OrderService::new(backend.clone());
        let mut live = service.subscribe_user_orders(UserId::new("alice"));

        assert!(live.next().await.unwrap().unwrap().is_empty());
        place(&backend, "ORDER-2", "bob", 0).await;
        place(&backend, "ORDER-1", "alice", 0).await;

        // Bob's write also wakes the query; Alice's order shows up by the
        // second snapshot at the latest.
        let mut snapshot = live.next().await.unwrap().unwrap();
        if snapshot.is_empty() {
            snapshot = live.next().await.unwrap().unwrap();
        }
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].is_owned_by(&UserId::new("alice")));
    }
}
