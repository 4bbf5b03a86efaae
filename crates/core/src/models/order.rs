//! Orders: immutable cart snapshots plus fulfillment metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cart::{Cart, CartItem};
use crate::types::{OrderId, OrderStatus, OrderType, Price, UserId};

/// Customer-supplied checkout fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

/// A placed order.
///
/// The item list and total are fixed at creation. The only mutable field is
/// the status, and it only moves along [`OrderStatus::can_transition_to`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: OrderId,
    items: Vec<CartItem>,
    total_amount: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    customer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    customer_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    customer_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delivery_address: Option<String>,
    order_type: OrderType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    special_instructions: Option<String>,
    order_date: DateTime<Utc>,
    status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<UserId>,
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move order from {from} to {to}")]
pub struct InvalidTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// Stored order fields, used when loading an order back from the store.
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub id: OrderId,
    pub items: Vec<CartItem>,
    pub total_amount: Price,
    pub customer: CustomerInfo,
    pub order_type: OrderType,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub user_id: Option<UserId>,
}

impl Order {
    /// Snapshot a cart into a new `pending` order.
    #[must_use]
    pub fn from_cart(
        id: OrderId,
        cart: &Cart,
        order_type: OrderType,
        customer: CustomerInfo,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self::from_record(OrderRecord {
            id,
            items: cart.items().to_vec(),
            total_amount: cart.total(),
            customer,
            order_type,
            order_date: now,
            status: OrderStatus::Pending,
            user_id: Some(user_id),
        })
    }

    /// Rebuild an order from stored fields.
    #[must_use]
    pub fn from_record(record: OrderRecord) -> Self {
        let CustomerInfo {
            name,
            email,
            phone,
            delivery_address,
            special_instructions,
        } = record.customer;

        Self {
            id: record.id,
            items: record.items,
            total_amount: record.total_amount,
            customer_name: name,
            customer_email: email,
            customer_phone: phone,
            delivery_address,
            order_type: record.order_type,
            special_instructions,
            order_date: record.order_date,
            status: record.status,
            user_id: record.user_id,
        }
    }

    /// Move to `to` if the lifecycle allows it.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] and leaves the order unchanged otherwise.
    pub fn transition(&mut self, to: OrderStatus) -> Result<(), InvalidTransition> {
        if self.status.can_transition_to(to) {
            self.status = to;
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self.status,
                to,
            })
        }
    }

    #[must_use]
    pub const fn id(&self) -> &OrderId {
        &self.id
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub const fn total_amount(&self) -> Price {
        self.total_amount
    }

    #[must_use]
    pub fn customer(&self) -> CustomerInfo {
        CustomerInfo {
            name: self.customer_name.clone(),
            email: self.customer_email.clone(),
            phone: self.customer_phone.clone(),
            delivery_address: self.delivery_address.clone(),
            special_instructions: self.special_instructions.clone(),
        }
    }

    #[must_use]
    pub const fn order_type(&self) -> OrderType {
        self.order_type
    }

    #[must_use]
    pub const fn order_date(&self) -> DateTime<Utc> {
        self.order_date
    }

    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        self.status
    }

    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    /// Whether the order belongs to `user`.
    #[must_use]
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        self.user_id.as_ref() == Some(user)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::product::fixtures::muffins;

    fn order() -> Order {
        let mut cart = Cart::new();
        cart.add(muffins(), 2, None, None);
        Order::from_cart(
            OrderId::new("ORDER-1"),
            &cart,
            OrderType::Pickup,
            CustomerInfo {
                name: Some("Maria".to_owned()),
                ..CustomerInfo::default()
            },
            UserId::new("uid-1"),
            Utc::now(),
        )
    }

    #[test]
    fn test_from_cart_snapshots_items_and_total() {
        let order = order();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.items().len(), 1);
        assert_eq!(order.total_amount(), Price::from_pesos(260));
        assert!(order.is_owned_by(&UserId::new("uid-1")));
        assert!(!order.is_owned_by(&UserId::new("uid-2")));
        assert_eq!(order.customer().name.as_deref(), Some("Maria"));
    }

    #[test]
    fn test_transition_rejects_and_keeps_status() {
        let mut order = order();
        let err = order.transition(OrderStatus::Ready).unwrap_err();
        assert_eq!(err.from, OrderStatus::Pending);
        assert_eq!(order.status(), OrderStatus::Pending);

        order.transition(OrderStatus::Confirmed).unwrap();
        order.transition(OrderStatus::Cancelled).unwrap();
        assert!(order.transition(OrderStatus::Preparing).is_err());
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(order()).unwrap();
        assert_eq!(json["orderType"], "pickup");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["customerName"], "Maria");
        assert!(json["orderDate"].is_string());
        assert!(json.get("customerEmail").is_none());
    }
}
