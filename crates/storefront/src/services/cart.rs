//! Cart operations.
//!
//! [`LocalCart`] is the visitor's cart as kept in their session. It never
//! fails: unreadable data is treated as an empty cart and write failures are
//! logged. [`ShoppingCart`] is what handlers use; it applies a change locally
//! and then mirrors the result to the remote store for signed-in customers.

use std::sync::Arc;

use tower_sessions::Session;

use pasta_haus_core::{Cart, CartItem, Price, Product, UserId, Variant};

use super::cart_mirror::CartMirror;
use crate::db::Backend;
use crate::models::session_keys;

/// The session-stored cart.
#[derive(Clone, Copy)]
pub struct LocalCart<'a> {
    session: &'a Session,
}

impl<'a> LocalCart<'a> {
    #[must_use]
    pub const fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Current cart; empty when absent or unreadable.
    pub async fn load(&self) -> Cart {
        match self.session.get::<Cart>(session_keys::CART).await {
            Ok(cart) => cart.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable session cart");
                Cart::new()
            }
        }
    }

    /// Overwrite the stored cart.
    pub async fn save(&self, cart: &Cart) {
        let result = if cart.is_empty() {
            self.session
                .remove_value(session_keys::CART)
                .await
                .map(|_| ())
        } else {
            self.session.insert(session_keys::CART, cart).await
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to store session cart");
        }
    }

    pub async fn list(&self) -> Vec<CartItem> {
        self.load().await.into_items()
    }

    pub async fn add(
        &self,
        product: Product,
        quantity: u32,
        special_instructions: Option<&str>,
        variant: Option<Variant>,
    ) -> Cart {
        let mut cart = self.load().await;
        cart.add(product, quantity, special_instructions, variant);
        self.save(&cart).await;
        cart
    }

    pub async fn remove(&self, index: usize) -> Cart {
        let mut cart = self.load().await;
        if cart.remove(index).is_some() {
            self.save(&cart).await;
        }
        cart
    }

    pub async fn set_quantity(&self, index: usize, quantity: i64) -> Cart {
        let mut cart = self.load().await;
        if cart.set_quantity(index, quantity) {
            self.save(&cart).await;
        }
        cart
    }

    pub async fn clear(&self) {
        self.save(&Cart::new()).await;
    }

    /// Sum of quantities.
    pub async fn count(&self) -> u64 {
        self.load().await.count()
    }

    pub async fn total(&self) -> Price {
        self.load().await.total()
    }
}

/// Cart facade used by handlers.
pub struct ShoppingCart<'a> {
    local: LocalCart<'a>,
    mirror: CartMirror,
    user: Option<&'a UserId>,
}

impl<'a> ShoppingCart<'a> {
    /// `user` is the signed-in customer, if any; only their carts are mirrored.
    #[must_use]
    pub fn new(session: &'a Session, backend: Arc<dyn Backend>, user: Option<&'a UserId>) -> Self {
        Self {
            local: LocalCart::new(session),
            mirror: CartMirror::new(backend),
            user,
        }
    }

    #[must_use]
    pub const fn local(&self) -> LocalCart<'a> {
        self.local
    }

    pub async fn cart(&self) -> Cart {
        self.local.load().await
    }

    pub async fn add(
        &self,
        product: Product,
        quantity: u32,
        special_instructions: Option<&str>,
        variant: Option<Variant>,
    ) -> Cart {
        let cart = self
            .local
            .add(product, quantity, special_instructions, variant)
            .await;
        self.sync(&cart).await;
        cart
    }

    pub async fn remove(&self, index: usize) -> Cart {
        let cart = self.local.remove(index).await;
        self.sync(&cart).await;
        cart
    }

    pub async fn set_quantity(&self, index: usize, quantity: i64) -> Cart {
        let cart = self.local.set_quantity(index, quantity).await;
        self.sync(&cart).await;
        cart
    }

    pub async fn clear(&self) {
        self.local.clear().await;
        self.sync(&Cart::new()).await;
    }

    async fn sync(&self, cart: &Cart) {
        if let Some(user) = self.user {
            self.mirror.push(user, cart).await;
        }
    }
}
