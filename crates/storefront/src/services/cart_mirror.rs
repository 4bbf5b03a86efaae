//! Remote cart mirror for signed-in customers.
//!
//! Every local cart change is pushed to the user's stored cart, last write
//! wins. On sign-in the stored cart and the guest cart are merged once per
//! session and user. Remote failures never reach the customer: the local
//! cart stays authoritative and the error is logged.

use std::sync::Arc;

use tower_sessions::Session;

use pasta_haus_core::{Cart, UserId};

use super::cart::LocalCart;
use crate::db::Backend;
use crate::models::session_keys;

/// Pushes carts to, and merges carts from, the remote store.
#[derive(Clone)]
pub struct CartMirror {
    backend: Arc<dyn Backend>,
}

impl CartMirror {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Overwrite the user's stored cart with `cart`.
    pub async fn push(&self, user: &UserId, cart: &Cart) {
        match self.backend.put_cart(user, cart).await {
            Ok(stored) => tracing::debug!(
                user_id = %user,
                lines = cart.len(),
                updated_at = %stored.updated_at,
                "Mirrored cart"
            ),
            Err(e) => tracing::warn!(user_id = %user, error = %e, "Failed to mirror cart"),
        }
    }

    /// Reconcile the session cart with the user's stored cart.
    ///
    /// - empty local cart: the stored cart is adopted
    /// - empty stored cart: the local cart is uploaded
    /// - both non-empty: lines with the same key add up, the result is
    ///   written to both sides
    ///
    /// Runs at most once per session for a given user; repeat calls return the
    /// current local cart untouched. If the stored cart cannot be read the
    /// local cart is kept and a later sign-in event may try again.
    pub async fn merge_on_sign_in(&self, session: &Session, user: &UserId) -> Cart {
        let local = LocalCart::new(session);

        // Claim the merge before any await on the store.
        if !claim_merge(session, user).await {
            return local.load().await;
        }

        let guest_cart = local.load().await;
        let stored = match self.backend.get_cart(user).await {
            Ok(stored) => stored.map(|s| s.cart).unwrap_or_default(),
            Err(e) => {
                tracing::warn!(user_id = %user, error = %e, "Failed to load remote cart; keeping local cart");
                release_merge(session).await;
                return guest_cart;
            }
        };

        let merged = if guest_cart.is_empty() {
            stored
        } else if stored.is_empty() {
            self.push(user, &guest_cart).await;
            guest_cart
        } else {
            let merged = Cart::merge(stored, guest_cart);
            self.push(user, &merged).await;
            merged
        };

        local.save(&merged).await;
        tracing::info!(user_id = %user, count = merged.count(), "Cart merged on sign-in");
        merged
    }

    /// Forget the merge guard so the next sign-in merges again.
    pub async fn on_sign_out(&self, session: &Session) {
        release_merge(session).await;
    }
}

async fn claim_merge(session: &Session, user: &UserId) -> bool {
    let already = session
        .get::<UserId>(session_keys::CART_MERGED_FOR)
        .await
        .ok()
        .flatten();
    if already.as_ref() == Some(user) {
        return false;
    }

    if let Err(e) = session.insert(session_keys::CART_MERGED_FOR, user).await {
        tracing::warn!(error = %e, "Failed to record cart merge");
    }
    true
}

async fn release_merge(session: &Session) {
    if let Err(e) = session.remove_value(session_keys::CART_MERGED_FOR).await {
        tracing::warn!(error = %e, "Failed to clear cart merge marker");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::{CartRepository, MemoryBackend};
    use crate::services::cart::tests::{product, session};

    fn cart_of(lines: &[(&str, u32)]) -> Cart {
        let mut cart = Cart::new();
        for (id, quantity) in lines {
            cart.add(product(id, 100), *quantity, None, None);
        }
        cart
    }

    fn quantities(cart: &Cart) -> Vec<(String, u32)> {
        cart.items()
            .iter()
            .map(|i| (i.product.id.as_str().to_owned(), i.quantity))
            .collect()
    }

    #[tokio::test]
    async fn test_merge_sums_and_writes_both_sides() {
        let session = session();
        let backend = Arc::new(MemoryBackend::new());
        let user = UserId::new("uid-1");
        backend.put_cart(&user, &cart_of(&[("A", 2), ("B", 1)])).await.unwrap();
        LocalCart::new(&session).save(&cart_of(&[("A", 1)])).await;

        let mirror = CartMirror::new(backend.clone());
        let merged = mirror.merge_on_sign_in(&session, &user).await;

        let expected = vec![("A".to_owned(), 3), ("B".to_owned(), 1)];
        assert_eq!(quantities(&merged), expected);
        assert_eq!(quantities(&LocalCart::new(&session).load().await), expected);
        let remote = backend.get_cart(&user).await.unwrap().unwrap();
        assert_eq!(quantities(&remote.cart), expected);
    }

    #[tokio::test]
    async fn test_merge_runs_once_per_user_per_session() {
        let session = session();
        let backend = Arc::new(MemoryBackend::new());
        let user = UserId::new("uid-1");
        backend.put_cart(&user, &cart_of(&[("A", 2)])).await.unwrap();
        LocalCart::new(&session).save(&cart_of(&[("A", 1)])).await;

        let mirror = CartMirror::new(backend.clone());
        mirror.merge_on_sign_in(&session, &user).await;
        let again = mirror.merge_on_sign_in(&session, &user).await;

        assert_eq!(quantities(&again), vec![("A".to_owned(), 3)]);
        let remote = backend.get_cart(&user).await.unwrap().unwrap();
        assert_eq!(remote.cart.count(), 3);
    }

    #[tokio::test]
    async fn test_empty_local_adopts_remote() {
        let session = session();
        let backend = Arc::new(MemoryBackend::new());
        let user = UserId::new("uid-1");
        backend.put_cart(&user, &cart_of(&[("B", 4)])).await.unwrap();

        let merged = CartMirror::new(backend)
            .merge_on_sign_in(&session, &user)
            .await;
        assert_eq!(quantities(&merged), vec![("B".to_owned(), 4)]);
        assert_eq!(LocalCart::new(&session).count().await, 4);
    }

    #[tokio::test]
    async fn test_empty_remote_receives_local() {
        let session = session();
        let backend = Arc::new(MemoryBackend::new());
        let user = UserId::new("uid-1");
        LocalCart::new(&session).save(&cart_of(&[("A", 2)])).await;

        CartMirror::new(backend.clone())
            .merge_on_sign_in(&session, &user)
            .await;
        let remote = backend.get_cart(&user).await.unwrap().unwrap();
        assert_eq!(quantities(&remote.cart), vec![("A".to_owned(), 2)]);
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_local_cart() {
        let session = session();
        let backend = Arc::new(MemoryBackend::new());
        let user = UserId::new("uid-1");
        backend.put_cart(&user, &cart_of(&[("B", 1)])).await.unwrap();
        LocalCart::new(&session).save(&cart_of(&[("A", 1)])).await;
        backend.fail_writes(true);

        let merged = CartMirror::new(backend.clone())
            .merge_on_sign_in(&session, &user)
            .await;

        // The merge itself succeeds locally; only the upload is lost.
        assert_eq!(merged.count(), 2);
        assert_eq!(LocalCart::new(&session).count().await, 2);
        let remote = backend.get_cart(&user).await.unwrap().unwrap();
        assert_eq!(remote.cart.count(), 1);
    }

    #[tokio::test]
    async fn test_sign_out_allows_merge_for_next_user() {
        let session = session();
        let backend = Arc::new(MemoryBackend::new());
        let first = UserId::new("uid-1");
        let second = UserId::new("uid-2");
        backend.put_cart(&second, &cart_of(&[("C", 1)])).await.unwrap();

        let mirror = CartMirror::new(backend);
        mirror.merge_on_sign_in(&session, &first).await;
        mirror.on_sign_out(&session).await;
        let merged = mirror.merge_on_sign_in(&session, &second).await;

        assert_eq!(quantities(&merged), vec![("C".to_owned(), 1)]);
    }
}
