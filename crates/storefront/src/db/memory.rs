//! In-process backend.
//!
//! Keeps every collection in maps behind a single lock and publishes to the
//! change feed after each write, the same way the database triggers do.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use pasta_haus_core::{
    Address, AddressId, Cart, Order, OrderId, OrderStatus, Product, ProductId, ProductStatus,
    UserId, VariantId,
};

use super::{
    AddressRepository, Backend, CartRepository, ChangeFeed, Collection, DateRange,
    OrderRepository, ProductRepository, RepositoryError, StoredCart,
};

#[derive(Default)]
struct Collections {
    products: BTreeMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    addresses: Vec<Address>,
    carts: HashMap<UserId, StoredCart>,
}

/// Backend holding everything in memory.
#[derive(Default)]
pub struct MemoryBackend {
    data: RwLock<Collections>,
    changes: ChangeFeed,
    fail_writes: AtomicBool,
    read_delay_ms: AtomicU64,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the given products.
    #[must_use]
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let collections = Collections {
            products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
            ..Collections::default()
        };
        Self {
            data: RwLock::new(collections),
            ..Self::default()
        }
    }

    /// Make every subsequent write fail with `RepositoryError::Unavailable`
    /// until switched off again. Reads keep working.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make product listings take at least `delay`.
    pub fn delay_reads(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.read_delay_ms.store(millis, Ordering::SeqCst);
    }

    async fn read_delay(&self) {
        let millis = self.read_delay_ms.load(Ordering::SeqCst);
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }

    fn check_writable(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(RepositoryError::Unavailable("writes disabled".to_owned()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProductRepository for MemoryBackend {
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        self.read_delay().await;
        Ok(self.data.read().await.products.values().cloned().collect())
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.data.read().await.products.get(id).cloned())
    }

    async fn upsert_product(&self, product: &Product) -> Result<(), RepositoryError> {
        self.check_writable()?;
        self.data
            .write()
            .await
            .products
            .insert(product.id.clone(), product.clone());
        self.changes.notify(Collection::Products);
        Ok(())
    }

    async fn set_product_status(
        &self,
        id: &ProductId,
        status: ProductStatus,
    ) -> Result<Product, RepositoryError> {
        self.check_writable()?;
        let updated = {
            let mut data = self.data.write().await;
            let product = data
                .products
                .get_mut(id)
                .ok_or(RepositoryError::NotFound)?;
            product.status = Some(status);
            product.clone()
        };
        self.changes.notify(Collection::Products);
        Ok(updated)
    }

    async fn set_variant_status(
        &self,
        id: &ProductId,
        variant_id: &VariantId,
        status: ProductStatus,
    ) -> Result<Product, RepositoryError> {
        self.check_writable()?;
        let updated = {
            let mut data = self.data.write().await;
            let product = data
                .products
                .get_mut(id)
                .ok_or(RepositoryError::NotFound)?;
            product
                .variant_mut(variant_id)
                .ok_or(RepositoryError::NotFound)?
                .status = Some(status);
            product.clone()
        };
        self.changes.notify(Collection::Products);
        Ok(updated)
    }
}

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        b.order_date()
            .cmp(&a.order_date())
            .then_with(|| b.id().cmp(a.id()))
    });
}

#[async_trait]
impl OrderRepository for MemoryBackend {
    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError> {
        self.check_writable()?;
        {
            let mut data = self.data.write().await;
            if data.orders.contains_key(order.id()) {
                return Err(RepositoryError::Conflict(format!(
                    "order {} already exists",
                    order.id()
                )));
            }
            data.orders.insert(order.id().clone(), order.clone());
        }
        self.changes.notify(Collection::Orders);
        Ok(())
    }

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.data.read().await.orders.get(id).cloned())
    }

    async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .data
            .read()
            .await
            .orders
            .values()
            .filter(|order| order.is_owned_by(user))
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn all_orders(&self, range: Option<DateRange>) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .data
            .read()
            .await
            .orders
            .values()
            .filter(|order| range.is_none_or(|r| r.contains(order.order_date())))
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<(), RepositoryError> {
        self.check_writable()?;
        {
            let mut data = self.data.write().await;
            let order = data.orders.get_mut(id).ok_or(RepositoryError::NotFound)?;
            if order.status() != from {
                return Err(RepositoryError::Conflict(format!(
                    "order {id} is no longer {from}"
                )));
            }
            *order = with_status(order, to);
        }
        self.changes.notify(Collection::Orders);
        Ok(())
    }
}

fn with_status(order: &Order, status: OrderStatus) -> Order {
    Order::from_record(pasta_haus_core::OrderRecord {
        id: order.id().clone(),
        items: order.items().to_vec(),
        total_amount: order.total_amount(),
        customer: order.customer(),
        order_type: order.order_type(),
        order_date: order.order_date(),
        status,
        user_id: order.user_id().cloned(),
    })
}

#[async_trait]
impl AddressRepository for MemoryBackend {
    async fn list_addresses(&self, user: &UserId) -> Result<Vec<Address>, RepositoryError> {
        let mut addresses: Vec<Address> = self
            .data
            .read()
            .await
            .addresses
            .iter()
            .filter(|a| &a.user_id == user)
            .cloned()
            .collect();
        addresses.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(addresses)
    }

    async fn get_address(
        &self,
        user: &UserId,
        id: &AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        Ok(self
            .data
            .read()
            .await
            .addresses
            .iter()
            .find(|a| &a.user_id == user && &a.id == id)
            .cloned())
    }

    async fn insert_address(&self, address: &Address) -> Result<(), RepositoryError> {
        self.check_writable()?;
        {
            let mut data = self.data.write().await;
            if data.addresses.iter().any(|a| a.id == address.id) {
                return Err(RepositoryError::Conflict(format!(
                    "address {} already exists",
                    address.id
                )));
            }
            data.addresses.push(address.clone());
        }
        self.changes.notify(Collection::Addresses);
        Ok(())
    }

    async fn update_address(&self, address: &Address) -> Result<(), RepositoryError> {
        self.check_writable()?;
        {
            let mut data = self.data.write().await;
            let existing = data
                .addresses
                .iter_mut()
                .find(|a| a.user_id == address.user_id && a.id == address.id)
                .ok_or(RepositoryError::NotFound)?;
            let is_default = existing.is_default;
            *existing = address.clone();
            existing.is_default = is_default;
        }
        self.changes.notify(Collection::Addresses);
        Ok(())
    }

    async fn delete_address(
        &self,
        user: &UserId,
        id: &AddressId,
    ) -> Result<bool, RepositoryError> {
        self.check_writable()?;
        let removed = {
            let mut data = self.data.write().await;
            let before = data.addresses.len();
            data.addresses.retain(|a| !(&a.user_id == user && &a.id == id));
            data.addresses.len() != before
        };
        if removed {
            self.changes.notify(Collection::Addresses);
        }
        Ok(removed)
    }

    async fn set_default_address(
        &self,
        user: &UserId,
        id: &AddressId,
    ) -> Result<(), RepositoryError> {
        self.check_writable()?;
        {
            let mut data = self.data.write().await;
            if !data
                .addresses
                .iter()
                .any(|a| &a.user_id == user && &a.id == id)
            {
                return Err(RepositoryError::NotFound);
            }

            let now = Utc::now();
            for address in data.addresses.iter_mut().filter(|a| &a.user_id == user) {
                let is_target = &address.id == id;
                if address.is_default != is_target {
                    address.is_default = is_target;
                    address.updated_at = now;
                }
            }
        }
        self.changes.notify(Collection::Addresses);
        Ok(())
    }
}

#[async_trait]
impl CartRepository for MemoryBackend {
    async fn get_cart(&self, user: &UserId) -> Result<Option<StoredCart>, RepositoryError> {
        Ok(self.data.read().await.carts.get(user).cloned())
    }

    async fn put_cart(&self, user: &UserId, cart: &Cart) -> Result<StoredCart, RepositoryError> {
        self.check_writable()?;
        let stored = StoredCart {
            cart: cart.clone(),
            updated_at: Utc::now(),
        };
        self.data
            .write()
            .await
            .carts
            .insert(user.clone(), stored.clone());
        self.changes.notify(Collection::Carts);
        Ok(stored)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn changes(&self) -> &ChangeFeed {
        &self.changes
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use pasta_haus_core::AddressFields;

    use super::*;

    fn address(id: &str, user: &str, minutes_ago: i64) -> Address {
        Address::new(
            AddressId::new(id),
            UserId::new(user),
            AddressFields {
                street: "12 Mabini St".to_owned(),
                city: "Lipa".to_owned(),
                province: "Batangas".to_owned(),
                country: "Philippines".to_owned(),
                ..AddressFields::default()
            },
            Utc::now() - Duration::minutes(minutes_ago),
        )
    }

    #[tokio::test]
    async fn test_set_default_keeps_single_default_per_user() {
        let backend = MemoryBackend::new();
        let alice = UserId::new("alice");
        for (id, user, age) in [("a1", "alice", 3), ("a2", "alice", 2), ("b1", "bob", 1)] {
            backend.insert_address(&address(id, user, age)).await.unwrap();
        }
        backend
            .set_default_address(&UserId::new("bob"), &AddressId::new("b1"))
            .await
            .unwrap();

        backend.set_default_address(&alice, &AddressId::new("a1")).await.unwrap();
        backend.set_default_address(&alice, &AddressId::new("a2")).await.unwrap();

        let listed = backend.list_addresses(&alice).await.unwrap();
        let defaults: Vec<_> = listed.iter().filter(|a| a.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(listed[0].id.as_str(), "a2");

        // Another user's default is untouched.
        let bob = backend.list_addresses(&UserId::new("bob")).await.unwrap();
        assert!(bob[0].is_default);
    }

    #[tokio::test]
    async fn test_set_default_on_foreign_address_changes_nothing() {
        let backend = MemoryBackend::new();
        backend.insert_address(&address("a1", "alice", 1)).await.unwrap();
        backend
            .set_default_address(&UserId::new("alice"), &AddressId::new("a1"))
            .await
            .unwrap();

        let err = backend
            .set_default_address(&UserId::new("mallory"), &AddressId::new("a1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));

        let listed = backend.list_addresses(&UserId::new("alice")).await.unwrap();
        assert!(listed[0].is_default);
    }

    #[tokio::test]
    async fn test_failed_writes_leave_state_and_feed_alone() {
        let backend = MemoryBackend::new();
        let mut rx = backend.changes().subscribe();
        backend.fail_writes(true);

        let err = backend
            .put_cart(&UserId::new("alice"), &Cart::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Unavailable(_)));
        assert!(backend.get_cart(&UserId::new("alice")).await.unwrap().is_none());
        assert!(rx.try_recv().is_err());

        backend.fail_writes(false);
        backend.put_cart(&UserId::new("alice"), &Cart::new()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), Collection::Carts);
    }
}
