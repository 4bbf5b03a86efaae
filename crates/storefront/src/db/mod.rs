//! Document store for the storefront.
//!
//! Every collection sits behind an async repository trait so handlers and
//! services never see which backend they talk to:
//!
//! - [`PgBackend`] - `PostgreSQL`, used by the server binary and the CLI
//! - [`MemoryBackend`] - in-process maps, used by tests
//!
//! # Tables (schema `storefront`)
//!
//! - `products` - Menu items; variants stored as JSONB
//! - `orders` - Placed orders; line items stored as JSONB snapshots
//! - `addresses` - Saved delivery addresses, at most one default per user
//! - `carts` - Remote cart mirror, one document per signed-in user
//!
//! Writes to any of these fire `pg_notify('collection_changes', <table>)`,
//! which [`PgBackend::spawn_listener`] turns into [`ChangeFeed`] events.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p pasta-haus-cli -- migrate
//! ```

mod addresses;
mod carts;
pub mod changes;
pub mod memory;
mod orders;
mod products;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::{PgListener, PgPoolOptions};
use tokio::task::JoinHandle;

use pasta_haus_core::{
    Address, AddressId, Cart, Order, OrderId, OrderStatus, Product, ProductId, ProductStatus,
    UserId, VariantId,
};

pub use changes::{CHANGE_CHANNEL, ChangeFeed, Collection};
pub use memory::MemoryBackend;

/// Errors that can occur during repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A JSON document column could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data failed validation when loaded.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The backend refused or could not take the write.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The requested record was not found.
    #[error("not found")]
    NotFound,

    /// A conflicting record already exists.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Inclusive creation-date window for order queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// From `from` 00:00:00.000 through `to` 23:59:59.999, both read in `offset`.
    ///
    /// Reversed bounds are swapped.
    #[must_use]
    pub fn days(from: NaiveDate, to: NaiveDate, offset: FixedOffset) -> Self {
        let (from, to) = if from <= to { (from, to) } else { (to, from) };
        let end_of_day =
            NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);

        Self {
            start: local_to_utc(from.and_time(NaiveTime::MIN), offset),
            end: local_to_utc(to.and_time(end_of_day), offset),
        }
    }

    /// The whole local day containing `now`.
    #[must_use]
    pub fn today(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let day = now.with_timezone(&offset).date_naive();
        Self::days(day, day, offset)
    }

    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

fn local_to_utc(local: chrono::NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    // A fixed offset has exactly one mapping for every local time.
    offset
        .from_local_datetime(&local)
        .single()
        .map_or_else(|| local.and_utc(), |dt| dt.with_timezone(&Utc))
}

/// A stored remote cart with its server-assigned timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCart {
    pub cart: Cart,
    pub updated_at: DateTime<Utc>,
}

/// Menu product collection.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// All products ordered by id.
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError>;

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Insert or replace a product document.
    async fn upsert_product(&self, product: &Product) -> Result<(), RepositoryError>;

    /// Set a product's status and return the updated product.
    ///
    /// Returns `RepositoryError::NotFound` for an unknown product.
    async fn set_product_status(
        &self,
        id: &ProductId,
        status: ProductStatus,
    ) -> Result<Product, RepositoryError>;

    /// Set one variant's status and return the updated product.
    ///
    /// Returns `RepositoryError::NotFound` for an unknown product or variant.
    async fn set_variant_status(
        &self,
        id: &ProductId,
        variant_id: &VariantId,
        status: ProductStatus,
    ) -> Result<Product, RepositoryError>;
}

/// Order collection.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist a new order.
    ///
    /// Returns `RepositoryError::Conflict` if the id is already taken.
    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError>;

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Orders placed by `user`, newest first.
    async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>, RepositoryError>;

    /// Every order, optionally limited to a creation-date window, newest first.
    async fn all_orders(&self, range: Option<DateRange>) -> Result<Vec<Order>, RepositoryError>;

    /// Move an order from `from` to `to`. Transition rules are enforced by
    /// the caller; the write only lands if the stored status is still `from`.
    ///
    /// Returns `RepositoryError::NotFound` for an unknown order and
    /// `RepositoryError::Conflict` if the status moved in the meantime.
    async fn update_order_status(
        &self,
        id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<(), RepositoryError>;
}

/// Saved address collection. Every operation is scoped to one user.
#[async_trait]
pub trait AddressRepository: Send + Sync {
    /// Addresses for `user`, default first, then newest first.
    async fn list_addresses(&self, user: &UserId) -> Result<Vec<Address>, RepositoryError>;

    async fn get_address(
        &self,
        user: &UserId,
        id: &AddressId,
    ) -> Result<Option<Address>, RepositoryError>;

    /// Insert a new address as given. Callers use
    /// [`AddressRepository::set_default_address`] to make it the default.
    async fn insert_address(&self, address: &Address) -> Result<(), RepositoryError>;

    /// Overwrite the editable fields of an existing address.
    ///
    /// Returns `RepositoryError::NotFound` if it does not belong to the user.
    async fn update_address(&self, address: &Address) -> Result<(), RepositoryError>;

    /// Delete an address. Returns whether anything was removed.
    async fn delete_address(&self, user: &UserId, id: &AddressId)
    -> Result<bool, RepositoryError>;

    /// Atomically clear every other default for `user` and mark `id` as default.
    ///
    /// Returns `RepositoryError::NotFound` (with nothing changed) if the
    /// address does not belong to the user.
    async fn set_default_address(
        &self,
        user: &UserId,
        id: &AddressId,
    ) -> Result<(), RepositoryError>;
}

/// Remote cart mirror, one document per user.
#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn get_cart(&self, user: &UserId) -> Result<Option<StoredCart>, RepositoryError>;

    /// Replace the user's stored cart, stamping it with the server time.
    async fn put_cart(&self, user: &UserId, cart: &Cart) -> Result<StoredCart, RepositoryError>;
}

/// A complete storage backend.
#[async_trait]
pub trait Backend: ProductRepository + OrderRepository + AddressRepository + CartRepository {
    /// Change notifications for every collection.
    fn changes(&self) -> &ChangeFeed;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// `PostgreSQL` backend.
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
    changes: ChangeFeed,
}

impl PgBackend {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            changes: ChangeFeed::new(),
        }
    }

    /// Forward `collection_changes` notifications into the change feed.
    ///
    /// The listener reconnects on its own; if it cannot, the task logs and
    /// retries after a short pause.
    #[must_use]
    pub fn spawn_listener(&self) -> JoinHandle<()> {
        let pool = self.pool.clone();
        let changes = self.changes.clone();

        tokio::spawn(async move {
            loop {
                let mut listener = match PgListener::connect_with(&pool).await {
                    Ok(listener) => listener,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to open change listener");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };

                if let Err(e) = listener.listen(CHANGE_CHANNEL).await {
                    tracing::error!(error = %e, "Failed to LISTEN on change channel");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
                tracing::info!(channel = CHANGE_CHANNEL, "Listening for collection changes");

                loop {
                    match listener.recv().await {
                        Ok(notification) => match Collection::from_table(notification.payload()) {
                            Some(collection) => changes.notify(collection),
                            None => tracing::warn!(
                                payload = notification.payload(),
                                "Ignoring change for unknown table"
                            ),
                        },
                        Err(e) => {
                            tracing::warn!(error = %e, "Change listener dropped, reconnecting");
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl Backend for PgBackend {
    fn changes(&self) -> &ChangeFeed {
        &self.changes
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Map a unique-violation into `RepositoryError::Conflict`.
fn conflict_or(e: sqlx::Error, what: &str) -> RepositoryError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(format!("{what} already exists"))
        }
        _ => RepositoryError::Database(e),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn manila() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    #[test]
    fn test_today_covers_whole_local_day() {
        // 2024-03-10 01:30 in Manila is still 2024-03-09 in UTC.
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 17, 30, 0).unwrap();
        let range = DateRange::today(now, manila());

        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 3, 9, 16, 0, 0).unwrap());
        assert!(range.contains(now));
        assert!(range.contains(range.end));
        assert!(!range.contains(range.end + chrono::Duration::milliseconds(1)));
        assert_eq!((range.end - range.start).num_milliseconds(), 86_399_999);
    }

    #[test]
    fn test_days_swaps_reversed_bounds() {
        let a = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let offset = FixedOffset::east_opt(0).unwrap();
        assert_eq!(DateRange::days(b, a, offset), DateRange::days(a, b, offset));
    }
}
