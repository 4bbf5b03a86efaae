//! In-process fan-out of collection change events.

use std::fmt;

use tokio::sync::broadcast;

/// `LISTEN`/`NOTIFY` channel the database triggers publish on.
pub const CHANGE_CHANNEL: &str = "collection_changes";

const FEED_CAPACITY: usize = 256;

/// A watched collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Products,
    Orders,
    Addresses,
    Carts,
}

impl Collection {
    /// Table name, also used as the notification payload.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Orders => "orders",
            Self::Addresses => "addresses",
            Self::Carts => "carts",
        }
    }

    #[must_use]
    pub fn from_table(table: &str) -> Option<Self> {
        match table {
            "products" => Some(Self::Products),
            "orders" => Some(Self::Orders),
            "addresses" => Some(Self::Addresses),
            "carts" => Some(Self::Carts),
            _ => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Broadcasts "this collection changed" to every live query.
///
/// Events carry no payload; subscribers re-read what they watch.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Collection>,
}

impl ChangeFeed {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Publish a change. Having no subscribers is fine.
    pub fn notify(&self, collection: Collection) {
        let _ = self.tx.send(collection);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Collection> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
