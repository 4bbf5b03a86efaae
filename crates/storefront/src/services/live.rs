//! Live queries: a current snapshot, then a fresh one after every change.
//!
//! A [`LiveQuery`] subscribes to the [`ChangeFeed`] before its first read, so
//! a write landing between the initial snapshot and the first wait is never
//! missed. Dropping the query (or calling [`LiveQuery::close`]) unsubscribes.

use std::future::Future;

use futures::future::BoxFuture;
use futures::{FutureExt, Stream};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::db::{ChangeFeed, Collection, RepositoryError};

type Fetch<T> = Box<dyn Fn() -> BoxFuture<'static, Result<Vec<T>, RepositoryError>> + Send + Sync>;

/// A subscription to one query over one collection.
pub struct LiveQuery<T> {
    collection: Collection,
    changes: broadcast::Receiver<Collection>,
    fetch: Fetch<T>,
    primed: bool,
}

impl<T: Send + 'static> LiveQuery<T> {
    /// Watch `collection`, re-running `fetch` after each change to it.
    pub fn new<F, Fut>(feed: &ChangeFeed, collection: Collection, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>, RepositoryError>> + Send + 'static,
    {
        Self {
            collection,
            changes: feed.subscribe(),
            fetch: Box::new(move || fetch().boxed()),
            primed: false,
        }
    }

    /// The next snapshot.
    ///
    /// The first call returns the current state immediately; later calls wait
    /// for a change to the watched collection. Returns `None` once the feed
    /// is gone.
    pub async fn next(&mut self) -> Option<Result<Vec<T>, RepositoryError>> {
        if !self.primed {
            self.primed = true;
            return Some((self.fetch)().await);
        }

        loop {
            match self.changes.recv().await {
                Ok(changed) if changed == self.collection => break,
                Ok(_) => {}
                // Missed events; the re-read below catches up.
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, collection = %self.collection, "Live query lagged");
                    break;
                }
                Err(RecvError::Closed) => return None,
            }
        }

        // Collapse a burst of writes into a single re-read.
        while self.changes.try_recv().is_ok() {}

        Some((self.fetch)().await)
    }

    /// One-shot read without waiting for changes.
    pub async fn first(self) -> Result<Vec<T>, RepositoryError> {
        (self.fetch)().await
    }

    /// Stop listening. Equivalent to dropping the query.
    pub fn close(self) {}

    /// Snapshots as a stream, for server-sent events.
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<T>, RepositoryError>> + Send {
        futures::stream::unfold(self, |mut query| async move {
            query.next().await.map(|snapshot| (snapshot, query))
        })
    }
}
