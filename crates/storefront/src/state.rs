//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::db::Backend;
use crate::services::{
    AddressService, AdminGate, CheckoutService, GoogleClient, OrderService, ProductCatalog,
};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the backing store, the services built on it and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: Arc<dyn Backend>,
    catalog: ProductCatalog,
    google: GoogleClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `backend` - Document store (Postgres in production, memory in tests)
    #[must_use]
    pub fn new(config: StorefrontConfig, backend: Arc<dyn Backend>) -> Self {
        let catalog = ProductCatalog::new(
            Arc::clone(&backend),
            config.catalog_cache_ttl,
            config.best_seller_timeout,
        );
        let google = GoogleClient::new(&config.google);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                catalog,
                google,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Shared handle to the backing store.
    #[must_use]
    pub fn backend(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.inner.backend)
    }

    /// Get a reference to the cached product catalog.
    #[must_use]
    pub fn catalog(&self) -> &ProductCatalog {
        &self.inner.catalog
    }

    /// Get a reference to the Google OAuth client.
    #[must_use]
    pub fn google(&self) -> &GoogleClient {
        &self.inner.google
    }

    #[must_use]
    pub fn orders(&self) -> OrderService {
        OrderService::new(self.backend())
    }

    #[must_use]
    pub fn addresses(&self) -> AddressService {
        AddressService::new(self.backend())
    }

    #[must_use]
    pub fn checkout(&self) -> CheckoutService {
        CheckoutService::new(self.backend())
    }

    #[must_use]
    pub fn admin_gate(&self) -> AdminGate<'_> {
        AdminGate::new(&self.inner.config.admin_password_hash)
    }
}
