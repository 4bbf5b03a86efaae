//! Integration tests for Pasta Haus.
//!
//! Each test spawns the full storefront router on a random local port, backed
//! by the in-memory document store and session store, and talks to it over
//! HTTP with `reqwest`. No database or Google credentials are needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p pasta-haus-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `menu` - Product listing, detail and best sellers
//! - `cart_checkout` - Session cart and order placement
//! - `addresses` - Address book for signed-in customers
//! - `admin` - Admin gate, order board and availability switches

#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_sessions::{MemoryStore, Session};

use pasta_haus_core::{Category, Price, Product, ProductId, UserId, Variant, VariantId};
use pasta_haus_storefront::config::StorefrontConfig;
use pasta_haus_storefront::db::MemoryBackend;
use pasta_haus_storefront::middleware::SESSION_COOKIE_NAME;
use pasta_haus_storefront::models::{CurrentUser, session_keys};
use pasta_haus_storefront::services::admin::hash_password;
use pasta_haus_storefront::{AppState, app};

/// Admin password configured for every test server.
pub const ADMIN_PASSWORD: &str = "lasagna-on-sundays";

/// A running storefront.
pub struct TestApp {
    pub base_url: String,
    pub backend: Arc<MemoryBackend>,
    store: MemoryStore,
    server: JoinHandle<()>,
    catalog_invalidator: JoinHandle<()>,
}

impl TestApp {
    /// Start a storefront serving the launch menu.
    pub async fn spawn() -> Self {
        Self::with_products(launch_menu()).await
    }

    pub async fn with_products(products: Vec<Product>) -> Self {
        Self::start(products, |_| {}).await
    }

    /// Start a storefront that trusts proxy IP headers, as it would behind
    /// a load balancer.
    pub async fn behind_proxy() -> Self {
        Self::start(launch_menu(), |config| config.trust_proxy_headers = true).await
    }

    async fn start(products: Vec<Product>, configure: impl FnOnce(&mut StorefrontConfig)) -> Self {
        let hash = hash_password(ADMIN_PASSWORD).expect("Failed to hash admin password");
        let backend = Arc::new(MemoryBackend::with_products(products));
        let mut config = StorefrontConfig::for_tests(&hash);
        configure(&mut config);
        let state = AppState::new(config, backend.clone());
        let catalog_invalidator = state.catalog().spawn_invalidator();
        let store = MemoryStore::default();
        let router = app(state, store.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");
        let server = tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .ok();
        });

        Self {
            base_url: format!("http://{addr}"),
            backend,
            store,
            server,
            catalog_invalidator,
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// A browser-like client that keeps its session cookie.
    #[must_use]
    pub fn guest(&self) -> Client {
        Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client")
    }

    /// A client whose session already holds `user` as the signed-in customer.
    pub async fn signed_in(&self, user: &CurrentUser) -> Client {
        let session = Session::new(None, Arc::new(self.store.clone()), None);
        session
            .insert(session_keys::CURRENT_USER, user)
            .await
            .expect("Failed to write session");
        session.save().await.expect("Failed to save session");
        let id = session.id().expect("Saved session has an id");

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{SESSION_COOKIE_NAME}={id}"))
                .expect("Session id is a valid header value"),
        );
        Client::builder()
            .default_headers(headers)
            .build()
            .expect("Failed to create HTTP client")
    }

    /// A client that has passed the admin gate.
    pub async fn admin(&self) -> Client {
        let client = self.guest();
        let resp = self.admin_login(&client, ADMIN_PASSWORD).await;
        assert_eq!(resp.status(), 200, "admin login failed");
        client
    }

    /// Post an admin login straight from the test client.
    pub async fn admin_login(&self, client: &Client, password: &str) -> reqwest::Response {
        client
            .post(self.url("/admin/login"))
            .json(&serde_json::json!({ "password": password }))
            .send()
            .await
            .expect("Failed to send admin login")
    }

    /// Post an admin login claiming to be forwarded for `client_ip`.
    pub async fn admin_login_forwarded(
        &self,
        client: &Client,
        password: &str,
        client_ip: &str,
    ) -> reqwest::Response {
        client
            .post(self.url("/admin/login"))
            .header("x-forwarded-for", client_ip)
            .json(&serde_json::json!({ "password": password }))
            .send()
            .await
            .expect("Failed to send admin login")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.server.abort();
        self.catalog_invalidator.abort();
    }
}

/// A customer with a Google profile.
#[must_use]
pub fn customer(sub: &str, name: &str) -> CurrentUser {
    CurrentUser {
        uid: UserId::new(sub),
        display_name: Some(name.to_owned()),
        email: Some(format!("{}@example.com", name.to_lowercase())),
    }
}

/// Read a JSON body.
pub async fn json(resp: reqwest::Response) -> Value {
    resp.json().await.expect("Response body is not JSON")
}

/// Read the first server-sent event from a live endpoint as `(event, data)`.
pub async fn first_event(mut resp: reqwest::Response) -> (String, Value) {
    let mut buffer = String::new();

    let read = async {
        while !buffer.contains("\n\n") {
            let chunk = resp
                .chunk()
                .await
                .expect("Event stream failed")
                .expect("Event stream ended early");
            buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    };
    tokio::time::timeout(Duration::from_secs(5), read)
        .await
        .expect("Timed out waiting for an event");

    let mut event = String::new();
    let mut data = String::new();
    for line in buffer.lines().take_while(|line| !line.is_empty()) {
        if let Some(name) = line.strip_prefix("event:") {
            event = name.trim().to_owned();
        } else if let Some(payload) = line.strip_prefix("data:") {
            data.push_str(payload.trim_start());
        }
    }
    (
        event,
        serde_json::from_str(&data).expect("Event data is not JSON"),
    )
}

/// The four launch products. Lasagna comes in three tray sizes.
#[must_use]
pub fn launch_menu() -> Vec<Product> {
    let size = |id: &str, label: &str, pesos: i64| Variant {
        id: VariantId::new(id),
        label: label.to_owned(),
        price: Price::from_pesos(pesos),
        servings: None,
        dimensions: None,
        status: None,
    };
    let item = |id: &str, name: &str, category: Category, pesos: i64| Product {
        id: ProductId::new(id),
        name: name.to_owned(),
        category,
        description: String::new(),
        price: Price::from_pesos(pesos),
        image: format!("images/{id}.jpg"),
        ingredients: Vec::new(),
        is_best_seller: true,
        variants: Vec::new(),
        status: None,
    };

    let mut lasagna = item("1", "Lasagna", Category::Pasta, 180);
    lasagna.variants = vec![
        size("small", "Small", 180),
        size("medium", "Medium", 399),
        size("large", "Large", 799),
    ];
    let mut muffins = item("3", "Choco Banana Muffins", Category::Pastry, 130);
    muffins.is_best_seller = false;

    vec![
        lasagna,
        item("2", "Cheesy Baked Mac", Category::Pasta, 140),
        muffins,
        item("4", "Carrot Muffins", Category::Pastry, 260),
    ]
}
