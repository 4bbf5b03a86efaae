//! HTTP route handlers for storefront.
//!
//! Every route speaks JSON; live views are server-sent events whose `data`
//! is the full current snapshot.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health, /health/ready           - Liveness / readiness
//!
//! # Menu
//! GET  /api/products[?category=]        - Product listing
//! GET  /api/products/best-sellers       - Best sellers (never fails)
//! GET  /api/products/{id}               - Product detail
//!
//! # Cart (session)
//! GET|DELETE /api/cart                  - Show / clear
//! GET  /api/cart/count                  - Item count
//! POST /api/cart/items                  - Add a line
//! PATCH|DELETE /api/cart/items/{index}  - Set quantity / remove a line
//! POST /api/checkout                    - Place an order
//!
//! # Customer (requires sign-in)
//! GET  /api/orders, /api/orders/{id}, /api/orders/live
//! GET|POST /api/addresses, GET /api/addresses/default, GET /api/addresses/live
//! PUT|DELETE /api/addresses/{id}, POST /api/addresses/{id}/default
//!
//! # Google sign-in
//! GET  /auth/login, /auth/callback, /auth/me   POST /auth/logout
//!
//! # Admin (requires admin session)
//! POST /admin/login, /admin/logout      GET /admin/session
//! GET  /admin/orders, /admin/orders/live
//! POST /admin/orders/{id}/status|advance|cancel
//! GET  /admin/products, /admin/products/live
//! PUT  /admin/products/{id}/status, /admin/products/{id}/variants/{variant_id}/status
//! ```

pub mod addresses;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod health;
pub mod orders;
pub mod products;

use std::convert::Infallible;

use axum::{
    Router,
    middleware::from_fn,
    response::{
        Sse,
        sse::{Event, KeepAlive},
    },
    routing::{get, patch, post, put},
};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;

use crate::config::StorefrontConfig;
use crate::middleware::{admin_login_rate_limiter, create_session_layer, request_id_middleware};
use crate::services::LiveQuery;
use crate::state::AppState;

/// Create the menu routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/best-sellers", get(products::best_sellers))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/count", get(cart::count))
        .route("/items", post(cart::add))
        .route("/items/{index}", patch(cart::update).delete(cart::remove))
}

/// Create the customer order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/live", get(orders::live))
        .route("/{id}", get(orders::show))
}

/// Create the address book routes router.
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(addresses::index).post(addresses::create))
        .route("/default", get(addresses::default_address))
        .route("/live", get(addresses::live))
        .route("/{id}", put(addresses::update).delete(addresses::delete))
        .route("/{id}/default", post(addresses::set_default))
}

/// Create the Google sign-in routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login))
        .route("/callback", get(auth::callback))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the admin dashboard routes router.
pub fn admin_routes(config: &StorefrontConfig) -> Router<AppState> {
    let login = Router::new()
        .route("/login", post(admin::login))
        .layer(admin_login_rate_limiter(config.trust_proxy_headers));

    Router::new()
        .merge(login)
        .route("/logout", post(admin::logout))
        .route("/session", get(admin::session))
        .route("/orders", get(admin::orders))
        .route("/orders/live", get(admin::orders_live))
        .route("/orders/{id}/status", post(admin::set_order_status))
        .route("/orders/{id}/advance", post(admin::advance_order))
        .route("/orders/{id}/cancel", post(admin::cancel_order))
        .route("/products", get(admin::products))
        .route("/products/live", get(admin::products_live))
        .route("/products/{id}/status", put(admin::set_product_status))
        .route(
            "/products/{id}/variants/{variant_id}/status",
            put(admin::set_variant_status),
        )
}

/// Create all routes for the storefront.
pub fn routes(config: &StorefrontConfig) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/products", product_routes())
        .nest("/api/cart", cart_routes())
        .route("/api/checkout", post(checkout::place_order))
        .nest("/api/orders", order_routes())
        .nest("/api/addresses", address_routes())
        .nest("/auth", auth_routes())
        .nest("/admin", admin_routes(config))
}

/// The complete application: routes, sessions over `store`, tracing and
/// request ids. Sentry layers are added by the binary.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()`; the
/// admin login limiter keys on the peer address.
pub fn app<S>(state: AppState, store: S) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer = create_session_layer(store, state.config());

    routes(state.config())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn(request_id_middleware))
                .layer(session_layer),
        )
        .with_state(state)
}

/// Stream a live query as server-sent `snapshot` events.
///
/// A failed re-read is sent as an `error` event; the stream stays open and
/// the next change triggers another read.
pub fn live_events<T>(live: LiveQuery<T>) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    T: Serialize + Send + 'static,
{
    let events = live.into_stream().map(|snapshot| {
        let event = match snapshot {
            Ok(items) => {
                let json = serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string());
                Event::default().event("snapshot").data(json)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Live query read failed");
                Event::default()
                    .event("error")
                    .data(r#"{"error":"Failed to load latest data"}"#)
            }
        };
        Ok(event)
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
