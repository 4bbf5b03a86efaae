//! Admin dashboard route handlers.
//!
//! Login checks the shared password against the configured Argon2 hash and
//! marks the session. Every other route requires that mark.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Sse, sse::Event},
};
use chrono::NaiveDate;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use pasta_haus_core::{Order, OrderId, OrderStatus, Product, ProductId, ProductStatus, VariantId};

use super::live_events;
use crate::db::DateRange;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::services::{AdminGate, OrderWindow};
use crate::state::AppState;

/// Admin login request body.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

/// Whether this session has passed the admin gate.
#[derive(Debug, Serialize)]
pub struct AdminSession {
    pub authenticated: bool,
}

/// Query parameters for the admin order listing.
///
/// Without `from`/`to` the listing covers today in the business time zone.
/// `all=true` drops the date window.
#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<String>,
    #[serde(default)]
    pub all: bool,
}

impl OrdersQuery {
    fn window(&self, state: &AppState) -> OrderWindow {
        if self.all {
            return OrderWindow::All;
        }
        let offset = state.config().utc_offset;
        match (self.from, self.to) {
            (Some(from), Some(to)) => OrderWindow::Range(DateRange::days(from, to, offset)),
            (Some(day), None) | (None, Some(day)) => {
                OrderWindow::Range(DateRange::days(day, day, offset))
            }
            (None, None) => OrderWindow::Today(offset),
        }
    }

    fn status(&self) -> Result<Option<OrderStatus>> {
        self.status
            .as_deref()
            .map(str::parse::<OrderStatus>)
            .transpose()
            .map_err(|e| AppError::BadRequest(e.to_string()))
    }
}

/// Order status change request body.
#[derive(Debug, Deserialize)]
pub struct OrderStatusRequest {
    pub status: OrderStatus,
}

/// Product or variant availability request body.
#[derive(Debug, Deserialize)]
pub struct ProductStatusRequest {
    pub status: ProductStatus,
}

// =============================================================================
// Session
// =============================================================================

/// # Route
///
/// `POST /admin/login`
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AdminSession>> {
    state.admin_gate().login(&session, &request.password).await?;
    Ok(Json(AdminSession {
        authenticated: true,
    }))
}

/// # Route
///
/// `POST /admin/logout`
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<StatusCode> {
    AdminGate::logout(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// # Route
///
/// `GET /admin/session`
pub async fn session(session: Session) -> Json<AdminSession> {
    Json(AdminSession {
        authenticated: AdminGate::is_authenticated(&session).await,
    })
}

// =============================================================================
// Orders
// =============================================================================

/// # Route
///
/// `GET /admin/orders`
#[instrument(skip(state, _admin))]
pub async fn orders(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<Vec<Order>>> {
    let status = query.status()?;
    let orders = state
        .orders()
        .all_orders(query.window(&state), status)
        .await?;
    Ok(Json(orders))
}

/// # Route
///
/// `GET /admin/orders/live`
pub async fn orders_live(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<OrdersQuery>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let status = query.status()?;
    let live = state
        .orders()
        .subscribe_all_orders(query.window(&state), status);
    Ok(live_events(live))
}

/// Move an order to a specific status.
///
/// # Route
///
/// `POST /admin/orders/{id}/status`
#[instrument(skip(state, _admin))]
pub async fn set_order_status(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<OrderId>,
    Json(request): Json<OrderStatusRequest>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders().advance_status(&id, request.status).await?))
}

/// Move an order one step along the fulfillment flow.
///
/// # Route
///
/// `POST /admin/orders/{id}/advance`
#[instrument(skip(state, _admin))]
pub async fn advance_order(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders().advance(&id).await?))
}

/// # Route
///
/// `POST /admin/orders/{id}/cancel`
#[instrument(skip(state, _admin))]
pub async fn cancel_order(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders().cancel(&id).await?))
}

// =============================================================================
// Products
// =============================================================================

/// Every product, uncached.
///
/// # Route
///
/// `GET /admin/products`
#[instrument(skip(state, _admin))]
pub async fn products(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<Json<Vec<Product>>> {
    let products = state.catalog().subscribe_products().first().await?;
    Ok(Json(products))
}

/// # Route
///
/// `GET /admin/products/live`
pub async fn products_live(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    live_events(state.catalog().subscribe_products())
}

/// # Route
///
/// `PUT /admin/products/{id}/status`
#[instrument(skip(state, _admin))]
pub async fn set_product_status(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<ProductId>,
    Json(request): Json<ProductStatusRequest>,
) -> Result<Json<Product>> {
    Ok(Json(
        state
            .catalog()
            .set_product_status(&id, request.status)
            .await?,
    ))
}

/// # Route
///
/// `PUT /admin/products/{id}/variants/{variant_id}/status`
#[instrument(skip(state, _admin))]
pub async fn set_variant_status(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path((id, variant_id)): Path<(ProductId, VariantId)>,
    Json(request): Json<ProductStatusRequest>,
) -> Result<Json<Product>> {
    Ok(Json(
        state
            .catalog()
            .set_variant_status(&id, &variant_id, request.status)
            .await?,
    ))
}
