//! Customer order history.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{Path, State},
    response::{Sse, sse::Event},
};
use futures::Stream;
use tracing::instrument;

use pasta_haus_core::{Order, OrderId};

use super::live_events;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::state::AppState;

/// The signed-in customer's orders, newest first.
///
/// # Route
///
/// `GET /api/orders`
#[instrument(skip(state, user), fields(user_id = %user.uid))]
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().orders_for_user(&user.uid).await?))
}

/// One of the customer's own orders; someone else's order is a 404.
///
/// # Route
///
/// `GET /api/orders/{id}`
#[instrument(skip(state, user), fields(user_id = %user.uid))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders().order_for_user(&user.uid, &id).await?))
}

/// Live order history. Status changes made in the admin dashboard show up
/// without polling.
///
/// # Route
///
/// `GET /api/orders/live`
pub async fn live(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    tracing::debug!(user_id = %user.uid, "Order history subscription opened");
    live_events(state.orders().subscribe_user_orders(user.uid))
}
