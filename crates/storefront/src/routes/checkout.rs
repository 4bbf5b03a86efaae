//! Checkout route handler.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use pasta_haus_core::{CustomerInfo, Order, OrderType};

use crate::error::Result;
use crate::middleware::OptionalUser;
use crate::state::AppState;

/// Checkout request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub order_type: OrderType,
    #[serde(flatten)]
    pub customer: CustomerInfo,
}

/// Place an order for the session cart.
///
/// Name and email default to the signed-in customer's Google profile.
///
/// # Route
///
/// `POST /api/checkout`
#[instrument(skip(state, session, user))]
pub async fn place_order(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let mut customer = request.customer;
    if let Some(user) = &user {
        customer.name = non_blank(customer.name).or_else(|| user.display_name.clone());
        customer.email = non_blank(customer.email).or_else(|| user.email.clone());
    }

    let order = state
        .checkout()
        .create_order(&session, user.as_ref(), request.order_type, customer)
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
