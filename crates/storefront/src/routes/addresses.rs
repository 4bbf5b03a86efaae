//! Address book route handlers. All routes require a signed-in customer and
//! only ever touch that customer's addresses.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{Sse, sse::Event},
};
use futures::Stream;
use tracing::instrument;

use pasta_haus_core::{Address, AddressFields, AddressId};

use super::live_events;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::state::AppState;

/// # Route
///
/// `GET /api/addresses`
#[instrument(skip(state, user), fields(user_id = %user.uid))]
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Address>>> {
    Ok(Json(state.addresses().list(&user.uid).await?))
}

/// The default address, or `null` when the customer has none.
///
/// # Route
///
/// `GET /api/addresses/default`
#[instrument(skip(state, user), fields(user_id = %user.uid))]
pub async fn default_address(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Option<Address>>> {
    Ok(Json(state.addresses().default_address(&user.uid).await?))
}

/// # Route
///
/// `POST /api/addresses`
#[instrument(skip(state, user, input), fields(user_id = %user.uid))]
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(input): Json<AddressFields>,
) -> Result<(StatusCode, Json<Address>)> {
    let address = state.addresses().create(&user.uid, input).await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// # Route
///
/// `PUT /api/addresses/{id}`
#[instrument(skip(state, user, input), fields(user_id = %user.uid))]
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<AddressId>,
    Json(input): Json<AddressFields>,
) -> Result<Json<Address>> {
    Ok(Json(state.addresses().update(&user.uid, &id, input).await?))
}

/// # Route
///
/// `DELETE /api/addresses/{id}`
#[instrument(skip(state, user), fields(user_id = %user.uid))]
pub async fn delete(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<AddressId>,
) -> Result<StatusCode> {
    state.addresses().delete(&user.uid, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Make one address the default; every other address of the customer loses
/// the flag in the same write.
///
/// # Route
///
/// `POST /api/addresses/{id}/default`
#[instrument(skip(state, user), fields(user_id = %user.uid))]
pub async fn set_default(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<AddressId>,
) -> Result<Json<Address>> {
    let addresses = state.addresses();
    addresses.set_default(&user.uid, &id).await?;
    Ok(Json(addresses.get(&user.uid, &id).await?))
}

/// # Route
///
/// `GET /api/addresses/live`
pub async fn live(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    live_events(state.addresses().subscribe(user.uid))
}
