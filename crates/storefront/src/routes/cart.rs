//! Cart route handlers.
//!
//! The cart lives in the visitor's session. For signed-in customers every
//! change is also mirrored to their stored cart.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use pasta_haus_core::{Cart, CartItem, Price, ProductId, VariantId};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::OptionalUser;
use crate::services::ShoppingCart;
use crate::state::AppState;

/// Cart as returned to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartItem>,
    /// Sum of quantities.
    pub count: u64,
    pub total: Price,
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self {
        Self {
            count: cart.count(),
            total: cart.total(),
            items: cart.into_items(),
        }
    }
}

/// Cart badge count.
#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: u64,
}

/// Add to cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub special_instructions: Option<String>,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
}

const fn default_quantity() -> u32 {
    1
}

/// Update quantity request body.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

/// # Route
///
/// `GET /api/cart`
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
) -> Json<CartView> {
    let uid = user.as_ref().map(|u| &u.uid);
    let cart = ShoppingCart::new(&session, state.backend(), uid).cart().await;
    Json(cart.into())
}

/// # Route
///
/// `GET /api/cart/count`
#[instrument(skip(state, session))]
pub async fn count(State(state): State<AppState>, session: Session) -> Json<CartCount> {
    let cart = ShoppingCart::new(&session, state.backend(), None);
    Json(CartCount {
        count: cart.local().count().await,
    })
}

/// Add a product line. Adding the same product, size and instructions again
/// increases the existing line.
///
/// # Route
///
/// `POST /api/cart/items`
#[instrument(skip(state, session, user))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
    Json(request): Json<AddToCartRequest>,
) -> Result<Json<CartView>> {
    if request.quantity == 0 {
        return Err(AppError::BadRequest("quantity must be at least 1".to_string()));
    }

    let (product, variant) = state
        .catalog()
        .orderable(&request.product_id, request.variant_id.as_ref())
        .await?;

    let uid = user.as_ref().map(|u| &u.uid);
    let cart = ShoppingCart::new(&session, state.backend(), uid)
        .add(
            product,
            request.quantity,
            request.special_instructions.as_deref(),
            variant,
        )
        .await;

    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", request.product_id.as_str())]),
    );
    Ok(Json(cart.into()))
}

/// Set a line's quantity. Non-positive quantities and unknown indices leave
/// the cart unchanged.
///
/// # Route
///
/// `PATCH /api/cart/items/{index}`
#[instrument(skip(state, session, user))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
    Path(index): Path<usize>,
    Json(request): Json<UpdateQuantityRequest>,
) -> Json<CartView> {
    let uid = user.as_ref().map(|u| &u.uid);
    let cart = ShoppingCart::new(&session, state.backend(), uid)
        .set_quantity(index, request.quantity)
        .await;
    Json(cart.into())
}

/// # Route
///
/// `DELETE /api/cart/items/{index}`
#[instrument(skip(state, session, user))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
    Path(index): Path<usize>,
) -> Json<CartView> {
    let uid = user.as_ref().map(|u| &u.uid);
    let cart = ShoppingCart::new(&session, state.backend(), uid)
        .remove(index)
        .await;
    Json(cart.into())
}

/// # Route
///
/// `DELETE /api/cart`
#[instrument(skip(state, session, user))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
) -> Json<CartView> {
    let uid = user.as_ref().map(|u| &u.uid);
    ShoppingCart::new(&session, state.backend(), uid)
        .clear()
        .await;
    Json(Cart::new().into())
}
