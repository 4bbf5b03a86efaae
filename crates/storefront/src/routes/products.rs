//! Menu route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use pasta_haus_core::{Category, Product, ProductId};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Query parameters for the product listing.
#[derive(Debug, Default, Deserialize)]
pub struct ProductsQuery {
    /// `pasta` or `pastry`.
    pub category: Option<String>,
}

/// List the menu, optionally narrowed to one category.
///
/// # Route
///
/// `GET /api/products`
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductsQuery>,
) -> Result<Json<Vec<Product>>> {
    let products = match query.category.as_deref() {
        Some(category) => {
            let category = category
                .parse::<Category>()
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            state.catalog().by_category(category).await?
        }
        None => state.catalog().list_products().await?.as_ref().clone(),
    };

    Ok(Json(products))
}

/// Best sellers for the home page. Empty rather than an error when the
/// store is slow or failing.
///
/// # Route
///
/// `GET /api/products/best-sellers`
#[instrument(skip(state))]
pub async fn best_sellers(State(state): State<AppState>) -> Json<Vec<Product>> {
    Json(state.catalog().best_sellers().await)
}

/// # Route
///
/// `GET /api/products/{id}`
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    let product = state.catalog().get_product(&id).await?;
    Ok(Json(product))
}
