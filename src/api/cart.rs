//! Cart API endpoints (authenticated)
//!
//! - GET /api/cart/ - Current cart with live prices
//! - POST /api/cart/add/ - Add an item (merges quantity)
//! - DELETE /api/cart/remove/{item_id}/ - Remove one line
//! - DELETE /api/cart/clear/ - Empty the cart

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::str::FromStr;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::MessageResponse;
use crate::models::{CartItem, CartView, ItemType};

/// Request body for adding a cart item
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub item_type: String,
    pub item_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

/// Build the cart routes (auth middleware applied by the caller).
/// Paths are registered in full so `/api/cart/` resolves with its
/// trailing slash.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart/", get(get_cart))
        .route("/cart/add/", post(add_item))
        .route("/cart/remove/{item_id}/", delete(remove_item))
        .route("/cart/clear/", delete(clear_cart))
}

/// GET /api/cart/
async fn get_cart(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Result<Json<CartView>, ApiError> {
    let cart = state.cart_service.get_cart(user.id).await?;
    Ok(Json(cart))
}

/// POST /api/cart/add/
async fn add_item(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Json(body): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let item_type = ItemType::from_str(&body.item_type)
        .map_err(|_| ApiError::validation_error(format!("Invalid item type: {}", body.item_type)))?;

    let item: CartItem = state
        .cart_service
        .add_item(user.id, item_type, body.item_id, body.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// DELETE /api/cart/remove/{item_id}/
async fn remove_item(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.cart_service.remove_item(user.id, id).await?;
    Ok(Json(MessageResponse::new("Item removed")))
}

/// DELETE /api/cart/clear/
async fn clear_cart(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Result<Json<MessageResponse>, ApiError> {
    let removed = state.cart_service.clear(user.id).await?;
    Ok(Json(MessageResponse::new(format!(
        "Removed {} items",
        removed
    ))))
}
