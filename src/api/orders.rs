//! Order API endpoints (authenticated, owner-scoped)
//!
//! - POST /api/orders/create/ - Checkout the cart
//! - GET /api/orders/my-orders/ - List own orders
//! - GET /api/orders/{id}/ - Order detail with items and payment
//! - POST /api/orders/{id}/payment/verify/ - Gateway callback verification

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::Order;
use crate::services::{CheckoutResponse, OrderDetail, PaymentVerification};

/// Request body for payment verification callbacks
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub gateway_signature: String,
}

/// Build the order routes (auth middleware applied by the caller)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/my-orders/", get(list_orders))
        .route("/create/", post(create_order))
        .route("/{id}/", get(get_order))
        .route("/{id}/payment/verify/", post(verify_payment))
}

/// POST /api/orders/create/
async fn create_order(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, ApiError> {
    let checkout: CheckoutResponse = state.order_service.checkout(user.id).await?;
    Ok((StatusCode::CREATED, Json(checkout)))
}

/// GET /api/orders/my-orders/
async fn list_orders(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = state.order_service.list_my_orders(user.id).await?;
    Ok(Json(orders))
}

/// GET /api/orders/{id}/
async fn get_order(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<Json<OrderDetail>, ApiError> {
    let detail = state.order_service.get_my_order(user.id, id).await?;
    Ok(Json(detail))
}

/// POST /api/orders/{id}/payment/verify/
///
/// Returns 200 for both the first successful verification and idempotent
/// duplicates; an invalid signature is a 400 and leaves the order unpaid.
async fn verify_payment(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    Json(body): Json<VerifyPaymentRequest>,
) -> Result<Json<PaymentVerification>, ApiError> {
    let verification = state
        .order_service
        .verify_payment(
            user.id,
            id,
            &body.gateway_order_id,
            &body.gateway_payment_id,
            &body.gateway_signature,
        )
        .await?;
    Ok(Json(verification))
}
