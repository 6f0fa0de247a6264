//! Admin API endpoints
//!
//! The order queue (staff and admin):
//! - GET /api/admin/orders/ - Filterable order list
//! - GET /api/admin/orders/{id}/ - Full order detail with history
//! - PATCH /api/admin/orders/{id}/ - Update status/assignee/priority/notes
//!
//! Admin-only:
//! - GET /api/admin/analytics/ - Revenue and queue dashboard
//! - POST/PUT/DELETE /api/admin/packages/... - Package management
//! - POST/PUT/DELETE /api/admin/campaigns/... - Campaign management
//! - GET/POST/PATCH/DELETE /api/auth/users/... - User management

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{MessageResponse, UserResponse};
use crate::db::repositories::{AssignedFilter, OrderFilter, OrderUpdate, UserFilter};
use crate::models::{
    Campaign, CampaignInput, CreateUserInput, Order, OrderPriority, OrderStatus, Package,
    PackageInput, UserRole,
};
use crate::services::{AdminOrderDetail, AnalyticsSummary};

/// Build the staff-accessible order queue routes. Paths are registered
/// in full so `/api/admin/orders/` resolves with its trailing slash.
pub fn order_router() -> Router<AppState> {
    Router::new()
        .route("/admin/orders/", get(list_orders))
        .route("/admin/orders/{id}/", get(get_order))
        .route("/admin/orders/{id}/", patch(update_order))
}

/// Build the admin-only routes
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/analytics/", get(analytics))
        .route("/packages/", get(list_all_packages))
        .route("/packages/", post(create_package))
        .route("/packages/{id}/", put(update_package))
        .route("/packages/{id}/", delete(delete_package))
        .route("/campaigns/", get(list_all_campaigns))
        .route("/campaigns/", post(create_campaign))
        .route("/campaigns/{id}/", put(update_campaign))
        .route("/campaigns/{id}/", delete(delete_campaign))
}

/// Build the admin-only user management routes
pub fn user_admin_router() -> Router<AppState> {
    Router::new()
        .route("/auth/users/", get(list_users))
        .route("/auth/users/create/", post(create_user))
        .route("/auth/users/{id}/role/", patch(update_user_role))
        .route("/auth/users/{id}/", delete(delete_user))
}

// ============================================================================
// Order queue
// ============================================================================

/// Query parameters for the admin order list
#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    /// A user id or the literal "unassigned"
    pub assigned_to: Option<String>,
    /// Substring match on order number, username or phone number
    pub search: Option<String>,
}

impl OrderListQuery {
    fn into_filter(self) -> Result<OrderFilter, ApiError> {
        let status = match self.status {
            Some(raw) => Some(
                OrderStatus::from_str(&raw)
                    .map_err(|_| ApiError::validation_error(format!("Invalid status: {}", raw)))?,
            ),
            None => None,
        };

        let assigned_to = match self.assigned_to.as_deref() {
            Some("unassigned") => Some(AssignedFilter::Unassigned),
            Some(raw) => Some(AssignedFilter::User(raw.parse().map_err(|_| {
                ApiError::validation_error(format!("Invalid assigned_to: {}", raw))
            })?)),
            None => None,
        };

        Ok(OrderFilter {
            status,
            assigned_to,
            search: self.search.filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Request body for PATCH /api/admin/orders/{id}/
#[derive(Debug, Default, Deserialize)]
pub struct OrderUpdateRequest {
    pub status: Option<String>,
    /// Absent = unchanged, null = unassign, id = assign
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<i64>>,
    pub priority: Option<String>,
    pub admin_notes: Option<String>,
}

/// Distinguishes an absent field from an explicit null
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

impl OrderUpdateRequest {
    fn into_update(self) -> Result<OrderUpdate, ApiError> {
        let status = match self.status {
            Some(raw) => Some(
                OrderStatus::from_str(&raw)
                    .map_err(|_| ApiError::validation_error(format!("Invalid status: {}", raw)))?,
            ),
            None => None,
        };

        let priority = match self.priority {
            Some(raw) => Some(OrderPriority::from_str(&raw).map_err(|_| {
                ApiError::validation_error(format!("Invalid priority: {}", raw))
            })?),
            None => None,
        };

        Ok(OrderUpdate {
            status,
            assigned_to: self.assigned_to,
            priority,
            admin_notes: self.admin_notes,
        })
    }
}

/// GET /api/admin/orders/
async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let filter = query.into_filter()?;
    let orders = state.order_service.admin_list(&filter).await?;
    Ok(Json(orders))
}

/// GET /api/admin/orders/{id}/
async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AdminOrderDetail>, ApiError> {
    let detail = state.order_service.admin_get(id).await?;
    Ok(Json(detail))
}

/// PATCH /api/admin/orders/{id}/
async fn update_order(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    Json(body): Json<OrderUpdateRequest>,
) -> Result<Json<Order>, ApiError> {
    let update = body.into_update()?;
    let order = state.order_service.admin_update(id, update, user.id).await?;
    Ok(Json(order))
}

// ============================================================================
// Analytics
// ============================================================================

/// Query parameters for the analytics dashboard
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    /// RFC 3339 timestamp
    pub start: Option<String>,
    /// RFC 3339 timestamp
    pub end: Option<String>,
}

fn parse_timestamp(raw: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>, ApiError> {
    match raw {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|_| {
                ApiError::validation_error(format!("Invalid {} timestamp: {}", field, raw))
            }),
        None => Ok(None),
    }
}

/// GET /api/admin/analytics/
async fn analytics(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsSummary>, ApiError> {
    let start = parse_timestamp(query.start.as_deref(), "start")?;
    let end = parse_timestamp(query.end.as_deref(), "end")?;

    let summary = state.analytics_service.summary(start, end).await?;
    Ok(Json(summary))
}

// ============================================================================
// Catalog management
// ============================================================================

/// GET /api/admin/packages/ - all packages including inactive
async fn list_all_packages(
    State(state): State<AppState>,
) -> Result<Json<Vec<Package>>, ApiError> {
    let packages = state.catalog_service.list_all_packages().await?;
    Ok(Json(packages))
}

/// POST /api/admin/packages/
async fn create_package(
    State(state): State<AppState>,
    Json(input): Json<PackageInput>,
) -> Result<impl IntoResponse, ApiError> {
    let package = state.catalog_service.create_package(input).await?;
    Ok((StatusCode::CREATED, Json(package)))
}

/// PUT /api/admin/packages/{id}/
async fn update_package(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<PackageInput>,
) -> Result<Json<Package>, ApiError> {
    let package = state.catalog_service.update_package(id, input).await?;
    Ok(Json(package))
}

/// DELETE /api/admin/packages/{id}/ - soft delete
async fn delete_package(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.catalog_service.deactivate_package(id).await?;
    Ok(Json(MessageResponse::new("Package deactivated")))
}

/// GET /api/admin/campaigns/
async fn list_all_campaigns(
    State(state): State<AppState>,
) -> Result<Json<Vec<Campaign>>, ApiError> {
    let campaigns = state.catalog_service.list_all_campaigns().await?;
    Ok(Json(campaigns))
}

/// POST /api/admin/campaigns/
async fn create_campaign(
    State(state): State<AppState>,
    Json(input): Json<CampaignInput>,
) -> Result<impl IntoResponse, ApiError> {
    let campaign = state.catalog_service.create_campaign(input).await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// PUT /api/admin/campaigns/{id}/
async fn update_campaign(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<CampaignInput>,
) -> Result<Json<Campaign>, ApiError> {
    let campaign = state.catalog_service.update_campaign(id, input).await?;
    Ok(Json(campaign))
}

/// DELETE /api/admin/campaigns/{id}/ - soft delete
async fn delete_campaign(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.catalog_service.deactivate_campaign(id).await?;
    Ok(Json(MessageResponse::new("Campaign deactivated")))
}

// ============================================================================
// User management
// ============================================================================

/// Query parameters for the user list
#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<String>,
    pub search: Option<String>,
}

/// Request body for creating a user with a role
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub phone_number: Option<String>,
    pub role: Option<String>,
}

/// Request body for changing a user's role
#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

/// GET /api/auth/users/
async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let role = match query.role {
        Some(raw) => Some(
            UserRole::from_str(&raw)
                .map_err(|_| ApiError::validation_error(format!("Invalid role: {}", raw)))?,
        ),
        None => None,
    };

    let filter = UserFilter {
        role,
        search: query.search.filter(|s| !s.trim().is_empty()),
    };
    let users = state.auth_service.list_users(&filter).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// POST /api/auth/users/create/
async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let role = match body.role {
        Some(raw) => Some(
            UserRole::from_str(&raw)
                .map_err(|_| ApiError::validation_error(format!("Invalid role: {}", raw)))?,
        ),
        None => None,
    };

    let input = CreateUserInput {
        username: body.username,
        phone_number: body.phone_number,
        password: body.password,
        role,
    };
    let user = state.auth_service.create_user(input).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// PATCH /api/auth/users/{id}/role/
async fn update_user_role(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let role = UserRole::from_str(&body.role)
        .map_err(|_| ApiError::validation_error(format!("Invalid role: {}", body.role)))?;

    let user = state.auth_service.update_role(id, role).await?;
    Ok(Json(UserResponse::from(user)))
}

/// DELETE /api/auth/users/{id}/
async fn delete_user(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(acting)): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth_service.delete_user(id, acting.id).await?;
    Ok(Json(MessageResponse::new("User deleted")))
}
