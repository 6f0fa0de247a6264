//! Catalog API endpoints (public storefront)
//!
//! - GET /api/packages/ - Active packages (`?popular=true` for the popular
//!   selection)
//! - GET /api/packages/{id}/ - One package
//! - GET /api/campaigns/ - Active campaigns
//! - GET /api/campaigns/{id}/ - One campaign

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::{Campaign, Package};

/// Query parameters for catalog listings
#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    #[serde(default)]
    pub popular: bool,
}

/// Build the package routes. Paths are registered in full so the
/// trailing-slash forms resolve exactly as documented.
pub fn package_router() -> Router<AppState> {
    Router::new()
        .route("/packages/", get(list_packages))
        .route("/packages/{id}/", get(get_package))
}

/// Build the campaign routes
pub fn campaign_router() -> Router<AppState> {
    Router::new()
        .route("/campaigns/", get(list_campaigns))
        .route("/campaigns/{id}/", get(get_campaign))
}

/// GET /api/packages/
async fn list_packages(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<Vec<Package>>, ApiError> {
    let packages = state.catalog_service.list_packages(query.popular).await?;
    Ok(Json(packages))
}

/// GET /api/packages/{id}/
async fn get_package(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Package>, ApiError> {
    let package = state.catalog_service.get_package(id).await?;
    Ok(Json(package))
}

/// GET /api/campaigns/
async fn list_campaigns(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<Vec<Campaign>>, ApiError> {
    let campaigns = state.catalog_service.list_campaigns(query.popular).await?;
    Ok(Json(campaigns))
}

/// GET /api/campaigns/{id}/
async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Campaign>, ApiError> {
    let campaign = state.catalog_service.get_campaign(id).await?;
    Ok(Json(campaign))
}
