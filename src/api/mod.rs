//! API layer - HTTP handlers and routing
//!
//! All HTTP endpoints for the Election Cart backend:
//! - Auth endpoints (signup, login, refresh, me)
//! - Public catalog endpoints (packages, campaigns)
//! - Cart endpoints (authenticated)
//! - Order endpoints (checkout, payment verification)
//! - Admin endpoints (order queue, analytics, catalog and user management)
//! - Health check

pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod health;
pub mod middleware;
pub mod orders;
pub mod responses;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, AuthenticatedUser, RequestStats};

/// Build the `/api` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin-only routes (analytics, catalog and user management)
    let admin_routes = Router::new()
        .nest("/admin", admin::admin_router())
        .merge(admin::user_admin_router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Order queue routes (staff or admin)
    let staff_routes = Router::new()
        .merge(admin::order_router())
        .route_layer(axum_middleware::from_fn(middleware::require_staff))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Authenticated customer routes
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .merge(cart::router())
        .nest("/orders", orders::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .merge(catalog::package_router())
        .merge(catalog::campaign_router())
        .merge(admin_routes)
        .merge(staff_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin.parse::<HeaderValue>().unwrap())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .merge(health::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // Request stats middleware (outermost layer, runs for all requests)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state)
}
