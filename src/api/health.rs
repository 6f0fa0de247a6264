//! Health check endpoint
//!
//! GET /health/ reports service liveness and database reachability.
//! Returns 200 when the database responds to a ping and 503 otherwise.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::api::middleware::AppState;

/// Health check response body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub database: &'static str,
    pub uptime_seconds: u64,
    pub timestamp: String,
}

/// Build the health routes
pub fn router() -> Router<AppState> {
    Router::new().route("/health/", get(health_check))
}

/// GET /health/
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database_ok = match state.pool.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Health check database ping failed");
            false
        }
    };

    let body = HealthResponse {
        status: if database_ok { "ok" } else { "unhealthy" },
        service: "electioncart",
        database: if database_ok { "up" } else { "down" },
        uptime_seconds: state.request_stats.uptime_seconds(),
        timestamp: Utc::now().to_rfc3339(),
    };

    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(body))
}
