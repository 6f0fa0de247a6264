//! API middleware
//!
//! Contains middleware for:
//! - Authentication (JWT access token validation)
//! - Authorization (staff and admin role checks)
//! - Request statistics

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::models::User;
use crate::services::{
    AnalyticsService, AnalyticsServiceError, AuthService, AuthServiceError, CartService,
    CartServiceError, CatalogService, CatalogServiceError, OrderService, OrderServiceError,
    TokenService,
};

// ============================================================================
// Request Statistics
// ============================================================================

/// Lightweight request statistics using atomic operations (no locks)
pub struct RequestStats {
    /// Total number of requests processed
    total_requests: AtomicU64,
    /// Total response time in microseconds (for calculating average)
    total_response_time_us: AtomicU64,
    /// Application start time
    start_time: Instant,
}

impl RequestStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a request with its response time
    pub fn record(&self, duration_us: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add(duration_us, Ordering::Relaxed);
    }

    /// Get total request count
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Get average response time in microseconds
    pub fn avg_response_time_us(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let total_time = self.total_response_time_us.load(Ordering::Relaxed);
        total_time as f64 / total as f64
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: crate::db::DynDatabasePool,
    pub tokens: Arc<TokenService>,
    pub auth_service: Arc<AuthService>,
    pub catalog_service: Arc<CatalogService>,
    pub cart_service: Arc<CartService>,
    pub order_service: Arc<OrderService>,
    pub analytics_service: Arc<AnalyticsService>,
    pub request_stats: Arc<RequestStats>,
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "PAYMENT_VERIFICATION_FAILED" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            "GATEWAY_ERROR" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<AuthServiceError> for ApiError {
    fn from(e: AuthServiceError) -> Self {
        match e {
            AuthServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            AuthServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            AuthServiceError::Conflict(msg) => ApiError::conflict(msg),
            AuthServiceError::RateLimited => ApiError::with_details(
                "RATE_LIMIT",
                "Too many attempts, try again later",
                serde_json::json!({"retry_after": 60}),
            ),
            AuthServiceError::UserNotFound => ApiError::not_found("User not found"),
            AuthServiceError::InternalError(e) => {
                tracing::error!(error = %e, "Auth service error");
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<CatalogServiceError> for ApiError {
    fn from(e: CatalogServiceError) -> Self {
        match e {
            CatalogServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CatalogServiceError::NotFound => ApiError::not_found("Item not found"),
            CatalogServiceError::InternalError(e) => {
                tracing::error!(error = %e, "Catalog service error");
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<CartServiceError> for ApiError {
    fn from(e: CartServiceError) -> Self {
        match e {
            CartServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CartServiceError::ItemNotFound => ApiError::not_found("Item not found"),
            CartServiceError::CartItemNotFound => ApiError::not_found("Cart item not found"),
            CartServiceError::InternalError(e) => {
                tracing::error!(error = %e, "Cart service error");
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<OrderServiceError> for ApiError {
    fn from(e: OrderServiceError) -> Self {
        match e {
            OrderServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            OrderServiceError::NotFound => ApiError::not_found("Order not found"),
            OrderServiceError::InvalidSignature => ApiError::new(
                "PAYMENT_VERIFICATION_FAILED",
                "Payment verification failed",
            ),
            OrderServiceError::GatewayError(msg) => {
                tracing::error!(error = %msg, "Payment gateway error");
                ApiError::new("GATEWAY_ERROR", "Payment gateway unavailable")
            }
            OrderServiceError::InternalError(e) => {
                tracing::error!(error = %e, "Order service error");
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<AnalyticsServiceError> for ApiError {
    fn from(e: AnalyticsServiceError) -> Self {
        match e {
            AnalyticsServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            AnalyticsServiceError::InternalError(e) => {
                tracing::error!(error = %e, "Analytics service error");
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

/// Extract a bearer token from the Authorization header
fn extract_bearer_token(request: &Request) -> Option<String> {
    let auth_header = request.headers().get(header::AUTHORIZATION)?;
    let auth_str = auth_header.to_str().ok()?;
    auth_str.strip_prefix("Bearer ").map(str::to_string)
}

/// Extract the client IP from proxy headers
pub fn extract_ip_address(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(ip) = forwarded_str.split(',').next() {
                if let Ok(parsed) = ip.trim().parse() {
                    return Some(parsed);
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            if let Ok(parsed) = ip_str.trim().parse() {
                return Some(parsed);
            }
        }
    }

    None
}

/// Authentication middleware.
///
/// Verifies the JWT access token and loads the current user so role checks
/// reflect role changes made after the token was issued.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let claims = state
        .tokens
        .verify(&token, "access")
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;
    let user_id = claims
        .user_id()
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;

    let user = state
        .auth_service
        .get_user(user_id)
        .await
        .map_err(|e| ApiError::internal_error(format!("User lookup failed: {}", e)))?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Staff authorization middleware (staff or admin)
pub async fn require_staff(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_staff() {
        return Err(ApiError::forbidden("Staff privileges required"));
    }

    Ok(next.run(request).await)
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

/// Request statistics middleware
pub async fn request_stats_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    let response = next.run(request).await;

    let duration_us = start.elapsed().as_micros() as u64;
    state.request_stats.record(duration_us);

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};

    fn create_request_with_auth(token: &str) -> Request<Body> {
        Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_extract_bearer_token() {
        let request = create_request_with_auth("test-token-123");
        assert_eq!(
            extract_bearer_token(&request),
            Some("test-token-123".to_string())
        );
    }

    #[test]
    fn test_extract_bearer_token_none() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        assert!(extract_bearer_token(&request).is_none());
    }

    #[test]
    fn test_extract_bearer_token_wrong_scheme() {
        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Basic invalid")
            .body(Body::empty())
            .unwrap();
        assert!(extract_bearer_token(&request).is_none());
    }

    #[test]
    fn test_extract_ip_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(
            extract_ip_address(&headers),
            Some("203.0.113.7".parse().unwrap())
        );
    }

    #[test]
    fn test_extract_ip_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "198.51.100.4".parse().unwrap());
        assert_eq!(
            extract_ip_address(&headers),
            Some("198.51.100.4".parse().unwrap())
        );
    }

    #[test]
    fn test_extract_ip_invalid() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "not-an-ip".parse().unwrap());
        assert!(extract_ip_address(&headers).is_none());
    }

    #[test]
    fn test_api_error_status_codes() {
        for (code, status) in [
            ("UNAUTHORIZED", StatusCode::UNAUTHORIZED),
            ("FORBIDDEN", StatusCode::FORBIDDEN),
            ("NOT_FOUND", StatusCode::NOT_FOUND),
            ("VALIDATION_ERROR", StatusCode::BAD_REQUEST),
            ("PAYMENT_VERIFICATION_FAILED", StatusCode::BAD_REQUEST),
            ("CONFLICT", StatusCode::CONFLICT),
            ("RATE_LIMIT", StatusCode::TOO_MANY_REQUESTS),
            ("GATEWAY_ERROR", StatusCode::BAD_GATEWAY),
            ("SOMETHING_ELSE", StatusCode::INTERNAL_SERVER_ERROR),
        ] {
            let response = ApiError::new(code, "message").into_response();
            assert_eq!(response.status(), status, "code {}", code);
        }
    }

    #[test]
    fn test_request_stats() {
        let stats = RequestStats::new();
        assert_eq!(stats.total_requests(), 0);
        assert_eq!(stats.avg_response_time_us(), 0.0);

        stats.record(100);
        stats.record(300);
        assert_eq!(stats.total_requests(), 2);
        assert_eq!(stats.avg_response_time_us(), 200.0);
    }
}
