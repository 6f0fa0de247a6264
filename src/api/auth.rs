//! Authentication API endpoints
//!
//! - POST /api/auth/signup/ - Register a new account
//! - POST /api/auth/login/ - Log in with username and password
//! - POST /api/auth/refresh/ - Exchange a refresh token for new tokens
//! - GET /api/auth/me/ - Current user profile

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{extract_ip_address, ApiError, AppState, AuthenticatedUser};
use crate::api::responses::UserResponse;
use crate::models::CreateUserInput;
use crate::services::TokenPair;

/// Request body for signup
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub phone_number: Option<String>,
}

/// Request body for login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Request body for token refresh
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
}

impl AuthResponse {
    fn new(user: crate::models::User, tokens: TokenPair) -> Self {
        Self {
            user: user.into(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }
    }
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/signup/", post(signup))
        .route("/login/", post(login))
        .route("/refresh/", post(refresh))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/me/", get(me))
}

/// POST /api/auth/signup/ - Register a new account
async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ip = extract_ip_address(&headers);
    let input = CreateUserInput {
        username: body.username,
        phone_number: body.phone_number,
        password: body.password,
        role: None,
    };

    let (user, tokens) = state.auth_service.signup(input, ip).await?;
    Ok((StatusCode::CREATED, Json(AuthResponse::new(user, tokens))))
}

/// POST /api/auth/login/ - Log in
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let ip = extract_ip_address(&headers);
    let (user, tokens) = state
        .auth_service
        .login(&body.username, &body.password, ip)
        .await?;
    Ok(Json(AuthResponse::new(user, tokens)))
}

/// POST /api/auth/refresh/ - Rotate tokens
async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let (user, tokens) = state.auth_service.refresh(&body.refresh_token).await?;
    Ok(Json(AuthResponse::new(user, tokens)))
}

/// GET /api/auth/me/ - Current user profile
async fn me(
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Json<UserResponse> {
    Json(user.into())
}
