//! Authentication service
//!
//! Implements signup, login and token refresh on top of JWT access/refresh
//! token pairs, plus the admin-facing user management operations.
//!
//! Tokens are signed with HS256. Access tokens carry the user's role so
//! middleware can authorize without a database round trip; refresh tokens
//! carry a distinct `token_type` and are only accepted by `refresh`.

use crate::config::AuthConfig;
use crate::db::repositories::{UserFilter, UserRepository};
use crate::models::{CreateUserInput, User, UserRole};
use crate::services::password::{hash_password, verify_password};
use crate::services::rate_limiter::LoginRateLimiter;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

/// Minimum accepted password length
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum accepted username length
const MAX_USERNAME_LENGTH: usize = 150;

/// Error types for authentication operations
#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    /// Authentication failed (invalid credentials or token)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Username or phone number already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Too many attempts
    #[error("Too many attempts, try again later")]
    RateLimited,

    /// Requested user does not exist
    #[error("User not found")]
    UserNotFound,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// JWT claims carried by both access and refresh tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id as a string
    pub sub: String,
    /// Username at issue time
    pub username: String,
    /// Role at issue time
    pub role: String,
    /// "access" or "refresh"
    pub token_type: String,
    /// Issued-at (unix seconds)
    pub iat: i64,
    /// Expiration (unix seconds)
    pub exp: i64,
}

impl Claims {
    /// Parse the subject back into a user id
    pub fn user_id(&self) -> Result<i64, AuthServiceError> {
        self.sub
            .parse()
            .map_err(|_| AuthServiceError::AuthenticationError("Invalid token subject".to_string()))
    }
}

/// Access/refresh token pair returned by signup, login and refresh
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues and verifies JWT access and refresh tokens
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    /// Create a token service from auth configuration
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_ttl: Duration::minutes(config.access_token_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_token_ttl_days),
        }
    }

    /// Issue an access/refresh token pair for a user
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, AuthServiceError> {
        Ok(TokenPair {
            access_token: self.issue(user, "access", self.access_ttl)?,
            refresh_token: self.issue(user, "refresh", self.refresh_ttl)?,
        })
    }

    fn issue(&self, user: &User, token_type: &str, ttl: Duration) -> Result<String, AuthServiceError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role.to_string(),
            token_type: token_type.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthServiceError::InternalError(anyhow::anyhow!("Failed to sign token: {}", e)))
    }

    /// Verify a token and check it carries the expected `token_type`.
    ///
    /// Expired, forged and wrong-type tokens are all rejected with an
    /// authentication error.
    pub fn verify(&self, token: &str, expected_type: &str) -> Result<Claims, AuthServiceError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| AuthServiceError::AuthenticationError("Invalid or expired token".to_string()))?;

        if data.claims.token_type != expected_type {
            return Err(AuthServiceError::AuthenticationError(
                "Invalid token type".to_string(),
            ));
        }

        Ok(data.claims)
    }
}

/// Authentication and user management service
pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    tokens: Arc<TokenService>,
    rate_limiter: Arc<LoginRateLimiter>,
}

impl AuthService {
    /// Create a new auth service
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        tokens: Arc<TokenService>,
        rate_limiter: Arc<LoginRateLimiter>,
    ) -> Self {
        Self {
            user_repo,
            tokens,
            rate_limiter,
        }
    }

    /// Register a new user account.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if the username or password is invalid
    /// - `Conflict` if the username or phone number is already taken
    /// - `RateLimited` if the client IP has exceeded the request limit
    pub async fn signup(
        &self,
        input: CreateUserInput,
        client_ip: Option<IpAddr>,
    ) -> Result<(User, TokenPair), AuthServiceError> {
        if let Some(ip) = client_ip {
            if self.rate_limiter.is_ip_limited(ip).await {
                return Err(AuthServiceError::RateLimited);
            }
            self.rate_limiter.record_ip_request(ip).await;
        }

        validate_username(&input.username)?;
        validate_password(&input.password)?;
        if let Some(ref phone) = input.phone_number {
            validate_phone_number(phone)?;
        }

        if self
            .user_repo
            .get_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(AuthServiceError::Conflict(format!(
                "Username '{}' is already taken",
                input.username
            )));
        }

        if let Some(ref phone) = input.phone_number {
            if self.user_repo.get_by_phone_number(phone).await?.is_some() {
                return Err(AuthServiceError::Conflict(
                    "Phone number is already registered".to_string(),
                ));
            }
        }

        let password_hash = hash_password(&input.password)?;
        let user = User::new(
            input.username,
            input.phone_number,
            password_hash,
            // Self-signup never grants elevated roles.
            UserRole::User,
        );

        let created = self.user_repo.create(&user).await?;
        tracing::info!(user_id = created.id, username = %created.username, "User registered");

        let tokens = self.tokens.issue_pair(&created)?;
        Ok((created, tokens))
    }

    /// Authenticate a user and issue a token pair.
    ///
    /// Failed attempts count against the username's rate limit window;
    /// a successful login clears it.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        client_ip: Option<IpAddr>,
    ) -> Result<(User, TokenPair), AuthServiceError> {
        if let Some(ip) = client_ip {
            if self.rate_limiter.is_ip_limited(ip).await {
                return Err(AuthServiceError::RateLimited);
            }
            self.rate_limiter.record_ip_request(ip).await;
        }

        if self.rate_limiter.is_username_limited(username).await {
            return Err(AuthServiceError::RateLimited);
        }

        let user = match self.user_repo.get_by_username(username).await? {
            Some(user) => user,
            None => {
                self.rate_limiter.record_failed_attempt(username).await;
                return Err(AuthServiceError::AuthenticationError(
                    "Invalid username or password".to_string(),
                ));
            }
        };

        if !verify_password(password, &user.password_hash)? {
            self.rate_limiter.record_failed_attempt(username).await;
            tracing::warn!(username = %username, "Failed login attempt");
            return Err(AuthServiceError::AuthenticationError(
                "Invalid username or password".to_string(),
            ));
        }

        self.rate_limiter.clear_username_attempts(username).await;
        tracing::info!(user_id = user.id, username = %user.username, "User logged in");

        let tokens = self.tokens.issue_pair(&user)?;
        Ok((user, tokens))
    }

    /// Exchange a refresh token for a fresh token pair.
    ///
    /// Access tokens are rejected here; the user must still exist, and the
    /// new tokens carry the user's current role rather than the role at
    /// original issue time.
    pub async fn refresh(&self, refresh_token: &str) -> Result<(User, TokenPair), AuthServiceError> {
        let claims = self.tokens.verify(refresh_token, "refresh")?;
        let user_id = claims.user_id()?;

        let user = self
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| AuthServiceError::AuthenticationError("User no longer exists".to_string()))?;

        let tokens = self.tokens.issue_pair(&user)?;
        Ok((user, tokens))
    }

    /// Resolve the user behind a verified access token claim
    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>, AuthServiceError> {
        Ok(self.user_repo.get_by_id(user_id).await?)
    }

    /// List users, optionally filtered by role or search term (admin)
    pub async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>, AuthServiceError> {
        Ok(self.user_repo.list(filter).await?)
    }

    /// Create a user with an explicit role (admin).
    ///
    /// Unlike signup, this honors `input.role`, so admins can provision
    /// staff accounts.
    pub async fn create_user(&self, input: CreateUserInput) -> Result<User, AuthServiceError> {
        validate_username(&input.username)?;
        validate_password(&input.password)?;
        if let Some(ref phone) = input.phone_number {
            validate_phone_number(phone)?;
        }

        if self
            .user_repo
            .get_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(AuthServiceError::Conflict(format!(
                "Username '{}' is already taken",
                input.username
            )));
        }

        if let Some(ref phone) = input.phone_number {
            if self.user_repo.get_by_phone_number(phone).await?.is_some() {
                return Err(AuthServiceError::Conflict(
                    "Phone number is already registered".to_string(),
                ));
            }
        }

        let password_hash = hash_password(&input.password)?;
        let role = input.role.unwrap_or_default();
        let user = User::new(input.username, input.phone_number, password_hash, role);

        let created = self.user_repo.create(&user).await?;
        tracing::info!(user_id = created.id, role = %created.role, "User created by admin");
        Ok(created)
    }

    /// Change a user's role (admin)
    pub async fn update_role(&self, user_id: i64, role: UserRole) -> Result<User, AuthServiceError> {
        self.user_repo
            .update_role(user_id, role)
            .await?
            .ok_or(AuthServiceError::UserNotFound)
    }

    /// Delete a user account (admin).
    ///
    /// Admins cannot delete their own account.
    pub async fn delete_user(&self, user_id: i64, acting_user_id: i64) -> Result<(), AuthServiceError> {
        if user_id == acting_user_id {
            return Err(AuthServiceError::ValidationError(
                "Cannot delete your own account".to_string(),
            ));
        }

        if self.user_repo.get_by_id(user_id).await?.is_none() {
            return Err(AuthServiceError::UserNotFound);
        }

        self.user_repo.delete(user_id).await?;
        tracing::info!(user_id, "User deleted by admin");
        Ok(())
    }
}

fn validate_username(username: &str) -> Result<(), AuthServiceError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(AuthServiceError::ValidationError(
            "Username cannot be empty".to_string(),
        ));
    }
    if trimmed.len() < 3 {
        return Err(AuthServiceError::ValidationError(
            "Username must be at least 3 characters".to_string(),
        ));
    }
    if trimmed.len() > MAX_USERNAME_LENGTH {
        return Err(AuthServiceError::ValidationError(format!(
            "Username cannot exceed {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    if trimmed != username {
        return Err(AuthServiceError::ValidationError(
            "Username cannot start or end with whitespace".to_string(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AuthServiceError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthServiceError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

fn validate_phone_number(phone: &str) -> Result<(), AuthServiceError> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AuthServiceError::ValidationError(
            "Phone number must contain only digits with an optional leading +".to_string(),
        ));
    }
    if !(7..=15).contains(&digits.len()) {
        return Err(AuthServiceError::ValidationError(
            "Phone number must be between 7 and 15 digits".to_string(),
        ));
    }
    Ok(())
}
