//! Rate limiter for authentication endpoints
//!
//! Protects login and signup against brute force:
//! - Failed login attempts per username (5 attempts per 15 minutes)
//! - Requests per IP address (10 requests per minute)

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Sliding-window rate limiter for login and signup attempts
pub struct LoginRateLimiter {
    /// Failed login attempts by username
    username_attempts: Arc<RwLock<HashMap<String, Vec<DateTime<Utc>>>>>,
    /// Request attempts by IP address
    ip_attempts: Arc<RwLock<HashMap<IpAddr, Vec<DateTime<Utc>>>>>,
}

impl LoginRateLimiter {
    /// Create a new rate limiter
    pub fn new() -> Self {
        Self {
            username_attempts: Arc::new(RwLock::new(HashMap::new())),
            ip_attempts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Check if username is rate limited (5 attempts per 15 minutes)
    pub async fn is_username_limited(&self, username: &str) -> bool {
        let mut attempts = self.username_attempts.write().await;
        let now = Utc::now();
        let cutoff = now - Duration::minutes(15);

        let username_attempts = attempts.entry(username.to_lowercase()).or_default();
        username_attempts.retain(|time| *time > cutoff);

        username_attempts.len() >= 5
    }

    /// Record a failed login attempt for username
    pub async fn record_failed_attempt(&self, username: &str) {
        let mut attempts = self.username_attempts.write().await;
        attempts
            .entry(username.to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Clear failed attempts for username (on successful login)
    pub async fn clear_username_attempts(&self, username: &str) {
        let mut attempts = self.username_attempts.write().await;
        attempts.remove(&username.to_lowercase());
    }

    /// Check if IP is rate limited (10 requests per minute)
    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        let mut attempts = self.ip_attempts.write().await;
        let now = Utc::now();
        let cutoff = now - Duration::minutes(1);

        let ip_attempts = attempts.entry(ip).or_default();
        ip_attempts.retain(|time| *time > cutoff);

        ip_attempts.len() >= 10
    }

    /// Record a request from IP
    pub async fn record_ip_request(&self, ip: IpAddr) {
        let mut attempts = self.ip_attempts.write().await;
        attempts.entry(ip).or_default().push(Utc::now());
    }

    /// Clean up stale entries (called periodically from a background task)
    pub async fn cleanup(&self) {
        let now = Utc::now();
        let username_cutoff = now - Duration::minutes(15);
        let ip_cutoff = now - Duration::minutes(1);

        {
            let mut attempts = self.username_attempts.write().await;
            attempts.retain(|_, times| {
                times.retain(|time| *time > username_cutoff);
                !times.is_empty()
            });
        }

        {
            let mut attempts = self.ip_attempts.write().await;
            attempts.retain(|_, times| {
                times.retain(|time| *time > ip_cutoff);
                !times.is_empty()
            });
        }
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_username_rate_limit() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..4 {
            assert!(!limiter.is_username_limited("voter1").await);
            limiter.record_failed_attempt("voter1").await;
        }
        limiter.record_failed_attempt("voter1").await;

        assert!(limiter.is_username_limited("voter1").await);

        limiter.clear_username_attempts("voter1").await;
        assert!(!limiter.is_username_limited("voter1").await);
    }

    #[tokio::test]
    async fn test_ip_rate_limit() {
        let limiter = LoginRateLimiter::new();
        let ip = IpAddr::from_str("127.0.0.1").unwrap();

        for _ in 0..9 {
            assert!(!limiter.is_ip_limited(ip).await);
            limiter.record_ip_request(ip).await;
        }
        limiter.record_ip_request(ip).await;

        assert!(limiter.is_ip_limited(ip).await);
    }

    #[tokio::test]
    async fn test_case_insensitive_username() {
        let limiter = LoginRateLimiter::new();

        limiter.record_failed_attempt("Voter1").await;
        limiter.record_failed_attempt("voter1").await;
        limiter.record_failed_attempt("VOTER1").await;

        assert!(!limiter.is_username_limited("voter1").await);
        limiter.record_failed_attempt("voter1").await;
        limiter.record_failed_attempt("voter1").await;
        assert!(limiter.is_username_limited("Voter1").await);
    }

    #[tokio::test]
    async fn test_limits_are_per_user() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..5 {
            limiter.record_failed_attempt("voter1").await;
        }

        assert!(limiter.is_username_limited("voter1").await);
        assert!(!limiter.is_username_limited("voter2").await);
    }
}
