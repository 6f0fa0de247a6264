//! Shared API response types
//!
//! Common response structures used across multiple API endpoints.

use serde::Serialize;

/// Public user info, safe to return to clients
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub phone_number: Option<String>,
    pub role: String,
    pub created_at: String,
}

impl From<crate::models::User> for UserResponse {
    fn from(user: crate::models::User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            phone_number: user.phone_number,
            role: user.role.to_string(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Generic acknowledgement body for deletes and clears
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{User, UserRole};

    #[test]
    fn test_user_response_omits_password_hash() {
        let user = User::new(
            "voter1".to_string(),
            Some("+919876543210".to_string()),
            "secret-hash".to_string(),
            UserRole::User,
        );
        let response: UserResponse = user.into();
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("voter1"));
        assert!(!json.contains("secret-hash"));
    }
}
