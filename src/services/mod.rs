//! Services layer - Business logic
//!
//! Coordinates repositories, the cache and the payment gateway, and owns
//! validation and error cases for each operation.

pub mod analytics;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod order;
pub mod password;
pub mod rate_limiter;

pub use analytics::{AnalyticsService, AnalyticsServiceError, AnalyticsSummary};
pub use auth::{AuthService, AuthServiceError, Claims, TokenPair, TokenService};
pub use cart::{CartService, CartServiceError};
pub use catalog::{CatalogService, CatalogServiceError};
pub use order::{
    AdminOrderDetail, CheckoutResponse, GatewayCheckout, OrderDetail, OrderService,
    OrderServiceError, PaymentVerification,
};
pub use password::{hash_password, verify_password};
pub use rate_limiter::LoginRateLimiter;
