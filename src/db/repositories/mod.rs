//! Repository layer
//!
//! Trait-based data access with SQLx implementations dispatching per
//! database driver.

pub mod cart;
pub mod catalog;
pub mod order;
pub mod user;

pub use cart::{CartRepository, SqlxCartRepository};
pub use catalog::{CatalogRepository, SqlxCatalogRepository};
pub use order::{
    AssignedFilter, NewOrder, NewOrderItem, NewPayment, OrderFilter, OrderRepository, OrderUpdate,
    ProductSales, RevenueStats, SqlxOrderRepository,
};
pub use user::{SqlxUserRepository, UserFilter, UserRepository};
