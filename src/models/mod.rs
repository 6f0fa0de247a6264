//! Data models for the Election Cart backend

pub mod cart;
pub mod catalog;
pub mod order;
pub mod user;

pub use cart::{CartItem, CartLine, CartView};
pub use catalog::{Campaign, CampaignInput, CatalogItem, ItemType, Package, PackageInput};
pub use order::{
    generate_invoice_number, generate_order_number, Order, OrderItem, OrderPriority, OrderStatus,
    OrderStatusHistory, Payment, PaymentRecordStatus, PaymentStatus,
};
pub use user::{CreateUserInput, User, UserRole};
