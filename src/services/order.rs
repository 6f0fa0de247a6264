//! Order service
//!
//! Checkout, payment verification and the admin work queue.
//!
//! Checkout snapshots the cart into immutable order lines, registers the
//! order with the payment gateway and clears the cart. Payment verification
//! authenticates the gateway callback signature and flips the order to paid
//! exactly once; duplicate callbacks are acknowledged without effect.

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::{
    NewOrder, NewOrderItem, NewPayment, OrderFilter, OrderRepository, OrderUpdate, UserRepository,
};
use crate::models::{
    generate_invoice_number, generate_order_number, Order, OrderItem, OrderStatusHistory, Payment,
};
use crate::payment::PaymentGateway;
use crate::services::cart::{CartService, CartServiceError};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// Payment method recorded for gateway payments
const PAYMENT_METHOD: &str = "razorpay";

/// Error types for order operations
#[derive(Debug, thiserror::Error)]
pub enum OrderServiceError {
    /// Validation error (invalid input or state)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Order does not exist (or is not visible to the caller)
    #[error("Order not found")]
    NotFound,

    /// Payment signature did not verify
    #[error("Payment verification failed")]
    InvalidSignature,

    /// Payment gateway call failed
    #[error("Payment gateway error: {0}")]
    GatewayError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<CartServiceError> for OrderServiceError {
    fn from(e: CartServiceError) -> Self {
        match e {
            CartServiceError::ValidationError(msg) => OrderServiceError::ValidationError(msg),
            CartServiceError::ItemNotFound | CartServiceError::CartItemNotFound => {
                OrderServiceError::NotFound
            }
            CartServiceError::InternalError(e) => OrderServiceError::InternalError(e),
        }
    }
}

/// Checkout details the frontend needs to open the payment widget
#[derive(Debug, Clone, Serialize)]
pub struct GatewayCheckout {
    pub gateway_order_id: String,
    /// Amount in paise
    pub amount: i64,
    pub currency: String,
    pub key_id: String,
}

/// Result of a successful checkout
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payment: GatewayCheckout,
}

/// An order with its snapshotted lines and payment record
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
}

/// Admin order detail including the status audit trail
#[derive(Debug, Clone, Serialize)]
pub struct AdminOrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
    pub status_history: Vec<OrderStatusHistory>,
}

/// Result of a payment verification callback
#[derive(Debug, Clone, Serialize)]
pub struct PaymentVerification {
    pub order: Order,
    pub payment: Payment,
    /// True when this callback was a duplicate of an earlier verification
    pub already_paid: bool,
}

/// Order service
pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
    user_repo: Arc<dyn UserRepository>,
    cart: Arc<CartService>,
    gateway: Arc<dyn PaymentGateway>,
    cache: Arc<MemoryCache>,
    currency: String,
}

impl OrderService {
    /// Create a new order service
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        user_repo: Arc<dyn UserRepository>,
        cart: Arc<CartService>,
        gateway: Arc<dyn PaymentGateway>,
        cache: Arc<MemoryCache>,
        currency: String,
    ) -> Self {
        Self {
            repo,
            user_repo,
            cart,
            gateway,
            cache,
            currency,
        }
    }

    /// Create an order from the user's cart.
    ///
    /// Snapshots the enriched cart lines, registers the order with the
    /// payment gateway and clears the cart. The order starts as
    /// `pending_payment`/`unpaid`.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if the cart is empty
    /// - `GatewayError` if the gateway order could not be created
    pub async fn checkout(&self, user_id: i64) -> Result<CheckoutResponse, OrderServiceError> {
        let cart = self.cart.get_cart(user_id).await?;
        if cart.items.is_empty() {
            return Err(OrderServiceError::ValidationError(
                "Cart is empty".to_string(),
            ));
        }

        let order_number = generate_order_number(Utc::now());
        let gateway_order = self
            .gateway
            .create_order(cart.total, &order_number)
            .await
            .map_err(|e| OrderServiceError::GatewayError(e.to_string()))?;

        let items: Vec<NewOrderItem> = cart
            .items
            .iter()
            .map(|line| NewOrderItem {
                item_type: line.item_type,
                item_id: line.item_id,
                name: line.name.clone(),
                price: line.price,
                quantity: line.quantity,
            })
            .collect();

        let order = self
            .repo
            .create(
                &NewOrder {
                    user_id,
                    order_number,
                    total_amount: cart.total,
                    gateway_order_id: Some(gateway_order.id.clone()),
                },
                &items,
            )
            .await?;

        self.cart.clear(user_id).await?;
        self.invalidate_analytics().await;

        tracing::info!(
            order_id = order.id,
            order_number = %order.order_number,
            total = order.total_amount,
            "Order created"
        );

        let items = self.repo.list_items(order.id).await?;
        Ok(CheckoutResponse {
            payment: GatewayCheckout {
                gateway_order_id: gateway_order.id,
                amount: order.total_amount,
                currency: self.currency.clone(),
                key_id: self.gateway.key_id().to_string(),
            },
            order,
            items,
        })
    }

    /// List the user's own orders, newest first
    pub async fn list_my_orders(&self, user_id: i64) -> Result<Vec<Order>, OrderServiceError> {
        Ok(self.repo.list_for_user(user_id).await?)
    }

    /// Get one of the user's own orders with items and payment.
    ///
    /// Another user's order is reported as not found rather than forbidden.
    pub async fn get_my_order(
        &self,
        user_id: i64,
        order_id: i64,
    ) -> Result<OrderDetail, OrderServiceError> {
        let order = self
            .repo
            .get_by_id(order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(OrderServiceError::NotFound)?;

        let items = self.repo.list_items(order.id).await?;
        let payment = self.repo.get_payment(order.id).await?;
        Ok(OrderDetail {
            order,
            items,
            payment,
        })
    }

    /// Verify a payment callback and mark the order paid.
    ///
    /// The signature must authenticate the (gateway_order_id,
    /// gateway_payment_id) pair against the gateway secret and the
    /// gateway_order_id must match the one stored at checkout. On the first
    /// valid callback the order moves to `paid`/`pending_resources` and a
    /// payment row plus history entry are recorded; later duplicates return
    /// the existing state with `already_paid` set.
    pub async fn verify_payment(
        &self,
        user_id: i64,
        order_id: i64,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> Result<PaymentVerification, OrderServiceError> {
        let order = self
            .repo
            .get_by_id(order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(OrderServiceError::NotFound)?;

        if order.gateway_order_id.as_deref() != Some(gateway_order_id) {
            tracing::warn!(order_id, "Payment callback with mismatched gateway order id");
            return Err(OrderServiceError::InvalidSignature);
        }

        if !self
            .gateway
            .verify_signature(gateway_order_id, gateway_payment_id, signature)
        {
            tracing::warn!(order_id, "Payment callback with invalid signature");
            return Err(OrderServiceError::InvalidSignature);
        }

        let payment_input = NewPayment {
            method: PAYMENT_METHOD.to_string(),
            transaction_id: gateway_payment_id.to_string(),
            amount: order.total_amount,
            currency: self.currency.clone(),
            invoice_number: generate_invoice_number(Utc::now()),
        };

        let transitioned = self
            .repo
            .mark_paid(order.id, gateway_payment_id, signature, &payment_input)
            .await?;

        if transitioned {
            self.invalidate_analytics().await;
            tracing::info!(
                order_id = order.id,
                order_number = %order.order_number,
                "Payment verified"
            );
        } else {
            tracing::info!(order_id = order.id, "Duplicate payment callback ignored");
        }

        let order = self
            .repo
            .get_by_id(order_id)
            .await?
            .ok_or(OrderServiceError::NotFound)?;
        let payment = self
            .repo
            .get_payment(order_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Paid order {} has no payment row", order_id))?;

        Ok(PaymentVerification {
            order,
            payment,
            already_paid: !transitioned,
        })
    }

    /// List orders for the admin panel
    pub async fn admin_list(&self, filter: &OrderFilter) -> Result<Vec<Order>, OrderServiceError> {
        Ok(self.repo.list_filtered(filter).await?)
    }

    /// Get any order with items, payment and status history (admin)
    pub async fn admin_get(&self, order_id: i64) -> Result<AdminOrderDetail, OrderServiceError> {
        let order = self
            .repo
            .get_by_id(order_id)
            .await?
            .ok_or(OrderServiceError::NotFound)?;

        let items = self.repo.list_items(order.id).await?;
        let payment = self.repo.get_payment(order.id).await?;
        let status_history = self.repo.list_status_history(order.id).await?;
        Ok(AdminOrderDetail {
            order,
            items,
            payment,
            status_history,
        })
    }

    /// Update admin-editable order fields.
    ///
    /// Status changes out of a terminal state are rejected, assignees must
    /// be staff (or admin) users, and every status change is appended to
    /// the order's history attributed to the acting admin.
    pub async fn admin_update(
        &self,
        order_id: i64,
        update: OrderUpdate,
        acting_user_id: i64,
    ) -> Result<Order, OrderServiceError> {
        let current = self
            .repo
            .get_by_id(order_id)
            .await?
            .ok_or(OrderServiceError::NotFound)?;

        if let Some(new_status) = update.status {
            if current.status.is_terminal() && new_status != current.status {
                return Err(OrderServiceError::ValidationError(format!(
                    "Cannot change status of a {} order",
                    current.status
                )));
            }
        }

        if let Some(Some(assignee_id)) = update.assigned_to {
            let assignee = self
                .user_repo
                .get_by_id(assignee_id)
                .await?
                .ok_or_else(|| {
                    OrderServiceError::ValidationError("Assignee does not exist".to_string())
                })?;
            if !assignee.is_staff() {
                return Err(OrderServiceError::ValidationError(
                    "Orders can only be assigned to staff users".to_string(),
                ));
            }
        }

        let updated = self
            .repo
            .update_fields(order_id, &update)
            .await?
            .ok_or(OrderServiceError::NotFound)?;

        if let Some(new_status) = update.status {
            if new_status != current.status {
                self.repo
                    .add_status_history(
                        order_id,
                        current.status,
                        new_status,
                        Some(acting_user_id),
                        "Status updated by admin",
                    )
                    .await?;
                tracing::info!(
                    order_id,
                    from = %current.status,
                    to = %new_status,
                    changed_by = acting_user_id,
                    "Order status changed"
                );
            }
        }

        self.invalidate_analytics().await;
        Ok(updated)
    }

    async fn invalidate_analytics(&self) {
        if let Err(e) = self.cache.delete_pattern("analytics:*").await {
            tracing::warn!(error = %e, "Failed to invalidate analytics cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        AssignedFilter, SqlxCartRepository, SqlxCatalogRepository, SqlxOrderRepository,
        SqlxUserRepository,
    };
    use crate::db::{create_test_pool, run_migrations};
    use crate::models::{ItemType, OrderStatus, PackageInput, PaymentStatus};
    use crate::payment::sign_payment;
    use crate::payment::testing::FakeGateway;
    use crate::services::catalog::CatalogService;

    const SECRET: &str = "gateway-secret";

    struct Fixture {
        service: OrderService,
        cart: Arc<CartService>,
        catalog: Arc<CatalogService>,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        // user 1: customer, user 2: staff, user 3: admin, user 4: second customer
        for (name, role) in [
            ("customer", "user"),
            ("staffer", "staff"),
            ("boss", "admin"),
            ("other", "user"),
        ] {
            pool.execute(&format!(
                "INSERT INTO users (username, password_hash, role) VALUES ('{}', 'h', '{}')",
                name, role
            ))
            .await
            .unwrap();
        }

        let cache = Arc::new(MemoryCache::new());
        let catalog = Arc::new(CatalogService::new(
            SqlxCatalogRepository::shared(pool.clone()),
            cache.clone(),
        ));
        let cart = Arc::new(CartService::new(
            SqlxCartRepository::shared(pool.clone()),
            catalog.clone(),
        ));
        let service = OrderService::new(
            SqlxOrderRepository::shared(pool.clone()),
            SqlxUserRepository::shared(pool.clone()),
            cart.clone(),
            Arc::new(FakeGateway::new(SECRET)),
            cache,
            "INR".to_string(),
        );

        Fixture {
            service,
            cart,
            catalog,
        }
    }

    async fn seed_cart(fixture: &Fixture, user_id: i64, price: i64, quantity: i64) {
        let package = fixture
            .catalog
            .create_package(PackageInput {
                name: "Starter".to_string(),
                price,
                description: String::new(),
                features: vec![],
                deliverables: vec![],
                is_active: true,
                is_popular: false,
                popular_order: 0,
            })
            .await
            .unwrap();
        fixture
            .cart
            .add_item(user_id, ItemType::Package, package.id, quantity)
            .await
            .unwrap();
    }

    async fn checkout_and_pay(fixture: &Fixture, user_id: i64) -> PaymentVerification {
        let checkout = fixture.service.checkout(user_id).await.unwrap();
        let gateway_order_id = checkout.payment.gateway_order_id.clone();
        let signature = sign_payment(SECRET, &gateway_order_id, "pay_001");

        fixture
            .service
            .verify_payment(
                user_id,
                checkout.order.id,
                &gateway_order_id,
                "pay_001",
                &signature,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_checkout_snapshots_cart() {
        let fixture = setup().await;
        seed_cart(&fixture, 1, 250000, 2).await;

        let checkout = fixture.service.checkout(1).await.unwrap();
        assert_eq!(checkout.order.total_amount, 500000);
        assert_eq!(checkout.order.status, OrderStatus::PendingPayment);
        assert_eq!(checkout.order.payment_status, PaymentStatus::Unpaid);
        assert!(checkout.order.order_number.starts_with("EC-"));
        assert_eq!(checkout.items.len(), 1);
        assert_eq!(checkout.items[0].name, "Starter");
        assert_eq!(checkout.payment.amount, 500000);
        assert_eq!(checkout.payment.currency, "INR");

        // Cart is cleared by checkout
        let cart = fixture.cart.get_cart(1).await.unwrap();
        assert_eq!(cart.item_count, 0);
    }

    #[tokio::test]
    async fn test_checkout_empty_cart() {
        let fixture = setup().await;
        let result = fixture.service.checkout(1).await;
        assert!(matches!(
            result,
            Err(OrderServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_order_survives_catalog_edit() {
        let fixture = setup().await;
        seed_cart(&fixture, 1, 250000, 1).await;
        let checkout = fixture.service.checkout(1).await.unwrap();

        // Edit the package after checkout; the order keeps the snapshot
        let packages = fixture.catalog.list_all_packages().await.unwrap();
        fixture
            .catalog
            .update_package(
                packages[0].id,
                PackageInput {
                    name: "Renamed".to_string(),
                    price: 999999,
                    description: String::new(),
                    features: vec![],
                    deliverables: vec![],
                    is_active: true,
                    is_popular: false,
                    popular_order: 0,
                },
            )
            .await
            .unwrap();

        let detail = fixture.service.get_my_order(1, checkout.order.id).await.unwrap();
        assert_eq!(detail.items[0].name, "Starter");
        assert_eq!(detail.items[0].price, 250000);
    }

    #[tokio::test]
    async fn test_verify_payment_transitions_order() {
        let fixture = setup().await;
        seed_cart(&fixture, 1, 250000, 1).await;

        let verification = checkout_and_pay(&fixture, 1).await;
        assert!(!verification.already_paid);
        assert_eq!(verification.order.status, OrderStatus::PendingResources);
        assert_eq!(verification.order.payment_status, PaymentStatus::Paid);
        assert_eq!(verification.payment.transaction_id, "pay_001");
        assert!(verification.payment.invoice_number.starts_with("INV-"));
    }

    #[tokio::test]
    async fn test_duplicate_callback_is_idempotent() {
        let fixture = setup().await;
        seed_cart(&fixture, 1, 250000, 1).await;

        let first = checkout_and_pay(&fixture, 1).await;
        let gateway_order_id = first.order.gateway_order_id.clone().unwrap();
        let signature = sign_payment(SECRET, &gateway_order_id, "pay_001");

        let second = fixture
            .service
            .verify_payment(1, first.order.id, &gateway_order_id, "pay_001", &signature)
            .await
            .unwrap();
        assert!(second.already_paid);
        assert_eq!(second.payment.id, first.payment.id);
        assert_eq!(second.order.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_invalid_signature_leaves_order_untouched() {
        let fixture = setup().await;
        seed_cart(&fixture, 1, 250000, 1).await;
        let checkout = fixture.service.checkout(1).await.unwrap();
        let gateway_order_id = checkout.payment.gateway_order_id.clone();

        let result = fixture
            .service
            .verify_payment(1, checkout.order.id, &gateway_order_id, "pay_001", "bad")
            .await;
        assert!(matches!(result, Err(OrderServiceError::InvalidSignature)));

        let detail = fixture.service.get_my_order(1, checkout.order.id).await.unwrap();
        assert_eq!(detail.order.payment_status, PaymentStatus::Unpaid);
        assert!(detail.payment.is_none());
    }

    #[tokio::test]
    async fn test_mismatched_gateway_order_rejected() {
        let fixture = setup().await;
        seed_cart(&fixture, 1, 250000, 1).await;
        let checkout = fixture.service.checkout(1).await.unwrap();

        let signature = sign_payment(SECRET, "order_forged", "pay_001");
        let result = fixture
            .service
            .verify_payment(1, checkout.order.id, "order_forged", "pay_001", &signature)
            .await;
        assert!(matches!(result, Err(OrderServiceError::InvalidSignature)));
    }

    #[tokio::test]
    async fn test_orders_scoped_to_owner() {
        let fixture = setup().await;
        seed_cart(&fixture, 1, 250000, 1).await;
        let checkout = fixture.service.checkout(1).await.unwrap();

        // Another user cannot see or pay the order
        let result = fixture.service.get_my_order(4, checkout.order.id).await;
        assert!(matches!(result, Err(OrderServiceError::NotFound)));

        let gateway_order_id = checkout.payment.gateway_order_id.clone();
        let signature = sign_payment(SECRET, &gateway_order_id, "pay_001");
        let result = fixture
            .service
            .verify_payment(4, checkout.order.id, &gateway_order_id, "pay_001", &signature)
            .await;
        assert!(matches!(result, Err(OrderServiceError::NotFound)));

        assert_eq!(fixture.service.list_my_orders(4).await.unwrap().len(), 0);
        assert_eq!(fixture.service.list_my_orders(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_admin_update_assignment() {
        let fixture = setup().await;
        seed_cart(&fixture, 1, 250000, 1).await;
        let paid = checkout_and_pay(&fixture, 1).await;

        // Assigning to a regular user is rejected
        let result = fixture
            .service
            .admin_update(
                paid.order.id,
                OrderUpdate {
                    assigned_to: Some(Some(4)),
                    ..Default::default()
                },
                3,
            )
            .await;
        assert!(matches!(result, Err(OrderServiceError::ValidationError(_))));

        // Staff assignment works
        let updated = fixture
            .service
            .admin_update(
                paid.order.id,
                OrderUpdate {
                    assigned_to: Some(Some(2)),
                    status: Some(OrderStatus::Assigned),
                    ..Default::default()
                },
                3,
            )
            .await
            .unwrap();
        assert_eq!(updated.assigned_to, Some(2));
        assert_eq!(updated.status, OrderStatus::Assigned);

        // History records the change attributed to the admin
        let detail = fixture.service.admin_get(paid.order.id).await.unwrap();
        let last = detail.status_history.last().unwrap();
        assert_eq!(last.new_status, OrderStatus::Assigned);
        assert_eq!(last.changed_by, Some(3));
    }

    #[tokio::test]
    async fn test_terminal_status_locked() {
        let fixture = setup().await;
        seed_cart(&fixture, 1, 250000, 1).await;
        let paid = checkout_and_pay(&fixture, 1).await;

        fixture
            .service
            .admin_update(
                paid.order.id,
                OrderUpdate {
                    status: Some(OrderStatus::Completed),
                    ..Default::default()
                },
                3,
            )
            .await
            .unwrap();

        let result = fixture
            .service
            .admin_update(
                paid.order.id,
                OrderUpdate {
                    status: Some(OrderStatus::InProgress),
                    ..Default::default()
                },
                3,
            )
            .await;
        assert!(matches!(result, Err(OrderServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_admin_list_filters() {
        let fixture = setup().await;
        seed_cart(&fixture, 1, 250000, 1).await;
        let paid = checkout_and_pay(&fixture, 1).await;

        let by_status = fixture
            .service
            .admin_list(&OrderFilter {
                status: Some(OrderStatus::PendingResources),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_status.len(), 1);

        let unassigned = fixture
            .service
            .admin_list(&OrderFilter {
                assigned_to: Some(AssignedFilter::Unassigned),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(unassigned.len(), 1);

        let by_search = fixture
            .service
            .admin_list(&OrderFilter {
                search: Some(paid.order.order_number.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_search.len(), 1);

        let no_match = fixture
            .service
            .admin_list(&OrderFilter {
                search: Some("EC-NOPE".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(no_match.is_empty());
    }

    #[tokio::test]
    async fn test_admin_update_missing_order() {
        let fixture = setup().await;
        let result = fixture
            .service
            .admin_update(999, OrderUpdate::default(), 3)
            .await;
        assert!(matches!(result, Err(OrderServiceError::NotFound)));
    }
}
