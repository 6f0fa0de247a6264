//! Order models
//!
//! Orders are created from the cart at checkout. Each order snapshots its
//! line items (name and price at the time of purchase), carries a fulfillment
//! status and a payment status, and records every status change in a history
//! table. Amounts are integers in paise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::catalog::ItemType;

/// Fulfillment lifecycle of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, awaiting payment
    PendingPayment,
    /// Paid, waiting on customer-supplied resources
    PendingResources,
    /// Resources collected, ready to be assigned
    ReadyForProcessing,
    /// Assigned to a staff member
    Assigned,
    /// Work in progress
    InProgress,
    /// Delivered
    Completed,
    /// Cancelled
    Cancelled,
    /// Paused
    OnHold,
}

impl OrderStatus {
    /// Terminal statuses cannot transition to anything else.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::PendingResources => "pending_resources",
            OrderStatus::ReadyForProcessing => "ready_for_processing",
            OrderStatus::Assigned => "assigned",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::OnHold => "on_hold",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for OrderStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_payment" => Ok(OrderStatus::PendingPayment),
            "pending_resources" => Ok(OrderStatus::PendingResources),
            "ready_for_processing" => Ok(OrderStatus::ReadyForProcessing),
            "assigned" => Ok(OrderStatus::Assigned),
            "in_progress" => Ok(OrderStatus::InProgress),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "on_hold" => Ok(OrderStatus::OnHold),
            _ => Err(anyhow::anyhow!("Invalid order status: {}", s)),
        }
    }
}

/// Payment state of an order, independent of fulfillment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for PaymentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "partial" => Ok(PaymentStatus::Partial),
            "paid" => Ok(PaymentStatus::Paid),
            "refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(anyhow::anyhow!("Invalid payment status: {}", s)),
        }
    }
}

/// Work queue priority, set by admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Default for OrderPriority {
    fn default() -> Self {
        Self::Normal
    }
}

impl fmt::Display for OrderPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderPriority::Low => "low",
            OrderPriority::Normal => "normal",
            OrderPriority::High => "high",
            OrderPriority::Urgent => "urgent",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for OrderPriority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(OrderPriority::Low),
            "normal" => Ok(OrderPriority::Normal),
            "high" => Ok(OrderPriority::High),
            "urgent" => Ok(OrderPriority::Urgent),
            _ => Err(anyhow::anyhow!("Invalid order priority: {}", s)),
        }
    }
}

/// An order placed by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique identifier
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Human-readable order number, `EC-YYYYMMDD-XXXXXXXX`
    pub order_number: String,
    /// Total in paise
    pub total_amount: i64,
    /// Fulfillment status
    pub status: OrderStatus,
    /// Payment status
    pub payment_status: PaymentStatus,
    /// Gateway order id, set at checkout
    pub gateway_order_id: Option<String>,
    /// Gateway payment id, set after successful verification
    pub gateway_payment_id: Option<String>,
    /// Gateway signature, stored after successful verification
    pub gateway_signature: Option<String>,
    /// When payment was verified
    pub payment_completed_at: Option<DateTime<Utc>>,
    /// Staff user the order is assigned to
    pub assigned_to: Option<i64>,
    /// Work queue priority
    pub priority: OrderPriority,
    /// Free-form admin notes
    pub admin_notes: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// A snapshotted line on an order. Name and price are copied from the
/// catalog at checkout so later catalog edits do not rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    /// Unique identifier
    pub id: i64,
    /// Owning order
    pub order_id: i64,
    /// Which catalog table the item came from
    pub item_type: ItemType,
    /// Catalog item id at purchase time
    pub item_id: i64,
    /// Name snapshot
    pub name: String,
    /// Unit price snapshot in paise
    pub price: i64,
    /// Quantity purchased
    pub quantity: i64,
}

impl OrderItem {
    /// Line subtotal in paise
    pub fn subtotal(&self) -> i64 {
        self.price * self.quantity
    }
}

/// State of a recorded payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentRecordStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl fmt::Display for PaymentRecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentRecordStatus::Pending => "pending",
            PaymentRecordStatus::Completed => "completed",
            PaymentRecordStatus::Failed => "failed",
            PaymentRecordStatus::Refunded => "refunded",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for PaymentRecordStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentRecordStatus::Pending),
            "completed" => Ok(PaymentRecordStatus::Completed),
            "failed" => Ok(PaymentRecordStatus::Failed),
            "refunded" => Ok(PaymentRecordStatus::Refunded),
            _ => Err(anyhow::anyhow!("Invalid payment record status: {}", s)),
        }
    }
}

/// A recorded payment against an order. One row per order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: i64,
    /// Paid order (unique)
    pub order_id: i64,
    /// Payment method, e.g. "razorpay"
    pub method: String,
    /// Gateway transaction/payment id
    pub transaction_id: String,
    /// Amount in paise
    pub amount: i64,
    /// ISO currency code
    pub currency: String,
    /// Payment record state
    pub status: PaymentRecordStatus,
    /// Invoice number, `INV-YYYYMMDD-XXXXXXXX`
    pub invoice_number: String,
    /// When the payment completed
    pub paid_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Audit trail entry for an order status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusHistory {
    /// Unique identifier
    pub id: i64,
    /// Order the change applies to
    pub order_id: i64,
    /// Status before the change
    pub old_status: OrderStatus,
    /// Status after the change
    pub new_status: OrderStatus,
    /// User who made the change (None for system transitions)
    pub changed_by: Option<i64>,
    /// Free-form reason
    pub reason: String,
    /// When the change happened
    pub changed_at: DateTime<Utc>,
}

/// Generate an order number: `EC-YYYYMMDD-XXXXXXXX` where X is an uppercase
/// hex fragment of a fresh UUID.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    format!(
        "EC-{}-{}",
        now.format("%Y%m%d"),
        short_uuid_fragment()
    )
}

/// Generate an invoice number: `INV-YYYYMMDD-XXXXXXXX`.
pub fn generate_invoice_number(now: DateTime<Utc>) -> String {
    format!(
        "INV-{}-{}",
        now.format("%Y%m%d"),
        short_uuid_fragment()
    )
}

fn short_uuid_fragment() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}
