//! Cart models
//!
//! A cart is the set of `CartItem` rows owned by one user. Items are unique
//! per (user, item_type, item_id); adding an existing item merges quantity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::ItemType;

/// A single line in a user's cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    /// Unique identifier
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Which catalog table `item_id` points into
    pub item_type: ItemType,
    /// Catalog item id
    pub item_id: i64,
    /// Quantity, always >= 1
    pub quantity: i64,
    /// When the line was first added
    pub added_at: DateTime<Utc>,
}

/// A cart line enriched with current catalog data for display.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub id: i64,
    pub item_type: ItemType,
    pub item_id: i64,
    pub name: String,
    /// Unit price in paise
    pub price: i64,
    /// Pricing unit for campaigns, absent for packages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub quantity: i64,
    /// price * quantity, in paise
    pub subtotal: i64,
}

/// The full cart view returned by `GET /api/cart/`.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    /// Sum of line subtotals, in paise
    pub total: i64,
    pub item_count: usize,
}

impl CartView {
    /// Build a view from enriched lines, computing the total.
    pub fn from_lines(items: Vec<CartLine>) -> Self {
        let total = items.iter().map(|l| l.subtotal).sum();
        let item_count = items.len();
        Self {
            items,
            total,
            item_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, quantity: i64) -> CartLine {
        CartLine {
            id: 1,
            item_type: ItemType::Package,
            item_id: 1,
            name: "Starter".to_string(),
            price,
            unit: None,
            quantity,
            subtotal: price * quantity,
        }
    }

    #[test]
    fn test_cart_view_total() {
        let view = CartView::from_lines(vec![line(100000, 2), line(50000, 3)]);
        assert_eq!(view.total, 350000);
        assert_eq!(view.item_count, 2);
    }

    #[test]
    fn test_cart_view_empty() {
        let view = CartView::from_lines(vec![]);
        assert_eq!(view.total, 0);
        assert_eq!(view.item_count, 0);
    }
}
