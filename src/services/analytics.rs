//! Analytics service
//!
//! Aggregates revenue, best sellers and queue composition for the admin
//! dashboard. Only paid orders count toward revenue and sales figures.
//!
//! Summaries are cached per date range under `analytics:{start}:{end}`;
//! order mutations invalidate the whole `analytics:*` namespace.

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::{OrderRepository, ProductSales, RevenueStats};
use crate::models::OrderStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// How many best sellers the summary includes
const TOP_PRODUCTS_LIMIT: i64 = 5;

/// Error types for analytics operations
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsServiceError {
    /// Validation error (invalid date range)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Dashboard summary over an optional date range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub revenue: RevenueStats,
    pub top_products: Vec<ProductSales>,
    /// Order counts keyed by status name
    pub orders_by_status: BTreeMap<String, i64>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Analytics service with per-range caching
pub struct AnalyticsService {
    repo: Arc<dyn OrderRepository>,
    cache: Arc<MemoryCache>,
    ttl: Duration,
}

impl AnalyticsService {
    /// Create a new analytics service
    pub fn new(repo: Arc<dyn OrderRepository>, cache: Arc<MemoryCache>) -> Self {
        let ttl = cache.default_ttl();
        Self { repo, cache, ttl }
    }

    /// Compute (or fetch from cache) the dashboard summary.
    ///
    /// # Errors
    ///
    /// `ValidationError` if `start` is after `end`.
    pub async fn summary(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<AnalyticsSummary, AnalyticsServiceError> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(AnalyticsServiceError::ValidationError(
                    "Start date must not be after end date".to_string(),
                ));
            }
        }

        let key = cache_key(start, end);
        if let Ok(Some(cached)) = self.cache.get::<AnalyticsSummary>(&key).await {
            return Ok(cached);
        }

        let revenue = self.repo.revenue_stats(start, end).await?;
        let top_products = self.repo.top_products(start, end, TOP_PRODUCTS_LIMIT).await?;
        let counts = self.repo.status_counts().await?;

        let mut orders_by_status = BTreeMap::new();
        for status in [
            OrderStatus::PendingPayment,
            OrderStatus::PendingResources,
            OrderStatus::ReadyForProcessing,
            OrderStatus::Assigned,
            OrderStatus::InProgress,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::OnHold,
        ] {
            orders_by_status.insert(status.to_string(), 0);
        }
        for (status, count) in counts {
            orders_by_status.insert(status.to_string(), count);
        }

        let summary = AnalyticsSummary {
            revenue,
            top_products,
            orders_by_status,
            start,
            end,
        };

        if let Err(e) = self.cache.set(&key, &summary, self.ttl).await {
            tracing::warn!(key, error = %e, "Failed to cache analytics summary");
        }

        Ok(summary)
    }
}

fn cache_key(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> String {
    let fmt = |t: Option<DateTime<Utc>>| {
        t.map(|t| t.timestamp().to_string())
            .unwrap_or_else(|| "all".to_string())
    };
    format!("analytics:{}:{}", fmt(start), fmt(end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{NewOrder, NewOrderItem, NewPayment, SqlxOrderRepository};
    use crate::db::{create_test_pool, run_migrations, DynDatabasePool};
    use crate::models::ItemType;
    use chrono::TimeZone;

    async fn setup() -> (AnalyticsService, Arc<dyn OrderRepository>, DynDatabasePool) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        pool.execute("INSERT INTO users (username, password_hash) VALUES ('u1', 'h')")
            .await
            .unwrap();

        let repo = SqlxOrderRepository::shared(pool.clone());
        let service = AnalyticsService::new(repo.clone(), Arc::new(MemoryCache::new()));
        (service, repo, pool)
    }

    async fn place_order(
        repo: &Arc<dyn OrderRepository>,
        number: &str,
        amount: i64,
        paid: bool,
    ) -> i64 {
        let order = repo
            .create(
                &NewOrder {
                    user_id: 1,
                    order_number: number.to_string(),
                    total_amount: amount,
                    gateway_order_id: Some(format!("order_{}", number)),
                },
                &[NewOrderItem {
                    item_type: ItemType::Package,
                    item_id: 1,
                    name: "Starter".to_string(),
                    price: amount,
                    quantity: 1,
                }],
            )
            .await
            .unwrap();

        if paid {
            repo.mark_paid(
                order.id,
                "pay_1",
                "sig",
                &NewPayment {
                    method: "razorpay".to_string(),
                    transaction_id: format!("pay_{}", number),
                    amount,
                    currency: "INR".to_string(),
                    invoice_number: format!("INV-{}", number),
                },
            )
            .await
            .unwrap();
        }

        order.id
    }

    #[tokio::test]
    async fn test_summary_counts_only_paid_orders() {
        let (service, repo, _pool) = setup().await;

        place_order(&repo, "EC-1", 250000, true).await;
        place_order(&repo, "EC-2", 150000, true).await;
        place_order(&repo, "EC-3", 999999, false).await;

        let summary = service.summary(None, None).await.unwrap();
        assert_eq!(summary.revenue.total_revenue, 400000);
        assert_eq!(summary.revenue.order_count, 2);
        assert_eq!(summary.revenue.average_order_value, 200000);
    }

    #[tokio::test]
    async fn test_summary_status_breakdown() {
        let (service, repo, _pool) = setup().await;

        place_order(&repo, "EC-1", 250000, true).await;
        place_order(&repo, "EC-2", 150000, false).await;

        let summary = service.summary(None, None).await.unwrap();
        assert_eq!(summary.orders_by_status["pending_payment"], 1);
        assert_eq!(summary.orders_by_status["pending_resources"], 1);
        assert_eq!(summary.orders_by_status["completed"], 0);
    }

    #[tokio::test]
    async fn test_summary_top_products() {
        let (service, repo, _pool) = setup().await;

        place_order(&repo, "EC-1", 250000, true).await;
        place_order(&repo, "EC-2", 250000, true).await;

        let summary = service.summary(None, None).await.unwrap();
        assert_eq!(summary.top_products.len(), 1);
        assert_eq!(summary.top_products[0].quantity_sold, 2);
        assert_eq!(summary.top_products[0].revenue, 500000);
    }

    #[tokio::test]
    async fn test_summary_empty() {
        let (service, _repo, _pool) = setup().await;
        let summary = service.summary(None, None).await.unwrap();
        assert_eq!(summary.revenue.total_revenue, 0);
        assert_eq!(summary.revenue.order_count, 0);
        assert_eq!(summary.revenue.average_order_value, 0);
        assert!(summary.top_products.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_range_rejected() {
        let (service, _repo, _pool) = setup().await;
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();

        let result = service.summary(Some(start), Some(end)).await;
        assert!(matches!(
            result,
            Err(AnalyticsServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_summary_is_cached() {
        let (service, repo, _pool) = setup().await;
        place_order(&repo, "EC-1", 250000, true).await;

        let first = service.summary(None, None).await.unwrap();

        // A new paid order without cache invalidation is not reflected
        place_order(&repo, "EC-2", 250000, true).await;
        let second = service.summary(None, None).await.unwrap();
        assert_eq!(first.revenue.total_revenue, second.revenue.total_revenue);
    }

    #[tokio::test]
    async fn test_date_range_filters() {
        let (service, repo, _pool) = setup().await;
        place_order(&repo, "EC-1", 250000, true).await;

        // A window entirely in the past excludes today's order
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2020, 12, 31, 0, 0, 0).unwrap();
        let summary = service.summary(Some(start), Some(end)).await.unwrap();
        assert_eq!(summary.revenue.order_count, 0);
    }
}
