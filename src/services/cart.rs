//! Cart service
//!
//! Validates cart mutations against the live catalog and enriches stored
//! lines with current names and prices for display. Lines whose catalog
//! item has since been deactivated are dropped from the view rather than
//! priced at stale values.

use crate::db::repositories::CartRepository;
use crate::models::{CartItem, CartLine, CartView, ItemType};
use crate::services::catalog::{CatalogService, CatalogServiceError};
use std::sync::Arc;

/// Error types for cart operations
#[derive(Debug, thiserror::Error)]
pub enum CartServiceError {
    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Referenced catalog item is missing or inactive
    #[error("Item not found")]
    ItemNotFound,

    /// Cart line does not exist or belongs to another user
    #[error("Cart item not found")]
    CartItemNotFound,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<CatalogServiceError> for CartServiceError {
    fn from(e: CatalogServiceError) -> Self {
        match e {
            CatalogServiceError::NotFound => CartServiceError::ItemNotFound,
            CatalogServiceError::ValidationError(msg) => CartServiceError::ValidationError(msg),
            CatalogServiceError::InternalError(e) => CartServiceError::InternalError(e),
        }
    }
}

/// Cart service
pub struct CartService {
    repo: Arc<dyn CartRepository>,
    catalog: Arc<CatalogService>,
}

impl CartService {
    /// Create a new cart service
    pub fn new(repo: Arc<dyn CartRepository>, catalog: Arc<CatalogService>) -> Self {
        Self { repo, catalog }
    }

    /// Get the user's cart enriched with current catalog data.
    ///
    /// Lines referencing items that no longer exist or were deactivated
    /// are skipped; the total reflects only the lines returned.
    pub async fn get_cart(&self, user_id: i64) -> Result<CartView, CartServiceError> {
        let items = self.repo.list_for_user(user_id).await?;
        let mut lines = Vec::with_capacity(items.len());

        for item in items {
            match self.catalog.get_item(item.item_type, item.item_id).await? {
                Some(catalog_item) if catalog_item.is_active => {
                    lines.push(CartLine {
                        id: item.id,
                        item_type: item.item_type,
                        item_id: item.item_id,
                        name: catalog_item.name,
                        price: catalog_item.price,
                        unit: catalog_item.unit,
                        quantity: item.quantity,
                        subtotal: catalog_item.price * item.quantity,
                    });
                }
                _ => {
                    tracing::debug!(
                        cart_item_id = item.id,
                        item_type = %item.item_type,
                        item_id = item.item_id,
                        "Skipping cart line for unavailable catalog item"
                    );
                }
            }
        }

        Ok(CartView::from_lines(lines))
    }

    /// Add an item to the cart, merging quantity if the line already
    /// exists.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if quantity is not positive
    /// - `ItemNotFound` if the catalog item is missing or inactive
    pub async fn add_item(
        &self,
        user_id: i64,
        item_type: ItemType,
        item_id: i64,
        quantity: i64,
    ) -> Result<CartItem, CartServiceError> {
        if quantity <= 0 {
            return Err(CartServiceError::ValidationError(
                "Quantity must be positive".to_string(),
            ));
        }

        let catalog_item = self
            .catalog
            .get_item(item_type, item_id)
            .await?
            .ok_or(CartServiceError::ItemNotFound)?;
        if !catalog_item.is_active {
            return Err(CartServiceError::ItemNotFound);
        }

        let item = self.repo.add(user_id, item_type, item_id, quantity).await?;
        tracing::debug!(user_id, cart_item_id = item.id, "Cart item added");
        Ok(item)
    }

    /// Remove a cart line. Only the owner's lines are removable.
    pub async fn remove_item(&self, user_id: i64, cart_item_id: i64) -> Result<(), CartServiceError> {
        if self.repo.remove(user_id, cart_item_id).await? {
            Ok(())
        } else {
            Err(CartServiceError::CartItemNotFound)
        }
    }

    /// Remove all lines from the user's cart
    pub async fn clear(&self, user_id: i64) -> Result<u64, CartServiceError> {
        Ok(self.repo.clear(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{SqlxCartRepository, SqlxCatalogRepository};
    use crate::db::{create_test_pool, run_migrations};
    use crate::models::{CampaignInput, PackageInput};

    async fn setup() -> (CartService, Arc<CatalogService>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        pool.execute("INSERT INTO users (username, password_hash) VALUES ('u1', 'h')")
            .await
            .unwrap();
        pool.execute("INSERT INTO users (username, password_hash) VALUES ('u2', 'h')")
            .await
            .unwrap();

        let catalog = Arc::new(CatalogService::new(
            SqlxCatalogRepository::shared(pool.clone()),
            Arc::new(MemoryCache::new()),
        ));
        let service = CartService::new(SqlxCartRepository::shared(pool), catalog.clone());
        (service, catalog)
    }

    fn package_input(name: &str, price: i64) -> PackageInput {
        PackageInput {
            name: name.to_string(),
            price,
            description: String::new(),
            features: vec![],
            deliverables: vec![],
            is_active: true,
            is_popular: false,
            popular_order: 0,
        }
    }

    fn campaign_input(name: &str, price: i64) -> CampaignInput {
        CampaignInput {
            name: name.to_string(),
            price,
            unit: "per day".to_string(),
            description: String::new(),
            features: vec![],
            deliverables: vec![],
            is_active: true,
            is_popular: false,
            popular_order: 0,
        }
    }

    #[tokio::test]
    async fn test_add_and_view_cart() {
        let (service, catalog) = setup().await;
        let package = catalog
            .create_package(package_input("Starter", 250000))
            .await
            .unwrap();

        service
            .add_item(1, ItemType::Package, package.id, 2)
            .await
            .unwrap();

        let view = service.get_cart(1).await.unwrap();
        assert_eq!(view.item_count, 1);
        assert_eq!(view.items[0].subtotal, 500000);
        assert_eq!(view.total, 500000);
    }

    #[tokio::test]
    async fn test_add_merges_quantity() {
        let (service, catalog) = setup().await;
        let package = catalog
            .create_package(package_input("Starter", 100000))
            .await
            .unwrap();

        service
            .add_item(1, ItemType::Package, package.id, 2)
            .await
            .unwrap();
        let merged = service
            .add_item(1, ItemType::Package, package.id, 3)
            .await
            .unwrap();
        assert_eq!(merged.quantity, 5);

        let view = service.get_cart(1).await.unwrap();
        assert_eq!(view.item_count, 1);
        assert_eq!(view.total, 500000);
    }

    #[tokio::test]
    async fn test_add_rejects_bad_quantity() {
        let (service, catalog) = setup().await;
        let package = catalog
            .create_package(package_input("Starter", 100000))
            .await
            .unwrap();

        let result = service.add_item(1, ItemType::Package, package.id, 0).await;
        assert!(matches!(result, Err(CartServiceError::ValidationError(_))));

        let result = service.add_item(1, ItemType::Package, package.id, -1).await;
        assert!(matches!(result, Err(CartServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_add_missing_item() {
        let (service, _) = setup().await;
        let result = service.add_item(1, ItemType::Package, 42, 1).await;
        assert!(matches!(result, Err(CartServiceError::ItemNotFound)));
    }

    #[tokio::test]
    async fn test_add_inactive_item() {
        let (service, catalog) = setup().await;
        let package = catalog
            .create_package(package_input("Starter", 100000))
            .await
            .unwrap();
        catalog.deactivate_package(package.id).await.unwrap();

        let result = service.add_item(1, ItemType::Package, package.id, 1).await;
        assert!(matches!(result, Err(CartServiceError::ItemNotFound)));
    }

    #[tokio::test]
    async fn test_deactivated_item_dropped_from_view() {
        let (service, catalog) = setup().await;
        let package = catalog
            .create_package(package_input("Starter", 100000))
            .await
            .unwrap();
        let campaign = catalog
            .create_campaign(campaign_input("LED Van", 1500000))
            .await
            .unwrap();

        service
            .add_item(1, ItemType::Package, package.id, 1)
            .await
            .unwrap();
        service
            .add_item(1, ItemType::Campaign, campaign.id, 2)
            .await
            .unwrap();

        catalog.deactivate_package(package.id).await.unwrap();

        let view = service.get_cart(1).await.unwrap();
        assert_eq!(view.item_count, 1);
        assert_eq!(view.items[0].name, "LED Van");
        assert_eq!(view.items[0].unit.as_deref(), Some("per day"));
        assert_eq!(view.total, 3000000);
    }

    #[tokio::test]
    async fn test_remove_scoped_to_owner() {
        let (service, catalog) = setup().await;
        let package = catalog
            .create_package(package_input("Starter", 100000))
            .await
            .unwrap();

        let item = service
            .add_item(1, ItemType::Package, package.id, 1)
            .await
            .unwrap();

        let result = service.remove_item(2, item.id).await;
        assert!(matches!(result, Err(CartServiceError::CartItemNotFound)));

        service.remove_item(1, item.id).await.unwrap();
        assert_eq!(service.get_cart(1).await.unwrap().item_count, 0);
    }

    #[tokio::test]
    async fn test_clear() {
        let (service, catalog) = setup().await;
        let package = catalog
            .create_package(package_input("Starter", 100000))
            .await
            .unwrap();
        let campaign = catalog
            .create_campaign(campaign_input("LED Van", 1500000))
            .await
            .unwrap();

        service
            .add_item(1, ItemType::Package, package.id, 1)
            .await
            .unwrap();
        service
            .add_item(1, ItemType::Campaign, campaign.id, 1)
            .await
            .unwrap();

        let removed = service.clear(1).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(service.get_cart(1).await.unwrap().item_count, 0);
    }
}
