//! Catalog service
//!
//! Serves package and campaign listings through the cache and funnels admin
//! mutations through to the repository, invalidating cached listings on
//! every write.
//!
//! Cache keys: `packages:active`, `packages:popular`, `campaigns:active`,
//! `campaigns:popular`.

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::CatalogRepository;
use crate::models::{Campaign, CampaignInput, CatalogItem, ItemType, Package, PackageInput};
use std::sync::Arc;
use std::time::Duration;

/// Error types for catalog operations
#[derive(Debug, thiserror::Error)]
pub enum CatalogServiceError {
    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Item does not exist
    #[error("Item not found")]
    NotFound,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Catalog service with read-through caching
pub struct CatalogService {
    repo: Arc<dyn CatalogRepository>,
    cache: Arc<MemoryCache>,
    ttl: Duration,
}

impl CatalogService {
    /// Create a new catalog service
    pub fn new(repo: Arc<dyn CatalogRepository>, cache: Arc<MemoryCache>) -> Self {
        let ttl = cache.default_ttl();
        Self { repo, cache, ttl }
    }

    /// List active packages, optionally only the popular ones.
    ///
    /// Results are cached; mutations through this service invalidate them.
    pub async fn list_packages(
        &self,
        popular_only: bool,
    ) -> Result<Vec<Package>, CatalogServiceError> {
        let key = if popular_only {
            "packages:popular"
        } else {
            "packages:active"
        };

        if let Ok(Some(cached)) = self.cache.get::<Vec<Package>>(key).await {
            return Ok(cached);
        }

        let packages = self.repo.list_packages(true, popular_only).await?;
        if let Err(e) = self.cache.set(key, &packages, self.ttl).await {
            tracing::warn!(key, error = %e, "Failed to cache package listing");
        }
        Ok(packages)
    }

    /// List active campaigns, optionally only the popular ones
    pub async fn list_campaigns(
        &self,
        popular_only: bool,
    ) -> Result<Vec<Campaign>, CatalogServiceError> {
        let key = if popular_only {
            "campaigns:popular"
        } else {
            "campaigns:active"
        };

        if let Ok(Some(cached)) = self.cache.get::<Vec<Campaign>>(key).await {
            return Ok(cached);
        }

        let campaigns = self.repo.list_campaigns(true, popular_only).await?;
        if let Err(e) = self.cache.set(key, &campaigns, self.ttl).await {
            tracing::warn!(key, error = %e, "Failed to cache campaign listing");
        }
        Ok(campaigns)
    }

    /// Get a single active package (storefront detail view). Deactivated
    /// packages are indistinguishable from missing ones.
    pub async fn get_package(&self, id: i64) -> Result<Package, CatalogServiceError> {
        self.repo
            .get_package(id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(CatalogServiceError::NotFound)
    }

    /// Get a single active campaign (storefront detail view)
    pub async fn get_campaign(&self, id: i64) -> Result<Campaign, CatalogServiceError> {
        self.repo
            .get_campaign(id)
            .await?
            .filter(|c| c.is_active)
            .ok_or(CatalogServiceError::NotFound)
    }

    /// Resolve a typed catalog reference (used by cart and checkout)
    pub async fn get_item(
        &self,
        item_type: ItemType,
        id: i64,
    ) -> Result<Option<CatalogItem>, CatalogServiceError> {
        Ok(self.repo.get_item(item_type, id).await?)
    }

    /// List all packages including inactive ones (admin)
    pub async fn list_all_packages(&self) -> Result<Vec<Package>, CatalogServiceError> {
        Ok(self.repo.list_packages(false, false).await?)
    }

    /// List all campaigns including inactive ones (admin)
    pub async fn list_all_campaigns(&self) -> Result<Vec<Campaign>, CatalogServiceError> {
        Ok(self.repo.list_campaigns(false, false).await?)
    }

    /// Create a package (admin)
    pub async fn create_package(&self, input: PackageInput) -> Result<Package, CatalogServiceError> {
        validate_name_and_price(&input.name, input.price)?;
        let package = self.repo.create_package(&input).await?;
        self.invalidate_listings("packages").await;
        tracing::info!(package_id = package.id, name = %package.name, "Package created");
        Ok(package)
    }

    /// Replace a package (admin)
    pub async fn update_package(
        &self,
        id: i64,
        input: PackageInput,
    ) -> Result<Package, CatalogServiceError> {
        validate_name_and_price(&input.name, input.price)?;
        let package = self
            .repo
            .update_package(id, &input)
            .await?
            .ok_or(CatalogServiceError::NotFound)?;
        self.invalidate_listings("packages").await;
        Ok(package)
    }

    /// Deactivate a package (admin). Soft delete so existing orders keep
    /// their references.
    pub async fn deactivate_package(&self, id: i64) -> Result<(), CatalogServiceError> {
        if !self.repo.deactivate_package(id).await? {
            return Err(CatalogServiceError::NotFound);
        }
        self.invalidate_listings("packages").await;
        tracing::info!(package_id = id, "Package deactivated");
        Ok(())
    }

    /// Create a campaign (admin)
    pub async fn create_campaign(
        &self,
        input: CampaignInput,
    ) -> Result<Campaign, CatalogServiceError> {
        validate_name_and_price(&input.name, input.price)?;
        validate_unit(&input.unit)?;
        let campaign = self.repo.create_campaign(&input).await?;
        self.invalidate_listings("campaigns").await;
        tracing::info!(campaign_id = campaign.id, name = %campaign.name, "Campaign created");
        Ok(campaign)
    }

    /// Replace a campaign (admin)
    pub async fn update_campaign(
        &self,
        id: i64,
        input: CampaignInput,
    ) -> Result<Campaign, CatalogServiceError> {
        validate_name_and_price(&input.name, input.price)?;
        validate_unit(&input.unit)?;
        let campaign = self
            .repo
            .update_campaign(id, &input)
            .await?
            .ok_or(CatalogServiceError::NotFound)?;
        self.invalidate_listings("campaigns").await;
        Ok(campaign)
    }

    /// Deactivate a campaign (admin)
    pub async fn deactivate_campaign(&self, id: i64) -> Result<(), CatalogServiceError> {
        if !self.repo.deactivate_campaign(id).await? {
            return Err(CatalogServiceError::NotFound);
        }
        self.invalidate_listings("campaigns").await;
        tracing::info!(campaign_id = id, "Campaign deactivated");
        Ok(())
    }

    async fn invalidate_listings(&self, prefix: &str) {
        if let Err(e) = self.cache.delete_pattern(&format!("{}:*", prefix)).await {
            tracing::warn!(prefix, error = %e, "Failed to invalidate catalog cache");
        }
    }
}

fn validate_name_and_price(name: &str, price: i64) -> Result<(), CatalogServiceError> {
    if name.trim().is_empty() {
        return Err(CatalogServiceError::ValidationError(
            "Name cannot be empty".to_string(),
        ));
    }
    if price <= 0 {
        return Err(CatalogServiceError::ValidationError(
            "Price must be positive".to_string(),
        ));
    }
    Ok(())
}

fn validate_unit(unit: &str) -> Result<(), CatalogServiceError> {
    if unit.trim().is_empty() {
        return Err(CatalogServiceError::ValidationError(
            "Unit cannot be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxCatalogRepository;
    use crate::db::{create_test_pool, run_migrations};

    async fn setup() -> (CatalogService, Arc<MemoryCache>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let cache = Arc::new(MemoryCache::new());
        let service = CatalogService::new(SqlxCatalogRepository::shared(pool), cache.clone());
        (service, cache)
    }

    fn package_input(name: &str, price: i64) -> PackageInput {
        PackageInput {
            name: name.to_string(),
            price,
            description: "desc".to_string(),
            features: vec!["feature".to_string()],
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
    async fn test_create_and_list_packages() {
        let (service, _) = setup().await;

        service
            .create_package(package_input("Starter", 250000))
            .await
            .unwrap();
        let packages = service.list_packages(false).await.unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "Starter");
    }

    #[tokio::test]
    async fn test_listing_is_cached() {
        let (service, cache) = setup().await;

        service
            .create_package(package_input("Starter", 250000))
            .await
            .unwrap();
        service.list_packages(false).await.unwrap();

        let cached: Option<Vec<Package>> = cache.get("packages:active").await.unwrap();
        assert_eq!(cached.map(|p| p.len()), Some(1));
    }

    #[tokio::test]
    async fn test_mutation_invalidates_cache() {
        let (service, cache) = setup().await;

        service
            .create_package(package_input("Starter", 250000))
            .await
            .unwrap();
        service.list_packages(false).await.unwrap();
        cache.run_pending().await;

        service
            .create_package(package_input("Premium", 500000))
            .await
            .unwrap();

        let cached: Option<Vec<Package>> = cache.get("packages:active").await.unwrap();
        assert!(cached.is_none());

        let packages = service.list_packages(false).await.unwrap();
        assert_eq!(packages.len(), 2);
    }

    #[tokio::test]
    async fn test_validation() {
        let (service, _) = setup().await;

        assert!(matches!(
            service.create_package(package_input("", 100)).await,
            Err(CatalogServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.create_package(package_input("Free", 0)).await,
            Err(CatalogServiceError::ValidationError(_))
        ));

        let mut no_unit = campaign_input("LED Van", 100000);
        no_unit.unit = "  ".to_string();
        assert!(matches!(
            service.create_campaign(no_unit).await,
            Err(CatalogServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_update_missing_package() {
        let (service, _) = setup().await;
        let result = service.update_package(42, package_input("X", 100)).await;
        assert!(matches!(result, Err(CatalogServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_deactivate_hides_from_listing() {
        let (service, _) = setup().await;

        let package = service
            .create_package(package_input("Starter", 250000))
            .await
            .unwrap();
        service.deactivate_package(package.id).await.unwrap();

        let listed = service.list_packages(false).await.unwrap();
        assert!(listed.is_empty());

        // Admin listing still shows it
        let all = service.list_all_packages().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].is_active);
    }

    #[tokio::test]
    async fn test_deactivate_hides_from_detail_lookup() {
        let (service, _) = setup().await;

        let package = service
            .create_package(package_input("Starter", 250000))
            .await
            .unwrap();
        let campaign = service
            .create_campaign(campaign_input("LED Van", 1500000))
            .await
            .unwrap();

        assert!(service.get_package(package.id).await.is_ok());
        service.deactivate_package(package.id).await.unwrap();
        assert!(matches!(
            service.get_package(package.id).await,
            Err(CatalogServiceError::NotFound)
        ));

        service.deactivate_campaign(campaign.id).await.unwrap();
        assert!(matches!(
            service.get_campaign(campaign.id).await,
            Err(CatalogServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_campaign_crud() {
        let (service, _) = setup().await;

        let campaign = service
            .create_campaign(campaign_input("LED Van", 1500000))
            .await
            .unwrap();
        assert_eq!(campaign.unit, "per day");

        let mut update = campaign_input("LED Van", 1600000);
        update.unit = "per week".to_string();
        let updated = service.update_campaign(campaign.id, update).await.unwrap();
        assert_eq!(updated.price, 1600000);
        assert_eq!(updated.unit, "per week");

        service.deactivate_campaign(campaign.id).await.unwrap();
        assert!(service.list_campaigns(false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_item_resolves_both_kinds() {
        let (service, _) = setup().await;

        let package = service
            .create_package(package_input("Starter", 250000))
            .await
            .unwrap();
        let campaign = service
            .create_campaign(campaign_input("LED Van", 1500000))
            .await
            .unwrap();

        let p = service
            .get_item(ItemType::Package, package.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(p.unit, None);

        let c = service
            .get_item(ItemType::Campaign, campaign.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(c.unit.as_deref(), Some("per day"));
    }
}
