//! Catalog repository
//!
//! Database operations for packages and campaigns. The `features` and
//! `deliverables` arrays are stored as JSON text in both backends.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Campaign, CampaignInput, CatalogItem, ItemType, Package, PackageInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Catalog repository trait
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// List packages. `active_only` hides deactivated items;
    /// `popular_only` restricts to the popular section ordered by
    /// `popular_order`.
    async fn list_packages(&self, active_only: bool, popular_only: bool) -> Result<Vec<Package>>;

    /// Get a package by id
    async fn get_package(&self, id: i64) -> Result<Option<Package>>;

    /// Create a package
    async fn create_package(&self, input: &PackageInput) -> Result<Package>;

    /// Replace a package's fields
    async fn update_package(&self, id: i64, input: &PackageInput) -> Result<Option<Package>>;

    /// Soft-delete a package (set is_active = false)
    async fn deactivate_package(&self, id: i64) -> Result<bool>;

    /// List campaigns, same filters as packages
    async fn list_campaigns(&self, active_only: bool, popular_only: bool) -> Result<Vec<Campaign>>;

    /// Get a campaign by id
    async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>>;

    /// Create a campaign
    async fn create_campaign(&self, input: &CampaignInput) -> Result<Campaign>;

    /// Replace a campaign's fields
    async fn update_campaign(&self, id: i64, input: &CampaignInput) -> Result<Option<Campaign>>;

    /// Soft-delete a campaign
    async fn deactivate_campaign(&self, id: i64) -> Result<bool>;

    /// Resolve an item reference to a catalog item, regardless of kind
    async fn get_item(&self, item_type: ItemType, id: i64) -> Result<Option<CatalogItem>>;
}

/// SQLx-based catalog repository supporting SQLite and MySQL
pub struct SqlxCatalogRepository {
    pool: DynDatabasePool,
}

impl SqlxCatalogRepository {
    /// Create a new SQLx catalog repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a shared repository for dependency injection
    pub fn shared(pool: DynDatabasePool) -> Arc<dyn CatalogRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CatalogRepository for SqlxCatalogRepository {
    async fn list_packages(&self, active_only: bool, popular_only: bool) -> Result<Vec<Package>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_packages_sqlite(self.pool.as_sqlite().unwrap(), active_only, popular_only)
                    .await
            }
            DatabaseDriver::Mysql => {
                list_packages_mysql(self.pool.as_mysql().unwrap(), active_only, popular_only).await
            }
        }
    }

    async fn get_package(&self, id: i64) -> Result<Option<Package>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_package_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_package_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn create_package(&self, input: &PackageInput) -> Result<Package> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_package_sqlite(self.pool.as_sqlite().unwrap(), input).await
            }
            DatabaseDriver::Mysql => {
                create_package_mysql(self.pool.as_mysql().unwrap(), input).await
            }
        }
    }

    async fn update_package(&self, id: i64, input: &PackageInput) -> Result<Option<Package>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_package_sqlite(self.pool.as_sqlite().unwrap(), id, input).await
            }
            DatabaseDriver::Mysql => {
                update_package_mysql(self.pool.as_mysql().unwrap(), id, input).await
            }
        }
    }

    async fn deactivate_package(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                deactivate_sqlite(self.pool.as_sqlite().unwrap(), "packages", id).await
            }
            DatabaseDriver::Mysql => {
                deactivate_mysql(self.pool.as_mysql().unwrap(), "packages", id).await
            }
        }
    }

    async fn list_campaigns(&self, active_only: bool, popular_only: bool) -> Result<Vec<Campaign>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_campaigns_sqlite(self.pool.as_sqlite().unwrap(), active_only, popular_only)
                    .await
            }
            DatabaseDriver::Mysql => {
                list_campaigns_mysql(self.pool.as_mysql().unwrap(), active_only, popular_only)
                    .await
            }
        }
    }

    async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_campaign_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_campaign_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn create_campaign(&self, input: &CampaignInput) -> Result<Campaign> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_campaign_sqlite(self.pool.as_sqlite().unwrap(), input).await
            }
            DatabaseDriver::Mysql => {
                create_campaign_mysql(self.pool.as_mysql().unwrap(), input).await
            }
        }
    }

    async fn update_campaign(&self, id: i64, input: &CampaignInput) -> Result<Option<Campaign>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_campaign_sqlite(self.pool.as_sqlite().unwrap(), id, input).await
            }
            DatabaseDriver::Mysql => {
                update_campaign_mysql(self.pool.as_mysql().unwrap(), id, input).await
            }
        }
    }

    async fn deactivate_campaign(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                deactivate_sqlite(self.pool.as_sqlite().unwrap(), "campaigns", id).await
            }
            DatabaseDriver::Mysql => {
                deactivate_mysql(self.pool.as_mysql().unwrap(), "campaigns", id).await
            }
        }
    }

    async fn get_item(&self, item_type: ItemType, id: i64) -> Result<Option<CatalogItem>> {
        match item_type {
            ItemType::Package => Ok(self
                .get_package(id)
                .await?
                .as_ref()
                .map(CatalogItem::from)),
            ItemType::Campaign => Ok(self
                .get_campaign(id)
                .await?
                .as_ref()
                .map(CatalogItem::from)),
        }
    }
}

fn list_sql(table: &str, extra_columns: &str, active_only: bool, popular_only: bool) -> String {
    let mut sql = format!(
        "SELECT id, name, price, {}description, features, deliverables, \
         is_active, is_popular, popular_order, created_at, updated_at \
         FROM {} WHERE 1=1",
        extra_columns, table
    );
    if active_only {
        sql.push_str(" AND is_active = TRUE");
    }
    if popular_only {
        sql.push_str(" AND is_popular = TRUE ORDER BY popular_order, id");
    } else {
        sql.push_str(" ORDER BY id");
    }
    sql
}

fn parse_string_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn to_json_text(list: &[String]) -> String {
    serde_json::to_string(list).unwrap_or_else(|_| "[]".to_string())
}

// ============================================================================
// SQLite implementations
// ============================================================================

fn row_to_package_sqlite(row: &sqlx::sqlite::SqliteRow) -> Package {
    let features: String = row.get("features");
    let deliverables: String = row.get("deliverables");
    Package {
        id: row.get("id"),
        name: row.get("name"),
        price: row.get("price"),
        description: row.get("description"),
        features: parse_string_list(&features),
        deliverables: parse_string_list(&deliverables),
        is_active: row.get("is_active"),
        is_popular: row.get("is_popular"),
        popular_order: row.get("popular_order"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_campaign_sqlite(row: &sqlx::sqlite::SqliteRow) -> Campaign {
    let features: String = row.get("features");
    let deliverables: String = row.get("deliverables");
    Campaign {
        id: row.get("id"),
        name: row.get("name"),
        price: row.get("price"),
        unit: row.get("unit"),
        description: row.get("description"),
        features: parse_string_list(&features),
        deliverables: parse_string_list(&deliverables),
        is_active: row.get("is_active"),
        is_popular: row.get("is_popular"),
        popular_order: row.get("popular_order"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

async fn list_packages_sqlite(
    pool: &SqlitePool,
    active_only: bool,
    popular_only: bool,
) -> Result<Vec<Package>> {
    let sql = list_sql("packages", "", active_only, popular_only);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list packages")?;
    Ok(rows.iter().map(row_to_package_sqlite).collect())
}

async fn get_package_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Package>> {
    let row = sqlx::query(
        "SELECT id, name, price, description, features, deliverables, \
         is_active, is_popular, popular_order, created_at, updated_at \
         FROM packages WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get package")?;

    Ok(row.as_ref().map(row_to_package_sqlite))
}

async fn create_package_sqlite(pool: &SqlitePool, input: &PackageInput) -> Result<Package> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO packages
            (name, price, description, features, deliverables,
             is_active, is_popular, popular_order, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.name)
    .bind(input.price)
    .bind(&input.description)
    .bind(to_json_text(&input.features))
    .bind(to_json_text(&input.deliverables))
    .bind(input.is_active)
    .bind(input.is_popular)
    .bind(input.popular_order)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create package")?;

    get_package_sqlite(pool, result.last_insert_rowid())
        .await?
        .ok_or_else(|| anyhow::anyhow!("Package not found after insert"))
}

async fn update_package_sqlite(
    pool: &SqlitePool,
    id: i64,
    input: &PackageInput,
) -> Result<Option<Package>> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE packages
        SET name = ?, price = ?, description = ?, features = ?, deliverables = ?,
            is_active = ?, is_popular = ?, popular_order = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.name)
    .bind(input.price)
    .bind(&input.description)
    .bind(to_json_text(&input.features))
    .bind(to_json_text(&input.deliverables))
    .bind(input.is_active)
    .bind(input.is_popular)
    .bind(input.popular_order)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update package")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_package_sqlite(pool, id).await
}

async fn list_campaigns_sqlite(
    pool: &SqlitePool,
    active_only: bool,
    popular_only: bool,
) -> Result<Vec<Campaign>> {
    let sql = list_sql("campaigns", "unit, ", active_only, popular_only);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list campaigns")?;
    Ok(rows.iter().map(row_to_campaign_sqlite).collect())
}

async fn get_campaign_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Campaign>> {
    let row = sqlx::query(
        "SELECT id, name, price, unit, description, features, deliverables, \
         is_active, is_popular, popular_order, created_at, updated_at \
         FROM campaigns WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get campaign")?;

    Ok(row.as_ref().map(row_to_campaign_sqlite))
}

async fn create_campaign_sqlite(pool: &SqlitePool, input: &CampaignInput) -> Result<Campaign> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO campaigns
            (name, price, unit, description, features, deliverables,
             is_active, is_popular, popular_order, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.name)
    .bind(input.price)
    .bind(&input.unit)
    .bind(&input.description)
    .bind(to_json_text(&input.features))
    .bind(to_json_text(&input.deliverables))
    .bind(input.is_active)
    .bind(input.is_popular)
    .bind(input.popular_order)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create campaign")?;

    get_campaign_sqlite(pool, result.last_insert_rowid())
        .await?
        .ok_or_else(|| anyhow::anyhow!("Campaign not found after insert"))
}

async fn update_campaign_sqlite(
    pool: &SqlitePool,
    id: i64,
    input: &CampaignInput,
) -> Result<Option<Campaign>> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE campaigns
        SET name = ?, price = ?, unit = ?, description = ?, features = ?,
            deliverables = ?, is_active = ?, is_popular = ?, popular_order = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.name)
    .bind(input.price)
    .bind(&input.unit)
    .bind(&input.description)
    .bind(to_json_text(&input.features))
    .bind(to_json_text(&input.deliverables))
    .bind(input.is_active)
    .bind(input.is_popular)
    .bind(input.popular_order)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update campaign")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_campaign_sqlite(pool, id).await
}

async fn deactivate_sqlite(pool: &SqlitePool, table: &str, id: i64) -> Result<bool> {
    let sql = format!(
        "UPDATE {} SET is_active = FALSE, updated_at = ? WHERE id = ?",
        table
    );
    let result = sqlx::query(&sql)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to deactivate row in {}", table))?;

    Ok(result.rows_affected() > 0)
}

// ============================================================================
// MySQL implementations
// ============================================================================

fn row_to_package_mysql(row: &sqlx::mysql::MySqlRow) -> Package {
    let features: String = row.get("features");
    let deliverables: String = row.get("deliverables");
    Package {
        id: row.get("id"),
        name: row.get("name"),
        price: row.get("price"),
        description: row.get("description"),
        features: parse_string_list(&features),
        deliverables: parse_string_list(&deliverables),
        is_active: row.get("is_active"),
        is_popular: row.get("is_popular"),
        popular_order: row.get::<i32, _>("popular_order") as i64,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_campaign_mysql(row: &sqlx::mysql::MySqlRow) -> Campaign {
    let features: String = row.get("features");
    let deliverables: String = row.get("deliverables");
    Campaign {
        id: row.get("id"),
        name: row.get("name"),
        price: row.get("price"),
        unit: row.get("unit"),
        description: row.get("description"),
        features: parse_string_list(&features),
        deliverables: parse_string_list(&deliverables),
        is_active: row.get("is_active"),
        is_popular: row.get("is_popular"),
        popular_order: row.get::<i32, _>("popular_order") as i64,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

async fn list_packages_mysql(
    pool: &MySqlPool,
    active_only: bool,
    popular_only: bool,
) -> Result<Vec<Package>> {
    let sql = list_sql("packages", "", active_only, popular_only);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list packages")?;
    Ok(rows.iter().map(row_to_package_mysql).collect())
}

async fn get_package_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Package>> {
    let row = sqlx::query(
        "SELECT id, name, price, description, features, deliverables, \
         is_active, is_popular, popular_order, created_at, updated_at \
         FROM packages WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get package")?;

    Ok(row.as_ref().map(row_to_package_mysql))
}

async fn create_package_mysql(pool: &MySqlPool, input: &PackageInput) -> Result<Package> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO packages
            (name, price, description, features, deliverables,
             is_active, is_popular, popular_order, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.name)
    .bind(input.price)
    .bind(&input.description)
    .bind(to_json_text(&input.features))
    .bind(to_json_text(&input.deliverables))
    .bind(input.is_active)
    .bind(input.is_popular)
    .bind(input.popular_order)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create package")?;

    get_package_mysql(pool, result.last_insert_id() as i64)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Package not found after insert"))
}

async fn update_package_mysql(
    pool: &MySqlPool,
    id: i64,
    input: &PackageInput,
) -> Result<Option<Package>> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE packages
        SET name = ?, price = ?, description = ?, features = ?, deliverables = ?,
            is_active = ?, is_popular = ?, popular_order = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.name)
    .bind(input.price)
    .bind(&input.description)
    .bind(to_json_text(&input.features))
    .bind(to_json_text(&input.deliverables))
    .bind(input.is_active)
    .bind(input.is_popular)
    .bind(input.popular_order)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update package")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_package_mysql(pool, id).await
}

async fn list_campaigns_mysql(
    pool: &MySqlPool,
    active_only: bool,
    popular_only: bool,
) -> Result<Vec<Campaign>> {
    let sql = list_sql("campaigns", "unit, ", active_only, popular_only);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list campaigns")?;
    Ok(rows.iter().map(row_to_campaign_mysql).collect())
}

async fn get_campaign_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Campaign>> {
    let row = sqlx::query(
        "SELECT id, name, price, unit, description, features, deliverables, \
         is_active, is_popular, popular_order, created_at, updated_at \
         FROM campaigns WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get campaign")?;

    Ok(row.as_ref().map(row_to_campaign_mysql))
}

async fn create_campaign_mysql(pool: &MySqlPool, input: &CampaignInput) -> Result<Campaign> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO campaigns
            (name, price, unit, description, features, deliverables,
             is_active, is_popular, popular_order, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.name)
    .bind(input.price)
    .bind(&input.unit)
    .bind(&input.description)
    .bind(to_json_text(&input.features))
    .bind(to_json_text(&input.deliverables))
    .bind(input.is_active)
    .bind(input.is_popular)
    .bind(input.popular_order)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create campaign")?;

    get_campaign_mysql(pool, result.last_insert_id() as i64)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Campaign not found after insert"))
}

async fn update_campaign_mysql(
    pool: &MySqlPool,
    id: i64,
    input: &CampaignInput,
) -> Result<Option<Campaign>> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE campaigns
        SET name = ?, price = ?, unit = ?, description = ?, features = ?,
            deliverables = ?, is_active = ?, is_popular = ?, popular_order = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.name)
    .bind(input.price)
    .bind(&input.unit)
    .bind(&input.description)
    .bind(to_json_text(&input.features))
    .bind(to_json_text(&input.deliverables))
    .bind(input.is_active)
    .bind(input.is_popular)
    .bind(input.popular_order)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update campaign")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_campaign_mysql(pool, id).await
}

async fn deactivate_mysql(pool: &MySqlPool, table: &str, id: i64) -> Result<bool> {
    let sql = format!(
        "UPDATE {} SET is_active = FALSE, updated_at = ? WHERE id = ?",
        table
    );
    let result = sqlx::query(&sql)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to deactivate row in {}", table))?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> Arc<dyn CatalogRepository> {
        let pool = create_test_pool().await.expect("Failed to create pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxCatalogRepository::shared(pool)
    }

    fn package_input(name: &str, price: i64) -> PackageInput {
        PackageInput {
            name: name.to_string(),
            price,
            description: "desc".to_string(),
            features: vec!["f1".to_string(), "f2".to_string()],
            deliverables: vec!["d1".to_string()],
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
    async fn test_create_and_get_package() {
        let repo = setup().await;

        let created = repo.create_package(&package_input("Starter", 499900)).await.unwrap();
        assert!(created.id > 0);

        let fetched = repo.get_package(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Starter");
        assert_eq!(fetched.price, 499900);
        assert_eq!(fetched.features, vec!["f1", "f2"]);
        assert_eq!(fetched.deliverables, vec!["d1"]);
    }

    #[tokio::test]
    async fn test_list_packages_active_only() {
        let repo = setup().await;
        let a = repo.create_package(&package_input("A", 100)).await.unwrap();
        repo.create_package(&package_input("B", 200)).await.unwrap();

        repo.deactivate_package(a.id).await.unwrap();

        let active = repo.list_packages(true, false).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "B");

        let all = repo.list_packages(false, false).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_popular_packages_ordered() {
        let repo = setup().await;
        let mut first = package_input("First", 100);
        first.is_popular = true;
        first.popular_order = 2;
        let mut second = package_input("Second", 200);
        second.is_popular = true;
        second.popular_order = 1;
        repo.create_package(&first).await.unwrap();
        repo.create_package(&second).await.unwrap();
        repo.create_package(&package_input("Unpopular", 300)).await.unwrap();

        let popular = repo.list_packages(true, true).await.unwrap();
        assert_eq!(popular.len(), 2);
        assert_eq!(popular[0].name, "Second");
        assert_eq!(popular[1].name, "First");
    }

    #[tokio::test]
    async fn test_update_package() {
        let repo = setup().await;
        let created = repo.create_package(&package_input("Old", 100)).await.unwrap();

        let updated = repo
            .update_package(created.id, &package_input("New", 200))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "New");
        assert_eq!(updated.price, 200);

        let missing = repo.update_package(9999, &package_input("X", 1)).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_deactivate_package_is_soft_delete() {
        let repo = setup().await;
        let created = repo.create_package(&package_input("P", 100)).await.unwrap();

        assert!(repo.deactivate_package(created.id).await.unwrap());

        // Row still exists, just inactive
        let fetched = repo.get_package(created.id).await.unwrap().unwrap();
        assert!(!fetched.is_active);

        assert!(!repo.deactivate_package(9999).await.unwrap());
    }

    #[tokio::test]
    async fn test_campaign_unit_roundtrip() {
        let repo = setup().await;
        let created = repo
            .create_campaign(&campaign_input("Door to Door", 150000))
            .await
            .unwrap();

        let fetched = repo.get_campaign(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.unit, "per day");
    }

    #[tokio::test]
    async fn test_get_item_resolves_both_kinds() {
        let repo = setup().await;
        let package = repo.create_package(&package_input("P", 100)).await.unwrap();
        let campaign = repo.create_campaign(&campaign_input("C", 200)).await.unwrap();

        let p = repo.get_item(ItemType::Package, package.id).await.unwrap().unwrap();
        assert_eq!(p.item_type, ItemType::Package);
        assert!(p.unit.is_none());

        let c = repo.get_item(ItemType::Campaign, campaign.id).await.unwrap().unwrap();
        assert_eq!(c.item_type, ItemType::Campaign);
        assert_eq!(c.unit.as_deref(), Some("per day"));

        assert!(repo.get_item(ItemType::Package, 9999).await.unwrap().is_none());
    }
}
