//! Cart repository
//!
//! Database operations for cart items. The cart is keyed by
//! (user, item_type, item_id); `add` merges quantity into an existing row.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CartItem, ItemType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Cart repository trait
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// List a user's cart items, oldest first
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<CartItem>>;

    /// Add an item to a user's cart. If the item is already present the
    /// quantities are merged. Returns the resulting row.
    async fn add(
        &self,
        user_id: i64,
        item_type: ItemType,
        item_id: i64,
        quantity: i64,
    ) -> Result<CartItem>;

    /// Remove a single cart row owned by the user. Returns false if the
    /// row doesn't exist or belongs to someone else.
    async fn remove(&self, user_id: i64, cart_item_id: i64) -> Result<bool>;

    /// Remove all of a user's cart items. Returns the number removed.
    async fn clear(&self, user_id: i64) -> Result<u64>;
}

/// SQLx-based cart repository supporting SQLite and MySQL
pub struct SqlxCartRepository {
    pool: DynDatabasePool,
}

impl SqlxCartRepository {
    /// Create a new SQLx cart repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a shared repository for dependency injection
    pub fn shared(pool: DynDatabasePool) -> Arc<dyn CartRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CartRepository for SqlxCartRepository {
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<CartItem>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_cart_sqlite(self.pool.as_sqlite().unwrap(), user_id).await
            }
            DatabaseDriver::Mysql => list_cart_mysql(self.pool.as_mysql().unwrap(), user_id).await,
        }
    }

    async fn add(
        &self,
        user_id: i64,
        item_type: ItemType,
        item_id: i64,
        quantity: i64,
    ) -> Result<CartItem> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                add_cart_item_sqlite(self.pool.as_sqlite().unwrap(), user_id, item_type, item_id, quantity)
                    .await
            }
            DatabaseDriver::Mysql => {
                add_cart_item_mysql(self.pool.as_mysql().unwrap(), user_id, item_type, item_id, quantity)
                    .await
            }
        }
    }

    async fn remove(&self, user_id: i64, cart_item_id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                remove_cart_item_sqlite(self.pool.as_sqlite().unwrap(), user_id, cart_item_id).await
            }
            DatabaseDriver::Mysql => {
                remove_cart_item_mysql(self.pool.as_mysql().unwrap(), user_id, cart_item_id).await
            }
        }
    }

    async fn clear(&self, user_id: i64) -> Result<u64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                clear_cart_sqlite(self.pool.as_sqlite().unwrap(), user_id).await
            }
            DatabaseDriver::Mysql => clear_cart_mysql(self.pool.as_mysql().unwrap(), user_id).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

fn row_to_cart_item_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<CartItem> {
    let item_type_str: String = row.get("item_type");
    let item_type = ItemType::from_str(&item_type_str)
        .with_context(|| format!("Invalid item type in database: {}", item_type_str))?;

    Ok(CartItem {
        id: row.get("id"),
        user_id: row.get("user_id"),
        item_type,
        item_id: row.get("item_id"),
        quantity: row.get("quantity"),
        added_at: row.get("added_at"),
    })
}

async fn list_cart_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Vec<CartItem>> {
    let rows = sqlx::query(
        "SELECT id, user_id, item_type, item_id, quantity, added_at \
         FROM cart_items WHERE user_id = ? ORDER BY added_at, id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list cart items")?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row_to_cart_item_sqlite(&row)?);
    }
    Ok(items)
}

async fn add_cart_item_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    item_type: ItemType,
    item_id: i64,
    quantity: i64,
) -> Result<CartItem> {
    let now = Utc::now();

    // Merge into an existing row if present, insert otherwise. The unique
    // constraint on (user_id, item_type, item_id) makes the upsert safe.
    sqlx::query(
        r#"
        INSERT INTO cart_items (user_id, item_type, item_id, quantity, added_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (user_id, item_type, item_id)
        DO UPDATE SET quantity = quantity + excluded.quantity
        "#,
    )
    .bind(user_id)
    .bind(item_type.to_string())
    .bind(item_id)
    .bind(quantity)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to add cart item")?;

    let row = sqlx::query(
        "SELECT id, user_id, item_type, item_id, quantity, added_at \
         FROM cart_items WHERE user_id = ? AND item_type = ? AND item_id = ?",
    )
    .bind(user_id)
    .bind(item_type.to_string())
    .bind(item_id)
    .fetch_one(pool)
    .await
    .context("Failed to fetch cart item after add")?;

    row_to_cart_item_sqlite(&row)
}

async fn remove_cart_item_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    cart_item_id: i64,
) -> Result<bool> {
    let result = sqlx::query("DELETE FROM cart_items WHERE id = ? AND user_id = ?")
        .bind(cart_item_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to remove cart item")?;

    Ok(result.rows_affected() > 0)
}

async fn clear_cart_sqlite(pool: &SqlitePool, user_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to clear cart")?;

    Ok(result.rows_affected())
}

// ============================================================================
// MySQL implementations
// ============================================================================

fn row_to_cart_item_mysql(row: &sqlx::mysql::MySqlRow) -> Result<CartItem> {
    let item_type_str: String = row.get("item_type");
    let item_type = ItemType::from_str(&item_type_str)
        .with_context(|| format!("Invalid item type in database: {}", item_type_str))?;

    Ok(CartItem {
        id: row.get("id"),
        user_id: row.get("user_id"),
        item_type,
        item_id: row.get("item_id"),
        quantity: row.get("quantity"),
        added_at: row.get("added_at"),
    })
}

async fn list_cart_mysql(pool: &MySqlPool, user_id: i64) -> Result<Vec<CartItem>> {
    let rows = sqlx::query(
        "SELECT id, user_id, item_type, item_id, quantity, added_at \
         FROM cart_items WHERE user_id = ? ORDER BY added_at, id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list cart items")?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row_to_cart_item_mysql(&row)?);
    }
    Ok(items)
}

async fn add_cart_item_mysql(
    pool: &MySqlPool,
    user_id: i64,
    item_type: ItemType,
    item_id: i64,
    quantity: i64,
) -> Result<CartItem> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO cart_items (user_id, item_type, item_id, quantity, added_at)
        VALUES (?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE quantity = quantity + VALUES(quantity)
        "#,
    )
    .bind(user_id)
    .bind(item_type.to_string())
    .bind(item_id)
    .bind(quantity)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to add cart item")?;

    let row = sqlx::query(
        "SELECT id, user_id, item_type, item_id, quantity, added_at \
         FROM cart_items WHERE user_id = ? AND item_type = ? AND item_id = ?",
    )
    .bind(user_id)
    .bind(item_type.to_string())
    .bind(item_id)
    .fetch_one(pool)
    .await
    .context("Failed to fetch cart item after add")?;

    row_to_cart_item_mysql(&row)
}

async fn remove_cart_item_mysql(
    pool: &MySqlPool,
    user_id: i64,
    cart_item_id: i64,
) -> Result<bool> {
    let result = sqlx::query("DELETE FROM cart_items WHERE id = ? AND user_id = ?")
        .bind(cart_item_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to remove cart item")?;

    Ok(result.rows_affected() > 0)
}

async fn clear_cart_mysql(pool: &MySqlPool, user_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to clear cart")?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup() -> (DynDatabasePool, Arc<dyn CartRepository>) {
        let pool = create_test_pool().await.expect("Failed to create pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute("INSERT INTO users (username, password_hash) VALUES ('u1', 'h')")
            .await
            .unwrap();
        pool.execute("INSERT INTO users (username, password_hash) VALUES ('u2', 'h')")
            .await
            .unwrap();
        let repo = SqlxCartRepository::shared(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let (_pool, repo) = setup().await;

        let item = repo.add(1, ItemType::Package, 10, 2).await.unwrap();
        assert_eq!(item.quantity, 2);
        assert_eq!(item.item_type, ItemType::Package);

        let items = repo.list_for_user(1).await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_add_duplicate_merges_quantity() {
        let (_pool, repo) = setup().await;

        let first = repo.add(1, ItemType::Package, 10, 2).await.unwrap();
        let merged = repo.add(1, ItemType::Package, 10, 3).await.unwrap();

        assert_eq!(merged.id, first.id);
        assert_eq!(merged.quantity, 5);

        // Still a single row
        let items = repo.list_for_user(1).await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_same_id_different_type_are_distinct() {
        let (_pool, repo) = setup().await;

        repo.add(1, ItemType::Package, 10, 1).await.unwrap();
        repo.add(1, ItemType::Campaign, 10, 1).await.unwrap();

        let items = repo.list_for_user(1).await.unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_scoped_to_owner() {
        let (_pool, repo) = setup().await;

        let item = repo.add(1, ItemType::Package, 10, 1).await.unwrap();

        // Another user cannot remove it
        assert!(!repo.remove(2, item.id).await.unwrap());
        assert_eq!(repo.list_for_user(1).await.unwrap().len(), 1);

        assert!(repo.remove(1, item.id).await.unwrap());
        assert!(repo.list_for_user(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_only_affects_owner() {
        let (_pool, repo) = setup().await;

        repo.add(1, ItemType::Package, 10, 1).await.unwrap();
        repo.add(1, ItemType::Campaign, 11, 1).await.unwrap();
        repo.add(2, ItemType::Package, 10, 1).await.unwrap();

        let removed = repo.clear(1).await.unwrap();
        assert_eq!(removed, 2);
        assert!(repo.list_for_user(1).await.unwrap().is_empty());
        assert_eq!(repo.list_for_user(2).await.unwrap().len(), 1);
    }
}
