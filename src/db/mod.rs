//! Database layer
//!
//! Trait-based abstraction over SQLite (default, single-binary deployment)
//! and MySQL (larger deployments). The driver is selected from configuration.
//!
//! # Usage
//!
//! ```ignore
//! use electioncart::config::DatabaseConfig;
//! use electioncart::db::{create_pool, migrations};
//!
//! let config = DatabaseConfig::default();
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use migrations::run_migrations;
pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
