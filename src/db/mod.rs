//! Database layer
//!
//! Persistence for the crowdfund core. It supports:
//! - SQLite (default, single-file deployment)
//! - MySQL
//!
//! The driver is selected from configuration. Services never see a concrete
//! pool; they depend on the repository traits in [`repositories`].
//!
//! # Usage
//!
//! ```ignore
//! use crowdfund::config::DatabaseConfig;
//! use crowdfund::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
