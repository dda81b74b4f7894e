//! Database layer
//!
//! Persistence for users, sessions, the vehicle/equipment catalog and
//! inventory records. Two backends are supported:
//! - SQLite (default, single-node deployments and tests)
//! - MySQL
//!
//! # Usage
//!
//! ```ignore
//! use mycad::config::DatabaseConfig;
//! use mycad::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
