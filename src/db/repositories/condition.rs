//! Condition repository
//!
//! Database operations for the condition catalog and for conditions attached
//! to inventory items.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{AttachConditionInput, Condition, InventoryCondition};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Condition repository trait
#[async_trait]
pub trait ConditionRepository: Send + Sync {
    /// List all conditions ordered by name
    async fn list(&self) -> Result<Vec<Condition>>;

    /// Get condition by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Condition>>;

    /// Create a condition
    async fn create(&self, name: &str) -> Result<Condition>;

    /// Attach a condition to an inventory item
    async fn attach(
        &self,
        inventory_id: i64,
        input: &AttachConditionInput,
    ) -> Result<InventoryCondition>;
}

/// SQLx-based condition repository implementation
pub struct SqlxConditionRepository {
    pool: DynDatabasePool,
}

impl SqlxConditionRepository {
    /// Create a new SQLx condition repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ConditionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ConditionRepository for SqlxConditionRepository {
    async fn list(&self) -> Result<Vec<Condition>> {
        let query = "SELECT id, name, created_at FROM conditions ORDER BY name";
        let conditions = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(query)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list conditions")?
                .iter()
                .map(|row| Condition {
                    id: row.get("id"),
                    name: row.get("name"),
                    created_at: row.get("created_at"),
                })
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(query)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list conditions")?
                .iter()
                .map(|row| Condition {
                    id: row.get("id"),
                    name: row.get("name"),
                    created_at: row.get("created_at"),
                })
                .collect(),
        };
        Ok(conditions)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Condition>> {
        let query = "SELECT id, name, created_at FROM conditions WHERE id = ?";
        let condition = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(query)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get condition")?
                .map(|row| Condition {
                    id: row.get("id"),
                    name: row.get("name"),
                    created_at: row.get("created_at"),
                }),
            DatabaseDriver::Mysql => sqlx::query(query)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get condition")?
                .map(|row| Condition {
                    id: row.get("id"),
                    name: row.get("name"),
                    created_at: row.get("created_at"),
                }),
        };
        Ok(condition)
    }

    async fn create(&self, name: &str) -> Result<Condition> {
        let now = Utc::now();
        let query = "INSERT INTO conditions (name, created_at) VALUES (?, ?)";
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(query)
                .bind(name)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create condition")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(query)
                .bind(name)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create condition")?
                .last_insert_id() as i64,
        };

        Ok(Condition {
            id,
            name: name.to_string(),
            created_at: now,
        })
    }

    async fn attach(
        &self,
        inventory_id: i64,
        input: &AttachConditionInput,
    ) -> Result<InventoryCondition> {
        let condition = self
            .get_by_id(input.condition_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Condition {} not found", input.condition_id))?;

        let now = Utc::now();
        let query = r#"
            INSERT INTO inventory_conditions (inventory_id, condition_id, comments, created_at)
            VALUES (?, ?, ?, ?)
        "#;
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(query)
                .bind(inventory_id)
                .bind(input.condition_id)
                .bind(&input.comments)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to attach condition")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(query)
                .bind(inventory_id)
                .bind(input.condition_id)
                .bind(&input.comments)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to attach condition")?
                .last_insert_id() as i64,
        };

        Ok(InventoryCondition {
            id,
            inventory_id,
            condition_id: input.condition_id,
            comments: input.comments.clone(),
            created_at: now,
            condition,
        })
    }
}
