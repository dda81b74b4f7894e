//! Inventory repository
//!
//! Database operations for inventory items and everything they own.
//!
//! This module provides:
//! - `InventoryRepository` trait defining the interface for inventory data access
//! - `SqlxInventoryRepository` implementing the trait for SQLite and MySQL
//!
//! Listings are ordered by creation time, oldest first. The regular listing
//! only includes enabled (not soft-deleted) items; the complete listing
//! returned after an import includes everything.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{
    CatalogModelDetail, Condition, Inventory, InventoryCondition, InventoryDetail, InventoryFile,
    InventoryImage, InventoryStatus, InventoryWithModel, NewInventory, UpdateInventoryInput,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use super::catalog::{
    load_model_details_mysql, load_model_details_sqlite, row_to_model_detail_mysql,
    row_to_model_detail_sqlite, MODEL_DETAIL_SELECT,
};

/// Inventory repository trait
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Create an inventory item and its images as one unit of work.
    ///
    /// Either the item and every image row are stored, or nothing is.
    async fn create_with_images(&self, inventory: &NewInventory) -> Result<InventoryWithModel>;

    /// All enabled items with model, conditions, images and files
    async fn list_all(&self) -> Result<Vec<InventoryDetail>>;

    /// Every item, soft-deleted ones and disabled images and files included
    async fn list_complete(&self) -> Result<Vec<InventoryDetail>>;

    /// One enabled item with model, conditions, images and files
    async fn get_detail(&self, id: i64) -> Result<Option<InventoryDetail>>;

    /// Get an enabled item by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Inventory>>;

    /// Apply the present fields of `input`; `None` when the item doesn't exist
    async fn update(&self, id: i64, input: &UpdateInventoryInput) -> Result<Option<Inventory>>;

    /// Mark an item as disabled; returns whether an enabled item was found
    async fn soft_delete(&self, id: i64) -> Result<bool>;

    /// Whether any item (enabled or not) already uses this serial number
    async fn serial_exists(&self, serial_number: &str) -> Result<bool>;
}

/// SQLx-based inventory repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxInventoryRepository {
    pool: DynDatabasePool,
}

impl SqlxInventoryRepository {
    /// Create a new SQLx inventory repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn InventoryRepository> {
        Arc::new(Self::new(pool))
    }
}

/// Which inventory items a detail query loads.
#[derive(Debug, Clone, Copy)]
enum Scope {
    Everything,
    AllEnabled,
    One(i64),
}

impl Scope {
    /// SQL predicate restricting `column` (an inventory id column) to this scope.
    fn filter(self, column: &str) -> String {
        match self {
            Scope::Everything => format!("{} IN (SELECT id FROM inventories)", column),
            Scope::AllEnabled => format!(
                "{} IN (SELECT id FROM inventories WHERE enabled = 1)",
                column
            ),
            Scope::One(_) => format!(
                "{} IN (SELECT id FROM inventories WHERE enabled = 1 AND id = ?)",
                column
            ),
        }
    }

    /// Like [`Scope::filter`], for child tables with their own `enabled` flag.
    fn child_filter(self, column: &str) -> String {
        match self {
            Scope::Everything => self.filter(column),
            _ => format!("enabled = 1 AND {}", self.filter(column)),
        }
    }

    fn id(self) -> Option<i64> {
        match self {
            Scope::Everything | Scope::AllEnabled => None,
            Scope::One(id) => Some(id),
        }
    }
}

const INVENTORY_COLUMNS: &str = "id, model_id, serial_number, reception_date, status, comments, \
                                 enabled, created_by_id, created_at, updated_at";

fn inventories_query(scope: Scope) -> String {
    format!(
        "SELECT {} FROM inventories WHERE {} ORDER BY created_at ASC, id ASC",
        INVENTORY_COLUMNS,
        scope.filter("id")
    )
}

fn models_query(scope: Scope) -> String {
    let inventory_filter = match scope {
        Scope::Everything => "",
        Scope::AllEnabled => " WHERE enabled = 1",
        Scope::One(_) => " WHERE enabled = 1 AND id = ?",
    };
    format!(
        "{} WHERE m.id IN (SELECT model_id FROM inventories{})",
        MODEL_DETAIL_SELECT, inventory_filter
    )
}

fn images_query(scope: Scope) -> String {
    format!(
        "SELECT id, inventory_id, url, type, thumbnail, enabled, created_at \
         FROM images WHERE {} ORDER BY id",
        scope.child_filter("inventory_id")
    )
}

fn files_query(scope: Scope) -> String {
    format!(
        "SELECT id, inventory_id, url, type, name, enabled, created_at \
         FROM inventory_files WHERE {} ORDER BY id",
        scope.child_filter("inventory_id")
    )
}

fn conditions_query(scope: Scope) -> String {
    format!(
        "SELECT ic.id, ic.inventory_id, ic.condition_id, ic.comments, ic.created_at, \
                c.name AS condition_name, c.created_at AS condition_created_at \
         FROM inventory_conditions ic \
         JOIN conditions c ON c.id = ic.condition_id \
         WHERE {} ORDER BY ic.id",
        scope.filter("ic.inventory_id")
    )
}

const INSERT_INVENTORY: &str = r#"
    INSERT INTO inventories (model_id, serial_number, reception_date, status, comments,
                             enabled, created_by_id, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?)
"#;

const INSERT_IMAGE: &str = r#"
    INSERT INTO images (inventory_id, url, type, thumbnail, enabled, created_at)
    VALUES (?, ?, ?, ?, 1, ?)
"#;

const UPDATE_INVENTORY: &str = r#"
    UPDATE inventories
    SET model_id = ?, serial_number = ?, reception_date = ?, status = ?, comments = ?, updated_at = ?
    WHERE id = ? AND enabled = 1
"#;

/// Children of a set of inventory items, grouped by inventory id.
#[derive(Default)]
struct Children {
    models: HashMap<i64, CatalogModelDetail>,
    images: HashMap<i64, Vec<InventoryImage>>,
    files: HashMap<i64, Vec<InventoryFile>>,
    conditions: HashMap<i64, Vec<InventoryCondition>>,
}

impl Children {
    fn assemble(mut self, inventories: Vec<Inventory>) -> Result<Vec<InventoryDetail>> {
        inventories
            .into_iter()
            .map(|inventory| {
                let model = self.models.get(&inventory.model_id).cloned().with_context(|| {
                    format!(
                        "Model {} referenced by inventory {} not found",
                        inventory.model_id, inventory.id
                    )
                })?;
                Ok(InventoryDetail {
                    images: self.images.remove(&inventory.id).unwrap_or_default(),
                    files: self.files.remove(&inventory.id).unwrap_or_default(),
                    conditions: self.conditions.remove(&inventory.id).unwrap_or_default(),
                    model,
                    inventory,
                })
            })
            .collect()
    }
}

fn merge_update(current: Inventory, input: &UpdateInventoryInput) -> Inventory {
    Inventory {
        model_id: input.model_id.unwrap_or(current.model_id),
        serial_number: input
            .serial_number
            .clone()
            .unwrap_or_else(|| current.serial_number.clone()),
        reception_date: input.reception_date.or(current.reception_date),
        status: input.status.unwrap_or(current.status),
        comments: input.comments.clone().or_else(|| current.comments.clone()),
        updated_at: Utc::now(),
        ..current
    }
}

fn parse_status(status: &str) -> Result<InventoryStatus> {
    InventoryStatus::from_str(status)
        .with_context(|| format!("Invalid status in database: {}", status))
}

#[async_trait]
impl InventoryRepository for SqlxInventoryRepository {
    async fn create_with_images(&self, inventory: &NewInventory) -> Result<InventoryWithModel> {
        let (created, mut models) = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let created = create_with_images_sqlite(pool, inventory).await?;
                let models = load_model_details_sqlite(pool, &[created.model_id]).await?;
                (created, models)
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let created = create_with_images_mysql(pool, inventory).await?;
                let models = load_model_details_mysql(pool, &[created.model_id]).await?;
                (created, models)
            }
        };

        let model = models
            .remove(&created.model_id)
            .with_context(|| format!("Model {} not found", created.model_id))?;

        Ok(InventoryWithModel {
            inventory: created,
            model,
        })
    }

    async fn list_all(&self) -> Result<Vec<InventoryDetail>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => load_details_sqlite(self.pool.sqlite()?, Scope::AllEnabled).await,
            DatabaseDriver::Mysql => load_details_mysql(self.pool.mysql()?, Scope::AllEnabled).await,
        }
    }

    async fn list_complete(&self) -> Result<Vec<InventoryDetail>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => load_details_sqlite(self.pool.sqlite()?, Scope::Everything).await,
            DatabaseDriver::Mysql => load_details_mysql(self.pool.mysql()?, Scope::Everything).await,
        }
    }

    async fn get_detail(&self, id: i64) -> Result<Option<InventoryDetail>> {
        let details = match self.pool.driver() {
            DatabaseDriver::Sqlite => load_details_sqlite(self.pool.sqlite()?, Scope::One(id)).await?,
            DatabaseDriver::Mysql => load_details_mysql(self.pool.mysql()?, Scope::One(id)).await?,
        };
        Ok(details.into_iter().next())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Inventory>> {
        let query = inventories_query(Scope::One(id));
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&query)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get inventory")?
                .as_ref()
                .map(row_to_inventory_sqlite)
                .transpose(),
            DatabaseDriver::Mysql => sqlx::query(&query)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get inventory")?
                .as_ref()
                .map(row_to_inventory_mysql)
                .transpose(),
        }
    }

    async fn update(&self, id: i64, input: &UpdateInventoryInput) -> Result<Option<Inventory>> {
        let current = match self.get_by_id(id).await? {
            Some(current) => current,
            None => return Ok(None),
        };
        let merged = merge_update(current, input);

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(UPDATE_INVENTORY)
                    .bind(merged.model_id)
                    .bind(&merged.serial_number)
                    .bind(merged.reception_date)
                    .bind(merged.status.as_str())
                    .bind(&merged.comments)
                    .bind(merged.updated_at)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update inventory")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(UPDATE_INVENTORY)
                    .bind(merged.model_id)
                    .bind(&merged.serial_number)
                    .bind(merged.reception_date)
                    .bind(merged.status.as_str())
                    .bind(&merged.comments)
                    .bind(merged.updated_at)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update inventory")?;
            }
        }

        Ok(Some(merged))
    }

    async fn soft_delete(&self, id: i64) -> Result<bool> {
        let query = "UPDATE inventories SET enabled = 0, updated_at = ? WHERE id = ? AND enabled = 1";
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(query)
                .bind(now)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to disable inventory")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(query)
                .bind(now)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to disable inventory")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn serial_exists(&self, serial_number: &str) -> Result<bool> {
        let query = "SELECT COUNT(*) AS count FROM inventories WHERE serial_number = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(query)
                .bind(serial_number)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check serial number")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(query)
                .bind(serial_number)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to check serial number")?
                .get("count"),
        };
        Ok(count > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_with_images_sqlite(pool: &SqlitePool, new: &NewInventory) -> Result<Inventory> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query(INSERT_INVENTORY)
        .bind(new.model_id)
        .bind(&new.serial_number)
        .bind(new.reception_date)
        .bind(new.status.as_str())
        .bind(&new.comments)
        .bind(new.created_by_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create inventory")?
        .last_insert_rowid();

    for image in &new.images {
        sqlx::query(INSERT_IMAGE)
            .bind(id)
            .bind(&image.url)
            .bind(&image.mime_type)
            .bind(&image.thumbnail)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to create inventory image")?;
    }

    tx.commit().await.context("Failed to commit inventory")?;

    Ok(inserted_inventory(id, new, now))
}

async fn load_details_sqlite(pool: &SqlitePool, scope: Scope) -> Result<Vec<InventoryDetail>> {
    let inventories = bind_scope_sqlite(&inventories_query(scope), scope)
        .fetch_all(pool)
        .await
        .context("Failed to list inventories")?
        .iter()
        .map(row_to_inventory_sqlite)
        .collect::<Result<Vec<_>>>()?;

    if inventories.is_empty() {
        return Ok(Vec::new());
    }

    let mut children = Children::default();

    for row in bind_scope_sqlite(&models_query(scope), scope)
        .fetch_all(pool)
        .await
        .context("Failed to load inventory models")?
    {
        let detail = row_to_model_detail_sqlite(&row);
        children.models.insert(detail.model.id, detail);
    }

    for row in bind_scope_sqlite(&images_query(scope), scope)
        .fetch_all(pool)
        .await
        .context("Failed to load inventory images")?
    {
        let image = InventoryImage {
            id: row.get("id"),
            inventory_id: row.get("inventory_id"),
            url: row.get("url"),
            mime_type: row.get("type"),
            thumbnail: row.get("thumbnail"),
            enabled: row.get("enabled"),
            created_at: row.get("created_at"),
        };
        children.images.entry(image.inventory_id).or_default().push(image);
    }

    for row in bind_scope_sqlite(&files_query(scope), scope)
        .fetch_all(pool)
        .await
        .context("Failed to load inventory files")?
    {
        let file = InventoryFile {
            id: row.get("id"),
            inventory_id: row.get("inventory_id"),
            url: row.get("url"),
            mime_type: row.get("type"),
            name: row.get("name"),
            enabled: row.get("enabled"),
            created_at: row.get("created_at"),
        };
        children.files.entry(file.inventory_id).or_default().push(file);
    }

    for row in bind_scope_sqlite(&conditions_query(scope), scope)
        .fetch_all(pool)
        .await
        .context("Failed to load inventory conditions")?
    {
        let condition_id: i64 = row.get("condition_id");
        let attached = InventoryCondition {
            id: row.get("id"),
            inventory_id: row.get("inventory_id"),
            condition_id,
            comments: row.get("comments"),
            created_at: row.get("created_at"),
            condition: Condition {
                id: condition_id,
                name: row.get("condition_name"),
                created_at: row.get("condition_created_at"),
            },
        };
        children
            .conditions
            .entry(attached.inventory_id)
            .or_default()
            .push(attached);
    }

    children.assemble(inventories)
}

fn bind_scope_sqlite(
    query: &str,
    scope: Scope,
) -> sqlx::query::Query<'_, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
    let q = sqlx::query(query);
    match scope.id() {
        Some(id) => q.bind(id),
        None => q,
    }
}

fn row_to_inventory_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Inventory> {
    let status: String = row.get("status");
    Ok(Inventory {
        id: row.get("id"),
        model_id: row.get("model_id"),
        serial_number: row.get("serial_number"),
        reception_date: row.get("reception_date"),
        status: parse_status(&status)?,
        comments: row.get("comments"),
        enabled: row.get("enabled"),
        created_by_id: row.get("created_by_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_with_images_mysql(pool: &MySqlPool, new: &NewInventory) -> Result<Inventory> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query(INSERT_INVENTORY)
        .bind(new.model_id)
        .bind(&new.serial_number)
        .bind(new.reception_date)
        .bind(new.status.as_str())
        .bind(&new.comments)
        .bind(new.created_by_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create inventory")?
        .last_insert_id() as i64;

    for image in &new.images {
        sqlx::query(INSERT_IMAGE)
            .bind(id)
            .bind(&image.url)
            .bind(&image.mime_type)
            .bind(&image.thumbnail)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to create inventory image")?;
    }

    tx.commit().await.context("Failed to commit inventory")?;

    Ok(inserted_inventory(id, new, now))
}

async fn load_details_mysql(pool: &MySqlPool, scope: Scope) -> Result<Vec<InventoryDetail>> {
    let inventories = bind_scope_mysql(&inventories_query(scope), scope)
        .fetch_all(pool)
        .await
        .context("Failed to list inventories")?
        .iter()
        .map(row_to_inventory_mysql)
        .collect::<Result<Vec<_>>>()?;

    if inventories.is_empty() {
        return Ok(Vec::new());
    }

    let mut children = Children::default();

    for row in bind_scope_mysql(&models_query(scope), scope)
        .fetch_all(pool)
        .await
        .context("Failed to load inventory models")?
    {
        let detail = row_to_model_detail_mysql(&row);
        children.models.insert(detail.model.id, detail);
    }

    for row in bind_scope_mysql(&images_query(scope), scope)
        .fetch_all(pool)
        .await
        .context("Failed to load inventory images")?
    {
        let image = InventoryImage {
            id: row.get("id"),
            inventory_id: row.get("inventory_id"),
            url: row.get("url"),
            mime_type: row.get("type"),
            thumbnail: row.get("thumbnail"),
            enabled: row.get("enabled"),
            created_at: row.get("created_at"),
        };
        children.images.entry(image.inventory_id).or_default().push(image);
    }

    for row in bind_scope_mysql(&files_query(scope), scope)
        .fetch_all(pool)
        .await
        .context("Failed to load inventory files")?
    {
        let file = InventoryFile {
            id: row.get("id"),
            inventory_id: row.get("inventory_id"),
            url: row.get("url"),
            mime_type: row.get("type"),
            name: row.get("name"),
            enabled: row.get("enabled"),
            created_at: row.get("created_at"),
        };
        children.files.entry(file.inventory_id).or_default().push(file);
    }

    for row in bind_scope_mysql(&conditions_query(scope), scope)
        .fetch_all(pool)
        .await
        .context("Failed to load inventory conditions")?
    {
        let condition_id: i64 = row.get("condition_id");
        let attached = InventoryCondition {
            id: row.get("id"),
            inventory_id: row.get("inventory_id"),
            condition_id,
            comments: row.get("comments"),
            created_at: row.get("created_at"),
            condition: Condition {
                id: condition_id,
                name: row.get("condition_name"),
                created_at: row.get("condition_created_at"),
            },
        };
        children
            .conditions
            .entry(attached.inventory_id)
            .or_default()
            .push(attached);
    }

    children.assemble(inventories)
}

fn bind_scope_mysql(
    query: &str,
    scope: Scope,
) -> sqlx::query::Query<'_, sqlx::MySql, sqlx::mysql::MySqlArguments> {
    let q = sqlx::query(query);
    match scope.id() {
        Some(id) => q.bind(id),
        None => q,
    }
}

fn row_to_inventory_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Inventory> {
    let status: String = row.get("status");
    Ok(Inventory {
        id: row.get("id"),
        model_id: row.get("model_id"),
        serial_number: row.get("serial_number"),
        reception_date: row.get("reception_date"),
        status: parse_status(&status)?,
        comments: row.get("comments"),
        enabled: row.get("enabled"),
        created_by_id: row.get("created_by_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn inserted_inventory(id: i64, new: &NewInventory, now: DateTime<Utc>) -> Inventory {
    Inventory {
        id,
        model_id: new.model_id,
        serial_number: new.serial_number.clone(),
        reception_date: new.reception_date,
        status: new.status,
        comments: new.comments.clone(),
        enabled: true,
        created_by_id: new.created_by_id,
        created_at: now,
        updated_at: now,
    }
}
