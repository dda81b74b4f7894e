//! Catalog repository
//!
//! Database operations for brands, inventory types and catalog models.
//!
//! This module provides:
//! - `CatalogRepository` trait defining the interface for catalog data access
//! - `SqlxCatalogRepository` implementing the trait for SQLite and MySQL
//! - model-detail loaders shared with the inventory repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{
    Brand, CatalogModel, CatalogModelDetail, CreateModelInput, InventoryType, ModelLookup,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

use super::placeholders;

/// Catalog repository trait
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// List all brands ordered by name
    async fn list_brands(&self) -> Result<Vec<Brand>>;

    /// Get brand by ID
    async fn get_brand(&self, id: i64) -> Result<Option<Brand>>;

    /// Create a brand
    async fn create_brand(&self, name: &str) -> Result<Brand>;

    /// List all inventory types ordered by name
    async fn list_types(&self) -> Result<Vec<InventoryType>>;

    /// Get inventory type by ID
    async fn get_type(&self, id: i64) -> Result<Option<InventoryType>>;

    /// Create an inventory type
    async fn create_type(&self, name: &str) -> Result<InventoryType>;

    /// List all catalog models with brand and type
    async fn list_models(&self) -> Result<Vec<CatalogModelDetail>>;

    /// Get a catalog model with brand and type
    async fn get_model(&self, id: i64) -> Result<Option<CatalogModelDetail>>;

    /// Create a catalog model
    async fn create_model(&self, input: &CreateModelInput) -> Result<CatalogModel>;

    /// Find the first enabled model matching name, brand name, type name and year.
    ///
    /// When `lookup.year` is `None` the year filter is dropped if
    /// `year_fallback` is set (any year matches); otherwise nothing matches.
    async fn find_enabled_model(
        &self,
        lookup: &ModelLookup<'_>,
        year_fallback: bool,
    ) -> Result<Option<CatalogModel>>;
}

/// SQLx-based catalog repository implementation
pub struct SqlxCatalogRepository {
    pool: DynDatabasePool,
}

impl SqlxCatalogRepository {
    /// Create a new SQLx catalog repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CatalogRepository> {
        Arc::new(Self::new(pool))
    }
}

/// Which of the two name-only catalog tables a query targets.
#[derive(Debug, Clone, Copy)]
enum NamedTable {
    Brands,
    Types,
}

impl NamedTable {
    fn name(self) -> &'static str {
        match self {
            NamedTable::Brands => "brands",
            NamedTable::Types => "inventory_types",
        }
    }
}

/// A row of `brands` or `inventory_types`; both share one shape.
struct NamedRow {
    id: i64,
    name: String,
    enabled: bool,
    created_at: chrono::DateTime<Utc>,
}

impl From<NamedRow> for Brand {
    fn from(row: NamedRow) -> Self {
        Brand {
            id: row.id,
            name: row.name,
            enabled: row.enabled,
            created_at: row.created_at,
        }
    }
}

impl From<NamedRow> for InventoryType {
    fn from(row: NamedRow) -> Self {
        InventoryType {
            id: row.id,
            name: row.name,
            enabled: row.enabled,
            created_at: row.created_at,
        }
    }
}

impl SqlxCatalogRepository {
    async fn list_named(&self, table: NamedTable) -> Result<Vec<NamedRow>> {
        let query = format!(
            "SELECT id, name, enabled, created_at FROM {} ORDER BY name",
            table.name()
        );
        let context = || format!("Failed to list {}", table.name());
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Ok(sqlx::query(&query)
                .fetch_all(self.pool.sqlite()?)
                .await
                .with_context(context)?
                .iter()
                .map(row_to_named_sqlite)
                .collect()),
            DatabaseDriver::Mysql => Ok(sqlx::query(&query)
                .fetch_all(self.pool.mysql()?)
                .await
                .with_context(context)?
                .iter()
                .map(row_to_named_mysql)
                .collect()),
        }
    }

    async fn get_named(&self, table: NamedTable, id: i64) -> Result<Option<NamedRow>> {
        let query = format!(
            "SELECT id, name, enabled, created_at FROM {} WHERE id = ?",
            table.name()
        );
        let context = || format!("Failed to get row from {}", table.name());
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Ok(sqlx::query(&query)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .with_context(context)?
                .as_ref()
                .map(row_to_named_sqlite)),
            DatabaseDriver::Mysql => Ok(sqlx::query(&query)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .with_context(context)?
                .as_ref()
                .map(row_to_named_mysql)),
        }
    }

    async fn create_named(&self, table: NamedTable, name: &str) -> Result<NamedRow> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO {} (name, enabled, created_at) VALUES (?, 1, ?)",
            table.name()
        );
        let context = || format!("Failed to insert into {}", table.name());
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&query)
                .bind(name)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .with_context(context)?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(&query)
                .bind(name)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .with_context(context)?
                .last_insert_id() as i64,
        };

        Ok(NamedRow {
            id,
            name: name.to_string(),
            enabled: true,
            created_at: now,
        })
    }
}

#[async_trait]
impl CatalogRepository for SqlxCatalogRepository {
    async fn list_brands(&self) -> Result<Vec<Brand>> {
        let rows = self.list_named(NamedTable::Brands).await?;
        Ok(rows.into_iter().map(Brand::from).collect())
    }

    async fn get_brand(&self, id: i64) -> Result<Option<Brand>> {
        Ok(self.get_named(NamedTable::Brands, id).await?.map(Brand::from))
    }

    async fn create_brand(&self, name: &str) -> Result<Brand> {
        Ok(self.create_named(NamedTable::Brands, name).await?.into())
    }

    async fn list_types(&self) -> Result<Vec<InventoryType>> {
        let rows = self.list_named(NamedTable::Types).await?;
        Ok(rows.into_iter().map(InventoryType::from).collect())
    }

    async fn get_type(&self, id: i64) -> Result<Option<InventoryType>> {
        Ok(self
            .get_named(NamedTable::Types, id)
            .await?
            .map(InventoryType::from))
    }

    async fn create_type(&self, name: &str) -> Result<InventoryType> {
        Ok(self.create_named(NamedTable::Types, name).await?.into())
    }

    async fn list_models(&self) -> Result<Vec<CatalogModelDetail>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_models_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => list_models_mysql(self.pool.mysql()?).await,
        }
    }

    async fn get_model(&self, id: i64) -> Result<Option<CatalogModelDetail>> {
        let mut details = match self.pool.driver() {
            DatabaseDriver::Sqlite => load_model_details_sqlite(self.pool.sqlite()?, &[id]).await?,
            DatabaseDriver::Mysql => load_model_details_mysql(self.pool.mysql()?, &[id]).await?,
        };
        Ok(details.remove(&id))
    }

    async fn create_model(&self, input: &CreateModelInput) -> Result<CatalogModel> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_model_sqlite(self.pool.sqlite()?, input).await,
            DatabaseDriver::Mysql => create_model_mysql(self.pool.mysql()?, input).await,
        }
    }

    async fn find_enabled_model(
        &self,
        lookup: &ModelLookup<'_>,
        year_fallback: bool,
    ) -> Result<Option<CatalogModel>> {
        if lookup.year.is_none() && !year_fallback {
            return Ok(None);
        }
        match self.pool.driver() {
            DatabaseDriver::Sqlite => find_enabled_model_sqlite(self.pool.sqlite()?, lookup).await,
            DatabaseDriver::Mysql => find_enabled_model_mysql(self.pool.mysql()?, lookup).await,
        }
    }
}

const MODEL_COLUMNS: &str = "m.id, m.name, m.year, m.brand_id, m.type_id, m.enabled, m.created_at";

pub(crate) const MODEL_DETAIL_SELECT: &str = r#"
    SELECT m.id, m.name, m.year, m.brand_id, m.type_id, m.enabled, m.created_at,
           b.name AS brand_name, b.enabled AS brand_enabled, b.created_at AS brand_created_at,
           t.name AS type_name, t.enabled AS type_enabled, t.created_at AS type_created_at
    FROM models m
    JOIN brands b ON b.id = m.brand_id
    JOIN inventory_types t ON t.id = m.type_id
"#;

fn find_model_query(with_year: bool) -> String {
    let mut query = format!(
        "SELECT {} FROM models m \
         JOIN brands b ON b.id = m.brand_id \
         JOIN inventory_types t ON t.id = m.type_id \
         WHERE m.name = ? AND b.name = ? AND t.name = ? AND m.enabled = 1",
        MODEL_COLUMNS
    );
    if with_year {
        query.push_str(" AND m.year = ?");
    }
    query.push_str(" ORDER BY m.id LIMIT 1");
    query
}

// ============================================================================
// SQLite implementations
// ============================================================================

fn row_to_named_sqlite(row: &sqlx::sqlite::SqliteRow) -> NamedRow {
    NamedRow {
        id: row.get("id"),
        name: row.get("name"),
        enabled: row.get("enabled"),
        created_at: row.get("created_at"),
    }
}

fn row_to_model_sqlite(row: &sqlx::sqlite::SqliteRow) -> CatalogModel {
    CatalogModel {
        id: row.get("id"),
        name: row.get("name"),
        year: row.get("year"),
        brand_id: row.get("brand_id"),
        type_id: row.get("type_id"),
        enabled: row.get("enabled"),
        created_at: row.get("created_at"),
    }
}

pub(crate) fn row_to_model_detail_sqlite(row: &sqlx::sqlite::SqliteRow) -> CatalogModelDetail {
    let model = row_to_model_sqlite(row);
    CatalogModelDetail {
        brand: Brand {
            id: model.brand_id,
            name: row.get("brand_name"),
            enabled: row.get("brand_enabled"),
            created_at: row.get("brand_created_at"),
        },
        inventory_type: InventoryType {
            id: model.type_id,
            name: row.get("type_name"),
            enabled: row.get("type_enabled"),
            created_at: row.get("type_created_at"),
        },
        model,
    }
}

async fn list_models_sqlite(pool: &SqlitePool) -> Result<Vec<CatalogModelDetail>> {
    let query = format!("{} ORDER BY m.name, m.year", MODEL_DETAIL_SELECT);
    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .await
        .context("Failed to list models")?;

    Ok(rows.iter().map(row_to_model_detail_sqlite).collect())
}

/// Load model details for the given ids, keyed by model id.
pub(crate) async fn load_model_details_sqlite(
    pool: &SqlitePool,
    ids: &[i64],
) -> Result<HashMap<i64, CatalogModelDetail>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let query = format!("{} WHERE m.id IN ({})", MODEL_DETAIL_SELECT, placeholders(ids.len()));
    let mut q = sqlx::query(&query);
    for id in ids {
        q = q.bind(*id);
    }
    let rows = q.fetch_all(pool).await.context("Failed to load models")?;

    Ok(rows
        .iter()
        .map(row_to_model_detail_sqlite)
        .map(|detail| (detail.model.id, detail))
        .collect())
}

async fn create_model_sqlite(pool: &SqlitePool, input: &CreateModelInput) -> Result<CatalogModel> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO models (name, year, brand_id, type_id, enabled, created_at)
        VALUES (?, ?, ?, ?, 1, ?)
        "#,
    )
    .bind(&input.name)
    .bind(input.year)
    .bind(input.brand_id)
    .bind(input.type_id)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create model")?;

    Ok(CatalogModel {
        id: result.last_insert_rowid(),
        name: input.name.clone(),
        year: input.year,
        brand_id: input.brand_id,
        type_id: input.type_id,
        enabled: true,
        created_at: now,
    })
}

async fn find_enabled_model_sqlite(
    pool: &SqlitePool,
    lookup: &ModelLookup<'_>,
) -> Result<Option<CatalogModel>> {
    let query = find_model_query(lookup.year.is_some());
    let mut q = sqlx::query(&query)
        .bind(lookup.name)
        .bind(lookup.brand)
        .bind(lookup.inventory_type);
    if let Some(year) = lookup.year {
        q = q.bind(year);
    }

    let row = q
        .fetch_optional(pool)
        .await
        .context("Failed to look up catalog model")?;

    Ok(row.as_ref().map(row_to_model_sqlite))
}

// ============================================================================
// MySQL implementations
// ============================================================================

fn row_to_named_mysql(row: &sqlx::mysql::MySqlRow) -> NamedRow {
    NamedRow {
        id: row.get("id"),
        name: row.get("name"),
        enabled: row.get("enabled"),
        created_at: row.get("created_at"),
    }
}

fn row_to_model_mysql(row: &sqlx::mysql::MySqlRow) -> CatalogModel {
    CatalogModel {
        id: row.get("id"),
        name: row.get("name"),
        year: row.get("year"),
        brand_id: row.get("brand_id"),
        type_id: row.get("type_id"),
        enabled: row.get("enabled"),
        created_at: row.get("created_at"),
    }
}

pub(crate) fn row_to_model_detail_mysql(row: &sqlx::mysql::MySqlRow) -> CatalogModelDetail {
    let model = row_to_model_mysql(row);
    CatalogModelDetail {
        brand: Brand {
            id: model.brand_id,
            name: row.get("brand_name"),
            enabled: row.get("brand_enabled"),
            created_at: row.get("brand_created_at"),
        },
        inventory_type: InventoryType {
            id: model.type_id,
            name: row.get("type_name"),
            enabled: row.get("type_enabled"),
            created_at: row.get("type_created_at"),
        },
        model,
    }
}

async fn list_models_mysql(pool: &MySqlPool) -> Result<Vec<CatalogModelDetail>> {
    let query = format!("{} ORDER BY m.name, m.year", MODEL_DETAIL_SELECT);
    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .await
        .context("Failed to list models")?;

    Ok(rows.iter().map(row_to_model_detail_mysql).collect())
}

pub(crate) async fn load_model_details_mysql(
    pool: &MySqlPool,
    ids: &[i64],
) -> Result<HashMap<i64, CatalogModelDetail>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let query = format!("{} WHERE m.id IN ({})", MODEL_DETAIL_SELECT, placeholders(ids.len()));
    let mut q = sqlx::query(&query);
    for id in ids {
        q = q.bind(*id);
    }
    let rows = q.fetch_all(pool).await.context("Failed to load models")?;

    Ok(rows
        .iter()
        .map(row_to_model_detail_mysql)
        .map(|detail| (detail.model.id, detail))
        .collect())
}

async fn create_model_mysql(pool: &MySqlPool, input: &CreateModelInput) -> Result<CatalogModel> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO models (name, year, brand_id, type_id, enabled, created_at)
        VALUES (?, ?, ?, ?, 1, ?)
        "#,
    )
    .bind(&input.name)
    .bind(input.year)
    .bind(input.brand_id)
    .bind(input.type_id)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create model")?;

    Ok(CatalogModel {
        id: result.last_insert_id() as i64,
        name: input.name.clone(),
        year: input.year,
        brand_id: input.brand_id,
        type_id: input.type_id,
        enabled: true,
        created_at: now,
    })
}

async fn find_enabled_model_mysql(
    pool: &MySqlPool,
    lookup: &ModelLookup<'_>,
) -> Result<Option<CatalogModel>> {
    let query = find_model_query(lookup.year.is_some());
    let mut q = sqlx::query(&query)
        .bind(lookup.name)
        .bind(lookup.brand)
        .bind(lookup.inventory_type);
    if let Some(year) = lookup.year {
        q = q.bind(year);
    }

    let row = q
        .fetch_optional(pool)
        .await
        .context("Failed to look up catalog model")?;

    Ok(row.as_ref().map(row_to_model_mysql))
}
