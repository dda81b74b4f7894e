//! Inventory models
//!
//! An inventory item is one physical unit (identified by its serial number)
//! of a catalog model. It owns its images and files, and may carry any
//! number of conditions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{CatalogModelDetail, InventoryCondition};

/// Lifecycle status of an inventory item.
///
/// The textual form is the uppercase Spanish label used throughout the
/// application and in import files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum InventoryStatus {
    /// In service
    #[default]
    Alta,
    /// Retired
    Baja,
    /// Proposed for retirement
    Propuesta,
}

impl InventoryStatus {
    /// All accepted textual values, in display order.
    pub const VALUES: [&'static str; 3] = ["ALTA", "BAJA", "PROPUESTA"];

    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryStatus::Alta => "ALTA",
            InventoryStatus::Baja => "BAJA",
            InventoryStatus::Propuesta => "PROPUESTA",
        }
    }
}

impl fmt::Display for InventoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InventoryStatus {
    type Err = anyhow::Error;

    /// Exact, case-sensitive match against [`InventoryStatus::VALUES`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALTA" => Ok(InventoryStatus::Alta),
            "BAJA" => Ok(InventoryStatus::Baja),
            "PROPUESTA" => Ok(InventoryStatus::Propuesta),
            _ => Err(anyhow::anyhow!("Invalid inventory status: {}", s)),
        }
    }
}

/// Inventory row as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub id: i64,
    pub model_id: i64,
    pub serial_number: String,
    pub reception_date: Option<NaiveDate>,
    pub status: InventoryStatus,
    pub comments: Option<String>,
    /// Soft-delete marker
    pub enabled: bool,
    pub created_by_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Image owned by an inventory item. Paths are relative to the public
/// upload root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryImage {
    pub id: i64,
    pub inventory_id: i64,
    pub url: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub thumbnail: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Document attached to an inventory item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryFile {
    pub id: i64,
    pub inventory_id: i64,
    pub url: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub name: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Inventory item with every association loaded, as returned by listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryDetail {
    #[serde(flatten)]
    pub inventory: Inventory,
    pub model: CatalogModelDetail,
    pub conditions: Vec<InventoryCondition>,
    pub images: Vec<InventoryImage>,
    pub files: Vec<InventoryFile>,
}

/// Inventory item with its catalog model, as returned right after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryWithModel {
    #[serde(flatten)]
    pub inventory: Inventory,
    pub model: CatalogModelDetail,
}

/// Image descriptor to persist alongside a new inventory item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImage {
    pub url: String,
    pub mime_type: String,
    pub thumbnail: Option<String>,
}

/// Persistence-ready inventory item. All references are already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInventory {
    pub model_id: i64,
    pub serial_number: String,
    pub reception_date: Option<NaiveDate>,
    pub status: InventoryStatus,
    pub comments: Option<String>,
    pub created_by_id: i64,
    pub images: Vec<NewImage>,
}

/// Input for creating an inventory item through the API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInventoryInput {
    pub model_id: i64,
    pub serial_number: String,
    #[serde(default)]
    pub reception_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: InventoryStatus,
    #[serde(default)]
    pub comments: Option<String>,
}

/// Input for updating an inventory item; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInventoryInput {
    pub model_id: Option<i64>,
    pub serial_number: Option<String>,
    pub reception_date: Option<NaiveDate>,
    pub status: Option<InventoryStatus>,
    pub comments: Option<String>,
}
