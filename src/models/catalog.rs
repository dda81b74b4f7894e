//! Catalog models
//!
//! Brands, inventory types and the catalog models built from them. An
//! inventory item always belongs to exactly one catalog model, identified by
//! name, year, brand and type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Manufacturer of a catalog model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
    pub id: i64,
    pub name: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Kind of equipment (vehicle, radio, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryType {
    pub id: i64,
    pub name: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Catalog model row as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogModel {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub brand_id: i64,
    pub type_id: i64,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Catalog model with its brand and type embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogModelDetail {
    #[serde(flatten)]
    pub model: CatalogModel,
    pub brand: Brand,
    #[serde(rename = "type")]
    pub inventory_type: InventoryType,
}

/// Input for creating a brand or an inventory type
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNamedInput {
    pub name: String,
}

/// Input for creating a catalog model
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateModelInput {
    pub name: String,
    pub year: i32,
    pub brand_id: i64,
    pub type_id: i64,
}

/// Lookup key used when resolving an imported row against the catalog.
///
/// `year == None` means the row carried no usable year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLookup<'a> {
    pub name: &'a str,
    pub year: Option<i32>,
    pub brand: &'a str,
    pub inventory_type: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_detail_serializes_type_key() {
        let now = Utc::now();
        let detail = CatalogModelDetail {
            model: CatalogModel {
                id: 1,
                name: "Hilux".to_string(),
                year: 2020,
                brand_id: 2,
                type_id: 3,
                enabled: true,
                created_at: now,
            },
            brand: Brand {
                id: 2,
                name: "Toyota".to_string(),
                enabled: true,
                created_at: now,
            },
            inventory_type: InventoryType {
                id: 3,
                name: "Camioneta".to_string(),
                enabled: true,
                created_at: now,
            },
        };

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["name"], "Hilux");
        assert_eq!(json["brandId"], 2);
        assert_eq!(json["brand"]["name"], "Toyota");
        assert_eq!(json["type"]["name"], "Camioneta");
    }

    #[test]
    fn test_create_model_input_accepts_camel_case() {
        let input: CreateModelInput = serde_json::from_str(
            r#"{"name":"Hilux","year":2020,"brandId":1,"typeId":2}"#,
        )
        .unwrap();
        assert_eq!(input.brand_id, 1);
        assert_eq!(input.type_id, 2);
    }
}
