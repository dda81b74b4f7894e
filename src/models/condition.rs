//! Condition models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named physical condition ("Golpeado", "Sin llantas", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A condition attached to an inventory item, with the condition embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryCondition {
    pub id: i64,
    pub inventory_id: i64,
    pub condition_id: i64,
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,
    pub condition: Condition,
}

/// Input for attaching a condition to an inventory item
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachConditionInput {
    pub condition_id: i64,
    #[serde(default)]
    pub comments: Option<String>,
}
