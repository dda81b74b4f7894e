//! Data models
//!
//! This module contains all data structures used throughout the MyCAD inventory backend.
//! Models represent:
//! - Database entities (User, Session, Brand, InventoryType, CatalogModel, Inventory, ...)
//! - API request types
//! - Persistence-ready inputs produced by the import pipeline

mod catalog;
mod condition;
mod inventory;
mod session;
mod user;

pub use catalog::{
    Brand, CatalogModel, CatalogModelDetail, CreateModelInput, CreateNamedInput, InventoryType,
    ModelLookup,
};
pub use condition::{AttachConditionInput, Condition, InventoryCondition};
pub use inventory::{
    CreateInventoryInput, Inventory, InventoryDetail, InventoryFile, InventoryImage,
    InventoryStatus, InventoryWithModel, NewImage, NewInventory, UpdateInventoryInput,
};
pub use session::Session;
pub use user::{User, UserRole};
