//! Services layer - Business logic
//!
//! This module contains the business logic services of the MyCAD inventory backend.
//! Services are responsible for:
//! - Implementing business rules
//! - Coordinating between repositories
//! - Handling validation and error cases

pub mod catalog;
pub mod inventory;
pub mod password;
pub mod user;

pub use catalog::{CatalogService, CatalogServiceError};
pub use inventory::{InventoryService, InventoryServiceError};
pub use password::{hash_password, verify_password};
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
