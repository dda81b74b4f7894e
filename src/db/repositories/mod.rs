//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the operations for one aggregate.

pub mod catalog;
pub mod condition;
pub mod inventory;
pub mod session;
pub mod user;

pub use catalog::{CatalogRepository, SqlxCatalogRepository};
pub use condition::{ConditionRepository, SqlxConditionRepository};
pub use inventory::{InventoryRepository, SqlxInventoryRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// `?, ?, ?` with `count` placeholders, for `IN (...)` clauses.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[cfg(test)]
mod tests {
    use super::placeholders;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
