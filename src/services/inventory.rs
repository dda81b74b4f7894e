//! Inventory service
//!
//! Manual CRUD over inventory items. Bulk creation from CSV files lives in
//! [`crate::import`] and writes through the same repository.

use crate::db::repositories::{CatalogRepository, ConditionRepository, InventoryRepository};
use crate::models::{
    AttachConditionInput, CreateInventoryInput, Inventory, InventoryCondition, InventoryDetail,
    NewInventory, UpdateInventoryInput, User,
};
use anyhow::Context;
use std::sync::Arc;

/// Error types for inventory service operations
#[derive(Debug, thiserror::Error)]
pub enum InventoryServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Inventory service
pub struct InventoryService {
    inventory_repo: Arc<dyn InventoryRepository>,
    catalog_repo: Arc<dyn CatalogRepository>,
    condition_repo: Arc<dyn ConditionRepository>,
}

impl InventoryService {
    pub fn new(
        inventory_repo: Arc<dyn InventoryRepository>,
        catalog_repo: Arc<dyn CatalogRepository>,
        condition_repo: Arc<dyn ConditionRepository>,
    ) -> Self {
        Self {
            inventory_repo,
            catalog_repo,
            condition_repo,
        }
    }

    /// Every enabled item with its associations, oldest first
    pub async fn list(&self) -> Result<Vec<InventoryDetail>, InventoryServiceError> {
        Ok(self.inventory_repo.list_all().await?)
    }

    pub async fn get(&self, id: i64) -> Result<InventoryDetail, InventoryServiceError> {
        self.inventory_repo
            .get_detail(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Create an item owned by `user`.
    ///
    /// The model must exist and be enabled; the serial number must be unused.
    pub async fn create(
        &self,
        input: CreateInventoryInput,
        user: &User,
    ) -> Result<InventoryDetail, InventoryServiceError> {
        let serial_number = required_serial(&input.serial_number)?;
        self.ensure_enabled_model(input.model_id).await?;
        self.ensure_serial_free(&serial_number).await?;

        let created = self
            .inventory_repo
            .create_with_images(&NewInventory {
                model_id: input.model_id,
                serial_number,
                reception_date: input.reception_date,
                status: input.status,
                comments: input.comments,
                created_by_id: user.id,
                images: Vec::new(),
            })
            .await
            .context("Failed to create inventory")?;

        tracing::info!(
            "User {} created inventory {} ({})",
            user.id,
            created.inventory.id,
            created.inventory.serial_number
        );
        self.get(created.inventory.id).await
    }

    pub async fn update(
        &self,
        id: i64,
        mut input: UpdateInventoryInput,
    ) -> Result<Inventory, InventoryServiceError> {
        let current = self
            .inventory_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| not_found(id))?;

        if let Some(serial) = input.serial_number.take() {
            let serial = required_serial(&serial)?;
            if serial != current.serial_number {
                self.ensure_serial_free(&serial).await?;
            }
            input.serial_number = Some(serial);
        }
        if let Some(model_id) = input.model_id {
            self.ensure_enabled_model(model_id).await?;
        }

        self.inventory_repo
            .update(id, &input)
            .await
            .context("Failed to update inventory")?
            .ok_or_else(|| not_found(id))
    }

    /// Soft delete: the item disappears from listings but keeps its serial.
    pub async fn delete(&self, id: i64) -> Result<(), InventoryServiceError> {
        if !self.inventory_repo.soft_delete(id).await? {
            return Err(not_found(id));
        }
        tracing::info!("Disabled inventory {}", id);
        Ok(())
    }

    pub async fn attach_condition(
        &self,
        id: i64,
        input: AttachConditionInput,
    ) -> Result<InventoryCondition, InventoryServiceError> {
        if self.inventory_repo.get_by_id(id).await?.is_none() {
            return Err(not_found(id));
        }
        if self
            .condition_repo
            .get_by_id(input.condition_id)
            .await?
            .is_none()
        {
            return Err(InventoryServiceError::NotFound(format!(
                "Condition {} not found",
                input.condition_id
            )));
        }

        Ok(self
            .condition_repo
            .attach(id, &input)
            .await
            .context("Failed to attach condition")?)
    }

    async fn ensure_enabled_model(&self, model_id: i64) -> Result<(), InventoryServiceError> {
        match self.catalog_repo.get_model(model_id).await? {
            Some(detail) if detail.model.enabled => Ok(()),
            _ => Err(InventoryServiceError::ValidationError(format!(
                "Model {} does not exist or is disabled",
                model_id
            ))),
        }
    }

    async fn ensure_serial_free(&self, serial_number: &str) -> Result<(), InventoryServiceError> {
        if self.inventory_repo.serial_exists(serial_number).await? {
            return Err(InventoryServiceError::Conflict(format!(
                "Serial number '{}' is already registered",
                serial_number
            )));
        }
        Ok(())
    }
}

fn not_found(id: i64) -> InventoryServiceError {
    InventoryServiceError::NotFound(format!("Inventory {} not found", id))
}

fn required_serial(serial: &str) -> Result<String, InventoryServiceError> {
    let serial = serial.trim();
    if serial.is_empty() {
        return Err(InventoryServiceError::ValidationError(
            "Serial number cannot be empty".to_string(),
        ));
    }
    Ok(serial.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxCatalogRepository, SqlxConditionRepository, SqlxInventoryRepository,
        SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateModelInput, InventoryStatus, UserRole};

    struct Fixture {
        service: InventoryService,
        conditions: Arc<dyn ConditionRepository>,
        user: User,
        model_id: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let catalog = SqlxCatalogRepository::boxed(pool.clone());
        let brand = catalog.create_brand("Ford").await.unwrap();
        let kind = catalog.create_type("Patrulla").await.unwrap();
        let model = catalog
            .create_model(&CreateModelInput {
                name: "Ranger".to_string(),
                year: 2022,
                brand_id: brand.id,
                type_id: kind.id,
            })
            .await
            .unwrap();

        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new(
                "operador".to_string(),
                "operador@example.com".to_string(),
                "hash".to_string(),
                UserRole::User,
            ))
            .await
            .unwrap();

        let conditions = SqlxConditionRepository::boxed(pool.clone());
        Fixture {
            service: InventoryService::new(
                SqlxInventoryRepository::boxed(pool),
                catalog,
                conditions.clone(),
            ),
            conditions,
            user,
            model_id: model.id,
        }
    }

    fn input(model_id: i64, serial: &str) -> CreateInventoryInput {
        CreateInventoryInput {
            model_id,
            serial_number: serial.to_string(),
            reception_date: None,
            status: InventoryStatus::Alta,
            comments: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let f = setup().await;

        let created = f
            .service
            .create(input(f.model_id, " RNG-01 "), &f.user)
            .await
            .unwrap();

        assert_eq!(created.inventory.serial_number, "RNG-01");
        assert_eq!(created.inventory.created_by_id, f.user.id);
        assert_eq!(created.model.model.name, "Ranger");
        assert_eq!(f.service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_model_and_duplicate_serial() {
        let f = setup().await;

        let unknown = f.service.create(input(999, "X"), &f.user).await;
        assert!(matches!(unknown, Err(InventoryServiceError::ValidationError(_))));

        f.service.create(input(f.model_id, "X"), &f.user).await.unwrap();
        let duplicate = f.service.create(input(f.model_id, "X"), &f.user).await;
        assert!(matches!(duplicate, Err(InventoryServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_serial_conflict() {
        let f = setup().await;
        f.service.create(input(f.model_id, "A"), &f.user).await.unwrap();
        let b = f.service.create(input(f.model_id, "B"), &f.user).await.unwrap();

        let result = f
            .service
            .update(
                b.inventory.id,
                UpdateInventoryInput {
                    serial_number: Some("A".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(InventoryServiceError::Conflict(_))));

        let same = f
            .service
            .update(
                b.inventory.id,
                UpdateInventoryInput {
                    serial_number: Some("B".to_string()),
                    status: Some(InventoryStatus::Propuesta),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(same.status, InventoryStatus::Propuesta);
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let f = setup().await;
        let created = f.service.create(input(f.model_id, "A"), &f.user).await.unwrap();

        f.service.delete(created.inventory.id).await.unwrap();

        assert!(matches!(
            f.service.get(created.inventory.id).await,
            Err(InventoryServiceError::NotFound(_))
        ));
        assert!(matches!(
            f.service.delete(created.inventory.id).await,
            Err(InventoryServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_attach_condition() {
        let f = setup().await;
        let created = f.service.create(input(f.model_id, "A"), &f.user).await.unwrap();
        let condition = f.conditions.create("Golpeado").await.unwrap();

        let attached = f
            .service
            .attach_condition(
                created.inventory.id,
                AttachConditionInput {
                    condition_id: condition.id,
                    comments: Some("Defensa".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(attached.condition.name, "Golpeado");

        let detail = f.service.get(created.inventory.id).await.unwrap();
        assert_eq!(detail.conditions.len(), 1);

        let missing = f
            .service
            .attach_condition(
                created.inventory.id,
                AttachConditionInput {
                    condition_id: 999,
                    comments: None,
                },
            )
            .await;
        assert!(matches!(missing, Err(InventoryServiceError::NotFound(_))));
    }
}
