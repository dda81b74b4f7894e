//! Catalog service
//!
//! Business rules for the reference data inventory items point at: brands,
//! inventory types, catalog models and the condition vocabulary.

use crate::db::repositories::{CatalogRepository, ConditionRepository};
use crate::models::{
    Brand, CatalogModel, CatalogModelDetail, Condition, CreateModelInput, InventoryType,
};
use anyhow::Context;
use std::sync::Arc;

/// Error types for catalog service operations
#[derive(Debug, thiserror::Error)]
pub enum CatalogServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Catalog service
pub struct CatalogService {
    catalog_repo: Arc<dyn CatalogRepository>,
    condition_repo: Arc<dyn ConditionRepository>,
}

impl CatalogService {
    pub fn new(
        catalog_repo: Arc<dyn CatalogRepository>,
        condition_repo: Arc<dyn ConditionRepository>,
    ) -> Self {
        Self {
            catalog_repo,
            condition_repo,
        }
    }

    pub async fn list_brands(&self) -> Result<Vec<Brand>, CatalogServiceError> {
        Ok(self.catalog_repo.list_brands().await?)
    }

    /// Create a brand. Names are trimmed and must be unique.
    pub async fn create_brand(&self, name: &str) -> Result<Brand, CatalogServiceError> {
        let name = required_name(name, "Brand")?;
        let brands = self.catalog_repo.list_brands().await?;
        if brands.iter().any(|b| b.name == name) {
            return Err(CatalogServiceError::Conflict(format!(
                "Brand '{}' already exists",
                name
            )));
        }

        let brand = self
            .catalog_repo
            .create_brand(name)
            .await
            .context("Failed to create brand")?;
        tracing::info!("Created brand '{}'", brand.name);
        Ok(brand)
    }

    pub async fn list_types(&self) -> Result<Vec<InventoryType>, CatalogServiceError> {
        Ok(self.catalog_repo.list_types().await?)
    }

    /// Create an inventory type. Names are trimmed and must be unique.
    pub async fn create_type(&self, name: &str) -> Result<InventoryType, CatalogServiceError> {
        let name = required_name(name, "Inventory type")?;
        let types = self.catalog_repo.list_types().await?;
        if types.iter().any(|t| t.name == name) {
            return Err(CatalogServiceError::Conflict(format!(
                "Inventory type '{}' already exists",
                name
            )));
        }

        let created = self
            .catalog_repo
            .create_type(name)
            .await
            .context("Failed to create inventory type")?;
        tracing::info!("Created inventory type '{}'", created.name);
        Ok(created)
    }

    pub async fn list_models(&self) -> Result<Vec<CatalogModelDetail>, CatalogServiceError> {
        Ok(self.catalog_repo.list_models().await?)
    }

    /// Create a catalog model for an existing brand and type.
    ///
    /// The (name, year, brand, type) combination must not exist yet.
    pub async fn create_model(
        &self,
        input: CreateModelInput,
    ) -> Result<CatalogModel, CatalogServiceError> {
        let name = required_name(&input.name, "Model")?.to_string();
        if input.year <= 0 {
            return Err(CatalogServiceError::ValidationError(
                "Model year must be a positive number".to_string(),
            ));
        }

        if self.catalog_repo.get_brand(input.brand_id).await?.is_none() {
            return Err(CatalogServiceError::NotFound(format!(
                "Brand {} not found",
                input.brand_id
            )));
        }
        if self.catalog_repo.get_type(input.type_id).await?.is_none() {
            return Err(CatalogServiceError::NotFound(format!(
                "Inventory type {} not found",
                input.type_id
            )));
        }

        let models = self.catalog_repo.list_models().await?;
        let duplicate = models.iter().any(|m| {
            m.model.name == name
                && m.model.year == input.year
                && m.model.brand_id == input.brand_id
                && m.model.type_id == input.type_id
        });
        if duplicate {
            return Err(CatalogServiceError::Conflict(format!(
                "Model '{}' ({}) already exists for this brand and type",
                name, input.year
            )));
        }

        let model = self
            .catalog_repo
            .create_model(&CreateModelInput { name, ..input })
            .await
            .context("Failed to create model")?;
        tracing::info!("Created model '{}' ({})", model.name, model.year);
        Ok(model)
    }

    pub async fn list_conditions(&self) -> Result<Vec<Condition>, CatalogServiceError> {
        Ok(self.condition_repo.list().await?)
    }

    /// Create a condition. Names are trimmed and must be unique.
    pub async fn create_condition(&self, name: &str) -> Result<Condition, CatalogServiceError> {
        let name = required_name(name, "Condition")?;
        let conditions = self.condition_repo.list().await?;
        if conditions.iter().any(|c| c.name == name) {
            return Err(CatalogServiceError::Conflict(format!(
                "Condition '{}' already exists",
                name
            )));
        }

        Ok(self
            .condition_repo
            .create(name)
            .await
            .context("Failed to create condition")?)
    }
}

fn required_name<'a>(name: &'a str, what: &str) -> Result<&'a str, CatalogServiceError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CatalogServiceError::ValidationError(format!(
            "{} name cannot be empty",
            what
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCatalogRepository, SqlxConditionRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_service() -> CatalogService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        CatalogService::new(
            SqlxCatalogRepository::boxed(pool.clone()),
            SqlxConditionRepository::boxed(pool),
        )
    }

    #[tokio::test]
    async fn test_create_brand_trims_and_rejects_duplicates() {
        let service = setup_test_service().await;

        let brand = service.create_brand("  Toyota ").await.unwrap();
        assert_eq!(brand.name, "Toyota");

        let result = service.create_brand("Toyota").await;
        assert!(matches!(result, Err(CatalogServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_empty_names_rejected() {
        let service = setup_test_service().await;

        assert!(matches!(
            service.create_brand("   ").await,
            Err(CatalogServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.create_type("").await,
            Err(CatalogServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.create_condition("").await,
            Err(CatalogServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_create_model_checks_references() {
        let service = setup_test_service().await;
        let brand = service.create_brand("Toyota").await.unwrap();

        let result = service
            .create_model(CreateModelInput {
                name: "Hilux".to_string(),
                year: 2020,
                brand_id: brand.id,
                type_id: 99,
            })
            .await;

        assert!(matches!(result, Err(CatalogServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_model_rejects_duplicate_identity() {
        let service = setup_test_service().await;
        let brand = service.create_brand("Toyota").await.unwrap();
        let kind = service.create_type("Camioneta").await.unwrap();
        let input = CreateModelInput {
            name: "Hilux".to_string(),
            year: 2020,
            brand_id: brand.id,
            type_id: kind.id,
        };

        service.create_model(input.clone()).await.unwrap();
        let result = service.create_model(input.clone()).await;
        assert!(matches!(result, Err(CatalogServiceError::Conflict(_))));

        let other_year = service
            .create_model(CreateModelInput { year: 2021, ..input })
            .await
            .unwrap();
        assert_eq!(other_year.year, 2021);
        assert_eq!(service.list_models().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_condition() {
        let service = setup_test_service().await;

        service.create_condition("Golpeado").await.unwrap();
        assert!(matches!(
            service.create_condition("Golpeado").await,
            Err(CatalogServiceError::Conflict(_))
        ));
        assert_eq!(service.list_conditions().await.unwrap().len(), 1);
    }
}
