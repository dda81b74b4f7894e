//! Import pipeline
//!
//! Runs every CSV row through normalize, validate, resolve, image
//! acquisition and persistence, one row at a time. Each row is its own unit
//! of work: a failing row only contributes error messages, and later rows
//! are still processed.

use super::images::{ImageAcquirer, StoredImage};
use super::normalize::InventoryRow;
use super::resolve::{ReferenceResolver, ResolvedReferences};
use super::row::{read_rows, RowRecord};
use super::validate::{validate_row, ValidatedRow};
use crate::db::repositories::{CatalogRepository, InventoryRepository, UserRepository};
use crate::models::{InventoryDetail, InventoryWithModel, ModelLookup, NewImage, NewInventory};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;

pub const SUCCESS_MESSAGE: &str = "Inventarios creados exitosamente.";
pub const PARTIAL_MESSAGE: &str = "Algunos inventarios no pudieron ser creados";

/// Error recorded for a data line the CSV reader could not decode
pub fn unreadable_row(position: usize, error: &csv::Error) -> String {
    format!("Fila {}: No se pudo leer la fila: {}", position, error)
}

/// Failures that stop the whole import
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Body returned by the import endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub message: String,
    pub created_inventories: Vec<InventoryWithModel>,
    /// Complete inventory listing after the import
    pub data: Vec<InventoryDetail>,
    /// `None` when every row went through
    pub errors: Option<Vec<String>>,
}

impl ImportResponse {
    fn new(outcome: ImportOutcome, data: Vec<InventoryDetail>) -> Self {
        let errors = (!outcome.errors.is_empty()).then_some(outcome.errors);
        let message = if errors.is_some() {
            PARTIAL_MESSAGE
        } else {
            SUCCESS_MESSAGE
        };

        Self {
            message: message.to_string(),
            created_inventories: outcome.created,
            data,
            errors,
        }
    }

    /// Rows failed and none succeeded
    pub fn is_failure(&self) -> bool {
        self.errors.is_some() && self.created_inventories.is_empty()
    }
}

/// Accumulator threaded through the row fold
#[derive(Debug, Default)]
struct ImportOutcome {
    created: Vec<InventoryWithModel>,
    errors: Vec<String>,
}

/// Bulk inventory importer
pub struct InventoryImporter {
    inventory_repo: Arc<dyn InventoryRepository>,
    resolver: ReferenceResolver,
    images: ImageAcquirer,
}

impl InventoryImporter {
    pub fn new(
        inventory_repo: Arc<dyn InventoryRepository>,
        catalog_repo: Arc<dyn CatalogRepository>,
        user_repo: Arc<dyn UserRepository>,
        images: ImageAcquirer,
        year_fallback: bool,
    ) -> Self {
        Self {
            inventory_repo,
            resolver: ReferenceResolver::new(catalog_repo, user_repo, year_fallback),
            images,
        }
    }

    /// Import a CSV document on behalf of `user_id`.
    ///
    /// Only an unreadable header or a failure to load the final listing is
    /// an error; row problems, undecodable lines included, are reported
    /// inside the response.
    pub async fn import_csv(
        &self,
        data: &[u8],
        user_id: Option<i64>,
    ) -> Result<ImportResponse, ImportError> {
        let rows = read_rows(data)?;
        tracing::info!("Importing {} inventory rows (user {:?})", rows.len(), user_id);

        let outcome = stream::iter(rows.into_iter().enumerate())
            .fold(ImportOutcome::default(), |outcome, (index, record)| {
                self.process_row(outcome, index + 1, record, user_id)
            })
            .await;

        tracing::info!(
            "Import finished: {} created, {} errors",
            outcome.created.len(),
            outcome.errors.len()
        );

        let data = self.inventory_repo.list_complete().await?;
        Ok(ImportResponse::new(outcome, data))
    }

    async fn process_row(
        &self,
        mut outcome: ImportOutcome,
        position: usize,
        record: RowRecord,
        user_id: Option<i64>,
    ) -> ImportOutcome {
        let row = match record {
            Ok(raw) => InventoryRow::from(raw),
            Err(e) => {
                tracing::warn!("Row {} unreadable: {}", position, e);
                outcome.errors.push(unreadable_row(position, &e));
                return outcome;
            }
        };

        let validated = match validate_row(&row, user_id, position) {
            Ok(validated) => validated,
            Err(errors) => {
                tracing::warn!("Row {} rejected: {} validation errors", position, errors.len());
                outcome.errors.extend(errors);
                return outcome;
            }
        };

        let lookup = ModelLookup {
            name: &validated.model,
            year: Some(validated.year),
            brand: &validated.brand,
            inventory_type: &validated.inventory_type,
        };
        let references = match self.resolver.resolve(&lookup, validated.user_id).await {
            Ok(references) => references,
            Err(e) => {
                tracing::warn!("Row {} unresolved: {}", position, e);
                outcome.errors.push(e.row_message(position));
                return outcome;
            }
        };

        let mut stored = Vec::with_capacity(validated.images.len());
        for url in &validated.images {
            match self.images.acquire(url).await {
                Ok(image) => stored.push(image),
                Err(e) => {
                    tracing::warn!("Row {}: image '{}' skipped: {}", position, url, e);
                    outcome.errors.push(format!(
                        "Fila {}: Error al descargar la imagen desde la URL '{}'",
                        position, url
                    ));
                }
            }
        }

        let new = new_inventory(&validated, &references, &stored);
        match self.inventory_repo.create_with_images(&new).await {
            Ok(created) => {
                tracing::debug!("Row {} created inventory {}", position, created.inventory.id);
                outcome.created.push(created);
            }
            Err(e) => {
                tracing::warn!("Row {} not persisted: {:#}", position, e);
                for image in &stored {
                    self.images.store().remove(image).await;
                }
                outcome.errors.push(format!(
                    "Fila {}: Error al crear el inventario: {:#}",
                    position, e
                ));
            }
        }

        outcome
    }
}

/// Map a validated, resolved row to the persistence-ready record.
fn new_inventory(
    row: &ValidatedRow,
    references: &ResolvedReferences,
    images: &[StoredImage],
) -> NewInventory {
    NewInventory {
        model_id: references.model.id,
        serial_number: row.serial_number.clone(),
        reception_date: Some(row.reception_date),
        status: row.status,
        comments: row.comments.clone(),
        created_by_id: references.user.id,
        images: images
            .iter()
            .map(|image| NewImage {
                url: image.url.clone(),
                mime_type: image.mime_type.clone(),
                thumbnail: Some(image.thumbnail.clone()),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCatalogRepository, SqlxInventoryRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::import::images::tests::{
        local_fetcher, sample_png, silent_server, test_store, StaticFetcher,
    };
    use crate::import::images::ImageFetcher;
    use crate::import::row::headers;
    use crate::models::{CreateModelInput, InventoryStatus, User, UserRole};
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::TempDir;

    const GOOD_IMAGE: &str = "http://img.test/ok.png";
    const BROKEN_IMAGE: &str = "http://img.test/missing.png";

    struct Fixture {
        importer: InventoryImporter,
        inventories: Arc<dyn InventoryRepository>,
        user_id: i64,
        uploads: TempDir,
    }

    async fn setup() -> Fixture {
        let fetcher = StaticFetcher {
            bodies: HashMap::from([(GOOD_IMAGE.to_string(), sample_png())]),
        };
        setup_with_fetcher(Arc::new(fetcher)).await
    }

    async fn setup_with_fetcher(fetcher: Arc<dyn ImageFetcher>) -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let catalog = SqlxCatalogRepository::boxed(pool.clone());
        let brand = catalog.create_brand("Toyota").await.unwrap();
        let kind = catalog.create_type("Camioneta").await.unwrap();
        for (name, year) in [("Hilux", 2020), ("Tacoma", 2021)] {
            catalog
                .create_model(&CreateModelInput {
                    name: name.to_string(),
                    year,
                    brand_id: brand.id,
                    type_id: kind.id,
                })
                .await
                .unwrap();
        }

        let users = SqlxUserRepository::boxed(pool.clone());
        let user = users
            .create(&User::new(
                "importador".to_string(),
                "importador@example.com".to_string(),
                "hash".to_string(),
                UserRole::User,
            ))
            .await
            .unwrap();

        let uploads = tempfile::tempdir().unwrap();
        let images = ImageAcquirer::new(fetcher, test_store(uploads.path()));
        let inventories = SqlxInventoryRepository::boxed(pool);

        Fixture {
            importer: InventoryImporter::new(inventories.clone(), catalog, users, images, true),
            inventories,
            user_id: user.id,
            uploads,
        }
    }

    fn csv(rows: &[&str]) -> Vec<u8> {
        let mut doc = headers::ALL.join(",");
        for row in rows {
            doc.push('\n');
            doc.push_str(row);
        }
        doc.push('\n');
        doc.into_bytes()
    }

    fn row(model: &str, serial: &str, images: &str) -> String {
        format!(
            "{},2020,Toyota,Camioneta,{},15/01/2024,ALTA,,\"{}\"",
            model, serial, images
        )
    }

    fn stored_files(fixture: &Fixture) -> usize {
        let dir = fixture.uploads.path().join("inventories/images");
        std::fs::read_dir(&dir)
            .map(|entries| entries.flatten().filter(|e| e.path().is_file()).count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_all_rows_succeed() {
        let f = setup().await;
        let doc = csv(&[&row("Hilux", "SN-1", "[]"), &row("Hilux", "SN-2", "")]);

        let response = f.importer.import_csv(&doc, Some(f.user_id)).await.unwrap();

        assert_eq!(response.message, SUCCESS_MESSAGE);
        assert_eq!(response.created_inventories.len(), 2);
        assert_eq!(response.errors, None);
        assert!(!response.is_failure());
        assert_eq!(response.data.len(), 2);

        let first = &response.data[0];
        assert_eq!(first.inventory.serial_number, "SN-1");
        assert_eq!(first.inventory.status, InventoryStatus::Alta);
        assert_eq!(
            first.inventory.reception_date,
            chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        assert_eq!(first.inventory.created_by_id, f.user_id);
        assert_eq!(first.model.brand.name, "Toyota");
    }

    #[tokio::test]
    async fn test_unresolved_row_is_skipped() {
        let f = setup().await;
        let doc = csv(&[
            &row("Hilux", "SN-1", ""),
            &row("Corolla", "SN-2", ""),
            &row("Hilux", "SN-3", ""),
        ]);

        let response = f.importer.import_csv(&doc, Some(f.user_id)).await.unwrap();

        assert_eq!(response.created_inventories.len(), 2);
        assert_eq!(
            response.errors,
            Some(vec![
                "Fila 2: El modelo 'Corolla' (2020) - Toyota Camioneta no existe".to_string()
            ])
        );
        assert_eq!(response.message, PARTIAL_MESSAGE);
        assert!(!response.is_failure());
    }

    #[tokio::test]
    async fn test_failed_image_still_creates_inventory() {
        let f = setup().await;
        let doc = csv(&[&row("Hilux", "SN-1", &format!("['{}']", BROKEN_IMAGE))]);

        let response = f.importer.import_csv(&doc, Some(f.user_id)).await.unwrap();

        assert_eq!(response.created_inventories.len(), 1);
        assert!(response.data[0].images.is_empty());
        assert_eq!(
            response.errors,
            Some(vec![format!(
                "Fila 1: Error al descargar la imagen desde la URL '{}'",
                BROKEN_IMAGE
            )])
        );
        assert!(!response.is_failure());
    }

    #[tokio::test]
    async fn test_images_are_stored_and_linked() {
        let f = setup().await;
        let images = format!("['{}','{}']", GOOD_IMAGE, BROKEN_IMAGE);
        let doc = csv(&[&row("Hilux", "SN-1", &images)]);

        let response = f.importer.import_csv(&doc, Some(f.user_id)).await.unwrap();

        let stored = &response.data[0].images;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].mime_type, "image/png");
        assert!(stored[0].url.starts_with("uploads/inventories/images/"));
        assert!(stored[0]
            .thumbnail
            .as_deref()
            .is_some_and(|t| t.ends_with("-thumbnail.jpg")));
        assert_eq!(stored_files(&f), 1);
        assert_eq!(response.errors.map(|e| e.len()), Some(1));
    }

    #[tokio::test]
    async fn test_persistence_failure_removes_images() {
        let f = setup().await;
        let images = format!("['{}']", GOOD_IMAGE);
        let doc = csv(&[
            &row("Hilux", "SN-1", ""),
            &row("Hilux", "SN-1", &images),
        ]);

        let response = f.importer.import_csv(&doc, Some(f.user_id)).await.unwrap();

        assert_eq!(response.created_inventories.len(), 1);
        let errors = response.errors.unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Fila 2: Error al crear el inventario: "));
        assert_eq!(stored_files(&f), 0);
    }

    #[tokio::test]
    async fn test_all_rows_fail() {
        let f = setup().await;
        let doc = csv(&[
            "Hilux,2020,Toyota,Camioneta,SN-1,2024-01-15,ALTA,,",
            "Hilux,2020,Toyota,Camioneta,SN-2,15/01/2024,ACTIVO,,",
        ]);

        let response = f.importer.import_csv(&doc, Some(f.user_id)).await.unwrap();

        assert!(response.is_failure());
        assert!(response.created_inventories.is_empty());
        assert!(response.data.is_empty());
        assert_eq!(
            response.errors,
            Some(vec![
                "Fila 1: El campo 'Fecha de Recepción' es obligatorio".to_string(),
                "Fila 2: El campo 'Estado' debe ser uno de 'ALTA', 'BAJA' o 'PROPUESTA'"
                    .to_string(),
            ])
        );
    }

    #[tokio::test]
    async fn test_missing_user_rejects_every_row() {
        let f = setup().await;
        let doc = csv(&[&row("Hilux", "SN-1", ""), &row("Hilux", "SN-2", "")]);

        let response = f.importer.import_csv(&doc, None).await.unwrap();

        assert!(response.is_failure());
        let errors = response.errors.unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors[1].starts_with("Fila 2: El usuario no es válido"));
    }

    #[tokio::test]
    async fn test_unknown_user_id_is_rejected() {
        let f = setup().await;
        let doc = csv(&[&row("Hilux", "SN-1", "")]);

        let response = f.importer.import_csv(&doc, Some(f.user_id + 100)).await.unwrap();

        assert!(response.is_failure());
    }

    #[tokio::test]
    async fn test_empty_document_succeeds() {
        let f = setup().await;

        let response = f.importer.import_csv(&csv(&[]), Some(f.user_id)).await.unwrap();

        assert_eq!(response.message, SUCCESS_MESSAGE);
        assert_eq!(response.errors, None);
        assert!(!response.is_failure());
    }

    #[tokio::test]
    async fn test_unreadable_header() {
        let f = setup().await;
        let doc = b"Nombre del Modelo,A\xf1o del Modelo\nHilux,2020\n";

        let result = f.importer.import_csv(doc, Some(f.user_id)).await;

        assert!(matches!(result, Err(ImportError::Csv(_))));
    }

    #[tokio::test]
    async fn test_latin1_cell_does_not_discard_batch() {
        let f = setup().await;
        let mut doc = csv(&[&row("Hilux", "SN-1", "")]);
        doc.extend_from_slice(b"Hilux,2020,Toyota,Camioneta,SN-2,15/01/2024,ALTA,Cami\xf3n usado,\n");

        let response = f.importer.import_csv(&doc, Some(f.user_id)).await.unwrap();

        assert_eq!(response.errors, None);
        assert_eq!(response.created_inventories.len(), 2);
        assert_eq!(
            response.data[1].inventory.comments.as_deref(),
            Some("Cami\u{fffd}n usado")
        );
    }

    #[test]
    fn test_unreadable_row_message() {
        let error = csv::StringRecord::from(vec!["x"])
            .deserialize::<i32>(None)
            .unwrap_err();

        assert!(unreadable_row(4, &error).starts_with("Fila 4: No se pudo leer la fila: "));
    }

    #[tokio::test]
    async fn test_timed_out_image_is_a_row_error() {
        let url = silent_server().await;
        let f = setup_with_fetcher(Arc::new(local_fetcher(Duration::from_millis(500), 1024 * 1024)))
            .await;
        let doc = csv(&[&row("Hilux", "SN-1", &format!("['{}']", url))]);

        let response = f.importer.import_csv(&doc, Some(f.user_id)).await.unwrap();

        assert_eq!(response.created_inventories.len(), 1);
        assert!(response.data[0].images.is_empty());
        assert_eq!(
            response.errors,
            Some(vec![format!(
                "Fila 1: Error al descargar la imagen desde la URL '{}'",
                url
            )])
        );
        assert!(!response.is_failure());
    }

    #[tokio::test]
    async fn test_response_lists_soft_deleted_inventories() {
        let f = setup().await;
        let first = f
            .importer
            .import_csv(&csv(&[&row("Hilux", "SN-1", "")]), Some(f.user_id))
            .await
            .unwrap();
        let id = first.created_inventories[0].inventory.id;
        assert!(f.inventories.soft_delete(id).await.unwrap());

        let response = f
            .importer
            .import_csv(&csv(&[&row("Hilux", "SN-2", "")]), Some(f.user_id))
            .await
            .unwrap();

        assert_eq!(response.data.len(), 2);
        assert_eq!(response.data[0].inventory.id, id);
        assert!(!response.data[0].inventory.enabled);
        assert_eq!(f.inventories.list_all().await.unwrap().len(), 1);
    }

    #[test]
    fn test_response_serializes_camel_case() {
        let response = ImportResponse::new(ImportOutcome::default(), Vec::new());
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["message"], SUCCESS_MESSAGE);
        assert!(json["createdInventories"].as_array().unwrap().is_empty());
        assert!(json["errors"].is_null());
    }
}
