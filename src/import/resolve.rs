//! Reference resolution
//!
//! Finds the catalog model a row points at and the user performing the
//! import. Catalog models are never created here.

use crate::db::repositories::{CatalogRepository, UserRepository};
use crate::models::{CatalogModel, ModelLookup, User};
use std::sync::Arc;

/// Why a row's references could not be resolved
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("acting user not found")]
    UnknownUser,

    #[error("no enabled model '{name}' ({year:?}) - {brand} {inventory_type}")]
    UnknownModel {
        name: String,
        year: Option<i32>,
        brand: String,
        inventory_type: String,
    },

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl ResolveError {
    /// Row-scoped message shown to the operator
    pub fn row_message(&self, position: usize) -> String {
        match self {
            ResolveError::UnknownUser => super::validate::invalid_user(position),
            ResolveError::UnknownModel {
                name,
                year,
                brand,
                inventory_type,
            } => format!(
                "Fila {}: El modelo '{}' ({}) - {} {} no existe",
                position,
                name,
                year.map(|y| y.to_string()).unwrap_or_default(),
                brand,
                inventory_type
            ),
            ResolveError::InternalError(e) => {
                format!("Fila {}: Error al buscar el modelo: {:#}", position, e)
            }
        }
    }
}

/// The persisted entities a row refers to
#[derive(Debug, Clone)]
pub struct ResolvedReferences {
    pub model: CatalogModel,
    pub user: User,
}

/// Resolves catalog models and the acting user
pub struct ReferenceResolver {
    catalog_repo: Arc<dyn CatalogRepository>,
    user_repo: Arc<dyn UserRepository>,
    year_fallback: bool,
}

impl ReferenceResolver {
    /// `year_fallback` decides whether a lookup without a year matches a
    /// model of any year.
    pub fn new(
        catalog_repo: Arc<dyn CatalogRepository>,
        user_repo: Arc<dyn UserRepository>,
        year_fallback: bool,
    ) -> Self {
        Self {
            catalog_repo,
            user_repo,
            year_fallback,
        }
    }

    pub async fn resolve(
        &self,
        lookup: &ModelLookup<'_>,
        user_id: i64,
    ) -> Result<ResolvedReferences, ResolveError> {
        let model = self
            .catalog_repo
            .find_enabled_model(lookup, self.year_fallback)
            .await?
            .ok_or_else(|| ResolveError::UnknownModel {
                name: lookup.name.to_string(),
                year: lookup.year,
                brand: lookup.brand.to_string(),
                inventory_type: lookup.inventory_type.to_string(),
            })?;

        let user = self
            .user_repo
            .get_by_id(user_id)
            .await?
            .filter(|u| u.enabled)
            .ok_or(ResolveError::UnknownUser)?;

        Ok(ResolvedReferences { model, user })
    }
}
