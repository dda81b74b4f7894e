//! Catalog API endpoints
//!
//! - GET/POST /api/v1/catalog/brands
//! - GET/POST /api/v1/catalog/types
//! - GET/POST /api/v1/catalog/models

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{
    Brand, CatalogModelDetail, CreateModelInput, CreateNamedInput, InventoryType,
};

/// Build the catalog router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/brands", get(list_brands).post(create_brand))
        .route("/types", get(list_types).post(create_type))
        .route("/models", get(list_models).post(create_model))
}

async fn list_brands(State(state): State<AppState>) -> Result<Json<Vec<Brand>>, ApiError> {
    Ok(Json(state.catalog_service.list_brands().await?))
}

async fn create_brand(
    State(state): State<AppState>,
    Json(body): Json<CreateNamedInput>,
) -> Result<impl IntoResponse, ApiError> {
    let brand = state.catalog_service.create_brand(&body.name).await?;
    Ok((StatusCode::CREATED, Json(brand)))
}

async fn list_types(
    State(state): State<AppState>,
) -> Result<Json<Vec<InventoryType>>, ApiError> {
    Ok(Json(state.catalog_service.list_types().await?))
}

async fn create_type(
    State(state): State<AppState>,
    Json(body): Json<CreateNamedInput>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state.catalog_service.create_type(&body.name).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/v1/catalog/models - Models with their brand and type
async fn list_models(
    State(state): State<AppState>,
) -> Result<Json<Vec<CatalogModelDetail>>, ApiError> {
    Ok(Json(state.catalog_service.list_models().await?))
}

async fn create_model(
    State(state): State<AppState>,
    Json(body): Json<CreateModelInput>,
) -> Result<impl IntoResponse, ApiError> {
    let model = state.catalog_service.create_model(body).await?;
    Ok((StatusCode::CREATED, Json(model)))
}
