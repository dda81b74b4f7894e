//! Condition API endpoints
//!
//! - GET/POST /api/v1/conditions
//! - POST /api/v1/inventories/{id}/conditions

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{AttachConditionInput, Condition, CreateNamedInput};

/// Build the condition router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/conditions", get(list_conditions).post(create_condition))
        .route("/inventories/{id}/conditions", post(attach_condition))
}

async fn list_conditions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Condition>>, ApiError> {
    Ok(Json(state.catalog_service.list_conditions().await?))
}

async fn create_condition(
    State(state): State<AppState>,
    Json(body): Json<CreateNamedInput>,
) -> Result<impl IntoResponse, ApiError> {
    let condition = state.catalog_service.create_condition(&body.name).await?;
    Ok((StatusCode::CREATED, Json(condition)))
}

/// POST /api/v1/inventories/{id}/conditions - Record a condition on an item
async fn attach_condition(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<AttachConditionInput>,
) -> Result<impl IntoResponse, ApiError> {
    let attached = state.inventory_service.attach_condition(id, body).await?;
    Ok((StatusCode::CREATED, Json(attached)))
}
