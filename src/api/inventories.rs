//! Inventory API endpoints
//!
//! - GET /api/v1/inventories - Full nested listing, oldest first
//! - POST /api/v1/inventories - Create an item
//! - GET /api/v1/inventories/{id}
//! - PUT /api/v1/inventories/{id}
//! - DELETE /api/v1/inventories/{id} - Soft delete

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateInventoryInput, Inventory, InventoryDetail, UpdateInventoryInput};

/// Build the inventory router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/inventories", get(list_inventories).post(create_inventory))
        .route(
            "/inventories/{id}",
            get(get_inventory)
                .put(update_inventory)
                .delete(delete_inventory),
        )
}

async fn list_inventories(
    State(state): State<AppState>,
) -> Result<Json<Vec<InventoryDetail>>, ApiError> {
    Ok(Json(state.inventory_service.list().await?))
}

async fn get_inventory(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<InventoryDetail>, ApiError> {
    Ok(Json(state.inventory_service.get(id).await?))
}

async fn create_inventory(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateInventoryInput>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state.inventory_service.create(body, &user.0).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_inventory(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateInventoryInput>,
) -> Result<Json<Inventory>, ApiError> {
    Ok(Json(state.inventory_service.update(id, body).await?))
}

async fn delete_inventory(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.inventory_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
