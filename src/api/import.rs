//! CSV import endpoint
//!
//! POST /api/v1/inventories/import takes a multipart upload with the CSV in
//! the `file` field (any field carrying a file name is accepted).
//!
//! The route runs behind `optional_auth`: without a valid session every row
//! is reported with the "sign in again" message instead of a 401.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::import::ImportError;

pub const NO_FILE_MESSAGE: &str = "No se subió ningún archivo.";
pub const CSV_ERROR_MESSAGE: &str = "Error al procesar el archivo CSV.";

/// Build the import router. `max_csv_size` caps the request body.
pub fn router(max_csv_size: u64) -> Router<AppState> {
    let limit = usize::try_from(max_csv_size).unwrap_or(usize::MAX);
    Router::new().route(
        "/inventories/import",
        post(import_inventories).layer(DefaultBodyLimit::max(limit)),
    )
}

async fn import_inventories(
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let data = read_csv_upload(&mut multipart)
        .await?
        .ok_or_else(|| ApiError::validation_error(NO_FILE_MESSAGE))?;

    let response = state
        .importer
        .import_csv(&data, user.map(|u| u.0.id))
        .await
        .map_err(|e| {
            match &e {
                ImportError::Csv(err) => tracing::error!("Unreadable CSV upload: {}", err),
                ImportError::InternalError(err) => tracing::error!("Import failed: {:#}", err),
            }
            ApiError::internal_error(CSV_ERROR_MESSAGE)
        })?;

    let status = if response.is_failure() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    Ok((status, Json(response)).into_response())
}

/// Bytes of the first file field, or `None` when the form has no file.
async fn read_csv_upload(multipart: &mut Multipart) -> Result<Option<Bytes>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        let is_file = field.name() == Some("file") || field.file_name().is_some();
        if !is_file {
            continue;
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;
        return Ok(Some(data));
    }

    Ok(None)
}
