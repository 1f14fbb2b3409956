//! Kit export and import.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kitsync_core::KitExport;

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ImportKitsRequest {
    /// Original file name; its extension selects the decoder.
    pub filename: String,
    /// File text for `.json`, base64 for `.zip`.
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ExportKitsRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ImportKitsResponse {
    /// First imported kit.
    pub id: Uuid,
    pub ids: Vec<Uuid>,
}

fn attachment(export: KitExport, content_type: &str) -> impl IntoResponse {
    let disposition = format!("attachment; filename=\"{}\"", export.filename);
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.bytes,
    )
}

/// Download a kit as `kit-{id}-{date}.json`.
pub async fn export_kit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let export = state.kits.export_kit(id, Utc::now().date_naive()).await?;
    Ok(attachment(export, "application/json"))
}

/// Download several kits as one `kits-{date}.zip` archive.
pub async fn export_kits(
    State(state): State<AppState>,
    Json(req): Json<ExportKitsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let export = state
        .kits
        .export_kits(&req.ids, Utc::now().date_naive())
        .await?;
    Ok(attachment(export, "application/zip"))
}

/// Import kits from an uploaded `.json` file or `.zip` archive.
pub async fn import_kits(
    State(state): State<AppState>,
    Json(req): Json<ImportKitsRequest>,
) -> Result<Json<ImportKitsResponse>, ApiError> {
    let bytes = if req.filename.to_ascii_lowercase().ends_with(".zip") {
        base64::engine::general_purpose::STANDARD
            .decode(req.content.trim())
            .map_err(|e| ApiError::BadRequest {
                code: "invalid_format",
                message: format!("archive content is not valid base64: {}", e),
            })?
    } else {
        req.content.into_bytes()
    };

    let ids = state
        .kits
        .import_kits(&req.filename, &bytes, state.config.max_import_bytes)
        .await?;
    let id = ids
        .first()
        .copied()
        .ok_or_else(|| ApiError::bad_request("import contained no kits"))?;
    Ok(Json(ImportKitsResponse { id, ids }))
}
