//! Per-document endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use kitsync_core::migration::LEGACY_SCHEMA_VERSION;
use kitsync_core::{DocumentBinding, DocumentId, KitContent, MigrationWarning};

use super::properties_from;
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct MigrateDocumentRequest {
    pub properties: JsonValue,
    /// Schema the properties were written under; unversioned documents
    /// predate the typography split.
    #[serde(default = "legacy_version")]
    pub schema_version: i32,
}

fn legacy_version() -> i32 {
    LEGACY_SCHEMA_VERSION
}

#[derive(Debug, Serialize)]
pub struct MigrateDocumentResponse {
    pub properties: KitContent,
    pub schema_version: i32,
    pub applied: Vec<String>,
    pub warnings: Vec<MigrationWarning>,
}

pub async fn get_binding(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<DocumentBinding>, ApiError> {
    let document_id = DocumentId::new(document_id);
    state
        .kits
        .get_binding(&document_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No binding for document {}", document_id)))
}

/// Upgrade a document's inline style properties to the current schema.
pub async fn migrate_document(
    State(state): State<AppState>,
    Json(req): Json<MigrateDocumentRequest>,
) -> Result<Json<MigrateDocumentResponse>, ApiError> {
    let properties = properties_from(req.properties)?;
    let migrated = state.kits.migrate_document(&properties, req.schema_version);
    Ok(Json(MigrateDocumentResponse {
        properties: migrated.content,
        schema_version: migrated.schema_version,
        applied: migrated.applied,
        warnings: migrated.warnings,
    }))
}
