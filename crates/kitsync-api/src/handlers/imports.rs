//! Template import history.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use kitsync_core::{ImportRecord, NewImportRecord};

use crate::{ApiError, AppState};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListImportsQuery {
    pub limit: Option<i64>,
}

pub async fn list_imports(
    State(state): State<AppState>,
    Query(query): Query<ListImportsQuery>,
) -> Result<Json<Vec<ImportRecord>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Ok(Json(state.kits.list_imports(limit).await?))
}

pub async fn record_import(
    State(state): State<AppState>,
    Json(req): Json<NewImportRecord>,
) -> Result<(StatusCode, Json<ImportRecord>), ApiError> {
    let record = state.kits.record_import(req).await?;
    Ok((StatusCode::CREATED, Json(record)))
}
