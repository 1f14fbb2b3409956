//! Kit management endpoints (`/kits/*`).

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use kitsync_core::{KitDeletion, KitDocument, KitSummary};

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct SetGlobalRequest {
    pub kit_id: Option<Uuid>,
    /// When present (even as `null`), the pointer is only changed if it
    /// currently holds this value.
    #[serde(default, deserialize_with = "present")]
    pub expected: Option<Option<Uuid>>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<Uuid>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Uuid>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize)]
pub struct GlobalKitResponse {
    pub kit_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<Uuid>,
}

pub async fn list_kits(State(state): State<AppState>) -> Result<Json<Vec<KitSummary>>, ApiError> {
    Ok(Json(state.kits.list_kits().await?))
}

pub async fn get_kit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<KitDocument>, ApiError> {
    Ok(Json(state.kits.get_kit(id).await?))
}

pub async fn delete_kit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<KitDeletion>, ApiError> {
    Ok(Json(state.kits.delete_kit(id).await?))
}

pub async fn get_global(
    State(state): State<AppState>,
) -> Result<Json<GlobalKitResponse>, ApiError> {
    Ok(Json(GlobalKitResponse {
        kit_id: state.kits.global_kit().await?,
        previous: None,
    }))
}

/// Set the global kit, or compare-and-swap it when `expected` is given.
pub async fn set_global(
    State(state): State<AppState>,
    Json(req): Json<SetGlobalRequest>,
) -> Result<Json<GlobalKitResponse>, ApiError> {
    match req.expected {
        Some(expected) => {
            if !state.kits.swap_global(expected, req.kit_id).await? {
                return Err(ApiError::Conflict(
                    "The global kit was changed by another session".to_string(),
                ));
            }
            Ok(Json(GlobalKitResponse {
                kit_id: req.kit_id,
                previous: expected,
            }))
        }
        None => {
            let previous = state.kits.set_global(req.kit_id).await?;
            Ok(Json(GlobalKitResponse {
                kit_id: req.kit_id,
                previous,
            }))
        }
    }
}
