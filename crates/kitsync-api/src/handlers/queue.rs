//! Stale queue endpoints (`/kit-queue/*`).

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use kitsync_core::DocumentId;

use super::encoded;
use crate::{ApiError, AppState};

/// How a stale document leaves the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Pull the latest content of the bound kit.
    Apply,
    /// Keep local settings and unbind.
    Discard,
}

#[derive(Debug, Deserialize)]
pub struct RemoveFromQueueRequest {
    /// Document id.
    pub id: DocumentId,
    #[serde(default)]
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Serialize)]
pub struct RemoveFromQueueResponse {
    /// Whether the document was queued.
    pub removed: bool,
    /// Fresh kit content after an `apply` resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StaleStatus {
    pub document_id: DocumentId,
    pub stale: bool,
}

/// Remove a document from the stale queue, optionally resolving it.
///
/// Missing entries are not an error: the response reports `removed: false`.
pub async fn remove_from_queue(
    State(state): State<AppState>,
    Json(req): Json<RemoveFromQueueRequest>,
) -> Result<Json<RemoveFromQueueResponse>, ApiError> {
    let response = match req.resolution {
        None => RemoveFromQueueResponse {
            removed: state.kits.dequeue(&req.id).await?,
            data: None,
        },
        Some(Resolution::Discard) => RemoveFromQueueResponse {
            removed: state.kits.resolve_discard(&req.id).await?,
            data: None,
        },
        Some(Resolution::Apply) => {
            let resolution = state.kits.resolve_apply(&req.id).await?;
            RemoveFromQueueResponse {
                removed: resolution.removed,
                data: resolution.content.as_ref().map(encoded).transpose()?,
            }
        }
    };
    Ok(Json(response))
}

/// Whether a document must pick up a newer global kit.
pub async fn queue_status(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<StaleStatus>, ApiError> {
    let document_id = DocumentId::new(document_id);
    let stale = state.kits.is_stale(&document_id).await?;
    Ok(Json(StaleStatus { document_id, stale }))
}
