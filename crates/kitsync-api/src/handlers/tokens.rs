//! Editor-facing kit endpoints (`/tokens/*`).
//!
//! `data` fields carry kit content as a JSON-encoded string, the shape the
//! editor feeds straight into its page settings model.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use kitsync_core::DocumentId;

use super::{encoded, properties_from};
use crate::{ApiError, AppState};

// =============================================================================
// REQUEST/RESPONSE TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct GetTokensRequest {
    /// Kit id.
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ApplyTokensRequest {
    /// Kit id.
    pub id: Uuid,
    pub document_id: DocumentId,
}

#[derive(Debug, Deserialize)]
pub struct SaveTokensRequest {
    /// Document the kit is saved from; bound to the new kit when present.
    #[serde(default)]
    pub id: Option<DocumentId>,
    pub title: String,
    pub tokens: JsonValue,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTokensRequest {
    /// Kit id.
    pub id: Uuid,
    /// Document the update was made from.
    #[serde(default)]
    pub current_id: Option<DocumentId>,
    pub tokens: JsonValue,
}

#[derive(Debug, Deserialize)]
pub struct ResetTokensRequest {
    /// Document id.
    pub id: DocumentId,
    pub properties: JsonValue,
}

#[derive(Debug, Serialize)]
pub struct TokensData {
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct SavedKit {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct UpdatedKit {
    pub updated: bool,
    pub enqueued: Vec<DocumentId>,
}

// =============================================================================
// HANDLERS
// =============================================================================

/// Content of a kit.
pub async fn get_tokens(
    State(state): State<AppState>,
    Json(req): Json<GetTokensRequest>,
) -> Result<Json<TokensData>, ApiError> {
    let kit = state.kits.get_kit(req.id).await?;
    Ok(Json(TokensData {
        data: encoded(&kit.content)?,
    }))
}

/// Bind a document to a kit and return the kit's content.
pub async fn apply_tokens(
    State(state): State<AppState>,
    Json(req): Json<ApplyTokensRequest>,
) -> Result<Json<TokensData>, ApiError> {
    let content = state.kits.apply_kit(&req.document_id, req.id).await?;
    Ok(Json(TokensData {
        data: encoded(&content)?,
    }))
}

/// Save a document's style settings as a new kit.
pub async fn save_tokens(
    State(state): State<AppState>,
    Json(req): Json<SaveTokensRequest>,
) -> Result<Json<SavedKit>, ApiError> {
    let properties = properties_from(req.tokens)?;
    let kit = state.kits.save_kit(&req.title, &properties).await?;
    if let Some(document_id) = req.id.as_ref() {
        state.kits.apply_kit(document_id, kit.id).await?;
    }
    Ok(Json(SavedKit { id: kit.id }))
}

/// Write a document's style settings back into its kit.
pub async fn update_tokens(
    State(state): State<AppState>,
    Json(req): Json<UpdateTokensRequest>,
) -> Result<Json<UpdatedKit>, ApiError> {
    let properties = properties_from(req.tokens)?;
    let outcome = state
        .kits
        .update_kit(req.id, &properties, req.current_id.as_ref())
        .await?;
    Ok(Json(UpdatedKit {
        updated: true,
        enqueued: outcome.enqueued,
    }))
}

/// Blank a document's style settings and unbind it.
pub async fn reset_tokens(
    State(state): State<AppState>,
    Json(req): Json<ResetTokensRequest>,
) -> Result<Json<TokensData>, ApiError> {
    let properties = properties_from(req.properties)?;
    let blank = state.kits.reset_document(&req.id, &properties).await?;
    Ok(Json(TokensData {
        data: encoded(&blank)?,
    }))
}
