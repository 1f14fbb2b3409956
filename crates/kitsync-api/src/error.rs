//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

/// Shown with 404 and 422 responses: the usual cause is a kit deleted from
/// another session while an editor still referenced it.
const STALE_REFERENCE_HINT: &str =
    "The style kit may have been deleted in another session. Reload the kit list and try again.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{message}")]
    BadRequest { code: &'static str, message: String },
    #[error("{message}")]
    BadGateway { reason: &'static str, message: String },
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            code: "bad_request",
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::Validation(_) => "validation",
            ApiError::BadRequest { code, .. } => *code,
            ApiError::BadGateway { reason, .. } => *reason,
            ApiError::Conflict(_) => "conflict",
            ApiError::Internal(_) => "internal",
        }
    }

    fn hint(&self) -> Option<&'static str> {
        match self {
            ApiError::NotFound(_) | ApiError::Validation(_) => Some(STALE_REFERENCE_HINT),
            _ => None,
        }
    }
}

impl From<kitsync_core::Error> for ApiError {
    fn from(err: kitsync_core::Error) -> Self {
        use kitsync_core::Error;

        match err {
            Error::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            Error::KitNotFound(id) => ApiError::NotFound(format!("Style kit {} not found", id)),
            Error::Validation(msg) => ApiError::Validation(msg),
            Error::InvalidFormat(msg) => ApiError::BadRequest {
                code: "invalid_format",
                message: msg,
            },
            e @ Error::EmptyKit(_) => ApiError::BadRequest {
                code: "empty_kit",
                message: e.to_string(),
            },
            Error::Fetch(fetch) => ApiError::BadGateway {
                reason: fetch.reason(),
                message: fetch.to_string(),
            },
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(
                subsystem = "api",
                status = status.as_u16(),
                code = self.code(),
                error = %self,
                "Request failed"
            );
        }

        let mut body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        if let Some(hint) = self.hint() {
            body["hint"] = serde_json::Value::from(hint);
        }

        (status, Json(body)).into_response()
    }
}
