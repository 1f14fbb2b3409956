//! Error types for kitsync.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using kitsync's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a request to the remote template catalog failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Connection-level failure (DNS, TLS, reset, ...).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The request did not complete within its timeout.
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The server answered with a non-success status code.
    #[error("the request returned with a status code of {0}")]
    HttpStatus(u16),

    /// The payload carried an explicit `error` field.
    #[error("remote error: {0}")]
    Payload(String),

    /// The payload had neither `content` nor `data`.
    #[error("an invalid data was returned")]
    EmptyPayload,

    /// The body could not be parsed into the expected structure.
    #[error("malformed response body: {0}")]
    Decode(String),
}

impl FetchError {
    /// Short machine-readable reason used in logs and API error codes.
    pub fn reason(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Timeout(_) => "timeout",
            FetchError::HttpStatus(_) => "http_status",
            FetchError::Payload(_) => "payload_error",
            FetchError::EmptyPayload => "empty_payload",
            FetchError::Decode(_) => "decode",
        }
    }
}

/// Core error type for kitsync operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Kit not found
    #[error("Style kit not found: {0}")]
    KitNotFound(Uuid),

    /// Export requested for a kit without any content
    #[error("Style kit {0} is empty")]
    EmptyKit(Uuid),

    /// Import payload could not be decoded
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Remote catalog request failed
    #[error("Catalog fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Request referenced state that does not allow the operation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors caused by a referenced kit or document that is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::KitNotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("binding doc-1".to_string());
        assert_eq!(err.to_string(), "Not found: binding doc-1");
    }

    #[test]
    fn test_error_display_kit_not_found() {
        let id = Uuid::nil();
        let err = Error::KitNotFound(id);
        assert_eq!(err.to_string(), format!("Style kit not found: {}", id));
    }

    #[test]
    fn test_error_display_empty_kit() {
        let id = Uuid::nil();
        let err = Error::EmptyKit(id);
        assert_eq!(err.to_string(), format!("Style kit {} is empty", id));
    }

    #[test]
    fn test_error_display_fetch_status() {
        let err = Error::Fetch(FetchError::HttpStatus(503));
        assert_eq!(
            err.to_string(),
            "Catalog fetch failed: the request returned with a status code of 503"
        );
    }

    #[test]
    fn test_fetch_error_timeout_display() {
        let err = FetchError::Timeout(Duration::from_secs(8));
        assert_eq!(err.to_string(), "request timed out after 8s");
    }

    #[test]
    fn test_fetch_error_reasons_are_distinct() {
        let reasons = [
            FetchError::Transport("x".into()).reason(),
            FetchError::Timeout(Duration::from_secs(1)).reason(),
            FetchError::HttpStatus(500).reason(),
            FetchError::Payload("x".into()).reason(),
            FetchError::EmptyPayload.reason(),
            FetchError::Decode("x".into()).reason(),
        ];
        let unique: std::collections::HashSet<_> = reasons.iter().collect();
        assert_eq!(unique.len(), reasons.len());
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::KitNotFound(Uuid::nil()).is_not_found());
        assert!(Error::NotFound("x".into()).is_not_found());
        assert!(!Error::Validation("x".into()).is_not_found());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
