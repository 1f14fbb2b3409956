//! HTTP handlers for kitsync-api.

pub mod documents;
pub mod health;
pub mod heartbeat;
pub mod imports;
pub mod kits;
pub mod queue;
pub mod templates;
pub mod tokens;
pub mod transfer;

use serde_json::Value as JsonValue;

use kitsync_core::codec;
use kitsync_core::KitContent;

use crate::ApiError;

/// Editor property bags arrive either as a JSON-encoded string or as an
/// object.
pub(crate) fn properties_from(value: JsonValue) -> Result<KitContent, ApiError> {
    let content = match value {
        JsonValue::String(encoded) => codec::parse_properties(&encoded)?,
        JsonValue::Null => KitContent::new(),
        other => codec::validate_content(other)?,
    };
    Ok(content)
}

/// Content as the JSON string the editor expects in `data`.
pub(crate) fn encoded(content: &KitContent) -> Result<String, ApiError> {
    Ok(codec::encode_content(content)?)
}
