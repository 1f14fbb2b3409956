//! Core data models for kitsync.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// PROPERTY VALUES
// =============================================================================

/// A single design property value.
///
/// Serialized as plain JSON: `null`, booleans, numbers, strings, arrays and
/// objects map one-to-one onto the variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<PropertyValue>),
    Struct(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Nesting depth; scalars are depth 0.
    pub fn depth(&self) -> usize {
        match self {
            PropertyValue::List(items) => 1 + items.iter().map(Self::depth).max().unwrap_or(0),
            PropertyValue::Struct(fields) => {
                1 + fields.values().map(Self::depth).max().unwrap_or(0)
            }
            _ => 0,
        }
    }

    pub fn as_list(&self) -> Option<&[PropertyValue]> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short type name used in warnings.
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Null => "null",
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Number(_) => "number",
            PropertyValue::Text(_) => "text",
            PropertyValue::List(_) => "list",
            PropertyValue::Struct(_) => "struct",
        }
    }
}

impl From<JsonValue> for PropertyValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => PropertyValue::Null,
            JsonValue::Bool(b) => PropertyValue::Bool(b),
            JsonValue::Number(n) => PropertyValue::Number(n),
            JsonValue::String(s) => PropertyValue::Text(s),
            JsonValue::Array(items) => {
                PropertyValue::List(items.into_iter().map(PropertyValue::from).collect())
            }
            JsonValue::Object(map) => PropertyValue::Struct(
                map.into_iter()
                    .map(|(k, v)| (k, PropertyValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<PropertyValue> for JsonValue {
    fn from(value: PropertyValue) -> Self {
        match value {
            PropertyValue::Null => JsonValue::Null,
            PropertyValue::Bool(b) => JsonValue::Bool(b),
            PropertyValue::Number(n) => JsonValue::Number(n),
            PropertyValue::Text(s) => JsonValue::String(s),
            PropertyValue::List(items) => {
                JsonValue::Array(items.into_iter().map(JsonValue::from).collect())
            }
            PropertyValue::Struct(fields) => JsonValue::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, JsonValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

/// Ordered mapping of property name to value.
pub type KitContent = BTreeMap<String, PropertyValue>;

// =============================================================================
// DOCUMENT IDENTIFIERS
// =============================================================================

/// Opaque host document identifier.
///
/// Hosts send numeric post ids as often as strings; both normalize to the
/// decimal string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<i64> for DocumentId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl<'de> Deserialize<'de> for DocumentId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        let id = match Wire::deserialize(deserializer)? {
            Wire::Text(s) => s,
            Wire::Signed(n) => n.to_string(),
            Wire::Unsigned(n) => n.to_string(),
        };
        if id.trim().is_empty() {
            return Err(serde::de::Error::custom("document id must not be empty"));
        }
        Ok(Self(id))
    }
}

// =============================================================================
// KITS
// =============================================================================

/// A stored style kit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KitDocument {
    pub id: Uuid,
    pub title: String,
    pub content: KitContent,
    pub schema_version: i32,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

/// Listing view of a kit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KitSummary {
    pub id: Uuid,
    pub title: String,
    pub schema_version: i32,
    pub property_count: usize,
    /// Whether this kit is the current global kit.
    pub is_global: bool,
    pub updated_at_utc: DateTime<Utc>,
}

/// Request for creating a kit.
#[derive(Debug, Clone)]
pub struct CreateKitRequest {
    pub title: String,
    pub content: KitContent,
    pub schema_version: i32,
}

/// Result of overwriting a kit's content.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KitUpdateOutcome {
    /// Whether the kit was the global kit at write time.
    pub was_global: bool,
    /// Documents newly marked stale by this write.
    pub enqueued: Vec<DocumentId>,
}

/// Result of deleting a kit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KitDeletion {
    pub kit_id: Uuid,
    pub was_global: bool,
    /// Documents whose binding referenced the kit and were unbound.
    pub unbound_documents: Vec<DocumentId>,
}

// =============================================================================
// BINDINGS
// =============================================================================

/// Per-document link to a kit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentBinding {
    pub document_id: DocumentId,
    pub kit_id: Option<Uuid>,
    /// Set while the document holds freshly imported template styles.
    pub recently_imported: bool,
    pub updated_at_utc: DateTime<Utc>,
}

/// Point-in-time view of the stale queue for the global kit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueSnapshot {
    pub global_kit_id: Option<Uuid>,
    pub stylekit_queue: Vec<DocumentId>,
}

// =============================================================================
// REMOTE CATALOG
// =============================================================================

/// Catalog metadata for one remote template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TemplateSummary {
    pub id: i64,
    pub title: String,
    pub thumbnail: String,
    pub tags: Vec<String>,
    #[serde(rename = "popularityIndex", alias = "popularity_index")]
    pub popularity_index: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "is_pro", deserialize_with = "lenient_bool")]
    pub is_pro: bool,
    pub published: i64,
}

impl TemplateSummary {
    pub fn is_pack(&self) -> bool {
        self.kind.eq_ignore_ascii_case("pack")
    }
}

/// Full payload of a single remote template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TemplateDetail {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, JsonValue>,
}

/// Persisted snapshot of the remote catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogCacheEntry {
    pub templates: Vec<TemplateSummary>,
    pub count: usize,
    pub fetched_at: DateTime<Utc>,
}

impl CatalogCacheEntry {
    pub fn new(templates: Vec<TemplateSummary>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            count: templates.len(),
            templates,
            fetched_at,
        }
    }
}

// The catalog sends `is_pro` as bool, 0/1 or "0"/"1".
fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::Bool(b) => b,
        JsonValue::Number(n) => n.as_i64().map(|v| v != 0).unwrap_or(false),
        JsonValue::String(s) => matches!(s.as_str(), "1" | "true" | "yes"),
        _ => false,
    })
}

// =============================================================================
// IMPORT HISTORY
// =============================================================================

/// One recorded template import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRecord {
    pub id: Uuid,
    pub template_id: i64,
    pub document_id: DocumentId,
    /// How the template was imported (e.g. "page", "block", "library").
    pub method: String,
    pub imported_at: DateTime<Utc>,
}

/// Request for recording an import.
#[derive(Debug, Clone, Deserialize)]
pub struct NewImportRecord {
    pub template_id: i64,
    pub document_id: DocumentId,
    pub method: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_property_value_from_json() {
        let value = PropertyValue::from(json!({"size": 16, "unit": "px", "tags": ["a"]}));
        match value {
            PropertyValue::Struct(fields) => {
                assert_eq!(fields.get("unit"), Some(&PropertyValue::from("px")));
                assert!(matches!(fields.get("size"), Some(PropertyValue::Number(_))));
                assert!(matches!(fields.get("tags"), Some(PropertyValue::List(_))));
            }
            other => panic!("expected struct, got {:?}", other),
        }
    }

    #[test]
    fn test_property_value_deserializes_untagged() {
        let value: PropertyValue = serde_json::from_str("null").unwrap();
        assert_eq!(value, PropertyValue::Null);
        let value: PropertyValue = serde_json::from_str("\"custom\"").unwrap();
        assert_eq!(value, PropertyValue::from("custom"));
        let value: PropertyValue = serde_json::from_str("[1, 2]").unwrap();
        assert_eq!(value.as_list().map(|l| l.len()), Some(2));
    }

    #[test]
    fn test_property_value_depth() {
        assert_eq!(PropertyValue::Bool(true).depth(), 0);
        assert_eq!(PropertyValue::from(json!([])).depth(), 1);
        assert_eq!(PropertyValue::from(json!({"a": {"b": [1]}})).depth(), 3);
    }

    #[test]
    fn test_document_id_accepts_numbers_and_strings() {
        let id: DocumentId = serde_json::from_str("42").unwrap();
        assert_eq!(id.as_str(), "42");
        let id: DocumentId = serde_json::from_str("\"post-7\"").unwrap();
        assert_eq!(id.as_str(), "post-7");
        assert_eq!(serde_json::to_string(&DocumentId::from(42)).unwrap(), "\"42\"");
    }

    #[test]
    fn test_document_id_rejects_empty() {
        assert!(serde_json::from_str::<DocumentId>("\"  \"").is_err());
    }

    #[test]
    fn test_template_summary_defaults_missing_fields() {
        let summary: TemplateSummary = serde_json::from_value(json!({
            "id": 12,
            "title": "Landing",
            "type": "pack",
            "is_pro": "1",
            "unknown": "ignored"
        }))
        .unwrap();
        assert_eq!(summary.id, 12);
        assert!(summary.is_pack());
        assert!(summary.is_pro);
        assert!(summary.tags.is_empty());
        assert_eq!(summary.popularity_index, 0);
    }

    #[test]
    fn test_template_detail_keeps_extra_fields() {
        let detail: TemplateDetail = serde_json::from_value(json!({
            "id": 3,
            "title": "Hero",
            "content": {"elements": []},
            "page_settings": {"ang_action": 1}
        }))
        .unwrap();
        assert!(detail.content.is_some());
        assert!(detail.data.is_none());
        assert!(detail.extra.contains_key("page_settings"));
    }

    #[test]
    fn test_catalog_entry_count_matches_templates() {
        let entry = CatalogCacheEntry::new(vec![TemplateSummary::default(); 3], Utc::now());
        assert_eq!(entry.count, 3);
    }
}
