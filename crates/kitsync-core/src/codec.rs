//! Kit export/import codec.
//!
//! Exported kits are JSON files of the form
//! `{"title": ..., "content": {...}, "schema_version": n}`. Older exports
//! stored `content` as a JSON-encoded string and carried no schema version;
//! both are accepted on import and treated as [`LEGACY_SCHEMA_VERSION`].
//!
//! Several kits travel together as a zip archive with one kit file per
//! entry, named as a single export would be.

use std::io::{Cursor, Read, Write};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults::MAX_PROPERTY_DEPTH;
use crate::error::{Error, Result};
use crate::migration::LEGACY_SCHEMA_VERSION;
use crate::models::{KitContent, KitDocument, PropertyValue};

/// A kit serialized for download.
#[derive(Debug, Clone)]
pub struct KitExport {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// A kit decoded from an import file, not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedKit {
    pub title: String,
    pub content: KitContent,
    pub schema_version: i32,
}

#[derive(Serialize)]
struct ExportFile<'a> {
    title: &'a str,
    content: &'a KitContent,
    schema_version: i32,
}

#[derive(Deserialize)]
struct ImportFile {
    #[serde(default)]
    title: Option<String>,
    content: Option<JsonValue>,
    #[serde(default)]
    schema_version: Option<i32>,
}

/// Serialize a kit for download. Fails with [`Error::EmptyKit`] when the kit
/// has no properties.
pub fn export_kit(kit: &KitDocument, date: NaiveDate) -> Result<KitExport> {
    if kit.content.is_empty() {
        return Err(Error::EmptyKit(kit.id));
    }
    let file = ExportFile {
        title: &kit.title,
        content: &kit.content,
        schema_version: kit.schema_version,
    };
    Ok(KitExport {
        filename: export_filename(kit.id, date),
        bytes: serde_json::to_vec(&file)?,
    })
}

/// `kit-{id}-{YYYY-MM-DD}.json`
pub fn export_filename(id: Uuid, date: NaiveDate) -> String {
    format!("kit-{}-{}.json", id, date.format("%Y-%m-%d"))
}

/// `kits-{YYYY-MM-DD}.zip`
pub fn archive_filename(date: NaiveDate) -> String {
    format!("kits-{}.zip", date.format("%Y-%m-%d"))
}

/// Bundle several kits into one zip archive, one `kit-{id}-{date}.json`
/// entry per kit. Fails with [`Error::EmptyKit`] on the first kit without
/// properties and with [`Error::Validation`] when `kits` is empty.
pub fn export_archive(kits: &[KitDocument], date: NaiveDate) -> Result<KitExport> {
    if kits.is_empty() {
        return Err(Error::Validation(
            "select at least one kit to export".to_string(),
        ));
    }

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for kit in kits {
        let export = export_kit(kit, date)?;
        writer
            .start_file(export.filename, options)
            .map_err(|e| Error::Internal(format!("failed to write archive entry: {}", e)))?;
        writer.write_all(&export.bytes)?;
    }
    let cursor = writer
        .finish()
        .map_err(|e| Error::Internal(format!("failed to finish archive: {}", e)))?;

    Ok(KitExport {
        filename: archive_filename(date),
        bytes: cursor.into_inner(),
    })
}

/// Decode a single exported kit file.
pub fn decode_kit_file(bytes: &[u8]) -> Result<ImportedKit> {
    let file: ImportFile = serde_json::from_slice(bytes)
        .map_err(|e| Error::InvalidFormat(format!("kit file is not valid JSON: {}", e)))?;

    let title = file
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::InvalidFormat("kit file has no title".to_string()))?;

    let content = match file.content {
        Some(JsonValue::String(encoded)) => {
            let inner: JsonValue = serde_json::from_str(&encoded).map_err(|e| {
                Error::InvalidFormat(format!("kit content string is not valid JSON: {}", e))
            })?;
            validate_content(inner)?
        }
        Some(value) => validate_content(value)?,
        None => return Err(Error::InvalidFormat("kit file has no content".to_string())),
    };

    Ok(ImportedKit {
        title,
        content,
        schema_version: file.schema_version.unwrap_or(LEGACY_SCHEMA_VERSION),
    })
}

/// Decode every `.json` kit file in a zip archive. Other entries are skipped.
/// Entries larger than `max_bytes` once decompressed are rejected.
pub fn decode_archive(bytes: &[u8], max_bytes: usize) -> Result<Vec<ImportedKit>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::InvalidFormat(format!("not a zip archive: {}", e)))?;

    let mut kits = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| Error::InvalidFormat(format!("unreadable archive entry: {}", e)))?;
        let name = entry.name().to_string();
        if entry.is_dir() || !name.to_ascii_lowercase().ends_with(".json") {
            tracing::debug!(entry = %name, "Skipping non-kit archive entry");
            continue;
        }
        if entry.size() > max_bytes as u64 {
            return Err(Error::InvalidFormat(format!(
                "archive entry {} exceeds {} bytes",
                name, max_bytes
            )));
        }

        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.by_ref().take(max_bytes as u64 + 1).read_to_end(&mut buf)?;
        if buf.len() > max_bytes {
            return Err(Error::InvalidFormat(format!(
                "archive entry {} exceeds {} bytes",
                name, max_bytes
            )));
        }
        let kit = decode_kit_file(&buf)
            .map_err(|e| Error::InvalidFormat(format!("{}: {}", name, e)))?;
        kits.push(kit);
    }

    if kits.is_empty() {
        return Err(Error::InvalidFormat(
            "archive contains no kit files".to_string(),
        ));
    }
    Ok(kits)
}

/// Decode an uploaded import by file extension (`.json` or `.zip`).
///
/// `max_bytes` bounds the upload and, for archives, each decompressed entry.
pub fn decode_import(filename: &str, bytes: &[u8], max_bytes: usize) -> Result<Vec<ImportedKit>> {
    if bytes.len() > max_bytes {
        return Err(Error::InvalidFormat(format!(
            "import exceeds {} bytes",
            max_bytes
        )));
    }
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".zip") {
        decode_archive(bytes, max_bytes)
    } else if lower.ends_with(".json") {
        Ok(vec![decode_kit_file(bytes)?])
    } else {
        Err(Error::InvalidFormat(format!(
            "unsupported import file type: {}",
            filename
        )))
    }
}

/// Validate raw JSON as kit content: an object with non-empty keys and
/// bounded nesting.
pub fn validate_content(value: JsonValue) -> Result<KitContent> {
    let JsonValue::Object(map) = value else {
        return Err(Error::InvalidFormat(
            "kit content must be a JSON object".to_string(),
        ));
    };

    let mut content = KitContent::new();
    for (key, raw) in map {
        if key.trim().is_empty() {
            return Err(Error::InvalidFormat(
                "property names must not be empty".to_string(),
            ));
        }
        let value = PropertyValue::from(raw);
        if value.depth() > MAX_PROPERTY_DEPTH {
            return Err(Error::InvalidFormat(format!(
                "property {} nests deeper than {} levels",
                key, MAX_PROPERTY_DEPTH
            )));
        }
        content.insert(key, value);
    }
    Ok(content)
}

/// Parse a JSON-encoded property bag, as sent by the editor.
pub fn parse_properties(encoded: &str) -> Result<KitContent> {
    let value: JsonValue = serde_json::from_str(encoded)
        .map_err(|e| Error::InvalidFormat(format!("properties are not valid JSON: {}", e)))?;
    validate_content(value)
}

/// Encode content as the JSON string the editor expects.
pub fn encode_content(content: &KitContent) -> Result<String> {
    Ok(serde_json::to_string(content)?)
}
