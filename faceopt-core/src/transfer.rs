//! Configuration import/export documents.
//!
//! Exported files wrap the [`OptimizationConfig`] with a timestamp, a version
//! tag and descriptive metadata:
//!
//! ```json
//! {
//!   "timestamp": "2025-01-01T10:00:00.000Z",
//!   "version": "1.0.0",
//!   "configuration": { "dataBalancing": { ... }, "model": { ... }, "dataset": { ... } },
//!   "metadata": { "model": "...", "purpose": "...", "techniques": ["..."] }
//! }
//! ```
//!
//! Imports only care about the `configuration` key.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::OptimizationConfig;

/// Version tag written into exported documents
pub const DOCUMENT_VERSION: &str = "1.0.0";

/// Prefix of exported file names
pub const FILE_PREFIX: &str = "face-detection-config";

/// Descriptive metadata attached to exported documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub model: String,
    pub purpose: String,
    pub techniques: Vec<String>,
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            model: "RetinaFace-Ghost MobileNetV3".to_string(),
            purpose: "Face Detection Optimization".to_string(),
            techniques: vec![
                "Data Balancing".to_string(),
                "Oversampling".to_string(),
                "Undersampling".to_string(),
            ],
        }
    }
}

/// Exported configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    pub timestamp: String,
    pub version: String,
    pub configuration: OptimizationConfig,
    pub metadata: DocumentMetadata,
}

impl ConfigDocument {
    pub fn new(configuration: OptimizationConfig) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            version: DOCUMENT_VERSION.to_string(),
            configuration,
            metadata: DocumentMetadata::default(),
        }
    }
}

/// Render the export document for `config` as pretty JSON
pub fn render_export(config: &OptimizationConfig) -> Result<String> {
    Ok(serde_json::to_string_pretty(&ConfigDocument::new(
        config.clone(),
    ))?)
}

/// File name for an export written now
pub fn export_file_name() -> String {
    format!("{}-{}.json", FILE_PREFIX, Utc::now().timestamp_millis())
}

/// Write the export document into `dir` and return the file path
pub fn export_to_dir(config: &OptimizationConfig, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name());
    std::fs::write(&path, render_export(config)?)?;
    tracing::info!(path = %path.display(), "Exported configuration");
    Ok(path)
}

/// Extract the configuration from document text.
///
/// Text that is not JSON is [`Error::UnreadableFile`]; a document without a
/// usable `configuration` value is [`Error::InvalidFormat`].
pub fn parse_import(text: &str) -> Result<OptimizationConfig> {
    let document: serde_json::Value =
        serde_json::from_str(text).map_err(|e| Error::UnreadableFile(e.to_string()))?;

    let configuration = match document.get("configuration") {
        Some(value) if !value.is_null() => value.clone(),
        _ => {
            return Err(Error::InvalidFormat(
                "document has no `configuration` key".to_string(),
            ))
        }
    };

    serde_json::from_value(configuration)
        .map_err(|e| Error::InvalidFormat(format!("`configuration` is malformed: {e}")))
}

/// Read and parse an exported document from disk
pub fn import_from_path(path: &Path) -> Result<OptimizationConfig> {
    let bytes = std::fs::read(path)
        .map_err(|e| Error::UnreadableFile(format!("{}: {}", path.display(), e)))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| Error::UnreadableFile(format!("{}: {}", path.display(), e)))?;

    let config = parse_import(&text)?;
    tracing::info!(path = %path.display(), "Imported configuration");
    Ok(config)
}
