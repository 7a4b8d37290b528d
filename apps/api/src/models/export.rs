//! Wire and persistence types for the export pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Physical dimensions of one composed page, in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageDimensions {
    pub width_mm: f32,
    pub height_mm: f32,
}

/// Outcome of a single export run.
///
/// Exactly one side is populated: a success carries the saved filename and
/// page dimensions, a failure carries a human-readable reason. The
/// constructors are the only way the rest of the crate builds one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<PageDimensions>,
}

impl ExportResult {
    pub fn succeeded(filename: String, pages: Vec<PageDimensions>) -> Self {
        Self {
            success: true,
            error: None,
            filename: Some(filename),
            pages,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(reason.into()),
            filename: None,
            pages: Vec::new(),
        }
    }
}

/// Record of the most recent export for a surface, persisted in the
/// key-value store under `export:last:<surface_id>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecord {
    pub id: Uuid,
    pub surface_id: String,
    pub filename: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub exported_at: DateTime<Utc>,
}

impl ExportRecord {
    pub fn from_result(surface_id: &str, result: &ExportResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            surface_id: surface_id.to_string(),
            filename: result.filename.clone(),
            success: result.success,
            error: result.error.clone(),
            exported_at: Utc::now(),
        }
    }

    pub fn store_key(surface_id: &str) -> String {
        format!("export:last:{surface_id}")
    }
}
