//! Axum route handlers for the Export API.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::export::controller::{export_to_pdf, ExportOptions};
use crate::export::rasterizer::Rgb;
use crate::models::export::{ExportRecord, ExportResult};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub surface_id: String,
    /// Output filename; defaults to `Test_CV.pdf`.
    pub filename: Option<String>,
    /// Oversampling factor override (config default: 2.0).
    pub scale: Option<f32>,
    /// Background color as `#rrggbb` (default white).
    pub background: Option<String>,
    pub cross_origin_images: Option<bool>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/export
///
/// Runs the full pipeline: locate surface → settle delay → rasterize →
/// compose → save. Pipeline failures are part of the result value, not HTTP
/// errors, so this returns 200 with `success:false` when a stage fails.
pub async fn handle_export(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> Result<Json<ExportResult>, AppError> {
    if request.surface_id.trim().is_empty() {
        return Err(AppError::Validation("surface_id cannot be empty".to_string()));
    }

    let mut options = ExportOptions::from_config(&state.config);
    options.filename = request.filename;
    if let Some(scale) = request.scale {
        options.raster.scale = scale;
    }
    if let Some(background) = &request.background {
        options.raster.background = Rgb::parse_hex(background).ok_or_else(|| {
            AppError::Validation(format!("background '{background}' is not a #rrggbb color"))
        })?;
    }
    if let Some(cross_origin) = request.cross_origin_images {
        options.raster.cross_origin_images = cross_origin;
    }

    let result = export_to_pdf(
        &state.surfaces,
        state.rasterizer.as_ref(),
        state.store.as_ref(),
        &request.surface_id,
        &options,
    )
    .await;

    Ok(Json(result))
}

/// GET /api/v1/export/:surface_id/last
///
/// Returns the persisted record of the most recent export for a surface.
pub async fn handle_last_export(
    State(state): State<AppState>,
    Path(surface_id): Path<String>,
) -> Result<Json<ExportRecord>, AppError> {
    let json = state
        .store
        .get(&ExportRecord::store_key(&surface_id))
        .await
        .map_err(|e| AppError::Store(e.to_string()))?
        .ok_or_else(|| {
            AppError::NotFound(format!("No export recorded for surface '{surface_id}'"))
        })?;

    let record: ExportRecord = serde_json::from_str(&json)
        .map_err(|e| AppError::Store(format!("corrupt export record: {e}")))?;

    Ok(Json(record))
}

/// GET /api/v1/export/files/:filename
///
/// Streams a previously saved PDF out of the export directory.
pub async fn handle_download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    // Same restrictions as the save stage: bare filenames only.
    if filename.contains('/') || filename.contains('\\') || filename == "." || filename == ".." {
        return Err(AppError::Validation(
            "filename must not contain path components".to_string(),
        ));
    }

    let path = state.config.export_dir.join(&filename);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| AppError::NotFound(format!("Export '{filename}' not found")))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    ))
}
