//! Axum route handlers for the Surface API.

use axum::{
    extract::{Path, State},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::state::AppState;
use crate::surface::Surface;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterSurfaceRequest {
    pub id: String,
    pub scroll_width: u32,
    pub scroll_height: u32,
    /// Base64-encoded row-major RGBA8 pixels at layout resolution.
    pub pixels_base64: String,
}

#[derive(Debug, Serialize)]
pub struct SurfaceResponse {
    pub id: String,
    pub scroll_width: u32,
    pub scroll_height: u32,
    pub registered_at: DateTime<Utc>,
}

impl SurfaceResponse {
    fn from_surface(surface: &Surface) -> Self {
        Self {
            id: surface.id.clone(),
            scroll_width: surface.scroll_width,
            scroll_height: surface.scroll_height,
            registered_at: surface.registered_at,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/surfaces
///
/// Registers (or replaces) the rendered CV preview the export pipeline
/// captures from. The preview arrives fully rendered; this service never
/// lays out or styles it.
pub async fn handle_register_surface(
    State(state): State<AppState>,
    Json(request): Json<RegisterSurfaceRequest>,
) -> Result<Json<SurfaceResponse>, AppError> {
    if request.id.trim().is_empty() {
        return Err(AppError::Validation("id cannot be empty".to_string()));
    }

    let pixels = BASE64
        .decode(request.pixels_base64.as_bytes())
        .map_err(|e| AppError::Validation(format!("pixels_base64 is not valid base64: {e}")))?;

    let surface = Surface::new(
        request.id,
        request.scroll_width,
        request.scroll_height,
        Bytes::from(pixels),
    )
    .map_err(|e| AppError::Validation(e.to_string()))?;

    tracing::info!(
        "Surface '{}' registered: {}x{} layout px",
        surface.id,
        surface.scroll_width,
        surface.scroll_height
    );

    let registered = state.surfaces.register(surface).await;
    Ok(Json(SurfaceResponse::from_surface(&registered)))
}

/// GET /api/v1/surfaces/:id
pub async fn handle_get_surface(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SurfaceResponse>, AppError> {
    let surface = state
        .surfaces
        .resolve(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Surface '{id}' not found")))?;

    Ok(Json(SurfaceResponse::from_surface(&surface)))
}

/// DELETE /api/v1/surfaces/:id
pub async fn handle_remove_surface(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.surfaces.remove(&id).await {
        return Err(AppError::NotFound(format!("Surface '{id}' not found")));
    }
    Ok(Json(serde_json::json!({ "removed": id })))
}
