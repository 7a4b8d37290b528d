//! In-memory registry of renderable surfaces.
//!
//! A surface is an opaque visual source: a stable string id, intrinsic
//! layout dimensions, and an RGBA pixel buffer captured at layout
//! resolution. The registry owns surface lifecycle on behalf of the UI
//! layer; the export pipeline resolves an `Arc<Surface>` and works on its
//! own clone of the handle, so no registry lock is held during an export.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

const RGBA_BYTES_PER_PIXEL: usize = 4;

#[derive(Debug, Error, PartialEq)]
pub enum SurfaceError {
    #[error("surface dimensions must be positive, got {width}x{height}")]
    ZeroDimensions { width: u32, height: u32 },

    #[error("pixel buffer length {actual} does not match {width}x{height} RGBA ({expected} bytes)")]
    PixelLengthMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// A registered CV preview. Read-only once registered; re-registering the
/// same id replaces the whole surface.
#[derive(Debug, Clone)]
pub struct Surface {
    pub id: String,
    /// Intrinsic layout width, in layout pixels.
    pub scroll_width: u32,
    /// Intrinsic layout height, in layout pixels.
    pub scroll_height: u32,
    /// Row-major RGBA8 pixels at layout resolution.
    pub pixels: Bytes,
    pub registered_at: DateTime<Utc>,
}

impl Surface {
    pub fn new(
        id: String,
        scroll_width: u32,
        scroll_height: u32,
        pixels: Bytes,
    ) -> Result<Self, SurfaceError> {
        if scroll_width == 0 || scroll_height == 0 {
            return Err(SurfaceError::ZeroDimensions {
                width: scroll_width,
                height: scroll_height,
            });
        }

        let expected = scroll_width as usize * scroll_height as usize * RGBA_BYTES_PER_PIXEL;
        if pixels.len() != expected {
            return Err(SurfaceError::PixelLengthMismatch {
                width: scroll_width,
                height: scroll_height,
                expected,
                actual: pixels.len(),
            });
        }

        Ok(Self {
            id,
            scroll_width,
            scroll_height,
            pixels,
            registered_at: Utc::now(),
        })
    }
}

/// Shared surface store, keyed by surface id.
#[derive(Default)]
pub struct SurfaceRegistry {
    surfaces: RwLock<HashMap<String, Arc<Surface>>>,
}

impl SurfaceRegistry {
    /// Registers a surface, replacing any previous one with the same id.
    pub async fn register(&self, surface: Surface) -> Arc<Surface> {
        let surface = Arc::new(surface);
        self.surfaces
            .write()
            .await
            .insert(surface.id.clone(), Arc::clone(&surface));
        surface
    }

    /// Resolves a surface handle. The returned `Arc` stays valid even if the
    /// surface is replaced or removed while an export is in flight.
    pub async fn resolve(&self, id: &str) -> Option<Arc<Surface>> {
        self.surfaces.read().await.get(id).cloned()
    }

    /// Removes a surface. Returns whether it existed.
    pub async fn remove(&self, id: &str) -> bool {
        self.surfaces.write().await.remove(id).is_some()
    }
}
