//! Export orchestration: a linear, retry-free stage machine.
//!
//! `LocatingSurface → Delaying → Rasterizing → Composing → Saving`, each
//! stage an awaited suspend point. Any stage failure short-circuits and is
//! normalized into an `ExportResult`; callers never see a raw error. Each
//! run allocates its own bitmap and document, so concurrent exports are
//! independent and need no synchronization.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::export::{compose, ExportError, RasterConfig, Rasterizer};
use crate::models::export::{ExportRecord, ExportResult, PageDimensions};
use crate::store::KeyValueStore;
use crate::surface::SurfaceRegistry;

pub const DEFAULT_FILENAME: &str = "Test_CV.pdf";

/// Per-export settings, resolved from config defaults plus caller overrides.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Output filename; defaults to `Test_CV.pdf`.
    pub filename: Option<String>,
    pub raster: RasterConfig,
    /// Fixed wait before capture so asynchronous font/style loading can
    /// finish. A heuristic, not a readiness check.
    pub settle_delay: Duration,
    pub page_width_mm: f32,
    pub export_dir: PathBuf,
}

impl ExportOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            filename: None,
            raster: RasterConfig {
                scale: config.raster_scale,
                ..RasterConfig::default()
            },
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            page_width_mm: config.page_width_mm,
            export_dir: config.export_dir.clone(),
        }
    }
}

/// Runs the full pipeline for `surface_id` and reports a structured result.
///
/// Idempotent per call: no state is shared across invocations beyond the
/// read-only surface and the last-export record written at the end.
pub async fn export_to_pdf(
    registry: &SurfaceRegistry,
    rasterizer: &dyn Rasterizer,
    store: &dyn KeyValueStore,
    surface_id: &str,
    options: &ExportOptions,
) -> ExportResult {
    let result = match run_stages(registry, rasterizer, surface_id, options).await {
        Ok((filename, pages)) => ExportResult::succeeded(filename, pages),
        Err(e) => {
            warn!("Export of '{surface_id}' failed: {e}");
            ExportResult::failed(e.to_string())
        }
    };

    persist_record(store, surface_id, &result).await;
    result
}

async fn run_stages(
    registry: &SurfaceRegistry,
    rasterizer: &dyn Rasterizer,
    surface_id: &str,
    options: &ExportOptions,
) -> Result<(String, Vec<PageDimensions>), ExportError> {
    // LocatingSurface
    let surface = registry
        .resolve(surface_id)
        .await
        .ok_or(ExportError::SurfaceNotFound)?;
    info!(
        "Surface '{surface_id}' located: {}x{} layout px",
        surface.scroll_width, surface.scroll_height
    );

    // Delaying: give fonts/styles time to settle before capture.
    if !options.settle_delay.is_zero() {
        info!(
            "Waiting {}ms for the preview to settle",
            options.settle_delay.as_millis()
        );
        tokio::time::sleep(options.settle_delay).await;
    }

    // Rasterizing
    info!(
        "Capture config: scale={}, background=#{:02x}{:02x}{:02x}, cross_origin_images={}",
        options.raster.scale,
        options.raster.background.r,
        options.raster.background.g,
        options.raster.background.b,
        options.raster.cross_origin_images
    );
    let bitmap = rasterizer.rasterize(&surface, &options.raster).await?;
    info!(
        "Captured {}x{} px bitmap at {}x oversampling",
        bitmap.width, bitmap.height, bitmap.scale
    );

    // Composing
    let document = compose(&bitmap, options.page_width_mm)?;
    let page = document.pages[0];
    info!(
        "Composed {} page(s), {:.1}x{:.1}mm",
        document.pages.len(),
        page.width_mm,
        page.height_mm
    );

    // Saving
    let filename = sanitize_filename(options.filename.as_deref())?;
    let path = save_document(&options.export_dir, &filename, &document.bytes).await?;
    info!("Saved export to {}", path.display());

    Ok((filename, document.pages))
}

/// Restricts the output name to a bare `*.pdf` filename inside the export
/// directory. Falls back to the default when the caller supplies nothing.
fn sanitize_filename(requested: Option<&str>) -> Result<String, ExportError> {
    let name = match requested.map(str::trim) {
        None | Some("") => return Ok(DEFAULT_FILENAME.to_string()),
        Some(name) => name,
    };

    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(ExportError::SaveFailed(format!(
            "filename '{name}' must not contain path components"
        )));
    }

    if name.to_ascii_lowercase().ends_with(".pdf") {
        Ok(name.to_string())
    } else {
        Ok(format!("{name}.pdf"))
    }
}

async fn save_document(
    export_dir: &Path,
    filename: &str,
    bytes: &[u8],
) -> Result<PathBuf, ExportError> {
    tokio::fs::create_dir_all(export_dir)
        .await
        .map_err(|e| ExportError::SaveFailed(format!("create {}: {e}", export_dir.display())))?;

    let path = export_dir.join(filename);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| ExportError::SaveFailed(format!("write {}: {e}", path.display())))?;

    Ok(path)
}

/// Best-effort bookkeeping: a failure to record an export never fails the
/// export itself.
async fn persist_record(store: &dyn KeyValueStore, surface_id: &str, result: &ExportResult) {
    let record = ExportRecord::from_result(surface_id, result);
    let json = match serde_json::to_string(&record) {
        Ok(json) => json,
        Err(e) => {
            warn!("Could not serialize export record for '{surface_id}': {e}");
            return;
        }
    };
    if let Err(e) = store.set(&ExportRecord::store_key(surface_id), &json).await {
        warn!("Could not persist export record for '{surface_id}': {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{Bitmap, PreviewRasterizer};
    use crate::store::MemoryStore;
    use crate::surface::Surface;
    use async_trait::async_trait;
    use bytes::Bytes;

    fn test_options(dir: &Path) -> ExportOptions {
        ExportOptions {
            filename: None,
            raster: RasterConfig::default(),
            settle_delay: Duration::ZERO,
            page_width_mm: 210.0,
            export_dir: dir.to_path_buf(),
        }
    }

    async fn registry_with_preview(width: u32, height: u32) -> SurfaceRegistry {
        let registry = SurfaceRegistry::default();
        let pixels = vec![0xffu8; width as usize * height as usize * 4];
        registry
            .register(Surface::new("cv-preview".into(), width, height, Bytes::from(pixels)).unwrap())
            .await;
        registry
    }

    #[tokio::test]
    async fn test_missing_surface_reports_exact_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SurfaceRegistry::default();
        let store = MemoryStore::default();

        let result = export_to_pdf(
            &registry,
            &PreviewRasterizer,
            &store,
            "nonexistent-id",
            &test_options(dir.path()),
        )
        .await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("CV preview not found"));
        assert!(result.filename.is_none());
    }

    #[tokio::test]
    async fn test_nominal_export_saves_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with_preview(800, 1200).await;
        let store = MemoryStore::default();

        let result = export_to_pdf(
            &registry,
            &PreviewRasterizer,
            &store,
            "cv-preview",
            &test_options(dir.path()),
        )
        .await;

        assert!(result.success, "export failed: {:?}", result.error);
        assert_eq!(result.filename.as_deref(), Some(DEFAULT_FILENAME));
        assert_eq!(result.pages.len(), 1);
        assert!((result.pages[0].width_mm - 210.0).abs() < 1e-3);
        assert!((result.pages[0].height_mm - 315.0).abs() < 1e-3);

        let saved = std::fs::read(dir.path().join(DEFAULT_FILENAME)).unwrap();
        assert!(saved.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_repeated_export_produces_identical_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with_preview(640, 900).await;
        let store = MemoryStore::default();
        let options = test_options(dir.path());

        let first = export_to_pdf(&registry, &PreviewRasterizer, &store, "cv-preview", &options).await;
        let second =
            export_to_pdf(&registry, &PreviewRasterizer, &store, "cv-preview", &options).await;

        assert!(first.success && second.success);
        assert_eq!(first.pages, second.pages);
    }

    #[tokio::test]
    async fn test_export_writes_last_record() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with_preview(100, 100).await;
        let store = MemoryStore::default();

        export_to_pdf(
            &registry,
            &PreviewRasterizer,
            &store,
            "cv-preview",
            &test_options(dir.path()),
        )
        .await;

        let json = store
            .get(&ExportRecord::store_key("cv-preview"))
            .await
            .unwrap()
            .expect("record should be persisted");
        let record: ExportRecord = serde_json::from_str(&json).unwrap();
        assert!(record.success);
        assert_eq!(record.surface_id, "cv-preview");
    }

    #[tokio::test]
    async fn test_path_traversal_filename_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with_preview(100, 100).await;
        let store = MemoryStore::default();
        let options = ExportOptions {
            filename: Some("../escape.pdf".to_string()),
            ..test_options(dir.path())
        };

        let result =
            export_to_pdf(&registry, &PreviewRasterizer, &store, "cv-preview", &options).await;

        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("save failed"));
    }

    #[tokio::test]
    async fn test_rasterizer_failure_is_normalized() {
        struct FailingRasterizer;

        #[async_trait]
        impl Rasterizer for FailingRasterizer {
            async fn rasterize(
                &self,
                _surface: &Surface,
                _config: &RasterConfig,
            ) -> Result<Bitmap, ExportError> {
                Err(ExportError::RasterizationFailed(
                    "cross-origin image taint".to_string(),
                ))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with_preview(100, 100).await;
        let store = MemoryStore::default();

        let result = export_to_pdf(
            &registry,
            &FailingRasterizer,
            &store,
            "cv-preview",
            &test_options(dir.path()),
        )
        .await;

        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("rasterization failed: cross-origin image taint")
        );
    }

    #[test]
    fn test_sanitize_filename_defaults_and_extension() {
        assert_eq!(sanitize_filename(None).unwrap(), DEFAULT_FILENAME);
        assert_eq!(sanitize_filename(Some("  ")).unwrap(), DEFAULT_FILENAME);
        assert_eq!(sanitize_filename(Some("resume")).unwrap(), "resume.pdf");
        assert_eq!(sanitize_filename(Some("My_CV.PDF")).unwrap(), "My_CV.PDF");
        assert!(sanitize_filename(Some("a/b.pdf")).is_err());
        assert!(sanitize_filename(Some("..")).is_err());
    }
}
