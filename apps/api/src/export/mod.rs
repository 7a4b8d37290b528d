// The document export pipeline: surface → bitmap → single-page PDF → file.
// Stages fail fast with no retries; the controller normalizes every stage
// error into an `ExportResult` so nothing escapes to the caller as a fault.

pub mod bitmap;
pub mod composer;
pub mod controller;
pub mod handlers;
pub mod rasterizer;

use thiserror::Error;

pub use bitmap::Bitmap;
pub use composer::{compose, ComposedDocument};
pub use controller::{export_to_pdf, ExportOptions, DEFAULT_FILENAME};
pub use rasterizer::{PreviewRasterizer, RasterConfig, Rasterizer, Rgb};

/// Stage failure taxonomy for the export pipeline.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The surface handle did not resolve. The message is load-bearing:
    /// clients match on it verbatim.
    #[error("CV preview not found")]
    SurfaceNotFound,

    #[error("rasterization failed: {0}")]
    RasterizationFailed(String),

    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    #[error("save failed: {0}")]
    SaveFailed(String),
}
