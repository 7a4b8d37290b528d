use std::sync::Arc;

use crate::config::Config;
use crate::export::Rasterizer;
use crate::store::KeyValueStore;
use crate::surface::SurfaceRegistry;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Registered CV previews, keyed by surface id.
    pub surfaces: Arc<SurfaceRegistry>,
    /// Pluggable capture backend. Default: PreviewRasterizer; tests swap in
    /// stub implementations.
    pub rasterizer: Arc<dyn Rasterizer>,
    /// Key-value persistence seam (export records). Redis when REDIS_URL is
    /// set, in-memory otherwise.
    pub store: Arc<dyn KeyValueStore>,
    pub config: Config,
}
