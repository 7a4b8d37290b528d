mod config;
mod errors;
mod export;
mod models;
mod routes;
mod state;
mod store;
mod surface;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::export::PreviewRasterizer;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::create_store;
use crate::surface::SurfaceRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CVPress API v{}", env!("CARGO_PKG_VERSION"));

    // Key-value store: Redis when configured, in-memory otherwise
    let store = create_store(config.redis_url.as_deref()).await?;

    // Export directory for saved PDFs
    tokio::fs::create_dir_all(&config.export_dir).await?;
    info!("Export directory: {}", config.export_dir.display());

    let state = AppState {
        surfaces: Arc::new(SurfaceRegistry::default()),
        rasterizer: Arc::new(PreviewRasterizer),
        store,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
