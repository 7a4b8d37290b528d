use std::path::PathBuf;

use anyhow::{ensure, Context, Result};

/// Application configuration loaded from environment variables.
/// Every variable has a default; `REDIS_URL` is optional and selects the
/// in-memory key-value store when absent.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Directory exported PDFs are saved into. Created at startup if missing.
    pub export_dir: PathBuf,
    /// Optional Redis connection string for the key-value store.
    pub redis_url: Option<String>,
    /// Oversampling factor applied when capturing a preview (default 2×).
    pub raster_scale: f32,
    /// Fixed settle delay before capture, in milliseconds (default 500).
    pub settle_delay_ms: u64,
    /// Physical page width for composed documents (default A4 portrait, 210mm).
    pub page_width_mm: f32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            port: env_or("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
            export_dir: PathBuf::from(env_or("EXPORT_DIR", "exports")),
            redis_url: std::env::var("REDIS_URL").ok(),
            raster_scale: env_or("RASTER_SCALE", "2.0")
                .parse::<f32>()
                .context("RASTER_SCALE must be a number")?,
            settle_delay_ms: env_or("SETTLE_DELAY_MS", "500")
                .parse::<u64>()
                .context("SETTLE_DELAY_MS must be an integer number of milliseconds")?,
            page_width_mm: env_or("PAGE_WIDTH_MM", "210.0")
                .parse::<f32>()
                .context("PAGE_WIDTH_MM must be a number")?,
        };

        ensure!(config.raster_scale > 0.0, "RASTER_SCALE must be positive");
        ensure!(config.page_width_mm > 0.0, "PAGE_WIDTH_MM must be positive");

        Ok(config)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
