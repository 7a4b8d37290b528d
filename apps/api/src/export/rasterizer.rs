//! Capture stage: converts a registered surface into a fixed-resolution bitmap.
//!
//! The contract is exact: for a surface of `scroll_width x scroll_height`
//! layout pixels and an oversampling factor `scale`, the output bitmap is
//! `round(scroll_width * scale) x round(scroll_height * scale)` pixels.
//! Oversampling at 2x trades memory for sharper text in print; a
//! screen-resolution capture of small fonts degrades badly on paper.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::export::{Bitmap, ExportError};
use crate::surface::Surface;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb {
        r: 0xff,
        g: 0xff,
        b: 0xff,
    };

    /// Parses `#rrggbb` (leading `#` optional).
    pub fn parse_hex(value: &str) -> Option<Rgb> {
        let hex = value.strip_prefix('#').unwrap_or(value);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(Rgb {
            r: u8::from_str_radix(&hex[0..2], 16).ok()?,
            g: u8::from_str_radix(&hex[2..4], 16).ok()?,
            b: u8::from_str_radix(&hex[4..6], 16).ok()?,
        })
    }
}

/// Capture configuration for one rasterization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterConfig {
    /// Oversampling multiplier, must be positive. Default 2x.
    pub scale: f32,
    /// Color composited under transparent preview pixels. Default white.
    pub background: Rgb,
    /// Whether cross-origin image content was permitted when the preview was
    /// rendered. Recorded for diagnostics; the capture itself is local.
    pub cross_origin_images: bool,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            scale: 2.0,
            background: Rgb::WHITE,
            cross_origin_images: true,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rasterizer seam
// ────────────────────────────────────────────────────────────────────────────

/// Pluggable capture backend. Production uses [`PreviewRasterizer`]; tests
/// swap in failing or fixed-output implementations.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(
        &self,
        surface: &Surface,
        config: &RasterConfig,
    ) -> Result<Bitmap, ExportError>;
}

/// Captures from the surface's registered RGBA preview buffer:
/// alpha-composites over the configured background, then oversamples with
/// nearest-neighbor sampling to the exact contract dimensions.
pub struct PreviewRasterizer;

#[async_trait]
impl Rasterizer for PreviewRasterizer {
    async fn rasterize(
        &self,
        surface: &Surface,
        config: &RasterConfig,
    ) -> Result<Bitmap, ExportError> {
        if !(config.scale > 0.0) {
            return Err(ExportError::RasterizationFailed(format!(
                "scale must be positive, got {}",
                config.scale
            )));
        }

        let src_width = surface.scroll_width;
        let src_height = surface.scroll_height;
        let expected_rgba = src_width as usize * src_height as usize * 4;
        if surface.pixels.len() != expected_rgba {
            return Err(ExportError::RasterizationFailed(format!(
                "preview pixel buffer has {} bytes, expected {} for {}x{} RGBA",
                surface.pixels.len(),
                expected_rgba,
                src_width,
                src_height
            )));
        }

        let out_width = (src_width as f32 * config.scale).round() as u32;
        let out_height = (src_height as f32 * config.scale).round() as u32;
        if out_width == 0 || out_height == 0 {
            return Err(ExportError::RasterizationFailed(format!(
                "capture at scale {} collapses {}x{} to zero area",
                config.scale, src_width, src_height
            )));
        }

        // The pixel loop is CPU-bound; keep it off the async worker threads.
        let pixels = surface.pixels.clone();
        let config = *config;
        let task = tokio::task::spawn_blocking(move || {
            let data = composite_and_scale(
                &pixels,
                src_width,
                src_height,
                out_width,
                out_height,
                config.background,
            );
            Bitmap {
                width: out_width,
                height: out_height,
                scale: config.scale,
                data,
            }
        });

        let bitmap = task
            .await
            .map_err(|e| ExportError::RasterizationFailed(format!("capture task failed: {e}")))?;

        bitmap
            .validate()
            .map_err(ExportError::RasterizationFailed)?;

        Ok(bitmap)
    }
}

/// Nearest-neighbor resample of an RGBA source into an RGB output,
/// compositing each source pixel over `background` by its alpha.
fn composite_and_scale(
    rgba: &[u8],
    src_width: u32,
    src_height: u32,
    out_width: u32,
    out_height: u32,
    background: Rgb,
) -> Vec<u8> {
    let x_ratio = src_width as f32 / out_width as f32;
    let y_ratio = src_height as f32 / out_height as f32;

    let mut data = Vec::with_capacity(Bitmap::expected_len(out_width, out_height));
    for out_y in 0..out_height {
        let src_y = ((out_y as f32 * y_ratio) as u32).min(src_height - 1);
        for out_x in 0..out_width {
            let src_x = ((out_x as f32 * x_ratio) as u32).min(src_width - 1);
            let offset = (src_y as usize * src_width as usize + src_x as usize) * 4;
            let [r, g, b, a] = [
                rgba[offset],
                rgba[offset + 1],
                rgba[offset + 2],
                rgba[offset + 3],
            ];
            data.push(blend(r, background.r, a));
            data.push(blend(g, background.g, a));
            data.push(blend(b, background.b, a));
        }
    }
    data
}

/// Integer alpha-over: `src*a + bg*(255-a)`, rounded.
fn blend(src: u8, bg: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    ((src as u32 * a + bg as u32 * (255 - a) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn surface_filled(width: u32, height: u32, rgba: [u8; 4]) -> Surface {
        let pixels: Vec<u8> = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Surface::new("cv-preview".into(), width, height, Bytes::from(pixels)).unwrap()
    }

    #[tokio::test]
    async fn test_dimension_contract_at_scale_two() {
        let surface = surface_filled(800, 1200, [10, 20, 30, 255]);
        let bitmap = PreviewRasterizer
            .rasterize(&surface, &RasterConfig::default())
            .await
            .unwrap();
        assert_eq!((bitmap.width, bitmap.height), (1600, 2400));
        assert_eq!(bitmap.data.len(), Bitmap::expected_len(1600, 2400));
    }

    #[tokio::test]
    async fn test_scale_one_is_identity_size() {
        let surface = surface_filled(33, 7, [0, 0, 0, 255]);
        let config = RasterConfig {
            scale: 1.0,
            ..RasterConfig::default()
        };
        let bitmap = PreviewRasterizer
            .rasterize(&surface, &config)
            .await
            .unwrap();
        assert_eq!((bitmap.width, bitmap.height), (33, 7));
    }

    #[tokio::test]
    async fn test_opaque_pixels_pass_through() {
        let surface = surface_filled(2, 2, [200, 100, 50, 255]);
        let bitmap = PreviewRasterizer
            .rasterize(&surface, &RasterConfig::default())
            .await
            .unwrap();
        assert_eq!(&bitmap.data[0..3], &[200, 100, 50]);
    }

    #[tokio::test]
    async fn test_transparent_pixels_take_background() {
        let surface = surface_filled(2, 2, [200, 100, 50, 0]);
        let config = RasterConfig {
            background: Rgb { r: 1, g: 2, b: 3 },
            ..RasterConfig::default()
        };
        let bitmap = PreviewRasterizer
            .rasterize(&surface, &config)
            .await
            .unwrap();
        assert_eq!(&bitmap.data[0..3], &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_half_alpha_blends_toward_background() {
        // src 255 over bg 0 at alpha 128 → ~128.
        let surface = surface_filled(1, 1, [255, 255, 255, 128]);
        let config = RasterConfig {
            scale: 1.0,
            background: Rgb { r: 0, g: 0, b: 0 },
            cross_origin_images: true,
        };
        let bitmap = PreviewRasterizer
            .rasterize(&surface, &config)
            .await
            .unwrap();
        assert_eq!(bitmap.data[0], 128);
    }

    #[tokio::test]
    async fn test_non_positive_scale_fails() {
        let surface = surface_filled(4, 4, [0, 0, 0, 255]);
        let config = RasterConfig {
            scale: 0.0,
            ..RasterConfig::default()
        };
        let err = PreviewRasterizer
            .rasterize(&surface, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::RasterizationFailed(_)));
    }

    #[tokio::test]
    async fn test_truncated_preview_buffer_fails() {
        // Bypass Surface::new validation to simulate a corrupted buffer.
        let surface = Surface {
            id: "cv".into(),
            scroll_width: 4,
            scroll_height: 4,
            pixels: Bytes::from(vec![0u8; 8]),
            registered_at: chrono::Utc::now(),
        };
        let err = PreviewRasterizer
            .rasterize(&surface, &RasterConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::RasterizationFailed(_)));
    }

    #[test]
    fn test_parse_hex_colors() {
        assert_eq!(
            Rgb::parse_hex("#ff8000"),
            Some(Rgb {
                r: 255,
                g: 128,
                b: 0
            })
        );
        assert_eq!(Rgb::parse_hex("ffffff"), Some(Rgb::WHITE));
        assert_eq!(Rgb::parse_hex("#fff"), None);
        assert_eq!(Rgb::parse_hex("not-a-color"), None);
    }
}
