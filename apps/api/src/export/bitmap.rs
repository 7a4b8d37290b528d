//! The in-memory raster produced by a capture.

/// A fixed-resolution RGB8 raster of a surface, produced fresh per export
/// and never cached across calls.
#[derive(Debug, Clone)]
pub struct Bitmap {
    /// Pixel width: `scroll_width * scale`, rounded.
    pub width: u32,
    /// Pixel height: `scroll_height * scale`, rounded.
    pub height: u32,
    /// Oversampling multiplier relative to the surface's layout size.
    pub scale: f32,
    /// Row-major RGB8 pixels.
    pub data: Vec<u8>,
}

impl Bitmap {
    pub const BYTES_PER_PIXEL: usize = 3;

    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * Self::BYTES_PER_PIXEL
    }

    /// Checks the dimension/buffer invariants. Callers wrap the message into
    /// their own stage error (`RasterizationFailed` or `EncodingFailed`).
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("bitmap has zero area ({}x{})", self.width, self.height));
        }
        let expected = Self::expected_len(self.width, self.height);
        if self.data.len() != expected {
            return Err(format!(
                "pixel buffer length {} does not match {}x{} RGB ({} bytes)",
                self.data.len(),
                self.width,
                self.height,
                expected
            ));
        }
        Ok(())
    }

    /// Height-over-width ratio, preserved by page composition.
    pub fn aspect_ratio(&self) -> f32 {
        self.height as f32 / self.width as f32
    }
}
