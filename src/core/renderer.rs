//! BitmapRenderer: one pixel per cell

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};

use crate::types::{Matrix, RenderError};

/// Live cells, fully opaque
pub const LIVE_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Dead cells, fully opaque
pub const DEAD_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Maps a grid to an RGBA bitmap (width = cols, height = rows)
#[derive(Debug, Clone)]
pub struct BitmapRenderer {
    live: Rgba<u8>,
    dead: Rgba<u8>,
}

impl Default for BitmapRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl BitmapRenderer {
    /// Black on white
    pub fn new() -> Self {
        Self {
            live: LIVE_COLOR,
            dead: DEAD_COLOR,
        }
    }

    /// Render one pixel per cell
    pub fn render(&self, matrix: &Matrix) -> RgbaImage {
        RgbaImage::from_fn(matrix.cols() as u32, matrix.rows() as u32, |x, y| {
            if matrix.get(y as usize, x as usize) {
                self.live
            } else {
                self.dead
            }
        })
    }
}

/// Nearest-neighbour upscale of an already rendered bitmap
pub fn upscale(image: &RgbaImage, scale: u32) -> RgbaImage {
    let scale = scale.max(1);
    RgbaImage::from_fn(image.width() * scale, image.height() * scale, |x, y| {
        *image.get_pixel(x / scale, y / scale)
    })
}

/// Encode a bitmap as PNG bytes
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}
