//! Text rasterisation for texture captions

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use rusttype::{Font, Scale};
use tracing::{info, warn};

use crate::domain::HexColor;

use super::compositor::TextureError;

/// Stroke drawn around every glyph, in logical units
const STROKE_WIDTH: f64 = 4.0;
const STROKE_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Loaded font faces keyed by family name
#[derive(Clone, Default)]
pub struct FontBook {
    fonts: HashMap<String, Arc<Font<'static>>>,
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every configured family; unreadable files are skipped with a warning
    pub fn load<P: AsRef<Path>>(families: &HashMap<String, P>) -> Self {
        let mut book = FontBook::new();

        for (family, path) in families {
            let path = path.as_ref();
            match std::fs::read(path) {
                Ok(bytes) => {
                    if let Err(e) = book.insert_bytes(family, bytes) {
                        warn!(family = %family, path = %path.display(), error = %e, "Failed to parse font");
                    } else {
                        info!(family = %family, path = %path.display(), "Loaded font");
                    }
                }
                Err(e) => {
                    warn!(family = %family, path = %path.display(), error = %e, "Failed to read font");
                }
            }
        }

        book
    }

    pub fn insert_bytes(&mut self, family: &str, bytes: Vec<u8>) -> Result<(), TextureError> {
        let font = Font::try_from_vec(bytes)
            .ok_or_else(|| TextureError::FontUnavailable(format!("{} is not a valid font", family)))?;
        self.fonts.insert(family.to_string(), Arc::new(font));
        Ok(())
    }

    pub fn get(&self, family: &str) -> Option<Arc<Font<'static>>> {
        self.fonts.get(family).cloned()
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }
}

/// Render `text` stroked in white and filled with `color`.
///
/// Returns an unrotated RGBA block whose center is the text's visual center.
/// `size_px` is in physical pixels; the stroke width scales with `pixel_scale`.
/// Blocks with an edge longer than `max_edge` are rejected before allocation.
pub fn render_text_block(
    font: &Font<'static>,
    text: &str,
    size_px: f64,
    color: HexColor,
    pixel_scale: f64,
    max_edge: u32,
) -> Result<RgbaImage, TextureError> {
    let scale = Scale::uniform(size_px.max(1.0) as f32);
    let (text_w, text_h) = text_size(scale, font, text);
    let stroke = ((STROKE_WIDTH * pixel_scale) / 2.0).ceil().max(1.0) as i32;

    let pad = stroke + 2;
    let width = (text_w.max(1) + 2 * pad) as u32;
    let height = (text_h.max(size_px as i32).max(1) + 2 * pad) as u32;
    if width > max_edge || height > max_edge {
        return Err(TextureError::TextTooLarge { width, height });
    }

    let mut block = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));

    let origin_x = pad;
    let origin_y = pad + (height as i32 - 2 * pad - text_h.max(0)) / 2;

    // Stroke: stamp the glyphs around a disc of the stroke radius
    for dy in -stroke..=stroke {
        for dx in -stroke..=stroke {
            if dx * dx + dy * dy > stroke * stroke {
                continue;
            }
            draw_text_mut(&mut block, STROKE_COLOR, origin_x + dx, origin_y + dy, scale, font, text);
        }
    }

    draw_text_mut(&mut block, color.to_rgba(), origin_x, origin_y, scale, font, text);

    Ok(block)
}
