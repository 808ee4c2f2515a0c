//! Texture generation engine
//!
//! This module contains the zone texture pipeline:
//! - Layer image fetching and decoding
//! - Affine layer painting
//! - Caption rasterisation
//! - Texture compositing

mod compositor;
mod fetch;
mod raster;
mod text;

pub use compositor::{LayerSource, TextOptions, Texture, TextureCompositor, TextureError, MAX_OUTPUT_SCALE};
pub use fetch::{HttpImageFetcher, ImageFetcher};
pub use text::FontBook;

#[cfg(test)]
pub(crate) use compositor::tests::{is_uniform, MemoryFetcher};
