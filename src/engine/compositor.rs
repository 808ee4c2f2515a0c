//! Texture compositing pipeline
//!
//! Renders a square zone texture: background fill, then every image layer in
//! insertion order at its transform, then an optional caption. All geometry is
//! expressed in logical units on a 512x512 canvas; the output scale only
//! changes the physical resolution.

use std::sync::Arc;

use image::{DynamicImage, ImageError, RgbaImage};
use serde::Deserialize;
use thiserror::Error;
use utoipa::ToSchema;
use tracing::{debug, info, instrument};

use crate::config::FitPolicy;
use crate::domain::{HexColor, ImageLayer, ImageTransform};

use super::fetch::ImageFetcher;
use super::raster::{paint_layer, Placement};
use super::text::{render_text_block, FontBook};

/// Logical edge length of every texture
pub const BASE_TEXTURE_SIZE: f64 = 512.0;

/// Logical center; layer offsets are relative to it
const CANVAS_CENTER: f64 = BASE_TEXTURE_SIZE / 2.0;

/// Largest output scale accepted (2048x2048 physical pixels)
pub const MAX_OUTPUT_SCALE: f64 = 4.0;

/// Largest caption font size in logical units
pub const MAX_TEXT_SIZE: f64 = 256.0;

/// A caption block may be at most this many canvas edges wide
const MAX_TEXT_BLOCK_EDGES: u32 = 4;

/// Compositing errors
#[derive(Debug, Error)]
pub enum TextureError {
    #[error("Failed to fetch layer image: {0}")]
    FetchFailed(String),
    #[error("Failed to decode image: {0}")]
    DecodeFailed(#[from] ImageError),
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Invalid image URL: {0}")]
    InvalidUrl(String),
    #[error("Font unavailable: {0}")]
    FontUnavailable(String),
    #[error("Invalid output scale: {0} (expected 0 < scale <= 4)")]
    InvalidOutputScale(f64),
    #[error("Invalid text size: {0} (expected 0 < size <= 256)")]
    InvalidTextSize(f64),
    #[error("Caption too large: {width}x{height} pixels")]
    TextTooLarge { width: u32, height: u32 },
}

/// Optional caption drawn above all image layers
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
#[serde(default)]
pub struct TextOptions {
    pub text: String,
    /// Font family, resolved through the compositor's [`FontBook`]
    pub font: String,
    #[schema(value_type = String, example = "#FFFFFF")]
    pub color: HexColor,
    /// Absolute logical position of the text center
    pub x: f64,
    pub y: f64,
    /// Clockwise degrees
    pub rotation: f64,
    /// Font size in logical units
    pub size: f64,
}

impl Default for TextOptions {
    fn default() -> Self {
        TextOptions {
            text: String::new(),
            font: "Arial".to_string(),
            color: HexColor::new(255, 255, 255),
            x: CANVAS_CENTER,
            y: CANVAS_CENTER,
            rotation: 0.0,
            size: 64.0,
        }
    }
}

/// One layer as handed to the compositor
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSource {
    pub url: String,
    pub transform: ImageTransform,
}

impl From<&ImageLayer> for LayerSource {
    fn from(layer: &ImageLayer) -> Self {
        LayerSource {
            url: layer.url.clone(),
            transform: layer.transform,
        }
    }
}

/// Composited zone texture
#[derive(Debug, Clone)]
pub struct Texture {
    pub image: RgbaImage,
}

impl Texture {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Physical edge length for an output scale
pub fn texture_size(output_scale: f64) -> u32 {
    (BASE_TEXTURE_SIZE * output_scale).round().max(1.0) as u32
}

/// Renders zone textures
pub struct TextureCompositor {
    fetcher: Arc<dyn ImageFetcher>,
    fonts: FontBook,
    fit_policy: FitPolicy,
}

impl TextureCompositor {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, fonts: FontBook, fit_policy: FitPolicy) -> Self {
        TextureCompositor { fetcher, fonts, fit_policy }
    }

    pub fn fit_policy(&self) -> FitPolicy {
        self.fit_policy
    }

    /// Composite background, image layers and optional text into one texture.
    ///
    /// Any layer that fails to load fails the whole texture.
    #[instrument(skip_all, fields(background = %background, layers = layers.len(), output_scale = output_scale))]
    pub async fn composite(
        &self,
        background: HexColor,
        layers: &[LayerSource],
        text: Option<&TextOptions>,
        output_scale: f64,
    ) -> Result<Texture, TextureError> {
        if !output_scale.is_finite() || output_scale <= 0.0 || output_scale > MAX_OUTPUT_SCALE {
            return Err(TextureError::InvalidOutputScale(output_scale));
        }

        let text = text.filter(|t| !t.text.is_empty());
        if let Some(options) = text {
            if !options.size.is_finite() || options.size <= 0.0 || options.size > MAX_TEXT_SIZE {
                return Err(TextureError::InvalidTextSize(options.size));
            }
        }

        let size = texture_size(output_scale);
        let mut canvas = RgbaImage::from_pixel(size, size, background.to_rgba());

        // Layers decode sequentially so paint order equals insertion order
        for (index, layer) in layers.iter().enumerate() {
            let image = self.fetcher.fetch(&layer.url).await?;
            let placement = self.layer_placement(&image, &layer.transform, output_scale);

            debug!(
                index,
                center_x = placement.center_x,
                center_y = placement.center_y,
                rotation = placement.rotation_deg,
                scale = placement.scale,
                "Painting image layer"
            );

            paint_layer(&mut canvas, &image.to_rgba8(), placement);
        }

        if let Some(options) = text {
            self.paint_text(&mut canvas, options, output_scale)?;
        }

        // The canvas starts opaque and source-over never lowers alpha
        for pixel in canvas.pixels_mut() {
            pixel.0[3] = 255;
        }

        info!(size, layers = layers.len(), "Texture composited");

        Ok(Texture { image: canvas })
    }

    /// Canvas placement of a decoded layer image
    fn layer_placement(&self, image: &DynamicImage, transform: &ImageTransform, output_scale: f64) -> Placement {
        let fit = match self.fit_policy {
            FitPolicy::Natural => 1.0,
            FitPolicy::Contain { box_size } => {
                let longest = image.width().max(image.height()).max(1) as f64;
                box_size / longest
            }
        };

        Placement {
            center_x: (transform.x + CANVAS_CENTER) * output_scale,
            center_y: (transform.y + CANVAS_CENTER) * output_scale,
            rotation_deg: transform.rotation,
            scale: transform.scale * fit * output_scale,
        }
    }

    fn paint_text(&self, canvas: &mut RgbaImage, options: &TextOptions, output_scale: f64) -> Result<(), TextureError> {
        let font = self
            .fonts
            .get(&options.font)
            .ok_or_else(|| TextureError::FontUnavailable(options.font.clone()))?;

        let max_edge = texture_size(output_scale) * MAX_TEXT_BLOCK_EDGES;
        let block = render_text_block(
            &font,
            &options.text,
            options.size * output_scale,
            options.color,
            output_scale,
            max_edge,
        )?;

        paint_layer(
            canvas,
            &block,
            Placement {
                center_x: options.x * output_scale,
                center_y: options.y * output_scale,
                rotation_deg: options.rotation,
                scale: 1.0,
            },
        );

        Ok(())
    }
}
