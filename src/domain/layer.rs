//! Image layers and their placement transforms
//!
//! Layer coordinates are logical texture units relative to the canvas center.
//! Positive `y` moves down, rotation is clockwise in degrees.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lowest scale the transform sliders allow
pub const MIN_IMAGE_SCALE: f64 = 0.1;

/// Range of the position sliders in logical units
pub const POSITION_RANGE: f64 = 512.0;

/// Placement of one image layer within a zone texture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ImageTransform {
    /// Horizontal offset from center
    pub x: f64,
    /// Vertical offset from center (positive = down)
    pub y: f64,
    /// Clockwise rotation in degrees, 0-360
    pub rotation: f64,
    /// Uniform scale multiplier
    pub scale: f64,
}

impl Default for ImageTransform {
    /// Centered, unrotated, natural size
    fn default() -> Self {
        ImageTransform {
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale: 1.0,
        }
    }
}

/// Partial transform edit; absent fields keep their current value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TransformPatch {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub rotation: Option<f64>,
    #[serde(default)]
    pub scale: Option<f64>,
}

impl TransformPatch {
    pub fn scale(scale: f64) -> Self {
        TransformPatch { scale: Some(scale), ..Default::default() }
    }

    pub fn rotation(rotation: f64) -> Self {
        TransformPatch { rotation: Some(rotation), ..Default::default() }
    }

    pub fn position(x: f64, y: f64) -> Self {
        TransformPatch { x: Some(x), y: Some(y), ..Default::default() }
    }
}

/// Bounds applied to every transform edit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformLimits {
    pub min_scale: f64,
    pub max_scale: f64,
}

impl TransformLimits {
    pub fn new(max_scale: f64) -> Self {
        TransformLimits {
            min_scale: MIN_IMAGE_SCALE,
            max_scale: max_scale.max(MIN_IMAGE_SCALE),
        }
    }

    /// Clamp a scale into range. NaN falls back to the minimum.
    pub fn clamp_scale(&self, scale: f64) -> f64 {
        if scale.is_nan() {
            return self.min_scale;
        }
        scale.clamp(self.min_scale, self.max_scale)
    }
}

impl ImageTransform {
    /// Merge a patch into this transform, re-validating every field.
    ///
    /// Out of range values are clamped, never rejected.
    pub fn apply(&mut self, patch: &TransformPatch, limits: &TransformLimits) {
        if let Some(x) = patch.x {
            self.x = clamp_position(x);
        }
        if let Some(y) = patch.y {
            self.y = clamp_position(y);
        }
        if let Some(rotation) = patch.rotation {
            self.rotation = normalize_rotation(rotation);
        }
        self.scale = limits.clamp_scale(patch.scale.unwrap_or(self.scale));
    }
}

fn clamp_position(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(-POSITION_RANGE, POSITION_RANGE)
    } else {
        0.0
    }
}

/// Keep 360 as 360 so the slider end stays reachable; wrap everything else.
fn normalize_rotation(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return 0.0;
    }
    if (0.0..=360.0).contains(&degrees) {
        degrees
    } else {
        degrees.rem_euclid(360.0)
    }
}

/// A user-uploaded image placed within one zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ImageLayer {
    pub id: Uuid,
    /// Public URL returned by the image host
    pub url: String,
    pub transform: ImageTransform,
}

impl ImageLayer {
    /// New layer at the default transform
    pub fn new(url: impl Into<String>) -> Self {
        ImageLayer {
            id: Uuid::new_v4(),
            url: url.into(),
            transform: ImageTransform::default(),
        }
    }
}
