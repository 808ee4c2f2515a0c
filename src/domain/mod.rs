//! Domain types and models

mod color;
mod layer;
mod zone;

pub use color::HexColor;
pub use layer::{ImageLayer, ImageTransform, TransformLimits, TransformPatch};
pub use zone::Zone;
