//! Glove asset scene graph boundary
//!
//! The binder only needs named surfaces with a settable color and an optional
//! color map. [`MaterialScene`] is the in-memory material table built from the
//! zone list or from the named mesh nodes of a glTF/GLB file.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use image::{ImageError, ImageOutputFormat, RgbaImage};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{HexColor, Zone};
use crate::engine::Texture;

/// Scene loading errors
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Failed to load glTF asset: {0}")]
    Gltf(#[from] gltf::Error),
}

/// Texture wrapping along one axis. Zone textures never tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    ClampToEdge,
}

/// Texture minification filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinFilter {
    Linear,
}

/// A composited texture bound as a surface color map
#[derive(Debug, Clone)]
pub struct TextureMap {
    pub image: Arc<RgbaImage>,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub repeat: (f32, f32),
    pub offset: (f32, f32),
    pub flip_y: bool,
    pub anisotropy: u8,
    pub min_filter: MinFilter,
}

impl TextureMap {
    /// 1:1 mapping, no tiling
    pub fn clamped(texture: Texture) -> Self {
        TextureMap {
            image: Arc::new(texture.image),
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            repeat: (1.0, 1.0),
            offset: (0.0, 0.0),
            flip_y: false,
            anisotropy: 16,
            min_filter: MinFilter::Linear,
        }
    }

    /// Encode the bound image to PNG bytes
    pub fn encode_png(&self) -> Result<Vec<u8>, ImageError> {
        let mut buffer = std::io::Cursor::new(Vec::new());
        self.image.write_to(&mut buffer, ImageOutputFormat::Png)?;
        Ok(buffer.into_inner())
    }
}

impl PartialEq for TextureMap {
    fn eq(&self, other: &Self) -> bool {
        self.image.as_raw() == other.image.as_raw()
            && self.image.dimensions() == other.image.dimensions()
            && self.wrap_s == other.wrap_s
            && self.wrap_t == other.wrap_t
            && self.repeat == other.repeat
            && self.offset == other.offset
            && self.flip_y == other.flip_y
            && self.anisotropy == other.anisotropy
            && self.min_filter == other.min_filter
    }
}

/// Material state of one named surface
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialSlot {
    pub color: HexColor,
    pub map: Option<TextureMap>,
    /// Set whenever the renderer must re-upload material state
    pub needs_update: bool,
    /// Latest zone version whose application has started on this slot
    pub applied_version: u64,
}

impl MaterialSlot {
    pub fn new(color: HexColor) -> Self {
        MaterialSlot {
            color,
            map: None,
            needs_update: false,
            applied_version: 0,
        }
    }
}

/// Named surfaces exposed by a loaded asset
pub trait SceneAsset: Send + Sync {
    fn surface(&self, name: &str) -> Option<&MaterialSlot>;
    fn surface_mut(&mut self, name: &str) -> Option<&mut MaterialSlot>;
}

/// Shared handle to the live scene
pub type SharedScene = Arc<RwLock<MaterialScene>>;

/// In-memory material table keyed by mesh node name
#[derive(Debug, Clone, Default)]
pub struct MaterialScene {
    surfaces: BTreeMap<String, MaterialSlot>,
}

impl MaterialScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// One surface per zone, at the zone's default color
    pub fn with_zones(zones: &[Zone]) -> Self {
        let mut scene = MaterialScene::new();
        for zone in zones {
            scene.insert(zone.mesh_name(), zone.default_color());
        }
        scene
    }

    pub fn insert(&mut self, name: &str, color: HexColor) {
        self.surfaces.insert(name.to_string(), MaterialSlot::new(color));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.surfaces.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn into_shared(self) -> SharedScene {
        Arc::new(RwLock::new(self))
    }

    /// Collect named mesh nodes from a glTF/GLB document.
    ///
    /// Only node names and the first primitive's base color are read; mesh
    /// buffers are never loaded.
    pub fn from_gltf(path: &Path) -> Result<Self, SceneError> {
        let gltf = gltf::Gltf::open(path)?;
        let mut scene = MaterialScene::new();

        for node in gltf.nodes() {
            let (Some(name), Some(mesh)) = (node.name(), node.mesh()) else {
                continue;
            };

            let color = mesh
                .primitives()
                .next()
                .map(|p| p.material().pbr_metallic_roughness().base_color_factor())
                .map(|[r, g, b, _]| HexColor::new(to_u8(r), to_u8(g), to_u8(b)))
                .unwrap_or(HexColor::new(255, 255, 255));

            debug!(node = name, color = %color, "Found mesh node");
            scene.insert(name, color);
        }

        info!(path = %path.display(), surfaces = scene.len(), "Loaded glTF asset");
        Ok(scene)
    }
}

fn to_u8(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl SceneAsset for MaterialScene {
    fn surface(&self, name: &str) -> Option<&MaterialSlot> {
        self.surfaces.get(name)
    }

    fn surface_mut(&mut self, name: &str) -> Option<&mut MaterialSlot> {
        self.surfaces.get_mut(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_scene_has_every_mesh() {
        let scene = MaterialScene::with_zones(&Zone::ALL);
        assert_eq!(scene.len(), 9);
        let slot = scene.surface("Wrist Outline").unwrap();
        assert_eq!(slot.color, Zone::WristOutline.default_color());
        assert!(slot.map.is_none());
    }

    #[test]
    fn test_missing_surface() {
        let mut scene = MaterialScene::with_zones(&[Zone::Strap]);
        assert!(scene.surface_mut("Outer Palm").is_none());
        assert!(scene.surface_mut("Strap").is_some());
    }

    #[test]
    fn test_clamped_map_settings() {
        let texture = Texture { image: RgbaImage::new(4, 4) };
        let map = TextureMap::clamped(texture);
        assert_eq!(map.wrap_s, WrapMode::ClampToEdge);
        assert_eq!(map.wrap_t, WrapMode::ClampToEdge);
        assert_eq!(map.repeat, (1.0, 1.0));
        assert_eq!(map.offset, (0.0, 0.0));
        assert!(!map.flip_y);

        let png = map.encode_png().unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    const GLOVE_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "buffers": [{ "byteLength": 36 }],
        "bufferViews": [{ "buffer": 0, "byteLength": 36 }],
        "accessors": [{
            "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
            "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
        }],
        "materials": [{ "pbrMetallicRoughness": { "baseColorFactor": [1.0, 0.0, 0.0, 1.0] } }],
        "meshes": [
            { "primitives": [{ "attributes": { "POSITION": 0 }, "material": 0 }] },
            { "primitives": [{ "attributes": { "POSITION": 0 } }] }
        ],
        "nodes": [
            { "name": "Strap", "mesh": 0 },
            { "name": "Fingers", "mesh": 1 },
            { "name": "Glove", "children": [0, 1] },
            { "mesh": 0 }
        ],
        "scenes": [{ "nodes": [2] }],
        "scene": 0
    }"#;

    #[test]
    fn test_gltf_named_meshes_become_surfaces() {
        let path = std::env::temp_dir().join(format!("glove-{}.gltf", uuid::Uuid::new_v4()));
        std::fs::write(&path, GLOVE_GLTF).unwrap();

        let scene = MaterialScene::from_gltf(&path);
        std::fs::remove_file(&path).ok();
        let scene = scene.unwrap();

        // Unnamed and mesh-less nodes are skipped
        assert_eq!(scene.names().collect::<Vec<_>>(), vec!["Fingers", "Strap"]);
        assert_eq!(scene.surface("Strap").unwrap().color, HexColor::new(255, 0, 0));
        // Default material is white
        assert_eq!(scene.surface("Fingers").unwrap().color, HexColor::new(255, 255, 255));
        assert!(scene.surface("Glove").is_none());
        assert!(scene.surface("Strap").unwrap().map.is_none());
    }

    #[test]
    fn test_missing_gltf_file_errors() {
        let result = MaterialScene::from_gltf(Path::new("/nonexistent/glove.glb"));
        assert!(result.is_err());
    }

    #[test]
    fn test_channel_conversion() {
        assert_eq!(to_u8(1.0), 255);
        assert_eq!(to_u8(0.0), 0);
        assert_eq!(to_u8(2.0), 255);
    }
}
