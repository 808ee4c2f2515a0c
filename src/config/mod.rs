//! Configuration module for the customizer service

use std::collections::HashMap;
use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::engine::MAX_OUTPUT_SCALE;

/// Main application settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub upload: UploadSettings,
    #[serde(default)]
    pub texture: TextureSettings,
    #[serde(default)]
    pub asset: AssetSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Class of client device the session is tuned for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// Small screens / mobile browsers
    Constrained,
    Standard,
}

impl Default for DeviceClass {
    fn default() -> Self {
        DeviceClass::Standard
    }
}

/// Device-dependent limits, resolved once at startup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceProfile {
    pub max_upload_bytes: u64,
    pub max_image_scale: f64,
    pub texture_output_scale: f64,
}

const MIB: u64 = 1024 * 1024;

impl DeviceProfile {
    pub fn for_class(class: DeviceClass) -> Self {
        match class {
            DeviceClass::Constrained => DeviceProfile {
                max_upload_bytes: 2 * MIB,
                max_image_scale: 1.0,
                texture_output_scale: 0.7,
            },
            DeviceClass::Standard => DeviceProfile {
                max_upload_bytes: 5 * MIB,
                max_image_scale: 1.5,
                texture_output_scale: 1.0,
            },
        }
    }

    /// Upload limit in whole megabytes, for user-facing messages
    pub fn max_upload_mb(&self) -> u64 {
        self.max_upload_bytes / MIB
    }
}

/// Device class plus optional per-limit overrides
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceSettings {
    #[serde(default)]
    pub class: DeviceClass,
    pub max_upload_bytes: Option<u64>,
    pub max_image_scale: Option<f64>,
    pub texture_output_scale: Option<f64>,
}

impl DeviceSettings {
    pub fn profile(&self) -> DeviceProfile {
        let base = DeviceProfile::for_class(self.class);
        DeviceProfile {
            max_upload_bytes: self.max_upload_bytes.unwrap_or(base.max_upload_bytes),
            max_image_scale: self.max_image_scale.unwrap_or(base.max_image_scale),
            texture_output_scale: self
                .texture_output_scale
                .filter(|s| s.is_finite() && *s > 0.0 && *s <= MAX_OUTPUT_SCALE)
                .unwrap_or(base.texture_output_scale),
        }
    }
}

/// Image hosting endpoint for user uploads
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub endpoint: String,
    pub upload_preset: String,
    pub quality: String,
    pub format: String,
    pub timeout_secs: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        UploadSettings {
            endpoint: "https://api.cloudinary.com/v1_1/dru9xjgwo/image/upload".to_string(),
            upload_preset: "glove_upload".to_string(),
            quality: "auto:good".to_string(),
            format: "webp".to_string(),
            timeout_secs: 30,
        }
    }
}

/// How an image layer is sized before its own scale is applied
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitPolicy {
    /// Draw at natural pixel size; may overflow the canvas
    Natural,
    /// Fit inside a square box of this many logical units
    Contain { box_size: f64 },
}

impl Default for FitPolicy {
    fn default() -> Self {
        FitPolicy::Natural
    }
}

/// Texture compositing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TextureSettings {
    pub fit_policy: FitPolicy,
    pub fetch_timeout_secs: u64,
    /// Font family name -> TTF/OTF file
    pub fonts: HashMap<String, PathBuf>,
}

impl Default for TextureSettings {
    fn default() -> Self {
        TextureSettings {
            fit_policy: FitPolicy::Natural,
            fetch_timeout_secs: 30,
            fonts: HashMap::new(),
        }
    }
}

/// Glove asset location
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetSettings {
    /// glTF/GLB file; when absent every zone is bound to a detached material
    pub path: Option<PathBuf>,
}

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Configuration priority (highest to lowest):
    /// 1. Environment variables (prefixed with GLOVE_)
    /// 2. config/local.toml (gitignored)
    /// 3. config/default.toml
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"));

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // GLOVE_SERVER__PORT, GLOVE_DEVICE__CLASS, etc.
            .add_source(
                Environment::with_prefix("GLOVE")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 8080,
                workers: None,
            },
            device: DeviceSettings::default(),
            upload: UploadSettings::default(),
            texture: TextureSettings::default(),
            asset: AssetSettings::default(),
        }
    }
}
