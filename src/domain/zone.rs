//! Glove zones
//!
//! Each zone maps to one named mesh node in the glove asset. Only a subset of
//! zones carries image layers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use super::color::HexColor;

/// Zone parsing errors
#[derive(Debug, Error)]
pub enum ZoneError {
    #[error("Unknown zone: {0}")]
    Unknown(String),
}

/// A named region of the glove model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Fingers,
    InnerPalm,
    OuterPalm,
    InnerThumb,
    OuterThumb,
    Strap,
    Wrist,
    WristOutline,
    Outline,
}

impl Zone {
    /// Every zone, in binding order
    pub const ALL: [Zone; 9] = [
        Zone::Fingers,
        Zone::InnerPalm,
        Zone::OuterPalm,
        Zone::InnerThumb,
        Zone::OuterThumb,
        Zone::Strap,
        Zone::Wrist,
        Zone::WristOutline,
        Zone::Outline,
    ];

    /// Zones that accept uploaded image layers
    pub const IMAGE_ZONES: [Zone; 4] = [
        Zone::OuterPalm,
        Zone::OuterThumb,
        Zone::Strap,
        Zone::WristOutline,
    ];

    /// Name of the mesh node carrying this zone's material
    pub fn mesh_name(&self) -> &'static str {
        match self {
            Zone::Fingers => "Fingers",
            Zone::InnerPalm => "Inner Palm",
            Zone::OuterPalm => "Outer Palm",
            Zone::InnerThumb => "Inner Thumb",
            Zone::OuterThumb => "Outer Thumb",
            Zone::Strap => "Strap",
            Zone::Wrist => "Wrist",
            Zone::WristOutline => "Wrist Outline",
            Zone::Outline => "Outline",
        }
    }

    /// snake_case identifier used in URLs and config
    pub fn slug(&self) -> &'static str {
        match self {
            Zone::Fingers => "fingers",
            Zone::InnerPalm => "inner_palm",
            Zone::OuterPalm => "outer_palm",
            Zone::InnerThumb => "inner_thumb",
            Zone::OuterThumb => "outer_thumb",
            Zone::Strap => "strap",
            Zone::Wrist => "wrist",
            Zone::WristOutline => "wrist_outline",
            Zone::Outline => "outline",
        }
    }

    pub fn accepts_images(&self) -> bool {
        Self::IMAGE_ZONES.contains(self)
    }

    /// Factory color applied before any user edit
    pub fn default_color(&self) -> HexColor {
        let hex = match self {
            Zone::Fingers => "#1A1A1A",
            Zone::InnerPalm => "#F5F5F5",
            Zone::OuterPalm => "#1A1A1A",
            Zone::InnerThumb => "#F5F5F5",
            Zone::OuterThumb => "#1A1A1A",
            Zone::Strap => "#C9A227",
            Zone::Wrist => "#1A1A1A",
            Zone::WristOutline => "#C9A227",
            Zone::Outline => "#FFFFFF",
        };
        HexColor::from_rgb_hex_unchecked(hex)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mesh_name())
    }
}

impl FromStr for Zone {
    type Err = ZoneError;

    /// Accepts the mesh name ("Outer Palm") or the slug ("outer_palm", "outer-palm")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        let normalized = wanted.to_ascii_lowercase().replace(['-', ' '], "_");

        Zone::ALL
            .iter()
            .copied()
            .find(|zone| zone.mesh_name() == wanted || zone.slug() == normalized)
            .ok_or_else(|| ZoneError::Unknown(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mesh_name_and_slug() {
        assert_eq!("Outer Palm".parse::<Zone>().unwrap(), Zone::OuterPalm);
        assert_eq!("outer_palm".parse::<Zone>().unwrap(), Zone::OuterPalm);
        assert_eq!("wrist-outline".parse::<Zone>().unwrap(), Zone::WristOutline);
        assert!("Pinky".parse::<Zone>().is_err());
    }

    #[test]
    fn test_image_zones_subset() {
        for zone in Zone::IMAGE_ZONES {
            assert!(Zone::ALL.contains(&zone));
            assert!(zone.accepts_images());
        }
        assert!(!Zone::Fingers.accepts_images());
        assert!(!Zone::Outline.accepts_images());
    }
}
