//! Hex color values

use std::fmt;
use std::str::FromStr;

use image::Rgba;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Color parsing errors
#[derive(Debug, Error, PartialEq)]
pub enum ColorError {
    #[error("Color must start with '#', got {0:?}")]
    MissingHash(String),
    #[error("Color must have 3 or 6 hex digits, got {0:?}")]
    InvalidLength(String),
    #[error("Invalid hex digit in color {0:?}")]
    InvalidDigit(String),
}

/// An opaque sRGB color, normalised to `#RRGGBB`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor {
    r: u8,
    g: u8,
    b: u8,
}

impl HexColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        HexColor { r, g, b }
    }

    pub fn parse(input: &str) -> Result<Self, ColorError> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix('#')
            .ok_or_else(|| ColorError::MissingHash(input.to_string()))?;

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorError::InvalidDigit(input.to_string()));
        }

        let channel = |s: &str| {
            u8::from_str_radix(s, 16).map_err(|_| ColorError::InvalidDigit(input.to_string()))
        };

        match digits.len() {
            3 => {
                // #RGB expands each nibble: #F0A -> #FF00AA
                let mut out = [0u8; 3];
                for (i, c) in digits.chars().enumerate() {
                    let doubled: String = [c, c].iter().collect();
                    out[i] = channel(&doubled)?;
                }
                Ok(HexColor::new(out[0], out[1], out[2]))
            }
            6 => Ok(HexColor::new(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            _ => Err(ColorError::InvalidLength(input.to_string())),
        }
    }

    /// For compile-time known palette entries
    pub(crate) fn from_rgb_hex_unchecked(hex: &str) -> Self {
        Self::parse(hex).unwrap_or(HexColor::new(0, 0, 0))
    }

    pub fn to_rgba(&self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, 255])
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for HexColor {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for HexColor {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.to_string()
    }
}
