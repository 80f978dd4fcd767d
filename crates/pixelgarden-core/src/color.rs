//! Canonical pixel color representation.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest value a packed 24-bit RGB color can hold.
pub const MAX_PACKED: u32 = 0x00ff_ffff;

/// Errors produced when parsing a color string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorParseError {
    #[error("Color must start with '#': {0}")]
    MissingHash(String),
    #[error("Color must have 6 hex digits: {0}")]
    BadLength(String),
    #[error("Invalid hex digits in color: {0}")]
    BadDigits(String),
}

/// A packed 24-bit RGB color.
///
/// Equality is exact on the packed value, so comparing a stored pixel with
/// the active brush color is a single integer compare. On the wire the
/// color is a lower-case `#rrggbb` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color(u32);

impl Color {
    pub const BLACK: Color = Color(0x000000);
    pub const WHITE: Color = Color(0xffffff);

    /// Build a color from a packed `0xRRGGBB` value. Bits above 24 are dropped.
    pub const fn from_packed(value: u32) -> Self {
        Self(value & MAX_PACKED)
    }

    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    pub const fn packed(self) -> u32 {
        self.0
    }

    pub const fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn b(self) -> u8 {
        self.0 as u8
    }

    /// Opaque RGBA bytes for image export.
    pub const fn to_rgba(self) -> [u8; 4] {
        [self.r(), self.g(), self.b(), 255]
    }

    /// Format as `#rrggbb`.
    pub fn to_hex(self) -> String {
        format!("#{:06x}", self.0)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('#')
            .ok_or_else(|| ColorParseError::MissingHash(s.to_string()))?;
        if digits.len() != 6 {
            return Err(ColorParseError::BadLength(s.to_string()));
        }
        // from_str_radix alone would accept a leading '+'
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ColorParseError::BadDigits(s.to_string()));
        }
        let value = u32::from_str_radix(digits, 16)
            .map_err(|_| ColorParseError::BadDigits(s.to_string()))?;
        Ok(Self(value))
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
