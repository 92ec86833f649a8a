//! Color values and parsing
//!
//! [MapCSS 0.2 colours](https://wiki.openstreetmap.org/wiki/MapCSS/0.2#Colours):
//! hex notation, `rgb()`/`rgba()` and the CSS named colours.

use serde::{Serialize, Serializer};

/// sRGB color represented as RGBA components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorValue {
    /// Red channel (0-255)
    pub r: u8,
    /// Green channel (0-255)
    pub g: u8,
    /// Blue channel (0-255)
    pub b: u8,
    /// Alpha channel (0-255, 255 = fully opaque)
    pub a: u8,
}

impl ColorValue {
    /// Black (#000000)
    pub const BLACK: Self = Self::rgb(0, 0, 0);

    /// White (#ffffff)
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// Opaque color from three channels.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`; the `#` is optional.
    ///
    /// Short forms replicate digits: `#f80` is `#ff8800`.
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize, width: usize| {
            let digits = &hex[i * width..(i + 1) * width];
            let value = u8::from_str_radix(digits, 16).ok()?;
            Some(if width == 1 { value * 17 } else { value })
        };
        match hex.len() {
            3 => Some(Self::rgb(channel(0, 1)?, channel(1, 1)?, channel(2, 1)?)),
            4 => Some(Self {
                r: channel(0, 1)?,
                g: channel(1, 1)?,
                b: channel(2, 1)?,
                a: channel(3, 1)?,
            }),
            6 => Some(Self::rgb(channel(0, 2)?, channel(1, 2)?, channel(2, 2)?)),
            8 => Some(Self {
                r: channel(0, 2)?,
                g: channel(1, 2)?,
                b: channel(2, 2)?,
                a: channel(3, 2)?,
            }),
            _ => None,
        }
    }

    /// Build from `rgb()`/`rgba()` arguments.
    ///
    /// Channels are 0-255; a channel written as a fraction with a decimal
    /// point below or equal to 1.0 is scaled (`rgb(1.0, 0.5, 0)`). Alpha is
    /// 0.0-1.0.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_components(channels: &[f64]) -> Option<Self> {
        let to_byte = |v: f64, fractional: bool| {
            let scaled = if fractional { v * 255.0 } else { v };
            scaled.round().clamp(0.0, 255.0) as u8
        };
        let (rgb, alpha) = match channels {
            [r, g, b] => ([*r, *g, *b], 1.0),
            [r, g, b, a] => ([*r, *g, *b], *a),
            _ => return None,
        };
        let fractional = rgb.iter().all(|v| *v <= 1.0) && rgb.iter().any(|v| v.fract() != 0.0);
        Some(Self {
            r: to_byte(rgb[0], fractional),
            g: to_byte(rgb[1], fractional),
            b: to_byte(rgb[2], fractional),
            a: to_byte(alpha, true),
        })
    }

    /// Parse any textual form: hex with `#`, or a named color.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.starts_with('#') {
            Self::from_hex(text)
        } else {
            Self::from_named(text)
        }
    }

    /// [CSS Color § 6.1 Named Colors](https://www.w3.org/TR/css-color-4/#named-colors)
    ///
    /// The subset of named colours commonly used in map styles.
    #[must_use]
    pub fn from_named(name: &str) -> Option<Self> {
        let color = match name.to_ascii_lowercase().as_str() {
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "red" => Self::rgb(255, 0, 0),
            "green" => Self::rgb(0, 128, 0),
            "blue" => Self::rgb(0, 0, 255),
            "yellow" => Self::rgb(255, 255, 0),
            "gray" | "grey" => Self::rgb(128, 128, 128),
            "silver" => Self::rgb(192, 192, 192),
            "lightgray" | "lightgrey" => Self::rgb(211, 211, 211),
            "darkgray" | "darkgrey" => Self::rgb(169, 169, 169),
            "maroon" => Self::rgb(128, 0, 0),
            "purple" => Self::rgb(128, 0, 128),
            "fuchsia" | "magenta" => Self::rgb(255, 0, 255),
            "lime" => Self::rgb(0, 255, 0),
            "olive" => Self::rgb(128, 128, 0),
            "navy" => Self::rgb(0, 0, 128),
            "teal" => Self::rgb(0, 128, 128),
            "aqua" | "cyan" => Self::rgb(0, 255, 255),
            "orange" => Self::rgb(255, 165, 0),
            "brown" => Self::rgb(165, 42, 42),
            "pink" => Self::rgb(255, 192, 203),
            "tan" => Self::rgb(210, 180, 140),
            "beige" => Self::rgb(245, 245, 220),
            "khaki" => Self::rgb(240, 230, 140),
            "salmon" => Self::rgb(250, 128, 114),
            "gold" => Self::rgb(255, 215, 0),
            "lightblue" => Self::rgb(173, 216, 230),
            "lightgreen" => Self::rgb(144, 238, 144),
            "darkgreen" => Self::rgb(0, 100, 0),
            "forestgreen" => Self::rgb(34, 139, 34),
            "steelblue" => Self::rgb(70, 130, 180),
            "transparent" => Self { r: 0, g: 0, b: 0, a: 0 },
            _ => return None,
        };
        Some(color)
    }

    /// Deterministic color derived from arbitrary text, for `colgen()`.
    ///
    /// Equal input always yields the same opaque color.
    #[must_use]
    pub fn generate(seed: &str) -> Self {
        // FNV-1a
        let mut hash: u32 = 0x811c_9dc5;
        for byte in seed.bytes() {
            hash ^= u32::from(byte);
            hash = hash.wrapping_mul(0x0100_0193);
        }
        let [r, g, b, _] = hash.to_le_bytes();
        Self::rgb(r, g, b)
    }

    /// `#rrggbb`, or `#rrggbbaa` when not fully opaque.
    #[must_use]
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl Serialize for ColorValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}
