//! Length values
//!
//! Widths and sizes accept `px` (the default for a bare number), `pt` and `%`.

use serde::Serialize;

/// Screen points per pixel at 96 dpi.
const PX_PER_PT: f64 = 96.0 / 72.0;

/// A width or size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "unit", content = "value", rename_all = "lowercase")]
pub enum LengthValue {
    /// Pixels. A bare number is read as pixels.
    Px(f64),
    /// Typographic points, 1pt = 4/3 px.
    Pt(f64),
    /// Percentage of a reference size chosen by the drawing backend.
    Percent(f64),
}

impl LengthValue {
    /// Build a length from a number and an optional unit, or `None` for an
    /// unknown unit.
    #[must_use]
    pub fn with_unit(value: f64, unit: &str) -> Option<Self> {
        match unit.to_ascii_lowercase().as_str() {
            "" | "px" => Some(Self::Px(value)),
            "pt" => Some(Self::Pt(value)),
            "%" => Some(Self::Percent(value)),
            _ => None,
        }
    }

    /// Parse `2`, `2.5px`, `8pt` or `50%`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let split = text
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
            .unwrap_or(text.len());
        let (number, unit) = text.split_at(split);
        Self::with_unit(number.parse().ok()?, unit.trim())
    }

    /// Size in pixels; percentages resolve against `reference` pixels.
    #[must_use]
    pub fn to_px(&self, reference: f64) -> f64 {
        match self {
            Self::Px(v) => *v,
            Self::Pt(v) => v * PX_PER_PT,
            Self::Percent(v) => reference * v / 100.0,
        }
    }
}
