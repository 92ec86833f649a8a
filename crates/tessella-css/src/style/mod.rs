//! Drawing attributes and resolved styles.
//!
//! [MapCSS 0.2 rendering properties](https://wiki.openstreetmap.org/wiki/MapCSS/0.2#Vocabulary)
//! restricted to the closed set the renderer draws.

use std::collections::BTreeMap;

use serde::Serialize;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Typed attribute values.
pub mod values;

pub use values::{ColorValue, LengthValue};

/// A drawing attribute a declaration may set.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Attribute {
    /// Fill of an area, or the map background inside `canvas`.
    FillColor,
    /// Drawing order; higher is drawn later.
    ZIndex,
    /// Stroke width of a line.
    Width,
    /// Stroke color of a line.
    Color,
    /// Width of the outline drawn around a line.
    CasingWidth,
    /// Color of the outline drawn around a line.
    CasingColor,
    /// Label size.
    FontSize,
    /// Label color.
    TextColor,
    /// Label placement: along the line or at the center.
    TextPosition,
    /// Label content. Literal values name the tag whose value is shown.
    Text,
    /// Path of the icon drawn on a node or area.
    #[strum(to_string = "icon-path", serialize = "icon-image")]
    IconPath,
    /// Icon width.
    IconWidth,
    /// Icon height.
    IconHeight,
}

/// The value domain of an [`Attribute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// A [`ColorValue`].
    Color,
    /// A [`LengthValue`].
    Length,
    /// A plain number.
    Number,
    /// A [`TextPosition`] keyword.
    TextPosition,
    /// A tag key, shown as the tag's value.
    TagKey,
    /// A file path.
    Path,
}

impl Attribute {
    /// The kind of value this attribute accepts.
    #[must_use]
    pub const fn kind(self) -> AttributeKind {
        match self {
            Self::FillColor | Self::Color | Self::CasingColor | Self::TextColor => {
                AttributeKind::Color
            }
            Self::Width | Self::CasingWidth | Self::FontSize | Self::IconWidth | Self::IconHeight => {
                AttributeKind::Length
            }
            Self::ZIndex => AttributeKind::Number,
            Self::TextPosition => AttributeKind::TextPosition,
            Self::Text => AttributeKind::TagKey,
            Self::IconPath => AttributeKind::Path,
        }
    }
}

/// Where a label is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TextPosition {
    /// Along the way.
    Line,
    /// At the center of the object.
    Center,
}

/// A resolved value for one attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A color.
    Color(ColorValue),
    /// A width or size.
    Length(LengthValue),
    /// A plain number.
    Number(f64),
    /// Label placement.
    TextPosition(TextPosition),
    /// Label text or icon path.
    Text(String),
}

impl AttributeValue {
    /// The color, if this is one.
    #[must_use]
    pub const fn as_color(&self) -> Option<ColorValue> {
        match self {
            Self::Color(c) => Some(*c),
            _ => None,
        }
    }

    /// The length, if this is one.
    #[must_use]
    pub const fn as_length(&self) -> Option<LengthValue> {
        match self {
            Self::Length(l) => Some(*l),
            _ => None,
        }
    }

    /// The number, if this is one.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The text, if this is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// Final attribute values for one object at one zoom level.
///
/// Attributes no matching rule set are absent; the drawing backend decides
/// the default.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResolvedAttributes {
    values: BTreeMap<Attribute, AttributeValue>,
}

impl ResolvedAttributes {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `attribute`, if set.
    #[must_use]
    pub fn get(&self, attribute: Attribute) -> Option<&AttributeValue> {
        self.values.get(&attribute)
    }

    /// Set `attribute`, overwriting any earlier value.
    pub fn set(&mut self, attribute: Attribute, value: AttributeValue) {
        let _ = self.values.insert(attribute, value);
    }

    /// Copy every attribute of `other` over this set.
    pub fn merge(&mut self, other: &Self) {
        self.values
            .extend(other.values.iter().map(|(k, v)| (*k, v.clone())));
    }

    /// Number of attributes set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no attribute is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Attributes in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (Attribute, &AttributeValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    /// The `z-index`, defaulting to zero.
    #[must_use]
    pub fn z_index(&self) -> f64 {
        self.get(Attribute::ZIndex)
            .and_then(AttributeValue::as_number)
            .unwrap_or(0.0)
    }
}
