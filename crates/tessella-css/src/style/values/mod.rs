//! Typed attribute values.

/// Colors.
pub mod color;
/// Lengths.
pub mod length;

pub use color::ColorValue;
pub use length::LengthValue;
