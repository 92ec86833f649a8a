//! MapCSS tokenizer, stylesheet compiler and cascade for the Tessella tile renderer.
//!
//! # Scope
//!
//! This crate implements:
//! - **Tokenizer** ([CSS Syntax § 4](https://www.w3.org/TR/css-syntax-3/#tokenization)
//!   plus the MapCSS comparison and regex tokens)
//! - **Compiler** ([MapCSS 0.2](https://wiki.openstreetmap.org/wiki/MapCSS/0.2))
//!   - Rule blocks with comma-separated selector chains
//!   - Type, zoom, tag and regex conditions, descendant steps
//!   - `canvas {}` block
//!   - Literal values and `eval()` expressions
//! - **Cascade**
//!   - Source order, last match wins, no specificity
//!   - Structural chains styling member nodes and ways
//!
//! # Not Implemented
//!
//! - Pseudo-classes (`:closed`, `:hover`) and layers (`::casing`)
//! - `@import` and other at-rules
//! - Attributes outside the drawing set (dashes, linecap, opacity)

/// Cascade evaluation per [MapCSS 0.2 § Cascading](https://wiki.openstreetmap.org/wiki/MapCSS/0.2#Cascading).
pub mod cascade;
/// Stylesheet compiler.
pub mod compiler;
/// `eval()` expressions per [MapCSS 0.2 eval](https://wiki.openstreetmap.org/wiki/MapCSS/0.2/eval).
pub mod expression;
/// Selector chains per [MapCSS 0.2 § Selectors](https://wiki.openstreetmap.org/wiki/MapCSS/0.2#Selectors).
pub mod selector;
/// Drawing attributes and resolved styles.
pub mod style;
/// Compiled stylesheet representation.
pub mod stylesheet;
/// MapCSS tokenizer.
pub mod tokenizer;

// Re-exports for convenience
pub use cascade::{StyledObject, evaluate, evaluate_all};
pub use compiler::{
    CompileOptions, ParseError, ParseErrorKind, SourcePosition, compile, compile_with,
};
pub use expression::{Expr, Value};
pub use selector::{ObjectType, Selector, SelectorTest, ZoomRange};
pub use style::{
    Attribute, AttributeValue, ColorValue, LengthValue, ResolvedAttributes, TextPosition,
};
pub use stylesheet::{Declaration, DeclarationValue, Rule, Stylesheet};
pub use tokenizer::{MapCSSToken, MapCSSTokenizer};
