//! MapCSS tokenizer module.

/// MapCSS token types.
pub mod token;
/// MapCSS tokenizer implementation.
pub mod tokenizer;

pub use token::{MapCSSToken, Span, Token};
pub use tokenizer::MapCSSTokenizer;
