//! Stylesheet compiler.
//!
//! Turns MapCSS source into an immutable [`Stylesheet`]. Tag keys and
//! values in selectors and `eval()` expressions are interned through the
//! caller's [`Interner`], which must be the one the object store uses.

use tessella_common::{Interner, StringTable};

use crate::stylesheet::Stylesheet;

mod error;
/// MapCSS rule and declaration parser.
pub mod parser;

pub use error::{ParseError, ParseErrorKind, SourcePosition};
pub use parser::StylesheetParser;

/// Compiler switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Reject unknown attributes. When false they are skipped with a warning.
    pub strict_attributes: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            strict_attributes: true,
        }
    }
}

/// Compile `source` with default options and a private interner.
///
/// The result's symbols belong to a table nobody else sees, so use this for
/// validating a stylesheet and [`compile_with`] for evaluating one.
///
/// # Errors
///
/// Returns the first [`ParseError`] in the source.
pub fn compile(source: &str) -> Result<Stylesheet, ParseError> {
    compile_with(source, &CompileOptions::default(), &StringTable::new())
}

/// Compile `source`, interning through `interner`.
///
/// # Errors
///
/// Returns the first [`ParseError`] in the source.
pub fn compile_with(
    source: &str,
    options: &CompileOptions,
    interner: &dyn Interner,
) -> Result<Stylesheet, ParseError> {
    StylesheetParser::new(source, options, interner).parse_stylesheet()
}
