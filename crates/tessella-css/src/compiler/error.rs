//! Stylesheet compile errors.

use core::fmt;

use strum_macros::Display;

/// What went wrong while compiling a stylesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ParseErrorKind {
    /// Malformed rule, selector or declaration structure.
    Syntax,
    /// A declaration names an attribute outside the supported set.
    UnknownAttribute,
    /// A length carries a unit other than `px`, `pt` or `%`.
    UnknownUnit,
    /// An `eval()` expression is malformed or calls an unknown function.
    MalformedExpression,
}

/// A location in stylesheet source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePosition {
    /// 1-based line.
    pub line: usize,
    /// 1-based column, in characters.
    pub column: usize,
    /// Byte offset from the start of the source.
    pub offset: usize,
}

impl SourcePosition {
    /// Compute line and column of a byte offset in `source`.
    #[must_use]
    pub fn locate(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = source.get(..offset).unwrap_or(source);
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        Self {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A stylesheet that failed to compile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error at {position}: {message}")]
pub struct ParseError {
    /// Error category.
    pub kind: ParseErrorKind,
    /// Where in the source the error was detected.
    pub position: SourcePosition,
    /// Human-readable description.
    pub message: String,
}

impl ParseError {
    /// Build an error at byte `offset` of `source`.
    #[must_use]
    pub fn at(kind: ParseErrorKind, source: &str, offset: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            position: SourcePosition::locate(source, offset),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate() {
        let source = "way {\n  width: 2;\n}";
        assert_eq!(
            SourcePosition::locate(source, 8),
            SourcePosition {
                line: 2,
                column: 3,
                offset: 8
            }
        );
        assert_eq!(SourcePosition::locate(source, 0).to_string(), "1:1");
    }
}
