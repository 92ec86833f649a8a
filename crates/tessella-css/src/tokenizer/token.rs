//! MapCSS token types.
//!
//! The token set follows [CSS Syntax § 4](https://www.w3.org/TR/css-syntax-3/#tokenization)
//! where MapCSS reuses it, and adds the comparison operators that
//! [MapCSS 0.2 conditions](https://wiki.openstreetmap.org/wiki/MapCSS/0.2#Conditions)
//! and `eval()` expressions need.

use core::fmt;

/// Byte range of a token in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

/// A MapCSS token.
#[derive(Debug, Clone, PartialEq)]
pub enum MapCSSToken {
    /// An identifier: a letter or `_`, then letters, digits, `_` and `-`.
    ///
    /// Zoom selectors tokenize as identifiers too: `|z12-15` is a `Pipe`
    /// followed by `Ident("z12-15")`.
    Ident(String),

    /// An identifier immediately followed by `(`, as in `eval(` or `rgb(`.
    Function(String),

    /// `#` followed by alphanumerics, as in `#ff8800`.
    Hash(String),

    /// A single- or double-quoted string, without the quotes.
    String(String),

    /// A regular expression literal `/.../`, only produced right after `=~`.
    Regex(String),

    /// A number without unit.
    Number(f64),

    /// A number immediately followed by `%`.
    Percentage(f64),

    /// A number immediately followed by a unit identifier, as in `2px`.
    Dimension {
        /// The numeric part.
        value: f64,
        /// The unit, as written.
        unit: String,
    },

    /// `=`
    Equals,
    /// `==`
    EqEq,
    /// `!=`
    NotEquals,
    /// `=~`
    Match,
    /// `<`
    Less,
    /// `<=`
    LessEq,
    /// `>`
    Greater,
    /// `>=`
    GreaterEq,
    /// `!`
    Bang,
    /// `+`
    Plus,
    /// `-` when it does not start a number
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `.`
    Dot,
    /// `|`
    Pipe,
    /// `:`
    Colon,
    /// `;`
    Semicolon,
    /// `,`
    Comma,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// A run of whitespace. Significant between selector chain items.
    Whitespace,
    /// Any other character.
    Delim(char),
    /// End of input.
    EOF,
}

impl MapCSSToken {
    /// Returns true if this is the end-of-input token.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::EOF)
    }

    /// Returns true for tokens after which a `-` reads as subtraction.
    pub(crate) const fn ends_operand(&self) -> bool {
        matches!(
            self,
            Self::Ident(_)
                | Self::String(_)
                | Self::Number(_)
                | Self::Percentage(_)
                | Self::Dimension { .. }
                | Self::RightParen
        )
    }
}

impl fmt::Display for MapCSSToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(s) => write!(f, "identifier '{s}'"),
            Self::Function(s) => write!(f, "function '{s}('"),
            Self::Hash(s) => write!(f, "'#{s}'"),
            Self::String(s) => write!(f, "string \"{s}\""),
            Self::Regex(s) => write!(f, "regex /{s}/"),
            Self::Number(n) => write!(f, "number {n}"),
            Self::Percentage(n) => write!(f, "'{n}%'"),
            Self::Dimension { value, unit } => write!(f, "'{value}{unit}'"),
            Self::Equals => f.write_str("'='"),
            Self::EqEq => f.write_str("'=='"),
            Self::NotEquals => f.write_str("'!='"),
            Self::Match => f.write_str("'=~'"),
            Self::Less => f.write_str("'<'"),
            Self::LessEq => f.write_str("'<='"),
            Self::Greater => f.write_str("'>'"),
            Self::GreaterEq => f.write_str("'>='"),
            Self::Bang => f.write_str("'!'"),
            Self::Plus => f.write_str("'+'"),
            Self::Minus => f.write_str("'-'"),
            Self::Star => f.write_str("'*'"),
            Self::Slash => f.write_str("'/'"),
            Self::Dot => f.write_str("'.'"),
            Self::Pipe => f.write_str("'|'"),
            Self::Colon => f.write_str("':'"),
            Self::Semicolon => f.write_str("';'"),
            Self::Comma => f.write_str("','"),
            Self::LeftBracket => f.write_str("'['"),
            Self::RightBracket => f.write_str("']'"),
            Self::LeftParen => f.write_str("'('"),
            Self::RightParen => f.write_str("')'"),
            Self::LeftBrace => f.write_str("'{'"),
            Self::RightBrace => f.write_str("'}'"),
            Self::Whitespace => f.write_str("whitespace"),
            Self::Delim(c) => write!(f, "'{c}'"),
            Self::EOF => f.write_str("end of input"),
        }
    }
}

/// A token together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What was read.
    pub kind: MapCSSToken,
    /// Where it was read.
    pub span: Span,
}
