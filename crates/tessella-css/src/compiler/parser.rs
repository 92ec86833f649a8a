//! MapCSS stylesheet parser.
//!
//! Follows the shape of [CSS Syntax § 5.4](https://www.w3.org/TR/css-syntax-3/#parser-algorithms):
//! consume a list of rules, each a prelude (here a selector list) followed
//! by a `{}` block of declarations. Unlike CSS error recovery, the first
//! error aborts compilation so that a broken stylesheet is never swapped in.

use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;
use tessella_common::Interner;
use tessella_common::warning::warn_once;
use tessella_geo::MAX_ZOOM;

use super::CompileOptions;
use super::error::{ParseError, ParseErrorKind};
use crate::expression::{Expr, parse_expression};
use crate::selector::{
    Comparison, GeometryClass, ObjectType, Selector, SelectorTest, ZoomRange,
};
use crate::style::{
    Attribute, AttributeKind, AttributeValue, ColorValue, LengthValue, TextPosition,
};
use crate::stylesheet::{Declaration, DeclarationValue, Rule, Stylesheet};
use crate::tokenizer::{MapCSSToken, MapCSSTokenizer, Token};

/// Compiles MapCSS source into a [`Stylesheet`].
pub struct StylesheetParser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    position: usize,
    options: &'a CompileOptions,
    interner: &'a dyn Interner,
}

impl<'a> StylesheetParser<'a> {
    /// Tokenize `source` and prepare to parse it.
    #[must_use]
    pub fn new(source: &'a str, options: &'a CompileOptions, interner: &'a dyn Interner) -> Self {
        let mut tokenizer = MapCSSTokenizer::new(source);
        tokenizer.run();
        Self {
            source,
            tokens: tokenizer.into_tokens(),
            position: 0,
            options,
            interner,
        }
    }

    /// Parse the whole input.
    ///
    /// # Errors
    ///
    /// Returns the first [`ParseError`] encountered.
    pub fn parse_stylesheet(mut self) -> Result<Stylesheet, ParseError> {
        let mut stylesheet = Stylesheet::default();
        loop {
            let _ = self.skip_whitespace();
            match self.peek() {
                MapCSSToken::EOF => break,
                MapCSSToken::Ident(name) if name.eq_ignore_ascii_case("canvas") => {
                    self.consume_canvas_block(&mut stylesheet)?;
                }
                _ => self.consume_rule_block(&mut stylesheet.rules)?,
            }
        }
        tracing::debug!(rules = stylesheet.rules.len(), "compiled stylesheet");
        Ok(stylesheet)
    }

    /// `canvas { ... }`
    fn consume_canvas_block(&mut self, stylesheet: &mut Stylesheet) -> Result<(), ParseError> {
        let _ = self.consume();
        let _ = self.skip_whitespace();
        self.expect(&MapCSSToken::LeftBrace, "'{' after canvas")?;
        for declaration in self.consume_declaration_block()? {
            match declaration.value {
                DeclarationValue::Literal(value) => stylesheet.canvas.set(declaration.attribute, value),
                DeclarationValue::TagText(_) => {
                    let _ = warn_once(
                        "stylesheet",
                        &format!("'{}' needs an object and is ignored in canvas", declaration.attribute),
                    );
                }
                DeclarationValue::Eval(_) => {
                    return Err(self.error(
                        ParseErrorKind::MalformedExpression,
                        self.position.saturating_sub(1),
                        "eval() is not allowed in canvas",
                    ));
                }
            }
        }
        Ok(())
    }

    /// A selector list and its declaration block. Each chain in the list
    /// becomes its own rule, in list order.
    fn consume_rule_block(&mut self, rules: &mut Vec<Rule>) -> Result<(), ParseError> {
        let mut selectors = Vec::new();
        loop {
            selectors.push(self.consume_chain()?);
            let _ = self.skip_whitespace();
            match self.peek() {
                MapCSSToken::Comma => {
                    let _ = self.consume();
                }
                MapCSSToken::LeftBrace => {
                    let _ = self.consume();
                    break;
                }
                other => {
                    return Err(self.syntax_error(format!("expected ',' or '{{', found {other}")));
                }
            }
        }
        let declarations: Arc<[Declaration]> = self.consume_declaration_block()?.into();
        rules.extend(selectors.into_iter().map(|selector| Rule {
            selector,
            declarations: Arc::clone(&declarations),
        }));
        Ok(())
    }

    /// Chain items separated by whitespace, up to a `,` or `{`.
    fn consume_chain(&mut self) -> Result<Selector, ParseError> {
        let _ = self.skip_whitespace();
        let mut selector = Selector::new(ObjectType::Any);
        self.consume_chain_item(&mut selector, true)?;
        loop {
            let separated = self.skip_whitespace();
            if matches!(self.peek(), MapCSSToken::Comma | MapCSSToken::LeftBrace) {
                return Ok(selector);
            }
            if !separated {
                return Err(self.syntax_error(format!("unexpected {} in selector", self.peek())));
            }
            self.consume_chain_item(&mut selector, false)?;
        }
    }

    /// `type ( '|z' range )? condition*`
    fn consume_chain_item(&mut self, selector: &mut Selector, first: bool) -> Result<(), ParseError> {
        let object_type = match self.peek() {
            MapCSSToken::Star => Some(ObjectType::Any),
            MapCSSToken::Ident(name) => ObjectType::from_str(&name.to_ascii_lowercase()).ok(),
            _ => None,
        };
        let Some(object_type) = object_type else {
            return Err(self.syntax_error(format!("expected object type, found {}", self.peek())));
        };

        if first {
            selector.object_type = object_type;
        } else {
            match object_type {
                ObjectType::Node => selector.tests.push(SelectorTest::ChildNodes),
                ObjectType::Way => selector.tests.push(SelectorTest::ChildWays),
                ObjectType::Area => selector
                    .tests
                    .extend([SelectorTest::ChildWays, SelectorTest::Geometry(GeometryClass::Area)]),
                ObjectType::Line => selector
                    .tests
                    .extend([SelectorTest::ChildWays, SelectorTest::Geometry(GeometryClass::Line)]),
                ObjectType::Any => selector.tests.push(SelectorTest::Always),
                ObjectType::Relation => {
                    return Err(self.syntax_error("relation cannot be a descendant"));
                }
            }
        }
        let _ = self.consume();

        if *self.peek() == MapCSSToken::Pipe {
            let _ = self.consume();
            selector.zoom = selector.zoom.intersect(self.consume_zoom_range()?);
        }

        while *self.peek() == MapCSSToken::LeftBracket {
            let _ = self.consume();
            let test = self.consume_condition()?;
            selector.tests.push(test);
        }
        Ok(())
    }

    /// `z12`, `z12-15`, `z-15` or `z12-`
    fn consume_zoom_range(&mut self) -> Result<ZoomRange, ParseError> {
        let start = self.position;
        let range = match self.consume() {
            Some(MapCSSToken::Ident(text)) => parse_zoom_range(text),
            _ => None,
        };
        range.ok_or_else(|| {
            self.error(ParseErrorKind::Syntax, start, "expected zoom range such as z12-15")
        })
    }

    /// The inside of `[...]`, after the `[`.
    fn consume_condition(&mut self) -> Result<SelectorTest, ParseError> {
        let _ = self.skip_whitespace();
        if *self.peek() == MapCSSToken::Bang {
            let _ = self.consume();
            let key = self.consume_key()?;
            self.close_condition()?;
            return Ok(SelectorTest::LacksTag(self.interner.intern(&key)));
        }

        let key_text = self.consume_key()?;
        let key = self.interner.intern(&key_text);
        let _ = self.skip_whitespace();
        let operator_index = self.position;
        let test = match self.consume().cloned() {
            Some(MapCSSToken::RightBracket) => return Ok(SelectorTest::HasTag(key)),
            Some(MapCSSToken::Equals | MapCSSToken::EqEq) => {
                let value = self.consume_condition_value()?;
                SelectorTest::TagEquals {
                    key,
                    value: self.interner.intern(&value),
                }
            }
            Some(MapCSSToken::NotEquals) => {
                let value = self.consume_condition_value()?;
                SelectorTest::TagNotEquals {
                    key,
                    value: self.interner.intern(&value),
                }
            }
            Some(MapCSSToken::Match) => {
                let _ = self.skip_whitespace();
                let pattern_index = self.position;
                let pattern = match self.consume().cloned() {
                    Some(MapCSSToken::Regex(p) | MapCSSToken::String(p)) => p,
                    _ => {
                        return Err(self.error(
                            ParseErrorKind::Syntax,
                            pattern_index,
                            "expected /regex/ after =~",
                        ));
                    }
                };
                let pattern = Regex::new(&pattern).map_err(|e| {
                    self.error(ParseErrorKind::Syntax, pattern_index, format!("invalid regex: {e}"))
                })?;
                SelectorTest::TagMatches { key, pattern }
            }
            Some(token @ (MapCSSToken::Less
            | MapCSSToken::LessEq
            | MapCSSToken::Greater
            | MapCSSToken::GreaterEq)) => {
                let op = match token {
                    MapCSSToken::Less => Comparison::Less,
                    MapCSSToken::LessEq => Comparison::LessEq,
                    MapCSSToken::Greater => Comparison::Greater,
                    _ => Comparison::GreaterEq,
                };
                let value = self.consume_condition_value()?;
                let number = value.trim().parse().ok();
                SelectorTest::TagCompare {
                    key,
                    op,
                    value,
                    number,
                }
            }
            other => {
                let found = other.unwrap_or(MapCSSToken::EOF);
                return Err(self.error(
                    ParseErrorKind::Syntax,
                    operator_index,
                    format!("expected operator or ']' after '{key_text}', found {found}"),
                ));
            }
        };
        self.close_condition()?;
        Ok(test)
    }

    /// A tag key: a quoted string, or the raw text of adjacent tokens such
    /// as `addr:street`.
    fn consume_key(&mut self) -> Result<String, ParseError> {
        let _ = self.skip_whitespace();
        if let MapCSSToken::String(key) = self.peek() {
            let key = key.clone();
            let _ = self.consume();
            return Ok(key);
        }
        let start = self.position;
        while !matches!(
            self.peek(),
            MapCSSToken::RightBracket
                | MapCSSToken::Equals
                | MapCSSToken::EqEq
                | MapCSSToken::NotEquals
                | MapCSSToken::Match
                | MapCSSToken::Less
                | MapCSSToken::LessEq
                | MapCSSToken::Greater
                | MapCSSToken::GreaterEq
                | MapCSSToken::Whitespace
                | MapCSSToken::EOF
        ) {
            let _ = self.consume();
        }
        let key = self.raw_text(start, self.position);
        if key.is_empty() {
            return Err(self.syntax_error(format!("expected tag key, found {}", self.peek())));
        }
        Ok(key.to_string())
    }

    /// A quoted string, or the raw text up to `]`.
    fn consume_condition_value(&mut self) -> Result<String, ParseError> {
        let _ = self.skip_whitespace();
        if let MapCSSToken::String(value) = self.peek() {
            let value = value.clone();
            let _ = self.consume();
            return Ok(value);
        }
        let start = self.position;
        while !matches!(self.peek(), MapCSSToken::RightBracket | MapCSSToken::EOF) {
            let _ = self.consume();
        }
        let value = self.raw_text(start, self.position).trim();
        if value.is_empty() {
            return Err(self.syntax_error("expected value in condition"));
        }
        Ok(value.to_string())
    }

    fn close_condition(&mut self) -> Result<(), ParseError> {
        let _ = self.skip_whitespace();
        self.expect(&MapCSSToken::RightBracket, "']'")
    }

    /// [§ 5.4.5 Consume a list of declarations](https://www.w3.org/TR/css-syntax-3/#consume-list-of-declarations),
    /// after the `{`, through the matching `}`.
    fn consume_declaration_block(&mut self) -> Result<Vec<Declaration>, ParseError> {
        let mut declarations = Vec::new();
        loop {
            let _ = self.skip_whitespace();
            match self.peek() {
                MapCSSToken::RightBrace => {
                    let _ = self.consume();
                    return Ok(declarations);
                }
                MapCSSToken::Semicolon => {
                    let _ = self.consume();
                }
                MapCSSToken::EOF => return Err(self.syntax_error("unclosed '{' block")),
                MapCSSToken::Ident(_) => {
                    if let Some(declaration) = self.consume_declaration()? {
                        declarations.push(declaration);
                    }
                }
                other => {
                    return Err(self.syntax_error(format!("expected attribute name, found {other}")));
                }
            }
        }
    }

    /// [§ 5.4.6 Consume a declaration](https://www.w3.org/TR/css-syntax-3/#consume-declaration)
    ///
    /// Returns `None` for an unknown attribute in lenient mode.
    fn consume_declaration(&mut self) -> Result<Option<Declaration>, ParseError> {
        let name_index = self.position;
        let name = match self.consume().cloned() {
            Some(MapCSSToken::Ident(name)) => name.to_ascii_lowercase(),
            _ => return Err(self.syntax_error("expected attribute name")),
        };
        let _ = self.skip_whitespace();
        self.expect(&MapCSSToken::Colon, "':' after attribute name")?;
        let _ = self.skip_whitespace();

        let value_start = self.position;
        let mut depth = 0usize;
        loop {
            match self.peek() {
                MapCSSToken::EOF => break,
                MapCSSToken::Semicolon | MapCSSToken::RightBrace if depth == 0 => break,
                MapCSSToken::LeftParen | MapCSSToken::Function(_) => depth += 1,
                MapCSSToken::RightParen => depth = depth.saturating_sub(1),
                _ => {}
            }
            let _ = self.consume();
        }
        let mut value_end = self.position;
        while value_end > value_start && self.tokens[value_end - 1].kind == MapCSSToken::Whitespace {
            value_end -= 1;
        }

        let Ok(attribute) = Attribute::from_str(&name) else {
            if self.options.strict_attributes {
                return Err(self.error(
                    ParseErrorKind::UnknownAttribute,
                    name_index,
                    format!("unknown attribute '{name}'"),
                ));
            }
            let _ = warn_once("stylesheet", &format!("unknown attribute '{name}' ignored"));
            return Ok(None);
        };

        let value = self.compile_value(attribute, value_start, value_end)?;
        Ok(Some(Declaration { attribute, value }))
    }

    /// Compile the tokens `value_start..value_end` as a value for `attribute`.
    fn compile_value(
        &self,
        attribute: Attribute,
        value_start: usize,
        value_end: usize,
    ) -> Result<DeclarationValue, ParseError> {
        let tokens = &self.tokens[value_start..value_end];
        let Some(first) = tokens.first() else {
            return Err(self.error(
                ParseErrorKind::Syntax,
                value_start,
                format!("missing value for '{attribute}'"),
            ));
        };

        if matches!(&first.kind, MapCSSToken::Function(name) if name.eq_ignore_ascii_case("eval")) {
            return self.compile_eval(tokens, value_start).map(DeclarationValue::Eval);
        }

        let invalid = |what: &str| {
            self.error(
                ParseErrorKind::Syntax,
                value_start,
                format!("invalid {what} '{}' for '{attribute}'", self.raw_text(value_start, value_end)),
            )
        };
        let single = if tokens.len() == 1 { Some(&first.kind) } else { None };

        let value = match attribute.kind() {
            AttributeKind::Color => {
                let color = match &first.kind {
                    MapCSSToken::Function(name)
                        if name.eq_ignore_ascii_case("rgb") || name.eq_ignore_ascii_case("rgba") =>
                    {
                        color_function(tokens)
                    }
                    _ => match single {
                        Some(MapCSSToken::Hash(hex)) => ColorValue::from_hex(hex),
                        Some(MapCSSToken::Ident(name) | MapCSSToken::String(name)) => ColorValue::parse(name),
                        _ => None,
                    },
                };
                AttributeValue::Color(color.ok_or_else(|| invalid("color"))?)
            }
            AttributeKind::Length => match single {
                Some(MapCSSToken::Number(n)) => AttributeValue::Length(LengthValue::Px(*n)),
                Some(MapCSSToken::Percentage(n)) => AttributeValue::Length(LengthValue::Percent(*n)),
                Some(MapCSSToken::Dimension { value, unit }) => {
                    let length = LengthValue::with_unit(*value, unit).ok_or_else(|| {
                        self.error(
                            ParseErrorKind::UnknownUnit,
                            value_start,
                            format!("unknown unit '{unit}' for '{attribute}', expected px, pt or %"),
                        )
                    })?;
                    AttributeValue::Length(length)
                }
                _ => return Err(invalid("length")),
            },
            AttributeKind::Number => match single {
                Some(MapCSSToken::Number(n)) => AttributeValue::Number(*n),
                _ => return Err(invalid("number")),
            },
            AttributeKind::TextPosition => match single {
                Some(MapCSSToken::Ident(name)) => AttributeValue::TextPosition(
                    TextPosition::from_str(&name.to_ascii_lowercase())
                        .map_err(|_| invalid("text position"))?,
                ),
                _ => return Err(invalid("text position")),
            },
            AttributeKind::TagKey => {
                let key = match single {
                    Some(MapCSSToken::String(key)) => key.as_str(),
                    _ => self.raw_text(value_start, value_end),
                };
                return Ok(DeclarationValue::TagText(self.interner.intern(key)));
            }
            AttributeKind::Path => match single {
                Some(MapCSSToken::String(path)) => AttributeValue::Text(path.clone()),
                _ => AttributeValue::Text(self.raw_text(value_start, value_end).to_string()),
            },
        };
        Ok(DeclarationValue::Literal(value))
    }

    /// `eval( expr )`, which must span the whole value.
    fn compile_eval(&self, tokens: &[Token], value_start: usize) -> Result<Expr, ParseError> {
        let mut depth = 0usize;
        let mut close = None;
        for (i, token) in tokens.iter().enumerate() {
            match token.kind {
                MapCSSToken::LeftParen | MapCSSToken::Function(_) => depth += 1,
                MapCSSToken::RightParen => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        close = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(close) = close else {
            return Err(self.error(ParseErrorKind::MalformedExpression, value_start, "unclosed eval("));
        };
        if let Some(extra) = tokens[close + 1..].first() {
            return Err(ParseError::at(
                ParseErrorKind::MalformedExpression,
                self.source,
                extra.span.start,
                format!("unexpected {} after eval()", extra.kind),
            ));
        }
        parse_expression(&tokens[1..close], self.source, self.interner)
    }

    /// Skip whitespace tokens, returning true if any were skipped.
    fn skip_whitespace(&mut self) -> bool {
        let start = self.position;
        while *self.peek() == MapCSSToken::Whitespace {
            let _ = self.consume();
        }
        self.position > start
    }

    fn expect(&mut self, token: &MapCSSToken, what: &str) -> Result<(), ParseError> {
        if self.peek() == token {
            let _ = self.consume();
            Ok(())
        } else {
            Err(self.syntax_error(format!("expected {what}, found {}", self.peek())))
        }
    }

    fn consume(&mut self) -> Option<&MapCSSToken> {
        let token = self.tokens.get(self.position)?;
        if !token.kind.is_eof() {
            self.position += 1;
        }
        Some(&token.kind)
    }

    fn peek(&self) -> &MapCSSToken {
        self.tokens
            .get(self.position)
            .map_or(&MapCSSToken::EOF, |t| &t.kind)
    }

    /// Source text covered by tokens `start..end`.
    fn raw_text(&self, start: usize, end: usize) -> &'a str {
        if end <= start {
            return "";
        }
        match (self.tokens.get(start), self.tokens.get(end - 1)) {
            (Some(first), Some(last)) => self.source.get(first.span.start..last.span.end).unwrap_or(""),
            _ => "",
        }
    }

    /// Byte offset of token `index`.
    fn offset_of(&self, index: usize) -> usize {
        self.tokens
            .get(index)
            .or_else(|| self.tokens.last())
            .map_or(0, |t| t.span.start)
    }

    fn error(&self, kind: ParseErrorKind, index: usize, message: impl Into<String>) -> ParseError {
        ParseError::at(kind, self.source, self.offset_of(index), message)
    }

    fn syntax_error(&self, message: impl Into<String>) -> ParseError {
        self.error(ParseErrorKind::Syntax, self.position, message)
    }
}

/// `z12` → 12..=12, `z12-15`, `z-15` → 0..=15, `z12-` → 12..=18.
fn parse_zoom_range(text: &str) -> Option<ZoomRange> {
    let range = text.strip_prefix('z').or_else(|| text.strip_prefix('Z'))?;
    let bound = |s: &str, default: u8| -> Option<u8> {
        if s.is_empty() { Some(default) } else { s.parse().ok() }
    };
    let (bottom, top) = match range.split_once('-') {
        Some((bottom, top)) => (bound(bottom, 0)?, bound(top, MAX_ZOOM)?),
        None => {
            let level = range.parse().ok()?;
            (level, level)
        }
    };
    Some(ZoomRange {
        bottom,
        top: top.min(MAX_ZOOM),
    })
}

/// `rgb(r, g, b)` or `rgba(r, g, b, a)`: the whole token run including the
/// closing parenthesis.
fn color_function(tokens: &[Token]) -> Option<ColorValue> {
    if tokens.last()?.kind != MapCSSToken::RightParen {
        return None;
    }
    let mut channels = Vec::new();
    let mut expect_number = true;
    for token in &tokens[1..tokens.len() - 1] {
        match (&token.kind, expect_number) {
            (MapCSSToken::Whitespace, _) => {}
            (MapCSSToken::Number(n), true) => {
                channels.push(*n);
                expect_number = false;
            }
            (MapCSSToken::Percentage(p), true) => {
                channels.push(p * 2.55);
                expect_number = false;
            }
            (MapCSSToken::Comma, false) => expect_number = true,
            _ => return None,
        }
    }
    if expect_number {
        return None;
    }
    ColorValue::from_components(&channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_ranges() {
        assert_eq!(parse_zoom_range("z12"), Some(ZoomRange { bottom: 12, top: 12 }));
        assert_eq!(parse_zoom_range("z12-15"), Some(ZoomRange { bottom: 12, top: 15 }));
        assert_eq!(parse_zoom_range("z-15"), Some(ZoomRange { bottom: 0, top: 15 }));
        assert_eq!(parse_zoom_range("z12-"), Some(ZoomRange { bottom: 12, top: 18 }));
        assert_eq!(parse_zoom_range("zoom"), None);
        assert_eq!(parse_zoom_range("12"), None);
    }
}
