use std::str::FromStr;

use tessella_common::Interner;

use super::{BinaryOp, Expr, Function, Value};
use crate::compiler::{ParseError, ParseErrorKind};
use crate::tokenizer::{MapCSSToken, Token};

/// Parse the tokens between `eval(` and its closing `)`.
///
/// Literal `tag()` keys are interned through `interner` so that evaluation
/// compares handles.
///
/// # Errors
///
/// Returns a [`ParseErrorKind::MalformedExpression`] error for unbalanced or
/// unexpected tokens, unknown functions and wrong argument counts.
pub fn parse_expression(
    tokens: &[Token],
    source: &str,
    interner: &dyn Interner,
) -> Result<Expr, ParseError> {
    let end = tokens.last().map_or(0, |t| t.span.end);
    let mut parser = ExpressionParser {
        tokens: tokens
            .iter()
            .filter(|t| t.kind != MapCSSToken::Whitespace && !t.kind.is_eof())
            .collect(),
        position: 0,
        end,
        source,
        interner,
    };
    if parser.tokens.is_empty() {
        return Err(parser.error_at(end, "empty expression"));
    }
    let expr = parser.parse_comparison()?;
    match parser.peek_token() {
        None => Ok(expr),
        Some(token) => Err(parser.error_at(
            token.span.start,
            format!("unexpected {} in expression", token.kind),
        )),
    }
}

/// Recursive descent over the four precedence levels, loosest first:
/// comparisons, `+ -`, `*`, then `/ .`.
struct ExpressionParser<'a> {
    tokens: Vec<&'a Token>,
    position: usize,
    end: usize,
    source: &'a str,
    interner: &'a dyn Interner,
}

impl<'a> ExpressionParser<'a> {
    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_additive()?;
        while let Some(op) = self.peek().and_then(comparison_op) {
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(MapCSSToken::Plus) => BinaryOp::Add,
                Some(MapCSSToken::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_tight()?;
        while self.peek() == Some(&MapCSSToken::Star) {
            self.advance();
            let rhs = self.parse_tight()?;
            lhs = binary(BinaryOp::Mul, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_tight(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(MapCSSToken::Slash) => BinaryOp::Div,
                Some(MapCSSToken::Dot) => BinaryOp::Concat,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.peek() == Some(&MapCSSToken::Minus) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Negate(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let Some(token) = self.next_token() else {
            return Err(self.error_at(self.end, "expression ends early"));
        };
        match &token.kind {
            MapCSSToken::Number(n) => Ok(Expr::Literal(Value::Number(*n))),
            MapCSSToken::String(s) => Ok(Expr::Literal(Value::Text(s.clone()))),
            MapCSSToken::Ident(_)
            | MapCSSToken::Hash(_)
            | MapCSSToken::Percentage(_)
            | MapCSSToken::Dimension { .. } => Ok(Expr::Literal(Value::Text(
                self.source[token.span.start..token.span.end].to_string(),
            ))),
            MapCSSToken::LeftParen => {
                let inner = self.parse_comparison()?;
                self.expect_close(token)?;
                Ok(inner)
            }
            MapCSSToken::Function(name) => self.parse_call(token, name),
            other => Err(self.error_at(
                token.span.start,
                format!("unexpected {other} in expression"),
            )),
        }
    }

    fn parse_call(&mut self, token: &'a Token, name: &str) -> Result<Expr, ParseError> {
        let function = Function::from_str(&name.to_ascii_lowercase())
            .map_err(|_| self.error_at(token.span.start, format!("unknown function '{name}'")))?;

        let mut args = Vec::new();
        if self.peek() == Some(&MapCSSToken::RightParen) {
            self.advance();
        } else {
            loop {
                args.push(self.parse_comparison()?);
                match self.next_token() {
                    Some(t) if t.kind == MapCSSToken::Comma => {}
                    Some(t) if t.kind == MapCSSToken::RightParen => break,
                    Some(t) => {
                        return Err(self.error_at(
                            t.span.start,
                            format!("expected ',' or ')' in {name}(), found {}", t.kind),
                        ));
                    }
                    None => {
                        return Err(self.error_at(self.end, format!("unclosed {name}(")));
                    }
                }
            }
        }

        let (min, max) = function.arity();
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            let expected = match max {
                Some(max) if max == min => min.to_string(),
                Some(max) => format!("{min} to {max}"),
                None => format!("at least {min}"),
            };
            return Err(self.error_at(
                token.span.start,
                format!("{name}() takes {expected} argument(s), got {}", args.len()),
            ));
        }

        if let (Function::Tag, [Expr::Literal(Value::Text(key))]) = (function, args.as_slice()) {
            return Ok(Expr::Tag(self.interner.intern(key)));
        }
        Ok(Expr::Call { function, args })
    }

    fn expect_close(&mut self, open: &Token) -> Result<(), ParseError> {
        match self.next_token() {
            Some(t) if t.kind == MapCSSToken::RightParen => Ok(()),
            Some(t) => Err(self.error_at(t.span.start, format!("expected ')', found {}", t.kind))),
            None => Err(self.error_at(open.span.start, "unclosed '('")),
        }
    }

    fn peek_token(&self) -> Option<&'a Token> {
        self.tokens.get(self.position).copied()
    }

    fn peek(&self) -> Option<&'a MapCSSToken> {
        self.peek_token().map(|t| &t.kind)
    }

    fn next_token(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.position).copied();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> ParseError {
        ParseError::at(ParseErrorKind::MalformedExpression, self.source, offset, message)
    }
}

fn comparison_op(token: &MapCSSToken) -> Option<BinaryOp> {
    match token {
        MapCSSToken::EqEq | MapCSSToken::Equals => Some(BinaryOp::Eq),
        MapCSSToken::NotEquals => Some(BinaryOp::NotEq),
        MapCSSToken::Less => Some(BinaryOp::Less),
        MapCSSToken::LessEq => Some(BinaryOp::LessEq),
        MapCSSToken::Greater => Some(BinaryOp::Greater),
        MapCSSToken::GreaterEq => Some(BinaryOp::GreaterEq),
        MapCSSToken::Ident(name) if name == "eq" => Some(BinaryOp::StrEq),
        MapCSSToken::Ident(name) if name == "ne" => Some(BinaryOp::StrNotEq),
        _ => None,
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
