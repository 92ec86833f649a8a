use super::token::{MapCSSToken, Span, Token};

/// MapCSS tokenizer.
///
/// Works like the [CSS Syntax § 4.3](https://www.w3.org/TR/css-syntax-3/#tokenizer-algorithms)
/// tokenizer: consume a code point, dispatch on it, reconsume when a
/// longer token starts. Identifiers additionally stop at `:` so that
/// `width:2` splits into a property and a value.
pub struct MapCSSTokenizer {
    /// The input as `(byte offset, char)` pairs
    input: Vec<(usize, char)>,
    /// Byte length of the input
    input_len: usize,
    /// Current position in `input`
    position: usize,
    /// Collected tokens
    tokens: Vec<Token>,
}

impl MapCSSTokenizer {
    /// Create a new tokenizer over `input`.
    #[must_use]
    pub fn new(input: &str) -> Self {
        Self {
            input: input.char_indices().collect(),
            input_len: input.len(),
            position: 0,
            tokens: Vec::new(),
        }
    }

    /// Consume tokens until end of input. The last token is always
    /// [`MapCSSToken::EOF`].
    pub fn run(&mut self) {
        loop {
            self.consume_comments_and_whitespace();
            let start = self.offset();
            // A regex literal may only follow `=~`.
            let kind = if self.follows_match() && self.peek() == Some('/') {
                let _ = self.consume();
                self.consume_regex_token()
            } else {
                self.consume_token()
            };
            let is_eof = kind.is_eof();
            self.tokens.push(Token {
                kind,
                span: Span {
                    start,
                    end: self.offset(),
                },
            });
            if is_eof {
                break;
            }
        }
    }

    /// Return the collected tokens.
    #[must_use]
    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    /// Return a reference to the collected tokens.
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Comments are dropped. Whitespace on either side of a comment collapses
    /// into one [`MapCSSToken::Whitespace`] token.
    fn consume_comments_and_whitespace(&mut self) {
        let start = self.offset();
        let mut saw_whitespace = false;
        loop {
            if self.peek().is_some_and(is_whitespace) {
                saw_whitespace = true;
                self.consume_whitespace();
            } else if self.peek() == Some('/') && self.peek_at(1) == Some('*') {
                let _ = self.consume(); // /
                let _ = self.consume(); // *
                loop {
                    match self.consume() {
                        Some('*') if self.peek() == Some('/') => {
                            let _ = self.consume();
                            break;
                        }
                        Some(_) => {}
                        None => break,
                    }
                }
            } else if self.peek() == Some('/') && self.peek_at(1) == Some('/') {
                while self.peek().is_some_and(|c| c != '\n') {
                    let _ = self.consume();
                }
            } else {
                break;
            }
        }
        if saw_whitespace {
            self.tokens.push(Token {
                kind: MapCSSToken::Whitespace,
                span: Span {
                    start,
                    end: self.offset(),
                },
            });
        }
    }

    fn consume_token(&mut self) -> MapCSSToken {
        let Some(c) = self.consume() else {
            return MapCSSToken::EOF;
        };

        match c {
            '"' | '\'' => self.consume_string_token(c),

            '#' => {
                let mut value = String::new();
                while let Some(c) = self.peek().filter(char::is_ascii_alphanumeric) {
                    value.push(c);
                    let _ = self.consume();
                }
                if value.is_empty() {
                    MapCSSToken::Delim('#')
                } else {
                    MapCSSToken::Hash(value)
                }
            }

            '=' => match self.peek() {
                Some('=') => {
                    let _ = self.consume();
                    MapCSSToken::EqEq
                }
                Some('~') => {
                    let _ = self.consume();
                    MapCSSToken::Match
                }
                _ => MapCSSToken::Equals,
            },

            '!' => {
                if self.peek() == Some('=') {
                    let _ = self.consume();
                    MapCSSToken::NotEquals
                } else {
                    MapCSSToken::Bang
                }
            }

            '<' => {
                if self.peek() == Some('=') {
                    let _ = self.consume();
                    MapCSSToken::LessEq
                } else {
                    MapCSSToken::Less
                }
            }

            '>' => {
                if self.peek() == Some('=') {
                    let _ = self.consume();
                    MapCSSToken::GreaterEq
                } else {
                    MapCSSToken::Greater
                }
            }

            '-' => {
                if !self.previous_ends_operand() && self.would_start_number_after(0) {
                    self.reconsume();
                    self.consume_numeric_token()
                } else {
                    MapCSSToken::Minus
                }
            }

            '.' => {
                if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.reconsume();
                    self.consume_numeric_token()
                } else {
                    MapCSSToken::Dot
                }
            }

            '+' => MapCSSToken::Plus,
            '*' => MapCSSToken::Star,
            '/' => MapCSSToken::Slash,
            '|' => MapCSSToken::Pipe,
            ':' => MapCSSToken::Colon,
            ';' => MapCSSToken::Semicolon,
            ',' => MapCSSToken::Comma,
            '[' => MapCSSToken::LeftBracket,
            ']' => MapCSSToken::RightBracket,
            '(' => MapCSSToken::LeftParen,
            ')' => MapCSSToken::RightParen,
            '{' => MapCSSToken::LeftBrace,
            '}' => MapCSSToken::RightBrace,

            c if c.is_ascii_digit() => {
                self.reconsume();
                self.consume_numeric_token()
            }

            c if is_ident_start(c) => {
                self.reconsume();
                let name = self.consume_ident_sequence();
                if self.peek() == Some('(') {
                    let _ = self.consume();
                    MapCSSToken::Function(name)
                } else {
                    MapCSSToken::Ident(name)
                }
            }

            c => MapCSSToken::Delim(c),
        }
    }

    /// Quoted strings support `\"`, `\'` and `\\` escapes.
    /// An unterminated string runs to the end of input.
    fn consume_string_token(&mut self, ending: char) -> MapCSSToken {
        let mut value = String::new();
        loop {
            match self.consume() {
                Some(c) if c == ending => return MapCSSToken::String(value),
                None => return MapCSSToken::String(value),
                Some('\\') => {
                    if let Some(c) = self.consume() {
                        value.push(c);
                    }
                }
                Some(c) => value.push(c),
            }
        }
    }

    /// Regex literals end at the first unescaped `/`. `\/` yields a literal
    /// slash; other escapes are kept for the regex engine.
    fn consume_regex_token(&mut self) -> MapCSSToken {
        let mut value = String::new();
        loop {
            match self.consume() {
                Some('/') | None => return MapCSSToken::Regex(value),
                Some('\\') => match self.consume() {
                    Some('/') => value.push('/'),
                    Some(c) => {
                        value.push('\\');
                        value.push(c);
                    }
                    None => value.push('\\'),
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn consume_numeric_token(&mut self) -> MapCSSToken {
        let value = self.consume_number();
        if self.peek() == Some('%') {
            let _ = self.consume();
            MapCSSToken::Percentage(value)
        } else if self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            let mut unit = String::new();
            while let Some(c) = self.peek().filter(char::is_ascii_alphabetic) {
                unit.push(c);
                let _ = self.consume();
            }
            MapCSSToken::Dimension { value, unit }
        } else {
            MapCSSToken::Number(value)
        }
    }

    /// Sign, integer digits, then an optional fraction. No exponent.
    fn consume_number(&mut self) -> f64 {
        let mut repr = String::new();
        if let Some(sign) = self.peek().filter(|&c| c == '-' || c == '+') {
            repr.push(sign);
            let _ = self.consume();
        }
        self.consume_digits(&mut repr);
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            repr.push('.');
            let _ = self.consume();
            self.consume_digits(&mut repr);
        }
        repr.parse().unwrap_or(0.0)
    }

    fn consume_digits(&mut self, repr: &mut String) {
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            repr.push(c);
            let _ = self.consume();
        }
    }

    fn consume_ident_sequence(&mut self) -> String {
        let mut result = String::new();
        while let Some(c) = self.peek().filter(|&c| is_ident_char(c)) {
            result.push(c);
            let _ = self.consume();
        }
        result
    }

    fn consume_whitespace(&mut self) {
        while self.peek().is_some_and(is_whitespace) {
            let _ = self.consume();
        }
    }

    fn previous_significant(&self) -> Option<&MapCSSToken> {
        self.tokens
            .iter()
            .rev()
            .map(|t| &t.kind)
            .find(|kind| **kind != MapCSSToken::Whitespace)
    }

    fn previous_ends_operand(&self) -> bool {
        self.previous_significant()
            .is_some_and(MapCSSToken::ends_operand)
    }

    fn follows_match(&self) -> bool {
        self.previous_significant() == Some(&MapCSSToken::Match)
    }

    fn would_start_number_after(&self, offset: usize) -> bool {
        match self.peek_at(offset) {
            Some(c) if c.is_ascii_digit() => true,
            Some('.') => self.peek_at(offset + 1).is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        }
    }

    /// Byte offset of the current position.
    fn offset(&self) -> usize {
        self.input
            .get(self.position)
            .map_or(self.input_len, |(offset, _)| *offset)
    }

    /// Consume and return the next character.
    fn consume(&mut self) -> Option<char> {
        let (_, c) = *self.input.get(self.position)?;
        self.position += 1;
        Some(c)
    }

    /// Put back the last consumed character.
    fn reconsume(&mut self) {
        self.position = self.position.saturating_sub(1);
    }

    /// Peek at the next character without consuming it.
    fn peek(&self) -> Option<char> {
        self.peek_at(0)
    }

    /// Peek at a character at an offset from current position.
    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).map(|(_, c)| *c)
    }
}

fn is_whitespace(c: char) -> bool {
    matches!(c, '\n' | '\t' | ' ' | '\r' | '\x0C')
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<MapCSSToken> {
        let mut tokenizer = MapCSSTokenizer::new(source);
        tokenizer.run();
        tokenizer.into_tokens().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_minus_after_operand_is_subtraction() {
        assert_eq!(
            kinds("5-2"),
            vec![
                MapCSSToken::Number(5.0),
                MapCSSToken::Minus,
                MapCSSToken::Number(2.0),
                MapCSSToken::EOF,
            ]
        );
        assert_eq!(
            kinds("=-1"),
            vec![MapCSSToken::Equals, MapCSSToken::Number(-1.0), MapCSSToken::EOF]
        );
    }

    #[test]
    fn test_regex_only_after_match() {
        assert_eq!(
            kinds("=~ /^A\\/[0-9]+$/"),
            vec![
                MapCSSToken::Match,
                MapCSSToken::Whitespace,
                MapCSSToken::Regex("^A/[0-9]+$".to_string()),
                MapCSSToken::EOF,
            ]
        );
        assert_eq!(
            kinds("4/2"),
            vec![
                MapCSSToken::Number(4.0),
                MapCSSToken::Slash,
                MapCSSToken::Number(2.0),
                MapCSSToken::EOF,
            ]
        );
    }

    #[test]
    fn test_spans_are_byte_offsets() {
        let mut tokenizer = MapCSSTokenizer::new("é width");
        tokenizer.run();
        let tokens = tokenizer.into_tokens();
        assert_eq!(tokens[2].kind, MapCSSToken::Ident("width".to_string()));
        assert_eq!(tokens[2].span, Span { start: 3, end: 8 });
    }
}
