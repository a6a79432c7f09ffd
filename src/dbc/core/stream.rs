//! Cursor over the token list with typed `expect_*` helpers.

use std::str::FromStr;

use crate::dbc::core::is_keyword;
use crate::dbc::lexer::{Token, TokenKind, error_at};
use crate::types::errors::ParseError;

pub(crate) struct TokenStream<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> TokenStream<'a> {
    /// `tokens` must end with [`TokenKind::Eof`].
    pub(crate) fn new(text: &'a str, tokens: Vec<Token>) -> Self {
        TokenStream {
            text,
            tokens,
            pos: 0,
        }
    }

    pub(crate) fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    pub(crate) fn error(&self, token: &Token, message: impl Into<String>) -> ParseError {
        error_at(self.text, token.line, token.column, message)
    }

    fn unexpected(&self, token: &Token, expected: &str) -> ParseError {
        let found = match &token.kind {
            TokenKind::Word(w) => format!("'{w}'"),
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::Str(s) => format!("string \"{s}\""),
            TokenKind::Punct(c) => format!("'{c}'"),
            TokenKind::Eof => "end of input".to_string(),
        };
        self.error(token, format!("expected {expected}, found {found}"))
    }

    pub(crate) fn peek_is_punct(&self, c: char) -> bool {
        self.peek().kind == TokenKind::Punct(c)
    }

    pub(crate) fn peek_is_word(&self, word: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Word(w) if w == word)
    }

    /// Next token is a word that does not start a new record.
    pub(crate) fn peek_is_name(&self) -> bool {
        matches!(&self.peek().kind, TokenKind::Word(w) if !is_keyword(w))
    }

    pub(crate) fn peek_is_number(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Number(_))
    }

    pub(crate) fn peek_is_string(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Str(_))
    }

    /// Consumes `c` if it is next.
    pub(crate) fn eat_punct(&mut self, c: char) -> bool {
        if self.peek_is_punct(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_punct(&mut self, c: char) -> Result<(), ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Punct(p) if p == c => Ok(()),
            _ => Err(self.unexpected(&token, &format!("'{c}'"))),
        }
    }

    pub(crate) fn expect_word(&mut self) -> Result<String, ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Word(w) => Ok(w),
            _ => Err(self.unexpected(&token, "a name")),
        }
    }

    pub(crate) fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        let token = self.advance();
        match &token.kind {
            TokenKind::Word(w) if w == keyword => Ok(()),
            _ => Err(self.unexpected(&token, keyword)),
        }
    }

    pub(crate) fn expect_string(&mut self) -> Result<String, ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Str(s) => Ok(s),
            _ => Err(self.unexpected(&token, "a quoted string")),
        }
    }

    /// Numeric literal parsed as `T`.
    pub(crate) fn expect_number<T: FromStr>(&mut self) -> Result<T, ParseError> {
        let token = self.advance();
        let TokenKind::Number(text) = &token.kind else {
            return Err(self.unexpected(&token, "a number"));
        };
        let trimmed = text.strip_prefix('+').unwrap_or(text);
        if let Ok(v) = trimmed.parse::<T>() {
            return Ok(v);
        }
        // integral values written as floats (`8.0`)
        if let Ok(f) = trimmed.parse::<f64>()
            && f.fract() == 0.0
            && let Ok(v) = format!("{f:.0}").parse::<T>()
        {
            return Ok(v);
        }
        Err(self.error(&token, format!("invalid number {text}")))
    }

    /// Numeric literal kept as text.
    pub(crate) fn expect_number_text(&mut self) -> Result<String, ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(n) => Ok(n),
            _ => Err(self.unexpected(&token, "a number")),
        }
    }

    /// Skips to just past the next `;`, or to the next line-leading
    /// keyword when a record lacks its terminator.
    pub(crate) fn skip_record(&mut self) {
        let start_line = self.peek().line;
        while !self.at_end() {
            let token = self.peek();
            if let TokenKind::Word(w) = &token.kind
                && token.line > start_line
                && is_keyword(w)
                && self.is_line_start()
            {
                return;
            }
            if self.advance().kind == TokenKind::Punct(';') {
                return;
            }
        }
    }

    /// Whether the next token is the first on its line.
    pub(crate) fn is_line_start(&self) -> bool {
        let current = self.peek();
        self.pos == 0
            || self
                .tokens
                .get(self.pos - 1)
                .is_none_or(|prev| prev.line < current.line)
    }

    /// Consumes an optional trailing `;`.
    pub(crate) fn end_record(&mut self) {
        self.eat_punct(';');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbc::lexer::tokenize;

    fn stream(text: &str) -> TokenStream<'_> {
        TokenStream::new(text, tokenize(text).unwrap())
    }

    #[test]
    fn test_expect_helpers() {
        let mut s = stream(r#"BO_ 100 Name: 8.0 "text";"#);
        s.expect_keyword("BO_").unwrap();
        assert_eq!(s.expect_number::<u32>().unwrap(), 100);
        assert_eq!(s.expect_word().unwrap(), "Name");
        s.expect_punct(':').unwrap();
        assert_eq!(s.expect_number::<usize>().unwrap(), 8);
        assert_eq!(s.expect_string().unwrap(), "text");
        assert!(s.eat_punct(';'));
        assert!(s.at_end());
        // reading past the end keeps returning Eof
        assert_eq!(s.advance().kind, TokenKind::Eof);
    }

    #[test]
    fn test_error_names_the_token() {
        let mut s = stream("BO_ x");
        s.expect_keyword("BO_").unwrap();
        let err = s.expect_number::<u32>().unwrap_err();
        assert_eq!(err.column, 5);
        assert!(err.message.contains("expected a number"));
    }

    #[test]
    fn test_skip_record() {
        let mut s = stream("FOO a b c;\nBO_ 1 X: 8 N");
        s.advance();
        s.skip_record();
        assert!(s.peek_is_word("BO_"));

        // missing terminator: stop at the next record keyword
        let mut s = stream("FOO a b\nBO_ 1 X: 8 N");
        s.advance();
        s.skip_record();
        assert!(s.peek_is_word("BO_"));
    }
}
