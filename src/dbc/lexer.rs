//! DBC tokenizer.
//!
//! Whitespace (newlines included) only separates tokens, so records may
//! span lines. `//` starts a comment running to the end of the line.

use crate::types::errors::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// Identifier or keyword.
    Word(String),
    /// Numeric literal, kept as written.
    Number(String),
    /// Quoted string, unescaped.
    Str(String),
    Punct(char),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    /// 1-based.
    pub(crate) line: usize,
    /// 1-based, in characters.
    pub(crate) column: usize,
}

const PUNCT: &[char] = &[':', ';', ',', '|', '@', '(', ')', '[', ']', '+', '-'];

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && c != '"' && !matches!(c, ':' | ';' | ',' | '|' | '@' | '(' | ')' | '[' | ']')
}

/// Builds a [`ParseError`] pointing at `line`/`column` of `text`.
pub(crate) fn error_at(text: &str, line: usize, column: usize, message: impl Into<String>) -> ParseError {
    ParseError {
        line,
        column,
        snippet: text
            .lines()
            .nth(line.saturating_sub(1))
            .unwrap_or_default()
            .trim_end()
            .to_string(),
        message: message.into(),
    }
}

pub(crate) fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens: Vec<Token> = Vec::new();
    let mut i: usize = 0;
    let mut line: usize = 1;
    let mut column: usize = 1;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c == '\n' {
            line += 1;
            column = 1;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            column += 1;
            i += 1;
            continue;
        }
        if c == '/' && next == Some('/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        let (start_line, start_column) = (line, column);
        let push = |tokens: &mut Vec<Token>, kind: TokenKind| {
            tokens.push(Token {
                kind,
                line: start_line,
                column: start_column,
            })
        };

        if c == '"' {
            let mut value = String::new();
            i += 1;
            column += 1;
            loop {
                let Some(&ch) = chars.get(i) else {
                    return Err(error_at(text, start_line, start_column, "unterminated string"));
                };
                i += 1;
                column += 1;
                match ch {
                    '"' => break,
                    '\\' if matches!(chars.get(i), Some('"') | Some('\\')) => {
                        value.push(chars[i]);
                        i += 1;
                        column += 1;
                    }
                    '\n' => {
                        value.push('\n');
                        line += 1;
                        column = 1;
                    }
                    '\r' => {}
                    other => value.push(other),
                }
            }
            push(&mut tokens, TokenKind::Str(value));
            continue;
        }

        let prev_is_word = i > 0 && (chars[i - 1].is_alphanumeric() || chars[i - 1] == '_');
        let starts_number = c.is_ascii_digit()
            || (c == '.' && next.is_some_and(|n| n.is_ascii_digit()))
            || (matches!(c, '+' | '-')
                && !prev_is_word
                && next.is_some_and(|n| n.is_ascii_digit() || n == '.'));
        if starts_number {
            let start = i;
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            if chars.get(j) == Some(&'.') {
                j += 1;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
            }
            if matches!(chars.get(j), Some('e') | Some('E')) {
                let mut k = j + 1;
                if matches!(chars.get(k), Some('+') | Some('-')) {
                    k += 1;
                }
                if chars.get(k).is_some_and(|d| d.is_ascii_digit()) {
                    j = k;
                    while j < chars.len() && chars[j].is_ascii_digit() {
                        j += 1;
                    }
                }
            }
            // digits glued to letters form a name such as `4WD_Mode`
            if chars.get(j).is_some_and(|&d| is_word_start(d) || d.is_ascii_digit())
                && c.is_ascii_digit()
            {
                while j < chars.len() && is_word_char(chars[j]) {
                    j += 1;
                }
                push(&mut tokens, TokenKind::Word(chars[start..j].iter().collect()));
            } else {
                push(&mut tokens, TokenKind::Number(chars[start..j].iter().collect()));
            }
            column += j - i;
            i = j;
            continue;
        }

        if is_word_start(c) {
            let start = i;
            while i < chars.len() && is_word_char(chars[i]) {
                i += 1;
            }
            column += i - start;
            push(&mut tokens, TokenKind::Word(chars[start..i].iter().collect()));
            continue;
        }

        if PUNCT.contains(&c) {
            push(&mut tokens, TokenKind::Punct(c));
            i += 1;
            column += 1;
            continue;
        }

        return Err(error_at(
            text,
            start_line,
            start_column,
            format!("unexpected character '{c}'"),
        ));
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        line,
        column,
    });
    Ok(tokens)
}
