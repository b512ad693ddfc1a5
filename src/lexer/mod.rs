mod token;
mod token_kind;
mod tokens;

pub use token::*;
pub use token_kind::*;
pub use tokens::*;

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

use once_cell::sync::Lazy;

use crate::error;
use crate::value::Number;

static KEYWORDS: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
    use TokenKind::*;
    HashMap::from([
        ("if", If),
        ("else", Else),
        ("elif", Elif),
        ("while", While),
        ("for", For),
        ("def", Def),
        ("return", Return),
        ("true", True),
        ("false", False),
        ("None", None),
        ("and", And),
        ("or", Or),
        ("in", In),
    ])
});

/// Scans NANO source text into a flat token stream.
///
/// A single left-to-right pass over the characters with up to two characters
/// of lookahead (`peek`/`peek_next`), matching §4.A of the specification.
/// Every lexical error is reported to stderr and scanning continues; the
/// lexer never aborts early.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    tokens: Vec<Token>,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            tokens: Vec::new(),
            line: 1,
        }
    }

    /// Consume the lexer, returning the token stream terminated by `Eof`.
    pub fn scan_tokens(mut self) -> Vec<Token> {
        while self.peek().is_some() {
            self.scan_token();
        }
        self.tokens.push(Token::eof(self.line));
        self.tokens
    }

    fn advance(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_next(&self) -> Option<char> {
        let mut lookahead = self.chars.clone();
        lookahead.next();
        lookahead.next()
    }

    fn advance_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn push(&mut self, kind: TokenKind, lexeme: impl Into<String>) {
        self.tokens.push(Token::new(kind, lexeme, Literal::None, self.line));
    }

    fn scan_token(&mut self) {
        let Some(c) = self.advance() else { return };

        match c {
            '(' => self.push(TokenKind::LeftParen, "("),
            ')' => self.push(TokenKind::RightParen, ")"),
            '{' => self.push(TokenKind::LeftBrace, "{"),
            '}' => self.push(TokenKind::RightBrace, "}"),
            '[' => self.push(TokenKind::LeftBracket, "["),
            ']' => self.push(TokenKind::RightBracket, "]"),
            ',' => self.push(TokenKind::Comma, ","),
            '.' => self.push(TokenKind::Dot, "."),
            '+' => self.push(TokenKind::Plus, "+"),
            ';' => self.push(TokenKind::Semicolon, ";"),
            '*' => self.push(TokenKind::Star, "*"),
            '?' => self.push(TokenKind::Question, "?"),
            '-' => {
                if self.advance_if('>') {
                    self.push(TokenKind::Arrow, "->");
                } else {
                    self.push(TokenKind::Minus, "-");
                }
            }
            ':' => {
                if self.advance_if(':') {
                    self.push(TokenKind::ColonColon, "::");
                } else {
                    self.push(TokenKind::Colon, ":");
                }
            }
            '!' => {
                if self.advance_if('=') {
                    self.push(TokenKind::BangEqual, "!=");
                } else {
                    self.push(TokenKind::Bang, "!");
                }
            }
            '=' => {
                if self.advance_if('=') {
                    self.push(TokenKind::EqualEqual, "==");
                } else {
                    self.push(TokenKind::Equal, "=");
                }
            }
            '<' => {
                if self.advance_if('=') {
                    self.push(TokenKind::LessEqual, "<=");
                } else {
                    self.push(TokenKind::Less, "<");
                }
            }
            '>' => {
                if self.advance_if('=') {
                    self.push(TokenKind::GreaterEqual, ">=");
                } else {
                    self.push(TokenKind::Greater, ">");
                }
            }
            '&' => {
                if self.advance_if('&') {
                    self.push(TokenKind::AmpAmp, "&&");
                } else {
                    error::report(self.line, "", "Unexpected character '&'.");
                }
            }
            '|' => {
                if self.advance_if('|') {
                    self.push(TokenKind::PipePipe, "||");
                } else {
                    error::report(self.line, "", "Unexpected character '|'.");
                }
            }
            '/' => {
                if self.advance_if('/') {
                    self.skip_line_comment();
                } else {
                    self.push(TokenKind::Slash, "/");
                }
            }
            '#' => self.skip_line_comment(),
            ' ' | '\t' | '\r' => {}
            '\n' => self.line += 1,
            '"' => self.scan_string(),
            c if c.is_ascii_digit() => self.scan_number(c),
            c if c.is_alphabetic() || c == '_' => self.scan_identifier(c),
            other => error::report(self.line, "", &format!("Unexpected character '{other}'.")),
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn scan_string(&mut self) {
        let start_line = self.line;
        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    error::report(start_line, "", "Unterminated string.");
                    break;
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\n') => {
                    self.line += 1;
                    value.push('\n');
                    self.advance();
                }
                Some('\\') => {
                    self.advance();
                    match self.peek() {
                        Some('"') => {
                            value.push('"');
                            self.advance();
                        }
                        Some('\\') => {
                            value.push('\\');
                            self.advance();
                        }
                        Some('n') => {
                            value.push('\n');
                            self.advance();
                        }
                        Some('t') => {
                            value.push('\t');
                            self.advance();
                        }
                        Some('r') => {
                            value.push('\r');
                            self.advance();
                        }
                        Some(other) => {
                            value.push('\\');
                            value.push(other);
                            self.advance();
                        }
                        None => value.push('\\'),
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        let lexeme = format!("\"{value}\"");
        self.tokens.push(Token::new(
            TokenKind::String,
            lexeme,
            Literal::String(value),
            start_line,
        ));
    }

    fn scan_number(&mut self, first: char) {
        let mut text = String::from(first);
        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            text.push(c);
            self.advance();
        }

        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            text.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if !c.is_ascii_digit() {
                    break;
                }
                text.push(c);
                self.advance();
            }
        }

        let number = Number::from_str(&text).unwrap_or_else(|_| {
            error::report(self.line, "", &format!("Malformed number '{text}'."));
            Number::zero()
        });

        self.tokens.push(Token::new(
            TokenKind::Number,
            text,
            Literal::Number(number),
            self.line,
        ));
    }

    fn scan_identifier(&mut self, first: char) {
        let mut text = String::from(first);
        while let Some(c) = self.peek() {
            if !(c.is_alphanumeric() || c == '_') {
                break;
            }
            text.push(c);
            self.advance();
        }

        let kind = KEYWORDS.get(text.as_str()).copied().unwrap_or(TokenKind::Identifier);
        self.push(kind, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source).scan_tokens().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_arithmetic() {
        use TokenKind::*;
        assert_eq!(kinds("1 + 2 * 3"), vec![Number, Plus, Number, Star, Number, Eof]);
    }

    #[test]
    fn lexes_composite_operators() {
        use TokenKind::*;
        assert_eq!(
            kinds("-> == != <= >= :: && ||"),
            vec![Arrow, EqualEqual, BangEqual, LessEqual, GreaterEqual, ColonColon, AmpAmp, PipePipe, Eof]
        );
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        use TokenKind::*;
        assert_eq!(kinds("if elif x_1"), vec![If, Elif, Identifier, Eof]);
    }

    #[test]
    fn skips_both_comment_styles() {
        use TokenKind::*;
        assert_eq!(kinds("1 // comment\n2 # also a comment\n3"), vec![Number, Number, Number, Eof]);
    }

    #[test]
    fn string_escapes() {
        let tokens = Lexer::new(r#""a\n\t\"\\\q""#).scan_tokens();
        let Literal::String(value) = &tokens[0].literal else {
            panic!("expected string literal");
        };
        assert_eq!(value, "a\n\t\"\\\\q");
    }

    #[test]
    fn unterminated_string_still_yields_a_token() {
        let tokens = Lexer::new("\"abc").scan_tokens();
        assert_eq!(tokens[0].kind, TokenKind::String);
        let Literal::String(value) = &tokens[0].literal else {
            panic!("expected string literal");
        };
        assert_eq!(value, "abc");
    }

    #[test]
    fn tracks_line_numbers_across_newlines_in_strings() {
        let tokens = Lexer::new("\"a\nb\"\n1").scan_tokens();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn number_with_fraction() {
        let tokens = Lexer::new("3.14").scan_tokens();
        assert_eq!(tokens[0].lexeme, "3.14");
    }

    #[test]
    fn dot_without_following_digit_is_not_part_of_number() {
        use TokenKind::*;
        assert_eq!(kinds("3.len()"), vec![Number, Dot, Identifier, LeftParen, RightParen, Eof]);
    }
}
