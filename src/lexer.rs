//! Scanner: source bytes to a token sequence.
//!
//! Single forward pass; lexical errors are reported to the
//! [`DiagnosticSink`] and scanning continues with the next byte, so one
//! run surfaces every bad character. The token list always ends with an
//! `Eof` token carrying the final line.

pub mod token;

use crate::config::Config;
use crate::diagnostics::DiagnosticSink;

use token::{Literal, Token, TokenKind};

pub struct Lexer<'a> {
    source: &'a [u8],
    config: Config,
    start: usize,
    current: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, config: Config) -> Self {
        Self {
            source: source.as_bytes(),
            config,
            start: 0,
            current: 0,
            line: 1,
        }
    }

    pub fn scan_tokens(mut self, sink: &mut DiagnosticSink) -> Vec<Token> {
        let mut tokens = Vec::new();
        while !self.is_at_end() {
            self.start = self.current;
            if let Some(token) = self.scan_token(sink) {
                tokens.push(token);
            }
        }
        tokens.push(Token::new(TokenKind::Eof, "", self.line));
        tokens
    }

    fn scan_token(&mut self, sink: &mut DiagnosticSink) -> Option<Token> {
        let c = self.advance();
        let kind = match c {
            b'(' => TokenKind::LeftParen,
            b')' => TokenKind::RightParen,
            b'{' => TokenKind::LeftBrace,
            b'}' => TokenKind::RightBrace,
            b'[' if self.config.allow_arrays => TokenKind::LeftBracket,
            b']' if self.config.allow_arrays => TokenKind::RightBracket,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Dot,
            b'-' => TokenKind::Minus,
            b'+' => TokenKind::Plus,
            b';' => TokenKind::Semicolon,
            b'*' => TokenKind::Star,
            b'%' if self.config.allow_modulo_operator => TokenKind::Percent,
            b'?' => TokenKind::QuestionMark,
            b':' => TokenKind::Colon,
            b'!' => {
                if self.matches(b'=') {
                    TokenKind::BangEqual
                } else {
                    TokenKind::Bang
                }
            }
            b'=' => {
                if self.matches(b'=') {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Equal
                }
            }
            b'<' => {
                if self.matches(b'=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                }
            }
            b'>' => {
                if self.matches(b'=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            b'/' => {
                if self.matches(b'/') {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                    return None;
                } else if self.matches(b'*') {
                    self.block_comment(sink);
                    return None;
                } else {
                    TokenKind::Slash
                }
            }
            b'"' => return self.string_literal(sink),
            b' ' | b'\r' | b'\t' => return None,
            b'\n' => {
                self.line += 1;
                return None;
            }
            _ => {
                if is_digit(c) {
                    return self.number_literal(sink);
                } else if is_alpha(c) {
                    return Some(self.identifier());
                }
                sink.report(self.line, "Unexpected character.");
                return None;
            }
        };
        Some(self.token(kind))
    }

    /// Block comments nest: each `/*` inside bumps the depth and a
    /// matching `*/` closes one level.
    fn block_comment(&mut self, sink: &mut DiagnosticSink) {
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek() {
                Some(b'*') if self.peek_next() == Some(b'/') => {
                    self.advance();
                    self.advance();
                    depth -= 1;
                }
                Some(b'/') if self.peek_next() == Some(b'*') => {
                    self.advance();
                    self.advance();
                    depth += 1;
                }
                Some(c) => {
                    if c == b'\n' {
                        self.line += 1;
                    }
                    self.advance();
                }
                None => {
                    sink.report(self.line, "Unterminated block comment.");
                    return;
                }
            }
        }
    }

    fn string_literal(&mut self, sink: &mut DiagnosticSink) -> Option<Token> {
        while let Some(c) = self.peek() {
            if c == b'"' {
                break;
            }
            if c == b'\n' {
                self.line += 1;
            }
            self.advance();
        }
        if self.is_at_end() {
            sink.report(self.line, "Unterminated string.");
            return None;
        }

        // Closing quote.
        self.advance();

        let value = self.lexeme_range(self.start + 1, self.current - 1);
        Some(Token::with_literal(
            TokenKind::String,
            self.lexeme(),
            Literal::Str(value),
            self.line,
        ))
    }

    fn number_literal(&mut self, sink: &mut DiagnosticSink) -> Option<Token> {
        while self.peek().is_some_and(is_digit) {
            self.advance();
        }

        // A trailing `.` only belongs to the number when a digit follows.
        if self.peek() == Some(b'.') && self.peek_next().is_some_and(is_digit) {
            self.advance();
            while self.peek().is_some_and(is_digit) {
                self.advance();
            }
        }

        let lexeme = self.lexeme();
        match lexeme.parse::<f64>() {
            Ok(number) => Some(Token::with_literal(
                TokenKind::Number,
                lexeme,
                Literal::Number(number),
                self.line,
            )),
            Err(_) => {
                sink.report(self.line, "Invalid number literal.");
                None
            }
        }
    }

    fn identifier(&mut self) -> Token {
        while self.peek().is_some_and(is_alphanumeric) {
            self.advance();
        }
        let lexeme = self.lexeme();
        let kind = self.keyword(&lexeme).unwrap_or(TokenKind::Identifier);
        Token::new(kind, lexeme, self.line)
    }

    fn keyword(&self, text: &str) -> Option<TokenKind> {
        let kind = match text {
            "and" => TokenKind::And,
            "class" => TokenKind::Class,
            "else" => TokenKind::Else,
            "false" => TokenKind::False,
            "fun" => TokenKind::Fun,
            "for" => TokenKind::For,
            "if" => TokenKind::If,
            "nil" => TokenKind::Nil,
            "or" => TokenKind::Or,
            "print" => TokenKind::Print,
            "return" => TokenKind::Return,
            "super" => TokenKind::Super,
            "this" => TokenKind::This,
            "true" => TokenKind::True,
            "var" => TokenKind::Var,
            "while" => TokenKind::While,
            "break" => TokenKind::Break,
            "continue" if self.config.allow_continue_keyword => TokenKind::Continue,
            "Array" if self.config.allow_arrays => TokenKind::Array,
            _ => return None,
        };
        Some(kind)
    }

    fn token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.lexeme(), self.line)
    }

    fn lexeme(&self) -> String {
        self.lexeme_range(self.start, self.current)
    }

    fn lexeme_range(&self, start: usize, end: usize) -> String {
        String::from_utf8_lossy(&self.source[start..end]).into_owned()
    }

    fn advance(&mut self) -> u8 {
        let c = self.source[self.current];
        self.current += 1;
        c
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.current += 1;
            return true;
        }
        false
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.current).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.source.get(self.current + 1).copied()
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn is_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_alphanumeric(c: u8) -> bool {
    is_alpha(c) || is_digit(c)
}

pub fn tokenize(source: &str, config: Config, sink: &mut DiagnosticSink) -> Vec<Token> {
    Lexer::new(source, config).scan_tokens(sink)
}
