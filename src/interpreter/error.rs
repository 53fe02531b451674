use thiserror::Error;

use crate::lexer::token::{Token, TokenKind};

/// A runtime failure, carrying the token it was detected at for line
/// context. Terminates the current `interpret` call.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", format_location(.line, .lexeme, .at_end, .message))]
pub struct RuntimeError {
    pub line: usize,
    pub lexeme: String,
    pub at_end: bool,
    pub message: String,
}

impl RuntimeError {
    pub fn new(token: &Token, message: impl Into<String>) -> Self {
        Self {
            line: token.line,
            lexeme: token.lexeme.clone(),
            at_end: token.kind == TokenKind::Eof,
            message: message.into(),
        }
    }
}

fn format_location(line: &usize, lexeme: &str, at_end: &bool, message: &str) -> String {
    if *at_end {
        format!("Line {line}: at end. {message}")
    } else {
        format!("Line {line}: at '{lexeme}'. {message}")
    }
}
