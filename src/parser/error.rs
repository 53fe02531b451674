use thiserror::Error;

use crate::lexer::token::{Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", format_location(.at_end, .line, .lexeme, .message))]
pub struct ParseError {
    pub line: usize,
    pub lexeme: String,
    pub at_end: bool,
    pub message: String,
}

impl ParseError {
    pub fn at(token: &Token, message: impl Into<String>) -> Self {
        Self {
            line: token.line,
            lexeme: token.lexeme.clone(),
            at_end: token.kind == TokenKind::Eof,
            message: message.into(),
        }
    }
}

fn format_location(at_end: &bool, line: &usize, lexeme: &str, message: &str) -> String {
    if *at_end {
        format!("[line {line}] Error at end: {message}")
    } else {
        format!("[line {line}] Error at '{lexeme}': {message}")
    }
}

/// Every error a single parse produced, in source order.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))]
pub struct ParseErrors(pub Vec<ParseError>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_error_with_lexeme_and_at_end() {
        let token = Token::new(TokenKind::Semicolon, ";", 3);
        let error = ParseError::at(&token, "Expect expression.");
        assert_eq!(
            error.to_string(),
            "[line 3] Error at ';': Expect expression."
        );

        let eof = Token::new(TokenKind::Eof, "", 7);
        let error = ParseError::at(&eof, "Expect ';' after value.");
        assert_eq!(
            error.to_string(),
            "[line 7] Error at end: Expect ';' after value."
        );
    }

    #[test]
    fn joins_accumulated_errors_in_order() {
        let first = ParseError::at(&Token::new(TokenKind::Var, "var", 1), "Expect variable name.");
        let second = ParseError::at(&Token::new(TokenKind::Eof, "", 2), "Expect expression.");
        let joined = ParseErrors(vec![first, second]).to_string();
        let lines: Vec<&str> = joined.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("line 1"));
        assert!(lines[1].contains("line 2"));
    }
}
