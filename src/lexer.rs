use std::fmt;

use crate::error::{CarlaeError, Result};

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    LParen,
    RParen,
    /// Literal text of a number or symbol
    Atom(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Atom(text) => write!(f, "{text}"),
        }
    }
}

/// Split source text into parens and whitespace-separated atoms.
///
/// `#` starts a comment that runs to the end of the line. An opening paren
/// glued to the end of an atom (`f(`) is rejected.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut pending = String::new();
    let mut in_comment = false;

    for ch in source.chars() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
            }
            continue;
        }

        match ch {
            '(' => {
                if !pending.is_empty() {
                    return Err(CarlaeError::syntax(format!(
                        "missing whitespace between '{pending}' and '('"
                    )));
                }
                tokens.push(Token::LParen);
            }
            ')' | '#' => {
                flush(&mut pending, &mut tokens);
                if ch == ')' {
                    tokens.push(Token::RParen);
                } else {
                    in_comment = true;
                }
            }
            ch if ch.is_whitespace() => flush(&mut pending, &mut tokens),
            _ => pending.push(ch),
        }
    }
    flush(&mut pending, &mut tokens);

    Ok(tokens)
}

fn flush(pending: &mut String, tokens: &mut Vec<Token>) {
    if !pending.is_empty() {
        tokens.push(Token::Atom(std::mem::take(pending)));
    }
}
