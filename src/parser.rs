use crate::error::{CarlaeError, Result};
use crate::language::{Expr, number_or_symbol};
use crate::lexer::{Token, tokenize};

// ============================================================================
// Parser
// ============================================================================

/// Deepest parenthesis nesting accepted in one expression
pub const MAX_NESTING: usize = 1_000;

/// Parse the whole token sequence as exactly one expression.
pub fn parse(tokens: &[Token]) -> Result<Expr> {
    if tokens.is_empty() {
        return Err(CarlaeError::syntax("unexpected end of input"));
    }

    let (expr, consumed) = parse_expression(tokens, 0, 0)?;
    if consumed != tokens.len() {
        return Err(CarlaeError::syntax(format!(
            "unexpected '{}' after a complete expression",
            tokens[consumed]
        )));
    }
    Ok(expr)
}

/// Tokenize and parse in one step.
pub fn parse_source(source: &str) -> Result<Expr> {
    parse(&tokenize(source)?)
}

/// Returns the expression starting at `index` and the index just past it.
fn parse_expression(tokens: &[Token], index: usize, depth: usize) -> Result<(Expr, usize)> {
    match &tokens[index] {
        Token::LParen => parse_compound(tokens, index + 1, depth + 1),
        Token::RParen => Err(CarlaeError::syntax("unexpected )")),
        Token::Atom(text) => Ok((number_or_symbol(text), index + 1)),
    }
}

fn parse_compound(tokens: &[Token], mut index: usize, depth: usize) -> Result<(Expr, usize)> {
    if depth > MAX_NESTING {
        return Err(CarlaeError::syntax(format!(
            "nesting too deep (more than {MAX_NESTING} levels)"
        )));
    }
    let mut children = Vec::new();

    while index < tokens.len() {
        if tokens[index] == Token::RParen {
            return Ok((Expr::Compound(children), index + 1));
        }
        let (child, next) = parse_expression(tokens, index, depth)?;
        children.push(child);
        index = next;
    }

    Err(CarlaeError::syntax("unclosed parenthesis"))
}
