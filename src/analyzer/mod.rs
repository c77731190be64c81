//! Token-slice parser combinators and the two grammars built from them:
//! the full expression grammar and the restricted condition grammar.

pub mod combinators;
pub mod core;
pub mod parsers;
pub mod prelude;

pub use core::ParseError;
pub use core::ParseResult;
pub use core::Parser;

use crate::ast::Expression;
use crate::tokenizer::{Delimiter, Token};

/// Deepest nesting of parentheses, prefix operators and ternaries the
/// grammars accept. Each level is one trip through the recursive rules.
pub const MAX_NESTING: usize = 64;

/// Parses a complete token stream as an expression.
pub fn analyze_expression(tokens: &[Token]) -> Result<Expression, ParseError> {
    parse_complete(parsers::expression::parse_expression(), tokens)
}

/// Parses a complete token stream with the restricted condition grammar.
pub fn analyze_condition(tokens: &[Token]) -> Result<Expression, ParseError> {
    parse_complete(parsers::condition::parse_condition(), tokens)
}

fn parse_complete<P: Parser<Token, Expression>>(
    parser: P,
    tokens: &[Token],
) -> Result<Expression, ParseError> {
    check_nesting(tokens)?;
    let (pos, expression) = parser.parse(tokens, 0)?;
    match tokens.get(pos) {
        Some(Token::End) | None => Ok(expression),
        Some(found) => Err(ParseError::Unexpected {
            expected: "end of input".to_string(),
            found: format!("'{}'", found),
            position: pos,
        }),
    }
}

/// Rejects streams that would recurse deeper than [`MAX_NESTING`].
///
/// Counts every run of operators as prefix operators, which overestimates
/// by at most one level per group.
fn check_nesting(tokens: &[Token]) -> Result<(), ParseError> {
    // Levels held open by each unclosed parenthesis, outermost first.
    let mut groups: Vec<usize> = Vec::new();
    let mut open = 0;
    let mut prefix_run = 0;
    for (position, token) in tokens.iter().enumerate() {
        match token {
            Token::Operator(_) => prefix_run += 1,
            Token::Delimiter(Delimiter::OpenParen) => {
                let held = prefix_run + 1;
                groups.push(held);
                open += held;
                prefix_run = 0;
            }
            Token::Delimiter(Delimiter::CloseParen) => {
                open -= groups.pop().unwrap_or(0);
                prefix_run = 0;
            }
            Token::Delimiter(Delimiter::Question) => {
                // The else branch stays nested until its group closes.
                if let Some(held) = groups.last_mut() {
                    *held += 1;
                }
                open += 1;
                prefix_run = 0;
            }
            _ => prefix_run = 0,
        }
        if open + prefix_run > MAX_NESTING {
            return Err(ParseError::Fail(format!(
                "expression nested too deeply at token {}",
                position
            )));
        }
    }
    Ok(())
}
