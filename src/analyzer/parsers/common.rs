use super::super::{core::*, prelude::*};
use crate::ast;
use crate::tokenizer::{
    literal::Literal,
    symbol::{Delimiter, Operator},
    token::Token,
};

pub fn parse_identifier() -> impl Parser<Token, String> {
    satisfy(
        |token: &Token| match token {
            Token::Identifier(s) => Some(s.clone()),
            _ => None,
        },
        "identifier",
    )
}

pub fn parse_literal() -> impl Parser<Token, Literal> {
    satisfy(
        |token: &Token| match token {
            Token::Literal(literal) => Some(literal.clone()),
            _ => None,
        },
        "literal",
    )
}

pub fn parse_open_paren() -> impl Parser<Token, Token> {
    equal(Token::Delimiter(Delimiter::OpenParen))
}

pub fn parse_close_paren() -> impl Parser<Token, Token> {
    equal(Token::Delimiter(Delimiter::CloseParen))
}

pub fn parse_pipe() -> impl Parser<Token, Token> {
    equal(Token::Delimiter(Delimiter::Pipe))
}

pub fn parse_question() -> impl Parser<Token, Token> {
    equal(Token::Delimiter(Delimiter::Question))
}

pub fn parse_colon() -> impl Parser<Token, Token> {
    equal(Token::Delimiter(Delimiter::Colon))
}

pub fn parse_operator(op: Operator) -> impl Parser<Token, Token> {
    equal(Token::Operator(op))
}

/// `op` token mapped to its binary operator.
pub fn parse_binary_operator(
    op: Operator,
    binary: ast::BinaryOperator,
) -> impl Parser<Token, ast::BinaryOperator> {
    map(parse_operator(op), move |_| binary)
}

pub fn parse_operator_comparison() -> impl Parser<Token, ast::BinaryOperator> {
    with_context(
        choice(vec![
            Box::new(parse_binary_operator(
                Operator::Eq,
                ast::BinaryOperator::Equal,
            )),
            Box::new(parse_binary_operator(
                Operator::NotEq,
                ast::BinaryOperator::NotEqual,
            )),
            Box::new(parse_binary_operator(
                Operator::Ge,
                ast::BinaryOperator::GreaterThanEqual,
            )),
            Box::new(parse_binary_operator(
                Operator::Le,
                ast::BinaryOperator::LessThanEqual,
            )),
            Box::new(parse_binary_operator(
                Operator::Gt,
                ast::BinaryOperator::GreaterThan,
            )),
            Box::new(parse_binary_operator(
                Operator::Lt,
                ast::BinaryOperator::LessThan,
            )),
        ]),
        "comparison operator",
    )
}

/// Folds `first (op rest)*` into a left-associative tree.
pub fn fold_binary(
    first: ast::Expression,
    rest: Vec<(ast::BinaryOperator, ast::Expression)>,
) -> ast::Expression {
    rest.into_iter().fold(first, |left, (op, right)| {
        ast::Expression::binary(op, left, right)
    })
}
