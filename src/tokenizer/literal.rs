use nom::{
    branch::alt,
    bytes::complete::take_while,
    character::complete::{char, digit1},
    combinator::{map, map_res, opt, recognize},
    error::context,
    sequence::{delimited, pair},
};

use super::token::{ParserResult, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{}'", s),
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "null"),
        }
    }
}

/// Single-quoted string. Scans to the next quote; there are no escapes.
#[tracing::instrument(level = "trace", skip(input))]
fn parse_string_literal(input: &str) -> ParserResult<Literal> {
    context(
        "string literal",
        map(
            delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
            |content: &str| Literal::String(content.to_string()),
        ),
    )(input)
}

/// `12`, `1.5` and leading-dot floats such as `.5`.
#[tracing::instrument(level = "trace", skip(input))]
fn parse_number_literal(input: &str) -> ParserResult<Literal> {
    context(
        "number literal",
        map_res(
            alt((
                recognize(pair(digit1, opt(pair(char('.'), digit1)))),
                recognize(pair(char('.'), digit1)),
            )),
            |s: &str| s.parse::<f64>().map(Literal::Number),
        ),
    )(input)
}

#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_literal(input: &str) -> ParserResult<Token> {
    context(
        "literal",
        map(
            alt((parse_string_literal, parse_number_literal)),
            Token::Literal,
        ),
    )(input)
}
