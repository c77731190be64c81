//! Operators and delimiters.
//!
//! Both are matched against the whole symbol table with the longest candidate
//! winning, so `>=` never splits into `>` `=` and `||` is never read as two
//! pipes. Operators are tried before delimiters.

use nom::error::{ErrorKind, ParseError, VerboseError};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use super::token::{ParserResult, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr, EnumIter)]
pub enum Operator {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    NotEq,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "!")]
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr, EnumIter)]
pub enum Delimiter {
    #[strum(serialize = "(")]
    OpenParen,
    #[strum(serialize = ")")]
    CloseParen,
    #[strum(serialize = "|")]
    Pipe,
    #[strum(serialize = "?")]
    Question,
    #[strum(serialize = ":")]
    Colon,
}

fn longest_match<S>(input: &str) -> Option<(S, &str)>
where
    S: IntoEnumIterator + AsRef<str>,
{
    S::iter()
        .filter(|symbol| input.starts_with(symbol.as_ref()))
        .max_by_key(|symbol| symbol.as_ref().len())
        .map(|symbol| {
            let rest = &input[symbol.as_ref().len()..];
            (symbol, rest)
        })
}

fn symbol<S>(input: &str, to_token: fn(S) -> Token) -> ParserResult<Token>
where
    S: IntoEnumIterator + AsRef<str>,
{
    match longest_match::<S>(input) {
        Some((symbol, rest)) => Ok((rest, to_token(symbol))),
        None => Err(nom::Err::Error(VerboseError::from_error_kind(
            input,
            ErrorKind::Tag,
        ))),
    }
}

#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_operator(input: &str) -> ParserResult<Token> {
    symbol(input, Token::Operator)
}

#[tracing::instrument(level = "trace", skip(input))]
pub fn parse_delimiter(input: &str) -> ParserResult<Token> {
    symbol(input, Token::Delimiter)
}
