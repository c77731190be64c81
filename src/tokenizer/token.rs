use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::multispace0,
    combinator::recognize,
    error::{context, VerboseError},
    sequence::pair,
    IResult,
};
use thiserror::Error;

use super::{
    literal::{parse_literal, Literal},
    symbol::{parse_delimiter, parse_operator, Delimiter, Operator},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Literal(Literal),
    /// Identifier including any dot-path (`user.address.city`, `$event.value`).
    Identifier(String),
    Operator(Operator),
    Delimiter(Delimiter),
    /// Always the last token of a stream.
    End,
}

/// Coarse token categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TokenKind {
    String,
    Number,
    Identifier,
    Boolean,
    Null,
    Operator,
    Paren,
    Pipe,
    Question,
    Colon,
    End,
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Literal(Literal::String(_)) => TokenKind::String,
            Token::Literal(Literal::Number(_)) => TokenKind::Number,
            Token::Literal(Literal::Boolean(_)) => TokenKind::Boolean,
            Token::Literal(Literal::Null) => TokenKind::Null,
            Token::Identifier(_) => TokenKind::Identifier,
            Token::Operator(_) => TokenKind::Operator,
            Token::Delimiter(Delimiter::OpenParen | Delimiter::CloseParen) => TokenKind::Paren,
            Token::Delimiter(Delimiter::Pipe) => TokenKind::Pipe,
            Token::Delimiter(Delimiter::Question) => TokenKind::Question,
            Token::Delimiter(Delimiter::Colon) => TokenKind::Colon,
            Token::End => TokenKind::End,
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Literal(lit) => write!(f, "{}", lit),
            Token::Identifier(name) => write!(f, "{}", name),
            Token::Operator(op) => write!(f, "{}", op),
            Token::Delimiter(delimiter) => write!(f, "{}", delimiter),
            Token::End => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    current_position: usize,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    #[tracing::instrument(level = "debug", skip(input))]
    pub fn tokenize(&mut self, input: &str) -> TokenizerResult<Vec<Token>> {
        let mut tokens = Vec::new();
        let mut remaining = self.skip_whitespace(input);

        while !remaining.is_empty() {
            let result = alt((parse_literal, parse_word, parse_operator, parse_delimiter))(remaining);

            match result {
                Ok((new_remaining, token)) => {
                    self.current_position += remaining.len() - new_remaining.len();
                    tokens.push(token);
                    remaining = self.skip_whitespace(new_remaining);
                }
                Err(_) => {
                    let found = remaining.chars().next().unwrap_or_default();
                    let error = if found == '\'' {
                        TokenizerError::UnterminatedString {
                            position: self.current_position,
                        }
                    } else {
                        TokenizerError::UnexpectedCharacter {
                            found,
                            position: self.current_position,
                        }
                    };
                    tracing::debug!("{}", error);
                    return Err(error);
                }
            }
        }

        tokens.push(Token::End);
        Ok(tokens)
    }

    fn skip_whitespace<'a>(&mut self, input: &'a str) -> &'a str {
        let parsed: ParserResult<&str> = multispace0(input);
        match parsed {
            Ok((rest, skipped)) => {
                self.current_position += skipped.len();
                rest
            }
            Err(_) => input,
        }
    }
}

/// Identifiers and the word literals `true`, `false`, `null`.
#[tracing::instrument(level = "trace", skip(input))]
fn parse_word(input: &str) -> ParserResult<Token> {
    let (input, word) = context(
        "identifier",
        recognize(pair(
            take_while1(|c: char| c.is_ascii_alphabetic() || c == '_' || c == '$'),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$'),
        )),
    )(input)?;

    let token = match word {
        "true" => Token::Literal(Literal::Boolean(true)),
        "false" => Token::Literal(Literal::Boolean(false)),
        "null" => Token::Literal(Literal::Null),
        _ => Token::Identifier(word.to_string()),
    };
    Ok((input, token))
}

/// Convenience wrapper around a fresh [`Tokenizer`].
pub fn tokenize(input: &str) -> TokenizerResult<Vec<Token>> {
    Tokenizer::new().tokenize(input)
}

pub type ParserResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

pub type TokenizerResult<T> = Result<T, TokenizerError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenizerError {
    #[error("Unexpected character '{found}' at position {position}")]
    UnexpectedCharacter { found: char, position: usize },
    #[error("Unterminated string starting at position {position}")]
    UnterminatedString { position: usize },
}
