//! # Tokenizer
//!
//! Turns expression source text into a flat [`token::Token`] stream terminated by
//! [`token::Token::End`].
//!
//! * [`literal`] - single-quoted strings and numbers
//! * [`symbol`] - operators and delimiters (longest match first)
//! * [`token`] - identifiers, word literals and the [`token::Tokenizer`] driver

pub mod literal;
pub mod symbol;
pub mod token;

pub use literal::Literal;
pub use symbol::{Delimiter, Operator};
pub use token::{tokenize, Token, TokenKind, Tokenizer, TokenizerError, TokenizerResult};
