use thiserror::Error;

use crate::action::{ActionError, CapabilityError, FileError};
use crate::analyzer::ParseError;
use crate::config::ConfigError;
use crate::eval::ExpressionError;
use crate::state_store::StateError;
use crate::tokenizer::TokenizerError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),
    #[error("State error: {0}")]
    State(#[from] StateError),
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),
    #[error("Action error: {0}")]
    Action(#[from] ActionError),
    #[error("File error: {0}")]
    File(#[from] FileError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type InternalResult<T> = Result<T, Error>;

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }
}
