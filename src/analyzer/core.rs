use thiserror::Error;

/// A parser over a slice of `I`, starting at `pos`. On success returns the
/// position after the consumed input together with the output.
pub trait Parser<I, O> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O>;
}

impl<I, O> Parser<I, O> for Box<dyn Parser<I, O>> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        self.as_ref().parse(input, pos)
    }
}

pub type ParseResult<O> = Result<(usize, O), ParseError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected {found} at token {position}, expected {expected}")]
    Unexpected {
        expected: String,
        found: String,
        position: usize,
    },
    #[error("Unexpected end of input")]
    EOF,
    #[error("No alternative")]
    NoAlternative,
    #[error("Fail: {0}")]
    Fail(String),
    #[error("{message}: {inner}")]
    WithContext {
        message: String,
        inner: Box<ParseError>,
    },
}

impl ParseError {
    /// Innermost error, without the context chain.
    pub fn root_cause(&self) -> &ParseError {
        match self {
            ParseError::WithContext { inner, .. } => inner.root_cause(),
            other => other,
        }
    }
}
