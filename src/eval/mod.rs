//! # Expression Layer
//!
//! Evaluation of the expression language used throughout view definitions:
//!
//! * [`ExpressionEvaluator::evaluate`] - a single expression, e.g.
//!   `price * quantity | currency`
//! * [`ExpressionEvaluator::interpolate_string`] /
//!   [`ExpressionEvaluator::interpolate_props`] - `{{ expr }}` substitution
//! * [`ExpressionEvaluator::evaluate_condition`] - boolean conditions with a
//!   key-lookup fallback
//!
//! The free functions of this module run against a shared evaluator built
//! from [`EngineConfig::default`].

pub mod condition;
pub mod context;
pub mod expression;
pub mod pipes;
pub mod template;

pub use context::Context;
pub use expression::ExpressionEvaluator;
pub use pipes::{PipeFn, PipeRegistry};

use lazy_static::lazy_static;
use thiserror::Error;

use crate::analyzer::ParseError;
use crate::config::EngineConfig;
use crate::tokenizer::TokenizerError;
use crate::value::Value;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("{0}")]
    Tokenize(#[from] TokenizerError),
    #[error("Cannot parse '{source_text}': {error}")]
    Parse {
        source_text: String,
        error: ParseError,
    },
}

lazy_static! {
    static ref DEFAULT_EVALUATOR: ExpressionEvaluator =
        ExpressionEvaluator::new(&EngineConfig::default());
}

pub fn default_evaluator() -> &'static ExpressionEvaluator {
    &DEFAULT_EVALUATOR
}

pub fn evaluate(source: &str, context: &Context) -> Result<Value, ExpressionError> {
    DEFAULT_EVALUATOR.evaluate(source, context)
}

pub fn interpolate_string(template: &str, context: &Context) -> Value {
    DEFAULT_EVALUATOR.interpolate_string(template, context)
}

pub fn interpolate_props(props: &Value, context: &Context) -> Value {
    DEFAULT_EVALUATOR.interpolate_props(props, context)
}

pub fn evaluate_condition(source: &str, context: &Context) -> bool {
    DEFAULT_EVALUATOR.evaluate_condition(source, context)
}
