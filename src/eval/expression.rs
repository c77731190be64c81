use std::cmp::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::context::Context;
use super::pipes::PipeRegistry;
use super::ExpressionError;
use crate::analyzer::{analyze_condition, analyze_expression, ParseError};
use crate::ast::{BinaryOperator, Expression, Literal, PipeStep, UnaryOperator};
use crate::config::EngineConfig;
use crate::tokenizer::{tokenize, Token};
use crate::value::Value;

/// Parses and evaluates expressions.
///
/// Parsed trees are cached by source text, one cache per grammar. The cache is
/// dropped wholesale once it reaches `cache_capacity` entries.
pub struct ExpressionEvaluator {
    pipes: Arc<PipeRegistry>,
    expressions: DashMap<String, Arc<Expression>>,
    conditions: DashMap<String, Arc<Expression>>,
    cache_capacity: usize,
}

impl Default for ExpressionEvaluator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl std::fmt::Debug for ExpressionEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionEvaluator")
            .field("pipes", &self.pipes)
            .field("cached_expressions", &self.expressions.len())
            .field("cached_conditions", &self.conditions.len())
            .finish()
    }
}

enum Grammar {
    Expression,
    Condition,
}

impl ExpressionEvaluator {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_pipes(
            PipeRegistry::with_builtins(&config.pipes),
            config.expression_cache_capacity,
        )
    }

    pub fn with_pipes(pipes: PipeRegistry, cache_capacity: usize) -> Self {
        Self {
            pipes: Arc::new(pipes),
            expressions: DashMap::new(),
            conditions: DashMap::new(),
            cache_capacity,
        }
    }

    pub fn pipes(&self) -> &PipeRegistry {
        &self.pipes
    }

    /// Parses `source` with the full expression grammar.
    pub fn compile(&self, source: &str) -> Result<Arc<Expression>, ExpressionError> {
        self.compile_with(source, Grammar::Expression)
    }

    /// Parses `source` with the condition grammar.
    pub fn compile_condition(&self, source: &str) -> Result<Arc<Expression>, ExpressionError> {
        self.compile_with(source, Grammar::Condition)
    }

    fn compile_with(
        &self,
        source: &str,
        grammar: Grammar,
    ) -> Result<Arc<Expression>, ExpressionError> {
        let cache = match grammar {
            Grammar::Expression => &self.expressions,
            Grammar::Condition => &self.conditions,
        };
        if let Some(cached) = cache.get(source) {
            return Ok(cached.clone());
        }

        let tokens = tokenize(source)?;
        let parsed: Result<Expression, ParseError> = match grammar {
            Grammar::Expression => analyze_expression(&tokens),
            Grammar::Condition => analyze_condition(&tokens),
        };
        let expression = Arc::new(parsed.map_err(|e| parse_failure(source, &tokens, e))?);

        if self.cache_capacity > 0 {
            if cache.len() >= self.cache_capacity {
                debug!("Expression cache full ({} entries), clearing", cache.len());
                cache.clear();
            }
            cache.insert(source.to_string(), expression.clone());
        }
        Ok(expression)
    }

    /// Parses and evaluates `source`. Only parsing can fail.
    pub fn evaluate(&self, source: &str, context: &Context) -> Result<Value, ExpressionError> {
        let expression = self.compile(source)?;
        Ok(self.eval_expression(&expression, context))
    }

    pub fn eval_expression(&self, expr: &Expression, context: &Context) -> Value {
        match expr {
            Expression::Literal(lit) => Self::eval_literal(lit),
            Expression::Identifier(path) => context.resolve(path),
            Expression::Unary { op, operand } => {
                let value = self.eval_expression(operand, context);
                match op {
                    UnaryOperator::Not => Value::Bool(!value.to_bool()),
                    UnaryOperator::Negate => Value::Number(-value.to_number()),
                    UnaryOperator::Plus => Value::Number(value.to_number()),
                }
            }
            Expression::BinaryOp { op, left, right } => {
                self.eval_binary_op(op, left, right, context)
            }
            Expression::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_expression(condition, context).to_bool() {
                    self.eval_expression(then_branch, context)
                } else {
                    self.eval_expression(else_branch, context)
                }
            }
            Expression::Pipe { input, steps } => {
                let value = self.eval_expression(input, context);
                steps
                    .iter()
                    .fold(value, |value, step| self.eval_pipe_step(step, value, context))
            }
        }
    }

    pub(crate) fn eval_literal(lit: &Literal) -> Value {
        match lit {
            Literal::String(s) => Value::String(s.clone()),
            Literal::Number(n) => Value::Number(*n),
            Literal::Boolean(b) => Value::Bool(*b),
            Literal::Null => Value::Null,
        }
    }

    fn eval_pipe_step(&self, step: &PipeStep, value: Value, context: &Context) -> Value {
        match step {
            PipeStep::Transform { name, argument } => {
                let argument = argument
                    .as_ref()
                    .map(|arg| self.eval_expression(arg, context));
                self.pipes.apply(name, &value, argument.as_ref())
            }
            PipeStep::Default(fallback) if value.is_nullish() => Self::eval_literal(fallback),
            PipeStep::Default(_) => value,
        }
    }

    fn eval_binary_op(
        &self,
        op: &BinaryOperator,
        left: &Expression,
        right: &Expression,
        context: &Context,
    ) -> Value {
        let left_val = self.eval_expression(left, context);
        let right_val = || self.eval_expression(right, context);

        match op {
            // && and || yield an operand, right side evaluated only when needed
            BinaryOperator::And if left_val.to_bool() => right_val(),
            BinaryOperator::And => left_val,
            BinaryOperator::Or if left_val.to_bool() => left_val,
            BinaryOperator::Or => right_val(),
            BinaryOperator::Add => Self::eval_add(&left_val, &right_val()),
            BinaryOperator::Subtract => Value::Number(left_val.to_number() - right_val().to_number()),
            BinaryOperator::Multiply => Value::Number(left_val.to_number() * right_val().to_number()),
            BinaryOperator::Divide => Value::Number(left_val.to_number() / right_val().to_number()),
            BinaryOperator::Equal => Value::Bool(left_val.loose_equals(&right_val())),
            BinaryOperator::NotEqual => Value::Bool(!left_val.loose_equals(&right_val())),
            BinaryOperator::LessThan => {
                Self::eval_compare(&left_val, &right_val(), |o| o == Ordering::Less)
            }
            BinaryOperator::GreaterThan => {
                Self::eval_compare(&left_val, &right_val(), |o| o == Ordering::Greater)
            }
            BinaryOperator::LessThanEqual => {
                Self::eval_compare(&left_val, &right_val(), |o| o != Ordering::Greater)
            }
            BinaryOperator::GreaterThanEqual => {
                Self::eval_compare(&left_val, &right_val(), |o| o != Ordering::Less)
            }
        }
    }

    /// String concatenation when either primitive side is a string.
    fn eval_add(left: &Value, right: &Value) -> Value {
        let (left, right) = (left.to_primitive(), right.to_primitive());
        match (&left, &right) {
            (Value::String(_), _) | (_, Value::String(_)) => Value::String(format!(
                "{}{}",
                left.to_display_string(),
                right.to_display_string()
            )),
            _ => Value::Number(left.to_number() + right.to_number()),
        }
    }

    fn eval_compare(left: &Value, right: &Value, test: impl Fn(Ordering) -> bool) -> Value {
        Value::Bool(left.compare(right).is_some_and(test))
    }
}

fn parse_failure(source: &str, tokens: &[Token], error: ParseError) -> ExpressionError {
    debug!("Failed to parse '{}' ({} tokens): {}", source, tokens.len(), error);
    ExpressionError::Parse {
        source_text: source.to_string(),
        error,
    }
}
