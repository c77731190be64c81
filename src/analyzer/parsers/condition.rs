//! Restricted grammar for `while` conditions. No arithmetic, no pipes,
//! no ternaries:
//!
//! ```text
//! condition  := logical_or
//! logical_or := logical_and ( '||' logical_and )*
//! logical_and:= not ( '&&' not )*
//! not        := '!' not | comparison
//! comparison := operand ( cmp_op operand )?
//! operand    := '(' condition ')' | literal | IDENT
//! ```

use super::super::{core::*, prelude::*};
use super::common::*;
use crate::ast::{self, Expression, UnaryOperator};
use crate::tokenizer::symbol::Operator;
use crate::tokenizer::token::Token;

pub fn parse_condition() -> impl Parser<Token, Expression> {
    with_context(parse_condition_or(), "condition")
}

fn parse_condition_or() -> impl Parser<Token, Expression> {
    map(
        pair(
            parse_condition_and(),
            many(pair(
                parse_binary_operator(Operator::Or, ast::BinaryOperator::Or),
                parse_condition_and(),
            )),
        ),
        |(first, rest)| fold_binary(first, rest),
    )
}

fn parse_condition_and() -> impl Parser<Token, Expression> {
    map(
        pair(
            parse_condition_not(),
            many(pair(
                parse_binary_operator(Operator::And, ast::BinaryOperator::And),
                parse_condition_not(),
            )),
        ),
        |(first, rest)| fold_binary(first, rest),
    )
}

fn parse_condition_not() -> impl Parser<Token, Expression> {
    choice(vec![
        Box::new(map(
            preceded(
                parse_operator(Operator::Not),
                boxed(lazy(parse_condition_not)),
            ),
            |operand| Expression::unary(UnaryOperator::Not, operand),
        )),
        Box::new(parse_condition_comparison()),
    ])
}

fn parse_condition_comparison() -> impl Parser<Token, Expression> {
    map(
        pair(
            parse_operand(),
            optional(pair(parse_operator_comparison(), parse_operand())),
        ),
        |(left, rest)| match rest {
            Some((op, right)) => Expression::binary(op, left, right),
            None => left,
        },
    )
}

fn parse_operand() -> impl Parser<Token, Expression> {
    with_context(
        choice(vec![
            Box::new(delimited(
                parse_open_paren(),
                boxed(lazy(parse_condition_or)),
                parse_close_paren(),
            )),
            Box::new(map(parse_literal(), Expression::Literal)),
            Box::new(map(parse_identifier(), Expression::Identifier)),
        ]),
        "operand",
    )
}
