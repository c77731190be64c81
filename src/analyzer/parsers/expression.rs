//! Full expression grammar, lowest precedence first:
//!
//! ```text
//! expression     := pipe
//! pipe           := ternary ( '|' pipe_step )*
//! pipe_step      := literal | IDENT ( ':' primary )?
//! ternary        := logical_or ( '?' expression ':' expression )?
//! logical_or     := logical_and ( '||' logical_and )*
//! logical_and    := not ( '&&' not )*
//! not            := '!' not | comparison
//! comparison     := additive ( cmp_op additive )?
//! additive       := multiplicative ( ('+' | '-') multiplicative )*
//! multiplicative := unary ( ('*' | '/') unary )*
//! unary          := ('-' | '+') unary | primary
//! primary        := '(' expression ')' | literal | IDENT
//! ```

use super::super::{core::*, prelude::*};
use super::common::*;
use crate::ast::{self, Expression, PipeStep, UnaryOperator};
use crate::tokenizer::symbol::Operator;
use crate::tokenizer::token::Token;

pub fn parse_expression() -> impl Parser<Token, Expression> {
    with_context(parse_pipe_chain(), "expression")
}

fn parse_pipe_chain() -> impl Parser<Token, Expression> {
    map(
        pair(
            parse_ternary(),
            many(preceded(parse_pipe(), parse_pipe_step())),
        ),
        |(input, steps)| {
            if steps.is_empty() {
                input
            } else {
                Expression::Pipe {
                    input: Box::new(input),
                    steps,
                }
            }
        },
    )
}

fn parse_pipe_step() -> impl Parser<Token, PipeStep> {
    with_context(
        choice(vec![
            Box::new(map(parse_literal(), PipeStep::Default)),
            Box::new(map(
                pair(
                    parse_identifier(),
                    optional(preceded(parse_colon(), parse_primary())),
                ),
                |(name, argument)| PipeStep::Transform {
                    name,
                    argument: argument.map(Box::new),
                },
            )),
        ]),
        "pipe step",
    )
}

fn parse_ternary() -> impl Parser<Token, Expression> {
    map(
        pair(
            parse_logical_or(),
            optional(pair(
                preceded(parse_question(), boxed(lazy(parse_expression))),
                preceded(parse_colon(), boxed(lazy(parse_expression))),
            )),
        ),
        |(condition, branches)| match branches {
            Some((then_branch, else_branch)) => Expression::Conditional {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            None => condition,
        },
    )
}

fn parse_logical_or() -> impl Parser<Token, Expression> {
    with_context(
        map(
            pair(
                parse_logical_and(),
                many(pair(
                    parse_binary_operator(Operator::Or, ast::BinaryOperator::Or),
                    parse_logical_and(),
                )),
            ),
            |(first, rest)| fold_binary(first, rest),
        ),
        "logical or",
    )
}

fn parse_logical_and() -> impl Parser<Token, Expression> {
    with_context(
        map(
            pair(
                parse_not(),
                many(pair(
                    parse_binary_operator(Operator::And, ast::BinaryOperator::And),
                    parse_not(),
                )),
            ),
            |(first, rest)| fold_binary(first, rest),
        ),
        "logical and",
    )
}

fn parse_not() -> impl Parser<Token, Expression> {
    choice(vec![
        Box::new(map(
            preceded(parse_operator(Operator::Not), boxed(lazy(parse_not))),
            |operand| Expression::unary(UnaryOperator::Not, operand),
        )),
        Box::new(parse_comparison()),
    ])
}

fn parse_comparison() -> impl Parser<Token, Expression> {
    with_context(
        map(
            pair(
                parse_additive(),
                optional(pair(parse_operator_comparison(), parse_additive())),
            ),
            |(left, rest)| match rest {
                Some((op, right)) => Expression::binary(op, left, right),
                None => left,
            },
        ),
        "comparison",
    )
}

fn parse_additive() -> impl Parser<Token, Expression> {
    map(
        pair(
            parse_multiplicative(),
            many(pair(
                choice(vec![
                    Box::new(parse_binary_operator(
                        Operator::Add,
                        ast::BinaryOperator::Add,
                    )),
                    Box::new(parse_binary_operator(
                        Operator::Sub,
                        ast::BinaryOperator::Subtract,
                    )),
                ]),
                parse_multiplicative(),
            )),
        ),
        |(first, rest)| fold_binary(first, rest),
    )
}

fn parse_multiplicative() -> impl Parser<Token, Expression> {
    map(
        pair(
            parse_unary(),
            many(pair(
                choice(vec![
                    Box::new(parse_binary_operator(
                        Operator::Mul,
                        ast::BinaryOperator::Multiply,
                    )),
                    Box::new(parse_binary_operator(
                        Operator::Div,
                        ast::BinaryOperator::Divide,
                    )),
                ]),
                parse_unary(),
            )),
        ),
        |(first, rest)| fold_binary(first, rest),
    )
}

fn parse_unary() -> impl Parser<Token, Expression> {
    choice(vec![
        Box::new(map(
            preceded(parse_operator(Operator::Sub), boxed(lazy(parse_unary))),
            |operand| Expression::unary(UnaryOperator::Negate, operand),
        )),
        Box::new(map(
            preceded(parse_operator(Operator::Add), boxed(lazy(parse_unary))),
            |operand| Expression::unary(UnaryOperator::Plus, operand),
        )),
        Box::new(parse_primary()),
    ])
}

fn parse_primary() -> impl Parser<Token, Expression> {
    with_context(
        choice(vec![
            Box::new(delimited(
                parse_open_paren(),
                boxed(lazy(parse_expression)),
                parse_close_paren(),
            )),
            Box::new(map(parse_literal(), Expression::Literal)),
            Box::new(map(parse_identifier(), Expression::Identifier)),
        ]),
        "primary",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOperator, Literal};
    use crate::tokenizer::tokenize;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Expression {
        let tokens = tokenize(source).unwrap();
        let (pos, expr) = parse_expression().parse(&tokens, 0).unwrap();
        assert_eq!(tokens[pos], Token::End, "unconsumed input in {source}");
        expr
    }

    fn ident(name: &str) -> Expression {
        Expression::Identifier(name.to_string())
    }

    fn number(n: f64) -> Expression {
        Expression::Literal(Literal::Number(n))
    }

    #[test]
    fn test_multiplication_binds_tighter() {
        assert_eq!(
            parse("1 + 2 * 3"),
            Expression::binary(
                BinaryOperator::Add,
                number(1.0),
                Expression::binary(BinaryOperator::Multiply, number(2.0), number(3.0)),
            )
        );
    }

    #[test]
    fn test_subtraction_is_left_associative() {
        assert_eq!(
            parse("10 - 4 - 3"),
            Expression::binary(
                BinaryOperator::Subtract,
                Expression::binary(BinaryOperator::Subtract, number(10.0), number(4.0)),
                number(3.0),
            )
        );
    }

    #[test]
    fn test_not_applies_to_comparison() {
        assert_eq!(
            parse("!a == b"),
            Expression::unary(
                UnaryOperator::Not,
                Expression::binary(BinaryOperator::Equal, ident("a"), ident("b")),
            )
        );
    }

    #[test]
    fn test_ternary_nests_on_the_right() {
        assert_eq!(
            parse("a ? 1 : b ? 2 : 3"),
            Expression::Conditional {
                condition: Box::new(ident("a")),
                then_branch: Box::new(number(1.0)),
                else_branch: Box::new(Expression::Conditional {
                    condition: Box::new(ident("b")),
                    then_branch: Box::new(number(2.0)),
                    else_branch: Box::new(number(3.0)),
                }),
            }
        );
    }

    #[test]
    fn test_pipe_binds_loosest() {
        assert_eq!(
            parse("a + b | currency:'EUR' | 'n/a'"),
            Expression::Pipe {
                input: Box::new(Expression::binary(
                    BinaryOperator::Add,
                    ident("a"),
                    ident("b")
                )),
                steps: vec![
                    PipeStep::Transform {
                        name: "currency".to_string(),
                        argument: Some(Box::new(Expression::Literal(Literal::String(
                            "EUR".to_string()
                        )))),
                    },
                    PipeStep::Default(Literal::String("n/a".to_string())),
                ],
            }
        );
    }

    #[test]
    fn test_parenthesized_pipe_inside_ternary() {
        let expr = parse("ok ? (name | upper) : 'none'");
        assert!(matches!(expr, Expression::Conditional { ref then_branch, .. }
            if matches!(**then_branch, Expression::Pipe { .. })));
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(
            parse("-x * 2"),
            Expression::binary(
                BinaryOperator::Multiply,
                Expression::unary(UnaryOperator::Negate, ident("x")),
                number(2.0),
            )
        );
    }

    #[test]
    fn test_chained_comparison_leaves_input() {
        let tokens = tokenize("a < b < c").unwrap();
        let (pos, _) = parse_expression().parse(&tokens, 0).unwrap();
        assert_ne!(tokens[pos], Token::End);
    }

    #[test]
    fn test_unclosed_paren_fails() {
        let tokens = tokenize("(a + b").unwrap();
        assert!(parse_expression().parse(&tokens, 0).is_err());
    }
}
