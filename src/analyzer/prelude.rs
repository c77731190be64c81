use std::fmt;

use super::combinators::*;
use super::core::Parser;

pub fn equal<I: Clone + PartialEq + fmt::Display>(value: I) -> Equal<I> {
    Equal::new(value)
}

pub fn satisfy<I: fmt::Display, O, F>(f: F, expected: &'static str) -> Satisfy<I, O, F>
where
    F: Fn(&I) -> Option<O>,
{
    Satisfy::new(f, expected)
}

pub fn choice<I, O>(parsers: Vec<Box<dyn Parser<I, O>>>) -> Choice<I, O> {
    Choice::new(parsers)
}

pub fn preceded<P1, P2, I, O1, O2>(parser1: P1, parser2: P2) -> Preceded<P1, P2, O1>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
{
    Preceded::new(parser1, parser2)
}

pub fn pair<P1, P2, I, O1, O2>(parser1: P1, parser2: P2) -> Pair<P1, P2>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
{
    Pair::new(parser1, parser2)
}

pub fn map<P, F, I, A, B>(parser: P, f: F) -> Map<P, F, A>
where
    P: Parser<I, A>,
    F: Fn(A) -> B,
{
    Map::new(parser, f)
}

pub fn many<P, I, O>(parser: P) -> Many<P>
where
    P: Parser<I, O>,
{
    Many::new(parser)
}

pub fn optional<P, I, O>(parser: P) -> Optional<P>
where
    P: Parser<I, O>,
{
    Optional::new(parser)
}

pub fn delimited<L, P, R, I, O, OL, OR>(left: L, parser: P, right: R) -> Delimited<L, P, R, OL, OR>
where
    L: Parser<I, OL>,
    P: Parser<I, O>,
    R: Parser<I, OR>,
{
    Delimited::new(left, parser, right)
}

pub fn with_context<P, I, O, C: ToString>(parser: P, context: C) -> WithContext<P, C>
where
    P: Parser<I, O>,
{
    WithContext::new(parser, context)
}

pub fn lazy<F, P, I, O>(f: F) -> Lazy<F>
where
    F: Fn() -> P,
    P: Parser<I, O>,
{
    Lazy::new(f)
}

/// Erases a parser's type. Recursive rules must go through a box.
pub fn boxed<P, I, O>(parser: P) -> Box<dyn Parser<I, O>>
where
    P: Parser<I, O> + 'static,
{
    Box::new(parser)
}
