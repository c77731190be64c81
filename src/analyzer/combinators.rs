use super::core::ParseError;
use super::core::ParseResult;
use super::core::Parser;
use std::fmt;
use std::marker::PhantomData;

// Equal: consumes one item equal to `value`
#[derive(Clone)]
pub struct Equal<I> {
    value: I,
}

impl<I> Equal<I> {
    pub fn new(value: I) -> Self {
        Self { value }
    }
}

impl<I: Clone + PartialEq + fmt::Display> Parser<I, I> for Equal<I> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<I> {
        match input.get(pos) {
            Some(found) if *found == self.value => Ok((pos + 1, found.clone())),
            Some(found) => Err(ParseError::Unexpected {
                expected: format!("'{}'", self.value),
                found: format!("'{}'", found),
                position: pos,
            }),
            None => Err(ParseError::EOF),
        }
    }
}

// Satisfy: consumes one item when `f` maps it to Some
#[derive(Clone)]
pub struct Satisfy<I, O, F> {
    f: F,
    expected: &'static str,
    _phantom: PhantomData<(I, O)>,
}

impl<I, O, F> Satisfy<I, O, F> {
    pub fn new(f: F, expected: &'static str) -> Self {
        Self {
            f,
            expected,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, F> Parser<I, O> for Satisfy<I, O, F>
where
    I: fmt::Display,
    F: Fn(&I) -> Option<O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        let found = input.get(pos).ok_or(ParseError::EOF)?;
        (self.f)(found)
            .map(|result| (pos + 1, result))
            .ok_or_else(|| ParseError::Unexpected {
                expected: self.expected.to_string(),
                found: format!("'{}'", found),
                position: pos,
            })
    }
}

// Choice: first alternative that succeeds; otherwise the last failure
pub struct Choice<I, O> {
    parsers: Vec<Box<dyn Parser<I, O>>>,
}

impl<I, O> Choice<I, O> {
    pub fn new(parsers: Vec<Box<dyn Parser<I, O>>>) -> Self {
        Self { parsers }
    }
}

impl<I, O> Parser<I, O> for Choice<I, O> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        let mut last_error = ParseError::NoAlternative;
        for parser in &self.parsers {
            match parser.parse(input, pos) {
                Ok(result) => return Ok(result),
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }
}

// Preceded: runs both, keeps the second output
#[derive(Clone)]
pub struct Preceded<P1, P2, O1> {
    parser1: P1,
    parser2: P2,
    _phantom: PhantomData<O1>,
}

impl<P1, P2, O1> Preceded<P1, P2, O1> {
    pub fn new(parser1: P1, parser2: P2) -> Self {
        Self {
            parser1,
            parser2,
            _phantom: PhantomData,
        }
    }
}

impl<I, O1, O2, P1, P2> Parser<I, O2> for Preceded<P1, P2, O1>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O2> {
        let (pos, _) = self.parser1.parse(input, pos)?;
        self.parser2.parse(input, pos)
    }
}

// Pair: runs both, keeps both outputs
#[derive(Clone)]
pub struct Pair<P1, P2> {
    parser1: P1,
    parser2: P2,
}

impl<P1, P2> Pair<P1, P2> {
    pub fn new(parser1: P1, parser2: P2) -> Self {
        Self { parser1, parser2 }
    }
}

impl<I, O1, O2, P1, P2> Parser<I, (O1, O2)> for Pair<P1, P2>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<(O1, O2)> {
        let (pos, first) = self.parser1.parse(input, pos)?;
        let (pos, second) = self.parser2.parse(input, pos)?;
        Ok((pos, (first, second)))
    }
}

#[derive(Clone)]
pub struct Map<P, F, A> {
    parser: P,
    f: F,
    _phantom: PhantomData<A>,
}

impl<P, F, A> Map<P, F, A> {
    pub fn new(parser: P, f: F) -> Self {
        Self {
            parser,
            f,
            _phantom: PhantomData,
        }
    }
}

impl<I, A, B, P, F> Parser<I, B> for Map<P, F, A>
where
    P: Parser<I, A>,
    F: Fn(A) -> B,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<B> {
        self.parser
            .parse(input, pos)
            .map(|(pos, value)| (pos, (self.f)(value)))
    }
}

// Many: zero or more repetitions, never fails
#[derive(Clone)]
pub struct Many<P> {
    parser: P,
}

impl<P> Many<P> {
    pub fn new(parser: P) -> Self {
        Self { parser }
    }
}

impl<I, O, P> Parser<I, Vec<O>> for Many<P>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<Vec<O>> {
        let mut results = Vec::new();
        let mut current_pos = pos;

        while let Ok((new_pos, value)) = self.parser.parse(input, current_pos) {
            results.push(value);
            current_pos = new_pos;
        }

        Ok((current_pos, results))
    }
}

// Optional: backtracks to `pos` on failure
#[derive(Clone)]
pub struct Optional<P> {
    parser: P,
}

impl<P> Optional<P> {
    pub fn new(parser: P) -> Self {
        Self { parser }
    }
}

impl<I, O, P> Parser<I, Option<O>> for Optional<P>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<Option<O>> {
        match self.parser.parse(input, pos) {
            Ok((new_pos, value)) => Ok((new_pos, Some(value))),
            Err(_) => Ok((pos, None)),
        }
    }
}

#[derive(Clone)]
pub struct Delimited<L, P, R, OL, OR> {
    left: L,
    parser: P,
    right: R,
    _phantom: PhantomData<(OL, OR)>,
}

impl<L, P, R, OL, OR> Delimited<L, P, R, OL, OR> {
    pub fn new(left: L, parser: P, right: R) -> Self {
        Self {
            left,
            parser,
            right,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, OL, OR, L, P, R> Parser<I, O> for Delimited<L, P, R, OL, OR>
where
    L: Parser<I, OL>,
    P: Parser<I, O>,
    R: Parser<I, OR>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        let (pos, _) = self.left.parse(input, pos)?;
        let (pos, value) = self.parser.parse(input, pos)?;
        let (pos, _) = self.right.parse(input, pos)?;
        Ok((pos, value))
    }
}

#[derive(Clone)]
pub struct WithContext<P, C> {
    parser: P,
    context: C,
}

impl<P, C> WithContext<P, C> {
    pub fn new(parser: P, context: C) -> Self {
        Self { parser, context }
    }
}

impl<I, O, P, C: ToString> Parser<I, O> for WithContext<P, C>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        self.parser
            .parse(input, pos)
            .map_err(|e| ParseError::WithContext {
                message: self.context.to_string(),
                inner: Box::new(e),
            })
    }
}

// Lazy: builds the parser on use, which allows recursive grammars
#[derive(Clone)]
pub struct Lazy<F> {
    f: F,
}

impl<F> Lazy<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<I, O, F, P> Parser<I, O> for Lazy<F>
where
    F: Fn() -> P,
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        (self.f)().parse(input, pos)
    }
}
