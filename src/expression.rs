//! Scenario result formulas.
//!
//! A formula is a closed arithmetic expression over the scenario's
//! variable names, e.g. `price * quantity - (fixed_cost + 10)`. It is
//! tokenized with logos, parsed by a Pratt parser into an [`Expr`] tree,
//! and evaluated against one iteration's [`Bindings`]. Nothing outside
//! the bindings is reachable from a formula.
//!
//! ## Grammar (lowest to highest precedence)
//!
//! 1. `+`, `-` - left associative
//! 2. `*`, `/` - left associative
//! 3. `^` - right associative
//! 4. Unary `-`, `+` - prefix
//! 5. Atoms: number literals, variable names, `( expr )`
//!
//! ## Fallback
//!
//! [`Evaluator::evaluate`] never fails. If the formula does not parse, or
//! an iteration's evaluation faults (unknown variable, division by zero,
//! non-finite result), that iteration's outcome is the [`additive_sum`] of
//! the sampled values. The fallback is deterministic: a given malformed
//! formula always degrades the same way.

use std::ops::Range;

use indexmap::IndexMap;
use logos::Logos;
use thiserror::Error;

/// One iteration's sampled values, keyed by variable name in scenario order.
pub type Bindings = IndexMap<String, f64>;

/// Errors from parsing or evaluating a formula.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,

    #[error("unrecognized input at offset {offset}")]
    Lex { offset: usize },

    #[error("expected {expected} at offset {offset}, found '{found}'")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        offset: usize,
    },

    #[error("expected {expected}, found end of formula")]
    UnexpectedEnd { expected: &'static str },

    #[error("unexpected trailing input at offset {offset}")]
    TrailingInput { offset: usize },

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("formula evaluated to a non-finite value ({0})")]
    NonFinite(f64),

    #[error("formula nests deeper than {limit} levels")]
    TooDeep { limit: usize },
}

// ============================================================================
// Lexer
// ============================================================================

/// Formula token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    #[regex(
        r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?|\.[0-9]+([eE][+-]?[0-9]+)?",
        |lex| lex.slice().parse::<f64>().ok()
    )]
    Number(f64),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("^")]
    Caret,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Ident(s) => f.write_str(s),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Caret => f.write_str("^"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
        }
    }
}

/// Tokenizes `source`, pairing each token with its byte span.
pub fn tokenize(source: &str) -> Result<Vec<(Token, Range<usize>)>, FormulaError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => {
                return Err(FormulaError::Lex {
                    offset: lexer.span().start,
                })
            }
        }
    }
    Ok(tokens)
}

// ============================================================================
// AST
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Parsed formula expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Evaluates the expression over `bindings`.
    pub fn eval(&self, bindings: &Bindings) -> Result<f64, FormulaError> {
        match self {
            Expr::Number(n) => Ok(*n),
            Expr::Variable(name) => bindings
                .get(name)
                .copied()
                .ok_or_else(|| FormulaError::UnknownVariable(name.clone())),
            Expr::Unary { op, operand } => {
                let v = operand.eval(bindings)?;
                Ok(match op {
                    UnaryOp::Neg => -v,
                    UnaryOp::Plus => v,
                })
            }
            Expr::Binary { op, left, right } => {
                let l = left.eval(bindings)?;
                let r = right.eval(bindings)?;
                match op {
                    BinaryOp::Add => Ok(l + r),
                    BinaryOp::Sub => Ok(l - r),
                    BinaryOp::Mul => Ok(l * r),
                    BinaryOp::Div => {
                        if r == 0.0 {
                            Err(FormulaError::DivisionByZero)
                        } else {
                            Ok(l / r)
                        }
                    }
                    BinaryOp::Pow => Ok(l.powf(r)),
                }
            }
        }
    }

    fn collect_variables<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Variable(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Unary { operand, .. } => operand.collect_variables(out),
            Expr::Binary { left, right, .. } => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
        }
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Deepest accepted nesting, counted both as parser recursion and as
/// height of the resulting tree. Evaluation recurses over the tree, so
/// this also bounds its stack use.
pub const MAX_DEPTH: usize = 256;

/// Token cursor for the hand-written parser.
struct TokenStream<'src> {
    tokens: &'src [(Token, Range<usize>)],
    pos: usize,
    depth: usize,
}

impl<'src> TokenStream<'src> {
    fn new(tokens: &'src [(Token, Range<usize>)]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn enter(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::TooDeep { limit: MAX_DEPTH });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn peek(&self) -> Option<&'src Token> {
        self.tokens.get(self.pos).map(|(tok, _)| tok)
    }

    fn advance(&mut self) -> Option<&'src Token> {
        let token = self.tokens.get(self.pos).map(|(tok, _)| tok);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| span.start)
            .unwrap_or_else(|| self.tokens.last().map(|(_, s)| s.end).unwrap_or(0))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn unexpected(&self, expected: &'static str) -> FormulaError {
        match self.peek() {
            Some(token) => FormulaError::UnexpectedToken {
                found: token.to_string(),
                expected,
                offset: self.offset(),
            },
            None => FormulaError::UnexpectedEnd { expected },
        }
    }
}

/// Left-associative binary operators: (precedence, op).
///
/// `^` is not listed; it binds tighter than unary minus and is handled
/// in [`parse_power`].
fn binary_op_info(token: &Token) -> Option<(u8, BinaryOp)> {
    match token {
        Token::Plus => Some((10, BinaryOp::Add)),
        Token::Minus => Some((10, BinaryOp::Sub)),
        Token::Star => Some((20, BinaryOp::Mul)),
        Token::Slash => Some((20, BinaryOp::Div)),
        _ => None,
    }
}

/// A parsed subtree and its height.
type Parsed = (Expr, usize);

fn checked_height(height: usize) -> Result<usize, FormulaError> {
    if height > MAX_DEPTH {
        return Err(FormulaError::TooDeep { limit: MAX_DEPTH });
    }
    Ok(height)
}

fn parse_pratt(stream: &mut TokenStream, min_prec: u8) -> Result<Parsed, FormulaError> {
    let (mut left, mut height) = parse_prefix(stream)?;

    while let Some(token) = stream.peek() {
        let Some((prec, op)) = binary_op_info(token) else {
            break;
        };
        if prec < min_prec {
            break;
        }
        stream.advance();

        let (right, right_height) = parse_pratt(stream, prec + 1)?;
        height = checked_height(height.max(right_height) + 1)?;
        left = Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
    }

    Ok((left, height))
}

/// Unary prefix binds looser than `^`, so `-2^2` is `-(2^2)`.
/// Chained powers recurse through here, making `^` right associative.
///
/// Every recursive path of the grammar passes through this function, so
/// the nesting guard lives here.
fn parse_prefix(stream: &mut TokenStream) -> Result<Parsed, FormulaError> {
    stream.enter()?;
    let parsed = parse_prefix_inner(stream);
    stream.leave();
    parsed
}

fn parse_prefix_inner(stream: &mut TokenStream) -> Result<Parsed, FormulaError> {
    let op = match stream.peek() {
        Some(Token::Minus) => UnaryOp::Neg,
        Some(Token::Plus) => UnaryOp::Plus,
        _ => return parse_power(stream),
    };
    stream.advance();
    let (operand, height) = parse_prefix(stream)?;
    Ok((
        Expr::Unary {
            op,
            operand: Box::new(operand),
        },
        checked_height(height + 1)?,
    ))
}

fn parse_power(stream: &mut TokenStream) -> Result<Parsed, FormulaError> {
    let (base, base_height) = parse_atom(stream)?;
    if matches!(stream.peek(), Some(Token::Caret)) {
        stream.advance();
        // Right operand may carry its own sign: 2^-1.
        let (exponent, exp_height) = parse_prefix(stream)?;
        let expr = Expr::Binary {
            op: BinaryOp::Pow,
            left: Box::new(base),
            right: Box::new(exponent),
        };
        return Ok((expr, checked_height(base_height.max(exp_height) + 1)?));
    }
    Ok((base, base_height))
}

fn parse_atom(stream: &mut TokenStream) -> Result<Parsed, FormulaError> {
    match stream.peek() {
        Some(Token::Number(n)) => {
            stream.advance();
            Ok((Expr::Number(*n), 1))
        }
        Some(Token::Ident(name)) => {
            stream.advance();
            Ok((Expr::Variable(name.clone()), 1))
        }
        Some(Token::LParen) => {
            stream.advance();
            let inner = parse_pratt(stream, 0)?;
            match stream.peek() {
                Some(Token::RParen) => {
                    stream.advance();
                    Ok(inner)
                }
                _ => Err(stream.unexpected("')'")),
            }
        }
        _ => Err(stream.unexpected("number, variable or '('")),
    }
}

// ============================================================================
// Formula
// ============================================================================

/// A parsed formula, reusable across iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    /// Parses `source`.
    ///
    /// # Errors
    /// Returns the first lexical or syntax error.
    ///
    /// # Examples
    /// ```
    /// use u_montecarlo::expression::{Bindings, Formula};
    /// let f = Formula::parse("a + b * 2").unwrap();
    /// let vars = Bindings::from([("a".to_string(), 1.0), ("b".to_string(), 3.0)]);
    /// assert_eq!(f.eval(&vars), Ok(7.0));
    /// ```
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(FormulaError::Empty);
        }
        let mut stream = TokenStream::new(&tokens);
        let (expr, _) = parse_pratt(&mut stream, 0)?;
        if !stream.at_end() {
            return Err(FormulaError::TrailingInput {
                offset: stream.offset(),
            });
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Variable names referenced by the formula, in first-use order.
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.expr.collect_variables(&mut out);
        out
    }

    /// Evaluates over `bindings`; a non-finite result is an error.
    pub fn eval(&self, bindings: &Bindings) -> Result<f64, FormulaError> {
        let value = self.expr.eval(bindings)?;
        if !value.is_finite() {
            return Err(FormulaError::NonFinite(value));
        }
        Ok(value)
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Per-scenario outcome function, compiled once and applied every iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluator {
    /// No formula: outcome is the sum of sampled values.
    Sum,
    Formula(Formula),
    /// The formula did not parse; every iteration uses the sum.
    Invalid {
        source: String,
        error: FormulaError,
    },
}

impl Evaluator {
    /// Compiles an optional formula. Absent or blank means [`Evaluator::Sum`].
    pub fn compile(formula: Option<&str>) -> Self {
        let Some(source) = formula.map(str::trim).filter(|s| !s.is_empty()) else {
            return Evaluator::Sum;
        };
        match Formula::parse(source) {
            Ok(f) => Evaluator::Formula(f),
            Err(error) => Evaluator::Invalid {
                source: source.to_string(),
                error,
            },
        }
    }

    /// Evaluates one iteration, surfacing formula errors.
    pub fn try_evaluate(&self, bindings: &Bindings) -> Result<f64, FormulaError> {
        match self {
            Evaluator::Sum => Ok(additive_sum(bindings)),
            Evaluator::Formula(f) => f.eval(bindings),
            Evaluator::Invalid { error, .. } => Err(error.clone()),
        }
    }

    /// Evaluates one iteration, falling back to the additive sum on any error.
    pub fn evaluate(&self, bindings: &Bindings) -> f64 {
        self.evaluate_or_sum(bindings).0
    }

    /// Like [`Evaluator::evaluate`], also reporting whether a compiled
    /// formula faulted on this iteration.
    pub fn evaluate_or_sum(&self, bindings: &Bindings) -> (f64, bool) {
        match self {
            Evaluator::Sum | Evaluator::Invalid { .. } => (additive_sum(bindings), false),
            Evaluator::Formula(f) => match f.eval(bindings) {
                Ok(v) => (v, false),
                Err(error) => {
                    tracing::trace!(formula = f.source(), %error, "formula fault, using sum");
                    (additive_sum(bindings), true)
                }
            },
        }
    }
}

/// One-shot evaluation of an optional formula with sum fallback.
///
/// # Examples
/// ```
/// use u_montecarlo::expression::{evaluate, Bindings};
/// let vars = Bindings::from([("a".to_string(), 5.0), ("b".to_string(), 3.0)]);
/// assert_eq!(evaluate(Some("a * b"), &vars), 15.0);
/// assert_eq!(evaluate(Some("a +* b"), &vars), 8.0);
/// assert_eq!(evaluate(None, &vars), 8.0);
/// ```
pub fn evaluate(formula: Option<&str>, bindings: &Bindings) -> f64 {
    Evaluator::compile(formula).evaluate(bindings)
}

/// Sum of all sampled values; non-finite values count as 0.
pub fn additive_sum(bindings: &Bindings) -> f64 {
    bindings
        .values()
        .map(|&v| if v.is_finite() { v } else { 0.0 })
        .sum()
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        #[test]
        fn no_formula_equals_sum(values in proptest::collection::vec(-1e6_f64..1e6, 0..20)) {
            let bindings: Bindings = values
                .iter()
                .enumerate()
                .map(|(i, v)| (format!("v{i}"), *v))
                .collect();
            let expected: f64 = values.iter().sum();
            prop_assert_eq!(evaluate(None, &bindings), expected);
        }

        #[test]
        fn evaluate_never_panics(source in "[a-c0-9+*/()^ .-]{0,24}", a in -10.0_f64..10.0) {
            let bindings = Bindings::from([("a".to_string(), a), ("b".to_string(), 1.0)]);
            let _ = evaluate(Some(source.as_str()), &bindings);
        }

        #[test]
        fn sum_formula_matches_default(a in -1e6_f64..1e6, b in -1e6_f64..1e6) {
            let bindings = Bindings::from([("a".to_string(), a), ("b".to_string(), b)]);
            prop_assert_eq!(evaluate(Some("a + b"), &bindings), evaluate(None, &bindings));
        }
    }
}
