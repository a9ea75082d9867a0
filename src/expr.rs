//! Capacity/Count Expressions
//!
//! Evaluates the small arithmetic expressions used for sheet capacities and
//! field element counts. The grammar is deliberately closed:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := NUMBER | IDENT | '(' expr ')' | '-' factor
//! ```
//!
//! Identifiers are looked up in an explicit [`ConstantScope`]; there is no other
//! way for an expression to reach anything outside itself.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ExpressionError;

/// Deepest nesting of `(` and unary `-` the evaluator accepts
const MAX_DEPTH: usize = 64;

// =============================================================================
// Constant Scope
// =============================================================================

/// Named constants visible to expressions of one schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantScope {
    values: BTreeMap<String, f64>,
}

impl ConstantScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) a constant
    pub fn define(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for ConstantScope {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut scope = Self::new();
        for (name, value) in iter {
            scope.define(name, value);
        }
        scope
    }
}

// =============================================================================
// Expression source (as written in a schema)
// =============================================================================

/// An expression as it appears in a schema document: a bare number or a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expr {
    Number(f64),
    Text(String),
}

impl Expr {
    /// Evaluate to a float
    pub fn evaluate(&self, scope: &ConstantScope) -> Result<f64, ExpressionError> {
        match self {
            Expr::Number(n) if n.is_finite() => Ok(*n),
            Expr::Number(_) => Err(ExpressionError::NotFinite),
            Expr::Text(text) => evaluate(text, scope),
        }
    }

    /// Evaluate to a non-negative count, truncated to 32 bits
    pub fn resolve_count(&self, scope: &ConstantScope) -> Result<u32, ExpressionError> {
        let value = self.evaluate(scope)?;
        let truncated = truncate_i32(value);
        if truncated < 0 {
            return Err(ExpressionError::Negative(truncated));
        }
        Ok(truncated as u32)
    }
}

impl From<&str> for Expr {
    fn from(text: &str) -> Self {
        Expr::Text(text.to_string())
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Number(value)
    }
}

/// Evaluate an expression string against a scope
pub fn evaluate(text: &str, scope: &ConstantScope) -> Result<f64, ExpressionError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
        scope,
    };
    let value = parser.expr()?;
    if let Some(token) = parser.peek() {
        return Err(ExpressionError::UnexpectedToken {
            found: token.kind.to_string(),
            position: token.position,
        });
    }
    if !value.is_finite() {
        return Err(ExpressionError::NotFinite);
    }
    Ok(value)
}

/// Truncate toward zero and wrap into 32 bits
fn truncate_i32(value: f64) -> i32 {
    let truncated = value.trunc();
    (truncated.rem_euclid(4_294_967_296.0) as u64 as u32) as i32
}

// =============================================================================
// Tokenizer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::Ident(name) => write!(f, "{}", name),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    position: usize,
}

fn tokenize(text: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        let kind = match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
                continue;
            }
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            c if c.is_ascii_digit() || c == '.' => {
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal.parse::<f64>().map_err(|_| ExpressionError::UnexpectedToken {
                    found: literal.clone(),
                    position: start,
                })?;
                tokens.push(Token {
                    kind: TokenKind::Number(value),
                    position: start,
                });
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(chars[start..i].iter().collect()),
                    position: start,
                });
                continue;
            }
            other => {
                return Err(ExpressionError::UnexpectedCharacter {
                    found: other,
                    position: start,
                })
            }
        };
        tokens.push(Token { kind, position: start });
        i += 1;
    }

    Ok(tokens)
}

// =============================================================================
// Recursive-descent evaluator
// =============================================================================

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    scope: &'a ConstantScope,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Run `inner` one nesting level deeper, rejecting `token` past [`MAX_DEPTH`]
    fn nested<T>(
        &mut self,
        token: &Token,
        inner: impl FnOnce(&mut Self) -> Result<T, ExpressionError>,
    ) -> Result<T, ExpressionError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExpressionError::UnexpectedToken {
                found: token.kind.to_string(),
                position: token.position,
            });
        }
        self.depth += 1;
        let result = inner(self);
        self.depth -= 1;
        result
    }

    fn expr(&mut self) -> Result<f64, ExpressionError> {
        let mut value = self.term()?;
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Plus => {
                    self.pos += 1;
                    value += self.term()?;
                }
                TokenKind::Minus => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, ExpressionError> {
        let mut value = self.factor()?;
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Star => {
                    self.pos += 1;
                    value *= self.factor()?;
                }
                TokenKind::Slash => {
                    self.pos += 1;
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err(ExpressionError::DivisionByZero);
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<f64, ExpressionError> {
        let token = self.next().ok_or(ExpressionError::UnexpectedEnd)?;
        match &token.kind {
            TokenKind::Number(n) => Ok(*n),
            TokenKind::Ident(name) => self
                .scope
                .get(name)
                .ok_or_else(|| ExpressionError::UndefinedConstant(name.clone())),
            TokenKind::Minus => Ok(-self.nested(token, Self::factor)?),
            TokenKind::LParen => {
                let value = self.nested(token, Self::expr)?;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(value),
                    Some(other) => Err(ExpressionError::UnexpectedToken {
                        found: other.kind.to_string(),
                        position: other.position,
                    }),
                    None => Err(ExpressionError::UnexpectedEnd),
                }
            }
            other => Err(ExpressionError::UnexpectedToken {
                found: other.to_string(),
                position: token.position,
            }),
        }
    }
}
