//! Bounded arithmetic expressions over pattern values.
//!
//! Widths, bounds, masks and variable domains may be written as small
//! integer expressions: `<max_ports> * 2`, `OFPVID_PRESENT | <vid>`,
//! `(1 << 12) - 1`. Parsing caps input length and nesting depth, and
//! evaluation runs in the checked [`ValueRange`] domain, so neither step
//! can allocate or recurse without bound.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::interval::ValueRange;
use crate::model::{Link, VariableId};
use crate::value;

/// Longest expression text accepted.
pub const MAX_EXPR_LEN: usize = 256;
/// Deepest parenthesis/operator nesting accepted.
pub const MAX_EXPR_DEPTH: usize = 16;

/// Whether compound expressions are evaluated or refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionPolicy {
    #[default]
    Evaluate,
    Reject,
}

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
        }
    }
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    Lit(u128),
    Var(Link<VariableId>),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

/// Errors raised while parsing expression text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    #[error("expression is empty")]
    Empty,

    #[error("expression longer than {MAX_EXPR_LEN} characters")]
    TooLong,

    #[error("expression nested deeper than {MAX_EXPR_DEPTH} levels")]
    TooDeep,

    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unknown name '{0}' (variables are written as <name>)")]
    UnknownName(String),

    #[error("unterminated variable reference")]
    UnterminatedVariable,
}

/// Errors raised while evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("arithmetic overflow")]
    Overflow,

    #[error("result may be negative")]
    Negative,

    #[error("division by zero")]
    DivideByZero,

    #[error("variable <{0}> is unresolved")]
    Unresolved(String),

    #[error("variable <{0}> has a symbolic domain")]
    Symbolic(String),

    #[error("variable <{0}> is part of a reference cycle")]
    Cyclic(String),
}

impl Expr {
    /// Parse expression text.
    pub fn parse(text: &str) -> Result<Expr, ExprError> {
        if text.len() > MAX_EXPR_LEN {
            return Err(ExprError::TooLong);
        }
        let tokens = tokenize(text)?;
        if tokens.is_empty() {
            return Err(ExprError::Empty);
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.parse_or()?;
        match parser.peek() {
            None => Ok(expr),
            Some(tok) => Err(ExprError::UnexpectedToken(tok.to_string())),
        }
    }

    /// A bare literal or a single variable reference.
    pub fn is_simple(&self) -> bool {
        matches!(self, Expr::Lit(_) | Expr::Var(_))
    }

    /// The literal value, if this expression is one.
    pub fn as_literal(&self) -> Option<u128> {
        match self {
            Expr::Lit(v) => Some(*v),
            _ => None,
        }
    }

    /// All variable references, left to right.
    pub fn variables(&self) -> Vec<&Link<VariableId>> {
        let mut out = Vec::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars<'a>(&'a self, out: &mut Vec<&'a Link<VariableId>>) {
        match self {
            Expr::Lit(_) => {}
            Expr::Var(link) => out.push(link),
            Expr::Neg(inner) => inner.collect_vars(out),
            Expr::Binary(_, l, r) => {
                l.collect_vars(out);
                r.collect_vars(out);
            }
        }
    }

    /// Visit every variable reference mutably.
    pub fn for_each_var_mut(&mut self, f: &mut impl FnMut(&mut Link<VariableId>)) {
        match self {
            Expr::Lit(_) => {}
            Expr::Var(link) => f(link),
            Expr::Neg(inner) => inner.for_each_var_mut(f),
            Expr::Binary(_, l, r) => {
                l.for_each_var_mut(f);
                r.for_each_var_mut(f);
            }
        }
    }

    /// Evaluate in the interval domain. `lookup` supplies the range of
    /// each referenced variable.
    pub fn eval<F>(&self, lookup: &F) -> Result<ValueRange, EvalError>
    where
        F: Fn(&Link<VariableId>) -> Result<ValueRange, EvalError>,
    {
        match self {
            Expr::Lit(v) => Ok(ValueRange::point(*v)),
            Expr::Var(link) => lookup(link),
            Expr::Neg(inner) => {
                let v = inner.eval(lookup)?;
                if v == ValueRange::point(0) {
                    Ok(v)
                } else {
                    Err(EvalError::Negative)
                }
            }
            Expr::Binary(op, l, r) => {
                let a = l.eval(lookup)?;
                let b = r.eval(lookup)?;
                match op {
                    BinaryOp::Add => a.add(&b),
                    BinaryOp::Sub => a.sub(&b),
                    BinaryOp::Mul => a.mul(&b),
                    BinaryOp::Div => a.div(&b),
                    BinaryOp::Rem => a.rem(&b),
                    BinaryOp::Shl => a.shl(&b),
                    BinaryOp::Shr => a.shr(&b),
                    BinaryOp::And => Ok(a.and(&b)),
                    BinaryOp::Or => Ok(a.or_xor(&b, false)),
                    BinaryOp::Xor => Ok(a.or_xor(&b, true)),
                }
            }
        }
    }

    /// Evaluate an expression that has no variable references.
    pub fn eval_constant(&self) -> Result<ValueRange, EvalError> {
        self.eval(&|link: &Link<VariableId>| Err(EvalError::Unresolved(link.name.clone())))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Lit(v) => write!(f, "{v}"),
            Expr::Var(link) => write!(f, "<{}>", link.name),
            Expr::Neg(inner) => write!(f, "-({inner})"),
            Expr::Binary(op, l, r) => write!(f, "({l} {} {r})", op.symbol()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Num(u128),
    Var(String),
    Name(String),
    Op(&'static str),
    Open,
    Close,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Num(v) => write!(f, "{v}"),
            Token::Var(n) => write!(f, "<{n}>"),
            Token::Name(n) => f.write_str(n),
            Token::Op(op) => f.write_str(op),
            Token::Open => f.write_str("("),
            Token::Close => f.write_str(")"),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '<' if chars.get(i + 1) == Some(&'<') => {
                tokens.push(Token::Op("<<"));
                i += 2;
            }
            '>' if chars.get(i + 1) == Some(&'>') => {
                tokens.push(Token::Op(">>"));
                i += 2;
            }
            '<' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == '>')
                    .ok_or(ExprError::UnterminatedVariable)?;
                let name: String = chars[i + 1..i + 1 + end].iter().collect();
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(ExprError::UnexpectedToken("<>".into()));
                }
                tokens.push(Token::Var(name));
                i += end + 2;
            }
            '+' | '-' | '*' | '/' | '%' | '&' | '|' | '^' => {
                let op = match c {
                    '+' => "+",
                    '-' => "-",
                    '*' => "*",
                    '/' => "/",
                    '%' => "%",
                    '&' => "&",
                    '|' => "|",
                    _ => "^",
                };
                tokens.push(Token::Op(op));
                i += 1;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let value =
                    value::parse_integer(&word).ok_or_else(|| ExprError::InvalidNumber(word))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Name(chars[start..i].iter().collect()));
            }
            other => return Err(ExprError::UnexpectedChar(other)),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn enter(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_EXPR_DEPTH {
            return Err(ExprError::TooDeep);
        }
        Ok(())
    }

    fn binary_level(
        &mut self,
        ops: &[&'static str],
        next: fn(&mut Parser) -> Result<Expr, ExprError>,
    ) -> Result<Expr, ExprError> {
        let mut lhs = next(self)?;
        while let Some(op) = self.eat_op(ops) {
            let rhs = next(self)?;
            lhs = Expr::Binary(op_from_symbol(op), Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&["|"], Parser::parse_xor)
    }

    fn parse_xor(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&["^"], Parser::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&["&"], Parser::parse_shift)
    }

    fn parse_shift(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&["<<", ">>"], Parser::parse_additive)
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&["+", "-"], Parser::parse_term)
    }

    fn parse_term(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&["*", "/", "%"], Parser::parse_unary)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat_op(&["-"]).is_some() {
            self.enter()?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        if self.eat_op(&["+"]).is_some() {
            return self.parse_unary();
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expr, ExprError> {
        match self.next() {
            Some(Token::Num(v)) => Ok(Expr::Lit(v)),
            Some(Token::Var(name)) => Ok(Expr::Var(Link::new(name))),
            Some(Token::Name(name)) => value::named_constant(&name)
                .map(Expr::Lit)
                .ok_or(ExprError::UnknownName(name)),
            Some(Token::Open) => {
                self.enter()?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    Some(tok) => Err(ExprError::UnexpectedToken(tok.to_string())),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            Some(tok) => Err(ExprError::UnexpectedToken(tok.to_string())),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

fn op_from_symbol(op: &str) -> BinaryOp {
    match op {
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "%" => BinaryOp::Rem,
        "<<" => BinaryOp::Shl,
        ">>" => BinaryOp::Shr,
        "&" => BinaryOp::And,
        "|" => BinaryOp::Or,
        _ => BinaryOp::Xor,
    }
}
