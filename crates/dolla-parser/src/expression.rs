// File: src/expression.rs
// Purpose: Compile translated conditions into predicates and evaluate them

use crate::context::Context;
use crate::error::{DirectiveError, EvalError, EvalResult};
use crate::value::Value;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::warn;

static EMPTY: Lazy<Context> = Lazy::new(Context::new);

/// Deepest nesting of parentheses, prefix operators and operator chains a
/// condition may have; keeps parsing, evaluation and drop off the stack limit
const MAX_DEPTH: usize = 256;

/// What a reference to an absent input or variable evaluates to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingReference {
    /// Fault with `EvalError::UnresolvedReference`
    #[default]
    Fail,
    /// Evaluate as `null`
    Null,
}

/// Bindings a predicate is evaluated against
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    input: &'a Context,
    variables: &'a Context,
    missing: MissingReference,
}

impl<'a> Scope<'a> {
    pub fn new(input: &'a Context) -> Self {
        Self {
            input,
            variables: &EMPTY,
            missing: MissingReference::default(),
        }
    }

    /// Loop and local bindings, reached through `variables["name"]`
    pub fn with_variables(mut self, variables: &'a Context) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_missing_references(mut self, missing: MissingReference) -> Self {
        self.missing = missing;
        self
    }

    fn lookup(&self, scope: RefScope, name: &str) -> EvalResult<Value> {
        let bindings = match scope {
            RefScope::Input => self.input,
            RefScope::Variables => self.variables,
        };
        match (bindings.resolve(name), self.missing) {
            (Some(value), _) => Ok(value.clone()),
            (None, MissingReference::Null) => Ok(Value::Null),
            (None, MissingReference::Fail) => Err(EvalError::UnresolvedReference {
                scope: scope.as_str(),
                name: name.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefScope {
    Input,
    Variables,
}

impl RefScope {
    fn as_str(self) -> &'static str {
        match self {
            RefScope::Input => "input",
            RefScope::Variables => "variables",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    LooseEq,
    LooseNe,
    StrictEq,
    StrictNe,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::LooseEq => "==",
            BinaryOp::LooseNe => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNe => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }

    /// Binding power, higher binds tighter
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::LooseEq | BinaryOp::LooseNe | BinaryOp::StrictEq | BinaryOp::StrictNe => 3,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 6,
        }
    }

    fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "||" => BinaryOp::Or,
            "&&" => BinaryOp::And,
            "==" => BinaryOp::LooseEq,
            "!=" => BinaryOp::LooseNe,
            "===" => BinaryOp::StrictEq,
            "!==" => BinaryOp::StrictNe,
            "<" => BinaryOp::Lt,
            ">" => BinaryOp::Gt,
            "<=" => BinaryOp::Le,
            ">=" => BinaryOp::Ge,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            _ => return None,
        })
    }
}

/// Expression tree for the fixed condition grammar
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Reference { scope: RefScope, name: String },
    /// A bare word the translator left alone; always faults when evaluated
    Identifier(String),
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
}

/// A compiled condition, reusable across contexts
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    source: String,
    expr: Expr,
}

/// Compile a translated expression such as `input["x"] == 3`
pub fn compile(expression: &str) -> Result<Predicate, DirectiveError> {
    let tokens = lex(expression)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: expression.len(),
        depth: 0,
    };
    let expr = parser.parse_expression(0)?;
    if let Some((_, position)) = parser.tokens.get(parser.pos) {
        return Err(DirectiveError::parse("unexpected trailing input", *position));
    }
    Ok(Predicate {
        source: expression.to_string(),
        expr,
    })
}

impl Predicate {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Pure function: evaluate to the truthiness of the expression's value
    pub fn evaluate(&self, scope: &Scope<'_>) -> EvalResult<bool> {
        eval(&self.expr, scope).map(|value| value.to_bool())
    }

    /// Evaluate, degrading any fault to `false`
    pub fn test(&self, scope: &Scope<'_>) -> bool {
        match self.evaluate(scope) {
            Ok(result) => result,
            Err(err) => {
                warn!(condition = %self.source, error = %err, "condition evaluation failed");
                false
            }
        }
    }
}

fn eval(expr: &Expr, scope: &Scope<'_>) -> EvalResult<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Reference { scope: which, name } => scope.lookup(*which, name),
        Expr::Identifier(name) => Err(EvalError::UnknownIdentifier(name.clone())),
        Expr::Unary { op, operand } => {
            let value = eval(operand, scope)?;
            match (op, value) {
                (UnaryOp::Not, value) => Ok(Value::Bool(!value.to_bool())),
                (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
                (UnaryOp::Neg, other) => Err(EvalError::InvalidOperand {
                    op: "-",
                    operand: other.type_name(),
                }),
            }
        }
        Expr::Binary { op, left, right } => {
            let left = eval(left, scope)?;
            // && and || yield the deciding operand and skip the right side when possible
            match op {
                BinaryOp::And if !left.to_bool() => return Ok(left),
                BinaryOp::Or if left.to_bool() => return Ok(left),
                BinaryOp::And | BinaryOp::Or => return eval(right, scope),
                _ => {}
            }
            let right = eval(right, scope)?;
            apply_binary(*op, left, right)
        }
    }
}

fn apply_binary(op: BinaryOp, left: Value, right: Value) -> EvalResult<Value> {
    let mismatch = |left: &Value, right: &Value| EvalError::TypeMismatch {
        op: op.as_str(),
        left: left.type_name(),
        right: right.type_name(),
    };

    match op {
        BinaryOp::StrictEq => Ok(Value::Bool(left == right)),
        BinaryOp::StrictNe => Ok(Value::Bool(left != right)),
        BinaryOp::LooseEq => Ok(Value::Bool(loose_eq(&left, &right))),
        BinaryOp::LooseNe => Ok(Value::Bool(!loose_eq(&left, &right))),
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
            let ordering = compare(&left, &right).ok_or_else(|| mismatch(&left, &right))?;
            Ok(Value::Bool(match (op, ordering) {
                (_, None) => false,
                (BinaryOp::Lt, Some(o)) => o == Ordering::Less,
                (BinaryOp::Gt, Some(o)) => o == Ordering::Greater,
                (BinaryOp::Le, Some(o)) => o != Ordering::Greater,
                (_, Some(o)) => o != Ordering::Less,
            }))
        }
        BinaryOp::Add => match (&left, &right) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
            (Value::String(_), r) if !r.is_structured() => {
                Ok(Value::String(concat(&left, &right)))
            }
            (l, Value::String(_)) if !l.is_structured() => {
                Ok(Value::String(concat(&left, &right)))
            }
            _ => Err(mismatch(&left, &right)),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (Value::Number(l), Value::Number(r)) = (&left, &right) else {
                return Err(mismatch(&left, &right));
            };
            Ok(Value::Number(match op {
                BinaryOp::Sub => l - r,
                BinaryOp::Mul => l * r,
                BinaryOp::Div => l / r,
                _ => l % r,
            }))
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("logical operators short-circuit in eval"),
    }
}

/// String concatenation spells `null` out, unlike slot display
fn concat(left: &Value, right: &Value) -> String {
    let part = |value: &Value| match value {
        Value::Null => "null".to_string(),
        other => other.to_string(),
    };
    format!("{}{}", part(left), part(right))
}

/// Pure function: equality with coercion between numbers, numeric strings and bools
fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            string_to_number(s) == *n
        }
        (Value::Bool(b), other) | (other, Value::Bool(b)) if !matches!(other, Value::Bool(_)) => {
            loose_eq(&Value::Number(bool_to_number(*b)), other)
        }
        _ => left == right,
    }
}

/// Outer `None` is a type mismatch, inner `None` an unordered pair (NaN)
fn compare(left: &Value, right: &Value) -> Option<Option<Ordering>> {
    match (left, right) {
        (Value::String(l), Value::String(r)) => Some(Some(l.cmp(r))),
        _ => {
            let l = numeric(left)?;
            let r = numeric(right)?;
            Some(l.partial_cmp(&r))
        }
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Bool(b) => Some(bool_to_number(*b)),
        _ => None,
    }
}

fn bool_to_number(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Numeric value of a string under loose equality: decimal, `Infinity`,
/// or an unsigned `0x`/`0o`/`0b` integer; anything else is NaN
fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let radix = match trimmed.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &trimmed[2..];
        if !digits.chars().all(|c| c.is_digit(radix)) {
            return f64::NAN;
        }
        return u64::from_str_radix(digits, radix).map_or(f64::NAN, |n| n as f64);
    }

    let unsigned = trimmed.trim_start_matches(['+', '-']);
    if unsigned == "Infinity" && trimmed.len() - unsigned.len() <= 1 {
        return if trimmed.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    // Rust also accepts `inf` and `nan` spellings, so keep to the decimal alphabet
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return f64::NAN;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}

#[derive(Debug, Clone, PartialEq)]
enum Lexeme {
    Number(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    LBracket,
    RBracket,
}

const OPERATORS: [&str; 16] = [
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "<", ">", "+", "-", "*", "/", "%", "!",
];

fn lex(source: &str) -> Result<Vec<(Lexeme, usize)>, DirectiveError> {
    let mut out = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(i, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let single = match c {
            '(' => Some(Lexeme::LParen),
            ')' => Some(Lexeme::RParen),
            '[' => Some(Lexeme::LBracket),
            ']' => Some(Lexeme::RBracket),
            _ => None,
        };
        if let Some(lexeme) = single {
            chars.next();
            out.push((lexeme, i));
            continue;
        }

        if crate::symbols::is_string_delimiter(c) {
            chars.next();
            let rest = &source[i + c.len_utf8()..];
            let close = rest.find(c).ok_or(DirectiveError::UnterminatedLiteral {
                delimiter: c,
                position: i,
            })?;
            out.push((Lexeme::Str(rest[..close].to_string()), i));
            let resume = i + c.len_utf8() + close + c.len_utf8();
            while chars.peek().is_some_and(|&(j, _)| j < resume) {
                chars.next();
            }
            continue;
        }

        if c.is_ascii_digit() {
            let end = source[i..]
                .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
                .map_or(source.len(), |n| i + n);
            let number = source[i..end]
                .parse::<f64>()
                .map_err(|_| DirectiveError::parse(format!("invalid number `{}`", &source[i..end]), i))?;
            out.push((Lexeme::Number(number), i));
            while chars.peek().is_some_and(|&(j, _)| j < end) {
                chars.next();
            }
            continue;
        }

        if let Some(op) = OPERATORS.iter().find(|op| source[i..].starts_with(*op)) {
            out.push((Lexeme::Op(*op), i));
            for _ in 0..op.len() {
                chars.next();
            }
            continue;
        }

        if is_ident_char(c) {
            let end = source[i..]
                .find(|ch: char| !is_ident_char(ch))
                .map_or(source.len(), |n| i + n);
            out.push((Lexeme::Ident(source[i..end].to_string()), i));
            while chars.peek().is_some_and(|&(j, _)| j < end) {
                chars.next();
            }
            continue;
        }

        return Err(DirectiveError::parse(format!("unexpected character `{}`", c), i));
    }

    Ok(out)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '.')
}

struct Parser {
    tokens: Vec<(Lexeme, usize)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Lexeme> {
        self.tokens.get(self.pos).map(|(lexeme, _)| lexeme)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(_, p)| *p)
    }

    fn next(&mut self) -> Option<Lexeme> {
        let lexeme = self.tokens.get(self.pos).map(|(lexeme, _)| lexeme.clone());
        if lexeme.is_some() {
            self.pos += 1;
        }
        lexeme
    }

    fn expect(&mut self, expected: Lexeme, what: &str) -> Result<(), DirectiveError> {
        let position = self.position();
        match self.next() {
            Some(lexeme) if lexeme == expected => Ok(()),
            _ => Err(DirectiveError::parse(format!("expected {}", what), position)),
        }
    }

    /// Enter one level of the tree, failing once `MAX_DEPTH` is exceeded
    fn descend(&mut self) -> Result<(), DirectiveError> {
        if self.depth >= MAX_DEPTH {
            return Err(DirectiveError::parse(
                "expression nested too deeply",
                self.position(),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    /// Precedence climbing over the binary operators
    fn parse_expression(&mut self, min_precedence: u8) -> Result<Expr, DirectiveError> {
        let entry_depth = self.depth;
        let mut left = self.parse_unary()?;

        while let Some(Lexeme::Op(symbol)) = self.peek() {
            let Some(op) = BinaryOp::from_symbol(symbol) else {
                break;
            };
            if op.precedence() <= min_precedence {
                break;
            }
            // Each folded operator deepens the left spine by one
            self.descend()?;
            self.pos += 1;
            let right = self.parse_expression(op.precedence())?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        self.depth = entry_depth;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, DirectiveError> {
        let op = match self.peek() {
            Some(Lexeme::Op("!")) => UnaryOp::Not,
            Some(Lexeme::Op("-")) => UnaryOp::Neg,
            _ => return self.parse_primary(),
        };
        self.descend()?;
        self.pos += 1;
        let operand = self.parse_unary()?;
        self.depth -= 1;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, DirectiveError> {
        let position = self.position();
        match self.next() {
            Some(Lexeme::Number(n)) => Ok(Expr::Literal(Value::Number(n))),
            Some(Lexeme::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Lexeme::LParen) => {
                self.descend()?;
                let inner = self.parse_expression(0)?;
                self.expect(Lexeme::RParen, "`)`")?;
                self.depth -= 1;
                Ok(inner)
            }
            Some(Lexeme::Ident(word)) => {
                let keyword = match word.as_str() {
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    "null" | "undefined" => Some(Value::Null),
                    _ => None,
                };
                if let Some(value) = keyword {
                    return Ok(Expr::Literal(value));
                }

                let scope = match word.as_str() {
                    "input" => Some(RefScope::Input),
                    "variables" => Some(RefScope::Variables),
                    _ => None,
                };
                match scope {
                    Some(scope) if self.peek() == Some(&Lexeme::LBracket) => {
                        self.parse_reference(scope)
                    }
                    _ => Ok(Expr::Identifier(word)),
                }
            }
            Some(other) => Err(DirectiveError::parse(
                format!("unexpected {:?}", other),
                position,
            )),
            None => Err(DirectiveError::parse("unexpected end of expression", position)),
        }
    }

    fn parse_reference(&mut self, scope: RefScope) -> Result<Expr, DirectiveError> {
        self.expect(Lexeme::LBracket, "`[`")?;
        let position = self.position();
        let name = match self.next() {
            Some(Lexeme::Str(name)) => name,
            _ => {
                return Err(DirectiveError::parse(
                    "expected a quoted name inside `[...]`",
                    position,
                ))
            }
        };
        self.expect(Lexeme::RBracket, "`]`")?;
        Ok(Expr::Reference { scope, name })
    }
}
