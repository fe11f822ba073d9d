//! Row-wise boolean expression language used by the filter box.
//!
//! ```text
//! or      := and (('|' | "or") and)*
//! and     := not (('&' | "and") not)*
//! not     := ("not" | '~') not | compare
//! compare := sum (cmp_op sum)*          chained: 1 < `a` < 5
//! sum     := product (('+' | '-') product)*
//! product := unary (('*' | '/' | '%') unary)*
//! unary   := ('-' | '+') unary | primary
//! primary := number | string | True | False | `quoted name` | name | '(' or ')'
//! ```

use std::cmp::Ordering;

use thiserror::Error;

use super::model::{Dataset, Value};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },
    #[error("name '{0}' is not defined")]
    UndefinedName(String),
    #[error("column '{0}' does not exist")]
    UnknownColumn(String),
    #[error("{0}")]
    Type(String),
}

fn syntax(offset: usize, message: impl Into<String>) -> EvalError {
    EvalError::Syntax {
        offset,
        message: message.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }

    fn holds(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ne => ord != Ordering::Equal,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Ge => ord != Ordering::Less,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ArithOp {
    fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
        }
    }
}

/// Parsed, unbound expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Backtick-quoted column reference.
    Column(String),
    /// Bare identifier; resolved against the columns when bound.
    Name(String),
    Literal(Value),
    Neg(Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Column(String),
    Ident(String),
    Literal(Value),
    Str(String),
    LParen,
    RParen,
    And,
    Or,
    Not,
    Compare(CompareOp),
    Arith(ArithOp),
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.src[self.pos..].chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn tokens(mut self) -> Result<Vec<(usize, Token)>, EvalError> {
        let mut out = Vec::new();
        while let Some(tok) = self.next_token()? {
            out.push(tok);
        }
        Ok(out)
    }

    fn next_token(&mut self) -> Result<Option<(usize, Token)>, EvalError> {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        let start = self.pos;
        let Some(c) = self.bump() else {
            return Ok(None);
        };
        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '~' => Token::Not,
            '&' => {
                if self.peek() == Some('&') {
                    self.bump();
                }
                Token::And
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.bump();
                }
                Token::Or
            }
            '+' => Token::Arith(ArithOp::Add),
            '-' => Token::Arith(ArithOp::Sub),
            '*' => Token::Arith(ArithOp::Mul),
            '/' => Token::Arith(ArithOp::Div),
            '%' => Token::Arith(ArithOp::Rem),
            '=' => {
                if self.bump() != Some('=') {
                    return Err(syntax(start, "expected '==', found a single '='"));
                }
                Token::Compare(CompareOp::Eq)
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token::Compare(CompareOp::Ne)
                } else {
                    Token::Not
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token::Compare(CompareOp::Ge)
                } else {
                    Token::Compare(CompareOp::Gt)
                }
            }
            '<' => match self.peek() {
                Some('=') => {
                    self.bump();
                    Token::Compare(CompareOp::Le)
                }
                Some('>') => {
                    self.bump();
                    Token::Compare(CompareOp::Ne)
                }
                _ => Token::Compare(CompareOp::Lt),
            },
            '`' => {
                let rest = &self.src[self.pos..];
                let Some(end) = rest.find('`') else {
                    return Err(syntax(start, "unterminated backtick-quoted name"));
                };
                let name = rest[..end].to_string();
                self.pos += end + 1;
                if name.is_empty() {
                    return Err(syntax(start, "empty backtick-quoted name"));
                }
                Token::Column(name)
            }
            '\'' | '"' => Token::Str(self.string_literal(c, start)?),
            c if c.is_ascii_digit()
                || (c == '.' && self.peek().is_some_and(|n| n.is_ascii_digit())) =>
            {
                self.number(start)?
            }
            c if c.is_alphabetic() || c == '_' => {
                while self.peek().is_some_and(is_word_char) {
                    self.bump();
                }
                let word = &self.src[start..self.pos];
                match word {
                    "and" | "AND" => Token::And,
                    "or" | "OR" => Token::Or,
                    "not" | "NOT" => Token::Not,
                    "True" | "true" => Token::Literal(Value::Bool(true)),
                    "False" | "false" => Token::Literal(Value::Bool(false)),
                    _ => Token::Ident(word.to_string()),
                }
            }
            other => return Err(syntax(start, format!("unexpected character '{other}'"))),
        };
        Ok(Some((start, token)))
    }

    fn string_literal(&mut self, quote: char, start: usize) -> Result<String, EvalError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(syntax(start, "unterminated string literal")),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => return Err(syntax(start, "unterminated escape sequence")),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
            }
        }
    }

    fn number(&mut self, start: usize) -> Result<Token, EvalError> {
        let mut is_float = self.src[start..].starts_with('.');
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                self.bump();
            } else if c == '.' && !is_float {
                is_float = true;
                self.bump();
            } else if (c == 'e' || c == 'E')
                && self
                    .peek_second()
                    .is_some_and(|n| n.is_ascii_digit() || n == '-' || n == '+')
            {
                is_float = true;
                self.bump();
                self.bump();
            } else {
                break;
            }
        }
        let text = self.src[start..self.pos].replace('_', "");
        if !is_float {
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Token::Literal(Value::Integer(i)));
            }
        }
        text.parse::<f64>()
            .map(|f| Token::Literal(Value::Float(f)))
            .map_err(|_| syntax(start, format!("invalid number '{text}'")))
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(o, _)| *o)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_not()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, EvalError> {
        if self.peek() == Some(&Token::Not) {
            self.next();
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Expr, EvalError> {
        let first = self.parse_sum()?;
        let mut result: Option<Expr> = None;
        let mut lhs = first.clone();
        while let Some(&Token::Compare(op)) = self.peek() {
            self.next();
            let rhs = self.parse_sum()?;
            let cmp = Expr::Compare(op, Box::new(lhs), Box::new(rhs.clone()));
            result = Some(match result {
                None => cmp,
                Some(prev) => Expr::And(Box::new(prev), Box::new(cmp)),
            });
            lhs = rhs;
        }
        Ok(result.unwrap_or(first))
    }

    fn parse_sum(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_product()?;
        while let Some(&Token::Arith(op @ (ArithOp::Add | ArithOp::Sub))) = self.peek() {
            self.next();
            let rhs = self.parse_product()?;
            lhs = Expr::Arith(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_product(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_unary()?;
        while let Some(&Token::Arith(op @ (ArithOp::Mul | ArithOp::Div | ArithOp::Rem))) =
            self.peek()
        {
            self.next();
            let rhs = self.parse_unary()?;
            lhs = Expr::Arith(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        match self.peek() {
            Some(Token::Arith(ArithOp::Sub)) => {
                self.next();
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            Some(Token::Arith(ArithOp::Add)) => {
                self.next();
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        let offset = self.offset();
        match self.next() {
            Some(Token::Literal(v)) => Ok(Expr::Literal(v)),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Column(name)) => Ok(Expr::Column(name)),
            Some(Token::Ident(name)) => Ok(Expr::Name(name)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(syntax(offset, "unbalanced parenthesis")),
                }
            }
            Some(other) => Err(syntax(offset, format!("unexpected {}", describe(&other)))),
            None => Err(syntax(offset, "unexpected end of expression")),
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::RParen => "')'".to_string(),
        Token::LParen => "'('".to_string(),
        Token::And => "'&'".to_string(),
        Token::Or => "'|'".to_string(),
        Token::Not => "'not'".to_string(),
        Token::Compare(op) => format!("'{}'", op.symbol()),
        Token::Arith(op) => format!("'{}'", op.symbol()),
        Token::Column(c) => format!("`{c}`"),
        Token::Ident(i) => format!("'{i}'"),
        Token::Literal(v) => format!("'{v}'"),
        Token::Str(s) => format!("'{s}'"),
    }
}

/// Parse an expression into an unbound tree.
pub fn parse(input: &str) -> Result<Expr, EvalError> {
    let tokens = Lexer::new(input).tokens()?;
    if tokens.is_empty() {
        return Err(syntax(0, "empty expression"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
    };
    let expr = parser.parse_or()?;
    if parser.pos < parser.tokens.len() {
        let offset = parser.offset();
        let tok = parser.next().map(|t| describe(&t)).unwrap_or_default();
        return Err(syntax(offset, format!("unexpected {tok} after expression")));
    }
    Ok(expr)
}

// ---------------------------------------------------------------------------
// Binding + evaluation
// ---------------------------------------------------------------------------

/// Expression with column references resolved to column indices.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundExpr {
    Column(usize),
    Literal(Value),
    Neg(Box<BoundExpr>),
    Arith(ArithOp, Box<BoundExpr>, Box<BoundExpr>),
    Compare(CompareOp, Box<BoundExpr>, Box<BoundExpr>),
    And(Box<BoundExpr>, Box<BoundExpr>),
    Or(Box<BoundExpr>, Box<BoundExpr>),
    Not(Box<BoundExpr>),
}

/// Resolve names against `columns`.
pub fn bind(expr: Expr, columns: &[String]) -> Result<BoundExpr, EvalError> {
    let lookup = |name: &str| columns.iter().position(|c| c == name);
    let bind_box = |e: Box<Expr>| bind(*e, columns).map(Box::new);
    Ok(match expr {
        Expr::Column(name) => match lookup(&name) {
            Some(i) => BoundExpr::Column(i),
            None => return Err(EvalError::UnknownColumn(name)),
        },
        Expr::Name(name) => match lookup(&name) {
            Some(i) => BoundExpr::Column(i),
            None => return Err(EvalError::UndefinedName(name)),
        },
        Expr::Literal(v) => BoundExpr::Literal(v),
        Expr::Neg(e) => BoundExpr::Neg(bind_box(e)?),
        Expr::Arith(op, l, r) => BoundExpr::Arith(op, bind_box(l)?, bind_box(r)?),
        Expr::Compare(op, l, r) => BoundExpr::Compare(op, bind_box(l)?, bind_box(r)?),
        Expr::And(l, r) => BoundExpr::And(bind_box(l)?, bind_box(r)?),
        Expr::Or(l, r) => BoundExpr::Or(bind_box(l)?, bind_box(r)?),
        Expr::Not(e) => BoundExpr::Not(bind_box(e)?),
    })
}

impl BoundExpr {
    /// Evaluate against one row of `dataset`.
    pub fn eval(&self, dataset: &Dataset, row: usize) -> Result<Value, EvalError> {
        match self {
            BoundExpr::Column(col) => Ok(dataset.value(row, *col).clone()),
            BoundExpr::Literal(v) => Ok(v.clone()),
            BoundExpr::Neg(e) => match e.eval(dataset, row)? {
                Value::Integer(i) => Ok(i
                    .checked_neg()
                    .map_or(Value::Float(-(i as f64)), Value::Integer)),
                Value::Float(f) => Ok(Value::Float(-f)),
                Value::Bool(b) => Ok(Value::Integer(-(b as i64))),
                Value::Null => Ok(Value::Null),
                other => Err(EvalError::Type(format!(
                    "unary '-' is not supported for {}",
                    other.type_name()
                ))),
            },
            BoundExpr::Arith(op, l, r) => {
                arith(*op, &l.eval(dataset, row)?, &r.eval(dataset, row)?)
            }
            BoundExpr::Compare(op, l, r) => {
                compare(*op, &l.eval(dataset, row)?, &r.eval(dataset, row)?)
            }
            BoundExpr::And(l, r) => {
                if !truthy(&l.eval(dataset, row)?, "&")? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(truthy(&r.eval(dataset, row)?, "&")?))
            }
            BoundExpr::Or(l, r) => {
                if truthy(&l.eval(dataset, row)?, "|")? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(truthy(&r.eval(dataset, row)?, "|")?))
            }
            BoundExpr::Not(e) => match e.eval(dataset, row)? {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                Value::Null => Ok(Value::Null),
                other => Err(EvalError::Type(format!(
                    "'not' needs a boolean operand, got {}",
                    other.type_name()
                ))),
            },
        }
    }
}

/// Nulls count as false in boolean context.
fn truthy(value: &Value, op: &str) -> Result<bool, EvalError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Null => Ok(false),
        other => Err(EvalError::Type(format!(
            "'{op}' needs boolean operands, got {}",
            other.type_name()
        ))),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        other => other.as_f64(),
    }
}

/// Elementwise comparison. Nulls compare unequal to everything; text never
/// equals a number, and ordering text against numbers is a type error.
fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Bool(op == CompareOp::Ne));
    }
    let ord = match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::String(_), _) | (_, Value::String(_)) => {
            return match op {
                CompareOp::Eq => Ok(Value::Bool(false)),
                CompareOp::Ne => Ok(Value::Bool(true)),
                _ => Err(EvalError::Type(format!(
                    "'{}' not supported between {} and {}",
                    op.symbol(),
                    lhs.type_name(),
                    rhs.type_name()
                ))),
            };
        }
        _ => {
            let (Some(a), Some(b)) = (as_number(lhs), as_number(rhs)) else {
                return Ok(Value::Bool(op == CompareOp::Ne));
            };
            match a.partial_cmp(&b) {
                Some(ord) => ord,
                None => return Ok(Value::Bool(op == CompareOp::Ne)),
            }
        }
    };
    Ok(Value::Bool(op.holds(ord)))
}

fn arith(op: ArithOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Null);
    }
    if let (ArithOp::Add, Value::String(a), Value::String(b)) = (op, lhs, rhs) {
        return Ok(Value::String(format!("{a}{b}")));
    }
    let type_error = || {
        EvalError::Type(format!(
            "'{}' not supported between {} and {}",
            op.symbol(),
            lhs.type_name(),
            rhs.type_name()
        ))
    };
    if matches!(lhs, Value::String(_)) || matches!(rhs, Value::String(_)) {
        return Err(type_error());
    }
    let int_pair = match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => Some((*a, *b)),
        _ => None,
    };
    if let Some((a, b)) = int_pair {
        let exact = match op {
            ArithOp::Add => a.checked_add(b),
            ArithOp::Sub => a.checked_sub(b),
            ArithOp::Mul => a.checked_mul(b),
            ArithOp::Rem if b != 0 => a.checked_rem(b).map(|r| {
                // sign follows the divisor
                if r != 0 && (r < 0) != (b < 0) { r + b } else { r }
            }),
            ArithOp::Div | ArithOp::Rem => None,
        };
        if let Some(v) = exact {
            return Ok(Value::Integer(v));
        }
    }
    let (Some(a), Some(b)) = (as_number(lhs), as_number(rhs)) else {
        return Err(type_error());
    };
    let v = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::Rem => {
            if b == 0.0 {
                f64::NAN
            } else {
                a - b * (a / b).floor()
            }
        }
    };
    Ok(Value::Float(v))
}
