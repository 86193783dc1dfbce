//! Movement formula evaluation.
//!
//! Waving kinds describe each block's displacement with a short arithmetic
//! expression such as `min(0.08 * radius + 0.1, 1.5) * sin(radius / 1.7 + counter / 12)`.
//!
//! Supported:
//!
//! | Syntax                         | Meaning                                  |
//! |--------------------------------|------------------------------------------|
//! | `1.5`, `2e-3`                  | numeric literal                          |
//! | `+ - * / % ^`                  | arithmetic, `^` is right-associative     |
//! | `pi`, `e`                      | constants                                |
//! | `sin cos tan asin acos atan`   | trigonometry (radians)                   |
//! | `atan2(y, x)` `pow(b, x)`      | two-argument helpers                     |
//! | `sqrt abs floor ceil round exp ln log` | one-argument helpers             |
//! | `min(a, ..)` `max(a, ..)`      | one or more arguments                    |
//! | `if(c, a, b)`                  | `a` when `c != 0`, else `b`; lazy        |
//! | any other identifier           | variable, looked up at evaluation time   |
//!
//! Formulas are parsed once per animation and evaluated per block per step.
//! Variables resolve lazily, so an unknown name inside an untaken `if`
//! branch never fails.

use crate::error::FormulaError;

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Func {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sqrt,
    Abs,
    Floor,
    Ceil,
    Round,
    Exp,
    Ln,
    Log,
    Pow,
    Min,
    Max,
}

impl Func {
    fn lookup(name: &str) -> Option<Func> {
        Some(match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "asin" => Func::Asin,
            "acos" => Func::Acos,
            "atan" => Func::Atan,
            "atan2" => Func::Atan2,
            "sqrt" => Func::Sqrt,
            "abs" => Func::Abs,
            "floor" => Func::Floor,
            "ceil" => Func::Ceil,
            "round" => Func::Round,
            "exp" => Func::Exp,
            "ln" => Func::Ln,
            "log" => Func::Log,
            "pow" => Func::Pow,
            "min" => Func::Min,
            "max" => Func::Max,
            _ => return None,
        })
    }

    /// `None` means "one or more".
    fn arity(self) -> Option<usize> {
        match self {
            Func::Atan2 | Func::Pow => Some(2),
            Func::Min | Func::Max => None,
            _ => Some(1),
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        let a = args[0];
        match self {
            Func::Sin => a.sin(),
            Func::Cos => a.cos(),
            Func::Tan => a.tan(),
            Func::Asin => a.asin(),
            Func::Acos => a.acos(),
            Func::Atan => a.atan(),
            Func::Atan2 => a.atan2(args[1]),
            Func::Sqrt => a.sqrt(),
            Func::Abs => a.abs(),
            Func::Floor => a.floor(),
            Func::Ceil => a.ceil(),
            Func::Round => a.round(),
            Func::Exp => a.exp(),
            Func::Ln => a.ln(),
            Func::Log => a.log10(),
            Func::Pow => a.powf(args[1]),
            Func::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Func::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Num(f64),
    Var(String),
    Neg(Box<Node>),
    Bin(BinOp, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
    If(Box<Node>, Box<Node>, Box<Node>),
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

fn tokenize(src: &str) -> Result<Vec<(usize, Tok)>, FormulaError> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        if c.is_ascii_digit() || c == '.' {
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            // exponent part: 1e5, 2.5E-3
            if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                let mut j = i + 1;
                if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                    j += 1;
                }
                if j < bytes.len() && bytes[j].is_ascii_digit() {
                    while j < bytes.len() && bytes[j].is_ascii_digit() {
                        j += 1;
                    }
                    i = j;
                }
            }
            let text = &src[start..i];
            let value = text.parse::<f64>().map_err(|_| FormulaError::Parse {
                offset: start,
                message: format!("invalid number '{}'", text),
            })?;
            out.push((start, Tok::Num(value)));
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            out.push((start, Tok::Ident(src[start..i].to_string())));
            continue;
        }

        let tok = match c {
            '+' | '-' | '*' | '/' | '%' | '^' => Tok::Op(c),
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            ',' => Tok::Comma,
            other => {
                return Err(FormulaError::Parse {
                    offset: start,
                    message: format!("unexpected character '{}'", other),
                })
            }
        };
        out.push((start, tok));
        i += 1;
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Deepest nesting of parentheses, signs and powers a formula may use.
const MAX_DEPTH: usize = 64;
/// Longest formula, in tokens. Bounds the depth of left-leaning operator chains.
const MAX_TOKENS: usize = 1024;

struct Parser {
    tokens: Vec<(usize, Tok)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|(o, _)| *o).unwrap_or(self.end)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        tok
    }

    fn error(&self, message: impl Into<String>) -> FormulaError {
        FormulaError::Parse {
            offset: self.offset(),
            message: message.into(),
        }
    }

    fn expect(&mut self, want: Tok, what: &str) -> Result<(), FormulaError> {
        if self.peek() == Some(&want) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn expr(&mut self) -> Result<Node, FormulaError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Op('+')) => BinOp::Add,
                Some(Tok::Op('-')) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Node::Bin(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Node, FormulaError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Op('*')) => BinOp::Mul,
                Some(Tok::Op('/')) => BinOp::Div,
                Some(Tok::Op('%')) => BinOp::Rem,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Node::Bin(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Node, FormulaError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("formula nested too deeply"));
        }
        self.depth += 1;
        let node = self.signed();
        self.depth -= 1;
        node
    }

    fn signed(&mut self) -> Result<Node, FormulaError> {
        match self.peek() {
            Some(Tok::Op('-')) => {
                self.pos += 1;
                Ok(Node::Neg(Box::new(self.unary()?)))
            }
            Some(Tok::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Node, FormulaError> {
        let base = self.atom()?;
        if self.peek() == Some(&Tok::Op('^')) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Node::Bin(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Node, FormulaError> {
        let offset = self.offset();
        match self.next() {
            Some(Tok::Num(v)) => Ok(Node::Num(v)),
            Some(Tok::LParen) => {
                let inner = self.expr()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(inner)
            }
            Some(Tok::Ident(name)) => {
                if self.peek() == Some(&Tok::LParen) {
                    self.pos += 1;
                    let args = self.args()?;
                    return self.call(name, args);
                }
                Ok(match name.as_str() {
                    "pi" => Node::Num(std::f64::consts::PI),
                    "e" => Node::Num(std::f64::consts::E),
                    _ => Node::Var(name),
                })
            }
            Some(tok) => Err(FormulaError::Parse {
                offset,
                message: format!("unexpected token {:?}", tok),
            }),
            None => Err(FormulaError::Parse {
                offset,
                message: "unexpected end of formula".into(),
            }),
        }
    }

    fn args(&mut self) -> Result<Vec<Node>, FormulaError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Tok::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            match self.next() {
                Some(Tok::Comma) => continue,
                Some(Tok::RParen) => return Ok(args),
                _ => {
                    self.pos -= 1;
                    return Err(self.error("expected ',' or ')'"));
                }
            }
        }
    }

    fn call(&self, name: String, mut args: Vec<Node>) -> Result<Node, FormulaError> {
        if name == "if" {
            if args.len() != 3 {
                return Err(FormulaError::Arity {
                    name,
                    expected: 3,
                    got: args.len(),
                });
            }
            let otherwise = args.pop();
            let then = args.pop();
            let cond = args.pop();
            return match (cond, then, otherwise) {
                (Some(c), Some(t), Some(o)) => Ok(Node::If(Box::new(c), Box::new(t), Box::new(o))),
                _ => Err(self.error("malformed if()")),
            };
        }

        let func = Func::lookup(&name).ok_or_else(|| FormulaError::UnknownFunction(name.clone()))?;
        let ok = match func.arity() {
            Some(n) => args.len() == n,
            None => !args.is_empty(),
        };
        if !ok {
            return Err(FormulaError::Arity {
                name,
                expected: func.arity().unwrap_or(1),
                got: args.len(),
            });
        }
        Ok(Node::Call(func, args))
    }
}

// ---------------------------------------------------------------------------
// Formula
// ---------------------------------------------------------------------------

/// A parsed movement formula, ready for repeated evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    root: Node,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let tokens = tokenize(source)?;
        if let Some((offset, _)) = tokens.get(MAX_TOKENS) {
            return Err(FormulaError::Parse {
                offset: *offset,
                message: format!("formula longer than {} tokens", MAX_TOKENS),
            });
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: source.len(),
            depth: 0,
        };
        let root = parser.expr()?;
        if parser.pos < parser.tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate with the given `(name, value)` bindings.
    pub fn evaluate(&self, vars: &[(&str, f64)]) -> Result<f64, FormulaError> {
        let value = eval(&self.root, vars)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(FormulaError::NonFinite)
        }
    }
}

fn eval(node: &Node, vars: &[(&str, f64)]) -> Result<f64, FormulaError> {
    Ok(match node {
        Node::Num(v) => *v,
        Node::Var(name) => vars
            .iter()
            .find(|(n, _)| *n == name.as_str())
            .map(|(_, v)| *v)
            .ok_or_else(|| FormulaError::UnknownVariable(name.clone()))?,
        Node::Neg(inner) => -eval(inner, vars)?,
        Node::Bin(op, lhs, rhs) => {
            let a = eval(lhs, vars)?;
            let b = eval(rhs, vars)?;
            match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
                BinOp::Rem => a % b,
                BinOp::Pow => a.powf(b),
            }
        }
        Node::Call(func, args) => {
            let values = args
                .iter()
                .map(|a| eval(a, vars))
                .collect::<Result<Vec<_>, _>>()?;
            func.apply(&values)
        }
        Node::If(cond, then, otherwise) => {
            let c = eval(cond, vars)?;
            if c.is_nan() {
                return Err(FormulaError::NonFinite);
            }
            if c != 0.0 {
                eval(then, vars)?
            } else {
                eval(otherwise, vars)?
            }
        }
    })
}

/// Parse and evaluate in one go.
pub fn evaluate_movement_formula(formula: &str, vars: &[(&str, f64)]) -> Result<f64, FormulaError> {
    Formula::parse(formula)?.evaluate(vars)
}
