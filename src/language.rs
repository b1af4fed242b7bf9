use std::fmt;
use std::rc::Rc;

use crate::environment::Environment;
use crate::error::{CarlaeError, Result};
use crate::numeric::NumericType;

// ============================================================================
// Expression Tree
// ============================================================================

/// A parsed expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(NumericType),
    Symbol(String),
    /// One parenthesized form, children in source order
    Compound(Vec<Expr>),
}

impl Expr {
    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Symbol(name.into())
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expr::Symbol(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Symbol(s) => write!(f, "{s}"),
            Expr::Compound(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Classify an atom's text: integer, else float, else symbol.
pub fn number_or_symbol(text: &str) -> Expr {
    match NumericType::parse(text) {
        Some(n) => Expr::Number(n),
        None => Expr::Symbol(text.to_string()),
    }
}

/// A name can be bound iff it is not a number and has no parens or whitespace.
pub fn is_valid_variable_name(name: &str) -> bool {
    !name.is_empty()
        && NumericType::parse(name).is_none()
        && !name
            .chars()
            .any(|c| c == '(' || c == ')' || c.is_whitespace())
}

// ============================================================================
// Runtime Values
// ============================================================================

pub struct Pair {
    pub head: Value,
    pub tail: Value,
}

pub struct Closure {
    pub params: Vec<String>,
    pub body: Expr,
    pub env: Environment,
}

/// Native function type - Rust functions callable from Carlae
pub type NativeFn = fn(&[Value]) -> Result<Value>;

#[derive(Clone, Copy)]
pub struct NativeFunction {
    pub name: &'static str,
    pub func: NativeFn,
}

#[derive(Clone)]
pub enum Value {
    Number(NumericType),
    Bool(bool),
    Nil,
    Pair(Rc<Pair>),
    Closure(Rc<Closure>),
    Native(NativeFunction),
}

impl Value {
    pub fn int(n: i64) -> Self {
        Value::Number(NumericType::Int(n))
    }

    pub fn float(x: f64) -> Self {
        Value::Number(NumericType::Float(x))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Nil => "nil",
            Value::Pair(_) => "pair",
            Value::Closure(_) => "function",
            Value::Native(_) => "builtin",
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Closure(_) | Value::Native(_))
    }

    /// True for `Nil` or a chain of pairs ending in `Nil`
    pub fn is_list(&self) -> bool {
        let mut current = self;
        loop {
            match current {
                Value::Nil => return true,
                Value::Pair(cell) => current = &cell.tail,
                _ => return false,
            }
        }
    }

    /// Iterate over the heads of a pair chain. Stops at the first non-pair tail.
    pub fn iter(&self) -> ListIter {
        ListIter {
            current: self.clone(),
        }
    }
}

// ============================================================================
// List Primitives
// ============================================================================

pub fn pair(head: Value, tail: Value) -> Value {
    Value::Pair(Rc::new(Pair { head, tail }))
}

/// Build a proper list from values, in order
pub fn list_from_vec(values: Vec<Value>) -> Value {
    values
        .into_iter()
        .rev()
        .fold(Value::Nil, |acc, val| pair(val, acc))
}

/// Collect the elements of a proper list, failing for anything else
pub fn list_to_vec(value: &Value, context: &str) -> Result<Vec<Value>> {
    if !value.is_list() {
        return Err(CarlaeError::evaluation(format!(
            "{context}: expected a list, got {}",
            value.type_name()
        )));
    }
    Ok(value.iter().collect())
}

pub struct ListIter {
    current: Value,
}

impl Iterator for ListIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let cell = match &self.current {
            Value::Pair(cell) => Rc::clone(cell),
            _ => return None,
        };
        self.current = cell.tail.clone();
        Some(cell.head.clone())
    }
}

// Unlink cells through an explicit work list so that neither long tails nor
// deeply nested heads recurse
impl Drop for Pair {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        unlink(self, &mut pending);
        while let Some(cell) = pending.pop() {
            // Cells still shared elsewhere are left to their other owners
            if let Ok(mut owned) = Rc::try_unwrap(cell) {
                unlink(&mut owned, &mut pending);
            }
        }
    }
}

fn unlink(cell: &mut Pair, pending: &mut Vec<Rc<Pair>>) {
    for link in [&mut cell.head, &mut cell.tail] {
        if let Value::Pair(next) = std::mem::replace(link, Value::Nil) {
            pending.push(next);
        }
    }
}

// ============================================================================
// Equality
// ============================================================================

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some(pair) = pending.pop() {
            let same = match pair {
                (Value::Pair(x), Value::Pair(y)) => {
                    if !Rc::ptr_eq(x, y) {
                        pending.push((&x.tail, &y.tail));
                        pending.push((&x.head, &y.head));
                    }
                    true
                }
                (Value::Number(x), Value::Number(y)) => x == y,
                (Value::Bool(x), Value::Bool(y)) => x == y,
                (Value::Nil, Value::Nil) => true,
                (Value::Closure(x), Value::Closure(y)) => Rc::ptr_eq(x, y),
                (Value::Native(x), Value::Native(y)) => x.name == y.name,
                _ => false,
            };
            if !same {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// Display Implementation
// ============================================================================

enum Piece<'a> {
    Value(&'a Value),
    Text(&'static str),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Pieces are pushed in reverse so the stack pops them in print order
        let mut pending = vec![Piece::Value(self)];
        while let Some(piece) = pending.pop() {
            let value = match piece {
                Piece::Text(text) => {
                    f.write_str(text)?;
                    continue;
                }
                Piece::Value(value) => value,
            };
            match value {
                Value::Number(n) => write!(f, "{n}")?,
                Value::Bool(b) => f.write_str(if *b { "@t" } else { "@f" })?,
                Value::Nil => f.write_str("nil")?,
                Value::Pair(_) => {
                    let mut pieces = vec![Piece::Text("(")];
                    let mut current = value;
                    while let Value::Pair(cell) = current {
                        pieces.push(Piece::Value(&cell.head));
                        match &cell.tail {
                            Value::Nil => {}
                            Value::Pair(_) => pieces.push(Piece::Text(" ")),
                            other => {
                                pieces.push(Piece::Text(" . "));
                                pieces.push(Piece::Value(other));
                            }
                        }
                        current = &cell.tail;
                    }
                    pieces.push(Piece::Text(")"));
                    pending.extend(pieces.into_iter().rev());
                }
                Value::Closure(closure) => {
                    write!(f, "<function ({})>", closure.params.join(" "))?
                }
                Value::Native(native) => write!(f, "<builtin {}>", native.name)?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Nil => write!(f, "Nil"),
            Value::Pair(_) => write!(f, "Pair{self}"),
            Value::Closure(closure) => fmt::Debug::fmt(closure.as_ref(), f),
            Value::Native(native) => write!(f, "Native({})", native.name),
        }
    }
}

// Manual implementation since Environment chains are not printable
impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("params", &self.params)
            .field("body", &self.body)
            .field("env", &"<environment>")
            .finish()
    }
}
