//! Built-in functions and constants
//!
//! The registry is built once per process and never changes afterwards. The
//! root of every environment chain reads from it; nothing can be defined
//! into it or rebound in it.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::error::{CarlaeError, Result};
use crate::interpreter::apply;
use crate::language::{NativeFn, NativeFunction, Value, list_from_vec, list_to_vec, pair};
use crate::numeric::NumericType;

#[derive(Clone, Copy)]
enum Builtin {
    Function(NativeFn),
    Bool(bool),
    Nil,
}

static REGISTRY: Lazy<FxHashMap<&'static str, Builtin>> = Lazy::new(|| {
    let functions: [(&'static str, NativeFn); 22] = [
        ("+", add),
        ("-", sub),
        ("*", mul),
        ("/", div),
        ("not", not),
        ("=?", equal),
        (">", greater),
        (">=", greater_equal),
        ("<", less),
        ("<=", less_equal),
        ("pair", make_pair),
        ("head", head),
        ("tail", tail),
        ("list", list),
        ("list?", is_list),
        ("length", length),
        ("nth", nth),
        ("concat", concat),
        ("map", map),
        ("filter", filter),
        ("reduce", reduce),
        ("begin", begin),
    ];

    let mut registry = FxHashMap::default();
    for (name, func) in functions {
        registry.insert(name, Builtin::Function(func));
    }
    registry.insert("@t", Builtin::Bool(true));
    registry.insert("@f", Builtin::Bool(false));
    registry.insert("true", Builtin::Bool(true));
    registry.insert("false", Builtin::Bool(false));
    registry.insert("nil", Builtin::Nil);
    registry
});

/// Resolve a builtin by name
pub fn lookup(name: &str) -> Option<Value> {
    let (name, builtin) = REGISTRY.get_key_value(name)?;
    Some(match *builtin {
        Builtin::Function(func) => Value::Native(NativeFunction { name: *name, func }),
        Builtin::Bool(b) => Value::Bool(b),
        Builtin::Nil => Value::Nil,
    })
}

// ============================================================================
// Argument Helpers
// ============================================================================

fn expect_arity(name: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(CarlaeError::evaluation(format!(
            "{name}: expected {expected} argument{}, got {}",
            if expected == 1 { "" } else { "s" },
            args.len()
        )));
    }
    Ok(())
}

fn expect_number<'a>(name: &str, value: &'a Value) -> Result<&'a NumericType> {
    match value {
        Value::Number(n) => Ok(n),
        other => Err(CarlaeError::evaluation(format!(
            "{name}: expected a number, got {}",
            other.type_name()
        ))),
    }
}

fn expect_callable<'a>(name: &str, value: &'a Value) -> Result<&'a Value> {
    if value.is_callable() {
        Ok(value)
    } else {
        Err(CarlaeError::evaluation(format!(
            "{name}: expected a function, got {}",
            value.type_name()
        )))
    }
}

fn fold_numbers(
    name: &str,
    args: &[Value],
    init: NumericType,
    op: fn(&NumericType, &NumericType) -> NumericType,
) -> Result<NumericType> {
    args.iter().try_fold(init, |acc, arg| {
        expect_number(name, arg).map(|n| op(&acc, n))
    })
}

// ============================================================================
// Arithmetic
// ============================================================================

fn add(args: &[Value]) -> Result<Value> {
    fold_numbers("+", args, NumericType::Int(0), NumericType::add).map(Value::Number)
}

fn sub(args: &[Value]) -> Result<Value> {
    match args {
        [] => Err(CarlaeError::evaluation("-: expected at least 1 argument")),
        [only] => Ok(Value::Number(expect_number("-", only)?.neg())),
        [first, rest @ ..] => {
            let first = expect_number("-", first)?.clone();
            fold_numbers("-", rest, first, NumericType::sub).map(Value::Number)
        }
    }
}

fn mul(args: &[Value]) -> Result<Value> {
    fold_numbers("*", args, NumericType::Int(1), NumericType::mul).map(Value::Number)
}

fn div(args: &[Value]) -> Result<Value> {
    match args {
        [] => Err(CarlaeError::evaluation("/: expected at least 1 argument")),
        [only] => NumericType::Int(1)
            .div(expect_number("/", only)?)
            .map(Value::Number),
        [first, rest @ ..] => {
            let divisor = fold_numbers("/", rest, NumericType::Int(1), NumericType::mul)?;
            expect_number("/", first)?.div(&divisor).map(Value::Number)
        }
    }
}

// ============================================================================
// Booleans and Comparison
// ============================================================================

fn not(args: &[Value]) -> Result<Value> {
    expect_arity("not", args, 1)?;
    match &args[0] {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        other => Err(CarlaeError::evaluation(format!(
            "not: expected a boolean, got {}",
            other.type_name()
        ))),
    }
}

fn equal(args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(args.windows(2).all(|w| w[0] == w[1])))
}

/// True when every adjacent pair of numbers satisfies `holds`
fn chain(
    name: &str,
    args: &[Value],
    holds: fn(&NumericType, &NumericType) -> bool,
) -> Result<Value> {
    let numbers = args
        .iter()
        .map(|arg| expect_number(name, arg))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Bool(numbers.windows(2).all(|w| holds(w[0], w[1]))))
}

fn greater(args: &[Value]) -> Result<Value> {
    chain(">", args, |a, b| a > b)
}

fn greater_equal(args: &[Value]) -> Result<Value> {
    chain(">=", args, |a, b| a >= b)
}

fn less(args: &[Value]) -> Result<Value> {
    chain("<", args, |a, b| a < b)
}

fn less_equal(args: &[Value]) -> Result<Value> {
    chain("<=", args, |a, b| a <= b)
}

// ============================================================================
// Pairs and Lists
// ============================================================================

fn make_pair(args: &[Value]) -> Result<Value> {
    expect_arity("pair", args, 2)?;
    Ok(pair(args[0].clone(), args[1].clone()))
}

fn head(args: &[Value]) -> Result<Value> {
    expect_arity("head", args, 1)?;
    match &args[0] {
        Value::Pair(cell) => Ok(cell.head.clone()),
        other => Err(CarlaeError::evaluation(format!(
            "head: expected a pair, got {}",
            other.type_name()
        ))),
    }
}

fn tail(args: &[Value]) -> Result<Value> {
    expect_arity("tail", args, 1)?;
    match &args[0] {
        Value::Pair(cell) => Ok(cell.tail.clone()),
        other => Err(CarlaeError::evaluation(format!(
            "tail: expected a pair, got {}",
            other.type_name()
        ))),
    }
}

fn list(args: &[Value]) -> Result<Value> {
    Ok(list_from_vec(args.to_vec()))
}

fn is_list(args: &[Value]) -> Result<Value> {
    expect_arity("list?", args, 1)?;
    Ok(Value::Bool(args[0].is_list()))
}

fn length(args: &[Value]) -> Result<Value> {
    expect_arity("length", args, 1)?;
    if !args[0].is_list() {
        return Err(CarlaeError::evaluation(format!(
            "length: expected a list, got {}",
            args[0].type_name()
        )));
    }
    let count = args[0].iter().count();
    Ok(Value::int(count as i64))
}

fn nth(args: &[Value]) -> Result<Value> {
    expect_arity("nth", args, 2)?;
    let index = expect_number("nth", &args[1])?
        .to_index()
        .ok_or_else(|| CarlaeError::evaluation("nth: index must be a non-negative integer"))?;

    args[0]
        .iter()
        .nth(index)
        .ok_or_else(|| CarlaeError::evaluation(format!("nth: index {index} out of range")))
}

fn concat(args: &[Value]) -> Result<Value> {
    let mut elements = Vec::new();
    for arg in args {
        elements.extend(list_to_vec(arg, "concat")?);
    }
    Ok(list_from_vec(elements))
}

fn map(args: &[Value]) -> Result<Value> {
    expect_arity("map", args, 2)?;
    let func = expect_callable("map", &args[0])?;
    let mapped = list_to_vec(&args[1], "map")?
        .into_iter()
        .map(|element| apply(func, vec![element]))
        .collect::<Result<Vec<_>>>()?;
    Ok(list_from_vec(mapped))
}

fn filter(args: &[Value]) -> Result<Value> {
    expect_arity("filter", args, 2)?;
    let func = expect_callable("filter", &args[0])?;
    let mut kept = Vec::new();
    for element in list_to_vec(&args[1], "filter")? {
        if apply(func, vec![element.clone()])? == Value::Bool(true) {
            kept.push(element);
        }
    }
    Ok(list_from_vec(kept))
}

fn reduce(args: &[Value]) -> Result<Value> {
    expect_arity("reduce", args, 3)?;
    let func = expect_callable("reduce", &args[0])?;
    list_to_vec(&args[1], "reduce")?
        .into_iter()
        .try_fold(args[2].clone(), |acc, element| apply(func, vec![acc, element]))
}

// ============================================================================
// Sequencing
// ============================================================================

fn begin(args: &[Value]) -> Result<Value> {
    args.last()
        .cloned()
        .ok_or_else(|| CarlaeError::evaluation("begin: expected at least 1 argument"))
}
