use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use num_bigint::BigInt as BigInteger;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::error::{CarlaeError, Result};

// ============================================================================
// Numeric Type System
// ============================================================================

#[derive(Debug, Clone)]
pub enum NumericType {
    /// Primary integer type - promotes to BigInt on overflow
    Int(i64),

    /// Arbitrary precision integer, only used when the value does not fit in i64
    BigInt(Rc<BigInteger>),

    /// IEEE 754 double precision floating point
    Float(f64),
}

// ============================================================================
// Display Implementation
// ============================================================================

impl fmt::Display for NumericType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NumericType::Int(n) => write!(f, "{n}"),
            NumericType::BigInt(n) => write!(f, "{n}"),
            NumericType::Float(x) => {
                if x.is_nan() {
                    write!(f, "nan")
                } else if x.is_infinite() {
                    write!(f, "{}", if *x > 0.0 { "inf" } else { "-inf" })
                } else {
                    // Debug keeps the fractional part ("2.0") and round-trips
                    write!(f, "{x:?}")
                }
            }
        }
    }
}

// ============================================================================
// Equality and Comparison
// ============================================================================

impl PartialEq for NumericType {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for NumericType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use NumericType::*;

        match (self, other) {
            (Int(a), Int(b)) => a.partial_cmp(b),
            (BigInt(a), BigInt(b)) => a.partial_cmp(b),
            (Int(a), BigInt(b)) => BigInteger::from(*a).partial_cmp(b.as_ref()),
            (BigInt(a), Int(b)) => a.as_ref().partial_cmp(&BigInteger::from(*b)),
            _ => self.to_float().partial_cmp(&other.to_float()),
        }
    }
}

// ============================================================================
// Construction
// ============================================================================

impl NumericType {
    /// Parse an atom's text as an integer, falling back to a float.
    ///
    /// Returns `None` when the text is neither, i.e. it names a symbol.
    pub fn parse(text: &str) -> Option<NumericType> {
        if let Ok(n) = text.parse::<i64>() {
            return Some(NumericType::Int(n));
        }
        if let Ok(big) = BigInteger::from_str(text) {
            return Some(NumericType::from_big(big));
        }
        text.parse::<f64>().ok().map(NumericType::Float)
    }

    /// Wrap a BigInt, demoting it to Int when it fits
    fn from_big(n: BigInteger) -> NumericType {
        match n.to_i64() {
            Some(small) => NumericType::Int(small),
            None => NumericType::BigInt(Rc::new(n)),
        }
    }

    fn to_big(&self) -> Option<BigInteger> {
        match self {
            NumericType::Int(n) => Some(BigInteger::from(*n)),
            NumericType::BigInt(n) => Some(n.as_ref().clone()),
            NumericType::Float(_) => None,
        }
    }

    /// Convert to float (may lose precision)
    pub fn to_float(&self) -> f64 {
        match self {
            NumericType::Int(n) => *n as f64,
            NumericType::BigInt(n) => n.to_f64().unwrap_or(if n.is_negative() {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            }),
            NumericType::Float(x) => *x,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            NumericType::Int(n) => *n == 0,
            NumericType::BigInt(n) => n.is_zero(),
            NumericType::Float(x) => *x == 0.0,
        }
    }

    /// Interpret as a list index: a non-negative integer
    pub fn to_index(&self) -> Option<usize> {
        match self {
            NumericType::Int(n) => usize::try_from(*n).ok(),
            _ => None,
        }
    }

    // ========================================================================
    // Arithmetic
    // ========================================================================

    fn integer_op(
        &self,
        other: &Self,
        checked: fn(i64, i64) -> Option<i64>,
        big: fn(BigInteger, BigInteger) -> BigInteger,
        float: fn(f64, f64) -> f64,
    ) -> NumericType {
        match (self, other) {
            (NumericType::Int(a), NumericType::Int(b)) => match checked(*a, *b) {
                Some(n) => NumericType::Int(n),
                None => NumericType::from_big(big(BigInteger::from(*a), BigInteger::from(*b))),
            },
            (NumericType::Float(_), _) | (_, NumericType::Float(_)) => {
                NumericType::Float(float(self.to_float(), other.to_float()))
            }
            _ => match (self.to_big(), other.to_big()) {
                (Some(a), Some(b)) => NumericType::from_big(big(a, b)),
                _ => NumericType::Float(float(self.to_float(), other.to_float())),
            },
        }
    }

    pub fn add(&self, other: &Self) -> NumericType {
        self.integer_op(other, i64::checked_add, |a, b| a + b, |a, b| a + b)
    }

    pub fn sub(&self, other: &Self) -> NumericType {
        self.integer_op(other, i64::checked_sub, |a, b| a - b, |a, b| a - b)
    }

    pub fn mul(&self, other: &Self) -> NumericType {
        self.integer_op(other, i64::checked_mul, |a, b| a * b, |a, b| a * b)
    }

    /// True division: the result is always a float
    pub fn div(&self, other: &Self) -> Result<NumericType> {
        if other.is_zero() {
            return Err(CarlaeError::evaluation("division by zero"));
        }
        Ok(NumericType::Float(self.to_float() / other.to_float()))
    }

    pub fn neg(&self) -> NumericType {
        match self {
            NumericType::Int(n) => match n.checked_neg() {
                Some(m) => NumericType::Int(m),
                None => NumericType::from_big(-BigInteger::from(*n)),
            },
            NumericType::BigInt(n) => NumericType::from_big(-n.as_ref().clone()),
            NumericType::Float(x) => NumericType::Float(-x),
        }
    }
}

impl From<i64> for NumericType {
    fn from(n: i64) -> Self {
        NumericType::Int(n)
    }
}

impl From<f64> for NumericType {
    fn from(x: f64) -> Self {
        NumericType::Float(x)
    }
}
