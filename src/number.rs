use crate::error::EvaluationError;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{FromPrimitive, One, Signed, ToPrimitive, Zero};
use std::fmt::{Display, Formatter};
use std::ops::{Add, Mul, Neg, Sub};

/// The value of an expression: exact while every input is exact, double precision otherwise.
#[derive(Clone, Debug, PartialEq)]
pub enum Number {
    Integer(BigInt),
    Real(f64),
}

impl Number {
    /// Converts literal text. Pure digit strings become exact integers; anything else is read as
    /// a double.
    pub fn from_literal(text: &str) -> Option<Number> {
        let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            text.parse::<BigInt>().ok().map(Number::Integer)
        } else {
            text.parse::<f64>().ok().map(Number::Real)
        }
    }

    #[inline(always)]
    pub fn is_integer(&self) -> bool {
        matches!(self, Number::Integer(_))
    }

    #[inline(always)]
    pub fn as_integer(&self) -> Option<&BigInt> {
        match self {
            Number::Integer(n) => Some(n),
            Number::Real(_) => None,
        }
    }

    #[inline]
    pub fn to_f64(&self) -> f64 {
        match self {
            Number::Integer(n) => n.to_f64().unwrap_or(f64::NAN),
            Number::Real(x) => *x,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Number::Integer(n) => n.is_zero(),
            Number::Real(x) => *x == 0.0,
        }
    }

    /// Truncates toward zero, the way an intermediate result is re-normalized between iterated
    /// function applications.
    pub fn truncate(self) -> Result<Number, EvaluationError> {
        match self {
            Number::Integer(_) => Ok(self),
            Number::Real(x) => BigInt::from_f64(x.trunc())
                .map(Number::Integer)
                .ok_or_else(|| EvaluationError::Domain(format!("{x} has no integer value"))),
        }
    }

    /// Requires an exact non-negative value that fits in a `u64`.
    pub fn to_index(&self, context: &str) -> Result<u64, EvaluationError> {
        match self {
            Number::Integer(n) if !n.is_negative() => n.to_u64().ok_or_else(|| {
                EvaluationError::Domain(format!("{context}: {n} is too large"))
            }),
            _ => Err(EvaluationError::Domain(format!(
                "{context} requires a non-negative integer, got {self}"
            ))),
        }
    }

    /// Floor division; the quotient of two integers is never a fraction.
    pub fn floor_div(self, rhs: Number) -> Result<Number, EvaluationError> {
        if rhs.is_zero() {
            return Err(EvaluationError::Domain(format!("division of {self} by zero")));
        }
        Ok(match (self, rhs) {
            (Number::Integer(a), Number::Integer(b)) => Number::Integer(a.div_floor(&b)),
            (a, b) => Number::Real((a.to_f64() / b.to_f64()).floor()),
        })
    }

    pub fn pow(self, exponent: Number) -> Result<Number, EvaluationError> {
        match (self, exponent) {
            (Number::Integer(base), Number::Integer(exponent)) => {
                if exponent.is_negative() {
                    if base.is_zero() {
                        return Err(EvaluationError::Domain(format!(
                            "0 raised to negative power {exponent}"
                        )));
                    }
                    return Ok(Number::Real(
                        base.to_f64()
                            .unwrap_or(f64::NAN)
                            .powf(exponent.to_f64().unwrap_or(f64::NEG_INFINITY)),
                    ));
                }
                if let Some(small) = exponent.to_u32() {
                    return Ok(Number::Integer(base.pow(small)));
                }
                // Only a unit or zero base survives an exponent this large
                if base.is_zero() || base.is_one() {
                    Ok(Number::Integer(base))
                } else if base == -BigInt::one() {
                    Ok(Number::Integer(if exponent.is_even() {
                        BigInt::one()
                    } else {
                        base
                    }))
                } else {
                    Err(EvaluationError::Domain(format!(
                        "exponent {exponent} is too large"
                    )))
                }
            }
            (base, exponent) => Ok(Number::Real(base.to_f64().powf(exponent.to_f64()))),
        }
    }

    /// Python-style truthiness: anything but zero.
    #[inline(always)]
    pub fn is_truthy(&self) -> bool {
        !self.is_zero()
    }
}

impl From<BigInt> for Number {
    #[inline(always)]
    fn from(value: BigInt) -> Self {
        Number::Integer(value)
    }
}

impl From<i64> for Number {
    #[inline(always)]
    fn from(value: i64) -> Self {
        Number::Integer(value.into())
    }
}

impl From<f64> for Number {
    #[inline(always)]
    fn from(value: f64) -> Self {
        Number::Real(value)
    }
}

macro_rules! promoting_op {
    ($trait:ident, $method:ident) => {
        impl $trait for Number {
            type Output = Number;

            #[inline]
            fn $method(self, rhs: Number) -> Number {
                match (self, rhs) {
                    (Number::Integer(a), Number::Integer(b)) => Number::Integer(a.$method(b)),
                    (a, b) => Number::Real(a.to_f64().$method(b.to_f64())),
                }
            }
        }
    };
}

promoting_op!(Add, add);
promoting_op!(Sub, sub);
promoting_op!(Mul, mul);

impl Neg for Number {
    type Output = Number;

    #[inline]
    fn neg(self) -> Number {
        match self {
            Number::Integer(n) => Number::Integer(-n),
            Number::Real(x) => Number::Real(-x),
        }
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::Integer(n) => n.fmt(f),
            Number::Real(x) => x.fmt(f),
        }
    }
}
