use crate::error::{ArityError, EvaluationError};
use crate::number::Number;
use ahash::AHashMap;
use itertools::Itertools;
use log::debug;
use num_bigint::BigInt;
use num_integer::Integer;
use num_prime::buffer::NaiveBuffer;
use num_prime::nt_funcs::factorize64;
use num_traits::{One, Signed, ToPrimitive, Zero};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

const SGN_EPSILON: f64 = 1e-12;
/// Largest order whose cyclotomic polynomial is expanded into coefficients.
const MAX_DENSE_CYCLOTOMIC_ORDER: u64 = 1 << 20;

thread_local! {
    static SIEVE: RefCell<NaiveBuffer> = RefCell::new(NaiveBuffer::new());
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Arity {
    Exact(usize),
    Between(usize, usize),
    AtLeast(usize),
}

impl Arity {
    #[inline]
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::Between(min, max) => (min..=max).contains(&count),
            Arity::AtLeast(min) => count >= min,
        }
    }
}

impl Display for Arity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Exact(n) => n.fmt(f),
            Arity::Between(min, max) => f.write_fmt(format_args!("{min} to {max}")),
            Arity::AtLeast(min) => f.write_fmt(format_args!("at least {min}")),
        }
    }
}

type Apply = fn(&[Number], Option<i64>) -> Result<Number, EvaluationError>;

/// An entry of the static function table.
pub struct Builtin {
    pub name: &'static str,
    pub arity: Arity,
    apply: Apply,
}

impl Builtin {
    fn new(name: &'static str, arity: Arity, apply: Apply) -> Self {
        Builtin { name, arity, apply }
    }

    pub fn call(&self, args: &[Number], subscript: Option<i64>) -> Result<Number, EvaluationError> {
        if !self.arity.accepts(args.len()) {
            return Err(wrong_argument_count(self.name, self.arity, args.len()));
        }
        (self.apply)(args, subscript)
    }
}

fn wrong_argument_count(name: &'static str, arity: Arity, found: usize) -> EvaluationError {
    ArityError::WrongArgumentCount {
        function: name.into(),
        expected: arity.to_string(),
        found,
    }
    .into()
}

static BUILTINS: LazyLock<AHashMap<&'static str, Builtin>> = LazyLock::new(|| {
    [
        Builtin::new("sin", Arity::Exact(1), |args, _| {
            Ok(Number::Real(args[0].to_f64().sin()))
        }),
        Builtin::new("cos", Arity::Exact(1), |args, _| {
            Ok(Number::Real(args[0].to_f64().cos()))
        }),
        Builtin::new("tan", Arity::Exact(1), |args, _| {
            Ok(Number::Real(args[0].to_f64().tan()))
        }),
        Builtin::new("exp", Arity::Exact(1), |args, _| {
            Ok(Number::Real(args[0].to_f64().exp()))
        }),
        Builtin::new("abs", Arity::Exact(1), |args, _| {
            Ok(match &args[0] {
                Number::Integer(n) => Number::Integer(n.abs()),
                Number::Real(x) => Number::Real(x.abs()),
            })
        }),
        Builtin::new("trunc", Arity::Exact(1), |args, _| args[0].clone().truncate()),
        Builtin::new("round", Arity::Between(1, 2), round),
        Builtin::new("sgn", Arity::Exact(1), |args, _| Ok(Number::from(sgn(&args[0])))),
        Builtin::new("multiply", Arity::Exact(2), |args, _| {
            Ok(args[0].clone() * args[1].clone())
        }),
        Builtin::new("hypot", Arity::Exact(2), |args, _| {
            Ok(Number::Real(args[0].to_f64().hypot(args[1].to_f64())))
        }),
        Builtin::new("all", Arity::AtLeast(1), |args, _| {
            Ok(Number::from(i64::from(args.iter().all(Number::is_truthy))))
        }),
        Builtin::new("Fibonacci", Arity::Exact(1), fibonacci_builtin),
        Builtin::new("fibonacci", Arity::Exact(1), fibonacci_builtin),
        Builtin::new("F", Arity::Exact(1), fibonacci_builtin),
        Builtin::new("Fib", Arity::Exact(1), fibonacci_builtin),
        Builtin::new("fib", Arity::Exact(1), fibonacci_builtin),
        Builtin::new("Lucas", Arity::Exact(1), |args, _| {
            Ok(Number::Integer(lucas(args[0].to_index("Lucas")?)))
        }),
        Builtin::new("Euler", Arity::Exact(1), |args, _| {
            Ok(Number::Integer(euler_number(args[0].to_index("Euler")?)))
        }),
        Builtin::new("Pell", Arity::Exact(1), |args, _| {
            Ok(Number::Integer(pell(args[0].to_index("Pell")?)))
        }),
        Builtin::new("Phi", Arity::Between(1, 2), phi),
        Builtin::new("Tribonacci", Arity::Exact(1), |args, _| {
            Ok(Number::Integer(tribonacci(args[0].to_index("Tribonacci")?)?))
        }),
    ]
    .into_iter()
    .map(|builtin| (builtin.name, builtin))
    .collect()
});

/// Finds a function in the static table by its exact (case-sensitive) name.
#[inline]
pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.get(name)
}

fn fibonacci_builtin(args: &[Number], _: Option<i64>) -> Result<Number, EvaluationError> {
    Ok(Number::Integer(fibonacci(args[0].to_index("Fibonacci")?)))
}

fn sgn(value: &Number) -> i64 {
    match value {
        Number::Integer(n) => match n.sign() {
            num_bigint::Sign::Minus => -1,
            num_bigint::Sign::NoSign => 0,
            num_bigint::Sign::Plus => 1,
        },
        Number::Real(x) if *x < -SGN_EPSILON => -1,
        Number::Real(x) if *x > SGN_EPSILON => 1,
        Number::Real(_) => 0,
    }
}

/// Rounds half to even; with a digit count, keeps that many decimal places.
fn round(args: &[Number], _: Option<i64>) -> Result<Number, EvaluationError> {
    let Some(digits) = args.get(1) else {
        return match &args[0] {
            Number::Integer(_) => Ok(args[0].clone()),
            Number::Real(x) => Number::Real(x.round_ties_even()).truncate(),
        };
    };
    let digits = digits
        .as_integer()
        .and_then(ToPrimitive::to_i32)
        .ok_or_else(|| EvaluationError::Domain(format!("round: invalid precision {digits}")))?;
    match &args[0] {
        Number::Real(x) => {
            let scale = 10f64.powi(digits);
            let scaled = x * scale;
            if !scaled.is_finite() || scale == 0.0 {
                // Beyond f64 precision either way
                return Ok(Number::Real(if scale == 0.0 { 0.0 } else { *x }));
            }
            Ok(Number::Real(scaled.round_ties_even() / scale))
        }
        Number::Integer(n) if digits >= 0 => Ok(Number::Integer(n.clone())),
        Number::Integer(n) => {
            let unit = BigInt::from(10u32).pow(digits.unsigned_abs());
            let (quotient, remainder) = n.div_mod_floor(&unit);
            let quotient = match (&remainder * 2u32).cmp(&unit) {
                Ordering::Less => quotient,
                Ordering::Greater => quotient + 1u32,
                Ordering::Equal if quotient.is_even() => quotient,
                Ordering::Equal => quotient + 1u32,
            };
            Ok(Number::Integer(quotient * unit))
        }
    }
}

/// `Phi_{n}(x)`, or `Phi(n, x)` when no subscript is given.
fn phi(args: &[Number], subscript: Option<i64>) -> Result<Number, EvaluationError> {
    let (order, x) = match (subscript, args) {
        (Some(order), [x]) => (u64::try_from(order).ok(), x),
        (None, [order, x]) => (order.as_integer().and_then(ToPrimitive::to_u64), x),
        _ => {
            return Err(wrong_argument_count(
                "Phi",
                Arity::Exact(if subscript.is_some() { 1 } else { 2 }),
                args.len(),
            ));
        }
    };
    match order {
        Some(order) if order > 0 => cyclotomic(order, x),
        _ => Err(EvaluationError::Domain(
            "cyclotomic polynomial order must be a positive integer".into(),
        )),
    }
}

fn product_of_range(lo: u64, hi: u64) -> BigInt {
    if lo > hi {
        return BigInt::one();
    }
    if hi - lo < 16 {
        return (lo..=hi).fold(BigInt::one(), |product, k| product * k);
    }
    let mid = lo + (hi - lo) / 2;
    product_of_range(lo, mid) * product_of_range(mid + 1, hi)
}

pub fn factorial(n: u64) -> BigInt {
    product_of_range(2, n)
}

/// All primes less than or equal to `limit`, ascending.
pub fn primes_up_to(limit: u64) -> Vec<u64> {
    SIEVE.with_borrow_mut(|sieve| {
        sieve
            .primes(limit.saturating_add(1))
            .copied()
            .take_while(|p| *p <= limit)
            .collect()
    })
}

/// The `n`th prime, counting 2 as the first.
pub fn nth_prime(n: u64) -> Result<u64, EvaluationError> {
    if n == 0 {
        return Err(EvaluationError::Domain("there is no 0th prime".into()));
    }
    Ok(SIEVE.with_borrow_mut(|sieve| sieve.nth_prime(n)))
}

/// Product of all primes less than or equal to `limit`.
pub fn primorial(limit: u64) -> BigInt {
    primes_up_to(limit)
        .into_iter()
        .fold(BigInt::one(), |product, p| product * p)
}

/// `U_n(p, q)` and `V_n(p, q)` of the Lucas sequences, by binary doubling.
fn lucas_sequence(p: i64, q: i64, n: u64) -> (BigInt, BigInt) {
    let p = BigInt::from(p);
    let discriminant = &p * &p - BigInt::from(q) * 4u32;
    let q = BigInt::from(q);
    let mut u = BigInt::zero();
    let mut v = BigInt::from(2u32);
    let mut q_k = BigInt::one();
    for bit in (0..u64::BITS - n.leading_zeros()).rev() {
        let doubled_u = &u * &v;
        let doubled_v = &v * &v - &q_k * 2u32;
        q_k = &q_k * &q_k;
        u = doubled_u;
        v = doubled_v;
        if (n >> bit) & 1 == 1 {
            // Both numerators are always even
            let next_u = (&p * &u + &v) / 2u32;
            let next_v = (&discriminant * &u + &p * &v) / 2u32;
            u = next_u;
            v = next_v;
            q_k *= &q;
        }
    }
    (u, v)
}

#[inline]
pub fn fibonacci(n: u64) -> BigInt {
    lucas_sequence(1, -1, n).0
}

#[inline]
pub fn lucas(n: u64) -> BigInt {
    lucas_sequence(1, -1, n).1
}

#[inline]
pub fn pell(n: u64) -> BigInt {
    lucas_sequence(2, -1, n).0
}

/// Euler (secant) numbers: 1, 0, -1, 0, 5, 0, -61, ...
pub fn euler_number(n: u64) -> BigInt {
    if n.is_odd() {
        return BigInt::zero();
    }
    let half = n / 2;
    let mut even_terms = vec![BigInt::one()];
    for m in 1..=half {
        let size = 2 * m;
        let mut binomial = BigInt::one();
        let mut sum = BigInt::zero();
        for (k, term) in (0..m).zip(even_terms.iter()) {
            sum += &binomial * term;
            let j = 2 * k;
            binomial = binomial * ((size - j) * (size - j - 1)) / ((j + 1) * (j + 2));
        }
        even_terms.push(-sum);
    }
    even_terms.pop().unwrap_or_else(BigInt::one)
}

/// `Tribonacci(n)` is the (n-1)th term of 0, 1, 1, 2, 4, 7, 13, ...
pub fn tribonacci(n: u64) -> Result<BigInt, EvaluationError> {
    let Some(index) = n.checked_sub(1) else {
        return Err(EvaluationError::Domain(
            "Tribonacci is defined from 1".into(),
        ));
    };
    let mut a = BigInt::zero();
    let mut b = BigInt::one();
    let mut c = BigInt::one();
    for _ in 0..index {
        let next = &a + &b + &c;
        a = b;
        b = c;
        c = next;
    }
    Ok(a)
}

/// The cyclotomic polynomial of the given order, evaluated at `x`.
pub fn cyclotomic(order: u64, x: &Number) -> Result<Number, EvaluationError> {
    let primes: Vec<u64> = factorize64(order).into_keys().collect();
    debug!("cyclotomic: order {order}, prime factors {primes:?}");
    match x {
        Number::Integer(x) if x.abs() > BigInt::one() => {
            cyclotomic_at_integer(order, &primes, x).map(Number::Integer)
        }
        Number::Integer(x) => {
            let coefficients = cyclotomic_coefficients(order, &primes)?;
            Ok(Number::Integer(
                coefficients
                    .iter()
                    .rev()
                    .fold(BigInt::zero(), |acc, c| acc * x + c),
            ))
        }
        Number::Real(x) => {
            let coefficients = cyclotomic_coefficients(order, &primes)?;
            Ok(Number::Real(coefficients.iter().rev().fold(0.0, |acc, c| {
                acc * x + c.to_f64().unwrap_or(f64::NAN)
            })))
        }
    }
}

fn exponent_for(order: u64, squarefree: u64) -> Result<u32, EvaluationError> {
    u32::try_from(order / squarefree).map_err(|_| {
        EvaluationError::Domain(format!("cyclotomic polynomial order {order} is too large"))
    })
}

/// Möbius product over the squarefree divisors; valid whenever no `x^d - 1` vanishes.
fn cyclotomic_at_integer(
    order: u64,
    primes: &[u64],
    x: &BigInt,
) -> Result<BigInt, EvaluationError> {
    let mut numerator = BigInt::one();
    let mut denominator = BigInt::one();
    for subset in primes.iter().powerset() {
        let odd = subset.len().is_odd();
        let squarefree: u64 = subset.into_iter().product();
        let term = x.pow(exponent_for(order, squarefree)?) - 1u32;
        if odd {
            denominator *= term;
        } else {
            numerator *= term;
        }
    }
    Ok(numerator / denominator)
}

/// Coefficients of the cyclotomic polynomial, lowest degree first.
fn cyclotomic_coefficients(order: u64, primes: &[u64]) -> Result<Vec<BigInt>, EvaluationError> {
    if order > MAX_DENSE_CYCLOTOMIC_ORDER {
        return Err(EvaluationError::Domain(format!(
            "cyclotomic polynomial order {order} is too large to expand"
        )));
    }
    let mut polynomial = vec![BigInt::one()];
    let mut divisors = Vec::new();
    for subset in primes.iter().powerset() {
        let odd = subset.len().is_odd();
        let squarefree: u64 = subset.into_iter().product();
        let degree = exponent_for(order, squarefree)? as usize;
        if odd {
            divisors.push(degree);
        } else {
            // multiply by x^degree - 1
            let mut product = vec![BigInt::zero(); polynomial.len() + degree];
            for (i, c) in polynomial.iter().enumerate() {
                product[i] -= c;
                product[i + degree] += c;
            }
            polynomial = product;
        }
    }
    for degree in divisors {
        // divide by x^degree - 1; the quotient is exact
        let quotient_len = polynomial.len() - degree;
        let mut quotient: Vec<BigInt> = Vec::with_capacity(quotient_len);
        for i in 0..quotient_len {
            let carried = if i >= degree {
                quotient[i - degree].clone()
            } else {
                BigInt::zero()
            };
            quotient.push(carried - &polynomial[i]);
        }
        polynomial = quotient;
    }
    Ok(polynomial)
}
