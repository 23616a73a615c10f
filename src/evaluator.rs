use crate::error::{ArityError, EvaluationError, ExpressionError};
use crate::functions::{self, Builtin, factorial, primorial};
use crate::instruction::{BinaryOp, InstructionStack, PostfixOp, RangeKind, Token};
use crate::number::Number;
use crate::parser::parse;
use crate::sequence::{SequenceCatalog, SequenceProvider, is_sequence_id};
use ahash::AHashMap;
use hipstr::HipStr;
use itertools::Itertools;
use log::debug;
use num_bigint::{BigInt, Sign};
use std::slice;
use std::sync::Arc;

/// Variable bindings visible while evaluating. Range forms bind their variable in an extended
/// copy, so a binding never outlives its range.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    bindings: AHashMap<HipStr<'static>, BigInt>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&BigInt> {
        self.bindings.get(name)
    }

    pub fn extended(&self, name: &HipStr<'static>, value: BigInt) -> Environment {
        let mut bindings = self.bindings.clone();
        bindings.insert(name.clone(), value);
        Environment { bindings }
    }
}

enum Callee {
    Builtin(&'static Builtin),
    Sequence(HipStr<'static>, Arc<dyn SequenceProvider>),
}

impl Callee {
    fn call(&self, args: &[Number], subscript: Option<i64>) -> Result<Number, EvaluationError> {
        match self {
            Callee::Builtin(builtin) => builtin.call(args, subscript),
            Callee::Sequence(id, provider) => {
                let [index] = args else {
                    return Err(ArityError::WrongArgumentCount {
                        function: id.clone(),
                        expected: "1".into(),
                        found: args.len(),
                    }
                    .into());
                };
                provider.term(index.to_index(id)?).map(Number::Integer)
            }
        }
    }
}

/// Evaluates instruction stacks, resolving OEIS ids through a [SequenceCatalog].
pub struct Evaluator<'a> {
    catalog: &'a SequenceCatalog,
}

impl<'a> Evaluator<'a> {
    pub fn new(catalog: &'a SequenceCatalog) -> Self {
        Evaluator { catalog }
    }

    pub fn evaluate(&self, stack: &InstructionStack) -> Result<Number, EvaluationError> {
        let mut working = stack.to_working_stack();
        let value = self.evaluate_stack(&mut working, &Environment::new())?;
        if !working.is_empty() {
            debug!("{} tokens left over after evaluating {stack}", working.len());
        }
        Ok(value)
    }

    pub fn evaluate_text(&self, text: &str) -> Result<Number, ExpressionError> {
        let stack = parse(text)?;
        debug!("Parsed {text} as {stack}");
        Ok(self.evaluate(&stack)?)
    }

    fn evaluate_stack(
        &self,
        stack: &mut Vec<Token>,
        env: &Environment,
    ) -> Result<Number, EvaluationError> {
        let token = stack.pop().ok_or(EvaluationError::MissingOperand)?;
        match token {
            Token::Literal(n) => Ok(n),
            Token::Constant(c) => Ok(c.value()),
            Token::Identifier(name) => env
                .get(&name)
                .cloned()
                .map(Number::Integer)
                .ok_or_else(|| EvaluationError::UnknownIdentifier(name)),
            Token::UnaryMinus => Ok(-self.evaluate_stack(stack, env)?),
            Token::BinaryOp(op) => {
                let right = self.evaluate_stack(stack, env)?;
                let left = self.evaluate_stack(stack, env)?;
                apply_binary(op, left, right)
            }
            Token::Postfix(op) => {
                let operand = self.evaluate_stack(stack, env)?;
                Ok(Number::Integer(match op {
                    PostfixOp::Factorial => factorial(operand.to_index("factorial")?),
                    PostfixOp::Primorial => primorial(operand.to_index("primorial")?),
                }))
            }
            Token::FunctionCall {
                name,
                arg_count,
                subscript,
                superscript,
            } => {
                let callee = self.resolve(&name)?;
                let mut args = (0..arg_count)
                    .map(|_| self.evaluate_stack(stack, env))
                    .collect::<Result<Vec<_>, _>>()?;
                args.reverse();
                call_iterated(&callee, args, subscript, superscript)
            }
            Token::RangeCall { kind, var, lo, hi } => {
                self.evaluate_range(stack, env, kind, &var, lo, hi)
            }
            Token::EuclidMullin => {
                let index = self.evaluate_stack(stack, env)?;
                let first = self.evaluate_stack(stack, env)?;
                debug!("Rejecting EuclidMullin[{first}]{index}");
                Err(EvaluationError::Unsupported("EuclidMullin"))
            }
        }
    }

    fn resolve(&self, name: &HipStr<'static>) -> Result<Callee, EvaluationError> {
        if is_sequence_id(name) {
            return Ok(Callee::Sequence(name.clone(), self.catalog.resolve(name)?));
        }
        functions::lookup(name)
            .map(Callee::Builtin)
            .ok_or_else(|| EvaluationError::UnknownIdentifier(name.clone()))
    }

    /// Every iteration evaluates the bound sub-expression on its own copy of the stack, then the
    /// real stack drops whatever that copy consumed.
    fn evaluate_range(
        &self,
        stack: &mut Vec<Token>,
        env: &Environment,
        kind: RangeKind,
        var: &HipStr<'static>,
        lo: i64,
        hi: i64,
    ) -> Result<Number, EvaluationError> {
        if lo > hi {
            return Err(ArityError::EmptyRange {
                variable: var.clone(),
                lo,
                hi,
            }
            .into());
        }
        debug!("Iterating {var} over {lo}..{hi}");
        let mut remaining = stack.len();
        let mut values = Vec::new();
        for value in lo..=hi {
            let mut body = stack.clone();
            let scope = env.extended(var, BigInt::from(value));
            values.push(self.evaluate_stack(&mut body, &scope)?);
            remaining = body.len();
        }
        stack.truncate(remaining);
        match kind {
            RangeKind::Product => Ok(values
                .into_iter()
                .fold(Number::from(1), |product, value| product * value)),
            RangeKind::Concat => {
                if let Some(bad) = values
                    .iter()
                    .find(|value| value.as_integer().is_none_or(|n| n.sign() == Sign::Minus))
                {
                    return Err(EvaluationError::Domain(format!(
                        "concat requires non-negative integers, got {bad}"
                    )));
                }
                let digits = values.iter().join("");
                digits
                    .parse::<BigInt>()
                    .map(Number::Integer)
                    .map_err(|_| {
                        EvaluationError::Domain(format!("concatenation {digits} is not an integer"))
                    })
            }
        }
    }
}

fn apply_binary(op: BinaryOp, left: Number, right: Number) -> Result<Number, EvaluationError> {
    match op {
        BinaryOp::Add => Ok(left + right),
        BinaryOp::Subtract => Ok(left - right),
        BinaryOp::Multiply => Ok(left * right),
        BinaryOp::FloorDivide => left.floor_div(right),
        BinaryOp::Power => left.pow(right),
    }
}

/// `f^{k}(x)` applies `f` k times, feeding each result back in as the sole argument. A count
/// below 1 still applies `f` once.
fn call_iterated(
    callee: &Callee,
    args: Vec<Number>,
    subscript: Option<i64>,
    superscript: Option<i64>,
) -> Result<Number, EvaluationError> {
    let Some(times) = superscript else {
        return callee.call(&args, subscript);
    };
    let mut result = callee.call(&args, subscript)?.truncate()?;
    for _ in 1..times {
        result = callee.call(slice::from_ref(&result), subscript)?.truncate()?;
    }
    Ok(result)
}
