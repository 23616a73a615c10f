use crate::number::Number;
use hipstr::HipStr;
use itertools::Itertools;
use std::f64::consts::{E, PI};
use std::fmt::{Display, Formatter};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    FloorDivide,
    Power,
}

impl BinaryOp {
    pub fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Subtract => '-',
            BinaryOp::Multiply => '*',
            BinaryOp::FloorDivide => '/',
            BinaryOp::Power => '^',
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PostfixOp {
    Factorial,
    Primorial,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RangeKind {
    Product,
    Concat,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Constant {
    E,
    Pi,
}

impl Constant {
    #[inline(always)]
    pub fn value(self) -> Number {
        match self {
            Constant::E => Number::Real(E),
            Constant::Pi => Number::Real(PI),
        }
    }
}

/// One entry of an [InstructionStack]. Every operator or call follows its operands, so the first
/// operand popped is the rightmost one.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Literal(Number),
    Constant(Constant),
    Identifier(HipStr<'static>),
    BinaryOp(BinaryOp),
    UnaryMinus,
    Postfix(PostfixOp),
    FunctionCall {
        name: HipStr<'static>,
        arg_count: usize,
        subscript: Option<i64>,
        superscript: Option<i64>,
    },
    /// Preceded by the tokens of the bound sub-expression.
    RangeCall {
        kind: RangeKind,
        var: HipStr<'static>,
        lo: i64,
        hi: i64,
    },
    /// Preceded by the first term and then the term index.
    EuclidMullin,
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Literal(n) => n.fmt(f),
            Token::Constant(Constant::E) => f.write_str("E"),
            Token::Constant(Constant::Pi) => f.write_str("PI"),
            Token::Identifier(name) => name.fmt(f),
            Token::BinaryOp(op) => f.write_fmt(format_args!("{}", op.symbol())),
            Token::UnaryMinus => f.write_str("unary -"),
            Token::Postfix(PostfixOp::Factorial) => f.write_str("!"),
            Token::Postfix(PostfixOp::Primorial) => f.write_str("#"),
            Token::FunctionCall {
                name,
                arg_count,
                subscript,
                superscript,
            } => {
                name.fmt(f)?;
                if let Some(subscript) = subscript {
                    f.write_fmt(format_args!("_{{{subscript}}}"))?;
                }
                if let Some(superscript) = superscript {
                    f.write_fmt(format_args!("^{{{superscript}}}"))?;
                }
                f.write_fmt(format_args!("/{arg_count}"))
            }
            Token::RangeCall { kind, var, lo, hi } => f.write_fmt(format_args!(
                "{}[{var}={lo}..{hi}]",
                match kind {
                    RangeKind::Product => "prod",
                    RangeKind::Concat => "concat",
                }
            )),
            Token::EuclidMullin => f.write_str("EuclidMullin"),
        }
    }
}

/// A parsed expression in postfix order. Immutable once built; evaluation works on a copy.
#[derive(Clone, Debug, PartialEq)]
pub struct InstructionStack(Box<[Token]>);

impl InstructionStack {
    #[inline(always)]
    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    /// A mutable working copy for the evaluator to pop from.
    #[inline]
    pub fn to_working_stack(&self) -> Vec<Token> {
        self.0.to_vec()
    }
}

impl From<Vec<Token>> for InstructionStack {
    #[inline(always)]
    fn from(value: Vec<Token>) -> Self {
        InstructionStack(value.into_boxed_slice())
    }
}

impl Display for InstructionStack {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "[{}]",
            self.0.iter().join(", ")
        ))
    }
}
