use hipstr::HipStr;
use peg::error::ParseError;
use peg::str::LineCol;
use thiserror::Error;

/// Failure of either phase. Callers that only care whether text is an expression at all can
/// match on `Syntax` and treat everything else as a semantically invalid expression.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ExpressionError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// The grammar did not match, or input remained after the longest match.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("syntax error at line {line}, column {column}: expected {expected}")]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    pub expected: String,
}

impl From<ParseError<LineCol>> for SyntaxError {
    fn from(value: ParseError<LineCol>) -> Self {
        SyntaxError {
            line: value.location.line,
            column: value.location.column,
            offset: value.location.offset,
            expected: value.expected.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ArityError {
    #[error("{function} takes {expected} argument(s), got {found}")]
    WrongArgumentCount {
        function: HipStr<'static>,
        expected: String,
        found: usize,
    },
    #[error("empty range {variable}={lo}..{hi}")]
    EmptyRange {
        variable: HipStr<'static>,
        lo: i64,
        hi: i64,
    },
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum EvaluationError {
    #[error("invalid identifier '{0}'")]
    UnknownIdentifier(HipStr<'static>),
    #[error(transparent)]
    Arity(#[from] ArityError),
    #[error("{0} is not supported")]
    Unsupported(&'static str),
    #[error("no provider for sequence {0}")]
    UnknownSequenceId(HipStr<'static>),
    #[error("sequence {id} could not be loaded: {reason}")]
    SequenceLoad {
        id: HipStr<'static>,
        reason: String,
    },
    #[error("{0}")]
    Domain(String),
    #[error("instruction stack ran out of operands")]
    MissingOperand,
}
