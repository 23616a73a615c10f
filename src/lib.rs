//! Parses and evaluates the number-expression language used for factor-database entries, such as
//! `(3^7396-928)/3309349849490834480566907-1`, `Phi_{17}(1423)` or `prod(A057204(k),k=1..13)+1`.

pub mod config;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod instruction;
pub mod number;
pub mod parser;
pub mod sequence;

use crate::config::Config;
use log::debug;
use std::sync::LazyLock;

pub use crate::error::{ArityError, EvaluationError, ExpressionError, SyntaxError};
pub use crate::evaluator::{Environment, Evaluator};
pub use crate::instruction::{InstructionStack, Token};
pub use crate::number::Number;
pub use crate::parser::parse;
pub use crate::sequence::SequenceCatalog;

static DEFAULT_CATALOG: LazyLock<SequenceCatalog> =
    LazyLock::new(|| SequenceCatalog::with_defaults(Config::from_env().sequence_dir));

/// The catalog behind [evaluate]: built-in sequences, then `$ECMDB_SEQUENCE_DIR` if set.
pub fn default_catalog() -> &'static SequenceCatalog {
    &DEFAULT_CATALOG
}

pub fn evaluate(text: &str) -> Result<Number, ExpressionError> {
    Evaluator::new(default_catalog()).evaluate_text(text)
}

/// Whether `text` is syntactically valid. Never evaluates anything.
pub fn can_parse(text: &str) -> bool {
    match parse(text) {
        Ok(_) => true,
        Err(e) => {
            debug!("Can't parse {text}: {e}");
            false
        }
    }
}
