use crate::error::EvaluationError;
use crate::functions::{factorial, fibonacci, lucas, nth_prime, pell, primorial};
use ahash::AHashMap;
use hipstr::HipStr;
use itertools::Itertools;
use log::{debug, info, warn};
use num_bigint::BigInt;
use num_traits::One;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

static SEQUENCE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^A[0-9]{6}$").expect("sequence id pattern is valid"));

/// Whether a name has the shape of an integer-sequence id, e.g. `A000045`.
#[inline]
pub fn is_sequence_id(name: &str) -> bool {
    SEQUENCE_ID.is_match(name)
}

/// Maps an index to a term of one integer sequence.
#[cfg_attr(test, mockall::automock)]
pub trait SequenceProvider: Send + Sync {
    fn term(&self, index: u64) -> Result<BigInt, EvaluationError>;
}

/// Something that can produce the provider for a sequence id, if it knows that sequence.
#[cfg_attr(test, mockall::automock)]
pub trait SequenceSource: Send + Sync {
    fn load(&self, id: &str) -> Result<Option<Arc<dyn SequenceProvider>>, EvaluationError>;
}

/// A sequence computed by a plain function of its index.
pub struct ComputedSequence {
    id: &'static str,
    offset: u64,
    compute: fn(u64) -> Result<BigInt, EvaluationError>,
}

impl SequenceProvider for ComputedSequence {
    fn term(&self, index: u64) -> Result<BigInt, EvaluationError> {
        if index < self.offset {
            return Err(EvaluationError::Domain(format!(
                "{} starts at index {}, not {index}",
                self.id, self.offset
            )));
        }
        (self.compute)(index)
    }
}

impl Debug for ComputedSequence {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputedSequence")
            .field("id", &self.id)
            .field("offset", &self.offset)
            .finish()
    }
}

fn computed(
    id: &'static str,
    offset: u64,
    compute: fn(u64) -> Result<BigInt, EvaluationError>,
) -> ComputedSequence {
    ComputedSequence {
        id,
        offset,
        compute,
    }
}

fn sylvester(n: u64) -> Result<BigInt, EvaluationError> {
    let mut term = BigInt::from(2u32);
    for _ in 0..n {
        term = &term * &term - &term + 1u32;
    }
    Ok(term)
}

fn concatenated_naturals(n: u64) -> Result<BigInt, EvaluationError> {
    (1..=n)
        .join("")
        .parse()
        .map_err(|e| EvaluationError::Domain(format!("A007908({n}): {e}")))
}

/// Product over k of the ten's complement of k, i.e. `10^digits(k) - k`.
fn tens_complement_factorial(n: u64) -> Result<BigInt, EvaluationError> {
    Ok((1..=n).fold(BigInt::one(), |product, k| {
        let complement = BigInt::from(10u32).pow(k.ilog10() + 1) - k;
        product * complement
    }))
}

/// Sequences small enough to compute on demand.
#[derive(Debug)]
pub struct BuiltinSequences {
    sequences: AHashMap<&'static str, Arc<ComputedSequence>>,
}

impl Default for BuiltinSequences {
    fn default() -> Self {
        let sequences = [
            computed("A000032", 0, |n| Ok(lucas(n))),
            computed("A000040", 1, |n| nth_prime(n).map(BigInt::from)),
            computed("A000045", 0, |n| Ok(fibonacci(n))),
            computed("A000058", 0, sylvester),
            computed("A000129", 0, |n| Ok(pell(n))),
            computed("A000142", 0, |n| Ok(factorial(n))),
            computed("A002110", 0, |n| {
                if n == 0 {
                    Ok(BigInt::one())
                } else {
                    nth_prime(n).map(primorial)
                }
            }),
            computed("A007908", 1, concatenated_naturals),
            computed("A110396", 1, tens_complement_factorial),
        ]
        .into_iter()
        .map(|sequence| (sequence.id, Arc::new(sequence)))
        .collect();
        BuiltinSequences { sequences }
    }
}

impl SequenceSource for BuiltinSequences {
    fn load(&self, id: &str) -> Result<Option<Arc<dyn SequenceProvider>>, EvaluationError> {
        Ok(self
            .sequences
            .get(id)
            .map(|sequence| Arc::clone(sequence) as Arc<dyn SequenceProvider>))
    }
}

/// Terms read from an OEIS b-file: one `index value` pair per line.
#[derive(Debug)]
pub struct TabulatedSequence {
    id: HipStr<'static>,
    terms: BTreeMap<u64, BigInt>,
}

impl TabulatedSequence {
    pub fn parse(id: &str, text: &str) -> Result<Self, EvaluationError> {
        let mut terms = BTreeMap::new();
        for (line_number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let malformed = || EvaluationError::SequenceLoad {
                id: id.into(),
                reason: format!("line {}: {line:?}", line_number + 1),
            };
            let (index, value) = line.split_whitespace().collect_tuple().ok_or_else(malformed)?;
            let index = index.parse::<u64>().map_err(|_| malformed())?;
            let value = value.parse::<BigInt>().map_err(|_| malformed())?;
            terms.insert(index, value);
        }
        Ok(TabulatedSequence {
            id: id.into(),
            terms,
        })
    }
}

impl SequenceProvider for TabulatedSequence {
    fn term(&self, index: u64) -> Result<BigInt, EvaluationError> {
        self.terms.get(&index).cloned().ok_or_else(|| {
            EvaluationError::Domain(format!("{} has no tabulated term {index}", self.id))
        })
    }
}

/// A directory holding `bNNNNNN.txt` files, read when a sequence is first used.
#[derive(Debug)]
pub struct BFileDirectory {
    root: PathBuf,
}

impl BFileDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        BFileDirectory { root: root.into() }
    }
}

impl SequenceSource for BFileDirectory {
    fn load(&self, id: &str) -> Result<Option<Arc<dyn SequenceProvider>>, EvaluationError> {
        let digits = id.trim_start_matches('A');
        let path = self.root.join(format!("b{digits}.txt"));
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No b-file for {id} at {}", path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(EvaluationError::SequenceLoad {
                    id: id.into(),
                    reason: format!("{}: {e}", path.display()),
                });
            }
        };
        let sequence = TabulatedSequence::parse(id, &text)?;
        info!(
            "Loaded {} terms of {id} from {}",
            sequence.terms.len(),
            path.display()
        );
        Ok(Some(Arc::new(sequence)))
    }
}

/// Resolves sequence ids against an ordered list of sources and keeps every provider it has
/// resolved. Ids that no source knows are not remembered.
pub struct SequenceCatalog {
    sources: Vec<Box<dyn SequenceSource>>,
    resolved: RwLock<AHashMap<HipStr<'static>, Arc<dyn SequenceProvider>>>,
}

impl SequenceCatalog {
    pub fn new(sources: Vec<Box<dyn SequenceSource>>) -> Self {
        SequenceCatalog {
            sources,
            resolved: RwLock::new(AHashMap::new()),
        }
    }

    /// The built-in sequences, followed by a b-file directory when one is given.
    pub fn with_defaults(bfile_dir: Option<PathBuf>) -> Self {
        let mut sources: Vec<Box<dyn SequenceSource>> = vec![Box::new(BuiltinSequences::default())];
        match bfile_dir {
            Some(dir) if dir.is_dir() => sources.push(Box::new(BFileDirectory::new(dir))),
            Some(dir) => warn!("Skipping b-file directory {}: not a directory", dir.display()),
            None => {}
        }
        SequenceCatalog::new(sources)
    }

    pub fn resolve(&self, id: &str) -> Result<Arc<dyn SequenceProvider>, EvaluationError> {
        if let Some(provider) = self
            .resolved
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
        {
            debug!("Sequence {id} already loaded");
            return Ok(Arc::clone(provider));
        }
        for source in &self.sources {
            if let Some(provider) = source.load(id)? {
                self.resolved
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(id.into())
                    .or_insert_with(|| Arc::clone(&provider));
                return Ok(provider);
            }
        }
        Err(EvaluationError::UnknownSequenceId(id.into()))
    }
}

impl Default for SequenceCatalog {
    fn default() -> Self {
        SequenceCatalog::with_defaults(None)
    }
}

impl Debug for SequenceCatalog {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceCatalog")
            .field("sources", &self.sources.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BFileDirectory, BuiltinSequences, MockSequenceProvider, MockSequenceSource,
        SequenceCatalog, SequenceProvider, SequenceSource, TabulatedSequence, is_sequence_id,
    };
    use crate::error::EvaluationError;
    use mockall::predicate::eq;
    use num_bigint::BigInt;
    use std::sync::Arc;

    #[test]
    fn test_sequence_id_pattern() {
        assert!(is_sequence_id("A000045"));
        assert!(is_sequence_id("A110396"));
        assert!(!is_sequence_id("A00045"));
        assert!(!is_sequence_id("A0000451"));
        assert!(!is_sequence_id("a000045"));
        assert!(!is_sequence_id("B000045"));
    }

    #[test]
    fn test_builtin_sequences() {
        let builtins = BuiltinSequences::default();
        let term = |id: &str, n: u64| builtins.load(id).unwrap().unwrap().term(n).unwrap();
        assert_eq!(term("A000045", 10), BigInt::from(55));
        assert_eq!(term("A000040", 1), BigInt::from(2));
        assert_eq!(term("A000040", 25), BigInt::from(97));
        assert_eq!(term("A000058", 4), BigInt::from(1807));
        assert_eq!(term("A002110", 0), BigInt::from(1));
        assert_eq!(term("A002110", 4), BigInt::from(210));
        assert_eq!(term("A007908", 12), "123456789101112".parse::<BigInt>().unwrap());
        assert_eq!(term("A110396", 3), BigInt::from(9 * 8 * 7));
        assert_eq!(term("A110396", 10), BigInt::from(362880 * 90));
        assert!(builtins.load("A999999").unwrap().is_none());
        assert!(matches!(
            builtins.load("A000040").unwrap().unwrap().term(0),
            Err(EvaluationError::Domain(_))
        ));
    }

    #[test]
    fn test_tabulated_sequence() {
        let sequence =
            TabulatedSequence::parse("A057204", "# comment\n1 2\n2 3\n\n3 7\n").unwrap();
        assert_eq!(sequence.term(3).unwrap(), BigInt::from(7));
        assert!(sequence.term(4).is_err());
        assert!(matches!(
            TabulatedSequence::parse("A057204", "1 2 3\n"),
            Err(EvaluationError::SequenceLoad { .. })
        ));
    }

    #[test]
    fn test_bfile_directory() {
        let dir = std::env::temp_dir().join(format!("ecmdb-expr-bfiles-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("b096098.txt"), "1 2\n2 13\n").unwrap();
        let source = BFileDirectory::new(&dir);
        let provider = source.load("A096098").unwrap().unwrap();
        assert_eq!(provider.term(2).unwrap(), BigInt::from(13));
        assert!(source.load("A000001").unwrap().is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_catalog_caches_resolved_providers() {
        let mut provider = MockSequenceProvider::new();
        provider
            .expect_term()
            .with(eq(5))
            .returning(|n| Ok(BigInt::from(n * 2)));
        let provider: Arc<dyn SequenceProvider> = Arc::new(provider);
        let mut source = MockSequenceSource::new();
        source
            .expect_load()
            .withf(|id| id == "A123456")
            .times(1)
            .returning(move |_| Ok(Some(Arc::clone(&provider))));
        let catalog = SequenceCatalog::new(vec![Box::new(source)]);
        for _ in 0..3 {
            assert_eq!(
                catalog.resolve("A123456").unwrap().term(5).unwrap(),
                BigInt::from(10)
            );
        }
    }

    #[test]
    fn test_catalog_tries_sources_in_order() {
        let mut first = MockSequenceSource::new();
        first.expect_load().returning(|_| Ok(None));
        let mut second = MockSequenceSource::new();
        second.expect_load().returning(|_| {
            let mut provider = MockSequenceProvider::new();
            provider.expect_term().returning(|_| Ok(BigInt::from(7)));
            let provider: Arc<dyn SequenceProvider> = Arc::new(provider);
            Ok(Some(provider))
        });
        let catalog = SequenceCatalog::new(vec![Box::new(first), Box::new(second)]);
        assert_eq!(
            catalog.resolve("A000001").unwrap().term(0).unwrap(),
            BigInt::from(7)
        );
    }

    #[test]
    fn test_catalog_unknown_id() {
        let mut source = MockSequenceSource::new();
        source.expect_load().times(2).returning(|_| Ok(None));
        let catalog = SequenceCatalog::new(vec![Box::new(source)]);
        for _ in 0..2 {
            assert_eq!(
                catalog.resolve("A999999").err(),
                Some(EvaluationError::UnknownSequenceId("A999999".into()))
            );
        }
    }
}
