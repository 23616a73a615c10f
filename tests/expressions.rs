use ecmdb_expr::functions::{factorial, fibonacci, primorial};
use ecmdb_expr::sequence::{BFileDirectory, BuiltinSequences, SequenceSource};
use ecmdb_expr::{
    ArityError, EvaluationError, Evaluator, ExpressionError, Number, SequenceCatalog, can_parse,
    evaluate, parse,
};
use num_bigint::BigInt;
use std::fs;

fn int(n: i64) -> Number {
    Number::from(n)
}

fn value_of(text: &str) -> Number {
    evaluate(text).unwrap_or_else(|e| panic!("{text} failed: {e}"))
}

fn evaluation_error(text: &str) -> EvaluationError {
    match evaluate(text) {
        Err(ExpressionError::Evaluation(e)) => e,
        other => panic!("{text} should fail to evaluate, got {other:?}"),
    }
}

#[test]
fn factorials_are_exact() {
    for n in [0u64, 1, 5, 20, 110, 523] {
        assert_eq!(value_of(&format!("{n}!")), Number::Integer(factorial(n)));
    }
    assert_eq!(value_of("20!"), int(2432902008176640000));
    assert_eq!(value_of("110!+7"), Number::Integer(factorial(110) + 7));
}

#[test]
fn power_associativity() {
    assert_eq!(value_of("2^3^2"), int(512));
    assert_eq!(value_of("(2^3)^2"), int(64));
    assert_eq!(
        value_of("7^384-384"),
        Number::Integer(BigInt::from(7).pow(384) - 384)
    );
}

#[test]
fn division_floors() {
    assert_eq!(value_of("9 + 3 / 11"), int(9));
    assert_eq!(value_of("(3^7396-928)/3^7396"), int(0));
    assert_eq!(value_of("100/7*7"), int(98));
}

#[test]
fn signs() {
    assert_eq!(value_of("--9"), int(9));
    assert_eq!(value_of("-9"), int(-9));
    assert_eq!(value_of("9 - -9"), int(18));
}

#[test]
fn product_form_matches_factorial() {
    assert_eq!(value_of("prod(k,k=1..8)"), value_of("8!"));
    assert_eq!(value_of("prod(k!, k=1..4)"), int(1 * 2 * 6 * 24));
}

#[test]
fn primorial_plus_one() {
    assert_eq!(value_of("523#+1"), Number::Integer(primorial(523) + 1));
    assert_eq!(value_of("13#"), int(30030));
}

#[test]
fn named_functions() {
    assert_eq!(value_of("hypot(3,4)"), Number::Real(5.0));
    assert_eq!(value_of("multiply(3,7)"), int(21));
    assert_eq!(value_of("all(1, 2, 3)"), int(1));
    assert_eq!(value_of("all(1, 0)"), int(0));
    assert_eq!(value_of("Fibonacci(100)"), value_of("354224848179261915075"));
    assert_eq!(value_of("Fibonacci(1423)"), Number::Integer(fibonacci(1423)));
    assert_eq!(value_of("F(1423)"), value_of("fib(1423)"));
    assert_eq!(value_of("Lucas(10)"), int(123));
}

#[test]
fn cyclotomic_forms() {
    assert_eq!(value_of("Phi_{17}(2)"), int(131071));
    assert_eq!(value_of("Phi(17, 2)"), int(131071));
    assert_eq!(value_of("Phi_{6}(1423)"), int(1423 * 1423 - 1423 + 1));
}

#[test]
fn real_results() {
    let Number::Real(pi_squared) = value_of("PI^2") else {
        panic!("PI^2 should be real");
    };
    assert!((pi_squared - std::f64::consts::PI.powi(2)).abs() < 1e-12);
    assert_eq!(value_of("round(PI^2)"), int(10));
    assert_eq!(value_of("E / 3"), Number::Real(0.0));
    assert_eq!(value_of("exp(0)"), Number::Real(1.0));
}

#[test]
fn concat_form() {
    assert_eq!(value_of("concat(k, k=1..12)"), value_of("A007908(12)"));
}

#[test]
fn builtin_sequences() {
    assert_eq!(value_of("A000045(10)"), int(55));
    assert_eq!(value_of("A000142(6)"), int(720));
    assert_eq!(value_of("A002110(4)"), int(210));
}

#[test]
fn unsupported_and_unknown() {
    assert_eq!(
        evaluation_error("EuclidMullin52"),
        EvaluationError::Unsupported("EuclidMullin")
    );
    assert_eq!(
        evaluation_error("foo(0.1)"),
        EvaluationError::UnknownIdentifier("foo".into())
    );
    assert_eq!(
        evaluation_error("A999999(1)"),
        EvaluationError::UnknownSequenceId("A999999".into())
    );
    assert!(matches!(
        evaluation_error("prod(k, k=3..1)"),
        EvaluationError::Arity(ArityError::EmptyRange { lo: 3, hi: 1, .. })
    ));
    assert!(matches!(
        evaluation_error("hypot(3)"),
        EvaluationError::Arity(ArityError::WrongArgumentCount { found: 1, .. })
    ));
}

#[test]
fn parse_checks() {
    assert!(can_parse("prod(A057204(k),k=1..13)+1"));
    assert!(can_parse("A048985^{281}(2295)"));
    assert!(can_parse("EuclidMullin[89]79"));
    assert!(!can_parse("foo("));
    assert!(!can_parse(""));
    assert!(matches!(evaluate("foo("), Err(ExpressionError::Syntax(_))));
}

#[test]
fn evaluation_is_repeatable() {
    let stack = parse("prod(k^2+1, k=1..5) - 3#").unwrap();
    let catalog = SequenceCatalog::default();
    let evaluator = Evaluator::new(&catalog);
    let first = evaluator.evaluate(&stack).unwrap();
    assert_eq!(evaluator.evaluate(&stack).unwrap(), first);
    assert_eq!(value_of("prod(k^2+1, k=1..5) - 3#"), first);
}

#[test]
fn bfile_directory_catalog() {
    let dir = std::env::temp_dir().join(format!("ecmdb-expr-it-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("b057204.txt"), "# test\n1 3\n2 5\n3 7\n").unwrap();
    let catalog = SequenceCatalog::new(vec![
        Box::new(BuiltinSequences::default()) as Box<dyn SequenceSource>,
        Box::new(BFileDirectory::new(&dir)),
    ]);
    let evaluator = Evaluator::new(&catalog);
    assert_eq!(
        evaluator.evaluate_text("prod(A057204(k),k=1..3)+1").unwrap(),
        int(106)
    );
    assert_eq!(evaluator.evaluate_text("A000045(10)").unwrap(), int(55));
    fs::remove_dir_all(&dir).unwrap();
}
