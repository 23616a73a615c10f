use crate::error::SyntaxError;
use crate::instruction::{BinaryOp, Constant, InstructionStack, PostfixOp, RangeKind, Token};
use crate::number::Number;
use std::iter::repeat_n;

peg::parser! {
  grammar instruction_parser() for str {
    pub rule instructions() -> Vec<Token>
      = sp() e:expr() sp() { e }

    rule sp() = quiet!{[' ' | '\t' | '\r' | '\n']*}

    #[cache]
    rule expr() -> Vec<Token>
      = first:term() rest:(sp() op:additive() sp() t:term() { (op, t) })* { fold_left(first, rest) }

    rule term() -> Vec<Token>
      = first:factor() rest:(sp() op:multiplicative() sp() f:factor() { (op, f) })* { fold_left(first, rest) }

    // The exponent is a whole factor, so 2^3^2 = 2^(3^2)
    rule factor() -> Vec<Token>
      = base:atom() exponent:(sp() "^" sp() f:factor() { f })? {
          let mut tokens = base;
          if let Some(exponent) = exponent {
              tokens.extend(exponent);
              tokens.push(Token::BinaryOp(BinaryOp::Power));
          }
          tokens
      }

    rule additive() -> BinaryOp
      = "+" { BinaryOp::Add }
      / "-" { BinaryOp::Subtract }

    rule multiplicative() -> BinaryOp
      = "*" { BinaryOp::Multiply }
      / "/" { BinaryOp::FloorDivide }

    rule postfix() -> PostfixOp
      = "!" { PostfixOp::Factorial }
      / "#" { PostfixOp::Primorial }

    rule atom() -> Vec<Token>
      = signs:(s:additive() sp() { s })* body:primary() post:(sp() p:postfix() { p })* {
          let negations = signs.into_iter().filter(|s| *s == BinaryOp::Subtract).count();
          let mut tokens = body;
          tokens.extend(post.into_iter().map(Token::Postfix));
          tokens.extend(repeat_n(Token::UnaryMinus, negations));
          tokens
      }

    rule primary() -> Vec<Token>
      = range_call()
      / euclid_mullin()
      / function_call()
      / name:identifier() { vec![named(name)] }
      / n:number() { vec![Token::Literal(n)] }
      / "(" sp() e:expr() sp() ")" { e }

    rule range_call() -> Vec<Token>
      = kind:range_kind() sp() "(" sp() body:expr() sp() "," sp() var:identifier() sp() "=" sp()
        lo:signed_integer() sp() ".." sp() hi:signed_integer() sp() ")" {
          let mut tokens = body;
          tokens.push(Token::RangeCall { kind, var: var.into(), lo, hi });
          tokens
      }

    rule range_kind() -> RangeKind
      = "prod" { RangeKind::Product }
      / "concat" { RangeKind::Concat }

    rule euclid_mullin() -> Vec<Token>
      = "EuclidMullin" sp() first:("[" sp() n:number() sp() "]" sp() { n })? index:number() {
          vec![
              Token::Literal(first.unwrap_or_else(|| Number::from(2))),
              Token::Literal(index),
              Token::EuclidMullin,
          ]
      }

    rule function_call() -> Vec<Token>
      = name:identifier() sp()
        subscript:("_" sp() "{" sp() n:signed_integer() sp() "}" sp() { n })?
        superscript:("^" sp() "{" sp() n:signed_integer() sp() "}" sp() { n })?
        "(" sp() args:(expr() ++ (sp() "," sp())) sp() ")" {
          let arg_count = args.len();
          let mut tokens: Vec<Token> = args.into_iter().flatten().collect();
          tokens.push(Token::FunctionCall {
              name: name.into(),
              arg_count,
              subscript,
              superscript,
          });
          tokens
      }

    // Never ends in an underscore, so that Phi_{n} splits after "Phi"
    rule identifier() -> &'input str
      = quiet!{$(['a'..='z' | 'A'..='Z' | '_'] ("_"* ['a'..='z' | 'A'..='Z' | '0'..='9'])*)}
      / expected!("identifier")

    rule number() -> Number
      = text:$(['0'..='9']+ ("." ['0'..='9']*)? (['e' | 'E'] ['+' | '-']? ['0'..='9']+)?) {?
          Number::from_literal(text).ok_or("number")
      }

    rule signed_integer() -> i64
      = text:$(['+' | '-']? ['0'..='9']+) {? text.parse().or(Err("integer")) }
  }
}

fn fold_left(first: Vec<Token>, rest: Vec<(BinaryOp, Vec<Token>)>) -> Vec<Token> {
    let mut tokens = first;
    for (op, operand) in rest {
        tokens.extend(operand);
        tokens.push(Token::BinaryOp(op));
    }
    tokens
}

/// `E` and `PI` are whole-word and case-insensitive, so `exp` and `pi2` stay identifiers.
fn named(name: &str) -> Token {
    if name.eq_ignore_ascii_case("e") {
        Token::Constant(Constant::E)
    } else if name.eq_ignore_ascii_case("pi") {
        Token::Constant(Constant::Pi)
    } else {
        Token::Identifier(name.into())
    }
}

/// Parses the entire input into an [InstructionStack]; any unparsed remainder is an error.
pub fn parse(text: &str) -> Result<InstructionStack, SyntaxError> {
    instruction_parser::instructions(text)
        .map(InstructionStack::from)
        .map_err(SyntaxError::from)
}

#[cfg(test)]
mod tests {
    use super::parse;
    use crate::instruction::{BinaryOp, Constant, PostfixOp, RangeKind, Token};
    use crate::number::Number;

    fn tokens(input: &str) -> Vec<Token> {
        parse(input).unwrap().tokens().to_vec()
    }

    fn int(n: i64) -> Token {
        Token::Literal(Number::from(n))
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            tokens("1+2*3"),
            vec![
                int(1),
                int(2),
                int(3),
                Token::BinaryOp(BinaryOp::Multiply),
                Token::BinaryOp(BinaryOp::Add)
            ]
        );
        assert_eq!(
            parse("(3^7396-928)/3309349849490834480566907-1")
                .unwrap()
                .to_string(),
            "[3, 7396, ^, 928, -, 3309349849490834480566907, /, 1, -]"
        );
    }

    #[test]
    fn test_right_associative_power() {
        assert_eq!(
            tokens("2^3^2"),
            vec![
                int(2),
                int(3),
                int(2),
                Token::BinaryOp(BinaryOp::Power),
                Token::BinaryOp(BinaryOp::Power)
            ]
        );
    }

    #[test]
    fn test_left_associative_subtraction() {
        assert_eq!(
            tokens("9 - 12 - 6"),
            vec![
                int(9),
                int(12),
                Token::BinaryOp(BinaryOp::Subtract),
                int(6),
                Token::BinaryOp(BinaryOp::Subtract)
            ]
        );
    }

    #[test]
    fn test_unary_and_postfix() {
        assert_eq!(
            tokens("--9"),
            vec![int(9), Token::UnaryMinus, Token::UnaryMinus]
        );
        assert_eq!(tokens("+9"), vec![int(9)]);
        assert_eq!(
            tokens("-5!#"),
            vec![
                int(5),
                Token::Postfix(PostfixOp::Factorial),
                Token::Postfix(PostfixOp::Primorial),
                Token::UnaryMinus
            ]
        );
    }

    #[test]
    fn test_constants_are_whole_words() {
        assert_eq!(tokens("e"), vec![Token::Constant(Constant::E)]);
        assert_eq!(tokens("Pi"), vec![Token::Constant(Constant::Pi)]);
        assert_eq!(
            tokens("exp(1)"),
            vec![
                int(1),
                Token::FunctionCall {
                    name: "exp".into(),
                    arg_count: 1,
                    subscript: None,
                    superscript: None
                }
            ]
        );
        assert_eq!(tokens("pie"), vec![Token::Identifier("pie".into())]);
    }

    #[test]
    fn test_function_decorations() {
        assert_eq!(
            tokens("Phi_{17}(5)"),
            vec![
                int(5),
                Token::FunctionCall {
                    name: "Phi".into(),
                    arg_count: 1,
                    subscript: Some(17),
                    superscript: None
                }
            ]
        );
        assert_eq!(
            tokens("A048985^{281}(2295)"),
            vec![
                int(2295),
                Token::FunctionCall {
                    name: "A048985".into(),
                    arg_count: 1,
                    subscript: None,
                    superscript: Some(281)
                }
            ]
        );
        assert_eq!(
            tokens("hypot(3, 4)"),
            vec![
                int(3),
                int(4),
                Token::FunctionCall {
                    name: "hypot".into(),
                    arg_count: 2,
                    subscript: None,
                    superscript: None
                }
            ]
        );
    }

    #[test]
    fn test_range_forms() {
        assert_eq!(
            tokens("prod(k, k = 1 .. 8)"),
            vec![
                Token::Identifier("k".into()),
                Token::RangeCall {
                    kind: RangeKind::Product,
                    var: "k".into(),
                    lo: 1,
                    hi: 8
                }
            ]
        );
        assert_eq!(
            tokens("concat(n^2,n=-3..+3)").last(),
            Some(&Token::RangeCall {
                kind: RangeKind::Concat,
                var: "n".into(),
                lo: -3,
                hi: 3
            })
        );
        // Not a range form, so it parses as an ordinary call
        assert!(matches!(
            tokens("product(2)").last(),
            Some(Token::FunctionCall { name, .. }) if name.as_str() == "product"
        ));
    }

    #[test]
    fn test_euclid_mullin() {
        assert_eq!(
            tokens("EuclidMullin52"),
            vec![int(2), int(52), Token::EuclidMullin]
        );
        assert_eq!(
            tokens("EuclidMullin[89]79"),
            vec![int(89), int(79), Token::EuclidMullin]
        );
    }

    #[test]
    fn test_real_literals() {
        assert_eq!(
            tokens("6.02E23"),
            vec![Token::Literal(Number::Real(6.02e23))]
        );
        assert_eq!(tokens("3.5"), vec![Token::Literal(Number::Real(3.5))]);
    }

    #[test]
    fn test_syntax_errors() {
        for input in ["foo(", "", "2+", "(1", "f()", "2e", "x^{2}", "1 2", "prod(k,k=1..)"] {
            assert!(parse(input).is_err(), "{input} should not parse");
        }
        let error = parse("2 + )").unwrap_err();
        assert_eq!(error.line, 1);
        assert_eq!(error.column, 5);
    }
}
