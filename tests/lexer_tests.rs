// tests/lexer_tests.rs

use dynq::error::ErrorKind;
use dynq::{Lexer, TokenKind};
use rstest::rstest;

fn kinds(input: &str) -> Vec<TokenKind> {
    Lexer::new(input)
        .tokenize()
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

// ============================================================================
// Punctuation and operators
// ============================================================================

#[rstest]
#[case("!", TokenKind::Exclamation)]
#[case("%", TokenKind::Percent)]
#[case("&", TokenKind::Ampersand)]
#[case("(", TokenKind::OpenParen)]
#[case(")", TokenKind::CloseParen)]
#[case("*", TokenKind::Asterisk)]
#[case("+", TokenKind::Plus)]
#[case(",", TokenKind::Comma)]
#[case("-", TokenKind::Minus)]
#[case(".", TokenKind::Dot)]
#[case("/", TokenKind::Slash)]
#[case(":", TokenKind::Colon)]
#[case("<", TokenKind::LessThan)]
#[case("=", TokenKind::Equal)]
#[case(">", TokenKind::GreaterThan)]
#[case("?", TokenKind::Question)]
#[case("[", TokenKind::OpenBracket)]
#[case("]", TokenKind::CloseBracket)]
#[case("|", TokenKind::Bar)]
#[case("!=", TokenKind::ExclamationEqual)]
#[case("&&", TokenKind::DoubleAmpersand)]
#[case("<=", TokenKind::LessThanEqual)]
#[case("<>", TokenKind::LessGreater)]
#[case("==", TokenKind::DoubleEqual)]
#[case(">=", TokenKind::GreaterThanEqual)]
#[case("||", TokenKind::DoubleBar)]
fn test_operator_tokens(#[case] input: &str, #[case] expected: TokenKind) {
    assert_eq!(kinds(input), vec![expected, TokenKind::End]);
}

#[test]
fn test_two_char_operator_takes_longest_match() {
    assert_eq!(
        kinds("a<=b"),
        vec![
            TokenKind::Identifier,
            TokenKind::LessThanEqual,
            TokenKind::Identifier,
            TokenKind::End
        ]
    );
}

// ============================================================================
// Literals
// ============================================================================

#[rstest]
#[case("42", TokenKind::IntegerLiteral)]
#[case("2147483648", TokenKind::IntegerLiteral)]
#[case("1.5", TokenKind::RealLiteral)]
#[case("3e10", TokenKind::RealLiteral)]
#[case("1.5E-3", TokenKind::RealLiteral)]
#[case("2.5F", TokenKind::RealLiteral)]
#[case("7f", TokenKind::RealLiteral)]
fn test_number_tokens(#[case] input: &str, #[case] expected: TokenKind) {
    let tokens = Lexer::new(input).tokenize().unwrap();
    assert_eq!(tokens[0].kind, expected);
    assert_eq!(tokens[0].text, input);
}

#[test]
fn test_fraction_requires_digit() {
    let err = Lexer::new("1.").tokenize().unwrap_err();
    assert_eq!(err.kind, ErrorKind::DigitExpected);
    assert_eq!(err.position, 2);
}

#[test]
fn test_string_keeps_quotes_and_doubled_delimiters() {
    let tokens = Lexer::new(r#""say ""hi""" 'x'"#).tokenize().unwrap();
    assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
    assert_eq!(tokens[0].text, r#""say ""hi""""#);
    assert_eq!(tokens[1].text, "'x'");
}

#[test]
fn test_unterminated_string() {
    let err = Lexer::new("Name == \"abc").tokenize().unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnterminatedStringLiteral);
}

// ============================================================================
// Identifiers and positions
// ============================================================================

#[test]
fn test_identifiers_and_like() {
    let tokens = Lexer::new("@0 _name it LIKE like").tokenize().unwrap();
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Identifier,
            TokenKind::Identifier,
            TokenKind::Identifier,
            TokenKind::Like,
            TokenKind::Like,
            TokenKind::End
        ]
    );
    assert_eq!(tokens[0].text, "@0");
}

#[test]
fn test_token_positions() {
    let tokens = Lexer::new("Age  >= 30").tokenize().unwrap();
    let positions: Vec<_> = tokens.iter().map(|t| t.position).collect();
    assert_eq!(positions, vec![0, 5, 8, 10]);
}

#[test]
fn test_invalid_character() {
    let err = Lexer::new("a # b").tokenize().unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidCharacter('#'));
    assert_eq!(err.position, 2);
}
