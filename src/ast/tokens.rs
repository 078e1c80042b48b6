/// Kinds of lexical tokens.
///
/// Identifiers cover keywords too: whether `and`, `it` or `Int32` means a
/// keyword, a symbol or a member is decided by the parser. `LIKE` is the one
/// word the lexer classifies itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// End of input
    End,

    // Literals and names
    /// Name such as `Age`, `it`, `@0`
    Identifier,

    /// Text delimited by `"` or `'`, with the delimiters still attached
    ///
    /// # Examples
    /// ```text
    /// "hello"
    /// 'x'
    /// "say ""hi"""
    /// ```
    StringLiteral,

    /// Digits only
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 2147483648
    /// ```
    IntegerLiteral,

    /// Digits with a fraction, an exponent or an `F` suffix
    ///
    /// # Examples
    /// ```text
    /// 1.5
    /// 3e10
    /// 2.5F
    /// ```
    RealLiteral,

    // Punctuation
    /// `!`
    Exclamation,
    /// `%`
    Percent,
    /// `&`
    Ampersand,
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
    /// `*`
    Asterisk,
    /// `+`
    Plus,
    /// `,`
    Comma,
    /// `-`
    Minus,
    /// `.`
    Dot,
    /// `/`
    Slash,
    /// `:`
    Colon,
    /// `<`
    LessThan,
    /// `=`, accepted as a synonym for `==`
    Equal,
    /// `>`
    GreaterThan,
    /// `?`
    Question,
    /// `[`
    OpenBracket,
    /// `]`
    CloseBracket,
    /// `|`
    Bar,

    // Two character operators
    /// `!=`
    ExclamationEqual,
    /// `&&`
    DoubleAmpersand,
    /// `<=`
    LessThanEqual,
    /// `<>`
    LessGreater,
    /// `==`
    DoubleEqual,
    /// `>=`
    GreaterThanEqual,
    /// `||`
    DoubleBar,

    /// The word `LIKE` in any letter case
    ///
    /// # Examples
    /// ```text
    /// Name LIKE "A*"
    /// Name like 'B?b'
    /// ```
    Like,
}

/// A token with its raw source text and starting character index.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            position,
        }
    }

    /// Returns true when this is an identifier spelled `word`, ignoring case.
    pub fn is_identifier(&self, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text.eq_ignore_ascii_case(word)
    }
}
