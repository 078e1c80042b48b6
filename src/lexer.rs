use crate::ast::{Token, TokenKind};
use crate::error::{ErrorKind, ParseError};

/// Character-level scanner producing one [`Token`] per call.
///
/// The lexer never backtracks. Positions are character indices so error
/// messages line up with what the user typed, not with UTF-8 byte offsets.
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn advance(&mut self) {
        if self.position < self.input.len() {
            self.position += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn text_from(&self, start: usize) -> String {
        self.input[start..self.position].iter().collect()
    }

    fn read_identifier(&mut self) {
        // Called with the cursor on the first character
        self.advance();
        while let Some(ch) = self.current_char() {
            if is_identifier_part(ch) {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Scans a quoted literal. A doubled delimiter inside the text stands for
    /// one literal delimiter, so the scan continues while the closing quote is
    /// immediately followed by another.
    fn read_string(&mut self, quote: char) -> Result<(), ParseError> {
        loop {
            self.advance();
            while let Some(ch) = self.current_char() {
                if ch == quote {
                    break;
                }
                self.advance();
            }
            if self.current_char().is_none() {
                return Err(ParseError::new(
                    ErrorKind::UnterminatedStringLiteral,
                    self.position,
                ));
            }
            self.advance();
            if self.current_char() != Some(quote) {
                return Ok(());
            }
        }
    }

    fn read_digits(&mut self) {
        while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn expect_digit(&self) -> Result<(), ParseError> {
        if self.current_char().is_some_and(|c| c.is_ascii_digit()) {
            Ok(())
        } else {
            Err(ParseError::new(ErrorKind::DigitExpected, self.position))
        }
    }

    fn read_number(&mut self) -> Result<TokenKind, ParseError> {
        let mut kind = TokenKind::IntegerLiteral;
        self.read_digits();

        if self.current_char() == Some('.') {
            kind = TokenKind::RealLiteral;
            self.advance();
            self.expect_digit()?;
            self.read_digits();
        }

        if matches!(self.current_char(), Some('e' | 'E')) {
            kind = TokenKind::RealLiteral;
            self.advance();
            if matches!(self.current_char(), Some('+' | '-')) {
                self.advance();
            }
            self.expect_digit()?;
            self.read_digits();
        }

        if matches!(self.current_char(), Some('f' | 'F')) {
            kind = TokenKind::RealLiteral;
            self.advance();
        }

        Ok(kind)
    }

    /// Consumes `second` when it directly follows, choosing between the one
    /// and two character forms of an operator.
    fn either(&mut self, second: char, double: TokenKind, single: TokenKind) -> TokenKind {
        self.advance();
        if self.current_char() == Some(second) {
            self.advance();
            double
        } else {
            single
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace();
        let start = self.position;

        let kind = match self.current_char() {
            None => TokenKind::End,
            Some('!') => self.either('=', TokenKind::ExclamationEqual, TokenKind::Exclamation),
            Some('%') => self.single(TokenKind::Percent),
            Some('&') => self.either('&', TokenKind::DoubleAmpersand, TokenKind::Ampersand),
            Some('(') => self.single(TokenKind::OpenParen),
            Some(')') => self.single(TokenKind::CloseParen),
            Some('*') => self.single(TokenKind::Asterisk),
            Some('+') => self.single(TokenKind::Plus),
            Some(',') => self.single(TokenKind::Comma),
            Some('-') => self.single(TokenKind::Minus),
            Some('.') => self.single(TokenKind::Dot),
            Some('/') => self.single(TokenKind::Slash),
            Some(':') => self.single(TokenKind::Colon),
            Some('<') => {
                self.advance();
                match self.current_char() {
                    Some('=') => self.single(TokenKind::LessThanEqual),
                    Some('>') => self.single(TokenKind::LessGreater),
                    _ => TokenKind::LessThan,
                }
            }
            Some('=') => self.either('=', TokenKind::DoubleEqual, TokenKind::Equal),
            Some('>') => self.either('=', TokenKind::GreaterThanEqual, TokenKind::GreaterThan),
            Some('?') => self.single(TokenKind::Question),
            Some('[') => self.single(TokenKind::OpenBracket),
            Some(']') => self.single(TokenKind::CloseBracket),
            Some('|') => self.either('|', TokenKind::DoubleBar, TokenKind::Bar),
            Some(quote @ ('"' | '\'')) => {
                self.read_string(quote)?;
                TokenKind::StringLiteral
            }
            Some(ch) if is_identifier_start(ch) => {
                self.read_identifier();
                if self.text_from(start).eq_ignore_ascii_case("like") {
                    TokenKind::Like
                } else {
                    TokenKind::Identifier
                }
            }
            Some(ch) if ch.is_ascii_digit() => self.read_number()?,
            Some(ch) => {
                return Err(ParseError::new(ErrorKind::InvalidCharacter(ch), self.position));
            }
        };

        Ok(Token::new(kind, self.text_from(start), start))
    }

    /// Drains the remaining input into a token list ending with the end token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::End;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    #[cfg(test)]
    fn remaining(&self) -> usize {
        self.input.len() - self.position
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '@'
}

fn is_identifier_part(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}
