//! Lexer for Kestrel
//!
//! Converts the scanner's character stream into tokens, one per call to
//! [`Lexer::advance`]. Malformed input never aborts the lexer: every call
//! yields a best-effort token and records at most one error for it.

use log::trace;

use crate::frontend::scanner::Scanner;
use crate::frontend::token::{Token, TokenKind, TokenValue, BLOCK_COMMENT_CLOSE, BLOCK_COMMENT_OPEN, LINE_COMMENT};
use crate::utils::{DiagnosticHandler, LexicalError, LexicalWarning, Position, Span};

/// Lexer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexerConfig {
    /// Longest lexeme kept in a token's content. Longer input is consumed
    /// but dropped.
    pub max_lexeme_length: usize,
}

impl Default for LexerConfig {
    fn default() -> Self {
        Self { max_lexeme_length: 4096 }
    }
}

/// The lexer state
pub struct Lexer<'a> {
    scanner: Scanner<'a>,
    config: LexerConfig,
    /// Start position of the current token
    start: Position,
    /// Error raised while producing the last token
    error: Option<LexicalError>,
    /// Warnings raised while producing the last token
    warnings: Vec<LexicalWarning>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source code
    pub fn new(source: &'a str) -> Self {
        Self::with_config(source, LexerConfig::default())
    }

    pub fn with_config(source: &'a str, config: LexerConfig) -> Self {
        Self {
            scanner: Scanner::new(source),
            config,
            start: Position::start(),
            error: None,
            warnings: Vec::new(),
        }
    }

    /// The error raised while producing the last token, if any
    pub fn error(&self) -> Option<&LexicalError> {
        self.error.as_ref()
    }

    /// Warnings raised while producing the last token
    pub fn warnings(&self) -> &[LexicalWarning] {
        &self.warnings
    }

    /// Hand the last token's diagnostics to `handler`
    pub fn report_to<H>(&mut self, handler: &mut H)
    where
        H: DiagnosticHandler<LexicalError, LexicalWarning> + ?Sized,
    {
        if let Some(error) = self.error.take() {
            handler.handle_error(error);
        }
        for warning in self.warnings.drain(..) {
            handler.handle_warning(warning);
        }
    }

    /// Get the next token
    pub fn advance(&mut self) -> Token {
        self.error = None;
        self.warnings.clear();

        self.skip_whitespace();
        self.start = self.scanner.current_position();

        let Some(c) = self.scanner.current_character() else {
            return Token::end_of_text(Span::at(self.start));
        };

        let token = if TokenKind::is_operator_prefix(c.encode_utf8(&mut [0; 4])) {
            self.read_operator_or_comment()
        } else if c.is_alphabetic() {
            self.read_keyword_or_identifier()
        } else if c.is_ascii_digit() {
            self.read_number()
        } else if c == '"' {
            self.read_string()
        } else {
            self.scanner.advance();
            self.raise(LexicalError::UnknownToken {
                text: c.to_string(),
                position: self.start,
            });
            self.make_token(TokenKind::Unknown, Some(TokenValue::String(c.to_string())))
        };

        trace!("token {:?} at {}", token.kind, token.span.start);
        token
    }

    /// Tokenize the entire source and return all tokens, `EndOfText` included
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.advance();
            let is_end = token.kind == TokenKind::EndOfText;
            tokens.push(token);
            if is_end {
                break;
            }
        }
        tokens
    }

    // ==================== Helpers ====================

    fn raise(&mut self, error: LexicalError) {
        if self.error.is_none() {
            self.error = Some(error);
        } else {
            trace!("suppressed second lexical error for one token: {}", error);
        }
    }

    fn warn(&mut self, warning: LexicalWarning) {
        self.warnings.push(warning);
    }

    fn make_token(&self, kind: TokenKind, value: Option<TokenValue>) -> Token {
        Token::new(kind, value, Span::new(self.start, self.scanner.current_position()))
    }

    fn skip_whitespace(&mut self) {
        while self.scanner.current_character().is_some_and(char::is_whitespace) {
            self.scanner.advance();
        }
    }

    /// Count one more character of the current lexeme against the length
    /// limit. Returns `false` when the character has to be dropped.
    fn admit(&mut self, length: &mut usize) -> bool {
        *length += 1;
        let limit = self.config.max_lexeme_length;
        if *length <= limit {
            return true;
        }
        if *length == limit + 1 {
            self.raise(LexicalError::ExceededMaxLexemeLength {
                limit,
                position: self.scanner.current_position(),
            });
        }
        false
    }

    // ==================== Operators and Comments ====================

    fn read_operator_or_comment(&mut self) -> Token {
        let mut text = String::new();

        while let Some(c) = self.scanner.current_character() {
            text.push(c);
            if !TokenKind::is_operator_prefix(&text) {
                text.pop();
                break;
            }
            self.scanner.advance();

            if text == LINE_COMMENT {
                return self.read_line_comment();
            }
            if text == BLOCK_COMMENT_OPEN {
                return self.read_block_comment();
            }
        }

        match TokenKind::operator_from_str(&text) {
            Some(kind) => self.make_token(kind, None),
            None => {
                self.raise(LexicalError::UnknownToken {
                    text: text.clone(),
                    position: self.start,
                });
                self.make_token(TokenKind::Unknown, Some(TokenValue::String(text)))
            }
        }
    }

    fn read_line_comment(&mut self) -> Token {
        let mut content = String::new();
        let mut length = 0;

        while let Some(c) = self.scanner.current_character() {
            if c == '\n' {
                break;
            }
            if self.admit(&mut length) {
                content.push(c);
            }
            self.scanner.advance();
        }

        self.make_token(TokenKind::LineComment, Some(TokenValue::String(content)))
    }

    fn read_block_comment(&mut self) -> Token {
        let mut content = String::new();
        let mut length = 0;

        loop {
            match self.scanner.current_character() {
                None => {
                    self.raise(LexicalError::UnexpectedEndOfText {
                        position: self.scanner.current_position(),
                    });
                    break;
                }
                Some(_) if self.at_block_comment_close() => {
                    for _ in BLOCK_COMMENT_CLOSE.chars() {
                        self.scanner.advance();
                    }
                    break;
                }
                Some(c) => {
                    if self.admit(&mut length) {
                        content.push(c);
                    }
                    self.scanner.advance();
                }
            }
        }

        self.make_token(TokenKind::BlockComment, Some(TokenValue::String(content)))
    }

    fn at_block_comment_close(&self) -> bool {
        let mut close = BLOCK_COMMENT_CLOSE.chars();
        self.scanner.current_character() == close.next()
            && self.scanner.peek_character() == close.next()
    }

    // ==================== Keywords and Identifiers ====================

    fn read_keyword_or_identifier(&mut self) -> Token {
        let mut text = String::new();
        let mut length = 0;

        while let Some(c) = self.scanner.current_character() {
            if !(c.is_alphanumeric() || c == '_') {
                break;
            }
            if self.admit(&mut length) {
                text.push(c);
            }
            self.scanner.advance();
        }

        match TokenKind::keyword_from_str(&text) {
            Some(kind) => self.make_token(kind, None),
            None => self.make_token(TokenKind::Identifier, Some(TokenValue::String(text))),
        }
    }

    // ==================== Numbers ====================

    fn read_number(&mut self) -> Token {
        let radix_prefix = self.scanner.current_character() == Some('0')
            && self
                .scanner
                .peek_character()
                .is_some_and(|c| c.is_alphabetic() && c != 'e' && c != 'E');

        if radix_prefix {
            self.read_non_decimal_number()
        } else {
            self.read_decimal_number()
        }
    }

    fn read_non_decimal_number(&mut self) -> Token {
        // Leading zero
        self.scanner.advance();

        let prefix_position = self.scanner.current_position();
        let prefix = self.scanner.current_character().unwrap_or('x');
        self.scanner.advance();

        let radix = match prefix {
            'x' => 16,
            'c' => 8,
            'b' => 2,
            _ => {
                self.raise(LexicalError::InvalidNonDecimalPrefix {
                    prefix,
                    position: prefix_position,
                });
                16
            }
        };

        let mut length = 0;
        let (value, digits) = self.accumulate_digits(radix, &mut length);
        if digits == 0 {
            self.raise(LexicalError::MissingNonDecimalDigits {
                position: self.scanner.current_position(),
            });
        }

        self.make_token(TokenKind::LiteralInteger, Some(TokenValue::Integer(value)))
    }

    fn read_decimal_number(&mut self) -> Token {
        let mut length = 0;
        let (integral, _) = self.accumulate_digits(10, &mut length);

        let mut is_float = false;
        let mut fractional = 0;
        let mut fractional_len = 0;

        if self.scanner.current_character() == Some('.')
            && self.scanner.peek_character().is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            self.scanner.advance();
            (fractional, fractional_len) = self.accumulate_digits(10, &mut length);
        }

        let mut exponent = None;
        if matches!(self.scanner.current_character(), Some('e') | Some('E')) {
            is_float = true;
            self.scanner.advance();
            exponent = self.read_exponent();
        }

        if !is_float {
            return self.make_token(TokenKind::LiteralInteger, Some(TokenValue::Integer(integral)));
        }

        let value = compose_float(integral, fractional, fractional_len, exponent);
        self.make_token(TokenKind::LiteralFloat, Some(TokenValue::Float(value)))
    }

    /// Read `[+|-] digits` after an exponent marker
    fn read_exponent(&mut self) -> Option<i32> {
        let negative = match self.scanner.current_character() {
            Some('-') => {
                self.scanner.advance();
                true
            }
            Some('+') => {
                self.scanner.advance();
                false
            }
            _ => false,
        };

        let mut magnitude: i32 = 0;
        let mut digits = 0;
        while let Some(d) = self.scanner.current_character().and_then(|c| c.to_digit(10)) {
            magnitude = magnitude.saturating_mul(10).saturating_add(d as i32);
            digits += 1;
            self.scanner.advance();
        }

        if digits == 0 {
            self.raise(LexicalError::MissingExponent {
                position: self.scanner.current_position(),
            });
            return None;
        }

        Some(if negative { -magnitude } else { magnitude })
    }

    /// Accumulate a run of digits into an unsigned 64-bit value.
    ///
    /// Once the value overflows, the remaining digits of the run are consumed
    /// but dropped. Returns the value and the number of digits that made it
    /// into the value.
    fn accumulate_digits(&mut self, radix: u32, length: &mut usize) -> (u64, usize) {
        let mut value: u64 = 0;
        let mut counted = 0;
        let mut overflowed = false;

        while let Some(d) = self.scanner.current_character().and_then(|c| c.to_digit(radix)) {
            if self.admit(length) && !overflowed {
                match value
                    .checked_mul(u64::from(radix))
                    .and_then(|v| v.checked_add(u64::from(d)))
                {
                    Some(next) => {
                        value = next;
                        counted += 1;
                    }
                    None => {
                        overflowed = true;
                        self.raise(LexicalError::NumberLiteralTooLarge {
                            position: self.scanner.current_position(),
                        });
                    }
                }
            }
            self.scanner.advance();
        }

        (value, counted)
    }

    // ==================== Strings ====================

    fn read_string(&mut self) -> Token {
        // Opening quote
        self.scanner.advance();

        let mut content = String::new();
        let mut length = 0;

        loop {
            match self.scanner.current_character() {
                None => {
                    self.raise(LexicalError::UnexpectedEndOfText {
                        position: self.scanner.current_position(),
                    });
                    break;
                }
                Some('"') => {
                    self.scanner.advance();
                    break;
                }
                Some('\\') => {
                    self.scanner.advance();
                    let Some(decoded) = self.read_escape() else {
                        continue;
                    };
                    if self.admit(&mut length) {
                        content.push(decoded);
                    }
                }
                Some(c) => {
                    if self.admit(&mut length) {
                        content.push(c);
                    }
                    self.scanner.advance();
                }
            }
        }

        self.make_token(TokenKind::LiteralString, Some(TokenValue::String(content)))
    }

    /// Decode the escape sequence following a backslash. Returns `None` at
    /// the end of the text.
    fn read_escape(&mut self) -> Option<char> {
        let position = self.scanner.current_position();
        let c = self.scanner.current_character()?;
        self.scanner.advance();

        let decoded = match c {
            'a' => '\u{07}',
            'b' => '\u{08}',
            'f' => '\u{0C}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\u{0B}',
            '\\' => '\\',
            '"' => '"',
            '0' => '\0',
            'x' => self.read_hex_char_code(),
            other => {
                self.warn(LexicalWarning::UnknownEscapeSequence { character: other, position });
                other
            }
        };
        Some(decoded)
    }

    /// Read up to four hex digits and decode them as one UTF-16 code unit
    fn read_hex_char_code(&mut self) -> char {
        let mut code: u32 = 0;
        let mut digits = 0;

        while digits < 4 {
            let Some(d) = self.scanner.current_character().and_then(|c| c.to_digit(16)) else {
                break;
            };
            code = code * 16 + d;
            digits += 1;
            self.scanner.advance();
        }

        if digits == 0 {
            self.warn(LexicalWarning::MissingHexCharCode {
                position: self.scanner.current_position(),
            });
        }

        let unit = u16::from_be_bytes([(code >> 8) as u8, code as u8]);
        char::decode_utf16([unit])
            .next()
            .and_then(|decoded| decoded.ok())
            .unwrap_or(char::REPLACEMENT_CHARACTER)
    }
}

/// `integral + fractional / 10^len`, or with an exponent
/// `integral * 10^exp + fractional * 10^(exp - len)`.
fn compose_float(integral: u64, fractional: u64, fractional_len: usize, exponent: Option<i32>) -> f64 {
    let len = i32::try_from(fractional_len).unwrap_or(i32::MAX);
    match exponent {
        None => integral as f64 + fractional as f64 / 10f64.powi(len),
        Some(exp) => {
            integral as f64 * 10f64.powi(exp) + fractional as f64 * 10f64.powi(exp.saturating_sub(len))
        }
    }
}
