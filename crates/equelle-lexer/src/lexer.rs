//! Equelle lexer: source text to a token stream.
//!
//! - `#` starts a comment running to the end of the line
//! - `...` continues a statement on the next line
//! - newlines are tokens; they terminate statements
//! - errors are collected (up to [`equelle_types::MAX_ERRORS`]) and the
//!   offending character skipped

use equelle_types::{CompileErrors, EquelleError, ErrorCode, SourceFile, Span};

use crate::token::{Token, TokenKind};

pub struct Lexer<'src> {
    source: &'src [u8],
    source_file: &'src SourceFile,
    pos: usize,
    line: u32,
    col: u32,
    errors: CompileErrors,
}

/// Result of lexing: tokens + any errors collected.
pub struct LexResult {
    /// Always ends with [`TokenKind::Eof`].
    pub tokens: Vec<Token>,
    pub errors: CompileErrors,
}

impl<'src> Lexer<'src> {
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            source: source_file.source.as_bytes(),
            source_file,
            pos: 0,
            line: 1,
            col: 1,
            errors: CompileErrors::empty(),
        }
    }

    pub fn lex(mut self) -> LexResult {
        let mut tokens = Vec::new();
        loop {
            let token = self.scan();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof || self.errors.is_full() {
                break;
            }
        }
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            tokens.push(Token::new(TokenKind::Eof, self.current_span()));
        }
        tracing::trace!(tokens = tokens.len(), "lexed");
        LexResult {
            tokens,
            errors: self.errors,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn current_span(&self) -> Span {
        Span::point(self.line, self.col)
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(start_line, start_col, self.line, self.col.saturating_sub(1).max(1))
    }

    fn text_from(&self, start: usize) -> &'src str {
        let bytes: &'src [u8] = self.source;
        std::str::from_utf8(&bytes[start..self.pos]).unwrap_or("")
    }

    fn emit_error(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        self.errors.push_error(EquelleError::new(
            &self.source_file.name,
            code,
            message,
            span,
            source_line,
        ));
    }

    // ─────────────────────────────────────────────────────────────
    // Whitespace, comments, continuations
    // ─────────────────────────────────────────────────────────────

    /// Skip blanks, comments and `...` line continuations. Stops at a newline
    /// that ends a statement.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r') => {
                    self.advance();
                }
                Some(b'#') => self.skip_to_line_end(),
                Some(b'.') if self.peek_at(1) == Some(b'.') && self.peek_at(2) == Some(b'.') => {
                    self.skip_to_line_end();
                    self.advance();
                }
                _ => return,
            }
        }
    }

    fn skip_to_line_end(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == b'\n' {
                break;
            }
            self.advance();
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Scanning
    // ─────────────────────────────────────────────────────────────

    /// The next token. Unexpected characters are reported and skipped;
    /// once the error limit is reached the stream ends.
    fn scan(&mut self) -> Token {
        loop {
            self.skip_trivia();

            let start = self.pos;
            let start_line = self.line;
            let start_col = self.col;
            let Some(ch) = self.advance() else {
                return Token::new(TokenKind::Eof, self.current_span());
            };

            let kind = match ch {
                b'\n' => TokenKind::Newline,
                b'"' => return self.scan_string(start_line, start_col),
                b'0'..=b'9' => return self.scan_number(start, start_line, start_col),
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                    while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
                        self.advance();
                    }
                    let text = self.text_from(start);
                    TokenKind::from_keyword(text)
                        .unwrap_or_else(|| TokenKind::Identifier(text.to_string()))
                }
                b'+' => TokenKind::Plus,
                b'*' => TokenKind::Star,
                b'/' => TokenKind::Slash,
                b'?' => TokenKind::Question,
                b'|' => TokenKind::Pipe,
                b'(' => TokenKind::LParen,
                b')' => TokenKind::RParen,
                b'{' => TokenKind::LBrace,
                b'}' => TokenKind::RBrace,
                b'[' => TokenKind::LBracket,
                b']' => TokenKind::RBracket,
                b',' => TokenKind::Comma,
                b':' => TokenKind::Colon,
                b'-' => self.either(b'>', TokenKind::Arrow, TokenKind::Minus),
                b'=' => self.either(b'=', TokenKind::EqEq, TokenKind::Eq),
                b'<' => self.either(b'=', TokenKind::LessEq, TokenKind::Less),
                b'>' => self.either(b'=', TokenKind::GreaterEq, TokenKind::Greater),
                b'!' if self.peek() == Some(b'=') => {
                    self.advance();
                    TokenKind::BangEq
                }
                other => {
                    let span = self.span_from(start_line, start_col);
                    self.emit_error(
                        ErrorCode::UNEXPECTED_CHARACTER,
                        format!("unexpected character '{}'", other as char),
                        span,
                    );
                    if self.errors.is_full() {
                        return Token::new(TokenKind::Eof, self.current_span());
                    }
                    continue;
                }
            };
            return Token::new(kind, self.span_from(start_line, start_col));
        }
    }

    fn either(&mut self, next: u8, two: TokenKind, one: TokenKind) -> TokenKind {
        if self.peek() == Some(next) {
            self.advance();
            two
        } else {
            one
        }
    }

    /// `12`, `0.3`, `1.5e-3`
    fn scan_number(&mut self, start: usize, start_line: u32, start_col: u32) -> Token {
        self.skip_digits();
        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b'0'..=b'9')) {
            self.advance();
            self.skip_digits();
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let signed = matches!(self.peek_at(1), Some(b'+' | b'-'));
            let digit_at = if signed { 2 } else { 1 };
            if matches!(self.peek_at(digit_at), Some(b'0'..=b'9')) {
                for _ in 0..digit_at {
                    self.advance();
                }
                self.skip_digits();
            }
        }
        let span = self.span_from(start_line, start_col);
        let text = self.text_from(start);
        if text.parse::<f64>().is_err() {
            self.emit_error(
                ErrorCode::INVALID_NUMBER,
                format!("invalid number '{text}'"),
                span,
            );
        }
        Token::new(TokenKind::Number(text.to_string()), span)
    }

    fn skip_digits(&mut self) {
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.advance();
        }
    }

    /// Scan a string literal after its opening `"`. Supports `\"` and `\\`.
    fn scan_string(&mut self, start_line: u32, start_col: u32) -> Token {
        let mut buf = Vec::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    let span = self.span_from(start_line, start_col);
                    self.emit_error(
                        ErrorCode::UNTERMINATED_STRING,
                        "unterminated string literal",
                        span,
                    );
                    break;
                }
                Some(b'"') => {
                    self.advance();
                    break;
                }
                Some(b'\\') if matches!(self.peek_at(1), Some(b'"' | b'\\')) => {
                    self.advance();
                    buf.extend(self.advance());
                }
                Some(_) => buf.extend(self.advance()),
            }
        }
        let text = String::from_utf8_lossy(&buf).into_owned();
        Token::new(
            TokenKind::StringLiteral(text),
            self.span_from(start_line, start_col),
        )
    }
}
