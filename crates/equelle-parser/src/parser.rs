//! Core parser infrastructure: token cursor, error reporting, recovery.

use equelle_lexer::{Token, TokenKind};
use equelle_sema::{SemaResult, SemanticActions, SymbolTable};
use equelle_types::ast::Node;
use equelle_types::{CompileErrors, EquelleError, ErrorCode, SourceFile, Span};
use tracing::debug;

/// The Equelle grammar driver.
///
/// Consumes the lexer's token stream and calls one semantic action per
/// production. Collects errors and recovers at statement boundaries.
pub struct Parser<'src> {
    /// The token stream.
    tokens: Vec<Token>,
    /// Current index into `tokens`.
    pos: usize,
    /// Source file for error context.
    source_file: &'src SourceFile,
    /// Collected errors.
    errors: CompileErrors,
    /// Symbols for this compilation.
    symbols: SymbolTable,
    /// Inside a stencil statement `i`, `j` and `k` are grid coordinates.
    pub(crate) in_stencil: bool,
    /// Current expression nesting depth.
    pub(crate) expr_depth: usize,
}

/// Result of parsing.
pub struct ParseResult {
    /// The typed program, present only when no error was recorded.
    pub program: Option<Node>,
    /// The symbol table built while parsing. Code generation reads it.
    pub symbols: SymbolTable,
    pub errors: CompileErrors,
}

impl<'src> Parser<'src> {
    pub fn new(mut tokens: Vec<Token>, source_file: &'src SourceFile) -> Self {
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            let end = tokens.last().map_or(Span::point(1, 1), |t| t.span);
            tokens.push(Token::new(TokenKind::Eof, end));
        }
        Self {
            tokens,
            pos: 0,
            source_file,
            errors: CompileErrors::empty(),
            symbols: SymbolTable::new(),
            in_stencil: false,
            expr_depth: 0,
        }
    }

    /// Parse the whole program.
    pub fn parse(mut self) -> ParseResult {
        let mut statements = Vec::new();
        self.skip_newlines();
        while !self.at_end() && !self.too_many_errors() {
            if self.check_exact(&TokenKind::RBrace) {
                self.error_at_current(ErrorCode::UNCLOSED_BRACE, "unmatched '}'");
                self.advance();
                self.skip_newlines();
                continue;
            }
            match self.parse_statement() {
                Some(stmt) => statements.push(stmt),
                None => self.synchronize(),
            }
            self.skip_newlines();
        }
        let program = self.actions().program(statements);
        debug!(
            statements = program.children().len(),
            errors = self.errors.total_errors,
            "parsed"
        );
        ParseResult {
            program: (!self.errors.has_errors()).then_some(program),
            symbols: self.symbols,
            errors: self.errors,
        }
    }

    // ── Semantic actions ──────────────────────────────────────────────────────

    pub(crate) fn actions(&mut self) -> SemanticActions<'_> {
        SemanticActions::new(&mut self.symbols)
    }

    pub(crate) fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Record a rejected production at `span`.
    pub(crate) fn report<T>(&mut self, result: SemaResult<T>, span: Span) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.error_at(err.code, err.message, span);
                None
            }
        }
    }

    /// Span from `start` to the end of the last consumed token.
    pub(crate) fn span_from(&self, start: Span) -> Span {
        start.merge(self.previous_span())
    }

    // ── Token Cursor ──────────────────────────────────────────────────────────

    pub(crate) fn peek(&self) -> &Token {
        let index = self.pos.min(self.tokens.len().saturating_sub(1));
        &self.tokens[index]
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    /// Advance the cursor by one and return the consumed token.
    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn previous_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            Span::point(1, 1)
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn check_exact(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    /// If the current token matches, advance and return `true`.
    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check_exact(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Look ahead by `n` tokens from current position.
    pub(crate) fn look_ahead(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    /// Offset of the token closing the bracket that opens at offset `open`,
    /// or `None` if the statement ends first.
    pub(crate) fn matching_close(&self, open: usize) -> Option<usize> {
        let (left, right) = match self.look_ahead(open) {
            TokenKind::LParen => (TokenKind::LParen, TokenKind::RParen),
            TokenKind::LBracket => (TokenKind::LBracket, TokenKind::RBracket),
            _ => return None,
        };
        let mut depth = 0usize;
        let mut offset = open;
        loop {
            let kind = self.look_ahead(offset);
            if *kind == left {
                depth += 1;
            } else if *kind == right {
                depth -= 1;
                if depth == 0 {
                    return Some(offset);
                }
            } else if matches!(kind, TokenKind::Newline | TokenKind::Eof) {
                return None;
            }
            offset += 1;
        }
    }

    // ── Newline Handling ──────────────────────────────────────────────────────

    pub(crate) fn skip_newlines(&mut self) {
        while self.check_exact(&TokenKind::Newline) {
            self.advance();
        }
    }

    /// A statement ends at a newline, the end of input or a closing brace.
    pub(crate) fn at_statement_end(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Newline | TokenKind::Eof | TokenKind::RBrace
        )
    }

    // ── Expect Helpers ────────────────────────────────────────────────────────

    pub(crate) fn expect(&mut self, expected: &TokenKind) -> Option<Token> {
        if self.check_exact(expected) {
            Some(self.advance())
        } else {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected '{}', got '{}'", expected, self.peek_kind()),
            );
            None
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> Option<(String, Span)> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                let span = self.advance().span;
                Some((name, span))
            }
            _ => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected identifier, got '{}'", self.peek_kind()),
                );
                None
            }
        }
    }

    // ── Error Reporting ───────────────────────────────────────────────────────

    pub(crate) fn error_at_current(&mut self, code: ErrorCode, message: impl Into<String>) {
        let span = self.current_span();
        self.error_at(code, message, span);
    }

    pub(crate) fn error_at(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        let error = EquelleError::new(&self.source_file.name, code, message, span, source_line);
        self.errors.push_error(error);
    }

    pub(crate) fn too_many_errors(&self) -> bool {
        self.errors.is_full()
    }

    // ── Synchronization ───────────────────────────────────────────────────────

    /// Skip to the start of the next statement. Stops before a closing
    /// brace so the enclosing block can consume it.
    pub(crate) fn synchronize(&mut self) {
        while !self.at_end() {
            match self.peek_kind() {
                TokenKind::Newline => {
                    self.skip_newlines();
                    return;
                }
                TokenKind::RBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Skip the rest of a statement together with the `{ ... }` block it
    /// opens, without entering any scope.
    pub(crate) fn skip_block(&mut self) {
        while !self.at_end() && !self.check_exact(&TokenKind::LBrace) {
            if self.check_exact(&TokenKind::Newline)
                && !matches!(self.look_ahead(1), TokenKind::LBrace)
            {
                return;
            }
            self.advance();
        }
        let mut depth = 0usize;
        while !self.at_end() {
            match self.advance().kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }
}
