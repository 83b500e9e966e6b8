//! Statement parsing.
//!
//! ```text
//! Statement   = Declaration | Assignment | FunctionDef | StencilStmt
//!             | Loop | Return | CallStmt
//! Declaration = Ident ":" (FunctionType | Type [ "=" Expr ])
//! Assignment  = Ident "=" Expr
//! FunctionDef = Ident "(" [ Ident { "," Ident } ] ")" "=" Block
//! StencilStmt = Ident "[" Expr { "," Expr } "]" "=" Expr
//! Loop        = "For" Ident "In" Ident Block
//! Return      = "->" Expr
//! Block       = "{" { Statement } "}"
//! ```
//!
//! Statements end at a newline; `...` continues a line.

use equelle_lexer::TokenKind;
use equelle_types::ast::Node;
use equelle_types::ErrorCode;

use crate::parser::Parser;

impl<'src> Parser<'src> {
    /// Parse one statement, including the check that it ends cleanly.
    /// Returns `None` after recording an error; the caller resynchronizes.
    pub(crate) fn parse_statement(&mut self) -> Option<Node> {
        let stmt = match self.peek_kind().clone() {
            TokenKind::For => self.parse_loop(),
            TokenKind::Arrow => self.parse_return(),
            TokenKind::Identifier(name) => match self.look_ahead(1) {
                TokenKind::Colon => self.parse_declaration(name),
                TokenKind::Eq => self.parse_assignment(name),
                TokenKind::LBracket if self.assigns_after_brackets() => {
                    self.parse_stencil_statement(name)
                }
                TokenKind::LParen if self.assigns_after_brackets() => {
                    self.parse_function_definition(name)
                }
                _ => self.parse_call_statement(),
            },
            _ => self.parse_call_statement(),
        }?;
        if !self.at_statement_end() {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected end of statement, got '{}'", self.peek_kind()),
            );
            return None;
        }
        Some(stmt)
    }

    /// `{ statements }`. Always consumes through the closing brace when one
    /// exists, so the caller can close its scope.
    pub(crate) fn parse_block(&mut self) -> Node {
        let mut statements = Vec::new();
        if self.expect(&TokenKind::LBrace).is_none() {
            self.synchronize();
            return self.actions().program(statements);
        }
        self.skip_newlines();
        while !self.check_exact(&TokenKind::RBrace) && !self.at_end() {
            if self.too_many_errors() {
                break;
            }
            match self.parse_statement() {
                Some(stmt) => statements.push(stmt),
                None => self.synchronize(),
            }
            self.skip_newlines();
        }
        self.expect(&TokenKind::RBrace);
        self.actions().program(statements)
    }

    // ── Lookahead ─────────────────────────────────────────────────────────────

    /// `name(...) =` starts a function definition and `name[...] =` a
    /// stencil statement. Anything else after the name is an expression.
    fn assigns_after_brackets(&self) -> bool {
        self.matching_close(1)
            .is_some_and(|close| *self.look_ahead(close + 1) == TokenKind::Eq)
    }

    // ── Declarations and assignments ──────────────────────────────────────────

    /// `name : T`, `name : T = expr` or `name : Function(...) -> T`.
    fn parse_declaration(&mut self, name: String) -> Option<Node> {
        let start = self.advance().span;
        self.advance(); // ':'
        if self.check_exact(&TokenKind::Function) {
            return self.parse_function_declaration(&name, start);
        }
        let type_expr = self.parse_type()?;
        if self.eat(&TokenKind::Eq) {
            let expr = self.parse_expression()?;
            let span = self.span_from(start);
            let result = self
                .actions()
                .declaration_with_assignment(&name, type_expr, expr);
            self.report(result, span)
        } else {
            let span = self.span_from(start);
            let result = self.actions().declaration(&name, type_expr);
            self.report(result, span)
        }
    }

    /// `name = expr`
    fn parse_assignment(&mut self, name: String) -> Option<Node> {
        let start = self.advance().span;
        self.advance(); // '='
        let expr = self.parse_expression()?;
        let span = self.span_from(start);
        let result = self.actions().assignment(&name, expr);
        self.report(result, span)
    }

    /// A function call standing alone, e.g. `Output("u", u)`.
    fn parse_call_statement(&mut self) -> Option<Node> {
        let start = self.current_span();
        let expr = self.parse_expression()?;
        if matches!(expr, Node::FuncCall { .. }) {
            Some(self.actions().call_statement(expr))
        } else {
            self.error_at(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("a {} cannot stand alone as a statement", expr.kind_name()),
                self.span_from(start),
            );
            None
        }
    }

    // ── Functions ─────────────────────────────────────────────────────────────

    /// `name(a, b) = { ... }`
    fn parse_function_definition(&mut self, name: String) -> Option<Node> {
        let start = self.advance().span;
        self.advance(); // '('
        let mut params = Vec::new();
        if !self.check_exact(&TokenKind::RParen) {
            loop {
                let Some((param, _)) = self.expect_identifier() else {
                    self.skip_block();
                    return None;
                };
                params.push(param);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        if self.expect(&TokenKind::RParen).is_none() || self.expect(&TokenKind::Eq).is_none() {
            self.skip_block();
            return None;
        }

        let span = self.span_from(start);
        let result = self.actions().function_start(&name, &params);
        let Some(func_start) = self.report(result, span) else {
            self.skip_block();
            return None;
        };
        let body = self.parse_block();
        let span = self.span_from(start);
        let result = self.actions().function_definition(func_start, body);
        self.report(result, span)
    }

    /// `-> expr`
    fn parse_return(&mut self) -> Option<Node> {
        let start = self.advance().span;
        let expr = self.parse_expression()?;
        let span = self.span_from(start);
        let result = self.actions().return_statement(expr);
        self.report(result, span)
    }

    // ── Loops ─────────────────────────────────────────────────────────────────

    /// `For v In seq { ... }`
    fn parse_loop(&mut self) -> Option<Node> {
        let start = self.advance().span;
        let Some((variable, set)) = self.parse_loop_header() else {
            self.skip_block();
            return None;
        };

        let span = self.span_from(start);
        let result = self.actions().loop_start(&variable, &set);
        let Some(header) = self.report(result, span) else {
            self.skip_block();
            return None;
        };
        let body = self.parse_block();
        let span = self.span_from(start);
        let result = self.actions().loop_end(header, body);
        self.report(result, span)
    }

    fn parse_loop_header(&mut self) -> Option<(String, String)> {
        let (variable, _) = self.expect_identifier()?;
        self.expect(&TokenKind::In)?;
        let (set, _) = self.expect_identifier()?;
        Some((variable, set))
    }

    // ── Stencils ──────────────────────────────────────────────────────────────

    /// `u[i, j] = expr`
    fn parse_stencil_statement(&mut self, name: String) -> Option<Node> {
        let start = self.advance().span;
        self.in_stencil = true;
        let parsed = self.parse_stencil_parts();
        self.in_stencil = false;
        let (indices, expr) = parsed?;
        let span = self.span_from(start);
        let result = self.actions().stencil_assignment(&name, indices, expr);
        self.report(result, span)
    }

    fn parse_stencil_parts(&mut self) -> Option<(Vec<Node>, Node)> {
        let indices = self.parse_stencil_indices()?;
        self.expect(&TokenKind::Eq)?;
        let expr = self.parse_expression()?;
        Some((indices, expr))
    }
}
