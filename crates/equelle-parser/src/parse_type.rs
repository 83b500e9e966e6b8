//! Type expression parsing.
//!
//! ```text
//! Type         = "Mutable" Type
//!              | "Collection" "Of" Basic [ "On" Expr | "Subset" "Of" Expr ]
//!              | "Sequence" "Of" Basic
//!              | "Array" "Of" Number Type
//!              | Basic
//! FunctionType = "Function" "(" [ Param { "," Param } ] ")" "->" Type
//! Param        = Ident ":" Type
//! ```

use equelle_lexer::TokenKind;
use equelle_sema::CollectionQualifier;
use equelle_types::ast::Node;
use equelle_types::{BasicKind, ErrorCode, Span};

use crate::parser::Parser;

impl<'src> Parser<'src> {
    pub(crate) fn parse_type(&mut self) -> Option<Node> {
        let start = self.current_span();
        match self.peek_kind().clone() {
            TokenKind::Mutable => {
                self.advance();
                let base = self.parse_type()?;
                let result = self.actions().mutable_type(base);
                self.report(result, self.span_from(start))
            }
            TokenKind::Collection => {
                self.advance();
                self.expect(&TokenKind::Of)?;
                let base = self.parse_basic_type()?;
                let qualifier = if self.eat(&TokenKind::On) {
                    Some((CollectionQualifier::On, self.parse_additive()?))
                } else if self.eat(&TokenKind::Subset) {
                    self.expect(&TokenKind::Of)?;
                    Some((CollectionQualifier::SubsetOf, self.parse_additive()?))
                } else {
                    None
                };
                let result = self.actions().collection_type(base, qualifier);
                self.report(result, self.span_from(start))
            }
            TokenKind::Sequence => {
                self.advance();
                self.expect(&TokenKind::Of)?;
                let base = self.parse_basic_type()?;
                let result = self.actions().sequence_type(base);
                self.report(result, self.span_from(start))
            }
            TokenKind::Array => {
                self.advance();
                self.expect(&TokenKind::Of)?;
                let TokenKind::Number(size) = self.peek_kind().clone() else {
                    self.error_at_current(
                        ErrorCode::UNEXPECTED_TOKEN,
                        format!("expected array size, got '{}'", self.peek_kind()),
                    );
                    return None;
                };
                self.advance();
                let base = self.parse_type()?;
                let result = self.actions().array_type(&size, base);
                self.report(result, self.span_from(start))
            }
            _ => self.parse_basic_type(),
        }
    }

    fn parse_basic_type(&mut self) -> Option<Node> {
        let kind = match self.peek_kind() {
            TokenKind::Scalar => BasicKind::Scalar,
            TokenKind::Vector => BasicKind::Vector,
            TokenKind::Bool => BasicKind::Bool,
            TokenKind::KwString => BasicKind::String,
            TokenKind::Cell => BasicKind::Cell,
            TokenKind::Face => BasicKind::Face,
            TokenKind::Edge => BasicKind::Edge,
            TokenKind::Vertex => BasicKind::Vertex,
            other => {
                let message = format!("expected a type, got '{other}'");
                self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, message);
                return None;
            }
        };
        self.advance();
        Some(self.actions().basic_type(kind))
    }

    // ── Function types ────────────────────────────────────────────────────────

    /// `name : Function(...) -> T`, with the cursor on `Function`.
    pub(crate) fn parse_function_declaration(&mut self, name: &str, start: Span) -> Option<Node> {
        let pending = self.actions().begin_function_type();
        let Some(type_expr) = self.parse_function_type() else {
            let result = self.actions().abandon_function_type(pending);
            self.report(result, self.span_from(start));
            return None;
        };
        let result = self
            .actions()
            .function_declaration(name, pending, type_expr);
        let declared = self.report(result, self.span_from(start));
        if declared.is_none() {
            let result = self.actions().abandon_function_type(pending);
            self.report(result, self.span_from(start));
        }
        declared
    }

    fn parse_function_type(&mut self) -> Option<Node> {
        let start = self.current_span();
        self.expect(&TokenKind::Function)?;
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check_exact(&TokenKind::RParen) {
            loop {
                params.push(self.parse_parameter()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::Arrow)?;
        let ret = self.parse_type()?;
        let result = self.actions().function_type(params, ret);
        self.report(result, self.span_from(start))
    }

    /// `name : T` inside a function type. Declared in the pending scope.
    fn parse_parameter(&mut self) -> Option<Node> {
        let (name, start) = self.expect_identifier()?;
        self.expect(&TokenKind::Colon)?;
        let ty = self.parse_type()?;
        let result = self.actions().declaration(&name, ty);
        self.report(result, self.span_from(start))
    }
}
