//! Expression parsing with full operator precedence.
//!
//! Precedence (lowest → highest):
//! 7. `? :` (trinary)
//! 6. `==`, `!=`, `<`, `>`, `<=`, `>=` (no chaining)
//! 5. `+`, `-`
//! 4. `*`, `/`
//! 3. `On`, `Extend`
//! 2. unary `-`
//! 1. `[]` (random access, stencil access), `()` (call)

use equelle_lexer::TokenKind;
use equelle_types::ast::{BinaryOp, CompareOp, Node, RelationOp};
use equelle_types::ErrorCode;

use crate::parser::Parser;

/// Deepest allowed nesting of parenthesized, negated or conditional
/// sub-expressions.
pub const MAX_EXPR_DEPTH: usize = 64;

impl<'src> Parser<'src> {
    // ══════════════════════════════════════════════════════════════════════════
    // Entry Point
    // ══════════════════════════════════════════════════════════════════════════

    pub(crate) fn parse_expression(&mut self) -> Option<Node> {
        self.nested(Self::parse_trinary)
    }

    /// Run `parse` one nesting level deeper, failing past [`MAX_EXPR_DEPTH`].
    fn nested(&mut self, parse: impl FnOnce(&mut Self) -> Option<Node>) -> Option<Node> {
        if self.expr_depth >= MAX_EXPR_DEPTH {
            self.error_at_current(
                ErrorCode::NESTING_TOO_DEEP,
                format!("maximum expression nesting depth is {MAX_EXPR_DEPTH}"),
            );
            return None;
        }
        self.expr_depth += 1;
        let result = parse(self);
        self.expr_depth -= 1;
        result
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Precedence Chain
    // ══════════════════════════════════════════════════════════════════════════

    /// `Trinary = Comparison [ "?" Trinary ":" Trinary ]`
    fn parse_trinary(&mut self) -> Option<Node> {
        let start = self.current_span();
        let predicate = self.parse_comparison()?;
        if !self.eat(&TokenKind::Question) {
            return Some(predicate);
        }
        let if_true = self.parse_expression()?;
        self.expect(&TokenKind::Colon)?;
        let if_false = self.parse_expression()?;
        let result = self.actions().trinary(predicate, if_true, if_false);
        self.report(result, self.span_from(start))
    }

    /// `Comparison = Additive [ CompOp Additive ]`
    fn parse_comparison(&mut self) -> Option<Node> {
        let start = self.current_span();
        let left = self.parse_additive()?;
        let Some(op) = self.match_comparison_op() else {
            return Some(left);
        };
        self.advance();
        let right = self.parse_additive()?;
        if self.match_comparison_op().is_some() {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                "comparison operators cannot be chained",
            );
            return None;
        }
        let result = self.actions().comparison(op, left, right);
        self.report(result, self.span_from(start))
    }

    fn match_comparison_op(&self) -> Option<CompareOp> {
        match self.peek_kind() {
            TokenKind::EqEq => Some(CompareOp::Equal),
            TokenKind::BangEq => Some(CompareOp::NotEqual),
            TokenKind::Less => Some(CompareOp::Less),
            TokenKind::Greater => Some(CompareOp::Greater),
            TokenKind::LessEq => Some(CompareOp::LessEqual),
            TokenKind::GreaterEq => Some(CompareOp::GreaterEqual),
            _ => None,
        }
    }

    /// `Additive = Multiplicative { ("+" | "-") Multiplicative }`
    pub(crate) fn parse_additive(&mut self) -> Option<Node> {
        let start = self.current_span();
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                _ => return Some(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            let result = self.actions().binary(op, left, right);
            left = self.report(result, self.span_from(start))?;
        }
    }

    /// `Multiplicative = Relation { ("*" | "/") Relation }`
    fn parse_multiplicative(&mut self) -> Option<Node> {
        let start = self.current_span();
        let mut left = self.parse_relation()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                _ => return Some(left),
            };
            self.advance();
            let right = self.parse_relation()?;
            let result = self.actions().binary(op, left, right);
            left = self.report(result, self.span_from(start))?;
        }
    }

    /// `Relation = Unary { ("On" | "Extend") Unary }`
    fn parse_relation(&mut self) -> Option<Node> {
        let start = self.current_span();
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::On => RelationOp::On,
                TokenKind::Extend => RelationOp::Extend,
                _ => return Some(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            let result = self.actions().relation(op, left, right);
            left = self.report(result, self.span_from(start))?;
        }
    }

    /// `Unary = "-" Unary | Postfix`
    fn parse_unary(&mut self) -> Option<Node> {
        let start = self.current_span();
        if self.eat(&TokenKind::Minus) {
            let operand = self.nested(Self::parse_unary)?;
            let result = self.actions().negate(operand);
            return self.report(result, self.span_from(start));
        }
        self.parse_postfix()
    }

    /// `Postfix = Primary { "[" Number "]" }`
    fn parse_postfix(&mut self) -> Option<Node> {
        let start = self.current_span();
        let mut expr = self.parse_primary()?;
        while self.eat(&TokenKind::LBracket) {
            let index = match self.peek_kind().clone() {
                TokenKind::Number(text) => text.parse::<usize>().ok(),
                _ => None,
            };
            let Some(index) = index else {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected an integer index, got '{}'", self.peek_kind()),
                );
                return None;
            };
            self.advance();
            self.expect(&TokenKind::RBracket)?;
            let result = self.actions().random_access(expr, index);
            expr = self.report(result, self.span_from(start))?;
        }
        Some(expr)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Primary
    // ══════════════════════════════════════════════════════════════════════════

    fn parse_primary(&mut self) -> Option<Node> {
        let start = self.current_span();
        match self.peek_kind().clone() {
            TokenKind::Number(text) => {
                self.advance();
                let result = self.actions().number(&text);
                self.report(result, start)
            }
            TokenKind::StringLiteral(text) => {
                self.advance();
                Some(self.actions().string(&text))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                Some(inner)
            }
            TokenKind::Pipe => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::Pipe)?;
                let result = self.actions().norm(inner);
                self.report(result, self.span_from(start))
            }
            TokenKind::LBracket => {
                self.advance();
                let elements = self.parse_expression_list(&TokenKind::RBracket)?;
                let result = self.actions().array_literal(elements);
                self.report(result, self.span_from(start))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                match self.peek_kind().clone() {
                    TokenKind::LParen => {
                        self.advance();
                        let args = self.parse_expression_list(&TokenKind::RParen)?;
                        let result = self.actions().function_call(&name, args);
                        self.report(result, self.span_from(start))
                    }
                    TokenKind::LBracket if self.in_stencil => {
                        let indices = self.parse_stencil_indices()?;
                        let result = self.actions().stencil_access(&name, indices);
                        self.report(result, self.span_from(start))
                    }
                    _ if self.in_stencil
                        && matches!(name.as_str(), "i" | "j" | "k")
                        && !self.symbols().is_variable_declared(&name) =>
                    {
                        let result = self.actions().stencil_index(&name);
                        self.report(result, start)
                    }
                    _ => {
                        let result = self.actions().identifier(&name);
                        self.report(result, start)
                    }
                }
            }
            other => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected expression, got '{other}'"),
                );
                None
            }
        }
    }

    /// Comma-separated expressions up to and including `close`.
    fn parse_expression_list(&mut self, close: &TokenKind) -> Option<Vec<Node>> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Some(items);
        }
        loop {
            items.push(self.parse_expression()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Some(items)
    }

    /// `[ index, index [, index] ]` after a stencil grid name.
    pub(crate) fn parse_stencil_indices(&mut self) -> Option<Vec<Node>> {
        self.expect(&TokenKind::LBracket)?;
        self.parse_expression_list(&TokenKind::RBracket)
    }
}
