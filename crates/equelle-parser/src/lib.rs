//! Equelle grammar driver.
//!
//! A recursive-descent parser over the token stream. Every production it
//! recognizes is handed to one [`equelle_sema::SemanticActions`] handler,
//! which type-checks it and builds the node.

mod parse_expr;
mod parse_stmt;
mod parse_type;
mod parser;

pub use parse_expr::MAX_EXPR_DEPTH;
pub use parser::{ParseResult, Parser};

use equelle_lexer::Lexer;
use equelle_types::SourceFile;

/// Lex and parse a whole source file.
///
/// Lexer errors come first in the returned diagnostics. A program is only
/// returned when no diagnostic was produced at all.
pub fn parse(source_file: &SourceFile) -> ParseResult {
    let lexed = Lexer::new(source_file).lex();
    let mut result = Parser::new(lexed.tokens, source_file).parse();
    if lexed.errors.has_errors() {
        let mut errors = lexed.errors;
        errors.extend(result.errors);
        result.errors = errors;
        result.program = None;
    }
    result
}
