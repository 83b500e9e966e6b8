//! Token types for the Equelle lexer.

use equelle_types::Span;
use std::fmt;

/// Every reserved word in Equelle. These are capitalized, so ordinary
/// lower-case identifiers never collide with them.
pub const ALL_KEYWORDS: &[&str] = &[
    // Type constructors (9)
    "Collection", "Of", "On", "Extend", "Subset", "Mutable", "Sequence", "Array", "Function",
    // Control (2)
    "For", "In",
    // Basic types (8)
    "Scalar", "Vector", "Bool", "String", "Cell", "Face", "Edge", "Vertex",
];

// ─────────────────────────────────────────────────────────────────────
// Token
// ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

// ─────────────────────────────────────────────────────────────────────
// TokenKind
// ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ── Literals ──
    /// Numeric literal as written: `42`, `0.3`, `1e-6`
    Number(String),
    /// `"u_initial"`
    StringLiteral(String),
    Identifier(String),

    // ── Type constructors ──
    Collection,
    Of,
    On,
    Extend,
    Subset,
    Mutable,
    Sequence,
    Array,
    Function,

    // ── Control ──
    For,
    In,

    // ── Basic types ──
    Scalar,
    Vector,
    Bool,
    KwString,
    Cell,
    Face,
    Edge,
    Vertex,

    // ── Operators ──
    Plus,
    Minus,
    Star,
    Slash,
    EqEq,
    BangEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    Question,
    /// `|`, delimiting a norm
    Pipe,
    /// `->`, a return statement or function return type
    Arrow,

    // ── Punctuation ──
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Eq,

    Newline,
    Eof,
}

impl TokenKind {
    pub fn from_keyword(s: &str) -> Option<TokenKind> {
        Some(match s {
            "Collection" => TokenKind::Collection,
            "Of" => TokenKind::Of,
            "On" => TokenKind::On,
            "Extend" => TokenKind::Extend,
            "Subset" => TokenKind::Subset,
            "Mutable" => TokenKind::Mutable,
            "Sequence" => TokenKind::Sequence,
            "Array" => TokenKind::Array,
            "Function" => TokenKind::Function,
            "For" => TokenKind::For,
            "In" => TokenKind::In,
            "Scalar" => TokenKind::Scalar,
            "Vector" => TokenKind::Vector,
            "Bool" => TokenKind::Bool,
            "String" => TokenKind::KwString,
            "Cell" => TokenKind::Cell,
            "Face" => TokenKind::Face,
            "Edge" => TokenKind::Edge,
            "Vertex" => TokenKind::Vertex,
            _ => return None,
        })
    }

    pub fn is_keyword(&self) -> bool {
        ALL_KEYWORDS.iter().any(|kw| Self::from_keyword(kw).as_ref() == Some(self))
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Number(n) => return f.write_str(n),
            TokenKind::StringLiteral(s) => return write!(f, "\"{s}\""),
            TokenKind::Identifier(s) => return f.write_str(s),
            TokenKind::Collection => "Collection",
            TokenKind::Of => "Of",
            TokenKind::On => "On",
            TokenKind::Extend => "Extend",
            TokenKind::Subset => "Subset",
            TokenKind::Mutable => "Mutable",
            TokenKind::Sequence => "Sequence",
            TokenKind::Array => "Array",
            TokenKind::Function => "Function",
            TokenKind::For => "For",
            TokenKind::In => "In",
            TokenKind::Scalar => "Scalar",
            TokenKind::Vector => "Vector",
            TokenKind::Bool => "Bool",
            TokenKind::KwString => "String",
            TokenKind::Cell => "Cell",
            TokenKind::Face => "Face",
            TokenKind::Edge => "Edge",
            TokenKind::Vertex => "Vertex",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::EqEq => "==",
            TokenKind::BangEq => "!=",
            TokenKind::Less => "<",
            TokenKind::Greater => ">",
            TokenKind::LessEq => "<=",
            TokenKind::GreaterEq => ">=",
            TokenKind::Question => "?",
            TokenKind::Pipe => "|",
            TokenKind::Arrow => "->",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Eq => "=",
            TokenKind::Newline => "newline",
            TokenKind::Eof => "end of file",
        };
        f.write_str(text)
    }
}
