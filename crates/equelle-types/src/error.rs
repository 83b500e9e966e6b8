use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of errors stored before the rest are only counted.
pub const MAX_ERRORS: usize = 20;

/// Error category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Syntax,
    Type,
    Domain,
    Scope,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Syntax => "syntax",
            Self::Type => "type",
            Self::Domain => "domain",
            Self::Scope => "scope",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Numeric error code, displayed as `E###`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Syntax errors (E100–E199) ──
    pub const UNEXPECTED_TOKEN: Self = Self(100);
    pub const UNCLOSED_BRACE: Self = Self(101);
    pub const UNTERMINATED_STRING: Self = Self(102);
    pub const INVALID_NUMBER: Self = Self(103);
    pub const UNEXPECTED_CHARACTER: Self = Self(104);
    pub const NESTING_TOO_DEEP: Self = Self(105);

    // ── Type errors (E200–E299) ──
    pub const TYPE_MISMATCH: Self = Self(201);
    pub const WRONG_ARG_COUNT: Self = Self(202);
    pub const NOT_NUMERIC: Self = Self(203);
    pub const ARRAY_OPERAND: Self = Self(204);
    pub const INVALID_OPERAND: Self = Self(205);
    pub const NOT_A_SEQUENCE: Self = Self(206);
    pub const INDEX_OUT_OF_RANGE: Self = Self(207);
    pub const RETURN_TYPE_MISMATCH: Self = Self(208);
    pub const INVALID_TYPE_EXPRESSION: Self = Self(209);
    pub const EMPTY_ARRAY: Self = Self(210);
    pub const NOT_BOOLEAN: Self = Self(211);

    // ── Domain errors (E300–E399) ──
    pub const DOMAIN_MISMATCH: Self = Self(300);
    pub const NOT_A_SUBSET: Self = Self(301);
    pub const NOT_A_DOMAIN: Self = Self(302);
    pub const NOT_ENTITY_COLLECTION: Self = Self(303);
    pub const NOT_A_COLLECTION: Self = Self(304);

    // ── Scope errors (E500–E599) ──
    pub const VARIABLE_ALREADY_DECLARED: Self = Self(500);
    pub const VARIABLE_ALREADY_ASSIGNED: Self = Self(501);
    pub const UNKNOWN_VARIABLE: Self = Self(502);
    pub const UNKNOWN_FUNCTION: Self = Self(503);
    pub const NESTED_FUNCTION: Self = Self(504);
    pub const FUNCTION_ALREADY_DEFINED: Self = Self(505);
    pub const PARAMETER_MISMATCH: Self = Self(506);
    pub const RETURN_OUTSIDE_FUNCTION: Self = Self(507);

    // ── Internal compiler errors (E900) ──
    pub const INTERNAL: Self = Self(900);

    pub fn category(self) -> ErrorCategory {
        match self.0 {
            100..=199 => ErrorCategory::Syntax,
            200..=299 => ErrorCategory::Type,
            300..=399 => ErrorCategory::Domain,
            500..=599 => ErrorCategory::Scope,
            _ => ErrorCategory::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// A located Equelle diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{span}: {code} [{category}] {message}")]
pub struct EquelleError {
    pub file: String,
    pub code: ErrorCode,
    pub category: ErrorCategory,
    pub message: String,
    #[serde(flatten)]
    pub span: Span,
    /// The offending source line, for context.
    pub source_line: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl EquelleError {
    pub fn new(
        file: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
        span: Span,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            code,
            category: code.category(),
            message: message.into(),
            span,
            source_line: source_line.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// All diagnostics produced by one compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompileErrors {
    pub errors: Vec<EquelleError>,
    pub total_errors: usize,
}

impl CompileErrors {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// Whether the stored-error cap has been reached.
    pub fn is_full(&self) -> bool {
        self.total_errors >= MAX_ERRORS
    }

    /// Add an error, storing at most [`MAX_ERRORS`].
    pub fn push_error(&mut self, error: EquelleError) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(error);
        }
        self.total_errors += 1;
    }

    /// Append another stage's diagnostics.
    pub fn extend(&mut self, other: CompileErrors) {
        let uncounted = other.total_errors.saturating_sub(other.errors.len());
        for error in other.errors {
            self.push_error(error);
        }
        self.total_errors += uncounted;
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for error in &self.errors {
            writeln!(f, "{}:{error}", error.file)?;
        }
        if self.total_errors > self.errors.len() {
            writeln!(f, "... and {} more", self.total_errors - self.errors.len())?;
        }
        Ok(())
    }
}
