use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of diagnostics stored before the front end stops collecting.
pub const MAX_ERRORS: usize = 20;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// Diagnostic category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Syntax,
    Structure,
}

/// Numeric diagnostic code (E100–E299).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Syntax errors (E100–E199) ──
    pub const UNEXPECTED_TOKEN: Self = Self(100);
    pub const UNCLOSED_DELIMITER: Self = Self(101);
    pub const UNTERMINATED_STRING: Self = Self(102);
    pub const INVALID_ESCAPE: Self = Self(103);
    pub const INVALID_NUMBER: Self = Self(104);
    pub const INVALID_ASSIGNMENT_TARGET: Self = Self(105);
    pub const UNEXPECTED_CHARACTER: Self = Self(106);

    // ── Structure errors (E200–E299) ──
    pub const RETURN_OUTSIDE_FUNCTION: Self = Self(200);
    pub const JUMP_OUTSIDE_LOOP: Self = Self(201);
    pub const STRUCTURAL_LIMIT_EXCEEDED: Self = Self(202);
    pub const CONST_WITHOUT_INITIALIZER: Self = Self(203);

    /// Get the category for this code.
    pub fn category(self) -> ErrorCategory {
        match self.0 {
            200..=299 => ErrorCategory::Structure,
            _ => ErrorCategory::Syntax,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "syntax"),
            Self::Structure => write!(f, "structure"),
        }
    }
}

/// A structured diagnostic raised while lexing or parsing script source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptError {
    /// Source file name.
    pub file: String,
    pub code: ErrorCode,
    pub severity: Severity,
    /// Derived from `code`.
    pub category: ErrorCategory,
    pub message: String,
    #[serde(flatten)]
    pub span: Span,
    /// The offending source line, verbatim.
    pub source_line: String,
}

impl ScriptError {
    /// Create a new error-severity diagnostic.
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
            severity: Severity::Error,
            category: code.category(),
            message: message.into(),
            span,
            source_line: source_line.into(),
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} [{}] {}",
            self.file, self.span, self.code, self.category, self.message
        )
    }
}

impl std::error::Error for ScriptError {}

/// Diagnostics collected by one front-end pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub errors: Vec<ScriptError>,
    pub total_errors: usize,
}

impl Diagnostics {
    /// Create an empty diagnostic list.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// Add an error, respecting the [`MAX_ERRORS`] limit.
    pub fn push_error(&mut self, error: ScriptError) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(error);
        }
        self.total_errors += 1;
    }

    /// Returns `true` once enough errors were seen that scanning should stop.
    pub fn is_saturated(&self) -> bool {
        self.total_errors >= MAX_ERRORS
    }

    /// Append everything from `other`.
    pub fn extend(&mut self, other: Diagnostics) {
        let dropped = other.total_errors - other.errors.len();
        for err in other.errors {
            self.push_error(err);
        }
        self.total_errors += dropped;
    }

    /// The first stored error, if any.
    pub fn first(&self) -> Option<&ScriptError> {
        self.errors.first()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        let hidden = self.total_errors - self.errors.len();
        if hidden > 0 {
            write!(f, "\n... and {hidden} more")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(message: &str, line: u32) -> ScriptError {
        ScriptError::new(
            "solution.js",
            ErrorCode::UNEXPECTED_TOKEN,
            message,
            Span::point(line, 1),
            "",
        )
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::UNEXPECTED_TOKEN.category(), ErrorCategory::Syntax);
        assert_eq!(ErrorCode::INVALID_ESCAPE.category(), ErrorCategory::Syntax);
        assert_eq!(
            ErrorCode::RETURN_OUTSIDE_FUNCTION.category(),
            ErrorCategory::Structure
        );
        assert_eq!(
            ErrorCode::STRUCTURAL_LIMIT_EXCEEDED.category(),
            ErrorCategory::Structure
        );
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(format!("{}", ErrorCode::UNEXPECTED_TOKEN), "E100");
        assert_eq!(format!("{}", ErrorCode::JUMP_OUTSIDE_LOOP), "E201");
    }

    #[test]
    fn test_script_error_display() {
        let err = ScriptError::new(
            "solution.js",
            ErrorCode::UNTERMINATED_STRING,
            "unterminated string literal",
            Span::new(3, 9, 3, 14),
            "  return 'abc",
        );
        assert_eq!(
            err.to_string(),
            "solution.js:3:9: E102 [syntax] unterminated string literal"
        );
        assert_eq!(err.severity, Severity::Error);
    }

    #[test]
    fn test_script_error_json_fields() {
        let err = sample("expected ')'", 4);
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"code\":100"));
        assert!(json.contains("\"line\":4"));
        assert!(json.contains("\"severity\":\"error\""));
        let back: ScriptError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_diagnostics_max_limit() {
        let mut diags = Diagnostics::empty();
        for i in 0..25 {
            diags.push_error(sample(&format!("error {i}"), i as u32 + 1));
        }
        assert_eq!(diags.errors.len(), MAX_ERRORS);
        assert_eq!(diags.total_errors, 25);
        assert!(diags.is_saturated());
        assert!(diags.to_string().ends_with("... and 5 more"));
    }

    #[test]
    fn test_diagnostics_extend_keeps_totals() {
        let mut a = Diagnostics::empty();
        a.push_error(sample("one", 1));
        let mut b = Diagnostics::empty();
        b.push_error(sample("two", 2));
        b.push_error(sample("three", 3));
        a.extend(b);
        assert_eq!(a.total_errors, 3);
        assert_eq!(a.first().map(|e| e.message.as_str()), Some("one"));
    }

    #[test]
    fn test_diagnostics_empty() {
        let diags = Diagnostics::empty();
        assert!(!diags.has_errors());
        assert_eq!(diags.to_string(), "");
    }
}
