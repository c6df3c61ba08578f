//! Runtime error types for the interpreter.

use std::fmt;

use crate::value::Value;

/// The built-in error families a script can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    TypeError,
    ReferenceError,
    RangeError,
    SyntaxError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::SyntaxError => "SyntaxError",
        }
    }
}

/// Evaluation error: a raised built-in error, a user `throw`, or an
/// exhausted step budget.
#[derive(Debug, Clone)]
pub enum EvalError {
    /// Raised by the interpreter itself (`x is not defined`, ...).
    Raised { kind: ErrorKind, message: String },
    /// `throw value`
    Thrown(Value),
    /// Step budget exhausted. Not catchable by `try`.
    GasExhausted(u64),
}

impl EvalError {
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Raised {
            kind: ErrorKind::TypeError,
            message: message.into(),
        }
    }

    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::Raised {
            kind: ErrorKind::ReferenceError,
            message: message.into(),
        }
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Self::Raised {
            kind: ErrorKind::RangeError,
            message: message.into(),
        }
    }

    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self::Raised {
            kind: ErrorKind::SyntaxError,
            message: message.into(),
        }
    }

    /// Whether a `catch` clause may intercept this error.
    pub fn is_catchable(&self) -> bool {
        !matches!(self, Self::GasExhausted(_))
    }

    /// The value a `catch (e)` binding receives.
    pub fn into_value(self) -> Value {
        match self {
            Self::Raised { kind, message } => Value::error_object(kind.as_str(), &message),
            Self::Thrown(value) => value,
            Self::GasExhausted(limit) => {
                Value::error_object("RangeError", &format!("step budget of {limit} exhausted"))
            }
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raised { kind, message } => write!(f, "{}: {message}", kind.as_str()),
            Self::Thrown(value) => match value.error_parts() {
                Some((name, message)) if message.is_empty() => write!(f, "{name}"),
                Some((name, message)) => write!(f, "{name}: {message}"),
                None => write!(f, "Uncaught {}", value.inspect()),
            },
            Self::GasExhausted(limit) => write!(f, "RangeError: step budget of {limit} exhausted"),
        }
    }
}

impl std::error::Error for EvalError {}

/// Result alias for interpreter operations.
pub type EvalResult<T> = Result<T, EvalError>;
