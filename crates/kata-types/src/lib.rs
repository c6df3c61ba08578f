//! Shared types for the kata script toolchain.
//!
//! This crate defines the AST node types, source spans, and diagnostic
//! types shared by the lexer, the parser, and the interpreter.

mod error;
mod span;
pub mod ast;

pub use error::{Diagnostics, ErrorCategory, ErrorCode, ScriptError, Severity, MAX_ERRORS};
pub use span::{SourceFile, Span};

/// Result type used by the front-end stages.
pub type Result<T> = std::result::Result<T, ScriptError>;
