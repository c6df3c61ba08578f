//! Isolated evaluation of solution code.
//!
//! Every [`Sandbox::evaluate`] builds a brand-new [`Interpreter`] whose only
//! globals are the builtins, so no state survives from one evaluation to the
//! next. Failures are captured as [`ExecutionError`] values.

use kata_parser::parse_source;
use kata_types::ast::Program;
use kata_types::{Diagnostics, SourceFile};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::error::EvalError;
use crate::interpreter::Interpreter;
use crate::value::{Value, MAX_ARRAY_LENGTH, MAX_STRING_LENGTH};

/// Default ceiling on nested calls.
///
/// Every script call nests several native frames, so this depth needs far
/// more than the 2 MiB a default spawned thread gets. Run
/// [`Sandbox::evaluate`] on a thread spawned with a large stack (the `kata`
/// binary uses 256 MiB), or use [`SandboxConfig::small_stack`] on a
/// default-sized thread.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 2000;

/// A call depth that fits the 2 MiB stack of a default spawned thread.
pub const SMALL_STACK_MAX_CALL_DEPTH: usize = 64;

/// File name used in diagnostics for evaluated source.
pub const SOLUTION_FILE: &str = "solution.js";

/// Limits applied to every evaluation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Step budget per evaluation; `None` means unbounded.
    pub gas_limit: Option<u64>,
    /// Nested calls allowed before `RangeError: Maximum call stack size
    /// exceeded`. See [`DEFAULT_MAX_CALL_DEPTH`] for the native stack this
    /// needs.
    pub max_call_depth: usize,
    /// Longest string in bytes, capped at [`MAX_STRING_LENGTH`].
    pub max_string_length: usize,
    /// Longest array, capped at [`MAX_ARRAY_LENGTH`].
    pub max_array_length: usize,
}

impl SandboxConfig {
    /// Defaults, with the call depth lowered to
    /// [`SMALL_STACK_MAX_CALL_DEPTH`].
    pub fn small_stack() -> Self {
        Self {
            max_call_depth: SMALL_STACK_MAX_CALL_DEPTH,
            ..Self::default()
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            gas_limit: None,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_string_length: MAX_STRING_LENGTH,
            max_array_length: MAX_ARRAY_LENGTH,
        }
    }
}

/// User code failed to parse or threw while running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("SyntaxError: {}", syntax_summary(.0))]
    Syntax(Diagnostics),
    /// A runtime error, rendered `Kind: message`.
    #[error("{0}")]
    Runtime(String),
    #[error("RangeError: step budget of {0} exhausted")]
    GasExhausted(u64),
}

fn syntax_summary(diagnostics: &Diagnostics) -> String {
    match diagnostics.first() {
        Some(first) => format!("{} ({})", first.message, first.span),
        None => "invalid source".to_string(),
    }
}

impl From<EvalError> for ExecutionError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::GasExhausted(limit) => ExecutionError::GasExhausted(limit),
            other => ExecutionError::Runtime(other.to_string()),
        }
    }
}

/// The result of one evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Completion value of the program.
    pub value: Value,
    /// Captured `console.log` output.
    pub logs: Vec<String>,
}

/// Capability-free evaluation service.
#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    config: SandboxConfig,
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// `fn_name(args)`, with `args` spliced in as source text.
    pub fn call_expression(fn_name: &str, args: &str) -> String {
        format!("{fn_name}({args})")
    }

    /// Run `source` followed by `call` as one program in a fresh context.
    ///
    /// Recursion in `source` recurses natively, so the calling thread's
    /// stack must suit [`SandboxConfig::max_call_depth`].
    pub fn evaluate(&self, source: &str, call: &str) -> Result<Evaluation, ExecutionError> {
        trace!(call, "evaluating");
        let program = parse_program(SOLUTION_FILE, &format!("{source}\n{call}"))?;
        let mut interpreter = Interpreter::new(&self.config);
        let value = interpreter.run(&program)?;
        Ok(Evaluation {
            value,
            logs: interpreter.take_logs(),
        })
    }

    /// Parse without running; reports the same `Syntax` error `evaluate` would.
    pub fn check_syntax(source: &str) -> Result<(), ExecutionError> {
        parse_program(SOLUTION_FILE, source).map(|_| ())
    }

    /// The first syntax error in `source` as `line:col: message` followed by
    /// the offending line and a caret marker. `None` when `source` parses.
    pub fn syntax_excerpt(source: &str) -> Option<String> {
        let Err(ExecutionError::Syntax(diagnostics)) = Self::check_syntax(source) else {
            return None;
        };
        let first = diagnostics.first()?;
        let excerpt = SourceFile::new(SOLUTION_FILE, source).excerpt(first.span)?;
        Some(format!(
            "{}:{}: {}\n{excerpt}",
            first.span.start_line, first.span.start_col, first.message
        ))
    }

    pub(crate) fn interpreter(&self) -> Interpreter {
        Interpreter::new(&self.config)
    }
}

pub(crate) fn parse_program(name: &str, text: &str) -> Result<Program, ExecutionError> {
    let source = SourceFile::new(name, text);
    let parsed = parse_source(&source);
    match parsed.program {
        Some(program) if !parsed.errors.has_errors() => Ok(program),
        _ => Err(ExecutionError::Syntax(parsed.errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_stack_config_recovers_on_a_default_thread() {
        let outcome = std::thread::spawn(|| {
            Sandbox::new(SandboxConfig::small_stack())
                .evaluate("function f(n) { return n === 0 ? 0 : 1 + f(n - 1); }", "f(1500)")
                .map(|evaluation| evaluation.value.to_string())
        })
        .join()
        .expect("evaluation thread panicked");
        assert_eq!(
            outcome,
            Err(ExecutionError::Runtime(
                "RangeError: Maximum call stack size exceeded".to_string()
            ))
        );
    }

    #[test]
    fn call_expression_splices_source_text() {
        assert_eq!(Sandbox::call_expression("add", "2,3"), "add(2,3)");
        assert_eq!(Sandbox::call_expression("f", ""), "f()");
    }

    #[test]
    fn syntax_errors_carry_diagnostics() {
        let err = Sandbox::check_syntax("function (").unwrap_err();
        let ExecutionError::Syntax(diagnostics) = &err else {
            panic!("expected syntax error, got {err:?}");
        };
        assert!(diagnostics.has_errors());
        assert!(err.to_string().starts_with("SyntaxError: "));
    }

    #[test]
    fn syntax_excerpt_marks_the_offending_line() {
        let excerpt = Sandbox::syntax_excerpt("let x = 1;\nlet y = @;").unwrap();
        assert!(excerpt.starts_with("2:"), "{excerpt}");
        assert!(excerpt.contains("\nlet y = @;\n"), "{excerpt}");
        assert!(excerpt.ends_with('^'), "{excerpt}");
        assert_eq!(Sandbox::syntax_excerpt("let x = 1;"), None);
    }

    #[test]
    fn runtime_errors_render_kind_and_message() {
        let err: ExecutionError = EvalError::type_error("x is not a function").into();
        assert_eq!(err.to_string(), "TypeError: x is not a function");
        let err: ExecutionError = EvalError::GasExhausted(5).into();
        assert_eq!(err, ExecutionError::GasExhausted(5));
    }

    #[test]
    fn default_config_is_unbounded() {
        let config = SandboxConfig::default();
        assert_eq!(config.gas_limit, None);
        assert_eq!(config.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
        let parsed: SandboxConfig = serde_json::from_str(r#"{"gas_limit": 10}"#).unwrap();
        assert_eq!(parsed.gas_limit, Some(10));
        assert_eq!(parsed.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
    }
}
