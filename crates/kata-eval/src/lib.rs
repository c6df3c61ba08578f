//! kata script interpreter and sandbox.
//!
//! Runs solution source in a fresh, capability-free context: no filesystem,
//! no network, no timers. The only side effect is captured `console` output.
//!
//! ```text
//! Sandbox::evaluate(source, call) -> Evaluation { value, logs }
//! Sandbox::benchmark(source, call, config) -> BenchmarkStats
//! ```

mod bench;
mod builtins;
mod env;
mod error;
mod interpreter;
mod json;
mod methods;
mod ops;
mod sandbox;
mod value;

pub use bench::{BenchmarkConfig, BenchmarkStats};
pub use builtins::{parse_float, parse_int};
pub use error::{ErrorKind, EvalError, EvalResult};
pub use interpreter::{Interpreter, MAX_LOG_LINES};
pub use json::{stringify, to_canonical_json, to_json_value, CircularError};
pub use sandbox::{
    Evaluation, ExecutionError, Sandbox, SandboxConfig, DEFAULT_MAX_CALL_DEPTH,
    SMALL_STACK_MAX_CALL_DEPTH, SOLUTION_FILE,
};
pub use value::{
    number_to_string, Function, Limits, NativeFn, Text, Value, MAX_ARRAY_LENGTH, MAX_STRING_LENGTH,
};
