//! kata challenge engine.
//!
//! ```text
//! ChallengeSet → Challenge → TestEngine ─▶ Sandbox::evaluate ─▶ compare ─▶ Sandbox::benchmark
//!                                 │
//!                                 └─▶ SessionReport (+ ProgressEvent stream)
//! ```
//!
//! The validator drives the same per-case path against a challenge's
//! reference solution.

pub mod challenge;
pub mod compare;
pub mod config;
pub mod duration;
pub mod engine;
pub mod progress;
pub mod report;
pub mod validate;

pub use challenge::{
    Challenge, ChallengeSet, DefinitionError, LoadError, RawChallenge, RawTestCase, Suite, TestCase,
};
pub use compare::compare;
pub use config::{ConfigError, EngineConfig};
pub use duration::{duration_fragments, format_duration, format_timing, TimeUnit};
pub use engine::TestEngine;
pub use progress::{NullSink, ProgressEvent, ProgressSink};
pub use report::{SessionReport, SuiteResult, TestResult};
pub use validate::{validate, validate_all, Diagnostic, Level, ValidationSummary};

pub use kata_eval::Sandbox;
