//! Author-time checks for challenge definitions.
//!
//! Validation never fails outright: every defect becomes a [`Diagnostic`],
//! and a panic while validating one challenge is caught and reported as a
//! single error so a batch run continues with the next challenge.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use kata_eval::Sandbox;
use serde::Serialize;
use tracing::{debug, warn};

use crate::challenge::{ChallengeSet, DefinitionError, RawChallenge, TestCase};
use crate::compare::expected_number;
use crate::engine::TestEngine;
use crate::progress::NullSink;

/// Suites every challenge is expected to carry.
pub const RECOMMENDED_SUITES: [&str; 3] = ["correctness", "edges", "performance"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub level: Level,
    pub challenge: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            Level::Error => "error",
            Level::Warning => "warning",
        };
        write!(f, "{level}[{}]: {}", self.challenge, self.message)
    }
}

/// Error and warning counts plus the diagnostics behind them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub errors: usize,
    pub warnings: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationSummary {
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }

    fn push(&mut self, level: Level, challenge: &str, message: impl Into<String>) {
        match level {
            Level::Error => self.errors += 1,
            Level::Warning => self.warnings += 1,
        }
        self.diagnostics.push(Diagnostic {
            level,
            challenge: challenge.to_string(),
            message: message.into(),
        });
    }

    fn error(&mut self, challenge: &str, message: impl Into<String>) {
        self.push(Level::Error, challenge, message);
    }

    fn warning(&mut self, challenge: &str, message: impl Into<String>) {
        self.push(Level::Warning, challenge, message);
    }

    pub fn merge(&mut self, other: ValidationSummary) {
        self.errors += other.errors;
        self.warnings += other.warnings;
        self.diagnostics.extend(other.diagnostics);
    }
}

/// Validate challenge `id` of `set`, running its sample solution.
pub fn validate(engine: &TestEngine, set: &ChallengeSet, id: &str) -> ValidationSummary {
    let raw = match set.raw(id) {
        Ok(raw) => raw,
        Err(err) => {
            let mut summary = ValidationSummary::default();
            match err {
                DefinitionError::Malformed { reason, .. } => {
                    summary.error(id, format!("malformed definition: {reason}"));
                }
                _ => summary.error(id, "unknown challenge"),
            }
            return summary;
        }
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| check_challenge(engine, raw)));
    let summary = outcome.unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        warn!(challenge = id, %reason, "validation panicked");
        let mut summary = ValidationSummary::default();
        summary.error(id, format!("validation aborted: {reason}"));
        summary
    });
    debug!(
        challenge = id,
        errors = summary.errors,
        warnings = summary.warnings,
        "validated"
    );
    summary
}

/// Validate every challenge of `set` in declared order.
pub fn validate_all(engine: &TestEngine, set: &ChallengeSet) -> ValidationSummary {
    let mut total = ValidationSummary::default();
    for id in set.ids() {
        total.merge(validate(engine, set, id));
    }
    total
}

fn check_challenge(engine: &TestEngine, raw: &RawChallenge) -> ValidationSummary {
    let id = raw.id.as_str();
    let mut summary = ValidationSummary::default();

    if raw.fn_name.is_none() {
        summary.error(id, "no `fn_name`");
    }
    if raw.template.is_none() {
        summary.error(id, "no `template`");
    }
    if raw.sample_solution.is_none() {
        summary.warning(id, "no `sample_solution`");
    }
    if raw.recommended_time_ms.is_none() {
        summary.warning(id, "no `recommended_time_ms`");
    }
    let Some(tests) = &raw.tests else {
        summary.error(id, "no `tests`");
        return summary;
    };

    for suite in RECOMMENDED_SUITES {
        if !tests.contains_key(suite) {
            summary.warning(id, format!("no `{suite}` suite"));
        }
    }

    for (suite_name, suite) in tests {
        for (test_name, case) in suite {
            let name = format!("{suite_name}/{test_name}");
            if case.args.is_none() {
                summary.warning(id, format!("`{name}`: no `args` (use \"\" for none)"));
            }
            match &case.res {
                None => summary.error(id, format!("`{name}`: no `res`")),
                Some(res) if expected_number(res).is_some() && case.delta.is_none() => {
                    summary.warning(
                        id,
                        format!("`{name}`: numeric `res` without `delta` (use 0 for exact)"),
                    );
                }
                Some(_) => {}
            }
            if suite_name == "performance" && case.max_time_s.is_none() {
                summary.warning(id, format!("`{name}`: performance test without `max_time_s`"));
            }
        }
    }

    let (Some(fn_name), Some(solution)) = (&raw.fn_name, &raw.sample_solution) else {
        return summary;
    };
    if let Err(err) = Sandbox::check_syntax(solution) {
        summary.error(id, format!("sample solution does not parse: {err}"));
        return summary;
    }

    for (suite_name, suite) in tests {
        for (test_name, raw_case) in suite {
            let Some(res) = &raw_case.res else {
                continue;
            };
            let case = TestCase {
                args: raw_case.args.clone().unwrap_or_default(),
                res: res.clone(),
                delta: raw_case.delta,
                visible: true,
                max_time_s: raw_case.max_time_s,
            };
            let result = engine.run_case(fn_name, solution, test_name, &case, &mut NullSink);
            if result.pass {
                continue;
            }
            let detail = if let Some(error) = &result.error {
                error.clone()
            } else if result.validity_pass {
                format!(
                    "too slow ({:.6}s > {}s)",
                    result.time.unwrap_or_default(),
                    case.max_time_s.unwrap_or_default()
                )
            } else {
                let actual = result
                    .res
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "undefined".to_string());
                format!("expected {}, got {actual}", case.res)
            };
            summary.error(
                id,
                format!("sample solution fails `{suite_name}/{test_name}`: {detail}"),
            );
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(json: &str) -> ChallengeSet {
        ChallengeSet::from_json_str(json).unwrap()
    }

    #[test]
    fn missing_tests_is_one_error() {
        let set = set(r#"{ "x": { "fn_name": "f", "template": "", "sample_solution": "", "recommended_time_ms": 1 } }"#);
        let summary = validate(&TestEngine::default(), &set, "x");
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.warnings, 0);
        assert_eq!(summary.diagnostics[0].message, "no `tests`");
    }

    #[test]
    fn unknown_id_is_reported() {
        let summary = validate(&TestEngine::default(), &ChallengeSet::default(), "ghost");
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.diagnostics[0].to_string(), "error[ghost]: unknown challenge");
    }

    #[test]
    fn malformed_record_is_one_error_naming_the_id() {
        let set = set(r#"{
            "bad": { "fn_name": "f", "template": "", "tests": { "s": { "t": { "args": 5, "res": "1" } } } },
            "ghostly": { "fn_name": "f", "template": "", "tests": [] }
        }"#);
        let summary = validate_all(&TestEngine::default(), &set);
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.warnings, 0);
        let rendered: Vec<String> = summary.diagnostics.iter().map(ToString::to_string).collect();
        assert!(
            rendered[0].starts_with("error[bad]: malformed definition: invalid type: integer `5`"),
            "{rendered:?}"
        );
        assert!(rendered[1].starts_with("error[ghostly]: malformed definition: "), "{rendered:?}");
    }

    #[test]
    fn summaries_merge() {
        let mut a = ValidationSummary::default();
        a.error("a", "x");
        let mut b = ValidationSummary::default();
        b.warning("b", "y");
        a.merge(b);
        assert_eq!((a.errors, a.warnings, a.diagnostics.len()), (1, 1, 2));
        assert!(!a.is_ok());
    }
}
