//! The test engine: runs a challenge's suites against a solution.
//!
//! ```text
//! for each suite, for each selected case:
//!   evaluate ──error──▶ fail (error)
//!      │
//!   compare ──mismatch──▶ fail (res)
//!      │
//!   max_time_s? ──▶ benchmark ──too slow──▶ fail (validityPass)
//!      │
//!   pass
//! ```

use kata_eval::{to_canonical_json, to_json_value, Sandbox};
use tracing::{debug, info_span};

use crate::challenge::{Challenge, TestCase};
use crate::compare::compare;
use crate::config::EngineConfig;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::report::{SessionReport, SuiteResult, TestResult};

/// Drives the evaluator, comparator and benchmarker over test cases.
#[derive(Debug, Clone, Default)]
pub struct TestEngine {
    sandbox: Sandbox,
    config: EngineConfig,
}

impl TestEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            sandbox: Sandbox::new(config.sandbox.clone()),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run every selected test of `challenge` against `solution`.
    ///
    /// Hidden tests run only when `include_hidden` is set. Suites with no
    /// selected test are left out of the report entirely.
    pub fn run(
        &self,
        challenge: &Challenge,
        solution: &str,
        include_hidden: bool,
        sink: &mut dyn ProgressSink,
    ) -> SessionReport {
        let _span = info_span!("test_run", challenge = %challenge.id, all = include_hidden).entered();
        let mut report = SessionReport {
            all: include_hidden,
            pass: true,
            ..SessionReport::default()
        };

        for (suite_name, suite) in &challenge.tests {
            let selected: Vec<(&String, &TestCase)> = suite
                .iter()
                .filter(|(_, case)| include_hidden || case.visible)
                .collect();
            if selected.is_empty() {
                continue;
            }

            sink.event(ProgressEvent::SuiteStarted {
                suite: suite_name.clone(),
            });
            let mut suite_result = SuiteResult {
                pass: true,
                ..SuiteResult::default()
            };
            for (test_name, case) in selected {
                let result = self.run_case(&challenge.fn_name, solution, test_name, case, sink);
                debug!(suite = %suite_name, test = %test_name, pass = result.pass, "test finished");
                suite_result.pass &= result.pass;
                suite_result.tests.insert(test_name.clone(), result);
            }
            sink.event(ProgressEvent::SuiteFinished {
                suite: suite_name.clone(),
                pass: suite_result.pass,
            });
            report.pass &= suite_result.pass;
            report.suites.insert(suite_name.clone(), suite_result);
        }
        report
    }

    /// Evaluate, compare, and (only when correct) benchmark one case.
    pub fn run_case(
        &self,
        fn_name: &str,
        solution: &str,
        test_name: &str,
        case: &TestCase,
        sink: &mut dyn ProgressSink,
    ) -> TestResult {
        let call = Sandbox::call_expression(fn_name, &case.args);
        let evaluation = match self.sandbox.evaluate(solution, &call) {
            Ok(evaluation) => evaluation,
            Err(err) => {
                let error = err.to_string();
                sink.event(ProgressEvent::TestErrored {
                    test: test_name.to_string(),
                    error: error.clone(),
                });
                return TestResult::errored(error);
            }
        };
        let res = Some(to_json_value(&evaluation.value));

        if !compare(&evaluation.value, &case.res, case.delta) {
            sink.event(ProgressEvent::TestFailed {
                test: test_name.to_string(),
                expected: case.res.clone(),
                actual: to_canonical_json(&evaluation.value)
                    .unwrap_or_else(|| "undefined".to_string()),
                delta: case.delta,
            });
            return TestResult {
                res,
                ..TestResult::default()
            };
        }

        let Some(max_time_s) = case.max_time_s else {
            sink.event(ProgressEvent::TestPassed {
                test: test_name.to_string(),
                time: None,
                max_time_s: None,
            });
            return TestResult {
                pass: true,
                res,
                ..TestResult::default()
            };
        };

        let stats = match self
            .sandbox
            .benchmark(solution, &call, &self.config.benchmark)
        {
            Ok(stats) => stats,
            Err(err) => {
                let error = err.to_string();
                sink.event(ProgressEvent::TestErrored {
                    test: test_name.to_string(),
                    error: error.clone(),
                });
                return TestResult {
                    res,
                    error: Some(error),
                    ..TestResult::default()
                };
            }
        };
        let time = stats.mean_s;
        if time > max_time_s {
            sink.event(ProgressEvent::TestTooSlow {
                test: test_name.to_string(),
                time,
                max_time_s,
            });
            return TestResult {
                pass: false,
                res,
                time: Some(time),
                validity_pass: true,
                error: None,
            };
        }
        sink.event(ProgressEvent::TestPassed {
            test: test_name.to_string(),
            time: Some(time),
            max_time_s: Some(max_time_s),
        });
        TestResult {
            pass: true,
            res,
            time: Some(time),
            ..TestResult::default()
        }
    }
}
