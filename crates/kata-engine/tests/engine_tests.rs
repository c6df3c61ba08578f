//! End-to-end test engine runs over small challenges.

use kata_eval::BenchmarkConfig;
use kata_engine::{
    Challenge, ChallengeSet, EngineConfig, NullSink, ProgressEvent, SessionReport, TestEngine,
};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

const CHALLENGES: &str = r#"{
    "add": {
        "fn_name": "add",
        "template": "function add(a, b) {\n}\n",
        "recommended_time_ms": 60000,
        "sample_solution": "function add(a, b) { return a + b; }",
        "tests": {
            "correctness": {
                "small": { "args": "2,3", "res": "5", "visible": true },
                "negative": { "args": "-2,-3", "res": "-5" }
            },
            "edges": {
                "hidden_only": { "args": "0,0", "res": "0" }
            },
            "empty": {}
        }
    },
    "pi": {
        "fn_name": "pi",
        "template": "",
        "tests": {
            "correctness": {
                "approx": { "args": "", "res": "3.14", "delta": "0.02", "visible": true }
            }
        }
    },
    "sum": {
        "fn_name": "sum",
        "template": "",
        "tests": {
            "performance": {
                "big": { "args": "20000", "res": "199990000", "max_time_s": "0.000001", "visible": true },
                "generous": { "args": "10", "res": "45", "max_time_s": 60, "visible": true }
            }
        }
    }
}"#;

fn challenge(id: &str) -> Challenge {
    ChallengeSet::from_json_str(CHALLENGES)
        .unwrap()
        .get(id)
        .unwrap()
}

fn engine() -> TestEngine {
    TestEngine::new(EngineConfig {
        benchmark: BenchmarkConfig {
            budget_ms: 2,
            min_samples: 2,
            max_samples: 20,
        },
        ..EngineConfig::default()
    })
}

fn run(id: &str, solution: &str, all: bool) -> SessionReport {
    engine().run(&challenge(id), solution, all, &mut NullSink)
}

const ADD_OK: &str = "function add(a, b) { return a + b; }";
const ADD_WRONG: &str = "function add(a, b) { return a - b; }";
const SUM_SLOW: &str =
    "function sum(n) { let s = 0; for (let i = 0; i < n; i++) { s += i; } return s; }";

// ══════════════════════════════════════════════════════════════════════════════
// Correctness
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn passing_solution() {
    let report = run("add", ADD_OK, false);
    assert!(report.pass);
    assert!(!report.all);
    let small = report.test("correctness", "small").unwrap();
    assert!(small.pass);
    assert_eq!(small.res, Some(serde_json::json!(5)));
    assert_eq!(small.time, None);
}

#[test]
fn wrong_answer_records_actual_value() {
    let mut events = Vec::new();
    let report = engine().run(&challenge("add"), ADD_WRONG, false, &mut events);
    assert!(!report.pass);
    let small = report.test("correctness", "small").unwrap();
    assert!(!small.pass);
    assert!(!small.validity_pass);
    assert_eq!(small.res, Some(serde_json::json!(-1)));
    assert!(events.contains(&ProgressEvent::TestFailed {
        test: "small".into(),
        expected: "5".into(),
        actual: "-1".into(),
        delta: None,
    }));
}

#[test]
fn thrown_errors_are_captured_per_test() {
    let report = run("add", "function add() { throw new TypeError('nope'); }", true);
    assert!(!report.pass);
    for suite in report.suites.values() {
        for result in suite.tests.values() {
            assert_eq!(result.error.as_deref(), Some("TypeError: nope"));
            assert_eq!(result.res, None);
        }
    }
}

#[test]
fn undefined_entry_point_is_an_error() {
    let report = run("add", "function plus(a, b) { return a + b; }", false);
    let small = report.test("correctness", "small").unwrap();
    assert_eq!(
        small.error.as_deref(),
        Some("ReferenceError: add is not defined")
    );
}

#[test]
fn syntax_errors_fail_every_test() {
    let report = run("add", "function add(a, b) { return a + ; }", false);
    let small = report.test("correctness", "small").unwrap();
    assert!(small.error.as_deref().is_some_and(|e| e.starts_with("SyntaxError")));
}

#[test]
fn tolerance_accepts_boundary() {
    let report = run("pi", "function pi() { return 3.15; }", false);
    assert!(report.pass);
    let report = run("pi", "function pi() { return 3.16; }", false);
    assert!(!report.pass);
}

#[test]
fn tests_do_not_share_state() {
    let solution = "var calls = 0; function add(a, b) { calls++; return calls === 1 ? a + b : -1; }";
    assert!(run("add", solution, true).pass);
}

// ══════════════════════════════════════════════════════════════════════════════
// Visibility and aggregation
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn hidden_tests_and_empty_suites_are_skipped() {
    let report = run("add", ADD_OK, false);
    assert_eq!(report.suites.keys().collect::<Vec<_>>(), ["correctness"]);
    assert_eq!(
        report.suites["correctness"].tests.keys().collect::<Vec<_>>(),
        ["small"]
    );
}

#[test]
fn full_run_is_a_superset_of_the_visible_run() {
    for solution in [ADD_OK, ADD_WRONG] {
        let visible = run("add", solution, false);
        let full = run("add", solution, true);
        assert!(full.all);
        assert_eq!(full.suites.keys().collect::<Vec<_>>(), ["correctness", "edges"]);
        for (suite, result) in &visible.suites {
            for (test, outcome) in &result.tests {
                assert_eq!(full.test(suite, test), Some(outcome));
            }
        }
    }
}

#[test]
fn suite_pass_is_and_of_its_tests() {
    let solution = "function add(a, b) { return a === 0 ? 1 : a + b; }";
    let report = run("add", solution, true);
    assert!(report.suites["correctness"].pass);
    assert!(!report.suites["edges"].pass);
    assert!(!report.pass);
    assert_eq!(report.counts(), (2, 3));
}

#[test]
fn progress_events_bracket_each_suite() {
    let mut events = Vec::new();
    engine().run(&challenge("add"), ADD_OK, true, &mut events);
    let kinds: Vec<&str> = events
        .iter()
        .map(|event| match event {
            ProgressEvent::SuiteStarted { .. } => "start",
            ProgressEvent::SuiteFinished { .. } => "finish",
            ProgressEvent::TestPassed { .. } => "pass",
            _ => "other",
        })
        .collect();
    assert_eq!(
        kinds,
        ["start", "pass", "pass", "finish", "start", "pass", "finish"]
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// Timing
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn too_slow_is_a_validity_failure() {
    let mut events = Vec::new();
    let report = engine().run(&challenge("sum"), SUM_SLOW, false, &mut events);
    let big = report.test("performance", "big").unwrap();
    assert!(!big.pass);
    assert!(big.validity_pass);
    assert!(big.time.is_some_and(|t| t > 0.000001));
    assert_eq!(big.res, Some(serde_json::json!(199990000)));
    assert!(events
        .iter()
        .any(|e| matches!(e, ProgressEvent::TestTooSlow { test, .. } if test == "big")));
    assert!(!report.suites["performance"].pass);
}

#[test]
fn fast_enough_passes_with_time() {
    let report = run("sum", SUM_SLOW, false);
    let generous = report.test("performance", "generous").unwrap();
    assert!(generous.pass);
    assert!(!generous.validity_pass);
    assert!(generous.time.is_some());
}

#[test]
fn wrong_answers_are_never_benchmarked() {
    let mut events = Vec::new();
    let report = engine().run(
        &challenge("sum"),
        "function sum(n) { return 0; }",
        false,
        &mut events,
    );
    for result in report.suites["performance"].tests.values() {
        assert!(!result.pass);
        assert!(!result.validity_pass);
        assert_eq!(result.time, None);
    }
    assert!(!events
        .iter()
        .any(|e| matches!(e, ProgressEvent::TestTooSlow { .. } | ProgressEvent::TestPassed { .. })));
}

#[test]
fn report_serialises_with_wire_names() {
    let report = run("sum", SUM_SLOW, false);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["suites"]["performance"]["tests"]["big"]["validityPass"], true);
    assert_eq!(json["suites"]["performance"]["tests"]["generous"]["pass"], true);
    assert_eq!(json["all"], false);
}
