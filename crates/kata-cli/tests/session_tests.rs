//! Session controller driven by scripted keys and an in-memory solution.

use std::collections::VecDeque;
use std::io;

use kata_cli::{Exit, Key, KeySource, SessionController, SolutionSource};
use kata_engine::{Challenge, ChallengeSet, EngineConfig, TestEngine};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

struct ScriptedKeys(VecDeque<Key>);

impl KeySource for ScriptedKeys {
    async fn next_key(&mut self) -> Option<Key> {
        self.0.pop_front()
    }
}

/// Returns each text in turn, repeating the last one.
struct Edits {
    texts: VecDeque<String>,
}

impl SolutionSource for Edits {
    fn read(&mut self) -> io::Result<String> {
        match self.texts.len() {
            0 => Err(io::Error::new(io::ErrorKind::NotFound, "gone")),
            1 => Ok(self.texts[0].clone()),
            _ => Ok(self.texts.pop_front().unwrap_or_default()),
        }
    }

    fn describe(&self) -> String {
        "add.js".to_string()
    }
}

fn challenge() -> Challenge {
    ChallengeSet::from_json_str(
        r#"{ "add": {
            "fn_name": "add",
            "template": "function add(a, b) {\n}\n",
            "recommended_time_ms": 600000,
            "tests": {
                "correctness": {
                    "small": { "args": "2,3", "res": "5", "visible": true },
                    "hidden": { "args": "10,-4", "res": "6" }
                }
            }
        } }"#,
    )
    .unwrap()
    .get("add")
    .unwrap()
}

/// Run a session; returns the exit, the console output, and whether any
/// test pass completed.
async fn session(keys: &[Key], texts: &[&str]) -> (Exit, String, bool) {
    let mut controller = SessionController::new(
        TestEngine::new(EngineConfig::default()),
        challenge(),
        ScriptedKeys(keys.iter().copied().collect()),
        Edits {
            texts: texts.iter().map(|t| t.to_string()).collect(),
        },
        Vec::new(),
    );
    let exit = controller.run().await.unwrap();
    let tested = controller.session().report.is_some();
    let output = String::from_utf8(controller.into_output()).unwrap();
    (exit, output, tested)
}

const ADD_OK: &str = "function add(a, b) { return a + b; }";
const ADD_WRONG: &str = "function add(a, b) { return a - b; }";

// ══════════════════════════════════════════════════════════════════════════════
// Transitions
// ══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn space_runs_visible_tests_and_keeps_running() {
    let (exit, output, _) = session(&[Key::Space, Key::Char('x')], &[ADD_OK]).await;
    assert_eq!(exit, Exit::Quit);
    assert!(output.contains("  ✓ small\r\n"), "{output}");
    assert!(!output.contains("hidden"), "{output}");
    assert!(output.contains("PASS: 1/1 visible tests passed\r\n"), "{output}");
}

#[tokio::test]
async fn enter_submits_with_hidden_tests() {
    let (exit, output, _) = session(&[Key::Enter], &[ADD_OK]).await;
    let Exit::Submitted(report) = exit else {
        panic!("expected submission, got {exit:?}");
    };
    assert!(report.all);
    assert!(report.pass);
    assert_eq!(report.counts(), (2, 2));
    assert!(output.contains("PASS: 2/2 all tests passed\r\n"), "{output}");
    assert!(output.contains("recommended"), "{output}");
}

#[tokio::test]
async fn each_run_rereads_the_solution() {
    let (exit, output, _) =
        session(&[Key::Space, Key::Space, Key::Char('c')], &[ADD_WRONG, ADD_OK]).await;
    assert_eq!(exit, Exit::Quit);
    assert!(output.contains("  ✗ small: expected 5, got -1\r\n"), "{output}");
    assert!(output.contains("FAIL: 0/1 visible tests passed\r\n"), "{output}");
    assert!(output.contains("PASS: 1/1 visible tests passed\r\n"), "{output}");
}

#[tokio::test]
async fn failing_submission_still_exits() {
    let (exit, _, _) = session(&[Key::Enter, Key::Space], &[ADD_WRONG]).await;
    let Exit::Submitted(report) = exit else {
        panic!("expected submission, got {exit:?}");
    };
    assert!(!report.pass);
}

#[tokio::test]
async fn time_and_unknown_keys_do_not_change_state() {
    let (exit, output, tested) =
        session(&[Key::Char('t'), Key::Char('q'), Key::Other, Key::Char('x')], &[ADD_OK]).await;
    assert_eq!(exit, Exit::Quit);
    assert!(!tested);
    assert!(output.contains("of 10m recommended (0%)\r\n"), "{output}");
    assert_eq!(output.matches("unknown command\r\n").count(), 2, "{output}");
}

#[tokio::test]
async fn closed_input_quits() {
    let (exit, output, _) = session(&[], &[ADD_OK]).await;
    assert_eq!(exit, Exit::Quit);
    assert!(output.starts_with("challenge `add`: define `add`\r\n"), "{output}");
}

#[tokio::test]
async fn unreadable_solution_on_enter_reports_and_exits() {
    let (exit, output, tested) = session(&[Key::Enter, Key::Space, Key::Char('t')], &[]).await;
    assert_eq!(exit, Exit::Quit);
    assert!(!tested);
    assert_eq!(output.matches("could not read add.js: gone\r\n").count(), 1, "{output}");
    assert_eq!(output.matches("recommended").count(), 1, "{output}");
}

#[tokio::test]
async fn unreadable_solution_on_space_keeps_running() {
    let (exit, output, _) = session(&[Key::Space, Key::Char('x')], &[]).await;
    assert_eq!(exit, Exit::Quit);
    assert!(output.contains("could not read add.js: gone\r\n"), "{output}");
}

#[tokio::test]
async fn syntax_errors_point_at_the_line() {
    let broken = "function add(a, b) {\n  return a +;\n}";
    let (exit, output, tested) = session(&[Key::Space, Key::Char('x')], &[broken]).await;
    assert_eq!(exit, Exit::Quit);
    assert!(tested);
    assert!(output.contains("\r\n  return a +;\r\n"), "{output}");
    assert!(output.contains("^\r\n"), "{output}");
    assert!(output.contains("FAIL: 0/1 visible tests passed\r\n"), "{output}");
}
