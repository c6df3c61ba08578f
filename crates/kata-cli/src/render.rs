//! Console text for sessions and test runs.

use std::time::Duration;

use kata_engine::{format_duration, format_timing, Challenge, ProgressEvent, SessionReport};

/// The command menu, one entry per line.
pub const COMMANDS: [&str; 4] = [
    "  space   run visible tests",
    "  enter   submit: run all tests and exit",
    "  t       show elapsed time",
    "  x, c    quit",
];

pub fn intro(challenge: &Challenge, solution_path: &str) -> Vec<String> {
    let mut lines = vec![
        format!("challenge `{}`: define `{}`", challenge.id, challenge.fn_name),
        format!("edit {solution_path}, then press a key:"),
    ];
    lines.extend(COMMANDS.iter().map(|c| c.to_string()));
    lines
}

pub fn unknown_command() -> Vec<String> {
    let mut lines = vec!["unknown command".to_string()];
    lines.extend(COMMANDS.iter().map(|c| c.to_string()));
    lines
}

/// One line per progress event; `None` for events that print nothing.
pub fn event_line(event: &ProgressEvent) -> Option<String> {
    Some(match event {
        ProgressEvent::SuiteStarted { suite } => format!("{suite}:"),
        ProgressEvent::TestPassed {
            test,
            time: Some(time),
            max_time_s: Some(limit),
        } => format!(
            "  ✓ {test} ({} / limit {})",
            format_timing(*time),
            format_timing(*limit)
        ),
        ProgressEvent::TestPassed { test, .. } => format!("  ✓ {test}"),
        ProgressEvent::TestFailed {
            test,
            expected,
            actual,
            delta,
        } => match delta {
            Some(delta) => format!(
                "  ✗ {test}: expected {expected} (±{}), got {actual}",
                delta / 2.0
            ),
            None => format!("  ✗ {test}: expected {expected}, got {actual}"),
        },
        ProgressEvent::TestErrored { test, error } => format!("  ✗ {test}: {error}"),
        ProgressEvent::TestTooSlow {
            test,
            time,
            max_time_s,
        } => format!(
            "  ✗ {test}: correct but too slow ({} > limit {})",
            format_timing(*time),
            format_timing(*max_time_s)
        ),
        ProgressEvent::SuiteFinished { .. } => return None,
    })
}

pub fn summary(report: &SessionReport) -> String {
    let (passed, total) = report.counts();
    let scope = if report.all { "all tests" } else { "visible tests" };
    let verdict = if report.pass { "PASS" } else { "FAIL" };
    format!("{verdict}: {passed}/{total} {scope} passed")
}

/// Elapsed time, with the share of the recommended time when known.
pub fn time(elapsed: Duration, recommended_ms: Option<u64>) -> String {
    let secs = elapsed.as_secs_f64();
    match recommended_ms.filter(|ms| *ms > 0) {
        Some(ms) => {
            let recommended = ms as f64 / 1000.0;
            format!(
                "elapsed {} of {} recommended ({:.0}%)",
                format_duration(secs),
                format_duration(recommended),
                secs / recommended * 100.0
            )
        }
        None => format!("elapsed {}", format_duration(secs)),
    }
}
