//! Live narration of a test run.

/// One step of a running test pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    SuiteStarted {
        suite: String,
    },
    TestPassed {
        test: String,
        time: Option<f64>,
        max_time_s: Option<f64>,
    },
    /// Wrong answer. `actual` is the canonical form, or `undefined`.
    TestFailed {
        test: String,
        expected: String,
        actual: String,
        delta: Option<f64>,
    },
    TestErrored {
        test: String,
        error: String,
    },
    TestTooSlow {
        test: String,
        time: f64,
        max_time_s: f64,
    },
    SuiteFinished {
        suite: String,
        pass: bool,
    },
}

/// Receives events as the engine produces them.
pub trait ProgressSink {
    fn event(&mut self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn event(&mut self, _event: ProgressEvent) {}
}

impl ProgressSink for Vec<ProgressEvent> {
    fn event(&mut self, event: ProgressEvent) {
        self.push(event);
    }
}
