//! Structured test reports.

use indexmap::IndexMap;
use serde::Serialize;

/// Outcome of one executed test case.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TestResult {
    pub pass: bool,
    /// The value returned, absent when the call failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub res: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Benchmark mean in seconds, when a benchmark ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    /// Correct but slower than `max_time_s`.
    #[serde(rename = "validityPass", skip_serializing_if = "is_false")]
    pub validity_pass: bool,
}

impl TestResult {
    pub fn errored(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuiteResult {
    pub pass: bool,
    pub tests: IndexMap<String, TestResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionReport {
    /// Hidden tests were included.
    pub all: bool,
    pub pass: bool,
    pub suites: IndexMap<String, SuiteResult>,
}

impl SessionReport {
    /// `(passed, executed)` test counts.
    pub fn counts(&self) -> (usize, usize) {
        self.suites
            .values()
            .flat_map(|suite| suite.tests.values())
            .fold((0, 0), |(passed, total), test| {
                (passed + usize::from(test.pass), total + 1)
            })
    }

    pub fn test(&self, suite: &str, test: &str) -> Option<&TestResult> {
        self.suites.get(suite)?.tests.get(test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_flag_uses_its_wire_name() {
        let result = TestResult {
            pass: false,
            res: Some(serde_json::json!(5)),
            time: Some(0.25),
            validity_pass: true,
            ..TestResult::default()
        };
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"pass":false,"res":5,"time":0.25,"validityPass":true}"#
        );
    }

    #[test]
    fn absent_fields_are_omitted() {
        let result = TestResult::errored("TypeError: boom");
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"pass":false,"error":"TypeError: boom"}"#
        );
    }

    #[test]
    fn counts_span_all_suites() {
        let mut report = SessionReport::default();
        let mut suite = SuiteResult::default();
        suite.tests.insert(
            "a".into(),
            TestResult {
                pass: true,
                ..TestResult::default()
            },
        );
        suite.tests.insert("b".into(), TestResult::default());
        report.suites.insert("correctness".into(), suite.clone());
        report.suites.insert("edges".into(), suite);
        assert_eq!(report.counts(), (2, 4));
        assert!(report.test("edges", "a").is_some_and(|t| t.pass));
    }
}
