//! Challenge definitions and the JSON challenge-set loader.
//!
//! A challenge file is a JSON object keyed by challenge id:
//!
//! ```json
//! { "add": { "fn_name": "add", "template": "...", "recommended_time_ms": 60000,
//!            "tests": { "correctness": { "small": { "args": "2,3", "res": "5", "visible": true } } } } }
//! ```
//!
//! Records are kept in their loose [`RawChallenge`] form so the validator can
//! report missing fields; sessions convert them with `Challenge::try_from`.
//! Each record is decoded on its own: a record with badly-typed fields is
//! kept as a per-id error and does not reject the rest of the file.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Test cases of one suite, in declared order.
pub type Suite = IndexMap<String, TestCase>;

/// A fully-formed challenge ready for a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Challenge {
    pub id: String,
    /// Entry point the solution must define.
    pub fn_name: String,
    /// Initial solution text shown to the user.
    pub template: String,
    pub recommended_time_ms: Option<u64>,
    pub sample_solution: Option<String>,
    /// Suite name to test cases, in declared order.
    pub tests: IndexMap<String, Suite>,
}

/// One test case of a [`Challenge`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCase {
    /// Argument source text spliced into `fn_name(args)`.
    pub args: String,
    /// Expected result, already serialised.
    pub res: String,
    /// Full width of the accepted numeric window around `res`.
    pub delta: Option<f64>,
    pub visible: bool,
    /// Upper bound on the benchmark mean, seconds.
    pub max_time_s: Option<f64>,
}

/// A challenge record as written, with every field optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawChallenge {
    #[serde(skip)]
    pub id: String,
    pub fn_name: Option<String>,
    pub template: Option<String>,
    pub recommended_time_ms: Option<u64>,
    pub sample_solution: Option<String>,
    pub tests: Option<IndexMap<String, IndexMap<String, RawTestCase>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawTestCase {
    pub args: Option<String>,
    #[serde(default, deserialize_with = "expected_text")]
    pub res: Option<String>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub delta: Option<f64>,
    #[serde(default)]
    pub visible: bool,
    #[serde(default, deserialize_with = "number_or_string")]
    pub max_time_s: Option<f64>,
}

/// A challenge cannot be used to start a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("unknown challenge `{0}`")]
    UnknownChallenge(String),
    #[error("challenge `{challenge}` has no `{field}`")]
    MissingField { challenge: String, field: String },
    #[error("challenge `{challenge}` is malformed: {reason}")]
    Malformed { challenge: String, reason: String },
}

/// The challenge file could not be read, or is not a JSON object.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid challenge file: {0}")]
    Json(#[from] serde_json::Error),
}

impl TryFrom<RawChallenge> for Challenge {
    type Error = DefinitionError;

    fn try_from(raw: RawChallenge) -> Result<Self, Self::Error> {
        let missing = |field: &str| DefinitionError::MissingField {
            challenge: raw.id.clone(),
            field: field.to_string(),
        };
        let fn_name = raw.fn_name.clone().ok_or_else(|| missing("fn_name"))?;
        let template = raw.template.clone().ok_or_else(|| missing("template"))?;
        let raw_tests = raw.tests.as_ref().ok_or_else(|| missing("tests"))?;

        let mut tests = IndexMap::with_capacity(raw_tests.len());
        for (suite_name, raw_suite) in raw_tests {
            let mut suite = Suite::with_capacity(raw_suite.len());
            for (test_name, case) in raw_suite {
                let res = case
                    .res
                    .clone()
                    .ok_or_else(|| missing(&format!("tests.{suite_name}.{test_name}.res")))?;
                suite.insert(
                    test_name.clone(),
                    TestCase {
                        args: case.args.clone().unwrap_or_default(),
                        res,
                        delta: case.delta,
                        visible: case.visible,
                        max_time_s: case.max_time_s,
                    },
                );
            }
            tests.insert(suite_name.clone(), suite);
        }

        Ok(Challenge {
            id: raw.id,
            fn_name,
            template,
            recommended_time_ms: raw.recommended_time_ms,
            sample_solution: raw.sample_solution,
            tests,
        })
    }
}

/// Every challenge of one definition file, in declared order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChallengeSet {
    /// Decoded records, or why a record could not be decoded.
    challenges: IndexMap<String, Result<RawChallenge, String>>,
}

impl ChallengeSet {
    pub fn from_json_str(text: &str) -> Result<Self, LoadError> {
        let records: IndexMap<String, serde_json::Value> = serde_json::from_str(text)?;
        let challenges = records
            .into_iter()
            .map(|(id, record)| {
                let raw = RawChallenge::deserialize(record)
                    .map(|raw| RawChallenge { id: id.clone(), ..raw })
                    .map_err(|err| {
                        warn!(challenge = %id, %err, "malformed challenge record");
                        err.to_string()
                    });
                (id, raw)
            })
            .collect();
        Ok(Self { challenges })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn insert(&mut self, id: impl Into<String>, mut raw: RawChallenge) {
        let id = id.into();
        raw.id = id.clone();
        self.challenges.insert(id, Ok(raw));
    }

    /// The session-ready form of challenge `id`.
    pub fn get(&self, id: &str) -> Result<Challenge, DefinitionError> {
        Challenge::try_from(self.raw(id)?.clone())
    }

    /// The record of challenge `id` as written. Fails for unknown ids and
    /// for records whose fields have the wrong JSON type.
    pub fn raw(&self, id: &str) -> Result<&RawChallenge, DefinitionError> {
        match self.challenges.get(id) {
            None => Err(DefinitionError::UnknownChallenge(id.to_string())),
            Some(Ok(raw)) => Ok(raw),
            Some(Err(reason)) => Err(DefinitionError::Malformed {
                challenge: id.to_string(),
                reason: reason.clone(),
            }),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.challenges.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }
}

/// `res` is normally the serialised text itself; any other JSON value is
/// taken as already-parsed and re-serialised compactly.
fn expected_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        None => None,
        Some(serde_json::Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

/// Accept `0.02` as well as `"0.02"`.
fn number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::Text(text)) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| de::Error::invalid_value(de::Unexpected::Str(&text), &NumericText)),
    }
}

struct NumericText;

impl de::Expected for NumericText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number or numeric string")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADD: &str = r#"{
        "add": {
            "fn_name": "add",
            "template": "function add(a, b) {\n}\n",
            "recommended_time_ms": 60000,
            "sample_solution": "function add(a, b) { return a + b; }",
            "tests": {
                "correctness": {
                    "small": { "args": "2,3", "res": "5", "visible": true },
                    "float": { "args": "0.1,0.2", "res": "0.3", "delta": "0.02" }
                },
                "performance": {
                    "big": { "args": "1e6,1", "res": 1000001, "max_time_s": 0.5 }
                }
            }
        },
        "broken": { "template": "" }
    }"#;

    #[test]
    fn loads_in_declared_order() {
        let set = ChallengeSet::from_json_str(ADD).unwrap();
        assert_eq!(set.ids().collect::<Vec<_>>(), ["add", "broken"]);
        let add = set.get("add").unwrap();
        assert_eq!(add.id, "add");
        assert_eq!(
            add.tests.keys().collect::<Vec<_>>(),
            ["correctness", "performance"]
        );
        let correctness = &add.tests["correctness"];
        assert_eq!(correctness.keys().collect::<Vec<_>>(), ["small", "float"]);
        assert!(correctness["small"].visible);
        assert!(!correctness["float"].visible);
    }

    #[test]
    fn numeric_fields_accept_numbers_and_strings() {
        let add = ChallengeSet::from_json_str(ADD).unwrap().get("add").unwrap();
        assert_eq!(add.tests["correctness"]["float"].delta, Some(0.02));
        assert_eq!(add.tests["performance"]["big"].max_time_s, Some(0.5));
        assert_eq!(add.tests["performance"]["big"].res, "1000001");
    }

    #[test]
    fn non_numeric_delta_is_a_malformed_record() {
        let set = ChallengeSet::from_json_str(
            r#"{ "x": { "tests": { "s": { "t": { "res": "1", "delta": "wide" } } } } }"#,
        )
        .unwrap();
        assert_eq!(set.ids().collect::<Vec<_>>(), ["x"]);
        let err = set.get("x").unwrap_err();
        assert!(
            matches!(&err, DefinitionError::Malformed { challenge, .. } if challenge == "x"),
            "{err}"
        );
    }

    #[test]
    fn one_malformed_record_keeps_the_rest() {
        let set = ChallengeSet::from_json_str(
            r#"{
                "args": { "fn_name": "f", "template": "", "tests": { "s": { "t": { "args": 5, "res": "1" } } } },
                "suites": { "fn_name": "f", "template": "", "tests": [] },
                "flag": { "fn_name": "f", "template": "", "tests": { "s": { "t": { "res": "1", "visible": "true" } } } },
                "fine": { "fn_name": "f", "template": "", "tests": { "s": { "t": { "res": "1" } } } }
            }"#,
        )
        .unwrap();
        assert_eq!(set.len(), 4);
        assert_eq!(
            set.ids().collect::<Vec<_>>(),
            ["args", "suites", "flag", "fine"]
        );
        for id in ["args", "suites", "flag"] {
            assert!(
                matches!(set.get(id), Err(DefinitionError::Malformed { .. })),
                "{id}"
            );
        }
        assert_eq!(set.get("fine").unwrap().fn_name, "f");
    }

    #[test]
    fn non_object_files_are_load_errors() {
        for text in ["[]", "{ \"x\": ", "42"] {
            let err = ChallengeSet::from_json_str(text).unwrap_err();
            assert!(matches!(err, LoadError::Json(_)), "{text}: {err}");
        }
    }

    #[test]
    fn unknown_and_incomplete_challenges() {
        let set = ChallengeSet::from_json_str(ADD).unwrap();
        assert_eq!(
            set.get("nope"),
            Err(DefinitionError::UnknownChallenge("nope".into()))
        );
        assert_eq!(
            set.get("broken"),
            Err(DefinitionError::MissingField {
                challenge: "broken".into(),
                field: "fn_name".into()
            })
        );
        assert!(set.raw("broken").is_ok());
    }

    #[test]
    fn missing_args_default_to_empty() {
        let set = ChallengeSet::from_json_str(
            r#"{ "pi": { "fn_name": "pi", "template": "", "tests": { "c": { "t": { "res": "3.14" } } } } }"#,
        )
        .unwrap();
        assert_eq!(set.get("pi").unwrap().tests["c"]["t"].args, "");
    }
}
