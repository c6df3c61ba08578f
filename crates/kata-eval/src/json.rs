//! JSON serialisation of script values.
//!
//! [`to_canonical_json`] is the comparison form used to judge test results:
//! compact, integer-like keys first in ascending order and the rest in
//! insertion order, numbers formatted exactly as the script prints them. It matches what `JSON.stringify` returns inside a script.

use std::fmt::Write as _;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::value::{number_to_string, ordered_entries, Value};

/// A value refers back to one of its own containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircularError;

/// Compact canonical serialisation. `None` for values with no JSON form
/// (`undefined`, functions) and for circular structures.
pub fn to_canonical_json(value: &Value) -> Option<String> {
    stringify(value, "").ok().flatten()
}

/// `JSON.stringify(value, null, indent)`.
pub fn stringify(value: &Value, indent: &str) -> Result<Option<String>, CircularError> {
    if !has_json_form(value) {
        return Ok(None);
    }
    let mut writer = JsonWriter {
        out: String::new(),
        indent,
        stack: Vec::new(),
    };
    writer.write(value, 0)?;
    Ok(Some(writer.out))
}

/// Structured form for reports. Values without a JSON form become `null`.
pub fn to_json_value(value: &Value) -> serde_json::Value {
    to_canonical_json(value)
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or(serde_json::Value::Null)
}

/// Build a script value from parsed JSON (`JSON.parse`).
pub fn from_json_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::string(s.as_str()),
        serde_json::Value::Array(items) => Value::array(items.iter().map(from_json_value).collect()),
        serde_json::Value::Object(entries) => {
            let entries: IndexMap<String, Value> = entries
                .iter()
                .map(|(k, v)| (k.clone(), from_json_value(v)))
                .collect();
            Value::object(entries)
        }
    }
}

fn has_json_form(value: &Value) -> bool {
    !matches!(value, Value::Undefined | Value::Function(_))
}

struct JsonWriter<'a> {
    out: String,
    indent: &'a str,
    stack: Vec<*const ()>,
}

impl JsonWriter<'_> {
    fn write(&mut self, value: &Value, depth: usize) -> Result<(), CircularError> {
        match value {
            Value::Null | Value::Undefined | Value::Function(_) => self.out.push_str("null"),
            Value::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) if n.is_finite() => self.out.push_str(&number_to_string(*n)),
            Value::Number(_) => self.out.push_str("null"),
            Value::String(s) => quote(s, &mut self.out),
            Value::Array(items) => {
                self.enter(Rc::as_ptr(items).cast())?;
                let items = items.borrow();
                self.out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.newline(depth + 1);
                    self.write(item, depth + 1)?;
                }
                if !items.is_empty() {
                    self.newline(depth);
                }
                self.out.push(']');
                self.stack.pop();
            }
            Value::Object(entries) => {
                self.enter(Rc::as_ptr(entries).cast())?;
                let entries = entries.borrow();
                self.out.push('{');
                let mut first = true;
                for (key, item) in ordered_entries(&entries)
                    .into_iter()
                    .filter(|(_, v)| has_json_form(v))
                {
                    if !first {
                        self.out.push(',');
                    }
                    first = false;
                    self.newline(depth + 1);
                    quote(key, &mut self.out);
                    self.out.push(':');
                    if !self.indent.is_empty() {
                        self.out.push(' ');
                    }
                    self.write(item, depth + 1)?;
                }
                if !first {
                    self.newline(depth);
                }
                self.out.push('}');
                self.stack.pop();
            }
        }
        Ok(())
    }

    fn enter(&mut self, ptr: *const ()) -> Result<(), CircularError> {
        if self.stack.contains(&ptr) {
            return Err(CircularError);
        }
        self.stack.push(ptr);
        Ok(())
    }

    fn newline(&mut self, depth: usize) {
        if self.indent.is_empty() {
            return;
        }
        self.out.push('\n');
        for _ in 0..depth {
            self.out.push_str(self.indent);
        }
    }
}

/// JSON string quoting with the same escapes `JSON.stringify` emits.
fn quote(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            c if u32::from(c) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
