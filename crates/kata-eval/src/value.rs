//! Runtime values for kata script.
//!
//! Arrays and objects are shared and mutable (reference semantics), strings
//! are immutable and cheap to clone. Object keys keep insertion order.

use std::cell::RefCell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use indexmap::IndexMap;
use kata_types::ast::FunctionDef;

use crate::env::Scope;
use crate::error::{EvalError, EvalResult};
use crate::interpreter::Interpreter;

pub type Array = Rc<RefCell<Vec<Value>>>;
pub type Object = Rc<RefCell<IndexMap<String, Value>>>;

/// Signature of a built-in function: interpreter, `this`, arguments.
pub type NativeFn = fn(&mut Interpreter, &Value, Vec<Value>) -> EvalResult<Value>;

/// Largest array any operation may create.
pub const MAX_ARRAY_LENGTH: usize = 1 << 25;

/// Longest string, in bytes, any operation may create.
pub const MAX_STRING_LENGTH: usize = 1 << 28;

/// Size ceilings for the strings and arrays a script builds. Every
/// operation that grows a value checks the result size before allocating,
/// so a runaway solution fails with a `RangeError` instead of exhausting
/// host memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// In bytes, at most [`MAX_STRING_LENGTH`].
    pub max_string_length: usize,
    /// In elements, at most [`MAX_ARRAY_LENGTH`].
    pub max_array_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_string_length: MAX_STRING_LENGTH,
            max_array_length: MAX_ARRAY_LENGTH,
        }
    }
}

impl Limits {
    pub fn new(max_string_length: usize, max_array_length: usize) -> Self {
        Self {
            max_string_length: max_string_length.min(MAX_STRING_LENGTH),
            max_array_length: max_array_length.min(MAX_ARRAY_LENGTH),
        }
    }

    /// Fails with `RangeError: Invalid string length` past the ceiling.
    pub(crate) fn check_string(&self, bytes: usize) -> EvalResult<()> {
        if bytes > self.max_string_length {
            Err(EvalError::range_error("Invalid string length"))
        } else {
            Ok(())
        }
    }

    /// Fails with `RangeError: Invalid array length` past the ceiling.
    pub(crate) fn check_array(&self, len: usize) -> EvalResult<()> {
        if len > self.max_array_length {
            Err(EvalError::range_error("Invalid array length"))
        } else {
            Ok(())
        }
    }
}

/// An immutable string with its character count cached, so `length` and
/// indexing stay O(1) on ASCII text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Text {
    text: Box<str>,
    chars: usize,
}

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        let text: String = text.into();
        let chars = text.chars().count();
        Self {
            text: text.into_boxed_str(),
            chars,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.chars
    }

    pub fn is_ascii(&self) -> bool {
        self.chars == self.text.len()
    }

    pub fn char_at(&self, index: usize) -> Option<char> {
        if self.is_ascii() {
            self.text.as_bytes().get(index).map(|b| char::from(*b))
        } else {
            self.text.chars().nth(index)
        }
    }

    /// Byte offset of the character at `index`, clamped to the end.
    pub fn byte_offset(&self, index: usize) -> usize {
        if self.is_ascii() {
            index.min(self.text.len())
        } else {
            self.text
                .char_indices()
                .nth(index)
                .map_or(self.text.len(), |(offset, _)| offset)
        }
    }

    /// Character index of a byte offset that lies on a char boundary.
    pub fn char_index(&self, offset: usize) -> usize {
        if self.is_ascii() {
            offset
        } else {
            self.text[..offset].chars().count()
        }
    }

    /// The characters in `start..end` (character indices, clamped).
    pub fn slice(&self, start: usize, end: usize) -> &str {
        if start >= end {
            return "";
        }
        let from = self.byte_offset(start);
        let to = self.byte_offset(end);
        &self.text[from..to]
    }
}

impl Deref for Text {
    type Target = str;

    fn deref(&self) -> &str {
        &self.text
    }
}

/// A kata script value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<Text>),
    Array(Array),
    Object(Object),
    Function(Rc<Function>),
}

/// A callable value.
pub enum Function {
    /// A script function closing over the scope it was created in.
    Closure {
        def: Rc<FunctionDef>,
        scope: Rc<Scope>,
        /// `this` captured by arrow functions at creation.
        this: Option<Value>,
    },
    Native {
        name: &'static str,
        func: NativeFn,
    },
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Closure { def, .. } => def.name.as_ref().map_or("", |n| n.name.as_str()),
            Function::Native { name, .. } => name,
        }
    }
}

impl Value {
    pub fn string(text: impl Into<String>) -> Self {
        Value::String(Rc::new(Text::new(text)))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(entries: IndexMap<String, Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(entries)))
    }

    pub fn native(name: &'static str, func: NativeFn) -> Self {
        Value::Function(Rc::new(Function::Native { name, func }))
    }

    /// `{ name, message }`, the shape of every error a script can catch.
    pub fn error_object(name: &str, message: &str) -> Self {
        let mut entries = IndexMap::new();
        entries.insert("name".to_string(), Value::string(name));
        entries.insert("message".to_string(), Value::string(message));
        Value::object(entries)
    }

    /// `(name, message)` when this value looks like an error object.
    pub fn error_parts(&self) -> Option<(String, String)> {
        let Value::Object(entries) = self else {
            return None;
        };
        let entries = entries.borrow();
        let name = match entries.get("name") {
            Some(Value::String(name)) => name.as_str().to_string(),
            _ => return None,
        };
        let message = entries
            .get("message")
            .map(Value::to_js_string)
            .unwrap_or_default();
        Some((name, message))
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric conversion (`Number(value)`).
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Array(_) => string_to_number(&self.to_js_string()),
            Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// Integer conversion used by index arguments: NaN becomes 0.
    pub fn to_integer(&self) -> f64 {
        let n = self.to_number();
        if n.is_nan() {
            0.0
        } else {
            n.trunc()
        }
    }

    /// Objects and arrays convert to their string form; primitives stay.
    pub fn to_primitive(&self) -> Value {
        match self {
            Value::Array(_) | Value::Object(_) | Value::Function(_) => {
                Value::string(self.to_js_string())
            }
            other => other.clone(),
        }
    }

    /// String conversion (`String(value)`).
    pub fn to_js_string(&self) -> String {
        let mut seen = Vec::new();
        self.write_js_string(&mut seen)
    }

    fn write_js_string(&self, seen: &mut Vec<*const ()>) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.as_str().to_string(),
            Value::Array(items) => {
                let ptr = Rc::as_ptr(items).cast::<()>();
                if seen.contains(&ptr) {
                    return String::new();
                }
                seen.push(ptr);
                let parts: Vec<String> = items
                    .borrow()
                    .iter()
                    .map(|item| {
                        if item.is_nullish() {
                            String::new()
                        } else {
                            item.write_js_string(seen)
                        }
                    })
                    .collect();
                seen.pop();
                parts.join(",")
            }
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(f) => format!("function {}() {{ [native code] }}", f.name()),
        }
    }

    /// Property key conversion for `obj[key]`.
    pub fn to_property_key(&self) -> String {
        match self {
            Value::String(s) => s.as_str().to_string(),
            other => other.to_js_string(),
        }
    }

    /// The array slot this key addresses, if it is a canonical index.
    pub fn as_array_index(&self) -> Option<usize> {
        match self {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n < MAX_ARRAY_LENGTH as f64 => {
                Some(*n as usize)
            }
            Value::String(s) => array_index(s),
            _ => None,
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a.as_str() == b.as_str(),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Like `===`, except `NaN` equals itself (`includes`).
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            (Value::Array(_) | Value::Object(_), Value::Number(_) | Value::String(_)) => {
                self.to_primitive().loose_equals(other)
            }
            (Value::Number(_) | Value::String(_), Value::Array(_) | Value::Object(_)) => {
                self.loose_equals(&other.to_primitive())
            }
            _ => self.strict_equals(other),
        }
    }

    /// Console-style rendering: strings quoted, containers expanded.
    pub fn inspect(&self) -> String {
        let mut seen = Vec::new();
        self.write_inspect(0, &mut seen)
    }

    /// Rendering for `console.log` arguments: top-level strings unquoted.
    pub fn log_format(&self) -> String {
        match self {
            Value::String(s) => s.as_str().to_string(),
            other => other.inspect(),
        }
    }

    fn write_inspect(&self, depth: usize, seen: &mut Vec<*const ()>) -> String {
        const MAX_DEPTH: usize = 2;
        match self {
            Value::String(s) => quote_single(s),
            Value::Array(items) => {
                let ptr = Rc::as_ptr(items).cast::<()>();
                if seen.contains(&ptr) {
                    return "[Circular]".to_string();
                }
                let items = items.borrow();
                if items.is_empty() {
                    return "[]".to_string();
                }
                if depth > MAX_DEPTH {
                    return "[Array]".to_string();
                }
                seen.push(ptr);
                let parts: Vec<String> = items
                    .iter()
                    .map(|item| item.write_inspect(depth + 1, seen))
                    .collect();
                seen.pop();
                format!("[ {} ]", parts.join(", "))
            }
            Value::Object(entries) => {
                let ptr = Rc::as_ptr(entries).cast::<()>();
                if seen.contains(&ptr) {
                    return "[Circular]".to_string();
                }
                let entries = entries.borrow();
                if entries.is_empty() {
                    return "{}".to_string();
                }
                if depth > MAX_DEPTH {
                    return "[Object]".to_string();
                }
                seen.push(ptr);
                let parts: Vec<String> = ordered_entries(&entries)
                    .into_iter()
                    .map(|(key, value)| {
                        let key = if is_identifier(key) {
                            key.clone()
                        } else {
                            quote_single(key)
                        };
                        format!("{key}: {}", value.write_inspect(depth + 1, seen))
                    })
                    .collect();
                seen.pop();
                format!("{{ {} }}", parts.join(", "))
            }
            Value::Function(f) if f.name().is_empty() => "[Function (anonymous)]".to_string(),
            Value::Function(f) => format!("[Function: {}]", f.name()),
            other => other.to_js_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_js_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

/// Number formatting as `String(n)` produces it.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let magnitude = n.abs();
    if magnitude >= 1e21 || magnitude < 1e-6 {
        let formatted = format!("{n:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => formatted,
        };
    }
    format!("{n}")
}

/// `Number("...")`: whitespace-trimmed decimal, hex/octal/binary, or
/// `Infinity`; anything else is NaN. The empty string is 0.
pub fn string_to_number(text: &str) -> f64 {
    let s = text.trim();
    if s.is_empty() {
        return 0.0;
    }
    let radix_prefix = |prefix: &str, radix: u32| {
        s.strip_prefix(prefix)
            .or_else(|| s.strip_prefix(&prefix.to_uppercase()))
            .map(|digits| parse_radix_digits(digits, radix))
    };
    if let Some(n) = radix_prefix("0x", 16)
        .or_else(|| radix_prefix("0o", 8))
        .or_else(|| radix_prefix("0b", 2))
    {
        return n;
    }
    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let well_formed = s
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
        && s.bytes().any(|b| b.is_ascii_digit());
    if !well_formed {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

fn parse_radix_digits(digits: &str, radix: u32) -> f64 {
    if digits.is_empty() {
        return f64::NAN;
    }
    let mut value = 0.0;
    for c in digits.chars() {
        match c.to_digit(radix) {
            Some(d) => value = value * f64::from(radix) + f64::from(d),
            None => return f64::NAN,
        }
    }
    value
}

/// Property enumeration order: integer-like keys ascending, then the rest
/// in insertion order. `Object.keys`, `for…in`, `JSON.stringify` and
/// `console.log` all enumerate this way.
pub fn ordered_entries(entries: &IndexMap<String, Value>) -> Vec<(&String, &Value)> {
    let mut ordered: Vec<(&String, &Value)> = entries.iter().collect();
    if ordered.iter().any(|(key, _)| integer_key(key).is_some()) {
        ordered.sort_by_key(|(key, _)| integer_key(key).map_or((1, 0), |i| (0, i)));
    }
    ordered
}

/// Canonical integer keys below 2^32 - 1, which enumerate first.
fn integer_key(key: &str) -> Option<u32> {
    let canonical = !key.is_empty()
        && key.bytes().all(|b| b.is_ascii_digit())
        && (key == "0" || !key.starts_with('0'));
    if !canonical {
        return None;
    }
    key.parse::<u32>().ok().filter(|i| *i != u32::MAX)
}

/// A canonical array index: digits only, no leading zero.
pub fn array_index(key: &str) -> Option<usize> {
    let canonical = !key.is_empty()
        && key.bytes().all(|b| b.is_ascii_digit())
        && (key == "0" || !key.starts_with('0'));
    if !canonical {
        return None;
    }
    key.parse::<usize>().ok().filter(|i| *i < MAX_ARRAY_LENGTH)
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn quote_single(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
