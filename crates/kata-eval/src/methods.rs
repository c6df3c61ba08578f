//! Built-in methods on arrays, strings, and numbers.
//!
//! Dispatch is by receiver type and method name. Callbacks may mutate the
//! receiver, so no `RefCell` borrow is held across a callback.

use std::rc::Rc;

use crate::builtins::arg;
use crate::error::{EvalError, EvalResult};
use crate::interpreter::Interpreter;
use crate::value::{number_to_string, Array, Limits, Text, Value};

fn not_a_function(name: &str) -> EvalError {
    EvalError::type_error(format!("{name} is not a function"))
}

/// Resolve a relative start/end argument against `len`: negative counts
/// from the end, the result is clamped to `0..=len`.
fn relative(value: Option<&Value>, len: usize, default: usize) -> usize {
    match value {
        None | Some(Value::Undefined) => default,
        Some(value) => {
            let n = value.to_integer();
            if n < 0.0 {
                (len as f64 + n).max(0.0) as usize
            } else {
                n.min(len as f64) as usize
            }
        }
    }
}

fn callback(args: &[Value]) -> EvalResult<Value> {
    match args.first() {
        Some(f @ Value::Function(_)) => Ok(f.clone()),
        Some(other) => Err(EvalError::type_error(format!(
            "{} is not a function",
            other.inspect()
        ))),
        None => Err(EvalError::type_error("undefined is not a function")),
    }
}

fn element(array: &Array, i: usize) -> Value {
    array.borrow().get(i).cloned().unwrap_or_default()
}

fn len(array: &Array) -> usize {
    array.borrow().len()
}

/// Call `f(element, index, array)` for each index below the length the
/// array had when iteration started, stopping early when `visit` returns
/// `Some`. Indices the callback has since removed are skipped and elements
/// it appends are never visited.
fn each_element<T>(
    interp: &mut Interpreter,
    array: &Array,
    f: &Value,
    visit: impl FnMut(usize, Value, Value) -> Option<T>,
) -> EvalResult<Option<T>> {
    visit_indices(interp, array, f, true, visit)
}

/// Like [`each_element`], but indices past the current end are still
/// visited, reading `undefined`. This is how `find` and `findIndex` walk.
fn each_index<T>(
    interp: &mut Interpreter,
    array: &Array,
    f: &Value,
    visit: impl FnMut(usize, Value, Value) -> Option<T>,
) -> EvalResult<Option<T>> {
    visit_indices(interp, array, f, false, visit)
}

fn visit_indices<T>(
    interp: &mut Interpreter,
    array: &Array,
    f: &Value,
    skip_missing: bool,
    mut visit: impl FnMut(usize, Value, Value) -> Option<T>,
) -> EvalResult<Option<T>> {
    let count = len(array);
    for i in 0..count {
        if skip_missing && i >= len(array) {
            continue;
        }
        let item = element(array, i);
        let result = interp.call_function(
            f,
            Value::Undefined,
            vec![item.clone(), Value::Number(i as f64), Value::Array(Rc::clone(array))],
        )?;
        if let Some(done) = visit(i, item, result) {
            return Ok(Some(done));
        }
    }
    Ok(None)
}

// ══════════════════════════════════════════════════════════════════════════════
// Arrays
// ══════════════════════════════════════════════════════════════════════════════

pub(crate) fn call_array_method(
    interp: &mut Interpreter,
    array: &Array,
    name: &str,
    args: Vec<Value>,
) -> EvalResult<Value> {
    let this = || Value::Array(Rc::clone(array));
    let limits = interp.limits();
    match name {
        "push" => {
            let mut items = array.borrow_mut();
            limits.check_array(items.len() + args.len())?;
            items.extend(args);
            Ok(Value::Number(items.len() as f64))
        }
        "pop" => Ok(array.borrow_mut().pop().unwrap_or_default()),
        "shift" => {
            let mut items = array.borrow_mut();
            if items.is_empty() {
                Ok(Value::Undefined)
            } else {
                Ok(items.remove(0))
            }
        }
        "unshift" => {
            let mut items = array.borrow_mut();
            limits.check_array(items.len() + args.len())?;
            items.splice(0..0, args);
            Ok(Value::Number(items.len() as f64))
        }
        "slice" => {
            let items = array.borrow();
            let start = relative(args.first(), items.len(), 0);
            let end = relative(args.get(1), items.len(), items.len());
            Ok(Value::array(if start < end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            }))
        }
        "splice" => {
            let mut items = array.borrow_mut();
            let start = relative(args.first(), items.len(), 0);
            let delete = match args.get(1) {
                None => items.len() - start,
                Some(count) => (count.to_integer().max(0.0) as usize).min(items.len() - start),
            };
            let inserted: Vec<Value> = args.into_iter().skip(2).collect();
            limits.check_array(items.len() - delete + inserted.len())?;
            let removed: Vec<Value> = items.splice(start..start + delete, inserted).collect();
            Ok(Value::array(removed))
        }
        "concat" => {
            let mut out = array.borrow().clone();
            for value in args {
                match value {
                    Value::Array(other) => {
                        let other = other.borrow();
                        limits.check_array(out.len() + other.len())?;
                        out.extend(other.iter().cloned());
                    }
                    other => {
                        limits.check_array(out.len() + 1)?;
                        out.push(other);
                    }
                }
            }
            Ok(Value::array(out))
        }
        "indexOf" => {
            let items = array.borrow();
            let target = arg(&args, 0);
            let from = relative(args.get(1), items.len(), 0);
            let found = items
                .iter()
                .skip(from)
                .position(|item| item.strict_equals(&target));
            Ok(Value::Number(found.map_or(-1.0, |i| (i + from) as f64)))
        }
        "lastIndexOf" => {
            let items = array.borrow();
            let target = arg(&args, 0);
            let found = items.iter().rposition(|item| item.strict_equals(&target));
            Ok(Value::Number(found.map_or(-1.0, |i| i as f64)))
        }
        "includes" => {
            let items = array.borrow();
            let target = arg(&args, 0);
            let from = relative(args.get(1), items.len(), 0);
            Ok(Value::Bool(
                items.iter().skip(from).any(|item| item.same_value_zero(&target)),
            ))
        }
        "join" | "toString" => {
            let separator = match args.first() {
                Some(sep) if name == "join" && !matches!(sep, Value::Undefined) => {
                    sep.to_js_string()
                }
                _ => ",".to_string(),
            };
            let parts: Vec<String> = array
                .borrow()
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_js_string()
                    }
                })
                .collect();
            let bytes = parts.iter().map(String::len).sum::<usize>()
                + separator.len().saturating_mul(parts.len().saturating_sub(1));
            limits.check_string(bytes)?;
            Ok(Value::string(parts.join(&separator)))
        }
        "reverse" => {
            array.borrow_mut().reverse();
            Ok(this())
        }
        "sort" => {
            let comparator = args.into_iter().next().filter(|c| !c.is_nullish());
            sort(interp, array, comparator)?;
            Ok(this())
        }
        "at" => {
            let items = array.borrow();
            let i = arg(&args, 0).to_integer();
            let index = if i < 0.0 { items.len() as f64 + i } else { i };
            Ok(if index >= 0.0 {
                items.get(index as usize).cloned().unwrap_or_default()
            } else {
                Value::Undefined
            })
        }
        "fill" => {
            let value = arg(&args, 0);
            let mut items = array.borrow_mut();
            let start = relative(args.get(1), items.len(), 0);
            let end = relative(args.get(2), items.len(), items.len());
            for slot in items.iter_mut().take(end).skip(start) {
                *slot = value.clone();
            }
            Ok(this())
        }
        "flat" => {
            let depth = match args.first() {
                None | Some(Value::Undefined) => 1.0,
                Some(depth) => depth.to_integer(),
            };
            let mut out = Vec::new();
            flatten_into(&array.borrow(), depth, &mut out, limits)?;
            Ok(Value::array(out))
        }
        "keys" => Ok(Value::array(
            (0..len(array)).map(|i| Value::Number(i as f64)).collect(),
        )),
        "map" => {
            let f = callback(&args)?;
            let count = len(array);
            let mut out = vec![Value::Undefined; count];
            each_element(interp, array, &f, |i, _, result| {
                out[i] = result;
                None::<()>
            })?;
            Ok(Value::array(out))
        }
        "flatMap" => {
            let f = callback(&args)?;
            let mut out = Vec::new();
            let mut overflow = false;
            each_element(interp, array, &f, |_, _, result| {
                match result {
                    Value::Array(inner) => {
                        let inner = inner.borrow();
                        overflow = limits.check_array(out.len() + inner.len()).is_err();
                        if !overflow {
                            out.extend(inner.iter().cloned());
                        }
                    }
                    other => out.push(other),
                }
                overflow.then_some(())
            })?;
            if overflow {
                return Err(EvalError::range_error("Invalid array length"));
            }
            Ok(Value::array(out))
        }
        "filter" => {
            let f = callback(&args)?;
            let mut out = Vec::new();
            each_element(interp, array, &f, |_, item, keep| {
                if keep.is_truthy() {
                    out.push(item);
                }
                None::<()>
            })?;
            Ok(Value::array(out))
        }
        "forEach" => {
            let f = callback(&args)?;
            each_element(interp, array, &f, |_, _, _| None::<()>)?;
            Ok(Value::Undefined)
        }
        "some" => {
            let f = callback(&args)?;
            let hit = each_element(interp, array, &f, |_, _, r| r.is_truthy().then_some(()))?;
            Ok(Value::Bool(hit.is_some()))
        }
        "every" => {
            let f = callback(&args)?;
            let miss = each_element(interp, array, &f, |_, _, r| (!r.is_truthy()).then_some(()))?;
            Ok(Value::Bool(miss.is_none()))
        }
        "find" => {
            let f = callback(&args)?;
            let hit = each_index(interp, array, &f, |_, item, r| r.is_truthy().then_some(item))?;
            Ok(hit.unwrap_or_default())
        }
        "findIndex" => {
            let f = callback(&args)?;
            let hit = each_index(interp, array, &f, |i, _, r| r.is_truthy().then_some(i))?;
            Ok(Value::Number(hit.map_or(-1.0, |i| i as f64)))
        }
        "findLast" | "findLastIndex" => {
            let f = callback(&args)?;
            for i in (0..len(array)).rev() {
                let item = element(array, i);
                let hit = interp.call_function(
                    &f,
                    Value::Undefined,
                    vec![item.clone(), Value::Number(i as f64), this()],
                )?;
                if hit.is_truthy() {
                    return Ok(if name == "findLast" {
                        item
                    } else {
                        Value::Number(i as f64)
                    });
                }
            }
            Ok(if name == "findLast" {
                Value::Undefined
            } else {
                Value::Number(-1.0)
            })
        }
        "reduce" | "reduceRight" => {
            let f = callback(&args)?;
            let count = len(array);
            let mut indices: Box<dyn Iterator<Item = usize>> = if name == "reduce" {
                Box::new(0..count)
            } else {
                Box::new((0..count).rev())
            };
            let mut acc = match args.get(1) {
                Some(initial) => initial.clone(),
                None => match indices.next() {
                    Some(i) => element(array, i),
                    None => {
                        return Err(EvalError::type_error(
                            "Reduce of empty array with no initial value",
                        ))
                    }
                },
            };
            for i in indices {
                if i >= len(array) {
                    continue;
                }
                let item = element(array, i);
                acc = interp.call_function(
                    &f,
                    Value::Undefined,
                    vec![acc, item, Value::Number(i as f64), this()],
                )?;
            }
            Ok(acc)
        }
        _ => Err(not_a_function(name)),
    }
}

fn flatten_into(
    items: &[Value],
    depth: f64,
    out: &mut Vec<Value>,
    limits: Limits,
) -> EvalResult<()> {
    for item in items {
        match item {
            Value::Array(inner) if depth >= 1.0 => {
                flatten_into(&inner.borrow(), depth - 1.0, out, limits)?;
            }
            other => {
                limits.check_array(out.len() + 1)?;
                out.push(other.clone());
            }
        }
    }
    Ok(())
}

/// Stable in-place sort. `undefined` elements always go last. Without a
/// comparator elements are ordered by their string form. Elements a
/// comparator appends stay after the sorted ones.
fn sort(interp: &mut Interpreter, array: &Array, comparator: Option<Value>) -> EvalResult<()> {
    let items = array.borrow().clone();
    let count = items.len();
    let (mut defined, undefined): (Vec<Value>, Vec<Value>) = items
        .into_iter()
        .partition(|item| !matches!(item, Value::Undefined));
    match comparator {
        None => {
            let mut keyed: Vec<(String, Value)> = defined
                .into_iter()
                .map(|item| (item.to_js_string(), item))
                .collect();
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
            defined = keyed.into_iter().map(|(_, item)| item).collect();
        }
        Some(f) => defined = merge_sort(interp, defined, &f)?,
    }
    defined.extend(undefined);
    let mut current = array.borrow_mut();
    if current.len() > count {
        defined.extend(current.drain(count..));
    }
    *current = defined;
    Ok(())
}

/// Bottom-up merge sort driven by a script comparator, which may throw or
/// be inconsistent without breaking the sort.
fn merge_sort(interp: &mut Interpreter, items: Vec<Value>, f: &Value) -> EvalResult<Vec<Value>> {
    let n = items.len();
    let mut src = items;
    let mut width = 1;
    while width < n {
        let mut dst = Vec::with_capacity(n);
        let mut start = 0;
        while start < n {
            let mid = (start + width).min(n);
            let end = (start + 2 * width).min(n);
            let (mut i, mut j) = (start, mid);
            while i < mid && j < end {
                let order = interp
                    .call_function(f, Value::Undefined, vec![src[i].clone(), src[j].clone()])?
                    .to_number();
                if order > 0.0 {
                    dst.push(src[j].clone());
                    j += 1;
                } else {
                    dst.push(src[i].clone());
                    i += 1;
                }
            }
            dst.extend_from_slice(&src[i..mid]);
            dst.extend_from_slice(&src[j..end]);
            start = end;
        }
        src = dst;
        width *= 2;
    }
    Ok(src)
}

// ══════════════════════════════════════════════════════════════════════════════
// Strings
// ══════════════════════════════════════════════════════════════════════════════

pub(crate) fn call_string_method(
    interp: &mut Interpreter,
    text: &Rc<Text>,
    name: &str,
    args: Vec<Value>,
) -> EvalResult<Value> {
    let length = text.char_len();
    let limits = interp.limits();
    let string_arg = |i: usize| args.get(i).map(Value::to_js_string).unwrap_or_default();
    match name {
        "charAt" => {
            let i = arg(&args, 0).to_integer();
            let c = (i >= 0.0).then(|| text.char_at(i as usize)).flatten();
            Ok(Value::string(c.map(String::from).unwrap_or_default()))
        }
        "charCodeAt" | "codePointAt" => {
            let i = arg(&args, 0).to_integer();
            let c = (i >= 0.0).then(|| text.char_at(i as usize)).flatten();
            Ok(match c {
                Some(c) => Value::Number(f64::from(u32::from(c))),
                None if name == "charCodeAt" => Value::Number(f64::NAN),
                None => Value::Undefined,
            })
        }
        "at" => {
            let i = arg(&args, 0).to_integer();
            let index = if i < 0.0 { length as f64 + i } else { i };
            let c = (index >= 0.0).then(|| text.char_at(index as usize)).flatten();
            Ok(c.map(Value::string).unwrap_or_default())
        }
        "indexOf" => {
            let needle = string_arg(0);
            let from = relative(args.get(1).filter(|v| v.to_integer() >= 0.0), length, 0);
            let offset = text.byte_offset(from);
            let found = text.as_str()[offset..].find(&needle).map(|b| text.char_index(offset + b));
            Ok(Value::Number(found.map_or(-1.0, |i| i as f64)))
        }
        "lastIndexOf" => {
            let needle = string_arg(0);
            let found = text.rfind(&needle).map(|b| text.char_index(b));
            Ok(Value::Number(found.map_or(-1.0, |i| i as f64)))
        }
        "includes" => Ok(Value::Bool(text.contains(&string_arg(0)))),
        "startsWith" => {
            let from = relative(args.get(1), length, 0);
            Ok(Value::Bool(text.slice(from, length).starts_with(&string_arg(0))))
        }
        "endsWith" => {
            let end = relative(args.get(1), length, length);
            Ok(Value::Bool(text.slice(0, end).ends_with(&string_arg(0))))
        }
        "slice" => {
            let start = relative(args.first(), length, 0);
            let end = relative(args.get(1), length, length);
            Ok(Value::string(text.slice(start, end)))
        }
        "substring" => {
            let clamp = |v: Option<&Value>, default: usize| match v {
                None | Some(Value::Undefined) => default,
                Some(v) => v.to_integer().clamp(0.0, length as f64) as usize,
            };
            let a = clamp(args.first(), 0);
            let b = clamp(args.get(1), length);
            Ok(Value::string(text.slice(a.min(b), a.max(b))))
        }
        "split" => {
            let limit = match args.get(1) {
                None | Some(Value::Undefined) => usize::MAX,
                Some(limit) => limit.to_integer().max(0.0) as usize,
            };
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::Undefined) => vec![Value::String(Rc::clone(text))],
                Some(separator) => {
                    let separator = separator.to_js_string();
                    if separator.is_empty() {
                        text.chars().map(Value::string).collect()
                    } else {
                        text.split(separator.as_str()).map(Value::string).collect()
                    }
                }
            };
            Ok(Value::array(parts.into_iter().take(limit).collect()))
        }
        "toUpperCase" | "toLocaleUpperCase" => Ok(Value::string(text.to_uppercase())),
        "toLowerCase" | "toLocaleLowerCase" => Ok(Value::string(text.to_lowercase())),
        "trim" => Ok(Value::string(text.trim())),
        "trimStart" => Ok(Value::string(text.trim_start())),
        "trimEnd" => Ok(Value::string(text.trim_end())),
        "repeat" => {
            let count = arg(&args, 0).to_integer();
            if count < 0.0 || count.is_infinite() {
                return Err(EvalError::range_error(format!(
                    "Invalid count value: {}",
                    number_to_string(count)
                )));
            }
            let count = count as usize;
            limits.check_string(text.len().saturating_mul(count))?;
            Ok(Value::string(text.repeat(count)))
        }
        "replace" | "replaceAll" => {
            let pattern = string_arg(0);
            let replacement = arg(&args, 1);
            let mut out = String::with_capacity(text.len());
            let mut rest = text.as_str();
            let mut consumed = 0;
            loop {
                let found = if pattern.is_empty() && consumed > 0 {
                    None
                } else {
                    rest.find(&pattern)
                };
                let Some(at) = found else {
                    break;
                };
                out.push_str(&rest[..at]);
                let position = text.char_index(consumed + at);
                let piece = match &replacement {
                    f @ Value::Function(_) => interp
                        .call_function(
                            f,
                            Value::Undefined,
                            vec![
                                Value::string(pattern.as_str()),
                                Value::Number(position as f64),
                                Value::String(Rc::clone(text)),
                            ],
                        )?
                        .to_js_string(),
                    other => other.to_js_string().replace("$&", &pattern),
                };
                limits.check_string(out.len() + piece.len() + text.len() - consumed - at)?;
                out.push_str(&piece);
                let advance = at + pattern.len();
                consumed += advance;
                rest = &rest[advance..];
                if name == "replace" || pattern.is_empty() {
                    break;
                }
            }
            out.push_str(rest);
            Ok(Value::string(out))
        }
        "padStart" | "padEnd" => {
            let target = arg(&args, 0).to_integer().max(0.0) as usize;
            let filler = match args.get(1) {
                None | Some(Value::Undefined) => " ".to_string(),
                Some(f) => f.to_js_string(),
            };
            if target <= length || filler.is_empty() {
                return Ok(Value::String(Rc::clone(text)));
            }
            limits.check_string(target)?;
            let pad: String = filler.chars().cycle().take(target - length).collect();
            Ok(Value::string(if name == "padStart" {
                format!("{pad}{}", text.as_str())
            } else {
                format!("{}{pad}", text.as_str())
            }))
        }
        "concat" => {
            let mut out = text.as_str().to_string();
            for value in &args {
                let piece = value.to_js_string();
                limits.check_string(out.len() + piece.len())?;
                out.push_str(&piece);
            }
            Ok(Value::string(out))
        }
        "localeCompare" => {
            let other = string_arg(0);
            Ok(Value::Number(match text.as_str().cmp(other.as_str()) {
                std::cmp::Ordering::Less => -1.0,
                std::cmp::Ordering::Equal => 0.0,
                std::cmp::Ordering::Greater => 1.0,
            }))
        }
        "toString" | "valueOf" => Ok(Value::String(Rc::clone(text))),
        _ => Err(not_a_function(name)),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Numbers
// ══════════════════════════════════════════════════════════════════════════════

pub(crate) fn call_number_method(n: f64, name: &str, args: Vec<Value>) -> EvalResult<Value> {
    match name {
        "toFixed" => {
            let digits = match args.first() {
                None | Some(Value::Undefined) => 0.0,
                Some(d) => d.to_integer(),
            };
            if !(0.0..=100.0).contains(&digits) {
                return Err(EvalError::range_error(
                    "toFixed() digits argument must be between 0 and 100",
                ));
            }
            if !n.is_finite() || n.abs() >= 1e21 {
                return Ok(Value::string(number_to_string(n)));
            }
            Ok(Value::string(format!("{:.*}", digits as usize, n)))
        }
        "toString" => {
            let radix = match args.first() {
                None | Some(Value::Undefined) => 10.0,
                Some(r) => r.to_integer(),
            };
            if !(2.0..=36.0).contains(&radix) {
                return Err(EvalError::range_error(
                    "toString() radix must be between 2 and 36",
                ));
            }
            Ok(Value::string(to_radix_string(n, radix as u32)))
        }
        "valueOf" => Ok(Value::Number(n)),
        _ => Err(not_a_function(name)),
    }
}

/// Integers in any radix; fractional values fall back to decimal.
fn to_radix_string(n: f64, radix: u32) -> String {
    if radix == 10 || !n.is_finite() || n.fract() != 0.0 || n.abs() >= 2f64.powi(53) {
        return number_to_string(n);
    }
    let mut magnitude = n.abs() as u64;
    if magnitude == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while magnitude > 0 {
        let d = (magnitude % u64::from(radix)) as u32;
        digits.push(char::from_digit(d, radix).unwrap_or('0'));
        magnitude /= u64::from(radix);
    }
    if n < 0.0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}
