//! Global bindings installed into every fresh interpreter.
//!
//! Constructors (`Number`, `Array`, ...) are native functions; their static
//! members (`Number.isInteger`, `Array.from`, ...) are resolved on property
//! access through [`static_member`].

use indexmap::IndexMap;

use crate::env::Environment;
use crate::error::{EvalError, EvalResult};
use crate::interpreter::{array_length, Interpreter};
use crate::json;
use crate::value::{ordered_entries, Function, NativeFn, Value};

/// Argument `i`, or `undefined`.
pub(crate) fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

pub(crate) fn num_arg(args: &[Value], i: usize) -> f64 {
    args.get(i).map_or(f64::NAN, Value::to_number)
}

fn number(n: f64) -> EvalResult<Value> {
    Ok(Value::Number(n))
}

fn method(entries: &mut IndexMap<String, Value>, name: &'static str, func: NativeFn) {
    entries.insert(name.to_string(), Value::native(name, func));
}

/// Populate the global scope.
pub fn install(env: &mut Environment) {
    env.define_global("Infinity", Value::Number(f64::INFINITY));
    env.define_global("NaN", Value::Number(f64::NAN));
    env.define_global("Math", math_object());
    env.define_global("JSON", json_object());
    env.define_global("console", console_object());

    let globals: [(&'static str, NativeFn); 14] = [
        ("Number", |_, _, args| {
            number(args.first().map_or(0.0, Value::to_number))
        }),
        ("String", |_, _, args| {
            Ok(Value::string(
                args.first().map(Value::to_js_string).unwrap_or_default(),
            ))
        }),
        ("Boolean", |_, _, args| Ok(Value::Bool(arg(&args, 0).is_truthy()))),
        ("Array", array_constructor),
        ("Object", |_, _, args| match args.into_iter().next() {
            Some(value @ (Value::Object(_) | Value::Array(_))) => Ok(value),
            _ => Ok(Value::object(IndexMap::new())),
        }),
        ("parseInt", parse_int_native),
        ("parseFloat", |_, _, args| {
            number(parse_float(&arg(&args, 0).to_js_string()))
        }),
        ("isNaN", |_, _, args| Ok(Value::Bool(num_arg(&args, 0).is_nan()))),
        ("isFinite", |_, _, args| {
            Ok(Value::Bool(num_arg(&args, 0).is_finite()))
        }),
        ("Error", |_, _, args| Ok(error_value("Error", &args))),
        ("TypeError", |_, _, args| Ok(error_value("TypeError", &args))),
        ("RangeError", |_, _, args| Ok(error_value("RangeError", &args))),
        ("ReferenceError", |_, _, args| {
            Ok(error_value("ReferenceError", &args))
        }),
        ("SyntaxError", |_, _, args| {
            Ok(error_value("SyntaxError", &args))
        }),
    ];
    for (name, func) in globals {
        env.define_global(name, Value::native(name, func));
    }
}

fn error_value(name: &str, args: &[Value]) -> Value {
    let message = match args.first() {
        None | Some(Value::Undefined) => String::new(),
        Some(message) => message.to_js_string(),
    };
    Value::error_object(name, &message)
}

/// Static members of the built-in constructors.
pub fn static_member(function: &Function, key: &str) -> Option<Value> {
    let Function::Native { name, .. } = function else {
        return None;
    };
    let value = match (*name, key) {
        ("Number", "MAX_SAFE_INTEGER") => Value::Number(9_007_199_254_740_991.0),
        ("Number", "MIN_SAFE_INTEGER") => Value::Number(-9_007_199_254_740_991.0),
        ("Number", "EPSILON") => Value::Number(f64::EPSILON),
        ("Number", "MAX_VALUE") => Value::Number(f64::MAX),
        ("Number", "MIN_VALUE") => Value::Number(5e-324),
        ("Number", "POSITIVE_INFINITY") => Value::Number(f64::INFINITY),
        ("Number", "NEGATIVE_INFINITY") => Value::Number(f64::NEG_INFINITY),
        ("Number", "NaN") => Value::Number(f64::NAN),
        ("Number", "isInteger") => Value::native("isInteger", |_, _, args| {
            Ok(Value::Bool(matches!(
                args.first(),
                Some(Value::Number(n)) if n.is_finite() && n.fract() == 0.0
            )))
        }),
        ("Number", "isSafeInteger") => Value::native("isSafeInteger", |_, _, args| {
            Ok(Value::Bool(matches!(
                args.first(),
                Some(Value::Number(n)) if n.fract() == 0.0 && n.abs() <= 9_007_199_254_740_991.0
            )))
        }),
        ("Number", "isNaN") => Value::native("isNaN", |_, _, args| {
            Ok(Value::Bool(matches!(args.first(), Some(Value::Number(n)) if n.is_nan())))
        }),
        ("Number", "isFinite") => Value::native("isFinite", |_, _, args| {
            Ok(Value::Bool(matches!(args.first(), Some(Value::Number(n)) if n.is_finite())))
        }),
        ("Number", "parseFloat") => Value::native("parseFloat", |_, _, args| {
            number(parse_float(&arg(&args, 0).to_js_string()))
        }),
        ("Number", "parseInt") => Value::native("parseInt", parse_int_native),
        ("Array", "isArray") => Value::native("isArray", |_, _, args| {
            Ok(Value::Bool(matches!(args.first(), Some(Value::Array(_)))))
        }),
        ("Array", "from") => Value::native("from", array_from),
        ("Array", "of") => Value::native("of", |_, _, args| Ok(Value::array(args))),
        ("Object", "keys") => Value::native("keys", |_, _, args| {
            let entries = own_entries(&arg(&args, 0))?;
            Ok(Value::array(
                entries.into_iter().map(|(k, _)| Value::string(k)).collect(),
            ))
        }),
        ("Object", "values") => Value::native("values", |_, _, args| {
            let entries = own_entries(&arg(&args, 0))?;
            Ok(Value::array(entries.into_iter().map(|(_, v)| v).collect()))
        }),
        ("Object", "entries") => Value::native("entries", |_, _, args| {
            let entries = own_entries(&arg(&args, 0))?;
            Ok(Value::array(
                entries
                    .into_iter()
                    .map(|(k, v)| Value::array(vec![Value::string(k), v]))
                    .collect(),
            ))
        }),
        ("Object", "assign") => Value::native("assign", object_assign),
        ("Object", "fromEntries") => Value::native("fromEntries", object_from_entries),
        ("String", "fromCharCode") => Value::native("fromCharCode", |_, _, args| {
            let text: String = args
                .iter()
                .map(|code| {
                    let unit = (code.to_integer() as i64).rem_euclid(0x1_0000) as u32;
                    char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER)
                })
                .collect();
            Ok(Value::string(text))
        }),
        _ => return None,
    };
    Some(value)
}

// ── Math ─────────────────────────────────────────────────────────────────────

fn math_object() -> Value {
    let mut m = IndexMap::new();
    m.insert("PI".to_string(), Value::Number(std::f64::consts::PI));
    m.insert("E".to_string(), Value::Number(std::f64::consts::E));
    m.insert("LN2".to_string(), Value::Number(std::f64::consts::LN_2));
    m.insert("LN10".to_string(), Value::Number(std::f64::consts::LN_10));
    m.insert("SQRT2".to_string(), Value::Number(std::f64::consts::SQRT_2));
    method(&mut m, "abs", |_, _, a| number(num_arg(&a, 0).abs()));
    method(&mut m, "floor", |_, _, a| number(num_arg(&a, 0).floor()));
    method(&mut m, "ceil", |_, _, a| number(num_arg(&a, 0).ceil()));
    method(&mut m, "trunc", |_, _, a| number(num_arg(&a, 0).trunc()));
    method(&mut m, "round", |_, _, a| number(round(num_arg(&a, 0))));
    method(&mut m, "sqrt", |_, _, a| number(num_arg(&a, 0).sqrt()));
    method(&mut m, "cbrt", |_, _, a| number(num_arg(&a, 0).cbrt()));
    method(&mut m, "sign", |_, _, a| number(sign(num_arg(&a, 0))));
    method(&mut m, "log", |_, _, a| number(num_arg(&a, 0).ln()));
    method(&mut m, "log2", |_, _, a| number(num_arg(&a, 0).log2()));
    method(&mut m, "log10", |_, _, a| number(num_arg(&a, 0).log10()));
    method(&mut m, "exp", |_, _, a| number(num_arg(&a, 0).exp()));
    method(&mut m, "sin", |_, _, a| number(num_arg(&a, 0).sin()));
    method(&mut m, "cos", |_, _, a| number(num_arg(&a, 0).cos()));
    method(&mut m, "tan", |_, _, a| number(num_arg(&a, 0).tan()));
    method(&mut m, "asin", |_, _, a| number(num_arg(&a, 0).asin()));
    method(&mut m, "acos", |_, _, a| number(num_arg(&a, 0).acos()));
    method(&mut m, "atan", |_, _, a| number(num_arg(&a, 0).atan()));
    method(&mut m, "atan2", |_, _, a| {
        number(num_arg(&a, 0).atan2(num_arg(&a, 1)))
    });
    method(&mut m, "pow", |interp, _, a| {
        let (base, exponent) = (arg(&a, 0), arg(&a, 1));
        crate::ops::binary(kata_types::ast::BinOp::Pow, &base, &exponent, interp.limits())
    });
    method(&mut m, "hypot", |_, _, a| {
        number(a.iter().map(|v| v.to_number().powi(2)).sum::<f64>().sqrt())
    });
    method(&mut m, "max", |_, _, a| {
        number(a.iter().map(Value::to_number).fold(f64::NEG_INFINITY, |acc, n| {
            if acc.is_nan() || n.is_nan() {
                f64::NAN
            } else {
                acc.max(n)
            }
        }))
    });
    method(&mut m, "min", |_, _, a| {
        number(a.iter().map(Value::to_number).fold(f64::INFINITY, |acc, n| {
            if acc.is_nan() || n.is_nan() {
                f64::NAN
            } else {
                acc.min(n)
            }
        }))
    });
    method(&mut m, "random", |interp, _, _| number(interp.next_random()));
    Value::object(m)
}

/// Rounds half up, toward +Infinity.
fn round(n: f64) -> f64 {
    if !n.is_finite() || n.fract() == 0.0 {
        return n;
    }
    (n + 0.5).floor()
}

fn sign(n: f64) -> f64 {
    if n.is_nan() || n == 0.0 {
        n
    } else {
        n.signum()
    }
}

// ── JSON & console ───────────────────────────────────────────────────────────

fn json_object() -> Value {
    let mut m = IndexMap::new();
    method(&mut m, "stringify", |_, _, args| {
        let indent = match args.get(2) {
            Some(Value::Number(n)) => " ".repeat(n.clamp(0.0, 10.0) as usize),
            Some(Value::String(s)) => s.chars().take(10).collect(),
            _ => String::new(),
        };
        match json::stringify(&arg(&args, 0), &indent) {
            Ok(Some(text)) => Ok(Value::string(text)),
            Ok(None) => Ok(Value::Undefined),
            Err(_) => Err(EvalError::type_error(
                "Converting circular structure to JSON",
            )),
        }
    });
    method(&mut m, "parse", |_, _, args| {
        let text = arg(&args, 0).to_js_string();
        serde_json::from_str::<serde_json::Value>(&text)
            .map(|parsed| json::from_json_value(&parsed))
            .map_err(|e| EvalError::syntax_error(format!("Unexpected token in JSON: {e}")))
    });
    Value::object(m)
}

fn console_object() -> Value {
    fn log(interp: &mut Interpreter, _: &Value, args: Vec<Value>) -> EvalResult<Value> {
        let line = args
            .iter()
            .map(Value::log_format)
            .collect::<Vec<_>>()
            .join(" ");
        interp.log(line);
        Ok(Value::Undefined)
    }
    let mut m = IndexMap::new();
    for name in ["log", "info", "warn", "error", "debug"] {
        method(&mut m, name, log);
    }
    Value::object(m)
}

// ── Array / Object statics ───────────────────────────────────────────────────

fn array_constructor(interp: &mut Interpreter, _: &Value, args: Vec<Value>) -> EvalResult<Value> {
    match args.as_slice() {
        [Value::Number(_)] => {
            let len = array_length(&args[0])?;
            interp.limits().check_array(len)?;
            Ok(Value::array(vec![Value::Undefined; len]))
        }
        _ => Ok(Value::array(args)),
    }
}

/// `Array.from(arrayOrStringOrArrayLike, mapFn?)`
fn array_from(interp: &mut Interpreter, _: &Value, args: Vec<Value>) -> EvalResult<Value> {
    let items: Vec<Value> = match arg(&args, 0) {
        Value::Array(items) => items.borrow().clone(),
        Value::String(text) => text.chars().map(Value::string).collect(),
        Value::Object(entries) => {
            let len = entries.borrow().get("length").cloned().unwrap_or_default();
            let len = if len.is_nullish() {
                0
            } else {
                array_length(&Value::Number(len.to_integer().max(0.0)))?
            };
            vec![Value::Undefined; len]
        }
        _ => Vec::new(),
    };
    let Some(map_fn) = args.get(1).filter(|f| !f.is_nullish()) else {
        return Ok(Value::array(items));
    };
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        out.push(interp.call_function(
            map_fn,
            Value::Undefined,
            vec![item, Value::Number(i as f64)],
        )?);
    }
    Ok(Value::array(out))
}

/// Own enumerable `(key, value)` pairs for `Object.keys` and friends.
fn own_entries(value: &Value) -> EvalResult<Vec<(String, Value)>> {
    match value {
        Value::Undefined | Value::Null => Err(EvalError::type_error(
            "Cannot convert undefined or null to object",
        )),
        Value::Object(entries) => Ok(ordered_entries(&entries.borrow())
            .into_iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()),
        Value::Array(items) => Ok(items
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect()),
        Value::String(text) => Ok(text
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string(), Value::string(c)))
            .collect()),
        _ => Ok(Vec::new()),
    }
}

fn object_assign(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> EvalResult<Value> {
    let mut args = args.into_iter();
    let target = args.next().unwrap_or_default();
    let Value::Object(entries) = &target else {
        return Err(EvalError::type_error(
            "Object.assign target must be an object",
        ));
    };
    for source in args.filter(|s| !s.is_nullish()) {
        for (key, value) in own_entries(&source)? {
            entries.borrow_mut().insert(key, value);
        }
    }
    Ok(target)
}

fn object_from_entries(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> EvalResult<Value> {
    let Value::Array(pairs) = arg(&args, 0) else {
        return Err(EvalError::type_error("Object.fromEntries expects an array"));
    };
    let mut entries = IndexMap::new();
    for pair in pairs.borrow().iter() {
        let Value::Array(pair) = pair else {
            return Err(EvalError::type_error(format!(
                "Iterator value {} is not an entry object",
                pair.inspect()
            )));
        };
        let pair = pair.borrow();
        let key = pair.first().cloned().unwrap_or_default().to_property_key();
        entries.insert(key, pair.get(1).cloned().unwrap_or_default());
    }
    Ok(Value::object(entries))
}

// ── Number parsing ───────────────────────────────────────────────────────────

fn parse_int_native(_: &mut Interpreter, _: &Value, args: Vec<Value>) -> EvalResult<Value> {
    let radix = match args.get(1).map(Value::to_integer) {
        None => 0,
        Some(r) if (2.0..=36.0).contains(&r) => r as u32,
        Some(r) if r == 0.0 => 0,
        Some(_) => return number(f64::NAN),
    };
    number(parse_int(&arg(&args, 0).to_js_string(), radix))
}

/// `parseInt`: optional sign, `0x` prefix when the radix allows it, then the
/// longest run of digits valid in `radix`. A radix of 0 means "detect".
pub fn parse_int(text: &str, radix: u32) -> f64 {
    let s = text.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let hex = s.starts_with("0x") || s.starts_with("0X");
    let (radix, s) = match radix {
        0 | 16 if hex => (16, &s[2..]),
        0 => (10, s),
        r => (r, s),
    };
    let mut value = 0.0;
    let mut digits = 0;
    for c in s.chars() {
        let Some(d) = c.to_digit(radix) else {
            break;
        };
        value = value * f64::from(radix) + f64::from(d);
        digits += 1;
    }
    if digits == 0 {
        return f64::NAN;
    }
    if negative {
        -value
    } else {
        value
    }
}

/// `parseFloat`: the longest decimal-literal prefix, or NaN.
pub fn parse_float(text: &str) -> f64 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if s[end..].starts_with("Infinity") {
        return if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    let digits_from = |mut i: usize| {
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        i
    };
    let int_end = digits_from(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa_digits += frac_end - end - 1;
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return f64::NAN;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }
    s[..end].parse::<f64>().unwrap_or(f64::NAN)
}
