//! Binary operator semantics.

use std::cmp::Ordering;

use kata_types::ast::BinOp;

use crate::error::EvalResult;
use crate::value::{Limits, Value};

/// Apply a non-short-circuiting binary operator.
pub fn binary(op: BinOp, left: &Value, right: &Value, limits: Limits) -> EvalResult<Value> {
    Ok(match op {
        BinOp::Add => add(left, right, limits)?,
        BinOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinOp::Div => Value::Number(left.to_number() / right.to_number()),
        // f64 `%` truncates like the script operator: the sign follows the dividend.
        BinOp::Mod => Value::Number(left.to_number() % right.to_number()),
        BinOp::Pow => Value::Number(pow(left.to_number(), right.to_number())),
        BinOp::Less => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        BinOp::Greater => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
        BinOp::LessEq => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinOp::GreaterEq => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinOp::LooseEq => Value::Bool(left.loose_equals(right)),
        BinOp::LooseNotEq => Value::Bool(!left.loose_equals(right)),
        BinOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinOp::StrictNotEq => Value::Bool(!left.strict_equals(right)),
    })
}

/// `+`: string concatenation when either side is (or converts to) a
/// string, numeric addition otherwise.
fn add(left: &Value, right: &Value, limits: Limits) -> EvalResult<Value> {
    if let (Value::Number(a), Value::Number(b)) = (left, right) {
        return Ok(Value::Number(a + b));
    }
    let (left, right) = (left.to_primitive(), right.to_primitive());
    match (&left, &right) {
        (Value::String(a), Value::String(b)) => {
            limits.check_string(a.len() + b.len())?;
            let mut out = String::with_capacity(a.len() + b.len());
            out.push_str(a);
            out.push_str(b);
            Ok(Value::string(out))
        }
        (Value::String(_), _) | (_, Value::String(_)) => {
            let (a, b) = (left.to_js_string(), right.to_js_string());
            limits.check_string(a.len() + b.len())?;
            Ok(Value::string(a + &b))
        }
        _ => Ok(Value::Number(left.to_number() + right.to_number())),
    }
}

fn pow(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exponent)
}

/// Relational comparison: lexicographic for two strings, numeric otherwise.
/// `None` when either side is NaN.
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    let (left, right) = (left.to_primitive(), right.to_primitive());
    match (&left, &right) {
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}
