//! Operator dispatch: binary/unary arithmetic and comparisons
//! over the numeric tower, strings, lists, tuples, and dicts.

use crate::ast::{BinOp, CmpOp, UnaryOp};
use crate::error::{Error, Result};
use crate::numeric::{self, numeric_to_value};
use crate::value::Value;

/// `+`: numeric add, string/list concatenation.
fn add(left: &Value, right: &Value) -> Result<Value> {
    if let (Some(a), Some(b)) = (left.as_numeric(), right.as_numeric()) {
        return Ok(numeric_to_value(numeric::add(a, b)));
    }
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{a}{b}"))),
        (Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (Value::Tuple(a), Value::Tuple(b)) => {
            let mut items = a.as_ref().clone();
            items.extend(b.iter().cloned());
            Ok(Value::tuple(items))
        }
        _ => Err(type_error("+", left, right)),
    }
}

/// `*`: numeric mul, plus string/list repetition by an integer.
fn mul(left: &Value, right: &Value) -> Result<Value> {
    if let (Some(a), Some(b)) = (left.as_numeric(), right.as_numeric()) {
        return Ok(numeric_to_value(numeric::mul(a, b)));
    }
    match (left, right) {
        (Value::Str(s), other) | (other, Value::Str(s)) if other.as_numeric().is_some() => {
            let n = other.as_numeric().unwrap().to_i64().max(0) as usize;
            Ok(Value::str(s.repeat(n)))
        }
        (Value::List(l), other) | (other, Value::List(l)) if other.as_numeric().is_some() => {
            let n = other.as_numeric().unwrap().to_i64().max(0) as usize;
            let base = l.borrow();
            let mut items = Vec::with_capacity(base.len() * n);
            for _ in 0..n {
                items.extend(base.iter().cloned());
            }
            Ok(Value::list(items))
        }
        _ => Err(type_error("*", left, right)),
    }
}

/// `%`: numeric modulo, or Python `%`-style string formatting when the
/// left operand is a string.
fn modulo(left: &Value, right: &Value) -> Result<Value> {
    if let Value::Str(fmt) = left {
        return Ok(Value::str(percent_format(fmt, right)));
    }
    if let (Some(a), Some(b)) = (left.as_numeric(), right.as_numeric()) {
        if b.is_zero() {
            return Err(Error::TypeError("modulo by zero".to_string()));
        }
        return Ok(numeric_to_value(numeric::modulo(a, b)));
    }
    Err(type_error("%", left, right))
}

fn percent_format(fmt: &str, arg: &Value) -> String {
    let args: Vec<Value> = match arg {
        Value::Tuple(items) => items.as_ref().clone(),
        other => vec![other.clone()],
    };
    let mut out = String::new();
    let mut chars = fmt.chars().peekable();
    let mut arg_idx = 0;
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some(spec) => {
                if let Some(value) = args.get(arg_idx) {
                    match spec {
                        's' => out.push_str(&value.to_print_string()),
                        'd' => out.push_str(&value.as_numeric().map(|n| n.to_i64().to_string()).unwrap_or_default()),
                        'f' => out.push_str(&format!("{:.6}", value.as_numeric().map(|n| n.to_f64()).unwrap_or(0.0))),
                        'r' => out.push_str(&value.to_repr_string()),
                        other => {
                            out.push('%');
                            out.push(other);
                        }
                    }
                    arg_idx += 1;
                }
            }
            None => out.push('%'),
        }
    }
    out
}

pub fn apply_binop(left: &Value, op: BinOp, right: &Value) -> Result<Value> {
    match op {
        BinOp::Add => add(left, right),
        BinOp::Sub => numeric_op(left, right, numeric::sub, "-"),
        BinOp::Mult => mul(left, right),
        BinOp::Div => {
            let (a, b) = numeric_pair(left, right, "/")?;
            if b.is_zero() {
                return Err(Error::TypeError("division by zero".to_string()));
            }
            Ok(numeric_to_value(numeric::div(a, b)))
        }
        BinOp::Mod => modulo(left, right),
        BinOp::Pow => numeric_op(left, right, numeric::pow, "**"),
    }
}

fn numeric_pair(left: &Value, right: &Value, op_name: &str) -> Result<(numeric::Numeric, numeric::Numeric)> {
    match (left.as_numeric(), right.as_numeric()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(type_error(op_name, left, right)),
    }
}

fn numeric_op(
    left: &Value,
    right: &Value,
    f: impl Fn(numeric::Numeric, numeric::Numeric) -> numeric::Numeric,
    op_name: &str,
) -> Result<Value> {
    let (a, b) = numeric_pair(left, right, op_name)?;
    Ok(numeric_to_value(f(a, b)))
}

pub fn apply_unary(op: UnaryOp, value: &Value) -> Result<Value> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
        UnaryOp::USub => match value.as_numeric() {
            Some(n) => Ok(numeric_to_value(n.neg())),
            None => Err(Error::TypeError(format!("bad operand type for unary -: '{}'", value.type_name()))),
        },
    }
}

/// `in`/`not in` membership: collections by element, strings by
/// substring, dicts by key.
pub fn contains(item: &Value, container: &Value) -> Result<bool> {
    match container {
        Value::Str(s) | Value::IterableString(s) => match item.as_str() {
            Some(needle) => Ok(s.contains(needle)),
            None => Err(Error::TypeError("'in <string>' requires string as left operand".to_string())),
        },
        Value::List(l) => Ok(l.borrow().iter().any(|v| v.values_equal(item))),
        Value::Tuple(t) => Ok(t.iter().any(|v| v.values_equal(item))),
        Value::Dict(d) => Ok(d.borrow().iter().any(|(k, _)| k.values_equal(item))),
        _ => Err(Error::TypeError(format!("argument of type '{}' is not iterable", container.type_name()))),
    }
}

pub fn apply_cmpop(left: &Value, op: CmpOp, right: &Value) -> Result<Value> {
    let result = match op {
        CmpOp::Is => left.is_identical(right),
        CmpOp::IsNot => !left.is_identical(right),
        CmpOp::Eq => left.values_equal(right),
        CmpOp::NotEq => !left.values_equal(right),
        CmpOp::In => contains(left, right)?,
        CmpOp::NotIn => !contains(left, right)?,
        CmpOp::Lt | CmpOp::LtE | CmpOp::Gt | CmpOp::GtE => {
            let ord = left.partial_compare(right).ok_or_else(|| {
                Error::TypeError(format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    cmp_symbol(op),
                    left.type_name(),
                    right.type_name()
                ))
            })?;
            use std::cmp::Ordering::*;
            match (op, ord) {
                (CmpOp::Lt, Less) => true,
                (CmpOp::LtE, Less | Equal) => true,
                (CmpOp::Gt, Greater) => true,
                (CmpOp::GtE, Greater | Equal) => true,
                _ => false,
            }
        }
    };
    Ok(Value::Bool(result))
}

fn cmp_symbol(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Lt => "<",
        CmpOp::LtE => "<=",
        CmpOp::Gt => ">",
        CmpOp::GtE => ">=",
        _ => "?",
    }
}

fn type_error(op: &str, left: &Value, right: &Value) -> Error {
    Error::TypeError(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op,
        left.type_name(),
        right.type_name()
    ))
}
