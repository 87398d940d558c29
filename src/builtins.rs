//! Built-in names pre-bound into globals.

use std::f64::consts;

use crate::environment::EnvironmentRef;
use crate::error::{Error, Result};
use crate::numeric::{narrow_float, narrow_int};
use crate::value::Value;

/// Materialize any iterable value into a `Vec<Value>` the way `for`,
/// `list()`, `tuple()`, `sum()`, `min()`/`max()`, and comprehensions all
/// need to.
pub fn to_iterable_items(value: &Value, env: &EnvironmentRef) -> Result<Vec<Value>> {
    match value {
        Value::Str(s) | Value::IterableString(s) => Ok(s.chars().map(|c| Value::str(c.to_string())).collect()),
        Value::List(l) => Ok(l.borrow().clone()),
        Value::Tuple(t) => Ok(t.as_ref().clone()),
        Value::Dict(d) => Ok(d.borrow().iter().map(|(k, _)| k.clone()).collect()),
        Value::Range(start, stop, step) => {
            let mut out = Vec::new();
            let mut i = *start;
            if *step > 0 {
                while i < *stop {
                    out.push(narrowed_int(i));
                    i += step;
                }
            } else if *step < 0 {
                while i > *stop {
                    out.push(narrowed_int(i));
                    i += step;
                }
            }
            Ok(out)
        }
        Value::Enumerate(inner, start) => {
            let items = to_iterable_items(inner, env)?;
            Ok(items
                .into_iter()
                .enumerate()
                .map(|(i, v)| Value::tuple(vec![narrowed_int(*start + i as i64), v]))
                .collect())
        }
        other => env.borrow().host().iterate(other).map_err(|_| {
            Error::TypeError(format!("'{}' object is not iterable", other.type_name()))
        }),
    }
}

fn narrowed_int(n: i64) -> Value {
    crate::numeric::numeric_to_value(narrow_int(n))
}

/// Dispatches a call to one of this module's recognized built-in names;
/// `None` means `name` isn't a built-in (the caller then checks
/// user-defined globals).
pub fn call_builtin(name: &str, args: &[Value], env: &EnvironmentRef) -> Option<Result<Value>> {
    Some(match name {
        "int" => builtin_int(args),
        "float" => builtin_float(args),
        "str" => Ok(Value::str(args.first().map(Value::to_print_string).unwrap_or_default())),
        "bool" => Ok(Value::Bool(args.first().map(Value::is_truthy).unwrap_or(false))),
        "len" => builtin_len(args, env),
        "list" => builtin_list(args, env),
        "tuple" => builtin_tuple(args, env),
        "range" => builtin_range(args),
        "enumerate" => builtin_enumerate(args),
        "abs" => builtin_abs(args),
        "round" => builtin_round(args),
        "min" => builtin_minmax(args, env, true),
        "max" => builtin_minmax(args, env, false),
        "sum" => builtin_sum(args, env),
        "ord" => builtin_ord(args),
        "chr" => builtin_chr(args),
        "print" => builtin_print(args, env),
        "type" => builtin_type(args, env),
        "hash" => builtin_hash(args),
        "math.sqrt" => builtin_math_sqrt(args),
        "math.sin" => numeric_unary(args, f64::sin),
        "math.cos" => numeric_unary(args, f64::cos),
        "math.floor" => numeric_unary(args, f64::floor).and_then(|v| to_int_value(&v)),
        "math.ceil" => numeric_unary(args, f64::ceil).and_then(|v| to_int_value(&v)),
        "math.log" => numeric_unary(args, f64::ln),
        _ => return None,
    })
}

fn arity(args: &[Value], n: usize, name: &str) -> Result<()> {
    if args.len() != n {
        return Err(Error::ArityError(format!("{name}() takes {n} argument(s) but {} were given", args.len())));
    }
    Ok(())
}

fn builtin_int(args: &[Value]) -> Result<Value> {
    match args.first() {
        None => Ok(Value::Int32(0)),
        Some(Value::Str(s)) | Some(Value::IterableString(s)) => s
            .trim()
            .parse::<i64>()
            .map(|n| crate::numeric::numeric_to_value(narrow_int(n)))
            .map_err(|_| Error::TypeError(format!("invalid literal for int(): '{s}'"))),
        Some(v) => match v.as_numeric() {
            Some(n) => Ok(crate::numeric::numeric_to_value(narrow_int(n.to_i64()))),
            None => Err(Error::TypeError(format!("int() argument must be a string or a number, not '{}'", v.type_name()))),
        },
    }
}

fn builtin_float(args: &[Value]) -> Result<Value> {
    match args.first() {
        None => Ok(Value::Float32(0.0)),
        Some(Value::Str(s)) | Some(Value::IterableString(s)) => s
            .trim()
            .parse::<f64>()
            .map(|n| crate::numeric::numeric_to_value(narrow_float(n)))
            .map_err(|_| Error::TypeError(format!("could not convert string to float: '{s}'"))),
        Some(v) => match v.as_numeric() {
            Some(n) => Ok(crate::numeric::numeric_to_value(narrow_float(n.to_f64()))),
            None => Err(Error::TypeError(format!("float() argument must be a string or a number, not '{}'", v.type_name()))),
        },
    }
}

fn builtin_len(args: &[Value], env: &EnvironmentRef) -> Result<Value> {
    arity(args, 1, "len")?;
    match args[0].length() {
        Some(n) => Ok(crate::numeric::numeric_to_value(narrow_int(n as i64))),
        None => match &args[0] {
            Value::HostArray(_) | Value::HostObject(_) => env.borrow().host().get_field(&args[0], "length"),
            other => Err(Error::TypeError(format!("object of type '{}' has no len()", other.type_name()))),
        },
    }
}

fn builtin_list(args: &[Value], env: &EnvironmentRef) -> Result<Value> {
    match args.first() {
        None => Ok(Value::list(Vec::new())),
        Some(v) => Ok(Value::list(to_iterable_items(v, env)?)),
    }
}

fn builtin_tuple(args: &[Value], env: &EnvironmentRef) -> Result<Value> {
    match args.first() {
        None => Ok(Value::tuple(Vec::new())),
        Some(v) => Ok(Value::tuple(to_iterable_items(v, env)?)),
    }
}

fn builtin_range(args: &[Value]) -> Result<Value> {
    let ints: Result<Vec<i64>> = args
        .iter()
        .map(|v| v.as_numeric().map(|n| n.to_i64()).ok_or_else(|| Error::TypeError("range() arguments must be integers".to_string())))
        .collect();
    let ints = ints?;
    match ints.as_slice() {
        [stop] => Ok(Value::Range(0, *stop, 1)),
        [start, stop] => Ok(Value::Range(*start, *stop, 1)),
        [start, stop, step] => {
            if *step == 0 {
                return Err(Error::TypeError("range() arg 3 must not be zero".to_string()));
            }
            Ok(Value::Range(*start, *stop, *step))
        }
        _ => Err(Error::ArityError("range() takes 1 to 3 arguments".to_string())),
    }
}

fn builtin_enumerate(args: &[Value]) -> Result<Value> {
    if args.is_empty() || args.len() > 2 {
        return Err(Error::ArityError("enumerate() takes 1 or 2 arguments".to_string()));
    }
    let start = match args.get(1) {
        Some(v) => v.as_numeric().map(|n| n.to_i64()).ok_or_else(|| Error::TypeError("enumerate() start must be an int".to_string()))?,
        None => 0,
    };
    Ok(Value::Enumerate(Box::new(args[0].clone()), start))
}

fn builtin_abs(args: &[Value]) -> Result<Value> {
    arity(args, 1, "abs")?;
    match args[0].as_numeric() {
        Some(n) if n.to_f64() < 0.0 => Ok(crate::numeric::numeric_to_value(n.neg())),
        Some(_) => Ok(args[0].clone()),
        None => Err(Error::TypeError(format!("bad operand type for abs(): '{}'", args[0].type_name()))),
    }
}

fn builtin_round(args: &[Value]) -> Result<Value> {
    if args.is_empty() || args.len() > 2 {
        return Err(Error::ArityError("round() takes 1 or 2 arguments".to_string()));
    }
    let n = args[0].as_numeric().ok_or_else(|| Error::TypeError("round() requires a number".to_string()))?;
    match args.get(1) {
        None => Ok(crate::numeric::numeric_to_value(narrow_int(n.to_f64().round() as i64))),
        Some(ndigits) => {
            let ndigits = ndigits.as_numeric().map(|n| n.to_i64()).unwrap_or(0);
            let factor = 10f64.powi(ndigits as i32);
            Ok(crate::numeric::numeric_to_value(narrow_float((n.to_f64() * factor).round() / factor)))
        }
    }
}

fn builtin_minmax(args: &[Value], env: &EnvironmentRef, want_min: bool) -> Result<Value> {
    let items: Vec<Value> = if args.len() == 1 {
        to_iterable_items(&args[0], env)?
    } else {
        args.to_vec()
    };
    items
        .into_iter()
        .try_fold(None::<Value>, |acc, v| -> Result<Option<Value>> {
            match acc {
                None => Ok(Some(v)),
                Some(best) => {
                    let ord = best.partial_compare(&v).ok_or_else(|| {
                        Error::TypeError("comparison not supported between these types".to_string())
                    })?;
                    let replace = if want_min { ord == std::cmp::Ordering::Greater } else { ord == std::cmp::Ordering::Less };
                    Ok(Some(if replace { v } else { best }))
                }
            }
        })?
        .ok_or_else(|| Error::ArityError(format!("{}() arg is an empty sequence", if want_min { "min" } else { "max" })))
}

fn builtin_sum(args: &[Value], env: &EnvironmentRef) -> Result<Value> {
    if args.is_empty() || args.len() > 2 {
        return Err(Error::ArityError("sum() takes 1 or 2 arguments".to_string()));
    }
    let items = to_iterable_items(&args[0], env)?;
    let mut acc = args.get(1).cloned().unwrap_or(Value::Int32(0));
    for item in items {
        acc = crate::operators::apply_binop(&acc, crate::ast::BinOp::Add, &item)?;
    }
    Ok(acc)
}

fn builtin_ord(args: &[Value]) -> Result<Value> {
    arity(args, 1, "ord")?;
    let s = args[0].as_str().ok_or_else(|| Error::TypeError("ord() expected string".to_string()))?;
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(crate::numeric::numeric_to_value(narrow_int(c as i64))),
        _ => Err(Error::TypeError("ord() expected a character, but string of length != 1 found".to_string())),
    }
}

fn builtin_chr(args: &[Value]) -> Result<Value> {
    arity(args, 1, "chr")?;
    let n = args[0].as_numeric().map(|n| n.to_i64()).ok_or_else(|| Error::TypeError("chr() expected an int".to_string()))?;
    char::from_u32(n as u32)
        .map(|c| Value::str(c.to_string()))
        .ok_or_else(|| Error::TypeError(format!("chr() arg not in range: {n}")))
}

fn builtin_print(args: &[Value], env: &EnvironmentRef) -> Result<Value> {
    let line = args.iter().map(Value::to_print_string).collect::<Vec<_>>().join(" ");
    env.borrow().print(&line);
    Ok(Value::None)
}

fn builtin_type(args: &[Value], env: &EnvironmentRef) -> Result<Value> {
    arity(args, 1, "type")?;
    match &args[0] {
        Value::UserInstance(inst) => Ok(Value::UserClass(inst.borrow().class.clone())),
        Value::HostObject(h) => env.borrow().host().resolve_class(&h.class_name).map(Value::HostClass),
        other => Ok(Value::str(other.type_name())),
    }
}

/// `hash(x)`: generated for frozen dataclasses from their
/// field tuple; falls back to the same structural hash for numbers,
/// strings, `None`/`bool`, and tuples, consistent with `values_equal`.
fn builtin_hash(args: &[Value]) -> Result<Value> {
    arity(args, 1, "hash")?;
    match &args[0] {
        Value::UserInstance(inst) => inst
            .borrow()
            .dataclass_hash()
            .map(|h| crate::numeric::numeric_to_value(narrow_int(h as i64)))
            .ok_or_else(|| Error::TypeError("unhashable type: not a frozen dataclass instance".to_string())),
        other if other.is_hashable() => {
            Ok(crate::numeric::numeric_to_value(narrow_int(crate::class::hash_value(other) as i64)))
        }
        other => Err(Error::TypeError(format!("unhashable type: '{}'", other.type_name()))),
    }
}

fn numeric_unary(args: &[Value], f: impl Fn(f64) -> f64) -> Result<Value> {
    arity(args, 1, "math function")?;
    let n = args[0].as_numeric().ok_or_else(|| Error::TypeError("expected a number".to_string()))?;
    Ok(crate::numeric::numeric_to_value(narrow_float(f(n.to_f64()))))
}

fn to_int_value(v: &Value) -> Result<Value> {
    let n = v.as_numeric().expect("numeric_unary always produces a numeric value");
    Ok(crate::numeric::numeric_to_value(narrow_int(n.to_f64() as i64)))
}

fn builtin_math_sqrt(args: &[Value]) -> Result<Value> {
    arity(args, 1, "sqrt")?;
    let n = args[0].as_numeric().ok_or_else(|| Error::TypeError("sqrt() requires a number".to_string()))?;
    if n.to_f64() < 0.0 {
        return Err(Error::TypeError("math domain error".to_string()));
    }
    Ok(crate::numeric::numeric_to_value(narrow_float(n.to_f64().sqrt())))
}

/// Builds the `math` module value: a dict of constants plus native
/// function references, looked up by `Attribute` evaluation the same way
/// a host object's fields are.
pub fn math_module() -> Value {
    Value::dict(vec![
        (Value::str("pi"), crate::numeric::numeric_to_value(narrow_float(consts::PI))),
        (Value::str("e"), crate::numeric::numeric_to_value(narrow_float(consts::E))),
        (Value::str("tau"), crate::numeric::numeric_to_value(narrow_float(consts::TAU))),
        (Value::str("sqrt"), Value::NativeFn("math.sqrt".into())),
        (Value::str("sin"), Value::NativeFn("math.sin".into())),
        (Value::str("cos"), Value::NativeFn("math.cos".into())),
        (Value::str("floor"), Value::NativeFn("math.floor".into())),
        (Value::str("ceil"), Value::NativeFn("math.ceil".into())),
        (Value::str("log"), Value::NativeFn("math.log".into())),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    struct NullHost;
    impl crate::host::HostRegistry for NullHost {
        fn resolve_class(&self, name: &str) -> Result<crate::host::HostClassHandle> {
            Err(Error::ParseError(format!("no such host class {name}")))
        }
        fn get_field(&self, _owner: &Value, name: &str) -> Result<Value> {
            Err(Error::TypeError(format!("no such field {name}")))
        }
        fn set_field(&self, _owner: &Value, _name: &str, _value: Value) -> Result<()> {
            Ok(())
        }
        fn candidates(&self, _owner_class: &str, _method_name: Option<&str>, _is_static: bool) -> Vec<crate::host::Candidate> {
            Vec::new()
        }
        fn iterate(&self, _value: &Value) -> Result<Vec<Value>> {
            Err(Error::TypeError("not iterable".to_string()))
        }
        fn runtime_class_name(&self, _value: &Value) -> Option<Rc<str>> {
            None
        }
        fn is_assignable(&self, _value_class: &str, _host_class_name: &str) -> bool {
            false
        }
    }

    fn test_env() -> EnvironmentRef {
        crate::environment::Environment::create_globals(Rc::new(NullHost), Box::new(|_| {}))
    }

    #[test]
    fn abs_negates_negative_numbers() {
        let result = builtin_abs(&[Value::Int32(-5)]).unwrap();
        assert!(result.values_equal(&Value::Int32(5)));
    }

    #[test]
    fn range_materializes_half_open_sequence() {
        let env = test_env();
        let r = builtin_range(&[Value::Int32(1), Value::Int32(4)]).unwrap();
        let items = to_iterable_items(&r, &env).unwrap();
        assert_eq!(items.len(), 3);
        assert!(items[0].values_equal(&Value::Int32(1)));
    }

    #[test]
    fn sum_over_list() {
        let env = test_env();
        let list = Value::list(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)]);
        let result = builtin_sum(&[list], &env).unwrap();
        assert!(result.values_equal(&Value::Int32(6)));
    }
}
