//! Method calls on built-in value kinds (`"x".upper()`, `l.append(v)`,
//! `d.get(k)`, …). Not a named component in its own right — this is the
//! evaluator's `Call` dispatch falling through to per-kind method tables,
//! the same shape a tree-walking interpreter uses for its own str/list/dict
//! methods.

use crate::error::{Error, Result};
use crate::value::Value;

pub fn call_method(receiver: &Value, name: &str, args: &[Value]) -> Option<Result<Value>> {
    match receiver {
        Value::Str(_) | Value::IterableString(_) => call_str_method(receiver, name, args),
        Value::List(l) => call_list_method(l, name, args),
        Value::Dict(d) => call_dict_method(d, name, args),
        Value::Tuple(t) => call_tuple_method(t, name, args),
        _ => None,
    }
}

fn call_str_method(receiver: &Value, name: &str, args: &[Value]) -> Option<Result<Value>> {
    let s = receiver.as_str().expect("call_str_method only called on Str/IterableString");
    Some(match name {
        "upper" => Ok(Value::str(s.to_uppercase())),
        "lower" => Ok(Value::str(s.to_lowercase())),
        "strip" => Ok(Value::str(s.trim().to_string())),
        "lstrip" => Ok(Value::str(s.trim_start().to_string())),
        "rstrip" => Ok(Value::str(s.trim_end().to_string())),
        "title" => Ok(Value::str(title_case(s))),
        "capitalize" => Ok(Value::str(capitalize(s))),
        "split" => {
            let sep = args.first().and_then(Value::as_str);
            let parts: Vec<Value> = match sep {
                Some(sep) if !sep.is_empty() => s.split(sep).map(Value::str).collect(),
                _ => s.split_whitespace().map(Value::str).collect(),
            };
            Ok(Value::list(parts))
        }
        "join" => {
            let Some(items) = args.first() else {
                return Some(Err(Error::ArityError("join() takes 1 argument".to_string())));
            };
            match items {
                Value::List(l) => Ok(Value::str(
                    l.borrow().iter().map(Value::to_print_string).collect::<Vec<_>>().join(s),
                )),
                Value::Tuple(t) => Ok(Value::str(t.iter().map(Value::to_print_string).collect::<Vec<_>>().join(s))),
                _ => Err(Error::TypeError("join() argument must be an iterable".to_string())),
            }
        }
        "replace" => {
            let (Some(old), Some(new)) = (args.first().and_then(Value::as_str), args.get(1).and_then(Value::as_str)) else {
                return Some(Err(Error::ArityError("replace() takes 2 arguments".to_string())));
            };
            Ok(Value::str(s.replace(old, new)))
        }
        "startswith" => args.first().and_then(Value::as_str).map(|p| Ok(Value::Bool(s.starts_with(p))))
            .unwrap_or_else(|| Err(Error::ArityError("startswith() takes 1 argument".to_string()))),
        "endswith" => args.first().and_then(Value::as_str).map(|p| Ok(Value::Bool(s.ends_with(p))))
            .unwrap_or_else(|| Err(Error::ArityError("endswith() takes 1 argument".to_string()))),
        "find" => args.first().and_then(Value::as_str).map(|p| {
            Ok(match s.find(p) {
                Some(byte_idx) => crate::numeric::numeric_to_value(crate::numeric::narrow_int(s[..byte_idx].chars().count() as i64)),
                None => Value::Int32(-1),
            })
        }).unwrap_or_else(|| Err(Error::ArityError("find() takes 1 argument".to_string()))),
        "format" => Ok(Value::str(str_format(s, args))),
        "isdigit" => Ok(Value::Bool(!s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))),
        "isalpha" => Ok(Value::Bool(!s.is_empty() && s.chars().all(|c| c.is_alphabetic()))),
        _ => return None,
    })
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// A minimal `str.format()`: positional `{}`/`{0}` placeholders only (no
/// field-name or format-spec mini-language), matching the f-string
/// evaluator's own simplicity.
fn str_format(template: &str, args: &[Value]) -> String {
    let mut out = String::new();
    let mut auto_index = 0;
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' {
            let mut field = String::new();
            for c2 in chars.by_ref() {
                if c2 == '}' {
                    break;
                }
                field.push(c2);
            }
            let index = if field.is_empty() {
                let i = auto_index;
                auto_index += 1;
                i
            } else {
                field.parse().unwrap_or(0)
            };
            if let Some(value) = args.get(index) {
                out.push_str(&value.to_print_string());
            }
        } else {
            out.push(c);
        }
    }
    out
}

use std::cell::RefCell;
use std::rc::Rc;

fn call_list_method(list: &Rc<RefCell<Vec<Value>>>, name: &str, args: &[Value]) -> Option<Result<Value>> {
    Some(match name {
        "append" => {
            list.borrow_mut().push(args.first().cloned().unwrap_or(Value::None));
            Ok(Value::None)
        }
        "extend" => {
            let Some(Value::List(other)) = args.first() else {
                return Some(Err(Error::TypeError("extend() argument must be a list".to_string())));
            };
            list.borrow_mut().extend(other.borrow().iter().cloned());
            Ok(Value::None)
        }
        "insert" => {
            let (Some(idx), Some(value)) = (args.first().and_then(Value::as_numeric), args.get(1).cloned()) else {
                return Some(Err(Error::ArityError("insert() takes 2 arguments".to_string())));
            };
            let mut items = list.borrow_mut();
            let idx = (idx.to_i64().max(0) as usize).min(items.len());
            items.insert(idx, value);
            Ok(Value::None)
        }
        "pop" => {
            let mut items = list.borrow_mut();
            if items.is_empty() {
                return Some(Err(Error::IndexError("pop from empty list".to_string())));
            }
            let idx = match args.first().and_then(Value::as_numeric) {
                Some(n) => match crate::slice::normalize_index(n.to_i64(), items.len(), "list") {
                    Ok(i) => i,
                    Err(e) => return Some(Err(e)),
                },
                None => items.len() - 1,
            };
            Ok(items.remove(idx))
        }
        "remove" => {
            let Some(target) = args.first() else {
                return Some(Err(Error::ArityError("remove() takes 1 argument".to_string())));
            };
            let mut items = list.borrow_mut();
            match items.iter().position(|v| v.values_equal(target)) {
                Some(idx) => {
                    items.remove(idx);
                    Ok(Value::None)
                }
                None => Err(Error::IndexError(format!("{} is not in list", target.to_repr_string()))),
            }
        }
        "clear" => {
            list.borrow_mut().clear();
            Ok(Value::None)
        }
        "reverse" => {
            list.borrow_mut().reverse();
            Ok(Value::None)
        }
        "sort" => {
            let mut items = list.borrow_mut();
            items.sort_by(|a, b| a.partial_compare(b).unwrap_or(std::cmp::Ordering::Equal));
            if let Some(Value::Bool(true)) = args.first() {
                items.reverse();
            }
            Ok(Value::None)
        }
        "index" => {
            let Some(target) = args.first() else {
                return Some(Err(Error::ArityError("index() takes 1 argument".to_string())));
            };
            let items = list.borrow();
            match items.iter().position(|v| v.values_equal(target)) {
                Some(idx) => Ok(crate::numeric::numeric_to_value(crate::numeric::narrow_int(idx as i64))),
                None => Err(Error::IndexError(format!("{} is not in list", target.to_repr_string()))),
            }
        }
        "count" => {
            let Some(target) = args.first() else {
                return Some(Err(Error::ArityError("count() takes 1 argument".to_string())));
            };
            let n = list.borrow().iter().filter(|v| v.values_equal(target)).count();
            Ok(crate::numeric::numeric_to_value(crate::numeric::narrow_int(n as i64)))
        }
        "copy" => Ok(Value::list(list.borrow().clone())),
        _ => return None,
    })
}

fn call_tuple_method(tuple: &Rc<Vec<Value>>, name: &str, args: &[Value]) -> Option<Result<Value>> {
    Some(match name {
        "index" => {
            let Some(target) = args.first() else {
                return Some(Err(Error::ArityError("index() takes 1 argument".to_string())));
            };
            match tuple.iter().position(|v| v.values_equal(target)) {
                Some(idx) => Ok(crate::numeric::numeric_to_value(crate::numeric::narrow_int(idx as i64))),
                None => Err(Error::IndexError(format!("{} is not in list", target.to_repr_string()))),
            }
        }
        "count" => {
            let Some(target) = args.first() else {
                return Some(Err(Error::ArityError("count() takes 1 argument".to_string())));
            };
            let n = tuple.iter().filter(|v| v.values_equal(target)).count();
            Ok(crate::numeric::numeric_to_value(crate::numeric::narrow_int(n as i64)))
        }
        _ => return None,
    })
}

fn call_dict_method(dict: &Rc<RefCell<Vec<(Value, Value)>>>, name: &str, args: &[Value]) -> Option<Result<Value>> {
    Some(match name {
        "keys" => Ok(Value::list(dict.borrow().iter().map(|(k, _)| k.clone()).collect())),
        "values" => Ok(Value::list(dict.borrow().iter().map(|(_, v)| v.clone()).collect())),
        "items" => Ok(Value::list(
            dict.borrow().iter().map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()])).collect(),
        )),
        "get" => {
            let Some(key) = args.first() else {
                return Some(Err(Error::ArityError("get() takes at least 1 argument".to_string())));
            };
            let found = dict.borrow().iter().find(|(k, _)| k.values_equal(key)).map(|(_, v)| v.clone());
            Ok(found.or_else(|| args.get(1).cloned()).unwrap_or(Value::None))
        }
        "pop" => {
            let Some(key) = args.first() else {
                return Some(Err(Error::ArityError("pop() takes at least 1 argument".to_string())));
            };
            let mut items = dict.borrow_mut();
            match items.iter().position(|(k, _)| k.values_equal(key)) {
                Some(idx) => Ok(items.remove(idx).1),
                None => match args.get(1) {
                    Some(default) => Ok(default.clone()),
                    None => Err(Error::KeyError(key.to_repr_string())),
                },
            }
        }
        "update" => {
            let Some(Value::Dict(other)) = args.first() else {
                return Some(Err(Error::TypeError("update() argument must be a dict".to_string())));
            };
            let additions = other.borrow().clone();
            let mut items = dict.borrow_mut();
            for (k, v) in additions {
                match items.iter_mut().find(|(existing, _)| existing.values_equal(&k)) {
                    Some(entry) => entry.1 = v,
                    None => items.push((k, v)),
                }
            }
            Ok(Value::None)
        }
        "clear" => {
            dict.borrow_mut().clear();
            Ok(Value::None)
        }
        _ => return None,
    })
}
