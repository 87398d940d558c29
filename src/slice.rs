//! Python-style slicing for strings, lists, tuples, and host
//! arrays. Negative indices normalize by adding the length; missing
//! bounds default to `0`/`len`/`1`. Arbitrary step values are supported,
//! a strict superset of the `step == 1` compatibility floor.

use crate::error::{Error, Result};
use crate::value::Value;

/// A resolved `(start, stop, step)` triple, already normalized for the
/// sequence length `len`.
pub fn resolve_slice(
    lower: Option<i64>,
    upper: Option<i64>,
    step: Option<i64>,
    len: usize,
) -> Result<(i64, i64, i64)> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(Error::UnsupportedOperation("slice step cannot be zero".to_string()));
    }
    let len = len as i64;
    let normalize = |i: i64| -> i64 {
        if i < 0 { (i + len).max(if step > 0 { 0 } else { -1 }) } else { i.min(len) }
    };
    let (default_start, default_stop) = if step > 0 { (0, len) } else { (len - 1, -1) };
    let start = lower.map(normalize).unwrap_or(default_start);
    let stop = upper.map(normalize).unwrap_or(default_stop);
    Ok((start, stop, step))
}

fn indices(start: i64, stop: i64, step: i64) -> Vec<usize> {
    let mut out = Vec::new();
    let mut i = start;
    if step > 0 {
        while i < stop {
            if i >= 0 {
                out.push(i as usize);
            }
            i += step;
        }
    } else {
        while i > stop {
            if i >= 0 {
                out.push(i as usize);
            }
            i += step;
        }
    }
    out
}

pub fn slice_list(items: &[Value], lower: Option<i64>, upper: Option<i64>, step: Option<i64>) -> Result<Vec<Value>> {
    let (start, stop, step) = resolve_slice(lower, upper, step, items.len())?;
    Ok(indices(start, stop, step).into_iter().filter_map(|i| items.get(i).cloned()).collect())
}

pub fn slice_string(s: &str, lower: Option<i64>, upper: Option<i64>, step: Option<i64>) -> Result<String> {
    let chars: Vec<char> = s.chars().collect();
    let (start, stop, step) = resolve_slice(lower, upper, step, chars.len())?;
    Ok(indices(start, stop, step).into_iter().filter_map(|i| chars.get(i).copied()).collect())
}

/// Normalize a single (non-slice) index against `len`, erroring if it
/// falls outside bounds after negative-index adjustment.
pub fn normalize_index(index: i64, len: usize, what: &str) -> Result<usize> {
    let len_i = len as i64;
    let adjusted = if index < 0 { index + len_i } else { index };
    if adjusted < 0 || adjusted >= len_i {
        return Err(Error::IndexError(format!("{what} index out of range")));
    }
    Ok(adjusted as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_tail_slice() {
        assert_eq!(slice_string("abcdef", Some(-2), None, None).unwrap(), "ef");
    }

    #[test]
    fn list_middle_slice() {
        let items: Vec<Value> = (1..=4).map(Value::Int32).collect();
        let sliced = slice_list(&items, Some(1), Some(3), None).unwrap();
        assert_eq!(sliced.len(), 2);
        assert!(sliced[0].values_equal(&Value::Int32(2)));
        assert!(sliced[1].values_equal(&Value::Int32(3)));
    }

    #[test]
    fn out_of_range_index_errors() {
        assert!(normalize_index(10, 4, "list").is_err());
    }
}
