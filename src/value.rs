//! The runtime value model: a tagged union over the interpreter's numeric
//! tower, Python-shaped collections, and the handles used to reach into the
//! host and into user-defined classes.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::class::{UserClassRef, UserInstanceRef};
use crate::environment::EnvironmentRef;
use crate::host::{HostArrayHandle, HostClassHandle, HostObjectHandle};
use crate::numeric::Numeric;

/// A runtime value. Cloning a `Value` is cheap: collections are reference
/// counted (`List`/`Dict` additionally share mutable state through
/// `RefCell`, matching Python's reference semantics for those types).
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    Dict(Rc<RefCell<Vec<(Value, Value)>>>),
    Slice(Box<Option<Value>>, Box<Option<Value>>, Box<Option<Value>>),
    Range(i64, i64, i64),
    Enumerate(Box<Value>, i64),
    IterableString(Rc<str>),
    HostClass(HostClassHandle),
    HostObject(HostObjectHandle),
    HostArray(HostArrayHandle),
    UserClass(UserClassRef),
    UserInstance(UserInstanceRef),
    Function(Rc<crate::class::FunctionDef>, EnvironmentRef),
    BoundFunction(Rc<crate::class::FunctionDef>, EnvironmentRef, Box<Value>),
    Lambda(Rc<crate::ast::Lambda>, EnvironmentRef),
    NativeFn(Rc<str>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Value {
        Value::Str(Rc::from(s.into().into_boxed_str()))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(Rc::new(items))
    }

    pub fn dict(pairs: Vec<(Value, Value)>) -> Value {
        Value::Dict(Rc::new(RefCell::new(pairs)))
    }

    /// The name used in `type()`, error messages, and `isinstance`-style
    /// host-class matching.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int32(_) | Value::Int64(_) => "int",
            Value::Float32(_) | Value::Float64(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Slice(..) => "slice",
            Value::Range(..) => "range",
            Value::Enumerate(..) => "enumerate",
            Value::IterableString(_) => "str",
            Value::HostClass(_) => "type",
            Value::HostObject(_) => "object",
            Value::HostArray(_) => "array",
            Value::UserClass(_) => "type",
            Value::UserInstance(_) => "object",
            Value::Function(..) | Value::BoundFunction(..) | Value::Lambda(..) => "function",
            Value::NativeFn(_) => "builtin_function_or_method",
        }
    }

    /// truthiness: `None`/`False`, numeric zero, and anything empty
    /// and lengthable are falsy; `"False"` is falsy per the newer
    /// (adopted) rule for strings; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int32(n) => *n != 0,
            Value::Int64(n) => *n != 0,
            Value::Float32(n) => *n != 0.0,
            Value::Float64(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty() && s.as_ref() != "False",
            Value::IterableString(s) => !s.is_empty() && s.as_ref() != "False",
            Value::List(l) => !l.borrow().is_empty(),
            Value::Tuple(t) => !t.is_empty(),
            Value::Dict(d) => !d.borrow().is_empty(),
            Value::Range(start, stop, step) => range_len(*start, *stop, *step) > 0,
            _ => true,
        }
    }

    pub fn as_numeric(&self) -> Option<Numeric> {
        match self {
            Value::Int32(n) => Some(Numeric::Int32(*n)),
            Value::Int64(n) => Some(Numeric::Int64(*n)),
            Value::Float32(n) => Some(Numeric::Float32(*n)),
            Value::Float64(n) => Some(Numeric::Float64(*n)),
            Value::Bool(b) => Some(Numeric::Int32(*b as i32)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::IterableString(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// Length for `len()`, truthiness, and `in`/slicing bounds. `None` for
    /// values that are not lengthable.
    pub fn length(&self) -> Option<usize> {
        match self {
            Value::Str(s) | Value::IterableString(s) => Some(s.chars().count()),
            Value::List(l) => Some(l.borrow().len()),
            Value::Tuple(t) => Some(t.len()),
            Value::Dict(d) => Some(d.borrow().len()),
            Value::Range(start, stop, step) => Some(range_len(*start, *stop, *step)),
            _ => None,
        }
    }

    /// Python `str()` form: used by `print`, f-strings, and `str(x)`.
    pub fn to_print_string(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            Value::IterableString(s) => s.to_string(),
            _ => self.to_repr_string(),
        }
    }

    /// Python `repr()` form: used inside list/tuple/dict display and for
    /// quoted strings.
    pub fn to_repr_string(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(b) => if *b { "True".to_string() } else { "False".to_string() },
            Value::Int32(n) => n.to_string(),
            Value::Int64(n) => n.to_string(),
            Value::Float32(n) => format_float(*n as f64),
            Value::Float64(n) => format_float(*n),
            Value::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Value::IterableString(s) => format!("'{}'", s),
            Value::List(l) => {
                let items: Vec<String> = l.borrow().iter().map(Value::to_repr_string).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Tuple(t) => {
                let items: Vec<String> = t.iter().map(Value::to_repr_string).collect();
                if items.len() == 1 {
                    format!("({},)", items[0])
                } else {
                    format!("({})", items.join(", "))
                }
            }
            Value::Dict(d) => {
                let items: Vec<String> = d
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.to_repr_string(), v.to_repr_string()))
                    .collect();
                format!("{{{}}}", items.join(", "))
            }
            Value::Range(start, stop, step) => format!("range({}, {}, {})", start, stop, step),
            Value::UserInstance(inst) => inst.borrow().repr(),
            Value::UserClass(class) => format!("<class '{}'>", class.borrow().name),
            Value::HostClass(h) => format!("<class '{}'>", h.name),
            Value::HostObject(h) => format!("<{} object>", h.class_name),
            Value::HostArray(h) => format!("<{} array>", h.element_class_name),
            Value::Function(def, _) => format!("<function {}>", def.name),
            Value::BoundFunction(def, _, _) => format!("<bound method {}>", def.name),
            Value::Lambda(..) => "<lambda>".to_string(),
            Value::NativeFn(name) => format!("<built-in function {}>", name),
            Value::Slice(lower, upper, step) => format!(
                "slice({}, {}, {})",
                opt_repr(lower),
                opt_repr(upper),
                opt_repr(step)
            ),
            Value::Enumerate(..) => "<enumerate object>".to_string(),
        }
    }

    /// Is this value allowed as a `Dict` key?
    pub fn is_hashable(&self) -> bool {
        !matches!(self, Value::List(_) | Value::Dict(_))
    }

    /// equality. Numbers compare across the tower by mathematical
    /// value; everything else is structural except user instances, which
    /// fall back to reference identity unless frozen with a generated hash.
    pub fn values_equal(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.as_numeric(), other.as_numeric()) {
            return a.eq_value(&b);
        }
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::None, _) | (_, Value::None) => false,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Str(a), Value::IterableString(b)) | (Value::IterableString(a), Value::Str(b)) => a == b,
            (Value::IterableString(a), Value::IterableString(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                let a = a.borrow();
                let b = b.borrow();
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.values_equal(y))
            }
            (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.values_equal(y))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                let a = a.borrow();
                let b = b.borrow();
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.iter().any(|(k2, v2)| k.values_equal(k2) && v.values_equal(v2))
                    })
            }
            (Value::UserInstance(a), Value::UserInstance(b)) => {
                let ab = a.borrow();
                let bb = b.borrow();
                if ab.class.borrow().frozen && bb.class.borrow().frozen
                    && Rc::ptr_eq(&ab.class, &bb.class)
                {
                    ab.dataclass_field_tuple().values_equal(&bb.dataclass_field_tuple())
                } else {
                    Rc::ptr_eq(a, b)
                }
            }
            (Value::Range(s1, e1, st1), Value::Range(s2, e2, st2)) => s1 == s2 && e1 == e2 && st1 == st2,
            (Value::UserClass(a), Value::UserClass(b)) => Rc::ptr_eq(a, b),
            (Value::HostClass(a), Value::HostClass(b)) => a.name == b.name,
            _ => self.is_identical(other),
        }
    }

    /// `is`/`is not`: reference identity for heap values, value identity
    /// for scalars.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::UserInstance(a), Value::UserInstance(b)) => Rc::ptr_eq(a, b),
            (Value::UserClass(a), Value::UserClass(b)) => Rc::ptr_eq(a, b),
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }

    /// Natural ordering used by `<`/`<=`/`>`/`>=`. `None` if the pair
    /// cannot be ordered.
    pub fn partial_compare(&self, other: &Value) -> Option<std::cmp::Ordering> {
        if let (Some(a), Some(b)) = (self.as_numeric(), other.as_numeric()) {
            return a.partial_cmp_value(&b);
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::IterableString(b)) | (Value::IterableString(a), Value::Str(b)) => {
                Some(a.as_ref().cmp(b.as_ref()))
            }
            (Value::IterableString(a), Value::IterableString(b)) => Some(a.cmp(b)),
            (Value::Tuple(a), Value::Tuple(b)) => a.iter().zip(b.iter())
                .find_map(|(x, y)| {
                    let ord = x.partial_compare(y)?;
                    (ord != std::cmp::Ordering::Equal).then_some(ord)
                })
                .or_else(|| Some(a.len().cmp(&b.len()))),
            (Value::List(a), Value::List(b)) => {
                let a = a.borrow();
                let b = b.borrow();
                a.iter()
                    .zip(b.iter())
                    .find_map(|(x, y)| {
                        let ord = x.partial_compare(y)?;
                        (ord != std::cmp::Ordering::Equal).then_some(ord)
                    })
                    .or_else(|| Some(a.len().cmp(&b.len())))
            }
            _ => None,
        }
    }
}

fn opt_repr(v: &Option<Value>) -> String {
    v.as_ref().map(Value::to_repr_string).unwrap_or_else(|| "None".to_string())
}

fn range_len(start: i64, stop: i64, step: i64) -> usize {
    if step > 0 {
        if stop > start { ((stop - start - 1) / step + 1) as usize } else { 0 }
    } else if step < 0 {
        if stop < start { ((start - stop - 1) / (-step) + 1) as usize } else { 0 }
    } else {
        0
    }
}

/// Python-style float formatting: integral floats print with a trailing
/// `.0`, everything else uses the shortest round-tripping representation.
pub fn format_float(n: f64) -> String {
    if n.is_nan() {
        "nan".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else if n == n.trunc() && n.abs() < 1e16 {
        format!("{:.1}", n)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_print_string())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_repr_string())
    }
}
