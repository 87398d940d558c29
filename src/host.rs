//! Host interop: the capability the embedder injects so scripts can
//! reach classes, objects, and arrays from the managed runtime the
//! interpreter is hosted in. The core never interprets what a host handle
//! points at — it only resolves names, scores overloads, and forwards
//! calls.

use std::fmt;
use std::rc::Rc;

use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::value::Value;

/// An opaque reference to a host class, resolved once by name at decode
/// time.
#[derive(Clone)]
pub struct HostClassHandle {
    pub name: Rc<str>,
    pub handle: Rc<dyn std::any::Any>,
}

impl fmt::Debug for HostClassHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostClassHandle({})", self.name)
    }
}

/// An opaque reference to a live host object instance.
#[derive(Clone)]
pub struct HostObjectHandle {
    pub class_name: Rc<str>,
    pub handle: Rc<dyn std::any::Any>,
}

impl fmt::Debug for HostObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostObjectHandle({})", self.class_name)
    }
}

/// An opaque reference to a host array, indexable and sliceable like a
/// list but backed by host storage.
#[derive(Clone)]
pub struct HostArrayHandle {
    pub element_class_name: Rc<str>,
    pub handle: Rc<dyn std::any::Any>,
}

impl fmt::Debug for HostArrayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostArrayHandle({})", self.element_class_name)
    }
}

/// Whether a signature key names a constructor or a named method, and
/// whether that method is static (no implicit receiver).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallKind {
    Constructor,
    Method { name: Rc<str>, is_static: bool },
}

/// The structural, value-free cache key: kind + owner class +
/// method name + the runtime class of each argument. Two calls with the
/// same shape share one resolved executable regardless of the actual
/// argument values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureKey {
    pub kind: CallKind,
    pub owner_class: Rc<str>,
    pub arg_types: Vec<Rc<str>>,
}

/// A resolved, directly invocable constructor or method. Returned by
/// [`HostRegistry::resolve_call`] and cached by [`OverloadCache`].
pub trait Executable {
    fn invoke(&self, host: &dyn HostRegistry, receiver: Option<&Value>, args: &[Value]) -> Result<Value>;
}

/// One scored candidate considered during overload resolution; the
/// registry builds these, the generic scorer in this module picks the
/// winner so every embedder gets identical resolution semantics.
pub struct Candidate {
    pub param_types: Vec<Rc<str>>,
    pub executable: Rc<dyn Executable>,
}

/// The capability an embedder implements to expose host classes/objects
/// to scripts. The interpreter core speaks to the host only through this
/// trait.
pub trait HostRegistry {
    /// Resolve a fully-qualified host class name. Called once per
    /// `JavaClass("...")` marker at decode time.
    fn resolve_class(&self, name: &str) -> Result<HostClassHandle>;

    /// Read a field: `class` is `Some` for a static field read on a host
    /// class, `None`-receiver reads are routed through `object` instead.
    fn get_field(&self, owner: &Value, name: &str) -> Result<Value>;

    /// Write a field on a host object or class.
    fn set_field(&self, owner: &Value, name: &str, value: Value) -> Result<()>;

    /// Every constructor or method candidate on `owner_class` matching
    /// `method_name` (or the constructors, when `method_name` is `None`)
    /// and the requested static-ness.
    fn candidates(&self, owner_class: &str, method_name: Option<&str>, is_static: bool) -> Vec<Candidate>;

    /// Iterate a host iterable's yielded elements.
    fn iterate(&self, value: &Value) -> Result<Vec<Value>>;

    /// Runtime class name of a host value, used for `isinstance`-style
    /// exception matching and overload scoring of host values passed back
    /// in as arguments.
    fn runtime_class_name(&self, value: &Value) -> Option<Rc<str>>;

    /// Whether `value`'s runtime host class is assignable to
    /// `host_class_name` — used to match `except HostClass`.
    fn is_assignable(&self, value_class: &str, host_class_name: &str) -> bool;
}

/// Process-wide, concurrent-safe cache from [`SignatureKey`] to a resolved
/// [`Executable`]. Must allow concurrent reads and inserts and must
/// not retain argument values, only their runtime classes.
#[derive(Default)]
pub struct OverloadCache {
    entries: DashMap<SignatureKey, Rc<dyn Executable>>,
}

impl OverloadCache {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    /// Resolve a call, consulting the cache first and scoring candidates
    /// on a miss.
    pub fn resolve(
        &self,
        host: &dyn HostRegistry,
        kind: CallKind,
        owner_class: &str,
        args: &[Value],
    ) -> Result<Rc<dyn Executable>> {
        let arg_types: Vec<Rc<str>> = args
            .iter()
            .map(|a| host.runtime_class_name(a).unwrap_or_else(|| Rc::from(a.type_name())))
            .collect();
        let key = SignatureKey { kind: kind.clone(), owner_class: Rc::from(owner_class), arg_types: arg_types.clone() };

        if let Some(hit) = self.entries.get(&key) {
            return Ok(hit.clone());
        }

        tracing::debug!(owner_class, ?kind, "overload cache miss, scanning candidates");

        let (method_name, is_static) = match &kind {
            CallKind::Constructor => (None, true),
            CallKind::Method { name, is_static } => (Some(name.as_ref()), *is_static),
        };
        let candidates = host.candidates(owner_class, method_name, is_static);

        let mut best: Option<(i32, Rc<dyn Executable>)> = None;
        for candidate in candidates {
            if candidate.param_types.len() != args.len() {
                continue;
            }
            let mut score = 1;
            let mut ok = true;
            for (param_ty, arg) in candidate.param_types.iter().zip(args.iter()) {
                match score_param(param_ty, arg, host) {
                    Some(s) => score += s,
                    None => {
                        ok = false;
                        break;
                    }
                }
            }
            if ok && best.as_ref().map(|(b, _)| score > *b).unwrap_or(true) {
                best = Some((score, candidate.executable));
            }
        }

        match best {
            Some((_, exec)) => {
                self.entries.insert(key, exec.clone());
                Ok(exec)
            }
            None => Err(Error::TypeError(format!(
                "no overload of {} on {} matches argument types ({})",
                method_name.unwrap_or("<init>"),
                owner_class,
                arg_types.join(", ")
            ))),
        }
    }
}

const PRIMITIVE_WRAPPERS: &[(&str, &str)] = &[
    ("boolean", "bool"),
    ("int", "int"),
    ("float", "float"),
    ("double", "float"),
    ("char", "str"),
];

/// Score one parameter against one argument; `None` if
/// incompatible.
fn score_param(param_type: &str, arg: &Value, host: &dyn HostRegistry) -> Option<i32> {
    if arg.type_name() == param_type {
        return Some(2);
    }
    if let Some((_, value_kind)) = PRIMITIVE_WRAPPERS.iter().find(|(p, _)| *p == param_type) {
        if arg.type_name() == *value_kind {
            return Some(2);
        }
    }
    if matches!(arg, Value::None) {
        let is_primitive = PRIMITIVE_WRAPPERS.iter().any(|(p, _)| *p == param_type);
        return if is_primitive { None } else { Some(1) };
    }
    if let Some(numeric) = arg.as_numeric() {
        let arg_rank = numeric_rank(arg);
        let target_rank = numeric_rank_for_param(param_type);
        if let (Some(a), Some(t)) = (arg_rank, target_rank) {
            if t >= a {
                return Some(1);
            }
        }
        let _ = numeric;
    }
    if let Some(value_class) = host.runtime_class_name(arg) {
        if host.is_assignable(&value_class, param_type) {
            return Some(1);
        }
    }
    None
}

fn numeric_rank(v: &Value) -> Option<u8> {
    match v {
        Value::Int32(_) => Some(0),
        Value::Int64(_) => Some(1),
        Value::Float32(_) => Some(2),
        Value::Float64(_) => Some(3),
        _ => None,
    }
}

fn numeric_rank_for_param(param_type: &str) -> Option<u8> {
    match param_type {
        "int" => Some(1),
        "float" => Some(2),
        "double" => Some(3),
        _ => None,
    }
}
