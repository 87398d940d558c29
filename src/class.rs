//! User-defined classes: plain classes, `@dataclass` (including
//! `frozen=True`), `@classmethod`/`@staticmethod`. No true inheritance or
//! metaclass protocol — each class stands alone with its own method/field
//! tables, matching the Non-goals.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Param, Stmt};
use crate::environment::EnvironmentRef;
use crate::error::Error;
use crate::value::Value;

pub type UserClassRef = Rc<RefCell<UserClass>>;
pub type UserInstanceRef = Rc<RefCell<UserInstance>>;

/// A `def` statement's static shape, shared (via `Rc`) between every
/// closure created from it.
#[derive(Debug)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Instance,
    ClassMethod,
    StaticMethod,
}

#[derive(Debug)]
pub struct Method {
    pub def: Rc<FunctionDef>,
    pub kind: MethodKind,
}

/// One dataclass field: its declaration-order position, name, and the
/// default value if any — defaults are evaluated once, at class-definition
/// time, and cloned into each new instance after that.
#[derive(Debug, Clone)]
pub struct DataclassField {
    pub name: String,
    pub default: Option<Value>,
}

pub struct UserClass {
    pub name: String,
    pub methods: HashMap<String, Rc<Method>>,
    /// Class-level fields (plain `Assign`/`AnnAssign` at class scope),
    /// consulted as the fallback after instance fields.
    pub class_fields: RefCell<HashMap<String, Value>>,
    pub frozen: bool,
    pub dataclass_fields: Option<Vec<DataclassField>>,
    /// The lexical scope the class body was defined in; methods close
    /// over it the same way top-level functions close over globals.
    pub defining_env: EnvironmentRef,
}

impl UserClass {
    pub fn is_dataclass(&self) -> bool {
        self.dataclass_fields.is_some()
    }

    /// Constructor dispatch: a dataclass ignores any `__init__`, a
    /// plain class with no `__init__` gets an implicit zero-arg
    /// constructor.
    pub fn init_method(&self) -> Option<Rc<Method>> {
        if self.is_dataclass() {
            return None;
        }
        self.methods.get("__init__").cloned()
    }

    pub fn method(&self, name: &str) -> Option<Rc<Method>> {
        self.methods.get(name).cloned()
    }
}

pub struct UserInstance {
    pub class: UserClassRef,
    pub fields: RefCell<HashMap<String, Value>>,
}

impl UserInstance {
    /// Field read: instance `__dict__` first, then class `__dict__`.
    pub fn get_field(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.fields.borrow().get(name) {
            return Some(v.clone());
        }
        self.class.borrow().class_fields.borrow().get(name).cloned()
    }

    /// Field write: instance-only; frozen classes reject writes.
    pub fn set_field(&self, name: &str, value: Value) -> Result<(), Error> {
        if self.class.borrow().frozen {
            return Err(Error::FrozenInstanceError {
                class: self.class.borrow().name.clone(),
                field: name.to_string(),
            });
        }
        self.fields.borrow_mut().insert(name.to_string(), value);
        Ok(())
    }

    /// The field tuple used for a frozen dataclass's generated equality
    /// and hash, in declaration order.
    pub fn dataclass_field_tuple(&self) -> Value {
        let class = self.class.borrow();
        let fields = class.dataclass_fields.as_ref().expect("dataclass_field_tuple called on non-dataclass");
        let values = fields
            .iter()
            .map(|f| self.fields.borrow().get(&f.name).cloned().unwrap_or(Value::None))
            .collect();
        Value::tuple(values)
    }

    /// A dataclass generates a `ClassName(field=value, ...)` repr;
    /// a plain instance falls back to the default object repr.
    pub fn repr(&self) -> String {
        let class = self.class.borrow();
        if let Some(fields) = &class.dataclass_fields {
            let parts: Vec<String> = fields
                .iter()
                .map(|f| {
                    let v = self.fields.borrow().get(&f.name).cloned().unwrap_or(Value::None);
                    format!("{}={}", f.name, v.to_repr_string())
                })
                .collect();
            format!("{}({})", class.name, parts.join(", "))
        } else {
            format!("<{} object>", class.name)
        }
    }

    /// A deterministic hash over the field tuple, generated for frozen
    /// dataclasses.
    pub fn dataclass_hash(&self) -> Option<u64> {
        let class = self.class.borrow();
        if !class.frozen || class.dataclass_fields.is_none() {
            return None;
        }
        drop(class);
        Some(hash_value(&self.dataclass_field_tuple()))
    }
}

/// A structural hash consistent with [`Value::values_equal`] for the
/// subset of values that are hashable (numbers/strings/tuples/None/bool).
pub fn hash_value(value: &Value) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    hash_into(value, &mut hasher);
    hasher.finish()
}

fn hash_into(value: &Value, hasher: &mut std::collections::hash_map::DefaultHasher) {
    use std::hash::{Hash, Hasher};
    match value {
        Value::None => 0u8.hash(hasher),
        Value::Bool(b) => b.hash(hasher),
        Value::Str(s) => s.hash(hasher),
        Value::IterableString(s) => s.hash(hasher),
        Value::Tuple(items) => {
            for item in items.iter() {
                hash_into(item, hasher);
            }
        }
        other => {
            if let Some(n) = other.as_numeric() {
                n.to_f64().to_bits().hash(hasher);
            } else {
                other.to_repr_string().hash(hasher);
            }
        }
    }
}
