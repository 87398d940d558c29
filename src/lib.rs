//! bramble - a tree-walking interpreter for a Python subset, driven by a
//! pre-parsed AST
//!
//! bramble executes scripts that have already been parsed elsewhere into a
//! JSON AST (Python's own `ast` module, typically) and handed to this crate
//! as a [`serde_json::Value`]. It never tokenizes or parses source text
//! itself. In exchange for that restriction it can reach into a host
//! application's own classes and objects through an injected
//! [`HostRegistry`] capability, the way an embedded scripting language
//! usually needs to.
//!
//! # Quick Start
//!
//! ```
//! # use bramble::{Error, HostRegistry, HostClassHandle, Candidate, Result, Value, Interpreter};
//! # use std::rc::Rc;
//! # struct NoHost;
//! # impl HostRegistry for NoHost {
//! #     fn resolve_class(&self, name: &str) -> Result<HostClassHandle> {
//! #         Err(Error::ParseError(format!("no host classes ({name})")))
//! #     }
//! #     fn get_field(&self, _owner: &Value, name: &str) -> Result<Value> {
//! #         Err(Error::TypeError(format!("no such field {name}")))
//! #     }
//! #     fn set_field(&self, _owner: &Value, _name: &str, _value: Value) -> Result<()> { Ok(()) }
//! #     fn candidates(&self, _owner_class: &str, _method_name: Option<&str>, _is_static: bool) -> Vec<Candidate> { Vec::new() }
//! #     fn iterate(&self, _value: &Value) -> Result<Vec<Value>> { Err(Error::TypeError("not iterable".into())) }
//! #     fn runtime_class_name(&self, _value: &Value) -> Option<Rc<str>> { None }
//! #     fn is_assignable(&self, _value_class: &str, _host_class_name: &str) -> bool { false }
//! # }
//! let ast_json: serde_json::Value = serde_json::json!({
//!     "type": "Module",
//!     "body": [{
//!         "type": "Assign",
//!         "targets": [{"type": "Name", "id": "answer"}],
//!         "value": {"type": "Constant", "value": 42}
//!     }]
//! });
//!
//! let mut interp = Interpreter::new(Rc::new(NoHost));
//! interp.parse(&ast_json).unwrap();
//! interp.exec().unwrap();
//! assert_eq!(interp.get_global("answer").unwrap().to_print_string(), "42");
//! ```
//!
//! # Supported language subset
//!
//! ## Types
//! - `None`, `bool`, a four-rung numeric tower (`int32`/`int64`/`float32`/`float64`)
//! - `str`, `list`, `tuple`, `dict` (insertion-ordered), `range`, `enumerate`
//!
//! ## Operators
//! - Arithmetic: `+`, `-`, `*`, `/`, `%`, `**`
//! - Comparison: `==`, `!=`, `<`, `<=`, `>`, `>=`, `is`, `is not`, `in`, `not in`
//! - Boolean: `and`, `or`, `not`
//!
//! ## Control flow
//! - `if`/`elif`/`else`, `for`, `while`, `break`/`continue`
//! - `try`/`except`/`else`/`finally`, `raise`
//! - list comprehensions, f-strings, lambdas
//!
//! ## Functions and classes
//! - `def` with positional parameters, closures, recursion (bounded — see
//!   [`Interpreter::set_limits`])
//! - `class`, `@dataclass` (including `frozen=True`), `@classmethod`,
//!   `@staticmethod`
//!
//! ## Host interop
//! - `JavaClass("fully.qualified.Name")` markers resolved at parse time
//! - Constructor/method overload resolution cached process-wide via
//!   [`OverloadCache`]
//!
//! # Not supported
//!
//! - Parsing source text (the AST must already be JSON)
//! - True inheritance, metaclasses, generators/coroutines
//! - `with` statements, multi-threaded script execution
//! - File I/O and imports beyond the built-in `math` module

mod ast;
mod builtins;
mod class;
mod decode;
mod environment;
mod error;
mod eval;
mod host;
mod methods;
mod numeric;
mod operators;
mod slice;
mod value;

pub use error::{Error, Result};
pub use eval::{FunctionRef, Interpreter};
pub use host::{
    Candidate, CallKind, Executable, HostArrayHandle, HostClassHandle, HostObjectHandle,
    HostRegistry, OverloadCache, SignatureKey,
};
pub use value::Value;
