//! Single error channel for the interpreter.
//!
//! Every fallible operation in this crate returns [`Result`], which wraps
//! exactly one [`Error`] variant per error kind named in the interpreter's
//! design. Script-level exceptions (`raise`) and host-side exceptions are
//! both carried as payload-bearing variants rather than as distinct Rust
//! error types, so `try`/`except` matching can discriminate on `Error`
//! alone.

use crate::value::Value;

/// The crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Every error kind the interpreter can raise.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Malformed or unrecognized AST JSON.
    #[error("parse error: {0}")]
    ParseError(String),

    /// A name was read (or deleted) without having been defined.
    #[error("name error: {0}")]
    NameError(String),

    /// An operator or call was applied to incompatible operand types.
    #[error("type error: {0}")]
    TypeError(String),

    /// A subscript index fell outside a sequence's bounds.
    #[error("index error: {0}")]
    IndexError(String),

    /// A dict lookup used a key that is not present.
    #[error("key error: {0}")]
    KeyError(String),

    /// A call supplied the wrong number of arguments.
    #[error("arity error: {0}")]
    ArityError(String),

    /// A field write targeted a frozen dataclass instance.
    #[error("cannot assign to field {field:?} of frozen instance of {class}")]
    FrozenInstanceError { class: String, field: String },

    /// A construct is recognized but not supported (e.g. a slice step != 1).
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A script-level `raise`. Carries the raised value so `except` clauses
    /// can inspect its class.
    #[error("exception: {0}")]
    ScriptException(Value),

    /// An exception surfaced while calling into the host, with its
    /// host-reported type name preserved for `except HostClass` matching.
    #[error("host exception ({class_name}): {message}")]
    HostException { class_name: String, message: String },
}

impl Error {
    /// The class name used to match this error against a script `except`
    /// clause, if it names one.
    pub fn exception_class_name(&self) -> Option<String> {
        match self {
            Error::ScriptException(Value::UserInstance(inst)) => {
                Some(inst.borrow().class.borrow().name.clone())
            }
            Error::HostException { class_name, .. } => Some(class_name.clone()),
            _ => None,
        }
    }
}
