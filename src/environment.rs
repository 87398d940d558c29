//! Lexical/global scope chain: explicit environment objects linked
//! by parent reference, carrying the per-frame control-flow signalling
//! flags the evaluator polls instead of using exceptions-as-control-flow.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::host::HostRegistry;
use crate::value::Value;

pub type EnvironmentRef = Rc<RefCell<Environment>>;

/// One scope frame: local variable bindings, names declared `global`, and
/// the signalling flags the evaluator checks before every statement.
pub struct Environment {
    vars: HashMap<String, Value>,
    globals: HashSet<String>,
    /// The enclosing (lexical, definition-time) scope. `None` at the
    /// globals frame or when the enclosing frame collapses to globals.
    enclosing: Option<EnvironmentRef>,
    /// Present only on the root frame; every `Environment` in a chain
    /// shares the same globals frame through this field being set on the
    /// root and `enclosing` chains resolving up to it.
    globals_frame: Option<EnvironmentRef>,

    pub returned: bool,
    pub return_value: Value,
    pub loop_depth: u32,
    pub breaking_loop: bool,
    pub continuing_loop: bool,

    /// Shared across the whole chain: the host capability and stdout sink
    /// live once, at the root.
    shared: Option<Rc<Shared>>,
}

/// State that belongs to the whole script run rather than to one scope
/// frame, held once at the globals frame and reached by every descendant
/// via `shared`.
pub struct Shared {
    pub host: Rc<dyn HostRegistry>,
    pub stdout: RefCell<Box<dyn FnMut(&str)>>,
    pub max_recursion_depth: RefCell<Option<usize>>,
    pub call_depth: RefCell<usize>,
    pub max_instructions: RefCell<Option<u64>>,
    pub instruction_count: RefCell<u64>,
}

impl Environment {
    /// Build the root context, populated with built-ins by the caller.
    pub fn create_globals(host: Rc<dyn HostRegistry>, stdout: Box<dyn FnMut(&str)>) -> EnvironmentRef {
        let env = Rc::new(RefCell::new(Environment {
            vars: HashMap::new(),
            globals: HashSet::new(),
            enclosing: None,
            globals_frame: None,
            returned: false,
            return_value: Value::None,
            loop_depth: 0,
            breaking_loop: false,
            continuing_loop: false,
            shared: Some(Rc::new(Shared {
                host,
                stdout: RefCell::new(stdout),
                max_recursion_depth: RefCell::new(None),
                call_depth: RefCell::new(0),
                max_instructions: RefCell::new(None),
                instruction_count: RefCell::new(0),
            })),
        }));
        env.borrow_mut().globals_frame = Some(env.clone());
        env
    }

    /// A child context whose lexical parent is `enclosing` — the context
    /// captured at definition time, not the call site.
    pub fn create_local(enclosing: &EnvironmentRef) -> EnvironmentRef {
        let globals_frame = enclosing.borrow().globals_frame.clone();
        Rc::new(RefCell::new(Environment {
            vars: HashMap::new(),
            globals: HashSet::new(),
            enclosing: Some(enclosing.clone()),
            globals_frame,
            returned: false,
            return_value: Value::None,
            loop_depth: 0,
            breaking_loop: false,
            continuing_loop: false,
            shared: None,
        }))
    }

    fn globals(&self) -> EnvironmentRef {
        self.globals_frame.clone().expect("every environment reaches a globals frame")
    }

    fn shared(&self) -> Rc<Shared> {
        self.globals_frame
            .as_ref()
            .expect("every environment reaches a globals frame")
            .borrow()
            .shared
            .clone()
            .expect("globals frame always carries shared state")
    }

    pub fn host(&self) -> Rc<dyn HostRegistry> {
        self.shared().host.clone()
    }

    pub fn print(&self, line: &str) {
        (self.shared().stdout.borrow_mut())(line);
    }

    pub fn set_stdout(&self, sink: Box<dyn FnMut(&str)>) {
        *self.shared().stdout.borrow_mut() = sink;
    }

    pub fn max_recursion_depth(&self) -> Option<usize> {
        *self.shared().max_recursion_depth.borrow()
    }

    pub fn set_max_recursion_depth(&self, limit: Option<usize>) {
        *self.shared().max_recursion_depth.borrow_mut() = limit;
    }

    pub fn set_max_instructions(&self, limit: Option<u64>) {
        *self.shared().max_instructions.borrow_mut() = limit;
    }

    /// Counts one statement/expression-evaluation step against the
    /// configured instruction budget; errors once the budget is spent.
    /// A no-op (cheap counter bump, no check) when no limit is set.
    pub fn tick_instruction(&self) -> Result<()> {
        let shared = self.shared();
        let limit = *shared.max_instructions.borrow();
        let Some(limit) = limit else { return Ok(()) };
        let mut count = shared.instruction_count.borrow_mut();
        *count += 1;
        if *count > limit {
            return Err(Error::UnsupportedOperation(format!(
                "maximum instruction count exceeded ({})",
                limit
            )));
        }
        Ok(())
    }

    /// Enter a call frame; errors if it would exceed the configured
    /// recursion limit. Paired with [`Environment::exit_call`].
    pub fn enter_call(&self) -> Result<()> {
        let shared = self.shared();
        let mut depth = shared.call_depth.borrow_mut();
        *depth += 1;
        if let Some(limit) = *shared.max_recursion_depth.borrow() {
            if *depth > limit {
                return Err(Error::UnsupportedOperation(format!(
                    "maximum recursion depth exceeded ({})",
                    limit
                )));
            }
        }
        Ok(())
    }

    pub fn exit_call(&self) {
        let shared = self.shared();
        let mut depth = shared.call_depth.borrow_mut();
        *depth = depth.saturating_sub(1);
    }

    pub fn declare_global(&mut self, name: &str) {
        self.globals.insert(name.to_string());
    }

    /// `get`: declared-global → globals; else local; else walk
    /// enclosing chain; else globals; else `NameError`.
    pub fn get(env: &EnvironmentRef, name: &str) -> Result<Value> {
        let this = env.borrow();
        if this.globals.contains(name) {
            if Rc::ptr_eq(env, &this.globals()) {
                return this.vars.get(name).cloned().ok_or_else(|| name_error(name));
            }
            return Environment::get(&this.globals(), name);
        }
        if let Some(v) = this.vars.get(name) {
            return Ok(v.clone());
        }
        if let Some(enclosing) = this.enclosing.clone() {
            drop(this);
            return Environment::get(&enclosing, name);
        }
        if let Some(g) = this.globals_frame.clone() {
            if !Rc::ptr_eq(env, &g) {
                drop(this);
                tracing::trace!(name, "scope lookup falling through to globals");
                return Environment::get(&g, name);
            }
        }
        Err(name_error(name))
    }

    /// `set`: declared-global writes to globals; else writes the
    /// innermost (local) scope.
    pub fn set(env: &EnvironmentRef, name: &str, value: Value) {
        let is_global = env.borrow().globals.contains(name);
        if is_global {
            let globals = env.borrow().globals();
            if Rc::ptr_eq(env, &globals) {
                env.borrow_mut().vars.insert(name.to_string(), value);
            } else {
                Environment::set(&globals, name, value);
            }
        } else {
            env.borrow_mut().vars.insert(name.to_string(), value);
        }
    }

    /// `delete`: removes from the owning scope (following the same
    /// global-redirection rule as `get`/`set`); errors if absent there.
    pub fn delete(env: &EnvironmentRef, name: &str) -> Result<()> {
        let is_global = env.borrow().globals.contains(name);
        let target = if is_global { env.borrow().globals() } else { env.clone() };
        let removed = target.borrow_mut().vars.remove(name);
        if removed.is_some() { Ok(()) } else { Err(name_error(name)) }
    }

    pub fn enter_loop(&mut self) {
        self.loop_depth += 1;
    }

    pub fn exit_loop(&mut self) {
        self.loop_depth = self.loop_depth.saturating_sub(1);
    }

    pub fn break_loop(&mut self) -> Result<()> {
        if self.loop_depth == 0 {
            return Err(Error::ParseError("'break' outside loop".to_string()));
        }
        self.breaking_loop = true;
        Ok(())
    }

    pub fn continue_loop(&mut self) -> Result<()> {
        if self.loop_depth == 0 {
            return Err(Error::ParseError("'continue' not properly in loop".to_string()));
        }
        self.continuing_loop = true;
        Ok(())
    }

    pub fn return_with(&mut self, value: Value) {
        self.returned = true;
        self.return_value = value;
    }

    pub fn skip_statement(&self) -> bool {
        self.returned || self.breaking_loop || self.continuing_loop
    }
}

fn name_error(name: &str) -> Error {
    Error::NameError(format!("name '{}' is not defined", name))
}
