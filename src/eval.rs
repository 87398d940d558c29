//! Statement execution and expression evaluation: the
//! tree-walking core that drives everything else. Execution is
//! depth-first, single-threaded, and synchronous; every statement polls
//! [`Environment::skip_statement`] before running so `return`/`break`/
//! `continue` propagate without exceptions-as-control-flow.

use std::rc::Rc;

use crate::ast::{AssignTarget, BinOp, BoolOp, Comprehension, Constant, Expr, ExceptHandler, FStringPart, Stmt};
use crate::builtins::{call_builtin, math_module, to_iterable_items};
use crate::class::{DataclassField, FunctionDef, Method, MethodKind, UserClass, UserInstance};
use crate::environment::{Environment, EnvironmentRef};
use crate::error::{Error, Result};
use crate::host::{CallKind, HostRegistry, OverloadCache};
use crate::methods::call_method;
use crate::operators::{apply_binop, apply_cmpop, apply_unary};
use crate::value::Value;

/// A handle to a user-defined top-level function, returned by
/// [`Interpreter::get_function`] and consumed by [`Interpreter::invoke`].
#[derive(Clone)]
pub struct FunctionRef {
    def: Rc<FunctionDef>,
    closure: EnvironmentRef,
}

/// The embedder-facing handle over one loaded AST plus its global
/// context.
pub struct Interpreter {
    globals: EnvironmentRef,
    module_body: Vec<Stmt>,
    cache: Rc<OverloadCache>,
}

impl Interpreter {
    pub fn new(host: Rc<dyn HostRegistry>) -> Self {
        Self::with_cache(host, Rc::new(OverloadCache::new()))
    }

    /// Share one overload cache across several interpreters that want a
    /// process-wide resolved-call cache.
    pub fn with_cache(host: Rc<dyn HostRegistry>, cache: Rc<OverloadCache>) -> Self {
        let globals = Environment::create_globals(host, Box::new(|line| println!("{line}")));
        install_globals(&globals);
        Self { globals, module_body: Vec::new(), cache }
    }

    pub fn redirect_stdout(&mut self, sink: impl FnMut(&str) + 'static) {
        self.globals.borrow().set_stdout(Box::new(sink));
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        Environment::set(&self.globals, name, value);
    }

    pub fn get_global(&self, name: &str) -> Option<Value> {
        Environment::get(&self.globals, name).ok()
    }

    pub fn set_limits(&mut self, max_instructions: Option<u64>, max_recursion_depth: Option<usize>) {
        self.globals.borrow().set_max_recursion_depth(max_recursion_depth);
        self.globals.borrow().set_max_instructions(max_instructions);
    }

    /// Decodes `ast_json` and queues its module-level statements for
    /// `exec` to run.
    pub fn parse(&mut self, ast_json: &serde_json::Value) -> Result<()> {
        let host = self.globals.borrow().host();
        let decoder = crate::decode::Decoder::new(host.as_ref());
        self.module_body = decoder.decode_module(ast_json)?;
        Ok(())
    }

    /// Runs the queued global statements once.
    pub fn exec(&mut self) -> Result<Value> {
        let body = std::mem::take(&mut self.module_body);
        let mut evaluator = Evaluator { cache: self.cache.clone() };
        let result = evaluator.eval_stmts(&body, &self.globals);
        self.module_body = body;
        result?;
        Ok(Value::None)
    }

    pub fn get_function(&self, name: &str) -> Result<FunctionRef> {
        match Environment::get(&self.globals, name)? {
            Value::Function(def, closure) => Ok(FunctionRef { def, closure }),
            other => Err(Error::TypeError(format!("'{}' is not a function", other.type_name()))),
        }
    }

    pub fn invoke(&mut self, func: &FunctionRef, args: Vec<Value>) -> Result<Value> {
        let evaluator = Evaluator { cache: self.cache.clone() };
        evaluator.call_user_function(&func.def, &func.closure, args)
    }
}

fn install_globals(env: &EnvironmentRef) {
    Environment::set(env, "math", math_module());
}

/// Thin wrapper carrying the pieces of interpreter state the evaluator
/// needs on every call without re-threading them through each method
/// signature.
struct Evaluator {
    cache: Rc<OverloadCache>,
}

/// Signals a non-local exit out of the normal statement sequence: either
/// a `raise` (propagated as a normal error) or a handled control-flow
/// polled via the environment's flags, inspected by loop/function bodies
/// after each statement.
enum Flow {
    Normal,
    Stop,
}

impl Evaluator {
    fn eval_stmts(&self, stmts: &[Stmt], env: &EnvironmentRef) -> Result<Flow> {
        for stmt in stmts {
            if env.borrow().skip_statement() {
                return Ok(Flow::Stop);
            }
            if let Flow::Stop = self.eval_stmt(stmt, env)? {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Normal)
    }

    fn eval_stmt(&self, stmt: &Stmt, env: &EnvironmentRef) -> Result<Flow> {
        env.borrow().tick_instruction()?;
        match stmt {
            Stmt::Module(body) | Stmt::StatementBlock(body) => self.eval_stmts(body, env),
            Stmt::Assign(targets, value) => {
                let v = self.eval_expr(value, env)?;
                for target in targets {
                    self.assign(target, v.clone(), env)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::AugAssign(target, op, value_expr) => {
                let current = self.read_target(target, env)?;
                let rhs = self.eval_expr(value_expr, env)?;
                let new_value = if *op == BinOp::Add {
                    if let Value::List(list) = &current {
                        if let Value::List(other) = &rhs {
                            list.borrow_mut().extend(other.borrow().iter().cloned());
                            return Ok(Flow::Normal);
                        }
                    }
                    apply_binop(&current, *op, &rhs)?
                } else {
                    apply_binop(&current, *op, &rhs)?
                };
                self.assign(target, new_value, env)?;
                Ok(Flow::Normal)
            }
            Stmt::AnnAssign(target, value) => {
                if let Some(value) = value {
                    let v = self.eval_expr(value, env)?;
                    self.assign(target, v, env)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::Delete(targets) => {
                for target in targets {
                    if let AssignTarget::Name(name) = target {
                        Environment::delete(env, name)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::If(test, body, orelse) => {
                if self.eval_expr(test, env)?.is_truthy() {
                    self.eval_stmts(body, env)
                } else {
                    self.eval_stmts(orelse, env)
                }
            }
            Stmt::For(target, iter_expr, body) => self.eval_for(target, iter_expr, body, env),
            Stmt::While(test, body) => self.eval_while(test, body, env),
            Stmt::Break => {
                env.borrow_mut().break_loop()?;
                Ok(Flow::Stop)
            }
            Stmt::Continue => {
                env.borrow_mut().continue_loop()?;
                Ok(Flow::Stop)
            }
            Stmt::Return(value) => {
                let v = match value {
                    Some(e) => self.eval_expr(e, env)?,
                    None => Value::None,
                };
                env.borrow_mut().return_with(v);
                Ok(Flow::Stop)
            }
            Stmt::Raise(exc) => match exc {
                Some(e) => Err(Error::ScriptException(self.eval_expr(e, env)?)),
                None => Err(Error::ScriptException(Value::None)),
            },
            Stmt::Try(body, handlers, orelse, finalbody) => self.eval_try(body, handlers, orelse, finalbody, env),
            Stmt::GlobalDecl(names) => {
                for name in names {
                    env.borrow_mut().declare_global(name);
                }
                Ok(Flow::Normal)
            }
            Stmt::FunctionDef { name, params, body, decorators: _ } => {
                let def = Rc::new(FunctionDef { name: name.clone(), params: params.clone(), body: body.clone() });
                Environment::set(env, name, Value::Function(def, env.clone()));
                Ok(Flow::Normal)
            }
            Stmt::ClassDef { name, body, decorators } => {
                self.eval_class_def(name, body, decorators, env)?;
                Ok(Flow::Normal)
            }
            Stmt::ExprStmt(expr) => {
                self.eval_expr(expr, env)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn eval_for(&self, target: &AssignTarget, iter_expr: &Expr, body: &[Stmt], env: &EnvironmentRef) -> Result<Flow> {
        let iterable = self.eval_expr(iter_expr, env)?;
        let items = to_iterable_items(&iterable, env)?;
        env.borrow_mut().enter_loop();
        let result = (|| -> Result<Flow> {
            for item in items {
                self.assign(target, item, env)?;
                env.borrow_mut().continuing_loop = false;
                match self.eval_stmts(body, env)? {
                    Flow::Stop if env.borrow().breaking_loop => {
                        env.borrow_mut().breaking_loop = false;
                        break;
                    }
                    Flow::Stop if env.borrow().continuing_loop => continue,
                    Flow::Stop => return Ok(Flow::Stop),
                    Flow::Normal => {}
                }
            }
            Ok(Flow::Normal)
        })();
        env.borrow_mut().exit_loop();
        result
    }

    fn eval_while(&self, test: &Expr, body: &[Stmt], env: &EnvironmentRef) -> Result<Flow> {
        env.borrow_mut().enter_loop();
        let result = (|| -> Result<Flow> {
            while self.eval_expr(test, env)?.is_truthy() {
                env.borrow_mut().continuing_loop = false;
                match self.eval_stmts(body, env)? {
                    Flow::Stop if env.borrow().breaking_loop => {
                        env.borrow_mut().breaking_loop = false;
                        break;
                    }
                    Flow::Stop if env.borrow().continuing_loop => continue,
                    Flow::Stop => return Ok(Flow::Stop),
                    Flow::Normal => {}
                }
            }
            Ok(Flow::Normal)
        })();
        env.borrow_mut().exit_loop();
        result
    }

    /// Handlers are matched in declaration order, `finally`
    /// always runs, unmatched exceptions propagate after `finally`.
    fn eval_try(
        &self,
        body: &[Stmt],
        handlers: &[ExceptHandler],
        orelse: &[Stmt],
        finalbody: &[Stmt],
        env: &EnvironmentRef,
    ) -> Result<Flow> {
        let outcome = self.eval_stmts(body, env);
        let outcome = match outcome {
            Ok(flow) => {
                if matches!(flow, Flow::Normal) && !env.borrow().skip_statement() {
                    self.eval_stmts(orelse, env)
                } else {
                    Ok(flow)
                }
            }
            Err(err) => self.handle_exception(err, handlers, env),
        };

        // `finally` must always run at least its own first statement, even
        // though `try`/`except` may have left `returned`/`breaking_loop`/
        // `continuing_loop` set (which `skip_statement` would otherwise
        // treat as "already exiting"). Stash those flags, run `finally`
        // with a clean slate, then restore them — unless `finally` itself
        // produces a new exit, which supersedes the stashed one.
        let saved = {
            let mut e = env.borrow_mut();
            let saved = (e.returned, e.return_value.clone(), e.breaking_loop, e.continuing_loop);
            e.returned = false;
            e.breaking_loop = false;
            e.continuing_loop = false;
            saved
        };
        let final_flow = self.eval_stmts(finalbody, env)?;
        if matches!(final_flow, Flow::Stop) {
            return Ok(Flow::Stop);
        }
        {
            let mut e = env.borrow_mut();
            e.returned = saved.0;
            e.return_value = saved.1;
            e.breaking_loop = saved.2;
            e.continuing_loop = saved.3;
        }
        outcome
    }

    fn handle_exception(&self, err: Error, handlers: &[ExceptHandler], env: &EnvironmentRef) -> Result<Flow> {
        let class_name = err.exception_class_name();
        for handler in handlers {
            let matches = match &handler.exc_type {
                None => true,
                Some(wanted) => {
                    class_name.as_deref() == Some(wanted.as_str())
                        || class_name
                            .as_deref()
                            .is_some_and(|thrown| env.borrow().host().is_assignable(thrown, wanted))
                }
            };
            if !matches {
                continue;
            }
            if let Some(bind_name) = &handler.bind_name {
                let bound = match &err {
                    Error::ScriptException(v) => v.clone(),
                    other => Value::str(other.to_string()),
                };
                Environment::set(env, bind_name, bound);
            }
            return self.eval_stmts(&handler.body, env);
        }
        tracing::warn!(%err, "exception did not match any except clause");
        Err(err)
    }

    fn eval_class_def(&self, name: &str, body: &[Stmt], decorators: &[crate::ast::ClassDecorator], env: &EnvironmentRef) -> Result<()> {
        let dataclass_decorator = decorators.iter().find(|d| d.name == "dataclass");
        let frozen = dataclass_decorator
            .map(|d| d.keywords.iter().any(|(k, v)| k == "frozen" && v.as_bool() == Some(true)))
            .unwrap_or(false);

        let mut methods = std::collections::HashMap::new();
        let mut class_fields = std::collections::HashMap::new();
        let mut dataclass_fields = Vec::new();

        for stmt in body {
            match stmt {
                Stmt::FunctionDef { name: mname, params, body: mbody, decorators: mdecos } => {
                    let kind = if mdecos.iter().any(|d| d == "classmethod") {
                        MethodKind::ClassMethod
                    } else if mdecos.iter().any(|d| d == "staticmethod") {
                        MethodKind::StaticMethod
                    } else {
                        MethodKind::Instance
                    };
                    let def = Rc::new(FunctionDef { name: mname.clone(), params: params.clone(), body: mbody.clone() });
                    methods.insert(mname.clone(), Rc::new(Method { def, kind }));
                }
                Stmt::AnnAssign(AssignTarget::Name(field_name), default) => {
                    let default_value = match default {
                        Some(expr) => Some(self.eval_expr(expr, env)?),
                        None => None,
                    };
                    if dataclass_decorator.is_some() {
                        dataclass_fields.push(DataclassField { name: field_name.clone(), default: default_value.clone() });
                    }
                    if let Some(v) = default_value {
                        class_fields.insert(field_name.clone(), v);
                    }
                }
                Stmt::Assign(targets, value) => {
                    let v = self.eval_expr(value, env)?;
                    for target in targets {
                        if let AssignTarget::Name(field_name) = target {
                            class_fields.insert(field_name.clone(), v.clone());
                        }
                    }
                }
                _ => {}
            }
        }

        let class = Rc::new(std::cell::RefCell::new(UserClass {
            name: name.to_string(),
            methods,
            class_fields: std::cell::RefCell::new(class_fields),
            frozen,
            dataclass_fields: dataclass_decorator.map(|_| dataclass_fields),
            defining_env: env.clone(),
        }));
        Environment::set(env, name, Value::UserClass(class));
        Ok(())
    }

    fn assign(&self, target: &AssignTarget, value: Value, env: &EnvironmentRef) -> Result<()> {
        match target {
            AssignTarget::Name(name) => {
                Environment::set(env, name, value);
                Ok(())
            }
            AssignTarget::Attribute(obj_expr, attr) => {
                let obj = self.eval_expr(obj_expr, env)?;
                match obj {
                    Value::UserInstance(inst) => inst.borrow().set_field(attr, value).map_err(Into::into),
                    Value::HostObject(_) | Value::HostClass(_) => env.borrow().host().set_field(&obj, attr, value),
                    other => Err(Error::TypeError(format!("'{}' object has no attribute '{}'", other.type_name(), attr))),
                }
            }
            AssignTarget::Subscript(container_expr, index_expr) => {
                let container = self.eval_expr(container_expr, env)?;
                let index = self.eval_expr(index_expr, env)?;
                self.assign_subscript(&container, &index, value, env)
            }
            AssignTarget::Tuple(targets) => {
                let items = to_iterable_items(&value, env)?;
                if items.len() != targets.len() {
                    return Err(Error::TypeError(format!(
                        "cannot unpack {} values into {} targets",
                        items.len(),
                        targets.len()
                    )));
                }
                for (t, v) in targets.iter().zip(items.into_iter()) {
                    self.assign(t, v, env)?;
                }
                Ok(())
            }
        }
    }

    fn assign_subscript(&self, container: &Value, index: &Value, value: Value, env: &EnvironmentRef) -> Result<()> {
        match container {
            Value::List(list) => {
                let n = index.as_numeric().ok_or_else(|| Error::TypeError("list indices must be integers".to_string()))?.to_i64();
                let mut items = list.borrow_mut();
                let idx = crate::slice::normalize_index(n, items.len(), "list")?;
                items[idx] = value;
                Ok(())
            }
            Value::Dict(dict) => {
                let mut items = dict.borrow_mut();
                if !index.is_hashable() {
                    return Err(Error::TypeError(format!("unhashable type: '{}'", index.type_name())));
                }
                match items.iter_mut().find(|(k, _)| k.values_equal(index)) {
                    Some(entry) => entry.1 = value,
                    None => items.push((index.clone(), value)),
                }
                Ok(())
            }
            Value::HostArray(_) => {
                let n = index.as_numeric().ok_or_else(|| Error::TypeError("array indices must be integers".to_string()))?.to_i64();
                if n < 0 {
                    return Err(Error::UnsupportedOperation("negative indices are not supported for host-array assignment".to_string()));
                }
                env.borrow().host().set_field(container, &n.to_string(), value)
            }
            other => Err(Error::TypeError(format!("'{}' object does not support item assignment", other.type_name()))),
        }
    }

    fn read_target(&self, target: &AssignTarget, env: &EnvironmentRef) -> Result<Value> {
        match target {
            AssignTarget::Name(name) => Environment::get(env, name),
            AssignTarget::Attribute(obj, attr) => self.eval_expr(&Expr::Attribute(obj.clone(), attr.clone()), env),
            AssignTarget::Subscript(obj, idx) => self.eval_expr(&Expr::Subscript(obj.clone(), idx.clone()), env),
            AssignTarget::Tuple(_) => Err(Error::UnsupportedOperation("cannot augment-assign a tuple target".to_string())),
        }
    }

    fn eval_expr(&self, expr: &Expr, env: &EnvironmentRef) -> Result<Value> {
        match expr {
            Expr::Constant(c) => Ok(constant_to_value(c)),
            Expr::Name(name) => Environment::get(env, name),
            Expr::UnaryOp(op, operand) => apply_unary(*op, &self.eval_expr(operand, env)?),
            Expr::BinaryOp(left, op, right) => {
                let l = self.eval_expr(left, env)?;
                let r = self.eval_expr(right, env)?;
                apply_binop(&l, *op, &r)
            }
            Expr::BoolOp(op, values) => self.eval_boolop(*op, values, env),
            Expr::Compare(left, op, right) => {
                let l = self.eval_expr(left, env)?;
                let r = self.eval_expr(right, env)?;
                apply_cmpop(&l, *op, &r)
            }
            Expr::IfExpr(test, body, orelse) => {
                if self.eval_expr(test, env)?.is_truthy() {
                    self.eval_expr(body, env)
                } else {
                    self.eval_expr(orelse, env)
                }
            }
            Expr::Attribute(obj, attr) => self.eval_attribute(obj, attr, env),
            Expr::Subscript(obj, index) => self.eval_subscript(obj, index, env),
            Expr::Slice(lower, upper, step) => Ok(Value::Slice(
                Box::new(lower.as_ref().map(|e| self.eval_expr(e, env)).transpose()?),
                Box::new(upper.as_ref().map(|e| self.eval_expr(e, env)).transpose()?),
                Box::new(step.as_ref().map(|e| self.eval_expr(e, env)).transpose()?),
            )),
            Expr::Call(callee, args) => self.eval_call(callee, args, env),
            Expr::TupleLit(items) => Ok(Value::tuple(self.eval_expr_list(items, env)?)),
            Expr::ListLit(items) => Ok(Value::list(self.eval_expr_list(items, env)?)),
            Expr::DictLit(keys, values) => {
                let keys = self.eval_expr_list(keys, env)?;
                let values = self.eval_expr_list(values, env)?;
                Ok(Value::dict(keys.into_iter().zip(values).collect()))
            }
            Expr::ListComp(transform, comp) => self.eval_list_comp(transform, comp, env),
            Expr::FormattedString(parts) => self.eval_fstring(parts, env),
            Expr::Lambda(lambda) => Ok(Value::Lambda(Rc::new(lambda.clone()), env.clone())),
            Expr::HostClassMarker(handle) => Ok(Value::HostClass(handle.clone())),
        }
    }

    fn eval_expr_list(&self, exprs: &[Expr], env: &EnvironmentRef) -> Result<Vec<Value>> {
        exprs.iter().map(|e| self.eval_expr(e, env)).collect()
    }

    fn eval_boolop(&self, op: BoolOp, values: &[Expr], env: &EnvironmentRef) -> Result<Value> {
        let mut last = Value::None;
        for expr in values {
            last = self.eval_expr(expr, env)?;
            let short_circuit = match op {
                BoolOp::And => !last.is_truthy(),
                BoolOp::Or => last.is_truthy(),
            };
            if short_circuit {
                return Ok(last);
            }
        }
        Ok(last)
    }

    fn eval_attribute(&self, obj_expr: &Expr, attr: &str, env: &EnvironmentRef) -> Result<Value> {
        let obj = self.eval_expr(obj_expr, env)?;
        match &obj {
            Value::UserInstance(inst) => {
                if let Some(v) = inst.borrow().get_field(attr) {
                    return Ok(v);
                }
                let class = inst.borrow().class.clone();
                if let Some(method) = class.borrow().method(attr) {
                    return Ok(match method.kind {
                        MethodKind::Instance => Value::BoundFunction(method.def.clone(), class.borrow().defining_env.clone(), Box::new(obj.clone())),
                        MethodKind::ClassMethod => Value::BoundFunction(method.def.clone(), class.borrow().defining_env.clone(), Box::new(Value::UserClass(class.clone()))),
                        MethodKind::StaticMethod => Value::Function(method.def.clone(), class.borrow().defining_env.clone()),
                    });
                }
                Err(Error::TypeError(format!("'{}' object has no attribute '{}'", class.borrow().name, attr)))
            }
            Value::UserClass(class) => {
                if let Some(v) = class.borrow().class_fields.borrow().get(attr).cloned() {
                    return Ok(v);
                }
                if let Some(method) = class.borrow().method(attr) {
                    return Ok(match method.kind {
                        MethodKind::ClassMethod => Value::BoundFunction(method.def.clone(), class.borrow().defining_env.clone(), Box::new(obj.clone())),
                        MethodKind::StaticMethod => Value::Function(method.def.clone(), class.borrow().defining_env.clone()),
                        MethodKind::Instance => Value::Function(method.def.clone(), class.borrow().defining_env.clone()),
                    });
                }
                Err(Error::TypeError(format!("type object '{}' has no attribute '{}'", class.borrow().name, attr)))
            }
            Value::HostObject(_) | Value::HostClass(_) => env.borrow().host().get_field(&obj, attr),
            Value::Dict(d) => d
                .borrow()
                .iter()
                .find(|(k, _)| matches!(k, Value::Str(s) if s.as_ref() == attr))
                .map(|(_, v)| v.clone())
                .ok_or_else(|| Error::TypeError(format!("module object has no attribute '{}'", attr))),
            other => Err(Error::TypeError(format!("'{}' object has no attribute '{}'", other.type_name(), attr))),
        }
    }

    fn eval_subscript(&self, obj_expr: &Expr, index_expr: &Expr, env: &EnvironmentRef) -> Result<Value> {
        let obj = self.eval_expr(obj_expr, env)?;
        let index = self.eval_expr(index_expr, env)?;
        self.subscript(&obj, &index, env)
    }

    fn subscript(&self, obj: &Value, index: &Value, env: &EnvironmentRef) -> Result<Value> {
        if let Value::Slice(lower, upper, step) = index {
            let to_i64 = |v: &Option<Value>| -> Result<Option<i64>> {
                v.as_ref().map(|v| v.as_numeric().map(|n| n.to_i64()).ok_or_else(|| Error::TypeError("slice indices must be integers".to_string()))).transpose()
            };
            let (lo, up, st) = (to_i64(lower)?, to_i64(upper)?, to_i64(step)?);
            return match obj {
                Value::Str(s) | Value::IterableString(s) => Ok(Value::str(crate::slice::slice_string(s, lo, up, st)?)),
                Value::List(l) => Ok(Value::list(crate::slice::slice_list(&l.borrow(), lo, up, st)?)),
                Value::Tuple(t) => Ok(Value::tuple(crate::slice::slice_list(t, lo, up, st)?)),
                other => Err(Error::TypeError(format!("'{}' object is not subscriptable with a slice", other.type_name()))),
            };
        }

        match obj {
            Value::Str(s) | Value::IterableString(s) => {
                let n = index.as_numeric().ok_or_else(|| Error::TypeError("string indices must be integers".to_string()))?.to_i64();
                let chars: Vec<char> = s.chars().collect();
                let idx = crate::slice::normalize_index(n, chars.len(), "string")?;
                Ok(Value::str(chars[idx].to_string()))
            }
            Value::List(l) => {
                let n = index.as_numeric().ok_or_else(|| Error::TypeError("list indices must be integers".to_string()))?.to_i64();
                let items = l.borrow();
                let idx = crate::slice::normalize_index(n, items.len(), "list")?;
                Ok(items[idx].clone())
            }
            Value::Tuple(t) => {
                let n = index.as_numeric().ok_or_else(|| Error::TypeError("tuple indices must be integers".to_string()))?.to_i64();
                let idx = crate::slice::normalize_index(n, t.len(), "tuple")?;
                Ok(t[idx].clone())
            }
            Value::Dict(d) => d
                .borrow()
                .iter()
                .find(|(k, _)| k.values_equal(index))
                .map(|(_, v)| v.clone())
                .ok_or_else(|| Error::KeyError(index.to_repr_string())),
            Value::HostArray(_) => {
                let n = index.as_numeric().ok_or_else(|| Error::TypeError("array indices must be integers".to_string()))?.to_i64();
                env.borrow().host().get_field(obj, &n.to_string())
            }
            other => Err(Error::TypeError(format!("'{}' object is not subscriptable", other.type_name()))),
        }
    }

    fn eval_list_comp(&self, transform: &Expr, comp: &Comprehension, env: &EnvironmentRef) -> Result<Value> {
        let iterable = self.eval_expr(&comp.iter, env)?;
        let items = to_iterable_items(&iterable, env)?;
        let scope = Environment::create_local(env);
        let mut out = Vec::new();
        for item in items {
            self.assign(&comp.target, item, &scope)?;
            let mut keep = true;
            for cond in &comp.ifs {
                if !self.eval_expr(cond, &scope)?.is_truthy() {
                    keep = false;
                    break;
                }
            }
            if keep {
                out.push(self.eval_expr(transform, &scope)?);
            }
        }
        Ok(Value::list(out))
    }

    fn eval_fstring(&self, parts: &[FStringPart], env: &EnvironmentRef) -> Result<Value> {
        let mut out = String::new();
        for part in parts {
            match part {
                FStringPart::Literal(s) => out.push_str(s),
                FStringPart::Expr(e) => out.push_str(&self.eval_expr(e, env)?.to_print_string()),
            }
        }
        Ok(Value::str(out))
    }

    fn eval_call(&self, callee_expr: &Expr, arg_exprs: &[Expr], env: &EnvironmentRef) -> Result<Value> {
        // `obj.method(args...)` resolves through attribute lookup for user
        // values, but host/builtin method calls need the receiver kept
        // distinct from a plain attribute-then-call so mutation (list
        // methods) and overload resolution see the live receiver.
        if let Expr::Attribute(obj_expr, attr) = callee_expr {
            let receiver = self.eval_expr(obj_expr, env)?;
            let args = self.eval_expr_list(arg_exprs, env)?;
            if let Some(result) = call_method(&receiver, attr, &args) {
                return result;
            }
            return self.call_attribute(&receiver, attr, args, env);
        }

        // A bare `name(args...)` call: user-defined names shadow built-ins,
        // so only fall back to `call_builtin` once the name isn't bound in
        // scope at all.
        if let Expr::Name(name) = callee_expr {
            let args = self.eval_expr_list(arg_exprs, env)?;
            return match Environment::get(env, name) {
                Ok(callee) => self.call_value(&callee, args, env),
                Err(err) => call_builtin(name, &args, env).unwrap_or(Err(err)),
            };
        }

        let callee = self.eval_expr(callee_expr, env)?;
        let args = self.eval_expr_list(arg_exprs, env)?;
        self.call_value(&callee, args, env)
    }

    fn call_attribute(&self, receiver: &Value, attr: &str, args: Vec<Value>, env: &EnvironmentRef) -> Result<Value> {
        match receiver {
            Value::UserInstance(inst) => {
                let class = inst.borrow().class.clone();
                let method = class
                    .borrow()
                    .method(attr)
                    .ok_or_else(|| Error::TypeError(format!("'{}' object has no attribute '{}'", class.borrow().name, attr)))?;
                match method.kind {
                    MethodKind::Instance => {
                        let mut full_args = vec![receiver.clone()];
                        full_args.extend(args);
                        self.call_user_function(&method.def, &class.borrow().defining_env, full_args)
                    }
                    MethodKind::ClassMethod => {
                        let mut full_args = vec![Value::UserClass(class.clone())];
                        full_args.extend(args);
                        self.call_user_function(&method.def, &class.borrow().defining_env, full_args)
                    }
                    MethodKind::StaticMethod => self.call_user_function(&method.def, &class.borrow().defining_env, args),
                }
            }
            Value::UserClass(class) => {
                let method = class
                    .borrow()
                    .method(attr)
                    .ok_or_else(|| Error::TypeError(format!("type object '{}' has no attribute '{}'", class.borrow().name, attr)))?;
                match method.kind {
                    MethodKind::ClassMethod => {
                        let mut full_args = vec![Value::UserClass(class.clone())];
                        full_args.extend(args);
                        self.call_user_function(&method.def, &class.borrow().defining_env, full_args)
                    }
                    _ => self.call_user_function(&method.def, &class.borrow().defining_env, args),
                }
            }
            Value::HostObject(_) => {
                let owner_class = env.borrow().host().runtime_class_name(receiver).unwrap_or_else(|| "Object".into());
                let executable = self.cache.resolve(
                    env.borrow().host().as_ref(),
                    CallKind::Method { name: attr.into(), is_static: false },
                    &owner_class,
                    &args,
                )?;
                executable.invoke(env.borrow().host().as_ref(), Some(receiver), &args)
            }
            Value::HostClass(handle) => {
                let executable = self.cache.resolve(
                    env.borrow().host().as_ref(),
                    CallKind::Method { name: attr.into(), is_static: true },
                    &handle.name,
                    &args,
                )?;
                executable.invoke(env.borrow().host().as_ref(), None, &args)
            }
            Value::Dict(d) => {
                // A module represented as a dict (e.g. `math.sqrt(...)`): look
                // the name up as a key and call whatever it resolves to.
                let callee = d
                    .borrow()
                    .iter()
                    .find(|(k, _)| matches!(k, Value::Str(s) if s.as_ref() == attr))
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| Error::TypeError(format!("module object has no attribute '{}'", attr)))?;
                self.call_value(&callee, args, env)
            }
            other => Err(Error::TypeError(format!("'{}' object has no attribute '{}'", other.type_name(), attr))),
        }
    }

    fn call_value(&self, callee: &Value, args: Vec<Value>, env: &EnvironmentRef) -> Result<Value> {
        match callee {
            Value::Function(def, closure) => self.call_user_function(def, closure, args),
            Value::Lambda(lambda, closure) => self.call_lambda(lambda, closure, args),
            Value::BoundFunction(def, closure, bound_self) => {
                let mut full_args = vec![bound_self.as_ref().clone()];
                full_args.extend(args);
                self.call_user_function(def, closure, full_args)
            }
            Value::NativeFn(name) => call_builtin(name, &args, env)
                .unwrap_or_else(|| Err(Error::NameError(format!("name '{}' is not defined", name)))),
            Value::UserClass(class) => self.instantiate(class, args),
            Value::HostClass(handle) => {
                let executable = self.cache.resolve(env.borrow().host().as_ref(), CallKind::Constructor, &handle.name, &args)?;
                executable.invoke(env.borrow().host().as_ref(), None, &args)
            }
            other => Err(Error::TypeError(format!("'{}' object is not callable", other.type_name()))),
        }
    }

    /// Constructor dispatch: dataclass-generated constructor, an
    /// explicit `__init__`, or the implicit zero-arg constructor.
    fn instantiate(&self, class: &crate::class::UserClassRef, args: Vec<Value>) -> Result<Value> {
        if let Some(fields) = class.borrow().dataclass_fields.clone() {
            return self.instantiate_dataclass(class, &fields, args);
        }
        let fields = std::collections::HashMap::new();
        let instance = Rc::new(std::cell::RefCell::new(UserInstance { class: class.clone(), fields: std::cell::RefCell::new(fields) }));
        if let Some(init) = class.borrow().init_method() {
            let mut full_args = vec![Value::UserInstance(instance.clone())];
            full_args.extend(args);
            self.call_user_function(&init.def, &class.borrow().defining_env, full_args)?;
        } else if !args.is_empty() {
            return Err(Error::ArityError(format!("{}() takes no arguments", class.borrow().name)));
        }
        Ok(Value::UserInstance(instance))
    }

    fn instantiate_dataclass(&self, class: &crate::class::UserClassRef, fields: &[DataclassField], mut args: Vec<Value>) -> Result<Value> {
        let required = fields.iter().filter(|f| f.default.is_none()).count();
        if args.len() < required || args.len() > fields.len() {
            return Err(Error::ArityError(format!(
                "{}() takes {} to {} arguments but {} were given",
                class.borrow().name,
                required,
                fields.len(),
                args.len()
            )));
        }
        let mut values = std::collections::HashMap::new();
        args.reverse();
        for field in fields {
            let value = if !args.is_empty() {
                args.pop().unwrap()
            } else {
                field.default.clone().ok_or_else(|| Error::ArityError(format!("missing argument: '{}'", field.name)))?
            };
            values.insert(field.name.clone(), value);
        }
        Ok(Value::UserInstance(Rc::new(std::cell::RefCell::new(UserInstance { class: class.clone(), fields: std::cell::RefCell::new(values) }))))
    }

    fn call_user_function(&self, def: &Rc<FunctionDef>, closure: &EnvironmentRef, args: Vec<Value>) -> Result<Value> {
        if args.len() != def.params.len() {
            return Err(Error::ArityError(format!(
                "{}() takes {} argument(s) but {} were given",
                def.name,
                def.params.len(),
                args.len()
            )));
        }
        closure.borrow().enter_call()?;
        let result = (|| -> Result<Value> {
            let local = Environment::create_local(closure);
            for (param, value) in def.params.iter().zip(args) {
                Environment::set(&local, &param.name, value);
            }
            self.eval_stmts(&def.body, &local)?;
            Ok(local.borrow().return_value.clone())
        })();
        closure.borrow().exit_call();
        result
    }

    fn call_lambda(&self, lambda: &Rc<crate::ast::Lambda>, closure: &EnvironmentRef, args: Vec<Value>) -> Result<Value> {
        if args.len() != lambda.params.len() {
            return Err(Error::ArityError(format!("<lambda>() takes {} argument(s) but {} were given", lambda.params.len(), args.len())));
        }
        let local = Environment::create_local(closure);
        for (param, value) in lambda.params.iter().zip(args) {
            Environment::set(&local, &param.name, value);
        }
        self.eval_expr(&lambda.body, &local)
    }
}

fn constant_to_value(c: &Constant) -> Value {
    match c {
        Constant::None => Value::None,
        Constant::Bool(b) => Value::Bool(*b),
        Constant::Int32(n) => Value::Int32(*n),
        Constant::Int64(n) => Value::Int64(*n),
        Constant::Float32(n) => Value::Float32(*n),
        Constant::Float64(n) => Value::Float64(*n),
        Constant::Str(s) => Value::Str(s.clone()),
    }
}
