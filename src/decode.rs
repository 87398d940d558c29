//! JSON → AST decoding. Maps the external AST JSON, tagged by
//! a `"type"` field, into the typed node tree in [`crate::ast`]. Every
//! decode error is a single-kind [`Error::ParseError`] carrying the
//! offending JSON fragment.

use serde_json::Value as Json;

use crate::ast::{
    AssignTarget, BinOp, BoolOp, ClassDecorator, Comprehension, Constant, CmpOp, Expr, ExceptHandler,
    FStringPart, Lambda, Param, Stmt, UnaryOp,
};
use crate::error::{Error, Result};
use crate::host::HostRegistry;
use crate::numeric::{narrow_float, narrow_int};

/// Decodes JSON AST nodes against an injected host registry, so
/// `JavaClass("...")` markers can be resolved to host-class handles at
/// decode time.
pub struct Decoder<'a> {
    host: &'a dyn HostRegistry,
}

impl<'a> Decoder<'a> {
    pub fn new(host: &'a dyn HostRegistry) -> Self {
        Self { host }
    }

    pub fn decode_module(&self, json: &Json) -> Result<Vec<Stmt>> {
        let body = field(json, "body")?;
        self.decode_stmt_list(body)
    }

    fn decode_stmt_list(&self, json: &Json) -> Result<Vec<Stmt>> {
        json.as_array()
            .ok_or_else(|| parse_err("expected a statement list", json))?
            .iter()
            .map(|s| self.decode_stmt(s))
            .collect()
    }

    fn node_type<'j>(&self, json: &'j Json) -> Result<&'j str> {
        json.get("type")
            .and_then(Json::as_str)
            .ok_or_else(|| parse_err("AST node missing \"type\"", json))
    }

    fn decode_stmt(&self, json: &Json) -> Result<Stmt> {
        let ty = self.node_type(json)?;
        match ty {
            "Module" => Ok(Stmt::Module(self.decode_stmt_list(field(json, "body")?)?)),
            "Assign" => {
                let targets = field(json, "targets")?
                    .as_array()
                    .ok_or_else(|| parse_err("Assign.targets must be an array", json))?
                    .iter()
                    .map(|t| self.decode_target(t))
                    .collect::<Result<Vec<_>>>()?;
                let value = self.decode_expr(field(json, "value")?)?;
                Ok(Stmt::Assign(targets, value))
            }
            "AugAssign" => {
                let target = self.decode_target(field(json, "target")?)?;
                let op = self.decode_binop(field(json, "op")?)?;
                let value = self.decode_expr(field(json, "value")?)?;
                Ok(Stmt::AugAssign(target, op, value))
            }
            "AnnAssign" => {
                let target = self.decode_target(field(json, "target")?)?;
                let value = match json.get("value") {
                    Some(v) if !v.is_null() => Some(self.decode_expr(v)?),
                    _ => None,
                };
                Ok(Stmt::AnnAssign(target, value))
            }
            "Delete" => {
                let targets = field(json, "targets")?
                    .as_array()
                    .ok_or_else(|| parse_err("Delete.targets must be an array", json))?
                    .iter()
                    .map(|t| self.decode_target(t))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Stmt::Delete(targets))
            }
            "If" => {
                let test = self.decode_expr(field(json, "test")?)?;
                let body = self.decode_stmt_list(field(json, "body")?)?;
                let orelse = match json.get("orelse") {
                    Some(o) => self.decode_stmt_list(o)?,
                    None => Vec::new(),
                };
                Ok(Stmt::If(test, body, orelse))
            }
            "For" => {
                let target = self.decode_target(field(json, "target")?)?;
                let iter = self.decode_expr(field(json, "iter")?)?;
                let body = self.decode_stmt_list(field(json, "body")?)?;
                Ok(Stmt::For(target, iter, body))
            }
            "While" => {
                let test = self.decode_expr(field(json, "test")?)?;
                let body = self.decode_stmt_list(field(json, "body")?)?;
                Ok(Stmt::While(test, body))
            }
            "Break" => Ok(Stmt::Break),
            "Continue" => Ok(Stmt::Continue),
            "Return" => {
                let value = match json.get("value") {
                    Some(v) if !v.is_null() => Some(self.decode_expr(v)?),
                    _ => None,
                };
                Ok(Stmt::Return(value))
            }
            "Raise" => {
                let exc = match json.get("exc") {
                    Some(v) if !v.is_null() => Some(self.decode_expr(v)?),
                    _ => None,
                };
                Ok(Stmt::Raise(exc))
            }
            "Try" => {
                let body = self.decode_stmt_list(field(json, "body")?)?;
                let handlers = field(json, "handlers")?
                    .as_array()
                    .ok_or_else(|| parse_err("Try.handlers must be an array", json))?
                    .iter()
                    .map(|h| self.decode_handler(h))
                    .collect::<Result<Vec<_>>>()?;
                let orelse = match json.get("orelse") {
                    Some(o) => self.decode_stmt_list(o)?,
                    None => Vec::new(),
                };
                let finalbody = match json.get("finalbody") {
                    Some(f) => self.decode_stmt_list(f)?,
                    None => Vec::new(),
                };
                Ok(Stmt::Try(body, handlers, orelse, finalbody))
            }
            "Global" => {
                let names = field(json, "names")?
                    .as_array()
                    .ok_or_else(|| parse_err("Global.names must be an array", json))?
                    .iter()
                    .map(|n| n.as_str().map(str::to_string).ok_or_else(|| parse_err("Global name must be a string", n)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Stmt::GlobalDecl(names))
            }
            "FunctionDef" => {
                let name = str_field(json, "name")?.to_string();
                let params = self.decode_params(field(json, "args")?)?;
                let body = self.decode_stmt_list(field(json, "body")?)?;
                let decorators = self.decode_decorator_names(json)?;
                Ok(Stmt::FunctionDef { name, params, body, decorators })
            }
            "ClassDef" => {
                let name = str_field(json, "name")?.to_string();
                let body = self.decode_stmt_list(field(json, "body")?)?;
                let decorators = self.decode_class_decorators(json)?;
                Ok(Stmt::ClassDef { name, body, decorators })
            }
            "Expr" => Ok(Stmt::ExprStmt(self.decode_expr(field(json, "value")?)?)),
            other => Err(parse_err(&format!("unsupported statement type {:?}", other), json)),
        }
    }

    fn decode_handler(&self, json: &Json) -> Result<ExceptHandler> {
        // Exception type lives under "type"; accept "type_" too, since
        // that's how some AST serializers avoid colliding with the
        // node's own "type" tag.
        let raw = json.get("type").filter(|t| !t.is_null()).or_else(|| json.get("type_"));
        let exc_type = match raw {
            Some(t) if !t.is_null() => Some(self.decode_name_ref(t)?),
            _ => None,
        };
        let bind_name = json.get("name").and_then(Json::as_str).map(str::to_string);
        let body = self.decode_stmt_list(field(json, "body")?)?;
        Ok(ExceptHandler { exc_type, bind_name, body })
    }

    fn decode_name_ref(&self, json: &Json) -> Result<String> {
        if let Some(name) = json.get("id").and_then(Json::as_str) {
            return Ok(name.to_string());
        }
        json.as_str()
            .map(str::to_string)
            .ok_or_else(|| parse_err("expected a Name reference", json))
    }

    fn decode_params(&self, json: &Json) -> Result<Vec<Param>> {
        let args = field(json, "args")?
            .as_array()
            .ok_or_else(|| parse_err("args.args must be an array", json))?;
        args.iter()
            .map(|a| {
                let name = str_field(a, "arg")?.to_string();
                Ok(Param { name })
            })
            .collect()
    }

    fn decode_decorator_names(&self, json: &Json) -> Result<Vec<String>> {
        let Some(list) = json.get("decorator_list").and_then(Json::as_array) else {
            return Ok(Vec::new());
        };
        list.iter().map(|d| self.decorator_name(d)).collect()
    }

    fn decorator_name(&self, json: &Json) -> Result<String> {
        match self.node_type(json)? {
            "Name" => Ok(str_field(json, "id")?.to_string()),
            "Call" => {
                let func = field(json, "func")?;
                Ok(str_field(func, "id")?.to_string())
            }
            other => Err(parse_err(&format!("unsupported decorator form {:?}", other), json)),
        }
    }

    fn decode_class_decorators(&self, json: &Json) -> Result<Vec<ClassDecorator>> {
        let Some(list) = json.get("decorator_list").and_then(Json::as_array) else {
            return Ok(Vec::new());
        };
        list.iter()
            .map(|d| {
                let ty = self.node_type(d)?;
                match ty {
                    "Name" => Ok(ClassDecorator { name: str_field(d, "id")?.to_string(), keywords: Vec::new() }),
                    "Call" => {
                        let func = field(d, "func")?;
                        let name = str_field(func, "id")?.to_string();
                        let keywords = d
                            .get("keywords")
                            .and_then(Json::as_array)
                            .map(|kws| {
                                kws.iter()
                                    .filter_map(|kw| {
                                        let arg = kw.get("arg")?.as_str()?.to_string();
                                        let value = kw.get("value")?.get("value").cloned().unwrap_or(Json::Null);
                                        Some((arg, value))
                                    })
                                    .collect()
                            })
                            .unwrap_or_default();
                        Ok(ClassDecorator { name, keywords })
                    }
                    other => Err(parse_err(&format!("unsupported decorator form {:?}", other), d)),
                }
            })
            .collect()
    }

    /// Assignment targets are restricted to `Name`, `Attribute`,
    /// `Subscript`, or one level of `Tuple`-of-`Name`s.
    fn decode_target(&self, json: &Json) -> Result<AssignTarget> {
        match self.node_type(json)? {
            "Name" => Ok(AssignTarget::Name(str_field(json, "id")?.to_string())),
            "Attribute" => {
                let value = self.decode_expr(field(json, "value")?)?;
                let attr = str_field(json, "attr")?.to_string();
                Ok(AssignTarget::Attribute(Box::new(value), attr))
            }
            "Subscript" => {
                let value = self.decode_expr(field(json, "value")?)?;
                let slice = self.decode_expr(field(json, "slice")?)?;
                Ok(AssignTarget::Subscript(Box::new(value), Box::new(slice)))
            }
            "Tuple" => {
                let elts = field(json, "elts")?
                    .as_array()
                    .ok_or_else(|| parse_err("Tuple.elts must be an array", json))?
                    .iter()
                    .map(|e| self.decode_target(e))
                    .collect::<Result<Vec<_>>>()?;
                Ok(AssignTarget::Tuple(elts))
            }
            other => Err(parse_err(&format!("invalid assignment target {:?}", other), json)),
        }
    }

    fn decode_expr(&self, json: &Json) -> Result<Expr> {
        let ty = self.node_type(json)?;
        match ty {
            "Constant" => self.decode_constant(json),
            "Name" => Ok(Expr::Name(str_field(json, "id")?.to_string())),
            "UnaryOp" => {
                let op = match tag(field(json, "op")?) {
                    "USub" => UnaryOp::USub,
                    "Not" => UnaryOp::Not,
                    other => return Err(parse_err(&format!("unsupported unary op {:?}", other), json)),
                };
                let operand = self.decode_expr(field(json, "operand")?)?;
                Ok(Expr::UnaryOp(op, Box::new(operand)))
            }
            "BinOp" => {
                let left = self.decode_expr(field(json, "left")?)?;
                let op = self.decode_binop(field(json, "op")?)?;
                let right = self.decode_expr(field(json, "right")?)?;
                Ok(Expr::BinaryOp(Box::new(left), op, Box::new(right)))
            }
            "BoolOp" => {
                let op = match tag(field(json, "op")?) {
                    "And" => BoolOp::And,
                    "Or" => BoolOp::Or,
                    other => return Err(parse_err(&format!("unsupported bool op {:?}", other), json)),
                };
                let values = field(json, "values")?
                    .as_array()
                    .ok_or_else(|| parse_err("BoolOp.values must be an array", json))?
                    .iter()
                    .map(|v| self.decode_expr(v))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Expr::BoolOp(op, values))
            }
            "Compare" => {
                let left = self.decode_expr(field(json, "left")?)?;
                let op = self.decode_cmpop(
                    field(json, "ops")?
                        .as_array()
                        .and_then(|a| a.first())
                        .ok_or_else(|| parse_err("Compare.ops must be non-empty", json))?,
                )?;
                let right = self.decode_expr(
                    field(json, "comparators")?
                        .as_array()
                        .and_then(|a| a.first())
                        .ok_or_else(|| parse_err("Compare.comparators must be non-empty", json))?,
                )?;
                Ok(Expr::Compare(Box::new(left), op, Box::new(right)))
            }
            "IfExp" => {
                let test = self.decode_expr(field(json, "test")?)?;
                let body = self.decode_expr(field(json, "body")?)?;
                let orelse = self.decode_expr(field(json, "orelse")?)?;
                Ok(Expr::IfExpr(Box::new(test), Box::new(body), Box::new(orelse)))
            }
            "Attribute" => {
                let value = self.decode_expr(field(json, "value")?)?;
                let attr = str_field(json, "attr")?.to_string();
                Ok(Expr::Attribute(Box::new(value), attr))
            }
            "Subscript" => {
                let value = self.decode_expr(field(json, "value")?)?;
                let slice = self.decode_expr(field(json, "slice")?)?;
                Ok(Expr::Subscript(Box::new(value), Box::new(slice)))
            }
            "Slice" => {
                let lower = match json.get("lower") {
                    Some(v) if !v.is_null() => Some(Box::new(self.decode_expr(v)?)),
                    _ => None,
                };
                let upper = match json.get("upper") {
                    Some(v) if !v.is_null() => Some(Box::new(self.decode_expr(v)?)),
                    _ => None,
                };
                let step = match json.get("step") {
                    Some(v) if !v.is_null() => Some(Box::new(self.decode_expr(v)?)),
                    _ => None,
                };
                Ok(Expr::Slice(lower, upper, step))
            }
            "Call" => self.decode_call(json),
            "Tuple" => Ok(Expr::TupleLit(self.decode_expr_list(field(json, "elts")?)?)),
            "List" => Ok(Expr::ListLit(self.decode_expr_list(field(json, "elts")?)?)),
            "Dict" => {
                let keys = field(json, "keys")?
                    .as_array()
                    .ok_or_else(|| parse_err("Dict.keys must be an array", json))?
                    .iter()
                    .map(|k| self.decode_expr(k))
                    .collect::<Result<Vec<_>>>()?;
                let values = self.decode_expr_list(field(json, "values")?)?;
                Ok(Expr::DictLit(keys, values))
            }
            "ListComp" => {
                let transform = self.decode_expr(field(json, "elt")?)?;
                let generators = field(json, "generators")?
                    .as_array()
                    .ok_or_else(|| parse_err("ListComp.generators must be an array", json))?;
                let first = generators.first().ok_or_else(|| parse_err("ListComp needs one generator", json))?;
                let target = self.decode_target(field(first, "target")?)?;
                let iter = self.decode_expr(field(first, "iter")?)?;
                let ifs = match first.get("ifs") {
                    Some(arr) => self.decode_expr_list(arr)?,
                    None => Vec::new(),
                };
                Ok(Expr::ListComp(Box::new(transform), Comprehension { target, iter, ifs }))
            }
            "JoinedStr" => {
                let values = field(json, "values")?
                    .as_array()
                    .ok_or_else(|| parse_err("JoinedStr.values must be an array", json))?;
                let parts = values
                    .iter()
                    .map(|v| match self.node_type(v)? {
                        "Constant" => Ok(FStringPart::Literal(
                            field(v, "value")?.as_str().unwrap_or_default().to_string(),
                        )),
                        "FormattedValue" => Ok(FStringPart::Expr(self.decode_expr(field(v, "value")?)?)),
                        other => Err(parse_err(&format!("unsupported f-string part {:?}", other), v)),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Expr::FormattedString(parts))
            }
            "Lambda" => {
                let params = self.decode_params(field(json, "args")?)?;
                let body = self.decode_expr(field(json, "body")?)?;
                Ok(Expr::Lambda(Lambda { params, body: Box::new(body) }))
            }
            other => Err(parse_err(&format!("unsupported expression type {:?}", other), json)),
        }
    }

    fn decode_expr_list(&self, json: &Json) -> Result<Vec<Expr>> {
        json.as_array()
            .ok_or_else(|| parse_err("expected an expression list", json))?
            .iter()
            .map(|e| self.decode_expr(e))
            .collect()
    }

    /// The magic `JavaClass("fully.qualified.Name")` callee is
    /// rewritten into a resolved host-class reference; any other call form
    /// is decoded normally.
    fn decode_call(&self, json: &Json) -> Result<Expr> {
        let func = field(json, "func")?;
        let args = field(json, "args")?
            .as_array()
            .ok_or_else(|| parse_err("Call.args must be an array", json))?;

        if self.node_type(func).ok() == Some("Name") && str_field(func, "id").ok() == Some("JavaClass") {
            if args.len() != 1 {
                return Err(parse_err("JavaClass(...) requires exactly one argument", json));
            }
            let class_name = self.string_literal(&args[0])?;
            let handle = self.host.resolve_class(&class_name)?;
            return Ok(Expr::HostClassMarker(handle));
        }

        let callee = self.decode_expr(func)?;
        let decoded_args = self.decode_expr_list(field(json, "args")?)?;
        Ok(Expr::Call(Box::new(callee), decoded_args))
    }

    fn string_literal(&self, json: &Json) -> Result<String> {
        if self.node_type(json)? != "Constant" {
            return Err(parse_err("JavaClass(...) argument must be a string literal", json));
        }
        field(json, "value")?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| parse_err("JavaClass(...) argument must be a string literal", json))
    }

    fn decode_constant(&self, json: &Json) -> Result<Expr> {
        let typename = json.get("typename").and_then(Json::as_str).unwrap_or_else(|| infer_typename(json));
        let value = field(json, "value")?;
        let constant = match typename {
            "NoneType" => Constant::None,
            "bool" => Constant::Bool(value.as_bool().ok_or_else(|| parse_err("expected bool constant", json))?),
            "int" => match narrow_int(value.as_i64().ok_or_else(|| parse_err("expected int constant", json))?) {
                crate::numeric::Numeric::Int32(n) => Constant::Int32(n),
                crate::numeric::Numeric::Int64(n) => Constant::Int64(n),
                _ => unreachable!(),
            },
            "float" => match narrow_float(value.as_f64().ok_or_else(|| parse_err("expected float constant", json))?) {
                crate::numeric::Numeric::Float32(n) => Constant::Float32(n),
                crate::numeric::Numeric::Float64(n) => Constant::Float64(n),
                _ => unreachable!(),
            },
            "str" => Constant::Str(value.as_str().ok_or_else(|| parse_err("expected str constant", json))?.into()),
            other => return Err(parse_err(&format!("unsupported constant typename {:?}", other), json)),
        };
        Ok(Expr::Constant(constant))
    }

    fn decode_binop(&self, json: &Json) -> Result<BinOp> {
        match tag(json) {
            "Add" => Ok(BinOp::Add),
            "Sub" => Ok(BinOp::Sub),
            "Mult" => Ok(BinOp::Mult),
            "Div" => Ok(BinOp::Div),
            "Mod" => Ok(BinOp::Mod),
            "Pow" => Ok(BinOp::Pow),
            other => Err(parse_err(&format!("unsupported binary op {:?}", other), json)),
        }
    }

    fn decode_cmpop(&self, json: &Json) -> Result<CmpOp> {
        match tag(json) {
            "Is" => Ok(CmpOp::Is),
            "IsNot" => Ok(CmpOp::IsNot),
            "Eq" => Ok(CmpOp::Eq),
            "Lt" => Ok(CmpOp::Lt),
            "LtE" => Ok(CmpOp::LtE),
            "Gt" => Ok(CmpOp::Gt),
            "GtE" => Ok(CmpOp::GtE),
            "NotEq" => Ok(CmpOp::NotEq),
            "In" => Ok(CmpOp::In),
            "NotIn" => Ok(CmpOp::NotIn),
            other => Err(parse_err(&format!("unsupported compare op {:?}", other), json)),
        }
    }
}

/// Operator nodes are tagged either as a bare string (`"Add"`) or as an
/// object with a `"type"` field; accept both shapes.
fn tag(json: &Json) -> &str {
    if let Some(s) = json.as_str() {
        return s;
    }
    json.get("type").and_then(Json::as_str).unwrap_or("")
}

fn infer_typename(json: &Json) -> &'static str {
    match json.get("value") {
        Some(Json::Null) | None => "NoneType",
        Some(Json::Bool(_)) => "bool",
        Some(Json::Number(n)) if n.is_i64() || n.is_u64() => "int",
        Some(Json::Number(_)) => "float",
        Some(Json::String(_)) => "str",
        _ => "NoneType",
    }
}

fn field<'j>(json: &'j Json, name: &str) -> Result<&'j Json> {
    json.get(name).ok_or_else(|| parse_err(&format!("missing field {:?}", name), json))
}

fn str_field<'j>(json: &'j Json, name: &str) -> Result<&'j str> {
    field(json, name)?
        .as_str()
        .ok_or_else(|| parse_err(&format!("field {:?} must be a string", name), json))
}

fn parse_err(message: &str, node: &Json) -> Error {
    Error::ParseError(format!("{message} (at {node})"))
}
