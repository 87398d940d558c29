//! End-to-end scenarios and cross-cutting invariants, driven entirely
//! through the public [`bramble::Interpreter`] API against hand-built
//! JSON ASTs, the way an embedder actually uses this crate.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use serde_json::json;

use bramble::{
    Candidate, Error, Executable, HostArrayHandle, HostClassHandle, HostRegistry, Interpreter,
    Result, Value,
};

/// A host with no classes at all, for scripts that never touch host interop.
struct NoHost;

impl HostRegistry for NoHost {
    fn resolve_class(&self, name: &str) -> Result<HostClassHandle> {
        Err(Error::ParseError(format!("no host classes registered ({name})")))
    }
    fn get_field(&self, _owner: &Value, name: &str) -> Result<Value> {
        Err(Error::TypeError(format!("no such field {name}")))
    }
    fn set_field(&self, _owner: &Value, _name: &str, _value: Value) -> Result<()> {
        Ok(())
    }
    fn candidates(&self, _owner_class: &str, _method_name: Option<&str>, _is_static: bool) -> Vec<Candidate> {
        Vec::new()
    }
    fn iterate(&self, _value: &Value) -> Result<Vec<Value>> {
        Err(Error::TypeError("not iterable".to_string()))
    }
    fn runtime_class_name(&self, _value: &Value) -> Option<Rc<str>> {
        None
    }
    fn is_assignable(&self, _value_class: &str, _host_class_name: &str) -> bool {
        false
    }
}

/// Installs a subscriber once per test process so the `tracing::trace!`/
/// `warn!`/`debug!` events emitted by the library (which installs none
/// itself) surface under `cargo test -- --nocapture`. Harmless to call
/// more than once; `try_init` silently no-ops on repeat calls.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn run(ast: serde_json::Value) -> Interpreter {
    init_tracing();
    let mut interp = Interpreter::new(Rc::new(NoHost));
    interp.parse(&ast).expect("parse");
    interp.exec().expect("exec");
    interp
}

fn captured_stdout() -> (Interpreter, Rc<RefCell<Vec<String>>>) {
    init_tracing();
    let mut interp = Interpreter::new(Rc::new(NoHost));
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = lines.clone();
    interp.redirect_stdout(move |line| sink.borrow_mut().push(line.to_string()));
    (interp, lines)
}

// ---------------------------------------------------------------------
// E1: times_two
// ---------------------------------------------------------------------

#[test]
fn e1_times_two() {
    let ast = json!({
        "type": "Module",
        "body": [{
            "type": "FunctionDef",
            "name": "times_two",
            "args": {"args": [{"arg": "x"}]},
            "body": [
                {
                    "type": "Assign",
                    "targets": [{"type": "Name", "id": "y"}],
                    "value": {
                        "type": "BinOp",
                        "left": {"type": "Name", "id": "x"},
                        "op": "Mult",
                        "right": {"type": "Constant", "value": 2, "typename": "int"}
                    }
                },
                {"type": "Return", "value": {"type": "Name", "id": "y"}}
            ],
            "decorator_list": []
        }]
    });
    let mut interp = run(ast);
    let f = interp.get_function("times_two").unwrap();
    let result = interp.invoke(&f, vec![Value::Int32(5)]).unwrap();
    assert!(result.values_equal(&Value::Int32(10)));
}

// ---------------------------------------------------------------------
// E2: distance_scalar2 via math.sqrt
// ---------------------------------------------------------------------

fn name(id: &str) -> serde_json::Value {
    json!({"type": "Name", "id": id})
}

fn int_const(n: i64) -> serde_json::Value {
    json!({"type": "Constant", "value": n, "typename": "int"})
}

fn binop(left: serde_json::Value, op: &str, right: serde_json::Value) -> serde_json::Value {
    json!({"type": "BinOp", "left": left, "op": op, "right": right})
}

#[test]
fn e2_distance_scalar2() {
    let dx = binop(name("x1"), "Sub", name("x2"));
    let dy = binop(name("y1"), "Sub", name("y2"));
    let dx2 = binop(dx.clone(), "Pow", int_const(2));
    let dy2 = binop(dy.clone(), "Pow", int_const(2));
    let sum_sq = binop(dx2, "Add", dy2);
    let sqrt_call = json!({
        "type": "Call",
        "func": {"type": "Attribute", "value": name("math"), "attr": "sqrt"},
        "args": [sum_sq]
    });
    let ast = json!({
        "type": "Module",
        "body": [{
            "type": "FunctionDef",
            "name": "distance_scalar2",
            "args": {"args": [{"arg": "x1"}, {"arg": "y1"}, {"arg": "x2"}, {"arg": "y2"}]},
            "body": [{"type": "Return", "value": sqrt_call}],
            "decorator_list": []
        }]
    });
    let mut interp = run(ast);
    let f = interp.get_function("distance_scalar2").unwrap();
    let result = interp
        .invoke(&f, vec![Value::Int32(100), Value::Int32(100), Value::Int32(103), Value::Int32(104)])
        .unwrap();
    assert!(result.values_equal(&Value::Float32(5.0)) || result.values_equal(&Value::Float64(5.0)));
}

// ---------------------------------------------------------------------
// E3: fizzbuzz
// ---------------------------------------------------------------------

#[test]
fn e3_fizzbuzz() {
    let eq = |l: serde_json::Value, r: serde_json::Value| {
        json!({"type": "Compare", "left": l, "ops": ["Eq"], "comparators": [r]})
    };

    let test15 = eq(binop(name("i"), "Mod", int_const(15)), int_const(0));
    let test3 = eq(binop(name("i"), "Mod", int_const(3)), int_const(0));
    let test5 = eq(binop(name("i"), "Mod", int_const(5)), int_const(0));

    let print_str = |s: &str| {
        json!({
            "type": "Expr",
            "value": {"type": "Call", "func": name("print"), "args": [{"type": "Constant", "value": s, "typename": "str"}]}
        })
    };
    let print_i_str = json!({
        "type": "Expr",
        "value": {
            "type": "Call",
            "func": name("print"),
            "args": [{"type": "Call", "func": name("str"), "args": [name("i")]}]
        }
    });

    let body = json!([{
        "type": "If",
        "test": test15,
        "body": [print_str("FizzBuzz")],
        "orelse": [{
            "type": "If",
            "test": test3,
            "body": [print_str("Fizz")],
            "orelse": [{
                "type": "If",
                "test": test5,
                "body": [print_str("Buzz")],
                "orelse": [print_i_str]
            }]
        }]
    }]);

    let ast = json!({
        "type": "Module",
        "body": [{
            "type": "For",
            "target": {"type": "Name", "id": "i"},
            "iter": {"type": "Call", "func": name("range"), "args": [int_const(1), int_const(16)]},
            "body": body
        }]
    });

    let (mut interp, lines) = captured_stdout();
    interp.parse(&ast).unwrap();
    interp.exec().unwrap();
    let joined = lines.borrow().join("\n");
    assert_eq!(joined, "1\n2\nFizz\n4\nBuzz\nFizz\n7\n8\nFizz\nBuzz\n11\nFizz\n13\n14\nFizzBuzz");
}

// ---------------------------------------------------------------------
// E4: dataclass_frozen
// ---------------------------------------------------------------------

fn decorated_frozen_dataclass(name: &str, fields: &[&str]) -> serde_json::Value {
    json!({
        "type": "ClassDef",
        "name": name,
        "decorator_list": [{
            "type": "Call",
            "func": {"type": "Name", "id": "dataclass"},
            "keywords": [{"arg": "frozen", "value": {"type": "Constant", "value": true}}]
        }],
        "body": fields.iter().map(|f| json!({"type": "AnnAssign", "target": {"type": "Name", "id": f}})).collect::<Vec<_>>()
    })
}

#[test]
fn e4_dataclass_frozen() {
    let ast = json!({
        "type": "Module",
        "body": [
            decorated_frozen_dataclass("P", &["x", "y"]),
            {"type": "Assign", "targets": [{"type": "Name", "id": "p1"}],
             "value": {"type": "Call", "func": name("P"), "args": [int_const(1), int_const(2)]}},
            {"type": "Assign", "targets": [{"type": "Name", "id": "p2"}],
             "value": {"type": "Call", "func": name("P"), "args": [int_const(1), int_const(2)]}},
            {"type": "Assign", "targets": [{"type": "Name", "id": "h1"}],
             "value": {"type": "Call", "func": name("hash"), "args": [name("p1")]}},
            {"type": "Assign", "targets": [{"type": "Name", "id": "h2"}],
             "value": {"type": "Call", "func": name("hash"), "args": [name("p2")]}}
        ]
    });
    let mut interp = run(ast);
    let p1 = interp.get_global("p1").unwrap();
    let p2 = interp.get_global("p2").unwrap();
    assert!(p1.values_equal(&p2));
    assert!(!p1.is_identical(&p2));
    assert!(interp.get_global("h1").unwrap().values_equal(&interp.get_global("h2").unwrap()));

    // p1.x = 9 raises FrozenInstanceError
    let mutate_ast = json!({
        "type": "Module",
        "body": [{
            "type": "Assign",
            "targets": [{"type": "Attribute", "value": name("p1"), "attr": "x"}],
            "value": int_const(9)
        }]
    });
    interp.parse(&mutate_ast).unwrap();
    let err = interp.exec().unwrap_err();
    assert!(matches!(err, Error::FrozenInstanceError { .. }));
}

// ---------------------------------------------------------------------
// E5: list comprehension
// ---------------------------------------------------------------------

#[test]
fn e5_list_comp_even_squares() {
    let ast = json!({
        "type": "Module",
        "body": [{
            "type": "Assign",
            "targets": [{"type": "Name", "id": "result"}],
            "value": {
                "type": "ListComp",
                "elt": binop(name("x"), "Mult", name("x")),
                "generators": [{
                    "type": "comprehension",
                    "target": {"type": "Name", "id": "x"},
                    "iter": {"type": "Call", "func": name("range"), "args": [int_const(5)]},
                    "ifs": [{"type": "Compare", "left": binop(name("x"), "Mod", int_const(2)), "ops": ["Eq"], "comparators": [int_const(0)]}]
                }]
            }
        }]
    });
    let interp = run(ast);
    let result = interp.get_global("result").unwrap();
    let expected = Value::list(vec![Value::Int32(0), Value::Int32(4), Value::Int32(16)]);
    assert!(result.values_equal(&expected));
}

// ---------------------------------------------------------------------
// E6: try/except/finally
// ---------------------------------------------------------------------

#[test]
fn e6_try_except_finally() {
    let append_to_t = |s: &str| {
        json!({
            "type": "Expr",
            "value": {"type": "Call", "func": {"type": "Attribute", "value": name("t"), "attr": "append"}, "args": [{"type": "Constant", "value": s, "typename": "str"}]}
        })
    };
    let ast = json!({
        "type": "Module",
        "body": [
            {"type": "ClassDef", "name": "MyError", "decorator_list": [], "body": []},
            {"type": "Assign", "targets": [{"type": "Name", "id": "t"}], "value": {"type": "List", "elts": []}},
            {
                "type": "Try",
                "body": [
                    append_to_t("a"),
                    {"type": "Raise", "exc": {"type": "Call", "func": name("MyError"), "args": []}}
                ],
                "handlers": [{
                    "type": {"type": "Name", "id": "MyError"},
                    "name": null,
                    "body": [append_to_t("e")]
                }],
                "finalbody": [append_to_t("f")]
            }
        ]
    });
    let interp = run(ast);
    let t = interp.get_global("t").unwrap();
    let expected = Value::list(vec![Value::str("a"), Value::str("e"), Value::str("f")]);
    assert!(t.values_equal(&expected));
}

#[test]
fn finally_runs_even_when_try_body_returns() {
    let ast = json!({
        "type": "Module",
        "body": [
            {"type": "Assign", "targets": [{"type": "Name", "id": "log"}], "value": {"type": "List", "elts": []}},
            {
                "type": "FunctionDef",
                "name": "f",
                "args": {"args": []},
                "decorator_list": [],
                "body": [
                    {"type": "Global", "names": ["log"]},
                    {
                        "type": "Try",
                        "body": [{"type": "Return", "value": int_const(1)}],
                        "handlers": [],
                        "orelse": [],
                        "finalbody": [{
                            "type": "Expr",
                            "value": {"type": "Call", "func": {"type": "Attribute", "value": name("log"), "attr": "append"}, "args": [{"type": "Constant", "value": "f", "typename": "str"}]}
                        }]
                    }
                ]
            }
        ]
    });
    let mut interp = run(ast);
    let f = interp.get_function("f").unwrap();
    let result = interp.invoke(&f, vec![]).unwrap();
    assert!(result.values_equal(&Value::Int32(1)), "try's return value must still propagate");
    let log = interp.get_global("log").unwrap();
    assert!(log.values_equal(&Value::list(vec![Value::str("f")])), "finally must run even though try returned");
}

#[test]
fn finally_runs_even_when_try_body_breaks() {
    let append_to_t = |s: &str| {
        json!({
            "type": "Expr",
            "value": {"type": "Call", "func": {"type": "Attribute", "value": name("t"), "attr": "append"}, "args": [{"type": "Constant", "value": s, "typename": "str"}]}
        })
    };
    let ast = json!({
        "type": "Module",
        "body": [
            {"type": "Assign", "targets": [{"type": "Name", "id": "t"}], "value": {"type": "List", "elts": []}},
            {
                "type": "For",
                "target": {"type": "Name", "id": "i"},
                "iter": {"type": "Call", "func": name("range"), "args": [int_const(3)]},
                "body": [{
                    "type": "Try",
                    "body": [
                        {
                            "type": "If",
                            "test": {"type": "Compare", "left": name("i"), "ops": ["Eq"], "comparators": [int_const(1)]},
                            "body": [{"type": "Break"}],
                            "orelse": [{
                                "type": "Expr",
                                "value": {"type": "Call", "func": {"type": "Attribute", "value": name("t"), "attr": "append"}, "args": [name("i")]}
                            }]
                        }
                    ],
                    "handlers": [],
                    "orelse": [],
                    "finalbody": [append_to_t("fin")]
                }]
            }
        ]
    });
    let interp = run(ast);
    let t = interp.get_global("t").unwrap();
    let expected = Value::list(vec![Value::Int32(0), Value::str("fin"), Value::str("fin")]);
    assert!(t.values_equal(&expected), "finally must run on the iteration that breaks, then the loop must actually stop");
}

// ---------------------------------------------------------------------
// Property tests: cross-cutting behavioral invariants
// ---------------------------------------------------------------------

#[test]
fn numeric_narrowing_add_stays_int32() {
    let ast = json!({
        "type": "Module",
        "body": [{"type": "Assign", "targets": [{"type": "Name", "id": "r"}], "value": binop(int_const(1), "Add", int_const(1))}]
    });
    let interp = run(ast);
    assert!(matches!(interp.get_global("r").unwrap(), Value::Int32(2)));
}

#[test]
fn numeric_narrowing_overflow_widens_not_truncates() {
    // 10 ** 20 overflows i64 too, so it must widen to float rather than wrap.
    let ast = json!({
        "type": "Module",
        "body": [{"type": "Assign", "targets": [{"type": "Name", "id": "r"}], "value": binop(int_const(10), "Pow", int_const(20))}]
    });
    let interp = run(ast);
    let r = interp.get_global("r").unwrap();
    assert!(matches!(r, Value::Float32(_) | Value::Float64(_)));
    assert!(r.as_numeric().unwrap().to_f64() > 1e19);
}

#[test]
fn division_always_yields_float() {
    let ast = json!({
        "type": "Module",
        "body": [{"type": "Assign", "targets": [{"type": "Name", "id": "r"}], "value": binop(int_const(1), "Div", int_const(2))}]
    });
    let interp = run(ast);
    let r = interp.get_global("r").unwrap();
    assert!(matches!(r, Value::Float32(_) | Value::Float64(_)));
    assert!(r.values_equal(&Value::Float32(0.5)));
}

#[test]
fn truthiness_coverage() {
    assert!(!Value::None.is_truthy());
    assert!(!Value::Bool(false).is_truthy());
    assert!(!Value::Int32(0).is_truthy());
    assert!(!Value::Float32(0.0).is_truthy());
    assert!(!Value::str("").is_truthy());
    assert!(!Value::list(vec![]).is_truthy());
    assert!(!Value::tuple(vec![]).is_truthy());
    assert!(!Value::dict(vec![]).is_truthy());
    assert!(!Value::str("False").is_truthy(), "newer rule: \"False\" is falsy");
    assert!(Value::str("True").is_truthy());
    assert!(Value::str("anything else").is_truthy());
    assert!(Value::Int32(1).is_truthy());
}

#[test]
fn identity_vs_equality() {
    assert!(Value::Int32(1).values_equal(&Value::Float32(1.0)));
    assert!(!Value::Int32(1).is_identical(&Value::Float32(1.0)));
    assert!(Value::list(vec![]).values_equal(&Value::list(vec![])));
    assert!(!Value::list(vec![]).is_identical(&Value::list(vec![])));
}

#[test]
fn list_mutation_through_aliasing() {
    let ast = json!({
        "type": "Module",
        "body": [
            {"type": "Assign", "targets": [{"type": "Name", "id": "l"}], "value": {"type": "List", "elts": [int_const(1)]}},
            {"type": "Assign", "targets": [{"type": "Name", "id": "l2"}], "value": name("l")},
            {"type": "Expr", "value": {"type": "Call", "func": {"type": "Attribute", "value": name("l"), "attr": "append"}, "args": [int_const(2)]}}
        ]
    });
    let interp = run(ast);
    let l2 = interp.get_global("l2").unwrap();
    assert!(l2.values_equal(&Value::list(vec![Value::Int32(1), Value::Int32(2)])));
}

#[test]
fn closure_captures_definition_time_scope() {
    // def make_adder():
    //     n = 1
    //     def inner(): return n
    //     n = 5          # reassigned after inner is created
    //     return inner
    let ast = json!({
        "type": "Module",
        "body": [{
            "type": "FunctionDef",
            "name": "make_adder",
            "args": {"args": []},
            "decorator_list": [],
            "body": [
                {"type": "Assign", "targets": [{"type": "Name", "id": "n"}], "value": int_const(1)},
                {"type": "FunctionDef", "name": "inner", "args": {"args": []}, "decorator_list": [],
                 "body": [{"type": "Return", "value": name("n")}]},
                {"type": "Assign", "targets": [{"type": "Name", "id": "n"}], "value": int_const(5)},
                {"type": "Return", "value": name("inner")}
            ]
        }]
    });
    let mut interp = Interpreter::new(Rc::new(NoHost));
    interp.parse(&ast).unwrap();
    interp.exec().unwrap();
    let make_adder = interp.get_function("make_adder").unwrap();
    let inner = interp.invoke(&make_adder, vec![]).unwrap();
    interp.set_global("captured_inner", inner);
    let inner_ref = interp.get_function("captured_inner").unwrap();
    let result = interp.invoke(&inner_ref, vec![]).unwrap();
    assert!(result.values_equal(&Value::Int32(5)));
}

#[test]
fn exception_matching_is_by_declared_class() {
    let ast = json!({
        "type": "Module",
        "body": [
            {"type": "ClassDef", "name": "UserError", "decorator_list": [], "body": []},
            {"type": "ClassDef", "name": "OtherError", "decorator_list": [], "body": []},
            {"type": "Assign", "targets": [{"type": "Name", "id": "log"}], "value": {"type": "List", "elts": []}},
            {
                "type": "Try",
                "body": [{"type": "Raise", "exc": {"type": "Call", "func": name("UserError"), "args": []}}],
                "handlers": [
                    {"type": {"type": "Name", "id": "OtherError"}, "name": null,
                     "body": [{"type": "Expr", "value": {"type": "Call", "func": {"type": "Attribute", "value": name("log"), "attr": "append"}, "args": [{"type": "Constant", "value": "wrong", "typename": "str"}]}}]},
                    {"type": {"type": "Name", "id": "UserError"}, "name": null,
                     "body": [{"type": "Expr", "value": {"type": "Call", "func": {"type": "Attribute", "value": name("log"), "attr": "append"}, "args": [{"type": "Constant", "value": "right", "typename": "str"}]}}]}
                ],
                "finalbody": []
            }
        ]
    });
    let interp = run(ast);
    let log = interp.get_global("log").unwrap();
    assert!(log.values_equal(&Value::list(vec![Value::str("right")])));
}

#[test]
fn slicing_negative_and_range() {
    let ast = json!({
        "type": "Module",
        "body": [
            {"type": "Assign", "targets": [{"type": "Name", "id": "s"}],
             "value": {"type": "Subscript", "value": {"type": "Constant", "value": "abcdef", "typename": "str"},
                       "slice": {"type": "Slice", "lower": {"type": "UnaryOp", "op": "USub", "operand": int_const(2)}}}},
            {"type": "Assign", "targets": [{"type": "Name", "id": "l"}],
             "value": {"type": "Subscript", "value": {"type": "List", "elts": [int_const(1), int_const(2), int_const(3), int_const(4)]},
                       "slice": {"type": "Slice", "lower": int_const(1), "upper": int_const(3)}}}
        ]
    });
    let interp = run(ast);
    assert!(interp.get_global("s").unwrap().values_equal(&Value::str("ef")));
    assert!(interp.get_global("l").unwrap().values_equal(&Value::list(vec![Value::Int32(2), Value::Int32(3)])));
}

#[test]
fn index_past_end_raises() {
    let ast = json!({
        "type": "Module",
        "body": [{
            "type": "Assign",
            "targets": [{"type": "Name", "id": "x"}],
            "value": {"type": "Subscript", "value": {"type": "List", "elts": [int_const(1)]}, "slice": int_const(5)}
        }]
    });
    let mut interp = Interpreter::new(Rc::new(NoHost));
    interp.parse(&ast).unwrap();
    let err = interp.exec().unwrap_err();
    assert!(matches!(err, Error::IndexError(_)));
}

// ---------------------------------------------------------------------
// Host interop: overload resolution
// ---------------------------------------------------------------------

struct FixedResult(&'static str);
impl Executable for FixedResult {
    fn invoke(&self, _host: &dyn HostRegistry, _receiver: Option<&Value>, _args: &[Value]) -> Result<Value> {
        Ok(Value::str(self.0))
    }
}

struct OverloadHost;
impl HostRegistry for OverloadHost {
    fn resolve_class(&self, name: &str) -> Result<HostClassHandle> {
        Ok(HostClassHandle { name: Rc::from(name), handle: Rc::new(()) })
    }
    fn get_field(&self, _owner: &Value, name: &str) -> Result<Value> {
        Err(Error::TypeError(format!("no such field {name}")))
    }
    fn set_field(&self, _owner: &Value, _name: &str, _value: Value) -> Result<()> {
        Ok(())
    }
    fn candidates(&self, owner_class: &str, method_name: Option<&str>, _is_static: bool) -> Vec<Candidate> {
        if owner_class != "Calc" || method_name != Some("f") {
            return Vec::new();
        }
        vec![
            Candidate { param_types: vec![Rc::from("int")], executable: Rc::new(FixedResult("int-overload")) },
            Candidate { param_types: vec![Rc::from("double")], executable: Rc::new(FixedResult("double-overload")) },
            Candidate { param_types: vec![Rc::from("String")], executable: Rc::new(FixedResult("string-overload")) },
        ]
    }
    fn iterate(&self, _value: &Value) -> Result<Vec<Value>> {
        Err(Error::TypeError("not iterable".to_string()))
    }
    fn runtime_class_name(&self, _value: &Value) -> Option<Rc<str>> {
        None
    }
    fn is_assignable(&self, _value_class: &str, _host_class_name: &str) -> bool {
        false
    }
}

fn call_calc_f(arg: serde_json::Value) -> Value {
    let ast = json!({
        "type": "Module",
        "body": [{
            "type": "Assign",
            "targets": [{"type": "Name", "id": "r"}],
            "value": {
                "type": "Call",
                "func": {"type": "Attribute", "value": {"type": "Call", "func": {"type": "Name", "id": "JavaClass"}, "args": [{"type": "Constant", "value": "Calc", "typename": "str"}]}, "attr": "f"},
                "args": [arg]
            }
        }]
    });
    let mut interp = Interpreter::new(Rc::new(OverloadHost));
    interp.parse(&ast).unwrap();
    interp.exec().unwrap();
    interp.get_global("r").unwrap()
}

#[test]
fn overload_resolution_picks_int_for_int32_argument() {
    let r = call_calc_f(int_const(5));
    assert!(r.values_equal(&Value::str("int-overload")));
}

#[test]
fn overload_resolution_picks_double_for_float_argument() {
    let r = call_calc_f(json!({"type": "Constant", "value": 5.5, "typename": "float"}));
    assert!(r.values_equal(&Value::str("double-overload")));
}

#[test]
fn overload_resolution_cache_is_reused_across_calls() {
    let r1 = call_calc_f(int_const(1));
    let r2 = call_calc_f(int_const(2));
    assert!(r1.values_equal(&r2));
}

// ---------------------------------------------------------------------
// Host exception matching by assignability, not just exact name
// ---------------------------------------------------------------------

struct Thrower;
impl Executable for Thrower {
    fn invoke(&self, _host: &dyn HostRegistry, _receiver: Option<&Value>, _args: &[Value]) -> Result<Value> {
        Err(Error::HostException {
            class_name: "java.lang.ArithmeticException".to_string(),
            message: "/ by zero".to_string(),
        })
    }
}

/// A host whose thrown exception class name is a fully-qualified name that
/// never exactly matches a script's bare `except` clause; only declared
/// assignable via [`HostRegistry::is_assignable`].
struct ThrowingHost;
impl HostRegistry for ThrowingHost {
    fn resolve_class(&self, name: &str) -> Result<HostClassHandle> {
        Ok(HostClassHandle { name: Rc::from(name), handle: Rc::new(()) })
    }
    fn get_field(&self, _owner: &Value, name: &str) -> Result<Value> {
        Err(Error::TypeError(format!("no such field {name}")))
    }
    fn set_field(&self, _owner: &Value, _name: &str, _value: Value) -> Result<()> {
        Ok(())
    }
    fn candidates(&self, owner_class: &str, method_name: Option<&str>, _is_static: bool) -> Vec<Candidate> {
        if owner_class != "Calc" || method_name != Some("divide") {
            return Vec::new();
        }
        vec![Candidate { param_types: vec![], executable: Rc::new(Thrower) }]
    }
    fn iterate(&self, _value: &Value) -> Result<Vec<Value>> {
        Err(Error::TypeError("not iterable".to_string()))
    }
    fn runtime_class_name(&self, _value: &Value) -> Option<Rc<str>> {
        None
    }
    fn is_assignable(&self, value_class: &str, host_class_name: &str) -> bool {
        value_class == "java.lang.ArithmeticException" && host_class_name == "ArithmeticException"
    }
}

#[test]
fn host_exception_caught_by_assignable_class_not_just_exact_name() {
    let ast = json!({
        "type": "Module",
        "body": [
            {"type": "Assign", "targets": [{"type": "Name", "id": "caught"}], "value": {"type": "Constant", "value": false, "typename": "bool"}},
            {
                "type": "Try",
                "body": [{
                    "type": "Expr",
                    "value": {
                        "type": "Call",
                        "func": {"type": "Attribute", "value": {"type": "Call", "func": {"type": "Name", "id": "JavaClass"}, "args": [{"type": "Constant", "value": "Calc", "typename": "str"}]}, "attr": "divide"},
                        "args": []
                    }
                }],
                "handlers": [{
                    "type": {"type": "Name", "id": "ArithmeticException"},
                    "name": null,
                    "body": [{"type": "Assign", "targets": [{"type": "Name", "id": "caught"}], "value": {"type": "Constant", "value": true, "typename": "bool"}}]
                }],
                "finalbody": []
            }
        ]
    });
    let mut interp = Interpreter::new(Rc::new(ThrowingHost));
    interp.parse(&ast).unwrap();
    interp.exec().unwrap();
    let caught = interp.get_global("caught").unwrap();
    assert!(caught.values_equal(&Value::Bool(true)), "except ArithmeticException must catch java.lang.ArithmeticException via is_assignable");
}

// ---------------------------------------------------------------------
// Host arrays (sanity: handle shape is usable, even without scripted tests)
// ---------------------------------------------------------------------

#[test]
fn host_array_handle_carries_element_class_name() {
    let handle = HostArrayHandle { element_class_name: Rc::from("int"), handle: Rc::new(Vec::<i32>::new()) };
    assert_eq!(handle.element_class_name.as_ref(), "int");
}

// ---------------------------------------------------------------------
// Resource limits
// ---------------------------------------------------------------------

#[test]
fn max_instructions_stops_a_runaway_loop() {
    init_tracing();
    let ast = json!({
        "type": "Module",
        "body": [
            {
                "type": "Assign",
                "targets": [{"type": "Name", "id": "n"}],
                "value": {"type": "Constant", "value": 0, "typename": "int"}
            },
            {
                "type": "While",
                "test": {"type": "Constant", "value": true, "typename": "bool"},
                "body": [{
                    "type": "AugAssign",
                    "target": {"type": "Name", "id": "n"},
                    "op": "Add",
                    "value": {"type": "Constant", "value": 1, "typename": "int"}
                }]
            }
        ]
    });
    let mut interp = Interpreter::new(Rc::new(NoHost));
    interp.set_limits(Some(1_000), None);
    interp.parse(&ast).unwrap();
    let err = interp.exec().expect_err("unbounded loop must be stopped by the instruction budget");
    assert!(matches!(err, Error::UnsupportedOperation(_)), "expected UnsupportedOperation, got {err:?}");
}

#[test]
fn max_recursion_depth_stops_unbounded_recursion() {
    init_tracing();
    let ast = json!({
        "type": "Module",
        "body": [{
            "type": "FunctionDef",
            "name": "loop_forever",
            "args": {"args": []},
            "body": [{
                "type": "Return",
                "value": {
                    "type": "Call",
                    "func": {"type": "Name", "id": "loop_forever"},
                    "args": []
                }
            }],
            "decorator_list": []
        }]
    });
    let mut interp = Interpreter::new(Rc::new(NoHost));
    interp.set_limits(None, Some(50));
    interp.parse(&ast).unwrap();
    interp.exec().unwrap();
    let f = interp.get_function("loop_forever").unwrap();
    let err = interp.invoke(&f, vec![]).expect_err("unbounded recursion must be stopped by the recursion limit");
    assert!(matches!(err, Error::UnsupportedOperation(_)), "expected UnsupportedOperation, got {err:?}");
}
