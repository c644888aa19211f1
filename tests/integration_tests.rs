//! Integration tests running Volpe scripts through the public API

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use volpe::{functions, BuiltinFunction, Environment, Error, Value, ValueKind, VolpeError};

/// Output sink the test can read back after the environment wrote to it
#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn all_builtins() -> Vec<BuiltinFunction> {
    let mut builtins = functions::default_builtins();
    builtins.extend(functions::console());
    builtins
}

fn new_env() -> (Environment, SharedBuffer) {
    let buffer = SharedBuffer::default();
    let env = Environment::with_output(all_builtins(), Box::new(buffer.clone()));
    (env, buffer)
}

/// Evaluate a script and return the value of its last expression
fn eval(env: &mut Environment, source: &str) -> Result<Value, Error> {
    let results = volpe::run(env, source)?;
    Ok(results.into_iter().last().unwrap_or(Value::Void))
}

fn runtime_error(env: &mut Environment, source: &str) -> VolpeError {
    match volpe::run(env, source) {
        Err(Error::Runtime(e)) => e,
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

#[test]
fn test_hook_overrides_reads_and_writes() {
    let (mut env, _) = new_env();
    let script = r#"
        let store = 0
        fn get_temp() { 5 }
        fn set_temp(v) { store = v }
        hook("temp", &get_temp, &set_temp)
        temp = 40;
        [temp, store]
    "#;

    let result = eval(&mut env, script).unwrap();
    assert_eq!(result.representation(), "[5, 40]");
    assert!(!env.root_scope().has_variable("temp"));
}

#[test]
fn test_hook_applies_inside_nested_scopes() {
    let (mut env, _) = new_env();
    let script = r#"
        let log = []
        fn get_v() { 1 }
        fn set_v(x) { push(log, x) }
        hook("v", &get_v, &set_v)
        {
            let v = 2
            { v = 3 }
            v + 10
        }
    "#;

    let result = eval(&mut env, script).unwrap();
    assert_eq!(result, Value::Number(11.0));
    assert_eq!(eval(&mut env, "log").unwrap().representation(), "[2, 3]");
}

#[test]
fn test_hook_ignores_binding_made_before_hooking() {
    let (mut env, _) = new_env();
    let script = r#"
        let temp = 1
        fn get_temp() { 5 }
        fn set_temp(v) { v }
        hook("temp", &get_temp, &set_temp)
        temp = 40
        temp
    "#;

    assert_eq!(eval(&mut env, script).unwrap(), Value::Number(5.0));
    assert_eq!(
        env.root_scope().try_get_variable("temp"),
        Some(Value::Number(1.0))
    );
}

#[test]
fn test_hook_getter_failure_propagates() {
    let (mut env, _) = new_env();
    let script = r#"
        fn get_t() { error("cannot read t") }
        fn set_t(v) { v }
        hook("t", &get_t, &set_t)
        t + 1
    "#;

    let err = runtime_error(&mut env, script);
    assert!(matches!(err, VolpeError::UserThrown { ref message, .. } if message == "cannot read t"));
}

#[test]
fn test_hook_setter_arity_is_checked_on_write() {
    let (mut env, _) = new_env();
    let script = r#"
        fn get_t() { 1 }
        fn set_t() { 0 }
        hook("t", &get_t, &set_t)
        t = 3
    "#;

    let err = runtime_error(&mut env, script);
    assert!(matches!(
        err,
        VolpeError::ParameterCountMismatch {
            ref function,
            expected: 0,
            actual: 1,
            ..
        } if function == "set_t"
    ));

    // Reads still work through the getter
    assert_eq!(eval(&mut env, "t").unwrap(), Value::Number(1.0));
}

#[test]
fn test_hook_requires_function_references() {
    let (mut env, _) = new_env();
    let err = runtime_error(&mut env, r#"fn g() { 1 }; hook("x", &g, 3)"#);
    assert!(matches!(
        err,
        VolpeError::InvalidValueType {
            expected: ValueKind::FunctionReference,
            actual: ValueKind::Number,
            ..
        }
    ));
}

#[test]
fn test_arrays_alias_until_cloned() {
    let (mut env, _) = new_env();
    let script = r#"
        let a = [1, 2]
        let b = a
        push(b, 3)
        b[0] = 9
        let c = clone(a)
        push(c, 4);
        [len(a), len(b), len(c), a[0]]
    "#;

    let result = eval(&mut env, script).unwrap();
    assert_eq!(result.representation(), "[3, 3, 4, 9]");
}

#[test]
fn test_objects_alias_until_cloned() {
    let (mut env, _) = new_env();
    let script = r#"
        let o = #{ name: "fox" }
        let alias = o
        alias.name = "volpe"
        let copy = clone(o)
        copy.name = "other";
        [o.name, alias.name, copy.name]
    "#;

    let result = eval(&mut env, script).unwrap();
    assert_eq!(
        result.representation(),
        r#"["volpe", "volpe", "other"]"#
    );
}

#[test]
fn test_cyclic_arrays_compare_without_crashing() {
    let (mut env, _) = new_env();
    let script = r#"
        let a = [1]
        push(a, a)
        let b = [1]
        push(b, b)
        let c = [2]
        push(c, c);
        [a == b, a == c]
    "#;

    let result = eval(&mut env, script).unwrap();
    assert_eq!(result.representation(), "[true, false]");
}

#[test]
fn test_conversion_round_trip() {
    let (mut env, _) = new_env();
    assert_eq!(
        eval(&mut env, "int(string(42))").unwrap(),
        Value::Number(42.0)
    );
    assert_eq!(
        eval(&mut env, r#"string(int("3.14"))"#).unwrap(),
        Value::string("3.14")
    );

    let err = runtime_error(&mut env, r#"int("fox")"#);
    assert!(matches!(
        err,
        VolpeError::TypeConversion {
            target: ValueKind::Number,
            ..
        }
    ));
}

#[test]
fn test_standard_function_arity() {
    let (mut env, _) = new_env();
    eval(&mut env, "fn add(a, b) { a + b }").unwrap();

    let err = runtime_error(&mut env, "add(1)");
    assert!(matches!(
        err,
        VolpeError::ParameterCountMismatch {
            ref function,
            expected: 2,
            actual: 1,
            ..
        } if function == "add"
    ));

    assert_eq!(eval(&mut env, "add(1, 2)").unwrap(), Value::Number(3.0));
}

#[test]
fn test_invoke_forwards_arguments() {
    let (mut env, _) = new_env();
    eval(&mut env, "fn add(a, b) { a + b }").unwrap();

    assert_eq!(
        eval(&mut env, "invoke(&add, 20, 22)").unwrap(),
        Value::Number(42.0)
    );

    let err = runtime_error(&mut env, "invoke(&add, 1)");
    assert!(matches!(
        err,
        VolpeError::ParameterCountMismatch {
            expected: 2,
            actual: 1,
            ..
        }
    ));

    // Extra arguments pass the minimum check but not the exact one
    let err = runtime_error(&mut env, "invoke(&add, 1, 2, 3)");
    assert!(matches!(
        err,
        VolpeError::ParameterCountMismatch {
            expected: 2,
            actual: 3,
            ..
        }
    ));

    let err = runtime_error(&mut env, "invoke()");
    assert!(matches!(
        err,
        VolpeError::ParameterCountMismatch {
            expected: 1,
            actual: 0,
            ..
        }
    ));
}

#[test]
fn test_body_runs_in_defining_scope() {
    let (mut env, _) = new_env();
    let script = r#"
        let x = "outer"
        fn read_x() { x }
        { let x = "inner"; read_x() }
    "#;
    assert_eq!(eval(&mut env, script).unwrap(), Value::string("outer"));
}

#[test]
fn test_counter_closure() {
    let (mut env, _) = new_env();
    let script = r#"
        fn make_counter() {
            let n = 0
            fn () { n = n + 1; n }
        }
        let c = make_counter()
        let d = make_counter()
        c(); c(); d();
        [invoke(c), d()]
    "#;
    assert_eq!(eval(&mut env, script).unwrap().representation(), "[3, 2]");
}

#[test]
fn test_user_error_carries_position() {
    let (mut env, _) = new_env();
    let err = runtime_error(&mut env, "let x = 1\n  error(\"boom\")");
    match err {
        VolpeError::UserThrown { message, span } => {
            assert_eq!(message, "boom");
            assert_eq!((span.line, span.column), (2, 3));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_type_names() {
    let (mut env, _) = new_env();
    let result = eval(
        &mut env,
        r#"fn f() { 1 }; [type(1), type("s"), type(void), type(&f), type([]), type(#{}), type(true)]"#,
    )
    .unwrap();
    assert_eq!(
        result.representation(),
        r#"["number", "string", "void", "function_reference", "array", "object", "boolean"]"#
    );
}

#[test]
fn test_console_output_goes_to_sink() {
    let (mut env, buffer) = new_env();
    eval(&mut env, r#"println("hello"); print("a"); print("b")"#).unwrap();
    assert_eq!(buffer.contents(), "hello\nab");

    let err = runtime_error(&mut env, "println(1)");
    assert!(matches!(
        err,
        VolpeError::InvalidValueType {
            expected: ValueKind::String,
            ..
        }
    ));
}

#[test]
fn test_host_registered_builtin() {
    let (mut env, _) = new_env();
    let calls = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&calls);
    assert!(env.register(BuiltinFunction::new("tick", 0, move |_, _| {
        *counter.borrow_mut() += 1;
        Ok(Value::Number(*counter.borrow() as f64))
    })));

    assert_eq!(eval(&mut env, "tick(); tick()").unwrap(), Value::Number(2.0));
    assert_eq!(*calls.borrow(), 2);

    // Scripts cannot redefine it
    let err = runtime_error(&mut env, "fn tick() { 0 }");
    assert!(matches!(err, VolpeError::FunctionAlreadyDefined { .. }));
}

#[test]
fn test_environment_survives_failures() {
    let (mut env, _) = new_env();
    assert!(volpe::run(&mut env, "let a = 1; a = a + 1; missing + 1").is_err());
    assert!(volpe::run(&mut env, "let = ").is_err());
    assert_eq!(eval(&mut env, "a").unwrap(), Value::Number(2.0));
}

#[test]
fn test_fibonacci_program() {
    let (mut env, buffer) = new_env();
    let script = r#"
        // iterative fibonacci
        fn fib(n) {
            let a = 0
            let b = 1
            let i = 0
            while i < n {
                let next = a + b
                a = b
                b = next
                i = i + 1
            }
            a
        }
        println(string(fib(20)))
    "#;
    eval(&mut env, script).unwrap();
    assert_eq!(buffer.contents(), "6765\n");
}

proptest! {
    #[test]
    fn prop_int_of_string_round_trips(n in -1.0e9f64..1.0e9) {
        let (mut env, _) = new_env();
        let source = format!("int(string({}))", n);
        let result = eval(&mut env, &source).unwrap();
        prop_assert_eq!(result, Value::Number(n));
    }

    #[test]
    fn prop_string_of_int_round_trips(n in -1_000_000i64..1_000_000) {
        let (mut env, _) = new_env();
        let source = format!("string(int(\"{}\"))", n);
        let result = eval(&mut env, &source).unwrap();
        prop_assert_eq!(result, Value::string(n.to_string()));
    }
}
