//! Built-in function libraries for Volpe
//!
//! Each library is a list of [`BuiltinFunction`]s that a host installs into an
//! [`Environment`](crate::Environment). Arity is checked by the caller before
//! a callback runs, so callbacks index `args` freely and only check types.

use std::io::Write;

use tracing::warn;

use crate::error::{Result, VolpeError};
use crate::evaluator::EvaluatorContext;
use crate::function::{BuiltinFunction, FunctionReference};
use crate::value::{ArrayRef, ObjectRef, Value, ValueKind};

/// Core library: conversion, reflection, invocation, hooks and errors
pub fn core() -> Vec<BuiltinFunction> {
    vec![
        BuiltinFunction::new("int", 1, fn_int),
        BuiltinFunction::new("string", 1, fn_string),
        BuiltinFunction::new("repr", 1, fn_repr),
        BuiltinFunction::new("type", 1, fn_type),
        BuiltinFunction::new("invoke", 1, fn_invoke).variadic(),
        BuiltinFunction::new("hook", 3, fn_hook),
        BuiltinFunction::new("error", 1, fn_error),
        BuiltinFunction::new("clone", 1, fn_clone),
    ]
}

/// Numeric helpers
pub fn math() -> Vec<BuiltinFunction> {
    vec![
        BuiltinFunction::new("abs", 1, |ctx, args| unary_math(ctx, args, f64::abs)),
        BuiltinFunction::new("floor", 1, |ctx, args| unary_math(ctx, args, f64::floor)),
        BuiltinFunction::new("ceil", 1, |ctx, args| unary_math(ctx, args, f64::ceil)),
        BuiltinFunction::new("round", 1, |ctx, args| unary_math(ctx, args, f64::round)),
        BuiltinFunction::new("sqrt", 1, |ctx, args| unary_math(ctx, args, f64::sqrt)),
        BuiltinFunction::new("pow", 2, |ctx, args| binary_math(ctx, args, f64::powf)),
        BuiltinFunction::new("min", 2, |ctx, args| binary_math(ctx, args, f64::min)),
        BuiltinFunction::new("max", 2, |ctx, args| binary_math(ctx, args, f64::max)),
    ]
}

/// Array, object and string helpers
pub fn collections() -> Vec<BuiltinFunction> {
    vec![
        BuiltinFunction::new("len", 1, fn_len),
        BuiltinFunction::new("push", 2, fn_push),
        BuiltinFunction::new("pop", 1, fn_pop),
        BuiltinFunction::new("keys", 1, fn_keys),
    ]
}

/// Console output. Writes go to the environment's output sink.
pub fn console() -> Vec<BuiltinFunction> {
    vec![
        BuiltinFunction::new("print", 1, |ctx, args| {
            let text = expect_string(ctx, &args[0])?.to_string();
            write_output(ctx, format_args!("{}", text));
            Ok(Value::Void)
        }),
        BuiltinFunction::new("println", 1, |ctx, args| {
            let text = expect_string(ctx, &args[0])?.to_string();
            write_output(ctx, format_args!("{}\n", text));
            Ok(Value::Void)
        }),
        BuiltinFunction::new("clear", 0, |ctx, _| {
            write_output(ctx, format_args!("\x1b[2J\x1b[H"));
            Ok(Value::Void)
        }),
    ]
}

/// Builtins installed by default: core, math and collections
pub fn default_builtins() -> Vec<BuiltinFunction> {
    let mut builtins = core();
    builtins.extend(math());
    builtins.extend(collections());
    builtins
}

// =============================================================================
// CORE FUNCTIONS
// =============================================================================

fn fn_int(ctx: &mut EvaluatorContext<'_>, args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Number(n) => Ok(Value::Number(*n)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|_| conversion_error(ctx, &args[0], ValueKind::Number)),
        other => Err(conversion_error(ctx, other, ValueKind::Number)),
    }
}

fn fn_string(_ctx: &mut EvaluatorContext<'_>, args: &[Value]) -> Result<Value> {
    Ok(match &args[0] {
        Value::String(s) => Value::String(s.clone()),
        Value::Number(n) => Value::String(n.to_string()),
        other => Value::String(other.representation()),
    })
}

fn fn_repr(_ctx: &mut EvaluatorContext<'_>, args: &[Value]) -> Result<Value> {
    Ok(Value::String(args[0].representation()))
}

fn fn_type(_ctx: &mut EvaluatorContext<'_>, args: &[Value]) -> Result<Value> {
    Ok(Value::string(args[0].kind().name()))
}

fn fn_invoke(ctx: &mut EvaluatorContext<'_>, args: &[Value]) -> Result<Value> {
    let reference = expect_function(ctx, &args[0])?;
    let forwarded = &args[1..];

    let required = reference.function.parameter_count();
    if forwarded.len() < required {
        return Err(VolpeError::ParameterCountMismatch {
            function: reference.name.clone(),
            expected: required,
            actual: forwarded.len(),
            span: ctx.span(),
        });
    }

    reference.invoke(ctx, forwarded)
}

fn fn_hook(ctx: &mut EvaluatorContext<'_>, args: &[Value]) -> Result<Value> {
    let name = expect_string(ctx, &args[0])?.to_string();
    let getter = expect_function(ctx, &args[1])?;
    let setter = expect_function(ctx, &args[2])?;

    ctx.environment_mut().hook_variable(name, getter, setter);
    Ok(Value::Void)
}

fn fn_error(ctx: &mut EvaluatorContext<'_>, args: &[Value]) -> Result<Value> {
    let message = expect_string(ctx, &args[0])?.to_string();
    Err(VolpeError::UserThrown {
        message,
        span: ctx.span(),
    })
}

fn fn_clone(_ctx: &mut EvaluatorContext<'_>, args: &[Value]) -> Result<Value> {
    Ok(args[0].copy())
}

// =============================================================================
// MATH FUNCTIONS
// =============================================================================

fn unary_math(
    ctx: &mut EvaluatorContext<'_>,
    args: &[Value],
    op: fn(f64) -> f64,
) -> Result<Value> {
    let n = expect_number(ctx, &args[0])?;
    Ok(Value::Number(op(n)))
}

fn binary_math(
    ctx: &mut EvaluatorContext<'_>,
    args: &[Value],
    op: fn(f64, f64) -> f64,
) -> Result<Value> {
    let a = expect_number(ctx, &args[0])?;
    let b = expect_number(ctx, &args[1])?;
    Ok(Value::Number(op(a, b)))
}

// =============================================================================
// COLLECTION FUNCTIONS
// =============================================================================

fn fn_len(ctx: &mut EvaluatorContext<'_>, args: &[Value]) -> Result<Value> {
    let len = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.borrow().len(),
        Value::Object(entries) => entries.borrow().len(),
        other => return Err(type_error(ctx, ValueKind::Array, other)),
    };
    Ok(Value::Number(len as f64))
}

fn fn_push(ctx: &mut EvaluatorContext<'_>, args: &[Value]) -> Result<Value> {
    let items = expect_array(ctx, &args[0])?;
    items.borrow_mut().push(args[1].clone());
    Ok(Value::Void)
}

fn fn_pop(ctx: &mut EvaluatorContext<'_>, args: &[Value]) -> Result<Value> {
    let items = expect_array(ctx, &args[0])?;
    let popped = items.borrow_mut().pop();
    Ok(popped.unwrap_or(Value::Void))
}

fn fn_keys(ctx: &mut EvaluatorContext<'_>, args: &[Value]) -> Result<Value> {
    let entries = expect_object(ctx, &args[0])?;
    let mut keys: Vec<String> = entries.borrow().keys().cloned().collect();
    keys.sort();
    Ok(Value::array(keys.into_iter().map(Value::String).collect()))
}

// =============================================================================
// HELPERS
// =============================================================================

fn write_output(ctx: &mut EvaluatorContext<'_>, text: std::fmt::Arguments<'_>) {
    let output = ctx.output();
    if let Err(e) = output.write_fmt(text).and_then(|_| output.flush()) {
        warn!(error = %e, "failed to write script output");
    }
}

fn type_error(ctx: &EvaluatorContext<'_>, expected: ValueKind, actual: &Value) -> VolpeError {
    VolpeError::InvalidValueType {
        expected,
        actual: actual.kind(),
        span: ctx.span(),
    }
}

fn conversion_error(ctx: &EvaluatorContext<'_>, value: &Value, target: ValueKind) -> VolpeError {
    VolpeError::TypeConversion {
        value: value.representation(),
        target,
        span: ctx.span(),
    }
}

fn expect_string<'v>(ctx: &EvaluatorContext<'_>, value: &'v Value) -> Result<&'v str> {
    value
        .as_str()
        .ok_or_else(|| type_error(ctx, ValueKind::String, value))
}

fn expect_number(ctx: &EvaluatorContext<'_>, value: &Value) -> Result<f64> {
    value
        .as_number()
        .ok_or_else(|| type_error(ctx, ValueKind::Number, value))
}

fn expect_array(ctx: &EvaluatorContext<'_>, value: &Value) -> Result<ArrayRef> {
    match value {
        Value::Array(items) => Ok(ArrayRef::clone(items)),
        other => Err(type_error(ctx, ValueKind::Array, other)),
    }
}

fn expect_object(ctx: &EvaluatorContext<'_>, value: &Value) -> Result<ObjectRef> {
    match value {
        Value::Object(entries) => Ok(ObjectRef::clone(entries)),
        other => Err(type_error(ctx, ValueKind::Object, other)),
    }
}

fn expect_function(ctx: &EvaluatorContext<'_>, value: &Value) -> Result<FunctionReference> {
    match value {
        Value::FunctionReference(reference) => Ok(reference.clone()),
        other => Err(type_error(ctx, ValueKind::FunctionReference, other)),
    }
}
