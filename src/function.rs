//! Callable functions: native builtins and user-defined closures

use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::ast::Expression;
use crate::error::{Result, VolpeError};
use crate::evaluator::EvaluatorContext;
use crate::scope::{Scope, ScopeRef};
use crate::value::Value;

/// Native implementation of a builtin.
///
/// The context gives access to the call-site span, the environment and its
/// output sink. Callbacks check their own argument types.
pub type NativeCallback = Rc<dyn Fn(&mut EvaluatorContext<'_>, &[Value]) -> Result<Value>>;

/// A host-supplied function exposed to scripts under a fixed name
#[derive(Clone)]
pub struct BuiltinFunction {
    pub name: String,
    pub parameter_count: usize,
    /// When set, `parameter_count` is a minimum instead of an exact count
    pub variadic: bool,
    callback: NativeCallback,
}

impl BuiltinFunction {
    pub fn new<F>(name: impl Into<String>, parameter_count: usize, callback: F) -> Self
    where
        F: Fn(&mut EvaluatorContext<'_>, &[Value]) -> Result<Value> + 'static,
    {
        Self {
            name: name.into(),
            parameter_count,
            variadic: false,
            callback: Rc::new(callback),
        }
    }

    /// Accept any number of arguments at or above `parameter_count`
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinFunction")
            .field("name", &self.name)
            .field("parameter_count", &self.parameter_count)
            .field("variadic", &self.variadic)
            .finish()
    }
}

/// A user-defined function and the scope it closes over
pub struct StandardFunction {
    pub name: String,
    pub parameters: Vec<String>,
    pub body: Rc<Expression>,
    pub closure: ScopeRef,
}

impl fmt::Debug for StandardFunction {
    // The closure scope is left out: it usually contains this function again
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardFunction")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Anything a script can call
#[derive(Debug)]
pub enum Function {
    Builtin(BuiltinFunction),
    Standard(StandardFunction),
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Builtin(b) => &b.name,
            Function::Standard(s) => &s.name,
        }
    }

    /// Declared parameter count
    pub fn parameter_count(&self) -> usize {
        match self {
            Function::Builtin(b) => b.parameter_count,
            Function::Standard(s) => s.parameters.len(),
        }
    }

    fn accepts(&self, argument_count: usize) -> bool {
        match self {
            Function::Builtin(b) if b.variadic => argument_count >= b.parameter_count,
            _ => argument_count == self.parameter_count(),
        }
    }

    /// Call the function with already evaluated arguments.
    ///
    /// Standard functions run in a fresh scope whose parent is the scope
    /// captured at definition time, not the caller's scope.
    pub fn invoke(&self, context: &mut EvaluatorContext<'_>, args: &[Value]) -> Result<Value> {
        if !self.accepts(args.len()) {
            return Err(VolpeError::ParameterCountMismatch {
                function: self.name().to_string(),
                expected: self.parameter_count(),
                actual: args.len(),
                span: context.span(),
            });
        }

        debug!(function = self.name(), args = args.len(), "invoking function");

        match self {
            Function::Builtin(builtin) => (builtin.callback)(context, args),
            Function::Standard(standard) => {
                let scope = Scope::child(&standard.closure);
                for (parameter, value) in standard.parameters.iter().zip(args) {
                    scope.set_variable(parameter, value.clone(), true);
                }
                context.evaluate_in(&standard.body, scope)
            }
        }
    }
}

/// First-class handle to a function, as stored in a [`Value`]
#[derive(Debug, Clone)]
pub struct FunctionReference {
    pub function: Rc<Function>,
    pub name: String,
}

impl FunctionReference {
    pub fn new(function: Rc<Function>, name: impl Into<String>) -> Self {
        Self {
            function,
            name: name.into(),
        }
    }

    /// Invoke the referenced function
    pub fn invoke(&self, context: &mut EvaluatorContext<'_>, args: &[Value]) -> Result<Value> {
        self.function.invoke(context, args)
    }
}

impl PartialEq for FunctionReference {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.function, &other.function)
    }
}

impl fmt::Display for FunctionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<function {}/{}>",
            self.name,
            self.function.parameter_count()
        )
    }
}
