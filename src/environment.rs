//! Evaluation environment: the root scope, variable hooks and the output sink
//!
//! A hooked variable has no storage of its own. Every read of it calls the
//! getter with no arguments and every write calls the setter with the new
//! value. The hook table is consulted before any scope, so a hook applies at
//! every depth of the program.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};

use tracing::debug;

use crate::error::Result;
use crate::evaluator::EvaluatorContext;
use crate::function::{BuiltinFunction, Function, FunctionReference};
use crate::scope::{Scope, ScopeRef};
use crate::value::Value;

/// Getter/setter pair intercepting one variable name
#[derive(Debug, Clone)]
pub struct VariableHook {
    pub getter: FunctionReference,
    pub setter: FunctionReference,
}

/// Evaluation-wide state shared by every expression evaluated against it
pub struct Environment {
    root: ScopeRef,
    hooks: HashMap<String, VariableHook>,
    output: Box<dyn Write>,
}

impl Environment {
    /// Create an environment whose root scope holds `builtins`, printing to stdout
    pub fn new(builtins: impl IntoIterator<Item = BuiltinFunction>) -> Self {
        Self::with_output(builtins, Box::new(io::stdout()))
    }

    /// Create an environment that sends script output to `output`
    pub fn with_output(
        builtins: impl IntoIterator<Item = BuiltinFunction>,
        output: Box<dyn Write>,
    ) -> Self {
        Self {
            root: Scope::with_builtins(builtins),
            hooks: HashMap::new(),
            output,
        }
    }

    pub fn root_scope(&self) -> ScopeRef {
        ScopeRef::clone(&self.root)
    }

    /// Install one more builtin at the root.
    /// Returns false if a function with that name already exists.
    pub fn register(&mut self, builtin: BuiltinFunction) -> bool {
        let name = builtin.name.clone();
        self.root
            .declare_function(&name, std::rc::Rc::new(Function::Builtin(builtin)))
    }

    /// Route reads and writes of `name` through `getter` and `setter`.
    /// Hooking an already hooked name replaces the previous pair.
    pub fn hook_variable(
        &mut self,
        name: impl Into<String>,
        getter: FunctionReference,
        setter: FunctionReference,
    ) {
        let name = name.into();
        debug!(
            variable = %name,
            getter = %getter.name,
            setter = %setter.name,
            "hooking variable"
        );
        if self
            .hooks
            .insert(name.clone(), VariableHook { getter, setter })
            .is_some()
        {
            debug!(variable = %name, "replaced existing hook");
        }
    }

    pub fn hook(&self, name: &str) -> Option<&VariableHook> {
        self.hooks.get(name)
    }

    pub fn is_hooked(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    /// Sink for script output (`print`, `println`, `clear`)
    pub fn output(&mut self) -> &mut dyn Write {
        self.output.as_mut()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("variables", &self.root.variable_names())
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Hook-aware variable access. These are the only paths the evaluator uses
/// to read or write a variable by name.
impl EvaluatorContext<'_> {
    /// Read `name` from the current scope, or through its getter if hooked
    pub fn read_variable(&mut self, name: &str) -> Result<Value> {
        if let Some(hook) = self.environment().hook(name).cloned() {
            return hook.getter.invoke(self, &[]);
        }
        self.scope().lookup_variable(name, self.span())
    }

    /// Write `name` from the current scope, or through its setter if hooked.
    /// See [`Scope::set_variable`] for the meaning of `shadow_parent`.
    pub fn write_variable(&mut self, name: &str, value: Value, shadow_parent: bool) -> Result<()> {
        if let Some(hook) = self.environment().hook(name).cloned() {
            hook.setter.invoke(self, &[value])?;
            return Ok(());
        }
        self.scope().set_variable(name, value, shadow_parent);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn reference(name: &str, count: usize) -> FunctionReference {
        let builtin = BuiltinFunction::new(name, count, |_, _| Ok(Value::Void));
        FunctionReference::new(Rc::new(Function::Builtin(builtin)), name)
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut env = Environment::new(Vec::new());
        assert!(env.register(BuiltinFunction::new("f", 0, |_, _| Ok(Value::Void))));
        assert!(!env.register(BuiltinFunction::new("f", 1, |_, _| Ok(Value::Void))));
        assert!(env.root_scope().has_function("f"));
    }

    #[test]
    fn test_rehooking_replaces_pair() {
        let mut env = Environment::new(Vec::new());
        env.hook_variable("v", reference("get_a", 0), reference("set_a", 1));
        env.hook_variable("v", reference("get_b", 0), reference("set_b", 1));

        let hook = env.hook("v").unwrap();
        assert_eq!(hook.getter.name, "get_b");
        assert_eq!(hook.setter.name, "set_b");
        assert!(env.is_hooked("v"));
        assert!(!env.is_hooked("w"));
    }
}
