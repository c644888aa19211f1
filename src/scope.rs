//! Lexical scopes
//!
//! A scope is one frame of variable and function bindings. Children hold a
//! shared reference to their parent, so a frame captured by a closure stays
//! alive after the block that created it has finished.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{trace, warn};

use crate::ast::SourceSpan;
use crate::error::{Result, VolpeError};
use crate::function::{BuiltinFunction, Function};
use crate::value::Value;

/// Shared handle to a scope
pub type ScopeRef = Rc<Scope>;

/// A single lexical frame
#[derive(Default)]
pub struct Scope {
    parent: Option<ScopeRef>,
    variables: RefCell<HashMap<String, Value>>,
    functions: RefCell<HashMap<String, Rc<Function>>>,
}

impl Scope {
    /// Create an empty root scope
    pub fn root() -> ScopeRef {
        Rc::new(Scope::default())
    }

    /// Create a root scope with the given builtins installed.
    /// Later entries with an already used name are ignored with a warning.
    pub fn with_builtins(builtins: impl IntoIterator<Item = BuiltinFunction>) -> ScopeRef {
        let scope = Scope::root();
        for builtin in builtins {
            let name = builtin.name.clone();
            if !scope.declare_function(&name, Rc::new(Function::Builtin(builtin))) {
                warn!(function = %name, "duplicate builtin ignored");
            }
        }
        scope
    }

    /// Create a child scope of `parent`
    pub fn child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(Scope {
            parent: Some(Rc::clone(parent)),
            ..Scope::default()
        })
    }

    pub fn parent(&self) -> Option<&ScopeRef> {
        self.parent.as_ref()
    }

    /// Whether `name` is bound as a variable in this frame (ignoring parents)
    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.borrow().contains_key(name)
    }

    /// Whether `name` is bound as a function in this frame (ignoring parents)
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.borrow().contains_key(name)
    }

    /// Find `name` in this frame or the nearest ancestor that binds it
    pub fn try_get_variable(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.variables.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref()?.try_get_variable(name)
    }

    /// Like [`Scope::try_get_variable`], failing with `UndefinedVariable`
    pub fn lookup_variable(&self, name: &str, span: SourceSpan) -> Result<Value> {
        self.try_get_variable(name)
            .ok_or_else(|| VolpeError::UndefinedVariable {
                name: name.to_string(),
                span,
            })
    }

    pub fn try_get_function(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(function) = self.functions.borrow().get(name) {
            return Some(Rc::clone(function));
        }
        self.parent.as_ref()?.try_get_function(name)
    }

    pub fn lookup_function(&self, name: &str, span: SourceSpan) -> Result<Rc<Function>> {
        self.try_get_function(name)
            .ok_or_else(|| VolpeError::UndefinedFunction {
                name: name.to_string(),
                span,
            })
    }

    /// Bind a function in this frame.
    ///
    /// Returns false without binding anything when `name` is already a
    /// function here or in any ancestor: function names are never shadowed.
    pub fn declare_function(&self, name: &str, function: Rc<Function>) -> bool {
        if self.try_get_function(name).is_some() {
            return false;
        }
        trace!(function = name, "declaring function");
        self.functions.borrow_mut().insert(name.to_string(), function);
        true
    }

    /// Write a variable.
    ///
    /// With `shadow_parent` the binding always goes into this frame, hiding
    /// any outer variable of the same name. Without it, an existing binding
    /// in the parent chain is overwritten even when this frame binds `name`
    /// too; this frame is written only when no ancestor binds `name`.
    pub fn set_variable(&self, name: &str, value: Value, shadow_parent: bool) {
        if !shadow_parent {
            if let Some(owner) = self.parent.as_ref().and_then(|p| p.binding_frame(name)) {
                owner
                    .variables
                    .borrow_mut()
                    .insert(name.to_string(), value);
                return;
            }
        }

        trace!(variable = name, shadow_parent, "binding variable");
        self.variables.borrow_mut().insert(name.to_string(), value);
    }

    /// Nearest frame, starting at this one, that binds `name`
    fn binding_frame(&self, name: &str) -> Option<&Scope> {
        if self.has_variable(name) {
            return Some(self);
        }
        self.parent.as_ref()?.binding_frame(name)
    }

    /// Names of the variables bound in this frame, sorted
    pub fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.variables.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}
