//! Runtime values
//!
//! Scalars and strings have value semantics. Arrays and objects are shared
//! through `Rc<RefCell<..>>`, so two bindings of the same array observe each
//! other's mutations until one side is cloned with [`Value::copy`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::function::FunctionReference;

/// Shared backing storage of an array value
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

/// Shared backing storage of an object value
pub type ObjectRef = Rc<RefCell<HashMap<String, Value>>>;

/// Runtime value
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    String(String),
    Boolean(bool),
    Void,
    Array(ArrayRef),
    Object(ObjectRef),
    FunctionReference(FunctionReference),
}

/// Variant tag of a [`Value`], used in type errors and by `type()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Number,
    String,
    Boolean,
    Void,
    Array,
    Object,
    FunctionReference,
}

impl ValueKind {
    /// Tag name as reported to scripts
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Boolean => "boolean",
            ValueKind::Void => "void",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
            ValueKind::FunctionReference => "function_reference",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    /// Build a string value
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Build an array value with fresh backing storage
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    /// Build an object value with fresh backing storage
    pub fn object(entries: HashMap<String, Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(entries)))
    }

    /// Get the variant tag of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Void => ValueKind::Void,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
            Value::FunctionReference(_) => ValueKind::FunctionReference,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Copy this value so that it shares no backing storage with the original.
    ///
    /// Only the outermost array or object gets new storage; elements are
    /// copied as values, so nested containers are still shared.
    pub fn copy(&self) -> Value {
        match self {
            Value::Array(items) => Value::array(items.borrow().clone()),
            Value::Object(entries) => Value::object(entries.borrow().clone()),
            other => other.clone(),
        }
    }

    /// Canonical textual representation, as printed by `repr` and the REPL
    pub fn representation(&self) -> String {
        self.to_string()
    }

    fn write_repr(&self, f: &mut fmt::Formatter<'_>, seen: &mut Vec<*const ()>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Void => f.write_str("void"),
            Value::Array(items) => {
                let ptr = Rc::as_ptr(items) as *const ();
                if seen.contains(&ptr) {
                    return f.write_str("[...]");
                }
                seen.push(ptr);
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.write_repr(f, seen)?;
                }
                seen.pop();
                f.write_str("]")
            }
            Value::Object(entries) => {
                let ptr = Rc::as_ptr(entries) as *const ();
                if seen.contains(&ptr) {
                    return f.write_str("{...}");
                }
                seen.push(ptr);
                let entries = entries.borrow();
                let mut keys: Vec<&String> = entries.keys().collect();
                keys.sort();
                f.write_str("{")?;
                for (i, key) in keys.into_iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if is_plain_key(key) {
                        write!(f, "{}: ", key)?;
                    } else {
                        write!(f, "{:?}: ", key)?;
                    }
                    entries[key].write_repr(f, seen)?;
                }
                seen.pop();
                f.write_str("}")
            }
            Value::FunctionReference(reference) => write!(f, "{}", reference),
        }
    }
}

fn is_plain_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_repr(f, &mut Vec::new())
    }
}

impl Value {
    /// Structural equality. A pair of containers already being compared
    /// further up the stack counts as equal, so cyclic values terminate.
    fn eq_guarded(&self, other: &Value, seen: &mut Vec<(*const (), *const ())>) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Void, Value::Void) => true,
            (Value::Array(a), Value::Array(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let pair = (Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ());
                if seen.contains(&pair) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return false;
                }
                seen.push(pair);
                let equal = a.iter().zip(b.iter()).all(|(x, y)| x.eq_guarded(y, seen));
                seen.pop();
                equal
            }
            (Value::Object(a), Value::Object(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let pair = (Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ());
                if seen.contains(&pair) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return false;
                }
                seen.push(pair);
                let equal = a
                    .iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| x.eq_guarded(y, seen)));
                seen.pop();
                equal
            }
            (Value::FunctionReference(a), Value::FunctionReference(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.eq_guarded(other, &mut Vec::new())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
