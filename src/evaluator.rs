//! Evaluator for Volpe - walks the expression tree against an environment

use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use crate::ast::{
    AssignTarget, BinaryOperator, Expression, Literal, LogicalOperator, SourceSpan,
    UnaryOperator,
};
use crate::environment::Environment;
use crate::error::{Result, VolpeError};
use crate::function::{Function, FunctionReference, StandardFunction};
use crate::scope::{Scope, ScopeRef};
use crate::value::{Value, ValueKind};

/// Name given to functions created with `fn (params) { ... }`
pub const ANONYMOUS_FUNCTION: &str = "anonymous";

/// An expression paired with the environment and scope it is evaluated in.
///
/// Builtins receive the context of their call expression, so failures they
/// raise point at the call site.
pub struct EvaluatorContext<'a> {
    expression: &'a Expression,
    environment: &'a mut Environment,
    scope: ScopeRef,
}

impl<'a> EvaluatorContext<'a> {
    /// Prepare `expression` for evaluation in the environment's root scope
    pub fn new(expression: &'a Expression, environment: &'a mut Environment) -> Self {
        let scope = environment.root_scope();
        Self {
            expression,
            environment,
            scope,
        }
    }

    /// Prepare `expression` for evaluation in an explicit scope
    pub fn with_scope(
        expression: &'a Expression,
        environment: &'a mut Environment,
        scope: ScopeRef,
    ) -> Self {
        Self {
            expression,
            environment,
            scope,
        }
    }

    pub fn expression(&self) -> &Expression {
        self.expression
    }

    /// Span of the expression under evaluation
    pub fn span(&self) -> SourceSpan {
        self.expression.span()
    }

    pub fn environment(&self) -> &Environment {
        &*self.environment
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut *self.environment
    }

    pub fn scope(&self) -> &ScopeRef {
        &self.scope
    }

    /// Output sink of the environment
    pub fn output(&mut self) -> &mut dyn Write {
        self.environment.output()
    }

    /// Evaluate `expression` in `scope`, with its own context
    pub fn evaluate_in(&mut self, expression: &Expression, scope: ScopeRef) -> Result<Value> {
        EvaluatorContext {
            expression,
            environment: &mut *self.environment,
            scope,
        }
        .evaluate()
    }

    /// Evaluate a sub-expression in the current scope
    fn evaluate_child(&mut self, expression: &Expression) -> Result<Value> {
        let scope = ScopeRef::clone(&self.scope);
        self.evaluate_in(expression, scope)
    }

    /// Evaluate the expression this context was created for
    pub fn evaluate(&mut self) -> Result<Value> {
        let expression = self.expression;

        match expression {
            Expression::Literal { value, .. } => Ok(match value {
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::String(s.clone()),
                Literal::Boolean(b) => Value::Boolean(*b),
                Literal::Void => Value::Void,
            }),

            Expression::Variable { name, .. } => self.read_variable(name),

            Expression::Declaration { name, value, .. } => {
                let value = self.evaluate_child(value)?;
                self.write_variable(name, value.clone(), true)?;
                Ok(value)
            }

            Expression::Assignment { target, value, .. } => self.assign(target, value),

            Expression::Array { elements, .. } => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.evaluate_child(element)?);
                }
                Ok(Value::array(items))
            }

            Expression::Object { entries, .. } => {
                let mut map = HashMap::with_capacity(entries.len());
                for (key, value_expr) in entries {
                    let value = self.evaluate_child(value_expr)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::object(map))
            }

            Expression::Index { object, index, .. } => {
                let container = self.evaluate_child(object)?;
                let key = self.evaluate_child(index)?;
                self.read_index(&container, &key)
            }

            Expression::Member { object, field, .. } => {
                let container = self.evaluate_child(object)?;
                self.read_member(&container, field)
            }

            Expression::UnaryOp { op, operand, .. } => {
                let operand = self.evaluate_child(operand)?;
                match (op, operand) {
                    (UnaryOperator::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
                    (UnaryOperator::Not, other) => Err(self.type_error(ValueKind::Boolean, &other)),
                    (UnaryOperator::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
                    (UnaryOperator::Negate, other) => {
                        Err(self.type_error(ValueKind::Number, &other))
                    }
                }
            }

            Expression::BinaryOp {
                left, op, right, ..
            } => {
                let left = self.evaluate_child(left)?;
                let right = self.evaluate_child(right)?;
                self.evaluate_binary_op(*op, left, right)
            }

            Expression::Logical {
                left, op, right, ..
            } => {
                let left = self.evaluate_condition(left)?;
                match (op, left) {
                    (LogicalOperator::And, false) => Ok(Value::Boolean(false)),
                    (LogicalOperator::Or, true) => Ok(Value::Boolean(true)),
                    _ => Ok(Value::Boolean(self.evaluate_condition(right)?)),
                }
            }

            Expression::FunctionCall { name, args, .. } => {
                let function = self.resolve_callee(name)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.evaluate_child(arg)?);
                }
                function.invoke(self, &values)
            }

            Expression::FunctionReference { name, .. } => {
                let function = self.scope.lookup_function(name, self.span())?;
                Ok(Value::FunctionReference(FunctionReference::new(
                    function,
                    name.clone(),
                )))
            }

            Expression::FunctionDef {
                name, params, body, ..
            } => {
                let function = self.close_over(name, params, body);
                if !self.scope.declare_function(name, Rc::clone(&function)) {
                    return Err(VolpeError::FunctionAlreadyDefined {
                        name: name.clone(),
                        span: self.span(),
                    });
                }
                Ok(Value::FunctionReference(FunctionReference::new(
                    function,
                    name.clone(),
                )))
            }

            Expression::Lambda { params, body, .. } => {
                let function = self.close_over(ANONYMOUS_FUNCTION, params, body);
                Ok(Value::FunctionReference(FunctionReference::new(
                    function,
                    ANONYMOUS_FUNCTION,
                )))
            }

            Expression::Block { expressions, .. } => {
                let scope = Scope::child(&self.scope);
                let mut last = Value::Void;
                for expression in expressions {
                    last = self.evaluate_in(expression, ScopeRef::clone(&scope))?;
                }
                Ok(last)
            }

            Expression::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.evaluate_condition(condition)? {
                    self.evaluate_child(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.evaluate_child(else_branch)
                } else {
                    Ok(Value::Void)
                }
            }

            Expression::While {
                condition, body, ..
            } => {
                while self.evaluate_condition(condition)? {
                    self.evaluate_child(body)?;
                }
                Ok(Value::Void)
            }
        }
    }

    /// Find the function a call by name refers to: a declared function, or
    /// else a variable holding a function reference
    fn resolve_callee(&self, name: &str) -> Result<Rc<Function>> {
        if let Some(function) = self.scope.try_get_function(name) {
            return Ok(function);
        }
        match self.scope.try_get_variable(name) {
            Some(Value::FunctionReference(reference)) => Ok(reference.function),
            _ => Err(VolpeError::UndefinedFunction {
                name: name.to_string(),
                span: self.span(),
            }),
        }
    }

    /// Build a standard function capturing the current scope
    fn close_over(&self, name: &str, params: &[String], body: &Rc<Expression>) -> Rc<Function> {
        Rc::new(Function::Standard(StandardFunction {
            name: name.to_string(),
            parameters: params.to_vec(),
            body: Rc::clone(body),
            closure: ScopeRef::clone(&self.scope),
        }))
    }

    /// Evaluate an expression that must produce a boolean
    fn evaluate_condition(&mut self, expression: &Expression) -> Result<bool> {
        match self.evaluate_child(expression)? {
            Value::Boolean(b) => Ok(b),
            other => Err(VolpeError::InvalidValueType {
                expected: ValueKind::Boolean,
                actual: other.kind(),
                span: expression.span(),
            }),
        }
    }

    fn assign(&mut self, target: &AssignTarget, value: &Expression) -> Result<Value> {
        match target {
            AssignTarget::Variable(name) => {
                let value = self.evaluate_child(value)?;
                self.write_variable(name, value.clone(), false)?;
                Ok(value)
            }
            AssignTarget::Index { object, index } => {
                let container = self.evaluate_child(object)?;
                let key = self.evaluate_child(index)?;
                let value = self.evaluate_child(value)?;
                match (&container, &key) {
                    (Value::Array(items), Value::Number(n)) => {
                        let len = items.borrow().len();
                        let idx = self.array_index(*n, len)?;
                        items.borrow_mut()[idx] = value.clone();
                    }
                    (Value::Array(_), other) => {
                        return Err(self.type_error(ValueKind::Number, other))
                    }
                    (Value::Object(entries), Value::String(key)) => {
                        entries.borrow_mut().insert(key.clone(), value.clone());
                    }
                    (Value::Object(_), other) => {
                        return Err(self.type_error(ValueKind::String, other))
                    }
                    (other, _) => return Err(self.type_error(ValueKind::Array, other)),
                }
                Ok(value)
            }
            AssignTarget::Member { object, field } => {
                let container = self.evaluate_child(object)?;
                let value = self.evaluate_child(value)?;
                match &container {
                    Value::Object(entries) => {
                        entries.borrow_mut().insert(field.clone(), value.clone());
                        Ok(value)
                    }
                    other => Err(self.type_error(ValueKind::Object, other)),
                }
            }
        }
    }

    fn read_index(&self, container: &Value, key: &Value) -> Result<Value> {
        match (container, key) {
            (Value::Array(items), Value::Number(n)) => {
                let items = items.borrow();
                let idx = self.array_index(*n, items.len())?;
                Ok(items[idx].clone())
            }
            (Value::Array(_), other) => Err(self.type_error(ValueKind::Number, other)),
            (Value::Object(_), Value::String(key)) => self.read_member(container, key),
            (Value::Object(_), other) => Err(self.type_error(ValueKind::String, other)),
            (other, _) => Err(self.type_error(ValueKind::Array, other)),
        }
    }

    fn read_member(&self, container: &Value, field: &str) -> Result<Value> {
        match container {
            Value::Object(entries) => {
                entries
                    .borrow()
                    .get(field)
                    .cloned()
                    .ok_or_else(|| VolpeError::UndefinedMember {
                        name: field.to_string(),
                        span: self.span(),
                    })
            }
            other => Err(self.type_error(ValueKind::Object, other)),
        }
    }

    /// Convert a script number to an array position
    fn array_index(&self, index: f64, length: usize) -> Result<usize> {
        if index.fract() != 0.0 || index < 0.0 || index >= length as f64 {
            return Err(VolpeError::IndexOutOfRange {
                index,
                length,
                span: self.span(),
            });
        }
        Ok(index as usize)
    }

    /// Evaluate binary operations
    fn evaluate_binary_op(&self, op: BinaryOperator, left: Value, right: Value) -> Result<Value> {
        match op {
            BinaryOperator::Equal => Ok(Value::Boolean(left == right)),
            BinaryOperator::NotEqual => Ok(Value::Boolean(left != right)),

            BinaryOperator::Add => match (&left, &right) {
                (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
                (Value::String(l), Value::String(r)) => Ok(Value::String(format!("{}{}", l, r))),
                _ => Err(self.operand_error(&left, &right)),
            },

            BinaryOperator::Subtract
            | BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::Modulo => {
                let (l, r) = match (&left, &right) {
                    (Value::Number(l), Value::Number(r)) => (*l, *r),
                    (Value::Number(_), other) | (other, _) => {
                        return Err(self.type_error(ValueKind::Number, other))
                    }
                };
                Ok(Value::Number(match op {
                    BinaryOperator::Subtract => l - r,
                    BinaryOperator::Multiply => l * r,
                    BinaryOperator::Divide => l / r,
                    _ => l % r,
                }))
            }

            BinaryOperator::LessThan
            | BinaryOperator::LessThanOrEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterThanOrEqual => {
                let ordering = match (&left, &right) {
                    (Value::Number(l), Value::Number(r)) => l.partial_cmp(r),
                    (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
                    _ => return Err(self.operand_error(&left, &right)),
                };
                // NaN compares false against everything
                let result = match ordering {
                    None => false,
                    Some(ordering) => match op {
                        BinaryOperator::LessThan => ordering == Ordering::Less,
                        BinaryOperator::LessThanOrEqual => ordering != Ordering::Greater,
                        BinaryOperator::GreaterThan => ordering == Ordering::Greater,
                        _ => ordering != Ordering::Less,
                    },
                };
                Ok(Value::Boolean(result))
            }
        }
    }

    /// Error for operators accepting either two numbers or two strings
    fn operand_error(&self, left: &Value, right: &Value) -> VolpeError {
        match left {
            Value::String(_) => self.type_error(ValueKind::String, right),
            Value::Number(_) => self.type_error(ValueKind::Number, right),
            other => self.type_error(ValueKind::Number, other),
        }
    }

    fn type_error(&self, expected: ValueKind, actual: &Value) -> VolpeError {
        VolpeError::InvalidValueType {
            expected,
            actual: actual.kind(),
            span: self.span(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions;
    use pretty_assertions::assert_eq;

    fn environment() -> Environment {
        Environment::new(functions::default_builtins())
    }

    /// Evaluate every expression of `source`, returning the last value
    fn eval_in(env: &mut Environment, source: &str) -> Result<Value> {
        let program = crate::parse_str(source).expect("source should parse");
        let mut last = Value::Void;
        for expression in &program {
            last = EvaluatorContext::new(expression, env).evaluate()?;
        }
        Ok(last)
    }

    fn eval(source: &str) -> Result<Value> {
        eval_in(&mut environment(), source)
    }

    #[test]
    fn test_evaluate_literal() {
        let mut env = environment();
        let expr = Expression::literal(Literal::String("hello".to_string()));
        let result = EvaluatorContext::new(&expr, &mut env).evaluate();
        assert_eq!(result.unwrap(), Value::string("hello"));
    }

    #[test]
    fn test_evaluate_arithmetic() {
        assert_eq!(eval("5 + 3").unwrap(), Value::Number(8.0));
        assert_eq!(eval("10 - 4").unwrap(), Value::Number(6.0));
        assert_eq!(eval("2 + 3 * 4").unwrap(), Value::Number(14.0));
        assert_eq!(eval("(2 + 3) * 4").unwrap(), Value::Number(20.0));
        assert_eq!(eval("7 % 4").unwrap(), Value::Number(3.0));
        assert_eq!(eval("-(1 + 1)").unwrap(), Value::Number(-2.0));
        assert_eq!(eval("\"ab\" + \"cd\"").unwrap(), Value::string("abcd"));
    }

    #[test]
    fn test_evaluate_comparison_and_logic() {
        assert_eq!(eval("1 < 2 && 2 <= 2").unwrap(), Value::Boolean(true));
        assert_eq!(eval("\"a\" > \"b\" || !true").unwrap(), Value::Boolean(false));
        assert_eq!(eval("[1, 2] == [1, 2]").unwrap(), Value::Boolean(true));
        assert_eq!(eval("void != 0").unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_logical_operators_short_circuit() {
        // The right-hand side would fail if it were evaluated
        assert_eq!(eval("false && missing").unwrap(), Value::Boolean(false));
        assert_eq!(eval("true || missing").unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_operand_type_errors() {
        let err = eval("1 + \"a\"").unwrap_err();
        assert!(matches!(
            err,
            VolpeError::InvalidValueType {
                expected: ValueKind::Number,
                actual: ValueKind::String,
                ..
            }
        ));

        let err = eval("if 1 { 2 }").unwrap_err();
        assert!(matches!(
            err,
            VolpeError::InvalidValueType {
                expected: ValueKind::Boolean,
                ..
            }
        ));
    }

    #[test]
    fn test_undefined_variable_carries_position() {
        let err = eval("let a = 1\na + b").unwrap_err();
        match err {
            VolpeError::UndefinedVariable { name, span } => {
                assert_eq!(name, "b");
                assert_eq!(span.line, 2);
                assert_eq!(span.column, 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_block_shadowing() {
        let mut env = environment();
        let inner = eval_in(&mut env, "let x = 1; { let x = 2; x }").unwrap();
        assert_eq!(inner, Value::Number(2.0));
        assert_eq!(eval_in(&mut env, "x").unwrap(), Value::Number(1.0));
    }

    #[test]
    fn test_assignment_reaches_outer_scope() {
        let mut env = environment();
        eval_in(&mut env, "let x = 1; { x = 2; let y = 3 }").unwrap();
        assert_eq!(eval_in(&mut env, "x").unwrap(), Value::Number(2.0));
        assert!(!env.root_scope().has_variable("y"));
    }

    #[test]
    fn test_assignment_skips_local_when_outer_binds() {
        let mut env = environment();
        let inner = eval_in(&mut env, "let x = 1; { let x = 2; x = 5; x }").unwrap();
        assert_eq!(inner, Value::Number(2.0));
        assert_eq!(eval_in(&mut env, "x").unwrap(), Value::Number(5.0));
    }

    #[test]
    fn test_closure_mutates_captured_variable() {
        let source = r#"
            let count = 0
            fn bump() { count = count + 1 }
            bump(); bump(); bump()
            count
        "#;
        assert_eq!(eval(source).unwrap(), Value::Number(3.0));
    }

    #[test]
    fn test_closures_are_lexically_scoped() {
        let source = r#"
            let x = "outer"
            fn read() { x }
            fn caller() { let x = "caller"; read() }
            caller()
        "#;
        assert_eq!(eval(source).unwrap(), Value::string("outer"));
    }

    #[test]
    fn test_closure_outlives_its_block() {
        let source = r#"
            let make = fn () {
                let hidden = 41
                fn (n) { hidden = hidden + n; hidden }
            }
            let add = make()
            invoke(add, 1)
        "#;
        assert_eq!(eval(source).unwrap(), Value::Number(42.0));
    }

    #[test]
    fn test_recursive_function() {
        let source = r#"
            fn fact(n) { if n <= 1 { 1 } else { n * fact(n - 1) } }
            fact(5)
        "#;
        assert_eq!(eval(source).unwrap(), Value::Number(120.0));
    }

    #[test]
    fn test_direct_call_arity_is_exact() {
        let mut env = environment();
        eval_in(&mut env, "fn add(a, b) { a + b }").unwrap();

        for call in ["add(1)", "add(1, 2, 3)"] {
            let err = eval_in(&mut env, call).unwrap_err();
            assert!(matches!(
                err,
                VolpeError::ParameterCountMismatch { ref function, expected: 2, .. } if function == "add"
            ));
        }
        assert_eq!(eval_in(&mut env, "add(1, 2)").unwrap(), Value::Number(3.0));
    }

    #[test]
    fn test_function_redefinition_fails() {
        let mut env = environment();
        eval_in(&mut env, "fn f() { 1 }").unwrap();
        let err = eval_in(&mut env, "{ fn f() { 2 } }").unwrap_err();
        assert!(matches!(err, VolpeError::FunctionAlreadyDefined { ref name, .. } if name == "f"));

        // Builtins count as existing functions too
        let err = eval_in(&mut env, "fn repr(x) { x }").unwrap_err();
        assert!(matches!(err, VolpeError::FunctionAlreadyDefined { .. }));
    }

    #[test]
    fn test_sibling_blocks_may_define_same_function() {
        let source = "{ fn f() { 1 } f() } + { fn f() { 2 } f() }";
        assert_eq!(eval(source).unwrap(), Value::Number(3.0));
    }

    #[test]
    fn test_undefined_function() {
        let err = eval("nope(1)").unwrap_err();
        assert!(matches!(err, VolpeError::UndefinedFunction { ref name, .. } if name == "nope"));
        let err = eval("&nope").unwrap_err();
        assert!(matches!(err, VolpeError::UndefinedFunction { .. }));
    }

    #[test]
    fn test_function_reference_value() {
        let value = eval("fn twice(x) { x * 2 } &twice").unwrap();
        assert_eq!(value.to_string(), "<function twice/1>");
        assert_eq!(eval("fn (a, b) { a }").unwrap().to_string(), "<function anonymous/2>");
    }

    #[test]
    fn test_arrays_and_objects() {
        let mut env = environment();
        eval_in(&mut env, "let a = [1, 2, 3]; let o = #{ name: \"volpe\", \"n m\": 1 }").unwrap();
        assert_eq!(eval_in(&mut env, "a[1]").unwrap(), Value::Number(2.0));
        assert_eq!(eval_in(&mut env, "o.name").unwrap(), Value::string("volpe"));
        assert_eq!(eval_in(&mut env, "o[\"n m\"]").unwrap(), Value::Number(1.0));

        eval_in(&mut env, "a[0] = 10; o.name = \"fox\"").unwrap();
        assert_eq!(eval_in(&mut env, "a").unwrap().to_string(), "[10, 2, 3]");
        assert_eq!(eval_in(&mut env, "o.name").unwrap(), Value::string("fox"));
    }

    #[test]
    fn test_index_errors() {
        let err = eval("[1, 2][2]").unwrap_err();
        assert!(matches!(err, VolpeError::IndexOutOfRange { length: 2, .. }));
        let err = eval("[1, 2][0.5]").unwrap_err();
        assert!(matches!(err, VolpeError::IndexOutOfRange { .. }));
        let err = eval("#{ a: 1 }.b").unwrap_err();
        assert!(matches!(err, VolpeError::UndefinedMember { ref name, .. } if name == "b"));
        let err = eval("5[0]").unwrap_err();
        assert!(matches!(err, VolpeError::InvalidValueType { actual: ValueKind::Number, .. }));
    }

    #[test]
    fn test_arrays_alias_through_bindings() {
        let mut env = environment();
        eval_in(&mut env, "let a = [1]; let b = a; b[0] = 9").unwrap();
        assert_eq!(eval_in(&mut env, "a[0]").unwrap(), Value::Number(9.0));
    }

    #[test]
    fn test_while_loop() {
        let source = r#"
            let i = 0
            let total = 0
            while i < 5 { total = total + i; i = i + 1 }
            total
        "#;
        assert_eq!(eval(source).unwrap(), Value::Number(10.0));
    }

    #[test]
    fn test_if_without_else_is_void() {
        assert_eq!(eval("if false { 1 }").unwrap(), Value::Void);
        assert_eq!(eval("if false { 1 } else if true { 2 } else { 3 }").unwrap(), Value::Number(2.0));
    }

    #[test]
    fn test_empty_block_is_void() {
        assert_eq!(eval("{}").unwrap(), Value::Void);
    }

    #[test]
    fn test_failure_leaves_environment_usable() {
        let mut env = environment();
        eval_in(&mut env, "let x = 1").unwrap();
        assert!(eval_in(&mut env, "x = x + missing").is_err());
        assert_eq!(eval_in(&mut env, "x").unwrap(), Value::Number(1.0));
    }
}
