//! Expression tree definitions for Volpe
//!
//! A Volpe program is a flat sequence of expressions. Everything, including
//! declarations, function definitions and loops, evaluates to a value, so there
//! is no separate statement type.

use std::fmt;
use std::rc::Rc;

use crate::lexer::Span;

/// Source location information carried by every expression node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceSpan {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    pub length: usize,
}

impl SourceSpan {
    pub fn new(line: usize, column: usize, offset: usize, length: usize) -> Self {
        Self {
            line,
            column,
            offset,
            length,
        }
    }
}

impl From<&Span> for SourceSpan {
    fn from(span: &Span) -> Self {
        SourceSpan {
            line: span.start.line,
            column: span.start.column,
            offset: span.start.offset,
            length: span.text.len(),
        }
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Literal values that can appear directly in source
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    Void,
}

/// Left-hand side of an assignment
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    /// `name = value`
    Variable(String),
    /// `object[index] = value`
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
    },
    /// `object.field = value`
    Member {
        object: Box<Expression>,
        field: String,
    },
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,      // +
    Subtract, // -
    Multiply, // *
    Divide,   // /
    Modulo,   // %

    // Comparison
    Equal,              // ==
    NotEqual,           // !=
    LessThan,           // <
    LessThanOrEqual,    // <=
    GreaterThan,        // >
    GreaterThanOrEqual, // >=
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
        };
        f.write_str(symbol)
    }
}

/// Short-circuiting operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And, // &&
    Or,  // ||
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,    // !
    Negate, // -
}

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal value: `42`, `"text"`, `true`, `void`
    Literal { value: Literal, span: SourceSpan },

    /// Variable read: `name`
    Variable { name: String, span: SourceSpan },

    /// Declaration in the current scope: `let name = value`
    Declaration {
        name: String,
        value: Box<Expression>,
        span: SourceSpan,
    },

    /// Assignment to an existing binding in an enclosing scope: `name = value`,
    /// `array[i] = value`, `object.field = value`
    Assignment {
        target: AssignTarget,
        value: Box<Expression>,
        span: SourceSpan,
    },

    /// Array literal: `[a, b, c]`
    Array {
        elements: Vec<Expression>,
        span: SourceSpan,
    },

    /// Object literal: `#{ key: value, "other key": value }`
    Object {
        entries: Vec<(String, Expression)>,
        span: SourceSpan,
    },

    /// Indexing: `array[i]`, `object["key"]`
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
        span: SourceSpan,
    },

    /// Member access: `object.field`
    Member {
        object: Box<Expression>,
        field: String,
        span: SourceSpan,
    },

    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
        span: SourceSpan,
    },

    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
        span: SourceSpan,
    },

    Logical {
        left: Box<Expression>,
        op: LogicalOperator,
        right: Box<Expression>,
        span: SourceSpan,
    },

    /// Direct call by function name: `name(args)`
    FunctionCall {
        name: String,
        args: Vec<Expression>,
        span: SourceSpan,
    },

    /// First-class reference to a named function: `&name`
    FunctionReference { name: String, span: SourceSpan },

    /// Named function definition: `fn name(params) { body }`
    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Rc<Expression>,
        span: SourceSpan,
    },

    /// Anonymous function: `fn (params) { body }`
    Lambda {
        params: Vec<String>,
        body: Rc<Expression>,
        span: SourceSpan,
    },

    /// Block with its own scope: `{ a; b; c }`
    Block {
        expressions: Vec<Expression>,
        span: SourceSpan,
    },

    /// Conditional: `if cond { ... } else { ... }`
    If {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Option<Box<Expression>>,
        span: SourceSpan,
    },

    /// Loop: `while cond { ... }`
    While {
        condition: Box<Expression>,
        body: Box<Expression>,
        span: SourceSpan,
    },
}

impl Expression {
    /// Get the source span for this expression
    pub fn span(&self) -> SourceSpan {
        match self {
            Expression::Literal { span, .. }
            | Expression::Variable { span, .. }
            | Expression::Declaration { span, .. }
            | Expression::Assignment { span, .. }
            | Expression::Array { span, .. }
            | Expression::Object { span, .. }
            | Expression::Index { span, .. }
            | Expression::Member { span, .. }
            | Expression::UnaryOp { span, .. }
            | Expression::BinaryOp { span, .. }
            | Expression::Logical { span, .. }
            | Expression::FunctionCall { span, .. }
            | Expression::FunctionReference { span, .. }
            | Expression::FunctionDef { span, .. }
            | Expression::Lambda { span, .. }
            | Expression::Block { span, .. }
            | Expression::If { span, .. }
            | Expression::While { span, .. } => *span,
        }
    }

    /// Build a literal node with no meaningful source location.
    /// Used by hosts that construct trees without going through the parser.
    pub fn literal(value: Literal) -> Self {
        Expression::Literal {
            value,
            span: SourceSpan::default(),
        }
    }

    /// Build a variable read with no meaningful source location
    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Variable {
            name: name.into(),
            span: SourceSpan::default(),
        }
    }
}
