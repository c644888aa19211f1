//! Error types and formatting for Volpe
//!
//! Runtime failures form a closed taxonomy ([`VolpeError`]); every variant
//! carries the span of the expression that detected it. Lexer and parser
//! failures are reported separately as [`SyntaxError`].

use colored::Colorize;
use thiserror::Error;

use crate::ast::SourceSpan;
use crate::value::ValueKind;

/// Result alias for evaluation
pub type Result<T> = std::result::Result<T, VolpeError>;

/// Runtime failure raised while evaluating an expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VolpeError {
    #[error("undefined variable `{name}` at {span}")]
    UndefinedVariable { name: String, span: SourceSpan },

    #[error("undefined function `{name}` at {span}")]
    UndefinedFunction { name: String, span: SourceSpan },

    #[error("invalid value type at {span}: expected {expected}, got {actual}")]
    InvalidValueType {
        expected: ValueKind,
        actual: ValueKind,
        span: SourceSpan,
    },

    #[error("cannot convert {value} to {target} at {span}")]
    TypeConversion {
        value: String,
        target: ValueKind,
        span: SourceSpan,
    },

    #[error("function `{function}` expects {expected} parameter(s), got {actual} at {span}")]
    ParameterCountMismatch {
        function: String,
        expected: usize,
        actual: usize,
        span: SourceSpan,
    },

    #[error("{message} (thrown at {span})")]
    UserThrown { message: String, span: SourceSpan },

    #[error("function `{name}` is already defined in this scope chain at {span}")]
    FunctionAlreadyDefined { name: String, span: SourceSpan },

    #[error("index {index} is out of range for length {length} at {span}")]
    IndexOutOfRange {
        index: f64,
        length: usize,
        span: SourceSpan,
    },

    #[error("object has no member `{name}` at {span}")]
    UndefinedMember { name: String, span: SourceSpan },
}

impl VolpeError {
    /// Source position of the offending expression
    pub fn span(&self) -> SourceSpan {
        match self {
            VolpeError::UndefinedVariable { span, .. }
            | VolpeError::UndefinedFunction { span, .. }
            | VolpeError::InvalidValueType { span, .. }
            | VolpeError::TypeConversion { span, .. }
            | VolpeError::ParameterCountMismatch { span, .. }
            | VolpeError::UserThrown { span, .. }
            | VolpeError::FunctionAlreadyDefined { span, .. }
            | VolpeError::IndexOutOfRange { span, .. }
            | VolpeError::UndefinedMember { span, .. } => *span,
        }
    }
}

/// Lexer or parser failure
#[derive(Debug, Clone, PartialEq, Error)]
#[error("syntax error at {span}: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub span: SourceSpan,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Any failure the front end can observe while running source text
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Runtime(#[from] VolpeError),
}

impl Error {
    pub fn span(&self) -> SourceSpan {
        match self {
            Error::Syntax(e) => e.span,
            Error::Runtime(e) => e.span(),
        }
    }
}

/// Format an error with the offending source line and a caret under it
pub fn format_error(error: &Error, input: &str) -> String {
    let mut output = String::new();
    let span = error.span();
    let (line, col) = (span.line, span.column);

    let header = match error {
        Error::Syntax(_) => "Syntax error:",
        Error::Runtime(VolpeError::UserThrown { .. }) => "Thrown:",
        Error::Runtime(_) => "Runtime error:",
    };
    output.push_str(&format!("{} {}\n", header.red().bold(), error));

    // Hosts may build trees without positions; nothing to point at then
    if line == 0 {
        return output;
    }

    output.push_str(&format!(
        "  {} {}\n",
        "-->".blue().bold(),
        format!("{}:{}", line, col).cyan()
    ));

    let lines: Vec<&str> = input.lines().collect();
    if line <= lines.len() {
        let line_idx = line - 1;

        output.push_str(&format!("   {}\n", "|".blue()));

        // Show previous line for context if available
        if line_idx > 0 {
            output.push_str(&format!(
                " {} | {}\n",
                format!("{:3}", line - 1).blue().dimmed(),
                lines[line_idx - 1].dimmed()
            ));
        }

        output.push_str(&format!(
            " {} | {}\n",
            format!("{:3}", line).blue().bold(),
            lines[line_idx]
        ));

        let width = span.length.max(1);
        let indicator = format!("{}{}", " ".repeat(col.saturating_sub(1)), "^".repeat(width));
        output.push_str(&format!("     {} {}\n", "|".blue(), indicator.red().bold()));
    }

    output
}
