//! Volpe - an embeddable, dynamically typed scripting language
//!
//! Source text is tokenized by [`lexer`], parsed into a flat list of
//! [`Expression`]s by [`token_parser`], and evaluated against an
//! [`Environment`] that owns the root scope, the variable hooks and the
//! output sink.
//!
//! ```no_run
//! use volpe::{functions, Environment};
//!
//! let mut env = Environment::new(functions::default_builtins());
//! let results = volpe::run(&mut env, "let x = 20; x * 2 + 2").unwrap();
//! assert_eq!(results[1].representation(), "42");
//! ```

pub mod ast;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod function;
pub mod functions;
pub mod lexer;
pub mod scope;
pub mod token_parser;
pub mod value;

// CLI-only modules
#[cfg(feature = "cli")]
pub mod repl;

use tracing::debug;

// Re-export commonly used types
pub use ast::{Expression, SourceSpan};
pub use environment::Environment;
pub use error::{format_error, Error, SyntaxError, VolpeError};
pub use evaluator::EvaluatorContext;
pub use function::{BuiltinFunction, FunctionReference};
pub use lexer::{Lexer, Token, TokenKind};
pub use token_parser::TokenParser;
pub use value::{Value, ValueKind};

/// Parse Volpe source into its top-level expressions
pub fn parse_str(input: &str) -> Result<Vec<Expression>, SyntaxError> {
    token_parser::parse(input)
}

/// Parse `source` and evaluate every top-level expression in order.
///
/// Evaluation stops at the first failure. Bindings made by the expressions
/// evaluated before it stay in `env`.
pub fn run(env: &mut Environment, source: &str) -> Result<Vec<Value>, Error> {
    let program = parse_str(source)?;
    debug!(expressions = program.len(), "evaluating program");

    let mut results = Vec::with_capacity(program.len());
    for expression in &program {
        let value = EvaluatorContext::new(expression, env).evaluate()?;
        results.push(value);
    }
    Ok(results)
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
