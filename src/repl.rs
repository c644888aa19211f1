//! REPL (Read-Eval-Print Loop) for Volpe
//!
//! Each line is parsed and all of its expressions are evaluated against one
//! long-lived environment. Results print as `[i] repr`; a failure is printed
//! and the loop keeps going with the environment as it was left.

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::{history::FileHistory, CompletionType, Config, Editor};
use tracing::warn;

use crate::environment::Environment;
use crate::error::format_error;
use crate::function::BuiltinFunction;

const PROMPT: &str = ">> ";
const HISTORY_FILE: &str = ".volpe_history";

/// Run the interactive REPL.
///
/// `builtins` is called once at start and again on every `:reset`, so each
/// fresh environment gets its own set of functions.
pub fn run_repl<F>(builtins: F) -> Result<()>
where
    F: Fn() -> Vec<BuiltinFunction>,
{
    println!("{}", format!("Volpe REPL v{}", crate::VERSION).cyan().bold());
    println!("{}", "Type :help for help, :quit to exit".dimmed());
    println!();

    let config = Config::builder()
        .completion_type(CompletionType::List)
        .auto_add_history(true)
        .build();

    let mut rl: Editor<(), FileHistory> = Editor::with_config(config)?;

    let history_path = history_path();
    if let Some(path) = &history_path {
        // Missing on first run
        let _ = rl.load_history(path);
    }

    let mut env = Environment::new(builtins());

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }

                if input.starts_with(':') {
                    match input {
                        ":quit" | ":q" | ":exit" => break,
                        ":help" | ":h" => print_help(),
                        ":reset" | ":r" => {
                            env = Environment::new(builtins());
                            println!("{}", "Environment reset".green());
                        }
                        _ => {
                            eprintln!("{} {}", "Unknown command:".red(), input);
                            println!("{}", "Type :help for available commands".dimmed());
                        }
                    }
                    continue;
                }

                eval_line(&mut env, input);
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "Use :quit to exit".dimmed());
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{} {:?}", "Error:".red().bold(), err);
                break;
            }
        }
    }

    if let Some(path) = history_path {
        if let Err(e) = rl.save_history(&path) {
            warn!(error = %e, path = %path.display(), "failed to save REPL history");
        }
    }

    Ok(())
}

/// Evaluate one line and print its results or its failure
fn eval_line(env: &mut Environment, input: &str) {
    match crate::run(env, input) {
        Ok(results) => {
            for line in format_results(&results) {
                println!("{}", line);
            }
        }
        Err(e) => eprintln!("{}", format_error(&e, input)),
    }
}

/// `[i] repr` for each result, in order
pub fn format_results(results: &[crate::Value]) -> Vec<String> {
    results
        .iter()
        .enumerate()
        .map(|(i, value)| format!("[{}] {}", i, value.representation()))
        .collect()
}

fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(HISTORY_FILE))
}

fn print_help() {
    println!("{}", "Volpe REPL Commands:".cyan().bold());
    println!("  {}  - Show this help message", ":help, :h".green());
    println!("  {}  - Exit the REPL", ":quit, :q, :exit".green());
    println!("  {}  - Start over with a fresh environment", ":reset, :r".green());
    println!();
    println!("{}", "Examples:".cyan().bold());
    println!("  {}  - Declare a variable", "let x = 42".dimmed());
    println!("  {}  - Define a function", "fn double(n) { n * 2 }".dimmed());
    println!("  {}  - Call it", "double(x)".dimmed());
    println!("  {}  - Call through a reference", "invoke(&double, 21)".dimmed());
}
