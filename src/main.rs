//! Volpe CLI - run scripts, evaluate snippets or start the REPL

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use volpe::{format_error, functions, repl, BuiltinFunction, Environment};

#[derive(Parser)]
#[command(name = "volpe")]
#[command(about = "Volpe - embeddable scripting language", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive REPL (the default)
    Repl,

    /// Evaluate a script file
    Run {
        /// Path to the script
        path: PathBuf,
    },

    /// Evaluate a snippet and print each result
    Eval {
        /// Source code to evaluate
        code: String,
    },
}

/// Builtins available to every script run from the command line
fn builtins() -> Vec<BuiltinFunction> {
    let mut builtins = functions::default_builtins();
    builtins.extend(functions::console());
    builtins
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; VOLPE_LOG takes precedence over --verbose
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("VOLPE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Repl => repl::run_repl(builtins)?,

        Commands::Run { path } => {
            let source = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read file: {}", path.display()))?;

            let mut env = Environment::new(builtins());
            if let Err(e) = volpe::run(&mut env, &source) {
                eprintln!("{}", format_error(&e, &source));
                process::exit(1);
            }
        }

        Commands::Eval { code } => {
            let mut env = Environment::new(builtins());
            match volpe::run(&mut env, &code) {
                Ok(results) => {
                    for line in repl::format_results(&results) {
                        println!("{}", line);
                    }
                }
                Err(e) => {
                    eprintln!("{}", format_error(&e, &code));
                    process::exit(1);
                }
            }
        }
    }

    Ok(())
}
