// File: src/main.rs
//
// Main entry point for the qry interpreter.
// Handles command-line argument parsing and dispatches to the appropriate
// subcommand (run, eval, or repl).

use clap::{Parser as ClapParser, Subcommand};
use qry::errors::{ErrorKind, QryError};
use qry::interpreter::Interpreter;
use qry::repl::Repl;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(
    name = "qry",
    about = "qry: an embeddable query language",
    version = env!("CARGO_PKG_VERSION"),
    long_about = None
)]
struct Cli {
    /// Log filter, e.g. `qry=debug` (overrides RUST_LOG)
    #[arg(long, global = true)]
    log: Option<String>,

    /// Disable coloured output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a qry script file
    Run {
        /// Path to the script
        file: PathBuf,

        /// Print the value of every top-level expression
        #[arg(long)]
        print: bool,
    },

    /// Evaluate a snippet and print each value
    Eval {
        /// Source text
        source: String,
    },

    /// Launch the interactive REPL (the default)
    Repl,
}

fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn evaluate(source: &str, print: bool) -> Result<(), QryError> {
    let mut interpreter = Interpreter::new()?;
    let values = interpreter.eval_source(source)?;
    if print {
        for value in &values {
            println!("{}", interpreter.stringify(value));
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    init_tracing(cli.log.as_deref());

    let result = match cli.command.unwrap_or(Commands::Repl) {
        Commands::Run { file, print } => match fs::read_to_string(&file) {
            Ok(source) => evaluate(&source, print),
            Err(e) => Err(QryError::new(ErrorKind::Io, format!("failed to read {}: {}", file.display(), e))),
        },
        Commands::Eval { source } => evaluate(&source, true),
        Commands::Repl => {
            return match Repl::new().and_then(|mut repl| repl.run()) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("qry: {}", e);
                    ExitCode::FAILURE
                }
            };
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render());
            ExitCode::FAILURE
        }
    }
}
