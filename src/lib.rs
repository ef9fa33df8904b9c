// File: src/lib.rs
//
// Library interface for the qry interpreter.
// Exposes modules for embedding, integration testing and the binary.

pub mod ast;
pub mod errors;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod query;
pub mod repl;

use errors::QryError;
use interpreter::{Interpreter, Value};

/// Evaluates `source` in a fresh interpreter with the standard libraries,
/// returning the value of every top-level expression
pub fn run_source(source: &str) -> Result<Vec<Value>, QryError> {
    Interpreter::new()?.eval_source(source)
}
